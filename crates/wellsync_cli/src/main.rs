//! wellsync CLI
//!
//! Terminal client for both sides of wellsync: the check-in device and the
//! professional's dashboard.
//!
//! # Commands
//!
//! - `init`, `add`, `edit`, `delete`, `list` - manage the device's check-ins
//! - `note`, `queue` - stage notes for upload
//! - `pull-users`, `pull-entries`, `push-notes` - dashboard sync flows
//! - `sync-mobile`, `pull-own` - device sync flows
//! - `status`, `compact` - inspect and maintain the local store
//! - `watch` - run sync rounds on a timer

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wellsync_core::LocalStore;
use wellsync_sync_engine::{
    HttpTransport, ReqwestClient, SyncConfig, SyncEngine, SyncError, ENV_API_BASE,
};

/// Offline-first well-being records, synced when the network allows.
#[derive(Parser)]
#[command(name = "wellsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory of the local store
    #[arg(global = true, short = 'd', long, env = "WELLSYNC_STORE", default_value = "wellsync-data")]
    store: PathBuf,

    /// Base URL of the central backend
    #[arg(global = true, long, env = "WELLSYNC_API_BASE")]
    api_base: Option<String>,

    /// Professional identity used to tag uploaded notes
    #[arg(global = true, long, env = "WELLSYNC_PROFESSIONAL")]
    professional: Option<String>,

    /// Shared secret for the mobile channel
    #[arg(global = true, long, env = "WELLSYNC_MOBILE_KEY", hide_env_values = true)]
    mobile_key: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
}

/// Which side a timer-driven round runs for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Role {
    /// Check-in device: push pending entries, pull own rows
    Mobile,
    /// Dashboard: push notes, refresh users, pull entries
    Dashboard,
}

#[derive(Subcommand)]
enum Commands {
    /// Create this device's profile
    Init {
        /// Display name sent with uploads
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Record a check-in
    Add {
        /// Mood score
        #[arg(short, long)]
        mood: Option<i64>,

        /// Stress score
        #[arg(short, long)]
        stress: Option<i64>,

        /// Free-text note
        #[arg(short, long)]
        note: Option<String>,

        /// Owning user (defaults to this device's profile)
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Change a check-in
    Edit {
        /// Entry id
        id: String,

        /// New mood score
        #[arg(short, long)]
        mood: Option<i64>,

        /// New stress score
        #[arg(short, long)]
        stress: Option<i64>,

        /// New note
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Soft-delete a check-in
    Delete {
        /// Entry id
        id: String,
    },

    /// List recent check-ins
    List {
        /// Only this user's entries
        #[arg(short, long)]
        user: Option<String>,

        /// Maximum entries shown
        #[arg(short, long, default_value_t = wellsync_core::DEFAULT_LIST_LIMIT)]
        limit: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: Format,
    },

    /// Queue a note about a user for upload
    Note {
        /// User the note is about
        user: String,

        /// Note text
        text: String,
    },

    /// Show queued notes
    Queue {
        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: Format,
    },

    /// Refresh cached user profiles
    PullUsers,

    /// Pull a user's entries changed since the last pull
    PullEntries {
        /// User id
        user: String,
    },

    /// Upload queued notes
    PushNotes,

    /// Upload pending check-ins, then pull this device's rows
    SyncMobile,

    /// Pull this device's rows only
    PullOwn,

    /// Show store contents and sync cursors
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: Format,
    },

    /// Rewrite the journal as a single snapshot
    Compact,

    /// Run sync rounds on a timer
    Watch {
        /// Which side to sync
        #[arg(short, long, value_enum, default_value = "mobile")]
        role: Role,

        /// Dashboard user whose entries are pulled each round
        #[arg(short, long)]
        user: Option<String>,

        /// Seconds between rounds [default: 60]
        #[arg(short, long, env = "WELLSYNC_SYNC_INTERVAL")]
        interval: Option<u64>,

        /// Stop after this many rounds
        #[arg(long)]
        rounds: Option<u64>,
    },
}

/// Shared state handed to every command.
pub struct Context {
    /// The local store, opened once.
    pub store: Arc<LocalStore>,
    /// Directory the store was opened from.
    pub store_path: PathBuf,
    api_base: Option<String>,
    professional: Option<String>,
    mobile_key: Option<String>,
}

/// Engine type used by the sync commands.
pub type HttpEngine = SyncEngine<HttpTransport<ReqwestClient>>;

impl Context {
    /// Builds the sync configuration from the global flags.
    pub fn sync_config(&self) -> Result<SyncConfig, SyncError> {
        let base = self
            .api_base
            .as_deref()
            .ok_or_else(|| SyncError::Config(format!("--api-base or {ENV_API_BASE} is required")))?;
        let mut config = SyncConfig::new(base);
        if let Some(key) = &self.mobile_key {
            config = config.with_mobile_key(key.as_str());
        }
        if let Some(professional) = self.professional.as_deref().filter(|p| !p.trim().is_empty()) {
            config = config.with_professional(professional);
        }
        config.validate()?;
        Ok(config)
    }

    /// Builds an engine talking HTTP to the configured backend.
    pub fn engine(&self) -> Result<HttpEngine, SyncError> {
        self.engine_with(self.sync_config()?)
    }

    /// Builds an engine from an adjusted configuration.
    pub fn engine_with(&self, config: SyncConfig) -> Result<HttpEngine, SyncError> {
        config.validate()?;
        let transport = HttpTransport::from_config(&config)?;
        Ok(SyncEngine::new(config, Arc::clone(&self.store), transport))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<SyncError>() {
                Some(sync) if sync.is_offline() => eprintln!("offline or sync failed: {sync}"),
                _ => eprintln!("error: {err}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = LocalStore::open(&cli.store)?;
    let ctx = Context {
        store: Arc::new(store),
        store_path: cli.store,
        api_base: cli.api_base,
        professional: cli.professional,
        mobile_key: cli.mobile_key,
    };

    match cli.command {
        Commands::Init { label } => commands::entries::init(&ctx, label.as_deref())?,
        Commands::Add {
            mood,
            stress,
            note,
            user,
        } => commands::entries::add(&ctx, user, mood, stress, note)?,
        Commands::Edit {
            id,
            mood,
            stress,
            note,
        } => commands::entries::edit(&ctx, &id, mood, stress, note)?,
        Commands::Delete { id } => commands::entries::delete(&ctx, &id)?,
        Commands::List {
            user,
            limit,
            format,
        } => commands::entries::list(&ctx, user.as_deref(), limit, format)?,
        Commands::Note { user, text } => commands::notes::note(&ctx, &user, &text)?,
        Commands::Queue { format } => commands::notes::queue(&ctx, format)?,
        Commands::PullUsers => commands::sync::pull_users(&ctx)?,
        Commands::PullEntries { user } => commands::sync::pull_entries(&ctx, &user)?,
        Commands::PushNotes => commands::sync::push_notes(&ctx)?,
        Commands::SyncMobile => commands::sync::sync_mobile(&ctx)?,
        Commands::PullOwn => commands::sync::pull_own(&ctx)?,
        Commands::Status { format } => commands::status::run(&ctx, format)?,
        Commands::Compact => commands::status::compact(&ctx)?,
        Commands::Watch {
            role,
            user,
            interval,
            rounds,
        } => commands::sync::watch(&ctx, role, user.as_deref(), interval, rounds)?,
    }

    Ok(())
}
