//! The local store.

use crate::dir::StoreDir;
use crate::entity::{Collection, Entity};
use crate::error::{StoreError, StoreResult};
use crate::journal::{self, FrameKind, Mutation};
use crate::meta::MetaKey;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};
use wellsync_storage::{FileBackend, InMemoryBackend, StorageBackend};

type Rows = BTreeMap<String, ciborium::Value>;
type Tables = BTreeMap<Collection, Rows>;

/// Configuration for a [`LocalStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Sync the journal after every frame. Turning this off trades the
    /// "durable on return" guarantee for speed; tests only.
    pub sync_on_write: bool,
    /// Rewrite the journal as a snapshot once it grows past this size.
    pub compact_threshold_bytes: Option<u64>,
}

impl StoreConfig {
    /// Sets the compaction threshold.
    pub fn with_compact_threshold(mut self, bytes: Option<u64>) -> Self {
        self.compact_threshold_bytes = bytes;
        self
    }

    /// Sets whether every frame is synced.
    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
            compact_threshold_bytes: Some(4 * 1024 * 1024),
        }
    }
}

/// A set of mutations committed as a single journal frame.
///
/// Either every mutation in the batch becomes visible (and durable) or
/// none does.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    mutations: Vec<Mutation>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an upsert of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] if the entity cannot be encoded.
    pub fn put<E: Entity>(&mut self, entity: &E) -> StoreResult<&mut Self> {
        let value = ciborium::Value::serialized(entity).map_err(StoreError::codec)?;
        self.mutations.push(Mutation::Put {
            collection: E::COLLECTION,
            id: entity.id().to_string(),
            value,
        });
        Ok(self)
    }

    /// Stages removal of the row `id`.
    pub fn delete<E: Entity>(&mut self, id: impl Into<String>) -> &mut Self {
        self.mutations.push(Mutation::Delete {
            collection: E::COLLECTION,
            id: id.into(),
        });
        self
    }

    /// Stages a metadata write.
    pub fn set_meta(&mut self, key: &MetaKey, value: impl Into<String>) -> &mut Self {
        self.mutations.push(Mutation::Put {
            collection: Collection::Meta,
            id: key.as_key(),
            value: ciborium::Value::Text(value.into()),
        });
        self
    }

    /// Number of staged mutations.
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// Durable per-device storage for users, entries, queued notes and metadata.
///
/// Each call is atomic and durable on return: its mutations are encoded
/// as one checksummed journal frame, appended and synced, and only then
/// applied to the in-memory view that reads are served from. Reads never
/// fail for an empty collection.
///
/// The handle is opened once at startup and shared (`Arc<LocalStore>`)
/// with whoever needs it; there is no global instance.
///
/// # Example
///
/// ```rust
/// use wellsync_core::{LocalStore, MetaKey, CursorScope};
///
/// let store = LocalStore::open_in_memory().unwrap();
/// let key = MetaKey::Cursor(CursorScope::entries("u-1"));
/// assert_eq!(store.meta_or(&key, "none").unwrap(), "none");
/// store.set_meta(&key, "2024-01-03T00:00:00Z").unwrap();
/// assert_eq!(store.meta(&key).unwrap().as_deref(), Some("2024-01-03T00:00:00Z"));
/// ```
pub struct LocalStore {
    config: StoreConfig,
    journal: Mutex<Box<dyn StorageBackend>>,
    tables: RwLock<Tables>,
    _dir: Option<StoreDir>,
}

impl LocalStore {
    /// Opens (or creates) the store in directory `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Opens the store in directory `path` with explicit configuration.
    ///
    /// # Errors
    ///
    /// Fails if the directory is locked by another handle, the journal
    /// cannot be read, or a checksummed frame is undecodable.
    pub fn open_with_config(path: &Path, config: StoreConfig) -> StoreResult<Self> {
        let dir = StoreDir::open(path)?;
        let backend = FileBackend::open(&dir.journal_path())?;
        Self::load(Box::new(backend), config, Some(dir))
    }

    /// Opens an ephemeral store.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_backend(Box::new(InMemoryBackend::new()), StoreConfig::default())
    }

    /// Opens a store over an arbitrary journal backend.
    pub fn with_backend(backend: Box<dyn StorageBackend>, config: StoreConfig) -> StoreResult<Self> {
        Self::load(backend, config, None)
    }

    fn load(
        mut backend: Box<dyn StorageBackend>,
        config: StoreConfig,
        dir: Option<StoreDir>,
    ) -> StoreResult<Self> {
        let bytes = backend.read_all()?;
        let replay = journal::replay(&bytes)?;

        if replay.has_torn_tail(bytes.len() as u64) {
            warn!(
                valid_len = replay.valid_len,
                total_len = bytes.len(),
                "discarding torn journal tail"
            );
            backend.truncate(replay.valid_len)?;
        }

        let mut tables = Tables::new();
        let frame_count = replay.frames.len();
        for frame in replay.frames {
            if frame.kind == FrameKind::Snapshot {
                tables.clear();
            }
            apply(&mut tables, frame.mutations);
        }
        debug!(frames = frame_count, "local store opened");

        Ok(Self {
            config,
            journal: Mutex::new(backend),
            tables: RwLock::new(tables),
            _dir: dir,
        })
    }

    /// Commits a batch as one atomic, durable frame.
    ///
    /// An empty batch performs no I/O.
    ///
    /// # Errors
    ///
    /// On failure nothing of the batch is visible, in memory or after a
    /// restart.
    pub fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let frame = journal::encode_frame(FrameKind::Commit, &batch.mutations)?;
        let mut journal = self.journal.lock();
        let size_before = journal.size()?;

        let written = journal.append(&frame).and_then(|_| {
            if self.config.sync_on_write {
                journal.sync()
            } else {
                Ok(())
            }
        });
        if let Err(err) = written {
            if let Err(rollback) = journal.truncate(size_before) {
                warn!(error = %rollback, "could not roll back partial journal frame");
            }
            return Err(err.into());
        }

        let mutation_count = batch.mutations.len();
        apply(&mut self.tables.write(), batch.mutations);
        debug!(mutations = mutation_count, bytes = frame.len(), "journal frame committed");

        if let Some(threshold) = self.config.compact_threshold_bytes {
            if size_before + frame.len() as u64 > threshold {
                if let Err(err) = self.compact_locked(&mut **journal) {
                    warn!(error = %err, "journal compaction failed; continuing on the uncompacted journal");
                }
            }
        }
        Ok(())
    }

    /// Rewrites the journal as a single snapshot frame.
    pub fn compact(&self) -> StoreResult<()> {
        let mut journal = self.journal.lock();
        self.compact_locked(&mut **journal)
    }

    fn compact_locked(&self, journal: &mut dyn StorageBackend) -> StoreResult<()> {
        let mutations: Vec<Mutation> = {
            let tables = self.tables.read();
            tables
                .iter()
                .flat_map(|(collection, rows)| {
                    rows.iter().map(|(id, value)| Mutation::Put {
                        collection: *collection,
                        id: id.clone(),
                        value: value.clone(),
                    })
                })
                .collect()
        };

        let frame = journal::encode_frame(FrameKind::Snapshot, &mutations)?;
        journal.replace(&frame)?;
        debug!(rows = mutations.len(), bytes = frame.len(), "journal compacted");
        Ok(())
    }

    /// Current journal size in bytes.
    pub fn journal_size(&self) -> StoreResult<u64> {
        Ok(self.journal.lock().size()?)
    }

    /// Upserts one entity.
    pub fn put<E: Entity>(&self, entity: &E) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(entity)?;
        self.commit(batch)
    }

    /// Upserts many entities atomically. An empty slice performs no I/O.
    pub fn put_many<E: Entity>(&self, entities: &[E]) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        for entity in entities {
            batch.put(entity)?;
        }
        self.commit(batch)
    }

    /// Fetches one entity by id.
    pub fn get<E: Entity>(&self, id: &str) -> StoreResult<Option<E>> {
        let tables = self.tables.read();
        tables
            .get(&E::COLLECTION)
            .and_then(|rows| rows.get(id))
            .map(decode::<E>)
            .transpose()
    }

    /// All entities of a kind, ordered by id.
    pub fn all<E: Entity>(&self) -> StoreResult<Vec<E>> {
        self.query(|_: &E| true)
    }

    /// Entities of a kind matching `predicate`, ordered by id.
    pub fn query<E, F>(&self, predicate: F) -> StoreResult<Vec<E>>
    where
        E: Entity,
        F: Fn(&E) -> bool,
    {
        let tables = self.tables.read();
        let mut out = Vec::new();
        if let Some(rows) = tables.get(&E::COLLECTION) {
            for value in rows.values() {
                let entity = decode::<E>(value)?;
                if predicate(&entity) {
                    out.push(entity);
                }
            }
        }
        Ok(out)
    }

    /// Number of stored entities of a kind.
    pub fn count<E: Entity>(&self) -> usize {
        self.tables
            .read()
            .get(&E::COLLECTION)
            .map_or(0, BTreeMap::len)
    }

    /// Removes one entity; returns whether it existed.
    pub fn delete<E: Entity>(&self, id: &str) -> StoreResult<bool> {
        Ok(self.delete_many::<E, _>(&[id])? == 1)
    }

    /// Removes the given ids atomically.
    ///
    /// Ids that are not present are ignored; the return value counts the
    /// rows actually removed. Performs no I/O when nothing matches.
    pub fn delete_many<E, S>(&self, ids: &[S]) -> StoreResult<usize>
    where
        E: Entity,
        S: AsRef<str>,
    {
        let present: BTreeSet<String> = {
            let tables = self.tables.read();
            match tables.get(&E::COLLECTION) {
                Some(rows) => ids
                    .iter()
                    .map(AsRef::as_ref)
                    .filter(|id| rows.contains_key(*id))
                    .map(String::from)
                    .collect(),
                None => BTreeSet::new(),
            }
        };

        let mut batch = WriteBatch::new();
        for id in &present {
            batch.delete::<E>(id.clone());
        }
        self.commit(batch)?;
        Ok(present.len())
    }

    /// Reads a metadata value.
    pub fn meta(&self, key: &MetaKey) -> StoreResult<Option<String>> {
        let tables = self.tables.read();
        match tables
            .get(&Collection::Meta)
            .and_then(|rows| rows.get(&key.as_key()))
        {
            None => Ok(None),
            Some(ciborium::Value::Text(text)) => Ok(Some(text.clone())),
            Some(other) => Err(StoreError::Codec(format!(
                "metadata {} holds a non-text value: {:?}",
                key, other
            ))),
        }
    }

    /// Reads a metadata value, or `fallback` when absent.
    pub fn meta_or(&self, key: &MetaKey, fallback: &str) -> StoreResult<String> {
        Ok(self.meta(key)?.unwrap_or_else(|| fallback.to_string()))
    }

    /// Writes a metadata value.
    pub fn set_meta(&self, key: &MetaKey, value: &str) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.set_meta(key, value);
        self.commit(batch)
    }

    /// All recognised metadata entries, ordered by key.
    pub fn meta_entries(&self) -> StoreResult<Vec<(MetaKey, String)>> {
        let tables = self.tables.read();
        let mut out = Vec::new();
        if let Some(rows) = tables.get(&Collection::Meta) {
            for (raw_key, value) in rows {
                let (Some(key), ciborium::Value::Text(text)) = (MetaKey::parse(raw_key), value)
                else {
                    continue;
                };
                out.push((key, text.clone()));
            }
        }
        Ok(out)
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        let mut s = f.debug_struct("LocalStore");
        for collection in Collection::ALL {
            s.field(
                collection.as_str(),
                &tables.get(&collection).map_or(0, BTreeMap::len),
            );
        }
        s.finish()
    }
}

fn apply(tables: &mut Tables, mutations: Vec<Mutation>) {
    for mutation in mutations {
        match mutation {
            Mutation::Put {
                collection,
                id,
                value,
            } => {
                tables.entry(collection).or_default().insert(id, value);
            }
            Mutation::Delete { collection, id } => {
                if let Some(rows) = tables.get_mut(&collection) {
                    rows.remove(&id);
                }
            }
        }
    }
}

fn decode<E: Entity>(value: &ciborium::Value) -> StoreResult<E> {
    value.deserialized().map_err(StoreError::codec)
}
