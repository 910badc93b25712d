//! CLI command implementations.

pub mod entries;
pub mod notes;
pub mod status;
pub mod sync;

use crate::Format;
use serde::Serialize;

/// Prints `value` as pretty JSON, or falls back to `text`.
pub(crate) fn emit<T: Serialize>(
    format: Format,
    value: &T,
    text: impl FnOnce(&T),
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(value)?),
        Format::Text => text(value),
    }
    Ok(())
}
