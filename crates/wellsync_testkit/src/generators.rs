//! Property-based test generators.

use proptest::prelude::*;
use wellsync_protocol::RemoteEntry;

/// Fixed-width UTC timestamps in 2024, as the backend emits them.
pub fn arb_timestamp() -> impl Strategy<Value = String> {
    (1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60).prop_map(|(mo, d, h, mi, s)| {
        format!("2024-{mo:02}-{d:02}T{h:02}:{mi:02}:{s:02}Z")
    })
}

/// A server row for `user_id` with an arbitrary modification time.
pub fn arb_remote_entry(user_id: String) -> impl Strategy<Value = RemoteEntry> {
    (
        "[a-f0-9]{8}",
        arb_timestamp(),
        proptest::option::of(0i64..=10),
        proptest::option::of(0i64..=10),
        any::<bool>(),
    )
        .prop_map(move |(id, modified, mood, stress, deleted)| RemoteEntry {
            id,
            user_id: Some(user_id.clone()),
            ts: modified.clone(),
            mood,
            stress,
            note: None,
            last_modified: Some(modified),
            deleted,
        })
}

/// Batches of rows for `user_id`, possibly empty.
pub fn arb_entry_batch(user_id: &str, max: usize) -> impl Strategy<Value = Vec<RemoteEntry>> {
    proptest::collection::vec(arb_remote_entry(user_id.to_string()), 0..max)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn timestamps_are_fixed_width(a in arb_timestamp(), b in arb_timestamp()) {
            prop_assert_eq!(a.len(), 20);
            prop_assert_eq!(a.len(), b.len());
        }
    }
}
