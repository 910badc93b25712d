//! Sync cursor registry.

use crate::error::StoreResult;
use crate::meta::{CursorScope, MetaKey};
use crate::store::{LocalStore, WriteBatch};
use crate::types::Timestamp;
use tracing::debug;

/// Per-scope watermarks bounding incremental pulls.
///
/// A cursor only ever moves forward: [`CursorRegistry::advance`] ignores
/// candidates that are not strictly newer than the stored value, which
/// makes it safe to call repeatedly and with out-of-order batches.
#[derive(Debug, Clone, Copy)]
pub struct CursorRegistry<'a> {
    store: &'a LocalStore,
}

impl<'a> CursorRegistry<'a> {
    /// Registry view over `store`.
    pub fn new(store: &'a LocalStore) -> Self {
        Self { store }
    }

    /// The stored cursor, if this scope was ever pulled.
    pub fn read_raw(&self, scope: &CursorScope) -> StoreResult<Option<Timestamp>> {
        Ok(self
            .store
            .meta(&MetaKey::Cursor(scope.clone()))?
            .map(Timestamp::from))
    }

    /// The stored cursor, or the epoch sentinel when absent.
    pub fn read(&self, scope: &CursorScope) -> StoreResult<Timestamp> {
        Ok(self.read_raw(scope)?.unwrap_or_else(Timestamp::epoch))
    }

    /// Moves the cursor to `candidate` if it is newer; returns whether it moved.
    pub fn advance(&self, scope: &CursorScope, candidate: &Timestamp) -> StoreResult<bool> {
        let mut batch = WriteBatch::new();
        let moved = self.stage_advance(&mut batch, scope, candidate)?;
        self.store.commit(batch)?;
        Ok(moved)
    }

    /// Like [`CursorRegistry::advance`], but stages the write in `batch`
    /// so it lands in the same frame as the rows it accounts for.
    pub fn stage_advance(
        &self,
        batch: &mut WriteBatch,
        scope: &CursorScope,
        candidate: &Timestamp,
    ) -> StoreResult<bool> {
        let current = self.read(scope)?;
        if *candidate <= current {
            return Ok(false);
        }
        debug!(scope = %MetaKey::Cursor(scope.clone()), from = %current, to = %candidate, "advancing cursor");
        batch.set_meta(&MetaKey::Cursor(scope.clone()), candidate.as_str());
        Ok(true)
    }

    /// Every stored cursor, ordered by key.
    pub fn list(&self) -> StoreResult<Vec<(CursorScope, Timestamp)>> {
        Ok(self
            .store
            .meta_entries()?
            .into_iter()
            .filter_map(|(key, value)| match key {
                MetaKey::Cursor(scope) => Some((scope, Timestamp::from(value))),
                MetaKey::SelfUserId => None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::new(s)
    }

    #[test]
    fn absent_cursor_reads_as_epoch() {
        let store = LocalStore::open_in_memory().unwrap();
        let cursors = CursorRegistry::new(&store);
        let scope = CursorScope::entries("u");

        assert_eq!(cursors.read_raw(&scope).unwrap(), None);
        assert_eq!(cursors.read(&scope).unwrap(), Timestamp::epoch());
    }

    #[test]
    fn advance_only_moves_forward() {
        let store = LocalStore::open_in_memory().unwrap();
        let cursors = CursorRegistry::new(&store);
        let scope = CursorScope::entries("u");

        assert!(cursors.advance(&scope, &ts("2024-01-03T00:00:00Z")).unwrap());
        assert!(!cursors.advance(&scope, &ts("2024-01-01T00:00:00Z")).unwrap());
        assert!(!cursors.advance(&scope, &ts("2024-01-03T00:00:00Z")).unwrap());
        assert_eq!(cursors.read(&scope).unwrap(), ts("2024-01-03T00:00:00Z"));
    }

    #[test]
    fn scopes_are_independent() {
        let store = LocalStore::open_in_memory().unwrap();
        let cursors = CursorRegistry::new(&store);

        cursors
            .advance(&CursorScope::entries("a"), &ts("2024-02-01T00:00:00Z"))
            .unwrap();
        assert_eq!(
            cursors.read(&CursorScope::entries("b")).unwrap(),
            Timestamp::epoch()
        );
        assert_eq!(
            cursors.read(&CursorScope::own_entries("a")).unwrap(),
            Timestamp::epoch()
        );
        assert_eq!(cursors.list().unwrap().len(), 1);
    }

    #[test]
    fn staged_advance_is_invisible_until_commit() {
        let store = LocalStore::open_in_memory().unwrap();
        let cursors = CursorRegistry::new(&store);
        let scope = CursorScope::own_entries("me");

        let mut batch = WriteBatch::new();
        assert!(cursors
            .stage_advance(&mut batch, &scope, &ts("2024-05-05T00:00:00Z"))
            .unwrap());
        assert_eq!(cursors.read_raw(&scope).unwrap(), None);

        store.commit(batch).unwrap();
        assert_eq!(
            cursors.read_raw(&scope).unwrap(),
            Some(ts("2024-05-05T00:00:00Z"))
        );
    }

    proptest! {
        #[test]
        fn cursor_ends_at_running_max(days in proptest::collection::vec(1u32..28, 0..20)) {
            let store = LocalStore::open_in_memory().unwrap();
            let cursors = CursorRegistry::new(&store);
            let scope = CursorScope::entries("u");

            let stamps: Vec<Timestamp> = days
                .iter()
                .map(|d| ts(&format!("2024-03-{d:02}T00:00:00Z")))
                .collect();
            for stamp in &stamps {
                cursors.advance(&scope, stamp).unwrap();
            }

            let expected = stamps.into_iter().fold(Timestamp::epoch(), Timestamp::max_with);
            prop_assert_eq!(cursors.read(&scope).unwrap(), expected);
        }
    }
}
