//! The device's own profile.

use crate::entity::User;
use crate::error::StoreResult;
use crate::meta::MetaKey;
use crate::store::{LocalStore, WriteBatch};
use crate::types::{new_id, Timestamp};
use tracing::info;

impl LocalStore {
    /// Returns the device's profile, creating it on first use.
    ///
    /// Exactly one self profile exists per store; `label` only applies
    /// when it is created.
    pub fn get_or_create_self_profile(&self, label: &str) -> StoreResult<User> {
        if let Some(profile) = self.self_profile()? {
            return Ok(profile);
        }

        let profile = User {
            id: new_id(),
            label: Some(label.to_string()),
            created_at: Some(Timestamp::now()),
            attributes: Default::default(),
        };
        let mut batch = WriteBatch::new();
        batch.put(&profile)?;
        batch.set_meta(&MetaKey::SelfUserId, profile.id.as_str());
        self.commit(batch)?;

        info!(user_id = %profile.id, "created device profile");
        Ok(profile)
    }

    /// The device's profile, if one was created.
    pub fn self_profile(&self) -> StoreResult<Option<User>> {
        match self.meta(&MetaKey::SelfUserId)? {
            Some(id) => self.get::<User>(&id),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_is_created_once() {
        let store = LocalStore::open_in_memory().unwrap();
        assert!(store.self_profile().unwrap().is_none());

        let first = store.get_or_create_self_profile("Phone").unwrap();
        let second = store.get_or_create_self_profile("Other label").unwrap();

        assert_eq!(first, second);
        assert_eq!(second.label.as_deref(), Some("Phone"));
        assert_eq!(store.count::<User>(), 1);
    }

    #[test]
    fn profile_survives_user_cache_refresh() {
        let store = LocalStore::open_in_memory().unwrap();
        let me = store.get_or_create_self_profile("Phone").unwrap();

        store
            .cache_users(&[User {
                id: "someone-else".into(),
                label: Some("Else".into()),
                created_at: None,
                attributes: Default::default(),
            }])
            .unwrap();
        assert_eq!(store.self_profile().unwrap(), Some(me));
    }
}
