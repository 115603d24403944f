//! Evaluation-scoped memoization of repository lookups.
//!
//! A [`SessionCache`] is created at the start of an evaluation session (e.g., one inbound
//! request), shared by reference with everything evaluating toggles for that session, and dropped
//! at the end. There is no expiry: call [`SessionCache::clear`] whenever settings may have
//! changed.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::settings::{ClientSetting, GlobalSetting};

#[derive(Default)]
struct CacheState {
    global_settings: Option<Arc<[GlobalSetting]>>,
    /// Keyed by lower-cased client uuid.
    client_settings: HashMap<String, Arc<[ClientSetting]>>,
}

/// Thread-safe (`Sync`) session cache. All access is serialized through a single mutex.
#[derive(Default)]
pub struct SessionCache {
    state: Mutex<CacheState>,
}

impl SessionCache {
    pub fn new() -> Self {
        SessionCache::default()
    }

    /// All global settings, or `None` if they haven't been loaded in this session yet.
    pub fn global_settings(&self) -> Option<Arc<[GlobalSetting]>> {
        self.state().global_settings.clone()
    }

    pub fn set_global_settings(&self, settings: Vec<GlobalSetting>) -> Arc<[GlobalSetting]> {
        let settings: Arc<[GlobalSetting]> = settings.into();
        self.state().global_settings = Some(settings.clone());
        settings
    }

    /// All client settings of `client_uuid`, or `None` if they haven't been loaded yet.
    pub fn client_settings(&self, client_uuid: &str) -> Option<Arc<[ClientSetting]>> {
        self.state()
            .client_settings
            .get(&cache_key(client_uuid))
            .cloned()
    }

    pub fn set_client_settings(
        &self,
        client_uuid: &str,
        settings: Vec<ClientSetting>,
    ) -> Arc<[ClientSetting]> {
        let settings: Arc<[ClientSetting]> = settings.into();
        self.state()
            .client_settings
            .insert(cache_key(client_uuid), settings.clone());
        settings
    }

    /// Record a freshly written client setting, replacing the cached row for the same feature.
    ///
    /// Does nothing if the client's settings haven't been loaded, so a later lookup still goes
    /// to the repository and sees every row.
    pub fn store_client_setting(&self, setting: &ClientSetting) {
        let mut state = self.state();
        let Some(current) = state.client_settings.get_mut(&cache_key(&setting.client_uuid)) else {
            return;
        };

        let mut updated: Vec<ClientSetting> = current
            .iter()
            .filter(|cs| cs.global_setting_id != setting.global_setting_id)
            .cloned()
            .collect();
        updated.push(setting.clone());
        *current = updated.into();
    }

    /// Forget everything loaded so far.
    pub fn clear(&self) {
        let mut state = self.state();
        state.global_settings = None;
        state.client_settings.clear();
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        // Poisoning would require a panic while holding the lock, and no code path under the lock
        // can panic.
        self.state
            .lock()
            .expect("thread holding session cache lock should not panic")
    }
}

fn cache_key(client_uuid: &str) -> String {
    client_uuid.to_lowercase()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::SessionCache;
    use crate::{
        settings::{ClientSetting, GlobalSetting},
        status::{ClientStatus, GlobalStatus},
    };

    fn client_setting(id: i64, global_setting_id: i64, status: ClientStatus) -> ClientSetting {
        ClientSetting {
            id,
            client_uuid: "U1".to_owned(),
            global_setting_id,
            status,
            extra_data: None,
        }
    }

    #[test]
    fn starts_empty_and_clears() {
        let cache = SessionCache::new();
        assert!(cache.global_settings().is_none());
        assert!(cache.client_settings("u1").is_none());

        cache.set_global_settings(vec![GlobalSetting {
            id: 1,
            name: "search".to_owned(),
            status: GlobalStatus::Enabled,
            extra_data: None,
        }]);
        cache.set_client_settings("u1", vec![]);
        assert_eq!(cache.global_settings().unwrap().len(), 1);
        assert!(cache.client_settings("U1").is_some());

        cache.clear();
        assert!(cache.global_settings().is_none());
        assert!(cache.client_settings("u1").is_none());
    }

    #[test]
    fn stores_written_client_setting() {
        let cache = SessionCache::new();

        // not loaded yet: nothing to patch
        cache.store_client_setting(&client_setting(1, 7, ClientStatus::Whitelisted));
        assert!(cache.client_settings("u1").is_none());

        cache.set_client_settings("u1", vec![client_setting(1, 7, ClientStatus::Whitelisted)]);
        cache.store_client_setting(&client_setting(1, 7, ClientStatus::Blacklisted));
        cache.store_client_setting(&client_setting(2, 8, ClientStatus::Whitelisted));

        let settings = cache.client_settings("u1").unwrap();
        assert_eq!(settings.len(), 2);
        assert!(settings
            .iter()
            .any(|cs| cs.global_setting_id == 7 && cs.is_blacklisted()));
    }

    #[test]
    fn can_be_shared_between_threads() {
        let cache = Arc::new(SessionCache::new());

        std::thread::scope(|scope| {
            for i in 0..4 {
                let cache = &cache;
                scope.spawn(move || {
                    cache.set_client_settings(&format!("client-{i}"), vec![]);
                });
            }
        });

        for i in 0..4 {
            assert!(cache.client_settings(&format!("client-{i}")).is_some());
        }
    }
}
