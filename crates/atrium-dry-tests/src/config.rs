// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory config store fake for testing without filesystem I/O.

use atrium_app_core::config::{ConfigError, ConfigStore};
use atrium_app_core::config_port::SYNC_PREFS_KEY;
use atrium_app_core::prefs::SyncPrefs;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// In-memory implementation of [`ConfigStore`] for testing.
///
/// Clones share state, so a test can keep one handle for assertions while
/// the service under test owns the other. Failures can be injected per
/// direction; attempts are counted whether or not they fail.
///
/// # Example
///
/// ```
/// use atrium_dry_tests::InMemoryConfigStore;
/// use atrium_app_core::config::ConfigService;
/// use atrium_app_core::config_port::ConfigPort;
/// use atrium_app_core::prefs::SyncPrefs;
///
/// let store = InMemoryConfigStore::new();
/// let service = ConfigService::new(store.clone());
/// service.save_prefs(&SyncPrefs::default());
/// assert_eq!(store.save_count(), 1);
/// assert_eq!(service.load_prefs(), Some(SyncPrefs::default()));
/// ```
#[derive(Clone, Default)]
pub struct InMemoryConfigStore {
    inner: Rc<RefCell<Inner>>,
}

#[derive(Default)]
struct Inner {
    data: HashMap<String, Vec<u8>>,
    load_count: usize,
    save_count: usize,
    fail_on_load: bool,
    fail_on_save: bool,
}

impl InMemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `prefs` under the sync prefs key.
    pub fn with_prefs(prefs: &SyncPrefs) -> Result<Self, ConfigError> {
        let store = Self::new();
        let data = serde_json::to_vec_pretty(prefs)?;
        store
            .inner
            .borrow_mut()
            .data
            .insert(SYNC_PREFS_KEY.to_string(), data);
        Ok(store)
    }

    /// Store raw bytes under `key` without counting a save.
    pub fn seed(&self, key: &str, data: &[u8]) {
        self.inner
            .borrow_mut()
            .data
            .insert(key.to_string(), data.to_vec());
    }

    /// Make every subsequent load fail.
    pub fn set_fail_on_load(&self, fail: bool) {
        self.inner.borrow_mut().fail_on_load = fail;
    }

    /// Make every subsequent save fail.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.inner.borrow_mut().fail_on_save = fail;
    }

    /// Load attempts so far.
    pub fn load_count(&self) -> usize {
        self.inner.borrow().load_count
    }

    /// Save attempts so far.
    pub fn save_count(&self) -> usize {
        self.inner.borrow().save_count
    }

    /// True when `key` holds data.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.borrow().data.contains_key(key)
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let mut inner = self.inner.borrow_mut();
        inner.load_count += 1;
        if inner.fail_on_load {
            return Err(ConfigError::Other("simulated load failure".into()));
        }
        inner.data.get(key).cloned().ok_or(ConfigError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let mut inner = self.inner.borrow_mut();
        inner.save_count += 1;
        if inner.fail_on_save {
            return Err(ConfigError::Other("simulated save failure".into()));
        }
        inner.data.insert(key.to_string(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use atrium_app_core::config::ConfigService;
    use atrium_app_core::config_port::ConfigPort;

    #[test]
    fn seeded_prefs_load_through_the_port() {
        let prefs = SyncPrefs {
            transaction_timeout_ms: 50,
            ..SyncPrefs::default()
        };
        let store = InMemoryConfigStore::with_prefs(&prefs).unwrap();
        let service = ConfigService::new(store.clone());
        assert_eq!(service.load_prefs(), Some(prefs));
        assert_eq!(store.load_count(), 1);
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn failed_save_is_counted_but_not_stored() {
        let store = InMemoryConfigStore::new();
        store.set_fail_on_save(true);
        let service = ConfigService::new(store.clone());
        service.save_prefs(&SyncPrefs::default());
        assert_eq!(store.save_count(), 1);
        assert!(!store.contains_key(SYNC_PREFS_KEY));
    }

    #[test]
    fn unreadable_prefs_fall_back_to_none() {
        let store = InMemoryConfigStore::new();
        store.seed(SYNC_PREFS_KEY, b"[]");
        let service = ConfigService::new(store.clone());
        assert_eq!(service.load_prefs(), None);
        store.set_fail_on_load(true);
        assert_eq!(service.load_prefs(), None);
        assert_eq!(store.load_count(), 2);
    }
}
