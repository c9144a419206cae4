// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config port shared across Atrium hosts (CLI, embedders).

use crate::config::{ConfigService, ConfigStore};
use crate::prefs::SyncPrefs;
use tracing::warn;

/// Key under which sync preferences are stored.
pub const SYNC_PREFS_KEY: &str = "sync";

/// Config-facing port for loading/saving sync preferences.
pub trait ConfigPort {
    /// Load sync preferences (returns None if missing or unreadable).
    fn load_prefs(&self) -> Option<SyncPrefs>;
    /// Persist sync preferences (best-effort; failures are logged).
    fn save_prefs(&self, prefs: &SyncPrefs);
}

impl<S> ConfigPort for ConfigService<S>
where
    S: ConfigStore,
{
    fn load_prefs(&self) -> Option<SyncPrefs> {
        match self.load::<SyncPrefs>(SYNC_PREFS_KEY) {
            Ok(prefs) => prefs,
            Err(err) => {
                warn!(%err, key = SYNC_PREFS_KEY, "could not load sync prefs");
                None
            }
        }
    }

    fn save_prefs(&self, prefs: &SyncPrefs) {
        if let Err(err) = self.save(SYNC_PREFS_KEY, prefs) {
            warn!(%err, key = SYNC_PREFS_KEY, "could not save sync prefs");
        }
    }
}
