// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed `ConfigStore` for Atrium hosts (uses platform config dir).

use atrium_app_core::config::{ConfigError, ConfigStore};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/// Store configs as JSON files under a base directory.
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Create a store rooted at the user config directory (e.g., `~/.config/Atrium`).
    pub fn new() -> Result<Self, ConfigError> {
        let proj = ProjectDirs::from("dev", "flyingrobots", "Atrium")
            .ok_or_else(|| ConfigError::Other("could not resolve config dir".into()))?;
        Self::at(proj.config_dir())
    }

    /// Create a store rooted at an explicit directory (created if missing).
    pub fn at(base: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Directory holding the config files.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use atrium_app_core::config::ConfigService;
    use atrium_app_core::config_port::ConfigPort;
    use atrium_app_core::prefs::SyncPrefs;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("atrium-config-fs-{name}-{}", std::process::id()))
    }

    #[test]
    fn missing_file_is_not_found() {
        let store = FsConfigStore::at(scratch_dir("missing")).unwrap();
        assert!(matches!(store.load_raw("nope"), Err(ConfigError::NotFound)));
    }

    #[test]
    fn prefs_round_trip_through_disk() {
        let dir = scratch_dir("prefs");
        let svc = ConfigService::new(FsConfigStore::at(&dir).unwrap());
        let prefs = SyncPrefs {
            api_base_url: Some("https://api.example.test".into()),
            ..SyncPrefs::default()
        };
        svc.save_prefs(&prefs);
        assert!(dir.join("sync.json").exists());
        assert_eq!(svc.load_prefs(), Some(prefs));
        let _ = fs::remove_dir_all(dir);
    }
}
