use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PrefsError;

/// The two persisted user toggles, stored as a small JSON object keyed by
/// field name. Every mutation in the scheduler is written back immediately.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Prefs {
    pub enabled: bool,
    pub allow_world_notifications: bool,
}

impl Default for Prefs {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_world_notifications: true,
        }
    }
}

/// Reads and writes [`Prefs`] at a fixed per-user path.
#[derive(Clone, Debug)]
pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the preferences, falling back to defaults when the file is
    /// missing, unreadable, or structurally invalid. The fallback is written
    /// straight back out so the file heals itself; a failed heal is logged
    /// and the defaults are still returned.
    pub fn load(&self) -> Prefs {
        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<Prefs>(&raw) {
                Ok(prefs) => {
                    debug!(path = %self.path.display(), ?prefs, "loaded preferences");
                    prefs
                }
                Err(err) => {
                    warn!(
                        path = %self.path.display(),
                        error = %err,
                        "preferences file is invalid; restoring defaults"
                    );
                    self.heal()
                }
            },
            Err(err) => {
                debug!(
                    path = %self.path.display(),
                    error = %err,
                    "preferences file not readable; writing defaults"
                );
                self.heal()
            }
        }
    }

    /// Serializes and replaces the file through a sibling temp file plus
    /// rename, so a concurrent load never observes a partial write.
    pub fn save(&self, prefs: &Prefs) -> Result<(), PrefsError> {
        let payload = serde_json::to_string_pretty(prefs)
            .map_err(|err| PrefsError::Serialize { source: err })?;

        let staging = self.staging_path();
        fs::write(&staging, payload).map_err(|err| PrefsError::Write {
            path: staging.clone(),
            source: err,
        })?;
        fs::rename(&staging, &self.path).map_err(|err| PrefsError::Replace {
            path: self.path.clone(),
            source: err,
        })
    }

    fn heal(&self) -> Prefs {
        let defaults = Prefs::default();
        if let Err(err) = self.save(&defaults) {
            warn!(
                path = %self.path.display(),
                error = %err,
                "could not write default preferences"
            );
        }
        defaults
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map_or_else(
            || std::ffi::OsString::from("prefs"),
            std::ffi::OsStr::to_os_string,
        );
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
