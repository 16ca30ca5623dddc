//! Daemon settings: backup root, pointer directory name, time template.
//!
//! Every field has a default so an absent or partial YAML file is valid:
//!
//! ```yaml
//! backup_dir: /backup
//! current_snapshot: current
//! time_template: "/%Y/%B/%-d/%H%MZ"
//! socket_path: /tmp/snapkeep.sock   # optional; the daemon's well-known path when absent
//! link_copy: cp
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, RotateError};
use crate::template::TimeTemplate;

pub const DEFAULT_BACKUP_DIR: &str = "/backup";
pub const DEFAULT_CURRENT_SNAPSHOT: &str = "current";
pub const DEFAULT_TIME_TEMPLATE: &str = "/%Y/%B/%-d/%H%MZ";

/// Which hardlink-copy primitive the engine shells out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinkCopyKind {
    /// External `cp -al`.
    #[default]
    Cp,
    /// In-process tree recreation with `std::fs::hard_link`.
    Native,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backup_dir: PathBuf,
    pub current_snapshot: String,
    pub time_template: String,
    /// Overrides the daemon's well-known socket location.
    pub socket_path: Option<PathBuf>,
    pub link_copy: LinkCopyKind,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from(DEFAULT_BACKUP_DIR),
            current_snapshot: DEFAULT_CURRENT_SNAPSHOT.to_string(),
            time_template: DEFAULT_TIME_TEMPLATE.to_string(),
            socket_path: None,
            link_copy: LinkCopyKind::default(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file and validate them.
    pub fn load(path: &Path) -> Result<Self, RotateError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let settings: Settings =
            serde_yaml::from_str(&contents).map_err(|source| RotateError::Settings {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the engine could not run with.
    pub fn validate(&self) -> Result<(), RotateError> {
        TimeTemplate::parse(&self.time_template)?;
        if self.current_snapshot.is_empty() || self.current_snapshot.contains('/') {
            return Err(RotateError::Template {
                template: self.time_template.clone(),
                reason: format!(
                    "current snapshot name '{}' must be a single directory name",
                    self.current_snapshot
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        Settings::default().validate().expect("defaults validate");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("snapkeep.yaml");
        std::fs::write(&path, "backup_dir: /srv/backup\nlink_copy: native\n").expect("write");

        let settings = Settings::load(&path).expect("load");
        assert_eq!(settings.backup_dir, PathBuf::from("/srv/backup"));
        assert_eq!(settings.link_copy, LinkCopyKind::Native);
        assert_eq!(settings.current_snapshot, DEFAULT_CURRENT_SNAPSHOT);
        assert_eq!(settings.time_template, DEFAULT_TIME_TEMPLATE);
        assert_eq!(settings.socket_path, None);
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("snapkeep.yaml");
        std::fs::write(&path, "backup_dir: [unclosed").expect("write");

        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, RotateError::Settings { .. }), "got: {err}");
        assert!(err.to_string().contains("snapkeep.yaml"));
    }

    #[test]
    fn three_component_template_is_rejected() {
        let settings = Settings {
            time_template: "/%Y/%m/%d".to_string(),
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(RotateError::Template { .. })
        ));
    }
}
