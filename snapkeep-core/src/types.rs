//! Domain types for backup sets and their retention tiers.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

/// One of the four retention granularities, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Year,
    Month,
    Day,
    Initial,
}

impl Tier {
    /// Discovery order: each tier is searched for beneath the previous one.
    pub const DISCOVERY_ORDER: [Tier; 4] = [Tier::Year, Tier::Month, Tier::Day, Tier::Initial];

    /// Prune order: survivors of each tier feed the next one.
    pub const PRUNE_ORDER: [Tier; 4] = [Tier::Initial, Tier::Day, Tier::Month, Tier::Year];

    /// Number of template components a path of this tier carries.
    pub fn depth(self) -> usize {
        match self {
            Tier::Year => 1,
            Tier::Month => 2,
            Tier::Day => 3,
            Tier::Initial => 4,
        }
    }

    /// The tier whose candidate list receives this tier's survivors.
    pub fn coarser(self) -> Option<Tier> {
        match self {
            Tier::Initial => Some(Tier::Day),
            Tier::Day => Some(Tier::Month),
            Tier::Month => Some(Tier::Year),
            Tier::Year => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Tier::Year => "year",
            Tier::Month => "month",
            Tier::Day => "day",
            Tier::Initial => "initial",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Configuration carried on the wire
// ---------------------------------------------------------------------------

/// Retention durations per tier.
///
/// Units differ per tier: `initial` is days, `day` and `month` are months,
/// `year` is years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TierDurations {
    pub initial: u32,
    pub day: u32,
    pub month: u32,
    pub year: u32,
}

impl TierDurations {
    pub fn get(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Initial => self.initial,
            Tier::Day => self.day,
            Tier::Month => self.month,
            Tier::Year => self.year,
        }
    }
}

/// Client-supplied description of a backup set.
///
/// Only `name` and `compatibility_key` are consulted after the first
/// `initialize` call for a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BackupSetConfig {
    pub name: String,
    pub compatibility_key: String,
    /// Overrides the daemon's default backup directory when set.
    pub backup_root: Option<PathBuf>,
    /// Expected cadence of rotations, in minutes.
    pub frequency: u32,
    /// Debounce window for new timestamped snapshots, in minutes.
    pub rotation_delay: u32,
    pub durations: TierDurations,
}

impl BackupSetConfig {
    pub fn named(name: impl Into<String>, compatibility_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            compatibility_key: compatibility_key.into(),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Engine state
// ---------------------------------------------------------------------------

/// Relative paths discovered for one tier during a rotation pass.
///
/// Every stored path matches the tier's own pattern; the list is rebuilt on
/// each rotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierPaths {
    paths: Vec<PathBuf>,
}

impl TierPaths {
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Append `path` unless it is already listed.
    pub fn add(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn extend<I: IntoIterator<Item = PathBuf>>(&mut self, paths: I) {
        for path in paths {
            self.add(path);
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}

/// Transient per-tier candidate lists, indexed by [`Tier`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierLists {
    pub year: TierPaths,
    pub month: TierPaths,
    pub day: TierPaths,
    pub initial: TierPaths,
}

impl TierLists {
    pub fn get(&self, tier: Tier) -> &TierPaths {
        match tier {
            Tier::Year => &self.year,
            Tier::Month => &self.month,
            Tier::Day => &self.day,
            Tier::Initial => &self.initial,
        }
    }

    pub fn get_mut(&mut self, tier: Tier) -> &mut TierPaths {
        match tier {
            Tier::Year => &mut self.year,
            Tier::Month => &mut self.month,
            Tier::Day => &mut self.day,
            Tier::Initial => &mut self.initial,
        }
    }
}

/// A registered backup set: configuration plus in-memory state.
#[derive(Debug, Clone)]
pub struct BackupSet {
    pub config: BackupSetConfig,
    /// `<backup root>/<name>`.
    pub root: PathBuf,
    pub tiers: TierLists,
    /// Completion time of the last rotation; `None` after a restart until recovered.
    pub last_run: Option<DateTime<Utc>>,
}

impl BackupSet {
    pub fn new(config: BackupSetConfig, default_backup_dir: &Path) -> Self {
        let root = config
            .backup_root
            .as_deref()
            .unwrap_or(default_backup_dir)
            .join(&config.name);
        Self {
            config,
            root,
            tiers: TierLists::default(),
            last_run: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Directory the client fills before asking for a rotation.
    pub fn working_dir(&self) -> PathBuf {
        self.root.join(WORKING_DIR)
    }
}

/// Name of the externally populated working snapshot directory.
pub const WORKING_DIR: &str = ".tmp";

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coarser_chain_ends_at_year() {
        let mut chain = vec![Tier::Initial];
        while let Some(next) = chain.last().and_then(|t| t.coarser()) {
            chain.push(next);
        }
        assert_eq!(chain, Tier::PRUNE_ORDER.to_vec());
    }

    #[test]
    fn tier_paths_ignore_duplicates() {
        let mut paths = TierPaths::default();
        paths.add("2024/March/14");
        paths.add("2024/March/14");
        paths.add("2024/March/15");
        assert_eq!(paths.paths().len(), 2);
        assert!(paths.contains(Path::new("2024/March/15")));
    }

    #[test]
    fn backup_root_override_wins() {
        let mut config = BackupSetConfig::named("db1", "v1");
        let set = BackupSet::new(config.clone(), Path::new("/backup"));
        assert_eq!(set.working_dir(), PathBuf::from("/backup/db1/.tmp"));

        config.backup_root = Some(PathBuf::from("/srv/snap"));
        let set = BackupSet::new(config, Path::new("/backup"));
        assert_eq!(set.root, PathBuf::from("/srv/snap/db1"));
    }

    #[test]
    fn tier_display() {
        assert_eq!(Tier::Initial.to_string(), "initial");
        assert_eq!(Tier::Year.to_string(), "year");
    }
}
