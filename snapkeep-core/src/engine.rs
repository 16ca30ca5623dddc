//! Retention engine: initialize, rotate, and report time since last run.
//!
//! # Rotation pipeline
//!
//! A rotation is a sequence of filesystem steps with no rollback. A failing
//! step aborts the rest and earlier steps stay applied; the next rotation is
//! expected to pick up from whatever state is on disk.
//!
//! 1. discover dated directories tier by tier (read-only)
//! 2. decide whether the rotation delay suppresses a new snapshot (read-only)
//! 3. recreate `current` from `.tmp` (idempotent)
//! 4. create the timestamped snapshot from `current` (guarded by an
//!    existence check, never repeated for the same minute)
//! 5. record `last_run` in memory
//! 6. prune `initial → day → month → year`, feeding each tier's surviving
//!    groups into the next coarser tier

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Duration, Months, Utc};

use crate::error::{io_err, RotateError};
use crate::linkcopy::{self, LinkCopy};
use crate::registry::Registry;
use crate::settings::Settings;
use crate::template::TimeTemplate;
use crate::types::{BackupSet, BackupSetConfig, Tier, TierLists, WORKING_DIR};
use crate::walker::find_matches;

/// Outcome of one rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationReport {
    pub completed_at: DateTime<Utc>,
    /// New timestamped snapshot, relative to the set root.
    pub snapshot: Option<PathBuf>,
    /// Whether the rotation delay suppressed the new snapshot.
    pub delayed: bool,
    /// Paths deleted while pruning, relative to the set root.
    pub removed: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct Rotator {
    settings: Settings,
    template: TimeTemplate,
    copier: Box<dyn LinkCopy>,
    registry: Registry,
}

impl Rotator {
    pub fn new(settings: Settings) -> Result<Self, RotateError> {
        let copier = linkcopy::from_kind(settings.link_copy);
        Self::with_copier(settings, copier)
    }

    pub fn with_copier(settings: Settings, copier: Box<dyn LinkCopy>) -> Result<Self, RotateError> {
        settings.validate()?;
        let template = TimeTemplate::parse(&settings.time_template)?;
        Ok(Self {
            settings,
            template,
            copier,
            registry: Registry::new(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn template(&self) -> &TimeTemplate {
        &self.template
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Initialize
    // -----------------------------------------------------------------------

    /// Register `config` on first use and return the working directory.
    ///
    /// Later calls for the same name must present the same compatibility
    /// key; the rest of their configuration is ignored.
    pub fn initialize(&self, config: &BackupSetConfig) -> Result<PathBuf, RotateError> {
        validate_name(&config.name)?;
        let (handle, created) = self.registry.get_or_insert_with(&config.name, || {
            BackupSet::new(config.clone(), &self.settings.backup_dir)
        });
        let set = handle.lock();
        if !created {
            check_key(&set, config)?;
        }

        let working = set.working_dir();
        std::fs::create_dir_all(&working).map_err(|e| io_err(&working, e))?;
        if created {
            tracing::info!(name = %config.name, root = %set.root.display(), "backup set registered");
        }
        Ok(working)
    }

    // -----------------------------------------------------------------------
    // Time since last run
    // -----------------------------------------------------------------------

    pub fn time_since_last_run(&self, config: &BackupSetConfig) -> Result<Duration, RotateError> {
        self.time_since_last_run_at(config, Utc::now())
    }

    /// Elapsed time since the last rotation, as seen at `now`.
    ///
    /// Without an in-memory record the newest `initial` snapshot on disk is
    /// used; with no snapshot at all the elapsed time is counted from the
    /// Unix epoch so the set reads as long overdue.
    pub fn time_since_last_run_at(
        &self,
        config: &BackupSetConfig,
        now: DateTime<Utc>,
    ) -> Result<Duration, RotateError> {
        validate_name(&config.name)?;

        let last_run = match self.registry.get(&config.name) {
            Some(handle) => {
                let mut set = handle.lock();
                check_key(&set, config)?;
                if set.last_run.is_none() {
                    set.last_run = latest_snapshot(&self.template, &set.root)?;
                }
                set.last_run
            }
            None => {
                let transient = BackupSet::new(config.clone(), &self.settings.backup_dir);
                latest_snapshot(&self.template, &transient.root)?
            }
        };

        let since = last_run.unwrap_or_else(|| DateTime::<Utc>::from(std::time::UNIX_EPOCH));
        Ok((now - since).max(Duration::zero()))
    }

    // -----------------------------------------------------------------------
    // Rotate
    // -----------------------------------------------------------------------

    pub fn rotate(&self, config: &BackupSetConfig) -> Result<RotationReport, RotateError> {
        self.rotate_at(config, Utc::now())
    }

    /// Run one rotation as if the clock read `now`.
    pub fn rotate_at(
        &self,
        config: &BackupSetConfig,
        now: DateTime<Utc>,
    ) -> Result<RotationReport, RotateError> {
        validate_name(&config.name)?;
        let handle = self
            .registry
            .get(&config.name)
            .ok_or_else(|| RotateError::UnknownSet {
                name: config.name.clone(),
            })?;
        let mut set = handle.lock();
        check_key(&set, config)?;

        tracing::info!(name = %config.name, "rotation started");
        match self.rotate_locked(&mut set, now) {
            Ok(report) => {
                tracing::info!(
                    name = %config.name,
                    snapshot = ?report.snapshot,
                    delayed = report.delayed,
                    removed = report.removed.len(),
                    "rotation completed",
                );
                Ok(report)
            }
            Err(err) => {
                tracing::error!(name = %config.name, error = %err, "rotation aborted");
                Err(err)
            }
        }
    }

    fn rotate_locked(
        &self,
        set: &mut BackupSet,
        now: DateTime<Utc>,
    ) -> Result<RotationReport, RotateError> {
        let root = set.root.clone();

        set.tiers = discover(&self.template, &root)?;

        let delayed = self.is_delayed(set, now)?;

        let working = root.join(WORKING_DIR);
        let current = root.join(&self.settings.current_snapshot);
        remove_tree(&current)?;
        self.copier.copy(&working, &current)?;

        let mut snapshot = None;
        if delayed {
            tracing::info!(name = %set.name(), "rotation delay active, no new snapshot");
        } else {
            let relative = self.template.format(now);
            let target = root.join(&relative);
            if target.symlink_metadata().is_ok() {
                return Err(RotateError::Conflict { path: target });
            }
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
            self.copier.copy(&current, &target)?;
            set.tiers.initial.add(relative.clone());
            snapshot = Some(relative);
        }

        set.last_run = Some(now);

        let mut removed = Vec::new();
        for tier in Tier::PRUNE_ORDER {
            let cutoff = expiration_cutoff(tier, set.config.durations.get(tier), now)?;
            let survivors = collapse(
                &self.template,
                &root,
                set.tiers.get(tier).paths(),
                cutoff,
                &mut removed,
            )?;
            if let Some(coarser) = tier.coarser() {
                set.tiers.get_mut(coarser).extend(survivors.into_keys());
            }
        }

        Ok(RotationReport {
            completed_at: now,
            snapshot,
            delayed,
            removed,
        })
    }

    fn is_delayed(&self, set: &BackupSet, now: DateTime<Utc>) -> Result<bool, RotateError> {
        let config = &set.config;
        if config.rotation_delay <= config.frequency {
            return Ok(false);
        }
        let threshold = now - Duration::minutes(i64::from(config.rotation_delay));
        for path in set.tiers.initial.paths() {
            if self.template.parse_path(path)? > threshold {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

// ---------------------------------------------------------------------------
// Pipeline steps
// ---------------------------------------------------------------------------

/// Find every dated directory under `root`, coarsest tier first.
///
/// Each finer tier is only searched for beneath matches of the coarser one.
pub fn discover(template: &TimeTemplate, root: &Path) -> Result<TierLists, RotateError> {
    let mut tiers = TierLists::default();
    tiers
        .year
        .extend(find_matches(root, Path::new(""), template.pattern(Tier::Year))?);

    for tier in Tier::DISCOVERY_ORDER.into_iter().skip(1) {
        let parent_tier = tier.coarser().unwrap_or(Tier::Year);
        let parents = tiers.get(parent_tier).paths().to_vec();
        for parent in parents {
            let found = find_matches(root, &parent, template.pattern(tier))?;
            tiers.get_mut(tier).extend(found);
        }
    }
    Ok(tiers)
}

/// Instant before which a path of `tier` counts as expired.
///
/// `initial` counts days, `day` and `month` count calendar months, `year`
/// counts years.
pub fn expiration_cutoff(
    tier: Tier,
    duration: u32,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, RotateError> {
    let cutoff = match tier {
        Tier::Initial => now.checked_sub_signed(Duration::days(i64::from(duration))),
        Tier::Day | Tier::Month => now.checked_sub_months(Months::new(duration)),
        Tier::Year => duration
            .checked_mul(12)
            .and_then(|months| now.checked_sub_months(Months::new(months))),
    };
    cutoff.ok_or(RotateError::DurationOutOfRange { tier: tier.name() })
}

/// Collapse expired paths that share a parent into the newest one.
///
/// Returns the kept path per parent directory. Paths at or after `cutoff`
/// are left alone.
fn collapse(
    template: &TimeTemplate,
    root: &Path,
    paths: &[PathBuf],
    cutoff: DateTime<Utc>,
    removed: &mut Vec<PathBuf>,
) -> Result<BTreeMap<PathBuf, PathBuf>, RotateError> {
    let mut kept: BTreeMap<PathBuf, (PathBuf, DateTime<Utc>)> = BTreeMap::new();

    for path in paths {
        let date = template.parse_path(path)?;
        if date >= cutoff {
            continue;
        }
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let Some(current) = kept.get_mut(&parent) else {
            kept.insert(parent, (path.clone(), date));
            continue;
        };
        if current.0 == *path {
            continue;
        }
        let doomed = if current.1 < date {
            std::mem::replace(current, (path.clone(), date)).0
        } else {
            path.clone()
        };
        remove_tree(&root.join(&doomed))?;
        tracing::debug!(path = %doomed.display(), "pruned snapshot");
        removed.push(doomed);
    }

    Ok(kept
        .into_iter()
        .map(|(parent, (path, _))| (parent, path))
        .collect())
}

/// Newest `initial` snapshot under `root`, if any.
fn latest_snapshot(
    template: &TimeTemplate,
    root: &Path,
) -> Result<Option<DateTime<Utc>>, RotateError> {
    let mut latest = None;
    for path in find_matches(root, Path::new(""), template.pattern(Tier::Initial))? {
        let date = template.parse_path(&path)?;
        if latest.map_or(true, |seen| date > seen) {
            latest = Some(date);
        }
    }
    Ok(latest)
}

fn remove_tree(path: &Path) -> Result<(), RotateError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(path, err)),
    }
}

fn validate_name(name: &str) -> Result<(), RotateError> {
    if name.is_empty() {
        return Err(RotateError::EmptyName);
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.starts_with('.') => Ok(()),
        _ => Err(RotateError::InvalidName {
            name: name.to_string(),
        }),
    }
}

fn check_key(set: &BackupSet, config: &BackupSetConfig) -> Result<(), RotateError> {
    if set.config.compatibility_key != config.compatibility_key {
        return Err(RotateError::Incompatible {
            name: config.name.clone(),
        });
    }
    Ok(())
}

/// Render an elapsed duration rounded to whole seconds, e.g. `26h3m9s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.num_milliseconds().max(0);
    let total = (millis + 500) / 1000;
    let (hours, minutes, seconds) = (total / 3600, total % 3600 / 60, total % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}
