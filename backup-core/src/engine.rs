//! Entry points used by front-ends.
//!
//! [`BackupEngine`] owns the state store handle and the scan/staleness
//! settings, and exposes one call per user-facing operation.

use crate::config::Config;
use crate::executor::{BackupExecutor, RunOutcome};
use crate::fs::walker::WalkOptions;
use crate::staleness::{self, StalenessReport, DEFAULT_ALERT_THRESHOLD_DAYS};
use crate::store::{BackupRun, BackupType, StateStore};
use crate::Result;
use std::path::Path;

pub struct BackupEngine {
    store: StateStore,
    walk: WalkOptions,
    alert_threshold_days: i64,
}

impl BackupEngine {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            walk: WalkOptions::default(),
            alert_threshold_days: DEFAULT_ALERT_THRESHOLD_DAYS,
        }
    }

    /// Open the configured store and apply the scan and staleness settings.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = StateStore::open(&config.store.db_path)?;
        Ok(Self::with_settings(store, config))
    }

    /// Like [`from_config`](Self::from_config), over a read-only store.
    /// Enough for `history` and `check_staleness`; runs fail with a storage
    /// error.
    pub fn open_read_only(config: &Config) -> Result<Self> {
        let store = StateStore::open_read_only(&config.store.db_path)?;
        Ok(Self::with_settings(store, config))
    }

    fn with_settings(store: StateStore, config: &Config) -> Self {
        Self {
            store,
            walk: WalkOptions {
                follow_links: config.scan.follow_links,
                exclude_patterns: config.scan.exclude_patterns.clone(),
                prune: Vec::new(),
            },
            alert_threshold_days: config.staleness.alert_threshold_days,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    fn executor(&self) -> BackupExecutor<'_> {
        BackupExecutor::new(&self.store).walk_options(self.walk.clone())
    }

    /// Run `backup_type`, returning the run plus per-file failures.
    pub fn run(&self, backup_type: BackupType, source: &Path, dest: &Path) -> Result<RunOutcome> {
        self.executor().execute(backup_type, source, dest)
    }

    pub fn run_full_backup(&self, source: &Path, dest: &Path) -> Result<BackupRun> {
        Ok(self.run(BackupType::Full, source, dest)?.run)
    }

    pub fn run_smart_backup(&self, source: &Path, dest: &Path) -> Result<BackupRun> {
        Ok(self.run(BackupType::Smart, source, dest)?.run)
    }

    pub fn run_clean_backup(&self, source: &Path, dest: &Path) -> Result<BackupRun> {
        Ok(self.run(BackupType::Clean, source, dest)?.run)
    }

    /// Recorded runs, oldest first.
    pub fn history(&self) -> Result<Vec<BackupRun>> {
        self.store.list_backup_runs()
    }

    pub fn check_staleness(&self) -> Result<StalenessReport> {
        staleness::check_staleness(&self.store, self.alert_threshold_days)
    }
}
