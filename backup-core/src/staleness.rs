//! Backup staleness check.
//!
//! Answers "is the last successful backup recent enough?" from the store
//! alone. Never writes, never takes the run lock, so it is safe to call while
//! a run is in progress.

use crate::store::{BackupType, StateStore};
use crate::Result;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// Days without a full or smart run before a backup counts as overdue.
pub const DEFAULT_ALERT_THRESHOLD_DAYS: i64 = 3;

/// Largest accepted threshold (about a century).
pub const MAX_ALERT_THRESHOLD_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StalenessStatus {
    Ok,
    Overdue,
    NoHistory,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StalenessReport {
    pub status: StalenessStatus,
    pub last_backup_date: Option<DateTime<Utc>>,
    /// Whole days elapsed since `last_backup_date`
    pub days_since: Option<i64>,
    /// `last_backup_date` plus the threshold; absent if that overflows
    pub next_check: Option<DateTime<Utc>>,
    pub threshold_days: i64,
}

impl StalenessReport {
    /// Days past the threshold, when overdue.
    pub fn days_overdue(&self) -> Option<i64> {
        match (self.status, self.days_since) {
            (StalenessStatus::Overdue, Some(days)) => Some(days - self.threshold_days),
            _ => None,
        }
    }
}

/// Classify `last_backup` as seen at `now`.
pub fn evaluate(
    last_backup: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold_days: i64,
) -> StalenessReport {
    let Some(last) = last_backup else {
        return StalenessReport {
            status: StalenessStatus::NoHistory,
            last_backup_date: None,
            days_since: None,
            next_check: None,
            threshold_days,
        };
    };

    let days_since = (now - last).num_days();
    let status = if days_since > threshold_days {
        StalenessStatus::Overdue
    } else {
        StalenessStatus::Ok
    };

    StalenessReport {
        status,
        last_backup_date: Some(last),
        days_since: Some(days_since),
        next_check: TimeDelta::try_days(threshold_days).and_then(|t| last.checked_add_signed(t)),
        threshold_days,
    }
}

/// Timestamp of the last successful full or smart run.
///
/// Prefers `last_backup_date`; falls back to the newest full/smart run row for
/// stores where the meta key was never written.
pub fn last_successful_backup(store: &StateStore) -> Result<Option<DateTime<Utc>>> {
    if let Some(date) = store.last_backup_date()? {
        return Ok(Some(date));
    }

    let latest = store.latest_backup_run(&[BackupType::Full, BackupType::Smart])?;
    if latest.is_none() {
        tracing::warn!("No backup history found");
    }
    Ok(latest.map(|run| run.timestamp))
}

/// Staleness of `store` as of `now`.
pub fn check_staleness_at(
    store: &StateStore,
    now: DateTime<Utc>,
    threshold_days: i64,
) -> Result<StalenessReport> {
    let last_backup = last_successful_backup(store)?;
    let report = evaluate(last_backup, now, threshold_days);

    match report.status {
        StalenessStatus::Ok => tracing::info!(days_since = ?report.days_since, "Backup is up to date"),
        StalenessStatus::Overdue => tracing::warn!(
            days_since = ?report.days_since,
            days_overdue = ?report.days_overdue(),
            "Backup overdue"
        ),
        StalenessStatus::NoHistory => tracing::warn!("No backup found, first backup needed"),
    }

    Ok(report)
}

pub fn check_staleness(store: &StateStore, threshold_days: i64) -> Result<StalenessReport> {
    check_staleness_at(store, Utc::now(), threshold_days)
}
