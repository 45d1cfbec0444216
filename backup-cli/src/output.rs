//! Terminal rendering of run outcomes, history and staleness reports.

use backup_core::{BackupRun, RunOutcome, StalenessReport, StalenessStatus};
use chrono::{DateTime, Local, Utc};

const RULE_WIDTH: usize = 60;

fn local(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn print_outcome(outcome: &RunOutcome) {
    let run = &outcome.run;
    let verb = match run.backup_type {
        backup_core::BackupType::Clean => "removed",
        _ => "copied",
    };

    println!(
        "{} backup finished at {}: {} files {} in {:.1}s",
        run.backup_type,
        local(&run.timestamp),
        run.file_count,
        verb,
        outcome.duration.as_secs_f64()
    );

    if !outcome.failures.is_empty() {
        println!("{} files failed and were left for the next run:", outcome.failures.len());
        for failure in &outcome.failures {
            println!("  {failure}");
        }
    }

    if !outcome.skipped.is_empty() {
        println!("{} source paths could not be read:", outcome.skipped.len());
        for entry in &outcome.skipped {
            println!("  {}: {}", entry.path.display(), entry.reason);
        }
    }
}

pub fn print_history(runs: &[BackupRun]) {
    if runs.is_empty() {
        println!("No backups recorded yet.");
        return;
    }

    println!("{:<20} {:<6} {:>7}  {}", "TIMESTAMP", "TYPE", "FILES", "SOURCE -> BACKUP");
    for run in runs {
        println!(
            "{:<20} {:<6} {:>7}  {} -> {}",
            local(&run.timestamp),
            run.backup_type.as_str(),
            run.file_count,
            run.source_path,
            run.backup_path
        );
    }
}

pub fn print_staleness(report: &StalenessReport) {
    match (report.status, report.last_backup_date) {
        (StalenessStatus::Ok, Some(last)) => {
            println!("\nBackup status: OK");
            println!("Last backup: {}", local(&last));
            if let Some(next) = report.next_check {
                println!(
                    "Next backup recommended: {}\n",
                    next.with_timezone(&Local).format("%Y-%m-%d")
                );
            }
        }
        (StalenessStatus::Overdue, Some(last)) => {
            println!("\n{}", rule());
            println!("BACKUP ALERT!");
            println!("{}", rule());
            println!("Last backup: {}", local(&last));
            if let Some(days) = report.days_since {
                println!("Days since backup: {days}");
            }
            println!("Your data is important. Please back it up today!");
            println!("{}\n", rule());
        }
        _ => {
            println!("\n{}", rule());
            println!("BACKUP ALERT!");
            println!("{}", rule());
            println!("No backup history found in the system.");
            println!("Your data is important. Please run your first backup today!");
            println!("{}\n", rule());
        }
    }
}
