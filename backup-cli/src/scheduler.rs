use crate::output;
use backup_core::BackupEngine;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

async fn run_check(engine: Arc<BackupEngine>) {
    match tokio::task::spawn_blocking(move || engine.check_staleness()).await {
        Ok(Ok(report)) => output::print_staleness(&report),
        Ok(Err(e)) => tracing::error!(error = %e, "Staleness check failed"),
        Err(e) => tracing::error!(error = %e, "Staleness check task panicked"),
    }
}

/// Run the staleness check now and then on every tick of `cron_expression`
/// (six fields, seconds first) until Ctrl-C.
pub async fn watch(engine: Arc<BackupEngine>, cron_expression: &str) -> anyhow::Result<()> {
    let mut scheduler = JobScheduler::new().await?;

    let job_engine = engine.clone();
    let job = Job::new_async(cron_expression, move |_uuid, _lock| {
        let engine = job_engine.clone();
        Box::pin(async move {
            run_check(engine).await;
        })
    })?;

    scheduler.add(job).await?;
    run_check(engine).await;

    scheduler.start().await?;
    tracing::info!(cron = %cron_expression, "Staleness watch started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received SIGINT");

    scheduler.shutdown().await?;
    Ok(())
}
