//! Cron-driven refresh and repair loop for `pricewatch watch`.

use std::sync::Arc;

use pricewatch_catalog::{CatalogError, CatalogService};
use pricewatch_db::ProductStore;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

/// Runs a refresh-then-repair cycle on `schedule` until `cancel` fires.
///
/// A tick that arrives while the previous cycle is still running is skipped.
///
/// # Errors
///
/// Returns an error if `schedule` is not a valid cron expression or the
/// scheduler cannot be started or stopped.
pub(crate) async fn run<S>(
    service: CatalogService<S>,
    schedule: &str,
    cancel: CancellationToken,
) -> anyhow::Result<()>
where
    S: ProductStore + 'static,
{
    let service = Arc::new(service);
    let in_flight = Arc::new(Mutex::new(()));
    let mut scheduler = JobScheduler::new().await?;

    let job = {
        let cancel = cancel.clone();
        Job::new_async(schedule, move |_uuid, _lock| {
            let service = Arc::clone(&service);
            let in_flight = Arc::clone(&in_flight);
            let cancel = cancel.clone();

            Box::pin(async move {
                let Ok(_guard) = in_flight.try_lock() else {
                    tracing::warn!("watch: previous cycle still running, skipping tick");
                    return;
                };
                run_cycle(&service, &cancel).await;
            })
        })?
    };

    scheduler.add(job).await?;
    scheduler.start().await?;
    tracing::info!(schedule = %schedule, "watch: scheduler started");

    cancel.cancelled().await;
    scheduler.shutdown().await?;
    tracing::info!("watch: scheduler stopped");
    Ok(())
}

/// One refresh pass followed by one repair pass. Failures are logged, never
/// returned, so the next tick still runs.
pub(crate) async fn run_cycle<S: ProductStore>(
    service: &CatalogService<S>,
    cancel: &CancellationToken,
) {
    tracing::info!("watch: starting cycle");

    match service.refresh_prices(cancel).await {
        Ok(summary) => tracing::info!(
            scanned = summary.scanned,
            updated = summary.updated,
            skipped = summary.skipped,
            "watch: price refresh complete"
        ),
        Err(CatalogError::Cancelled) => return,
        Err(e) => tracing::error!(error = %e, "watch: price refresh failed"),
    }

    match service.repair_incomplete(cancel).await {
        Ok(summary) => tracing::info!(
            scanned = summary.scanned,
            updated = summary.updated,
            skipped = summary.skipped,
            "watch: repair complete"
        ),
        Err(CatalogError::Cancelled) => {}
        Err(e) => tracing::error!(error = %e, "watch: repair failed"),
    }
}
