use anyhow::anyhow;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::services::ingestion::IngestionService;

/// Schedule the periodic ingestion cycle and start the scheduler.
///
/// The returned scheduler must be kept alive for the jobs to keep running.
pub async fn start_scheduler(
    ingestion_service: IngestionService,
    cron: &str,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await.map_err(|e| anyhow!("{e:?}"))?;

    let job = Job::new_async(cron, move |_, _| {
        let ingestion_service = ingestion_service.clone();
        Box::pin(async move {
            tracing::info!("Scheduled ingestion in progress");
            match ingestion_service.run_cycle(ingestion_service.topics()).await {
                Ok(report) => tracing::info!(
                    fetched = report.fetched,
                    inserted = report.inserted,
                    enriched = report.enriched,
                    failed = report.failed,
                    "Scheduled ingestion done"
                ),
                Err(e) => tracing::error!("Scheduled ingestion failed: {}", e),
            }
        })
    })
    .map_err(|e| anyhow!("Could not create the ingestion job: {e:?}"))?;

    scheduler
        .add(job)
        .await
        .map_err(|e| anyhow!("Could not schedule the ingestion job: {e:?}"))?;
    scheduler
        .start()
        .await
        .map_err(|e| anyhow!("Could not start the scheduler: {e:?}"))?;

    Ok(scheduler)
}
