use {
    crate::{AppState, services::processor},
    std::time::Duration,
    tokio::{sync::watch, task::JoinHandle},
};

const IDLE_POLL: Duration = Duration::from_millis(250);

/// Poll the queue and process jobs until shutdown. Workers are independent:
/// no shared cursor, no coordination — correctness under concurrency comes
/// from the idempotency claim and the version-checked writes, not from
/// scheduling.
pub async fn run_worker(state: AppState, mut shutdown: watch::Receiver<bool>) {
    tracing::info!("job worker started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("job worker shutting down");
                return;
            }
            _ = tokio::time::sleep(IDLE_POLL) => {}
        }

        loop {
            let job = match state.queue.dequeue(state.config.lease_duration).await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "dequeue failed");
                    break;
                }
            };

            let budget = state.config.processing_timeout;
            match tokio::time::timeout(budget, processor::process_job(&state, &job)).await {
                Ok(Ok(outcome)) => {
                    tracing::debug!(job_id = %job.id, ?outcome, "job processed");
                }
                Ok(Err(e)) => {
                    // The processor itself could not reach queue or stores.
                    // Nothing to ack or nack; the lease expiry redelivers.
                    tracing::error!(job_id = %job.id, error = %e, "job processing errored");
                }
                Err(_) => {
                    // Abandon rather than force-complete a possibly
                    // inconsistent operation; the lease expiry redelivers.
                    tracing::warn!(job_id = %job.id, "processing timed out, abandoning job");
                }
            }

            if *shutdown.borrow() {
                return;
            }
        }
    }
}

/// Start the configured number of workers.
pub fn spawn_workers(state: &AppState, shutdown: &watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
    (0..state.config.worker_count)
        .map(|_| tokio::spawn(run_worker(state.clone(), shutdown.clone())))
        .collect()
}
