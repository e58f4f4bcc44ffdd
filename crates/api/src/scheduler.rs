//! Background scheduler: a periodic tick that enqueues sync work and a
//! small pool of workers that claim and run jobs.
//!
//! Shutdown is cooperative: workers finish their current job, mark
//! anything still running as interrupted, and exit.

use std::time::Duration;

use db::{OauthRepository, SyncJobRepository};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::state::AppState;
use crate::sync;

const WORKER_COUNT: usize = 2;

/// Spawn the tick loop and job workers; returns their handles for joining
/// at shutdown.
pub fn spawn(state: AppState, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    handles.push(tokio::spawn(tick_loop(state.clone(), shutdown.clone())));

    for n in 0..WORKER_COUNT {
        let worker_id = format!("worker-{}", n);
        handles.push(tokio::spawn(worker_loop(
            state.clone(),
            worker_id,
            shutdown.clone(),
        )));
    }

    handles
}

async fn tick_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let tick = Duration::from_secs(state.config.background_tick.num_seconds().max(1) as u64);

    loop {
        match sync::run_background_tick(&state).await {
            Ok(enqueued) if enqueued > 0 => {
                tracing::info!(enqueued, "Background tick enqueued sync jobs");
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Background tick failed: {}", e),
        }

        if let Err(e) = OauthRepository::purge_expired(&state.pool).await {
            tracing::warn!("OAuth purge failed: {}", e);
        }

        tokio::select! {
            _ = tokio::time::sleep(tick) => {}
            _ = shutdown.changed() => {
                tracing::info!("Background tick loop stopping");
                return;
            }
        }
    }
}

async fn worker_loop(state: AppState, worker_id: String, mut shutdown: watch::Receiver<bool>) {
    let poll = Duration::from_secs(state.config.job_poll.num_seconds().max(1) as u64);

    loop {
        // Drain everything claimable, then sleep
        loop {
            if *shutdown.borrow() {
                break;
            }

            match SyncJobRepository::claim_next(&state.pool, &worker_id).await {
                Ok(Some(job)) => {
                    tracing::debug!(worker = %worker_id, job_id = %job.id, "Claimed sync job");
                    // Failures are recorded on the job; nothing to do here
                    let _ = sync::execute_job(&state, &job).await;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(worker = %worker_id, "Job claim failed: {}", e);
                    break;
                }
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = shutdown.changed() => {
                match SyncJobRepository::mark_interrupted(&state.pool, &worker_id).await {
                    Ok(0) => {}
                    Ok(n) => tracing::warn!(worker = %worker_id, n, "Marked in-flight jobs interrupted"),
                    Err(e) => tracing::error!(worker = %worker_id, "Interrupt marking failed: {}", e),
                }
                tracing::info!(worker = %worker_id, "Job worker stopping");
                return;
            }
        }
    }
}
