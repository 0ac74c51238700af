use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::state::SharedState;

/// Periodic housekeeping: expired access tokens are swept so the credential
/// table does not grow without bound.
pub struct Scheduler {
    state: Arc<SharedState>,
    config: SchedulerConfig,
    running: Arc<RwLock<bool>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(state: Arc<SharedState>, config: SchedulerConfig) -> Self {
        Self {
            state,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;

        let interval_mins = self.config.token_purge_interval_minutes;
        info!("Scheduler running: token purge every {} minutes", interval_mins);

        let mut sched = JobScheduler::new().await?;

        let store = self.state.store.clone();
        let purge_job = Job::new_repeated_async(
            Duration::from_secs(u64::from(interval_mins) * 60),
            move |_uuid, _lock| {
                let store = store.clone();
                Box::pin(async move {
                    match store.purge_expired_tokens().await {
                        Ok(0) => {}
                        Ok(purged) => info!("Purged {} expired access tokens", purged),
                        Err(e) => error!("Token purge failed: {}", e),
                    }
                })
            },
        )?;

        sched.add(purge_job).await?;
        sched.start().await?;

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
    }
}
