//! Periodic expiration of temporary access

use super::temporary_access::TemporaryAccessService;
use crate::directory::DirectoryGateway;
use crate::repository::ConfigRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct ExpirationSweeper<D: DirectoryGateway, R: ConfigRepository> {
    service: Arc<TemporaryAccessService<D, R>>,
    interval: Duration,
}

impl<D, R> ExpirationSweeper<D, R>
where
    D: DirectoryGateway + 'static,
    R: ConfigRepository + 'static,
{
    pub fn new(service: Arc<TemporaryAccessService<D, R>>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Run sweeps on a fixed interval until `shutdown` turns true or its
    /// sender is dropped
    pub fn start(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tracing::info!(interval_secs = self.interval.as_secs(), "Expiration sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.service.expire_sweep().await {
                            Ok(summary) if summary.skipped => {}
                            Ok(summary) => tracing::debug!(
                                due = summary.due,
                                expired = summary.expired.len(),
                                "Expiration sweep finished"
                            ),
                            Err(e) => tracing::warn!(error = %e, "Expiration sweep failed"),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Expiration sweeper stopped");
        })
    }
}
