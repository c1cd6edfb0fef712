use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use crate::registry::RegistryClient;
use crate::source::scanner::DirectorySource;
use crate::synchronizer::Synchronizer;

/// A running synchronizer, ticking on a fixed interval
pub struct SyncTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl SyncTask {
    /// Cancel the timer and wait for an in-flight tick to finish
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!("Synchronizer task failed: {}", e);
        }
    }
}

/// Start ticking `sync` every `period`, beginning immediately.
///
/// The synchronizer is owned by a single task, so ticks are delivered one at
/// a time and in order. Cancelling `cancel` (or calling [`SyncTask::stop`])
/// stops further ticks from starting.
pub fn spawn<D, R>(
    sync: Synchronizer<D, R>,
    period: Duration,
    cancel: CancellationToken,
) -> SyncTask
where
    D: DirectorySource + Send + 'static,
    R: RegistryClient + Send + Sync + 'static,
{
    let handle = tokio::spawn(run(sync, period, cancel.clone()));
    SyncTask { cancel, handle }
}

async fn run<D, R>(mut sync: Synchronizer<D, R>, period: Duration, cancel: CancellationToken)
where
    D: DirectorySource,
    R: RegistryClient,
{
    tracing::info!(
        "Synchronizing {} every {:?}",
        sync.environment(),
        period
    );

    let mut ticker = tokio::time::interval(period);
    // A slow tick pushes the next one back instead of bunching them up
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Synchronizer shutting down");
                break;
            }
            _ = ticker.tick() => {
                let report = sync.tick().await;
                if !report.skipped {
                    tracing::debug!(
                        "Tick complete: {} published, {} unchanged, {} unparseable, {} failed to publish, {} tracked",
                        report.published,
                        report.unchanged,
                        report.parse_failures,
                        report.publish_failures,
                        sync.store().len()
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testing::RecordingRegistry;
    use crate::source::scanner::testing::MemoryDirectory;

    fn start(
        dir: &MemoryDirectory,
        registry: &RecordingRegistry,
    ) -> SyncTask {
        let sync = Synchronizer::new(dir.clone(), registry.clone(), "staging");
        spawn(sync, Duration::from_secs(1), CancellationToken::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate() {
        let dir = MemoryDirectory::new();
        let registry = RecordingRegistry::default();
        dir.write("service1.json", r#"[{"host":"host1","port":123}]"#);

        let task = start(&dir, &registry);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(registry.publishes().len(), 1);
        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_changes_picked_up_within_one_interval() {
        let dir = MemoryDirectory::new();
        let registry = RecordingRegistry::default();
        dir.write("service1.json", r#"[{"host":"host1","port":123}]"#);

        let task = start(&dir, &registry);
        tokio::time::sleep(Duration::from_millis(500)).await;

        dir.write("service1.json", r#"[{"host":"host2","port":124}]"#);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let view = registry.view("service1", "staging").unwrap();
        assert_eq!(view.addresses(), vec!["host2:124"]);
        assert_eq!(registry.publishes().len(), 2);
        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_after_stop() {
        let dir = MemoryDirectory::new();
        let registry = RecordingRegistry::default();
        dir.write("service1.json", r#"[{"host":"host1","port":123}]"#);

        let task = start(&dir, &registry);
        tokio::time::sleep(Duration::from_millis(500)).await;
        task.stop().await;

        dir.remove("service1.json");
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(registry.publishes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_token_cancels() {
        let dir = MemoryDirectory::new();
        let registry = RecordingRegistry::default();
        let parent = CancellationToken::new();

        let sync = Synchronizer::new(dir.clone(), registry.clone(), "staging");
        let task = spawn(sync, Duration::from_secs(1), parent.child_token());
        tokio::time::sleep(Duration::from_millis(500)).await;

        parent.cancel();
        dir.write("service1.json", "[]");
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(registry.publishes().is_empty());
        task.stop().await;
    }
}
