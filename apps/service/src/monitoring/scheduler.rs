use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Periodic task runner.
///
/// Every tick spawns the job as its own task, so a job that outlives its period
/// overlaps the next tick instead of delaying it. Jobs guard themselves against
/// re-entry where that matters.
#[derive(Default)]
pub struct Scheduler {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke `job` every `period`, starting immediately
    pub fn every<F, Fut>(&mut self, name: &'static str, period: Duration, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        tracing::info!(task = name, period_ms = period.as_millis() as u64, "Scheduling task");

        let handle = tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                timer.tick().await;

                let run = job();
                tokio::spawn(async move {
                    if let Err(e) = run.await {
                        tracing::warn!(task = name, "Scheduled task failed: {:#}", e);
                    }
                });
            }
        });

        self.handles.push((name, handle));
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.handles.iter().map(|(name, _)| *name).collect()
    }

    /// Stop all periodic tasks. Jobs already running finish on their own.
    pub fn shutdown(&mut self) {
        for (name, handle) in self.handles.drain(..) {
            tracing::debug!(task = name, "Stopping task");
            handle.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
