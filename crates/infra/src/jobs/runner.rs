//! Timer-driven execution of sweeps.
//!
//! Each sweep gets its own task and cadence. A pass runs to completion before the
//! next tick is considered, so a sweep never overlaps itself; failures are logged and
//! the next tick tries again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info};

use super::sweeps::Sweep;

/// Schedule for one periodic sweep.
#[derive(Debug, Clone, Copy)]
pub struct SweepSchedule {
    pub interval: Duration,
    /// Run one pass immediately instead of waiting a full interval.
    pub run_on_start: bool,
}

impl SweepSchedule {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            run_on_start: false,
        }
    }

    pub fn run_on_start(mut self) -> Self {
        self.run_on_start = true;
        self
    }
}

/// Handle for a running sweep task.
#[derive(Debug)]
pub struct SweepHandle {
    name: &'static str,
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl SweepHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop the sweep, letting a pass that is already running finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.join.await {
            error!(sweep = self.name, error = %e, "sweep task ended abnormally");
        }
    }
}

/// Spawn `sweep` on the current tokio runtime.
pub fn spawn_sweep<S: Sweep>(sweep: Arc<S>, schedule: SweepSchedule) -> SweepHandle {
    let name = sweep.name();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let join = tokio::spawn(sweep_loop(sweep, schedule, shutdown_rx));
    SweepHandle {
        name,
        shutdown: Some(shutdown_tx),
        join,
    }
}

async fn sweep_loop<S: Sweep>(
    sweep: Arc<S>,
    schedule: SweepSchedule,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let name = sweep.name();
    info!(sweep = name, interval_secs = schedule.interval.as_secs(), "sweep started");

    let start = if schedule.run_on_start {
        Instant::now()
    } else {
        Instant::now() + schedule.interval
    };
    let mut ticker = tokio::time::interval_at(start, schedule.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Shutdown has priority.
            biased;
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {
                if let Err(e) = sweep.sweep().await {
                    error!(sweep = name, error = %e, "sweep failed");
                }
            }
        }
    }

    info!(sweep = name, "sweep stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::error::JobError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Sweep for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn sweep(&self) -> Result<(), JobError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(JobError::Store("unavailable".into()));
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_on_every_tick_until_shutdown() {
        let sweep = Arc::new(Counting::default());
        let handle = spawn_sweep(sweep.clone(), SweepSchedule::every(Duration::from_secs(60)));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(sweep.runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(sweep.runs.load(Ordering::SeqCst), 2);

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(sweep.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_stop_the_schedule() {
        let sweep = Arc::new(Counting {
            runs: AtomicUsize::new(0),
            fail: true,
        });
        let handle = spawn_sweep(
            sweep.clone(),
            SweepSchedule::every(Duration::from_secs(10)).run_on_start(),
        );

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(sweep.runs.load(Ordering::SeqCst), 3);
        handle.shutdown().await;
    }
}
