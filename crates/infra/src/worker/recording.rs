//! Recording worker gateway for tests/dev.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use synopsi_core::{Job, JobId};

use super::{DispatchReceipt, GatewayError, WorkerGateway};

#[derive(Debug, Default)]
struct Recorded {
    dispatched: Vec<Job>,
    failure: Option<String>,
    hand_out_ids: bool,
}

/// Remembers every dispatched job; can be told to refuse dispatches.
#[derive(Debug, Default)]
pub struct RecordingWorkerGateway {
    inner: Mutex<Recorded>,
}

impl RecordingWorkerGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Accept dispatches and answer with a worker id (`worker-<job id>`).
    pub fn accepting_with_ids() -> Self {
        let gateway = Self::new();
        gateway.with(|r| r.hand_out_ids = true);
        gateway
    }

    /// Refuse every dispatch with `reason` until [`Self::recover`] is called.
    pub fn fail_with(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.with(|r| r.failure = Some(reason));
    }

    pub fn recover(&self) {
        self.with(|r| r.failure = None);
    }

    /// Jobs passed to `dispatch`, in call order, including refused ones.
    pub fn dispatched(&self) -> Vec<Job> {
        self.with(|r| r.dispatched.clone())
    }

    pub fn dispatch_count(&self, job_id: JobId) -> usize {
        self.with(|r| r.dispatched.iter().filter(|j| j.id == job_id).count())
    }

    fn with<T>(&self, f: impl FnOnce(&mut Recorded) -> T) -> T {
        // A poisoned lock only means a test thread panicked while recording.
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

#[async_trait]
impl WorkerGateway for RecordingWorkerGateway {
    async fn dispatch(&self, job: &Job) -> Result<DispatchReceipt, GatewayError> {
        self.with(|r| {
            r.dispatched.push(job.clone());
            if let Some(reason) = &r.failure {
                return Err(GatewayError::Transport(reason.clone()));
            }
            Ok(DispatchReceipt {
                worker_external_id: r.hand_out_ids.then(|| format!("worker-{}", job.id)),
            })
        })
    }
}
