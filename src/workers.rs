//! Shared pause/resume/status handle for background workers (base spec §9:
//! "use explicit task + cancellation token per worker ... pause/resume is a
//! cooperative flag read between items, not a scheduler primitive"),
//! grounded on `sync::jobs::JobManager`'s `Arc<Mutex<JobState>>` +
//! `CancellationToken` shape, generalized to the auto-refresh supervisor,
//! email ingestor, and description enhancer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::models::{WorkerRunState, WorkerStatus};

#[derive(Clone)]
pub struct WorkerHandle {
    inner: Arc<Inner>,
}

struct Inner {
    paused: AtomicBool,
    running: AtomicBool,
    cancel: CancellationToken,
    status: Mutex<WorkerStatus>,
}

impl WorkerHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                paused: AtomicBool::new(false),
                running: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                status: Mutex::new(WorkerStatus {
                    state: WorkerRunState::Idle,
                    is_running: false,
                    is_paused: false,
                    last_pass_at: None,
                    last_error: None,
                }),
            }),
        }
    }

    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    pub async fn mark_pass_started(&self) {
        self.inner.running.store(true, Ordering::SeqCst);
        let mut status = self.inner.status.lock().await;
        status.state = WorkerRunState::Running;
        status.is_running = true;
    }

    pub async fn mark_pass_finished(&self, error: Option<String>) {
        self.inner.running.store(false, Ordering::SeqCst);
        let mut status = self.inner.status.lock().await;
        status.is_running = false;
        status.last_pass_at = Some(Utc::now());
        status.last_error = error;
        status.state = if self.is_paused() {
            WorkerRunState::Paused
        } else {
            WorkerRunState::Idle
        };
    }

    pub async fn status(&self) -> WorkerStatus {
        let mut status = self.inner.status.lock().await.clone();
        status.is_paused = self.is_paused();
        if status.is_paused && !status.is_running {
            status.state = WorkerRunState::Paused;
        }
        status
    }
}

impl Default for WorkerHandle {
    fn default() -> Self {
        Self::new()
    }
}
