//! Trailing-edge debouncer
//!
//! Bursts of [`Debouncer::call`] collapse into a single execution of the
//! wrapped function, started no earlier than `cooldown` after the last call
//! of the burst. A call that arrives while the function is running schedules
//! exactly one more run, no earlier than `cooldown` after the running one
//! finishes, so executions never overlap.
//!
//! With `immediate = true` the first call of an idle debouncer runs the
//! function right away; later calls follow the trailing-edge rule.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use spook_core::Result;

type DebouncedFn = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

#[derive(Default)]
struct TimerState {
    /// When the next execution is due; `None` means nothing is pending
    deadline: Option<Instant>,
    worker: Option<JoinHandle<()>>,
    running: bool,
    shut_down: bool,
}

struct Inner {
    name: String,
    cooldown: Duration,
    immediate: bool,
    function: DebouncedFn,
    state: Mutex<TimerState>,
}

/// Coalesces repeated calls into one delayed execution
pub struct Debouncer {
    inner: Arc<Inner>,
}

impl Debouncer {
    pub fn new<F, Fut>(name: impl Into<String>, cooldown: Duration, immediate: bool, function: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let function: DebouncedFn = Arc::new(move || Box::pin(function()));
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                cooldown,
                immediate,
                function,
                state: Mutex::new(TimerState::default()),
            }),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.inner.cooldown
    }

    /// Request an execution.
    ///
    /// Returns immediately; the function runs later on its own task.
    pub async fn call(&self) {
        let mut state = self.inner.state.lock().await;
        if state.shut_down {
            debug!("Debouncer '{}' is shut down, ignoring call", self.inner.name);
            return;
        }

        let now = Instant::now();
        let idle = state.worker.is_none();
        state.deadline = Some(if idle && self.inner.immediate {
            now
        } else {
            now + self.inner.cooldown
        });

        if idle {
            state.worker = Some(tokio::spawn(run_worker(Arc::clone(&self.inner))));
        }
    }

    /// True while an execution is scheduled or running
    pub async fn is_pending(&self) -> bool {
        let state = self.inner.state.lock().await;
        state.deadline.is_some() || state.running
    }

    /// Cancel any scheduled execution and ignore all further calls.
    ///
    /// An execution that is already running is left to finish; this returns
    /// only after it has.
    pub async fn shutdown(&self) {
        let in_flight = {
            let mut state = self.inner.state.lock().await;
            state.shut_down = true;
            state.deadline = None;
            match state.worker.take() {
                Some(worker) if state.running => Some(worker),
                Some(worker) => {
                    worker.abort();
                    None
                }
                None => None,
            }
        };

        if let Some(worker) = in_flight {
            debug!("Debouncer '{}' waiting for running call", self.inner.name);
            if let Err(e) = worker.await {
                warn!("Debouncer '{}' worker ended abnormally: {}", self.inner.name, e);
            }
        }
        debug!("Debouncer '{}' shut down", self.inner.name);
    }
}

async fn run_worker(inner: Arc<Inner>) {
    loop {
        let deadline = {
            let mut state = inner.state.lock().await;
            match state.deadline {
                Some(deadline) if !state.shut_down => deadline,
                _ => {
                    state.worker = None;
                    return;
                }
            }
        };

        tokio::time::sleep_until(deadline).await;

        {
            let mut state = inner.state.lock().await;
            if state.shut_down {
                state.worker = None;
                return;
            }
            match state.deadline {
                // pushed back by a later call
                Some(current) if current > deadline => continue,
                Some(_) => {}
                None => {
                    state.worker = None;
                    return;
                }
            }
            state.deadline = None;
            state.running = true;
        }

        debug!("Debouncer '{}' executing", inner.name);
        if let Err(e) = (inner.function)().await {
            warn!("Debounced call '{}' failed: {}", inner.name, e);
        }

        let mut state = inner.state.lock().await;
        state.running = false;
        if let Some(deadline) = state.deadline {
            state.deadline = Some(deadline.max(Instant::now() + inner.cooldown));
        }
    }
}
