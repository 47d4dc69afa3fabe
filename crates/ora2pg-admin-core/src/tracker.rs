//! Multi-step progress tracking with a periodic render loop.
//!
//! One tracker spans a whole migration run (e.g. nine steps for `migrate
//! all`), independent of the per-process [`ProgressModel`](crate::ProgressModel).
//! State sits behind one mutex; the background loop only reads it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::progress::{ProgressRenderer, TrackerStatus};

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);
const UPDATE_QUEUE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NotStarted,
    Running,
    Stopped,
}

#[derive(Debug)]
struct TrackerState {
    phase: Phase,
    task_name: String,
    total_steps: u64,
    current_step: u64,
    message: String,
    percentage: f64,
    started_at: Option<Instant>,
}

impl TrackerState {
    fn recompute(&mut self) {
        if self.total_steps > 0 {
            self.percentage = (self.current_step as f64 / self.total_steps as f64 * 100.0).min(100.0);
        }
    }

    fn elapsed(&self) -> Duration {
        self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }

    fn status(&self) -> TrackerStatus {
        let elapsed = self.elapsed();
        TrackerStatus {
            task_name: self.task_name.clone(),
            current_step: self.current_step,
            total_steps: self.total_steps,
            percentage: self.percentage,
            message: self.message.clone(),
            elapsed,
            estimated_remaining: estimate_remaining(elapsed, self.percentage),
            is_running: self.phase == Phase::Running,
        }
    }
}

struct Worker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Progress across several steps, re-rendered on every update and on a fixed tick.
///
/// `NotStarted → start → Running → stop → Stopped`. Mutators are no-ops
/// outside `Running`, and `Stopped` is final.
pub struct ProgressTracker {
    state: Arc<Mutex<TrackerState>>,
    renderer: Arc<dyn ProgressRenderer>,
    tick: Duration,
    notify: Mutex<Option<mpsc::Sender<()>>>,
    worker: Mutex<Option<Worker>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `elapsed / percentage * 100 - elapsed`, zero when that is meaningless.
pub fn estimate_remaining(elapsed: Duration, percentage: f64) -> Duration {
    if percentage <= 0.0 {
        return Duration::ZERO;
    }
    let total = elapsed.as_secs_f64() / percentage * 100.0;
    let remaining = total - elapsed.as_secs_f64();
    if remaining.is_finite() && remaining > 0.0 {
        Duration::try_from_secs_f64(remaining).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

impl ProgressTracker {
    pub fn new(renderer: Arc<dyn ProgressRenderer>) -> Self {
        Self::with_tick(renderer, DEFAULT_TICK)
    }

    pub fn with_tick(renderer: Arc<dyn ProgressRenderer>, tick: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerState {
                phase: Phase::NotStarted,
                task_name: String::new(),
                total_steps: 0,
                current_step: 0,
                message: String::new(),
                percentage: 0.0,
                started_at: None,
            })),
            renderer,
            tick,
            notify: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Reset counters and spawn the render loop. Must be called inside a
    /// tokio runtime. Ignored unless the tracker has never been started.
    pub fn start(&self, task_name: &str, total_steps: u64) {
        {
            let mut state = lock(&self.state);
            if state.phase != Phase::NotStarted {
                tracing::debug!(task = task_name, "tracker already started, ignoring start");
                return;
            }
            state.phase = Phase::Running;
            state.task_name = task_name.to_string();
            state.total_steps = total_steps;
            state.current_step = 0;
            state.message.clear();
            state.percentage = 0.0;
            state.started_at = Some(Instant::now());
        }

        let (tx, rx) = mpsc::channel(UPDATE_QUEUE);
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(render_loop(
            self.state.clone(),
            self.renderer.clone(),
            rx,
            stop_rx,
            self.tick,
        ));
        *lock(&self.notify) = Some(tx);
        *lock(&self.worker) = Some(Worker {
            stop: stop_tx,
            handle,
        });
        tracing::debug!(task = task_name, total_steps, "progress tracker started");
    }

    /// Set the current step (1-based count of steps reached) and message.
    pub fn update_step(&self, step: u64, message: &str) {
        self.mutate(|state| {
            state.current_step = step;
            state.message = message.to_string();
            state.recompute();
        });
    }

    /// Set the percentage directly, for progress that is not step-based.
    pub fn update_progress(&self, percentage: f64, details: &str) {
        self.mutate(|state| {
            state.percentage = percentage.clamp(0.0, 100.0);
            if !details.is_empty() {
                state.message = details.to_string();
            }
        });
    }

    pub fn set_message(&self, message: &str) {
        self.mutate(|state| state.message = message.to_string());
    }

    /// Mark all steps done.
    pub fn complete(&self, message: &str) {
        self.mutate(|state| {
            state.current_step = state.total_steps;
            state.percentage = 100.0;
            state.message = message.to_string();
        });
    }

    pub fn status(&self) -> TrackerStatus {
        lock(&self.state).status()
    }

    pub fn estimated_time_remaining(&self) -> Duration {
        let state = lock(&self.state);
        estimate_remaining(state.elapsed(), state.percentage)
    }

    pub fn elapsed(&self) -> Duration {
        lock(&self.state).elapsed()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).phase == Phase::Running
    }

    /// Stop the render loop and wait for it to exit, then render the final
    /// state once. Nothing is rendered after this returns.
    pub async fn stop(&self) {
        {
            let mut state = lock(&self.state);
            if state.phase != Phase::Running {
                return;
            }
            state.phase = Phase::Stopped;
        }
        lock(&self.notify).take();
        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            let _ = worker.stop.send(());
            if let Err(e) = worker.handle.await {
                tracing::warn!(error = %e, "progress render loop ended abnormally");
            }
        }
        let status = self.status();
        self.renderer.finish(&status);
        tracing::debug!(elapsed = ?status.elapsed, "progress tracker stopped");
    }

    fn mutate(&self, apply: impl FnOnce(&mut TrackerState)) {
        {
            let mut state = lock(&self.state);
            if state.phase != Phase::Running {
                return;
            }
            apply(&mut state);
        }
        if let Some(tx) = lock(&self.notify).as_ref() {
            // A full queue drops the frame; the next tick renders the latest state.
            let _ = tx.try_send(());
        }
    }
}

async fn render_loop(
    state: Arc<Mutex<TrackerState>>,
    renderer: Arc<dyn ProgressRenderer>,
    mut updates: mpsc::Receiver<()>,
    mut stop: oneshot::Receiver<()>,
    tick: Duration,
) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            Some(()) = updates.recv() => {}
            _ = ticker.tick() => {}
        }
        let status = lock(&state).status();
        renderer.render(&status);
    }
}
