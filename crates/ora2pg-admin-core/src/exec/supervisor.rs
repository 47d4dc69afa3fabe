use std::io;
use std::mem;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::pump::{OutputPump, lock};
use super::{ExecError, ExecutionOptions, ExecutionResult, ExecutionStatus, ProgressModel};
use crate::logging::Logger;

/// How long to keep draining pipes after a forced kill. A grandchild that
/// inherited the pipes can hold them open past the child's death.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// How draining ended after the child exited on its own.
enum Drain {
    Done,
    Cancelled,
    Expired,
}

/// Which of the three exit paths settled the run.
enum Race {
    Cancelled,
    TimedOut(Duration),
    Exited(io::Result<ExitStatus>),
}

/// Runs one external command to completion, or kills it on cancel/timeout.
pub struct ProcessSupervisor {
    logger: Arc<dyn Logger>,
    updates: Option<mpsc::Sender<ProgressModel>>,
    drain_grace: Duration,
}

impl ProcessSupervisor {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            logger,
            updates: None,
            drain_grace: DRAIN_GRACE,
        }
    }

    /// Forward a progress snapshot for every recognized line. Snapshots are
    /// dropped rather than awaited when the receiver falls behind.
    pub fn with_progress_updates(mut self, tx: mpsc::Sender<ProgressModel>) -> Self {
        self.updates = Some(tx);
        self
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    /// Spawn `args[0]` with `args[1..]` and supervise it.
    ///
    /// Never returns early with an error: every failure is recorded in the
    /// result (see [`ExecutionResult::check`]). Both streams are drained before
    /// the result is assembled. Once the child has exited or been killed,
    /// draining is bounded by a short grace period and by `options.timeout`,
    /// so pipes held open by a grandchild cannot stall the call.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        args: &[String],
        options: &ExecutionOptions,
    ) -> ExecutionResult {
        let mut result = ExecutionResult::pending();

        let Some((program, rest)) = args.split_first() else {
            result.finish(-1, Some(ExecError::EmptyCommand));
            return result;
        };
        if cancel.is_cancelled() {
            self.logger
                .warn(&format!("not starting {program}: already cancelled"));
            result.finish(-1, Some(ExecError::Cancelled));
            return result;
        }

        let mut command = Command::new(program);
        command
            .args(rest)
            .envs(&options.environment)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &options.working_dir {
            command.current_dir(dir);
        }

        self.logger.debug(&format!("command: {}", args.join(" ")));
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.logger
                    .error(&format!("failed to start {program}: {e}"));
                result.finish(
                    -1,
                    Some(ExecError::Start {
                        program: program.clone(),
                        message: e.to_string(),
                    }),
                );
                return result;
            }
        };
        result.status = ExecutionStatus::Running;
        self.logger.info(&format!(
            "started {program} (pid {})",
            child.id().map_or_else(|| "?".to_string(), |id| id.to_string())
        ));

        let stdout_buf = Arc::new(Mutex::new(String::new()));
        let stderr_buf = Arc::new(Mutex::new(String::new()));
        let progress = Arc::new(Mutex::new(None));

        let mut pumps: Vec<JoinHandle<()>> = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(self.pump("stdout", &stdout_buf, &progress).spawn(stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(self.pump("stderr", &stderr_buf, &progress).spawn(stderr));
        }

        let timeout = options.effective_timeout();
        let started = Instant::now();
        let (exit_code, mut error, killed) = match race(&mut child, cancel, timeout).await {
            Race::Exited(Ok(status)) => match status.code() {
                Some(0) => (0, None, false),
                Some(code) => (code, Some(ExecError::NonZeroExit(code)), false),
                None => (-1, Some(ExecError::Terminated), false),
            },
            Race::Exited(Err(e)) => (-1, Some(ExecError::Wait(e.to_string())), true),
            Race::Cancelled => (-1, Some(ExecError::Cancelled), true),
            Race::TimedOut(limit) => (-1, Some(ExecError::Timeout(limit)), true),
        };

        if killed {
            if let Err(e) = child.kill().await {
                self.logger
                    .warn(&format!("failed to kill {program}: {e}"));
            }
            if tokio::time::timeout(self.drain_grace, join_pumps(&mut pumps, &*self.logger))
                .await
                .is_err()
            {
                self.logger
                    .warn("output streams still open after kill; keeping partial output");
                abort_pumps(&pumps);
            }
        } else {
            // The child is gone but a grandchild may still hold the pipes.
            // Drain for at most the grace period, and never past the deadline.
            let remaining = timeout.map(|limit| limit.saturating_sub(started.elapsed()));
            let bound = remaining.map_or(self.drain_grace, |left| left.min(self.drain_grace));
            let drained = tokio::select! {
                _ = join_pumps(&mut pumps, &*self.logger) => Drain::Done,
                _ = cancel.cancelled() => Drain::Cancelled,
                _ = tokio::time::sleep(bound) => Drain::Expired,
            };
            match drained {
                Drain::Done => {}
                Drain::Cancelled => {
                    self.logger
                        .warn("cancelled while draining output; keeping partial output");
                    abort_pumps(&pumps);
                    error = Some(ExecError::Cancelled);
                }
                Drain::Expired => {
                    self.logger
                        .warn("output streams still open after exit; keeping partial output");
                    abort_pumps(&pumps);
                    if let Some(limit) = timeout
                        && remaining.is_some_and(|left| left <= self.drain_grace)
                    {
                        error = Some(ExecError::Timeout(limit));
                    }
                }
            }
        }

        result.output = mem::take(&mut *lock(&stdout_buf));
        result.error_output = mem::take(&mut *lock(&stderr_buf));
        result.progress = lock(&progress).take();
        result.finish(exit_code, error);

        match &result.error {
            None => self.logger.info(&format!(
                "{program} completed in {:.1}s",
                result.duration.as_secs_f64()
            )),
            Some(err @ (ExecError::Cancelled | ExecError::Timeout(_))) => {
                self.logger.warn(&format!("{program} killed: {err}"))
            }
            Some(err) => self.logger.error(&format!(
                "{program} failed with exit code {}: {err}",
                result.exit_code
            )),
        }
        result
    }

    fn pump(
        &self,
        stream: &'static str,
        buffer: &Arc<Mutex<String>>,
        progress: &Arc<Mutex<Option<ProgressModel>>>,
    ) -> OutputPump {
        OutputPump {
            stream,
            logger: self.logger.clone(),
            buffer: buffer.clone(),
            progress: progress.clone(),
            updates: self.updates.clone(),
        }
    }
}

async fn race(child: &mut Child, cancel: &CancellationToken, timeout: Option<Duration>) -> Race {
    let deadline = async {
        match timeout {
            Some(limit) => {
                tokio::time::sleep(limit).await;
                limit
            }
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Race::Cancelled,
        status = child.wait() => Race::Exited(status),
        limit = deadline => Race::TimedOut(limit),
    }
}

async fn join_pumps(pumps: &mut [JoinHandle<()>], logger: &dyn Logger) {
    for pump in pumps.iter_mut() {
        if let Err(e) = pump.await {
            logger.warn(&format!("output reader stopped abnormally: {e}"));
        }
    }
}

fn abort_pumps(pumps: &[JoinHandle<()>]) {
    for pump in pumps {
        pump.abort();
    }
}
