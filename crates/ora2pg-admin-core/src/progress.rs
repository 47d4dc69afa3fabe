use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

/// Point-in-time view of a [`ProgressTracker`](crate::tracker::ProgressTracker).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerStatus {
    pub task_name: String,
    pub current_step: u64,
    pub total_steps: u64,
    pub percentage: f64,
    pub message: String,
    pub elapsed: Duration,
    pub estimated_remaining: Duration,
    pub is_running: bool,
}

/// Trait for drawing tracker state.
///
/// Core defines this trait; CLI implements it with `indicatif`.
/// Tests use `SilentRenderer` (no-op).
pub trait ProgressRenderer: Send + Sync {
    /// Called from the tracker's background loop on every update and tick.
    fn render(&self, status: &TrackerStatus);
    /// Called once when the tracker stops. No `render` follows.
    fn finish(&self, status: &TrackerStatus);
}

/// No-op renderer for tests and `--quiet`.
pub struct SilentRenderer;

impl ProgressRenderer for SilentRenderer {
    fn render(&self, _status: &TrackerStatus) {}
    fn finish(&self, _status: &TrackerStatus) {}
}

pub const BAR_WIDTH: usize = 30;

/// `██████░░░░` style bar, `width` cells wide.
pub fn bar(percentage: f64, width: usize) -> String {
    let filled = ((percentage.clamp(0.0, 100.0) / 100.0) * width as f64) as usize;
    let filled = filled.min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// One status line, e.g.
/// `migrate [█████░░░] 33.3% (3/9) COPY | elapsed 12s, remaining 24s`.
pub fn status_line(status: &TrackerStatus) -> String {
    let mut line = format!(
        "{} [{}] {:.1}% ({}/{})",
        status.task_name,
        bar(status.percentage, BAR_WIDTH),
        status.percentage,
        status.current_step,
        status.total_steps
    );
    if !status.message.is_empty() {
        line.push(' ');
        line.push_str(&status.message);
    }
    line.push_str(&format!(" | elapsed {}", format_duration(status.elapsed)));
    if status.is_running && status.estimated_remaining > Duration::ZERO {
        line.push_str(&format!(
            ", remaining {}",
            format_duration(status.estimated_remaining)
        ));
    }
    line
}

/// `1h02m03s`, `4m05s`, `12s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m:02}m{s:02}s")
    } else if m > 0 {
        format!("{m}m{s:02}s")
    } else {
        format!("{s}s")
    }
}

/// Plain-text renderer for non-interactive output. Writes a line only when it
/// differs from the previous one, ignoring the clock.
pub struct TextRenderer<W: Write + Send> {
    out: Mutex<W>,
    last: Mutex<Option<(u64, String)>>,
}

impl<W: Write + Send> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            last: Mutex::new(None),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self, line: &str) {
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}

impl TextRenderer<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> ProgressRenderer for TextRenderer<W> {
    fn render(&self, status: &TrackerStatus) {
        let key = (status.current_step, status.message.clone());
        {
            let mut last = self
                .last
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if last.as_ref() == Some(&key) {
                return;
            }
            *last = Some(key);
        }
        self.write(&status_line(status));
    }

    fn finish(&self, status: &TrackerStatus) {
        self.write(&status_line(status));
    }
}
