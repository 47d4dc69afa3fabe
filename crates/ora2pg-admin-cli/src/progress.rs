use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use ora2pg_admin_core::progress::{ProgressRenderer, TrackerStatus, format_duration};

use crate::style;

/// Percent resolution of the bar.
const BAR_SCALE: u64 = 1000;

/// Tracker renderer drawing an `indicatif` bar on stderr.
pub struct IndicatifRenderer {
    pb: ProgressBar,
}

impl IndicatifRenderer {
    pub fn new() -> Self {
        let pb = ProgressBar::new(BAR_SCALE);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold} [{bar:30.cyan/dim}] {percent:>3}% {msg}",
            )
            .unwrap()
            .progress_chars("█▓░")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
        );
        pb.enable_steady_tick(Duration::from_millis(80));
        Self { pb }
    }
}

fn position(status: &TrackerStatus) -> u64 {
    (status.percentage.clamp(0.0, 100.0) / 100.0 * BAR_SCALE as f64) as u64
}

fn detail(status: &TrackerStatus) -> String {
    let mut msg = format!("({}/{})", status.current_step, status.total_steps);
    if !status.message.is_empty() {
        msg.push(' ');
        msg.push_str(&status.message);
    }
    if status.estimated_remaining > Duration::ZERO {
        msg.push_str(&style::dim(&format!(
            " ~{} left",
            format_duration(status.estimated_remaining)
        )));
    }
    msg
}

impl ProgressRenderer for IndicatifRenderer {
    fn render(&self, status: &TrackerStatus) {
        self.pb.set_prefix(status.task_name.clone());
        self.pb.set_position(position(status));
        self.pb.set_message(detail(status));
    }

    fn finish(&self, status: &TrackerStatus) {
        self.pb
            .set_style(ProgressStyle::with_template("{msg}").unwrap());
        let mark = if status.percentage >= 100.0 {
            style::check_mark()
        } else {
            style::cross_mark()
        };
        self.pb.finish_with_message(format!(
            "{mark} {} {:.0}% in {}",
            status.task_name,
            status.percentage,
            format_duration(status.elapsed)
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(percentage: f64, message: &str) -> TrackerStatus {
        TrackerStatus {
            task_name: "structure".to_string(),
            current_step: 2,
            total_steps: 7,
            percentage,
            message: message.to_string(),
            elapsed: Duration::from_secs(12),
            estimated_remaining: Duration::ZERO,
            is_running: true,
        }
    }

    #[test]
    fn position_is_clamped() {
        assert_eq!(position(&status(50.0, "")), 500);
        assert_eq!(position(&status(150.0, "")), BAR_SCALE);
        assert_eq!(position(&status(-3.0, "")), 0);
    }

    #[test]
    fn detail_includes_step_counts() {
        assert_eq!(detail(&status(28.5, "")), "(2/7)");
        assert_eq!(detail(&status(28.5, "VIEW done")), "(2/7) VIEW done");
    }

    #[test]
    fn hidden_bar_accepts_updates() {
        let renderer = IndicatifRenderer {
            pb: ProgressBar::hidden(),
        };
        renderer.render(&status(40.0, "TABLE done"));
        renderer.finish(&status(100.0, ""));
        assert!(renderer.pb.is_finished());
    }
}
