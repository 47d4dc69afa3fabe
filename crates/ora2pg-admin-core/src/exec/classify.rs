//! Line classification for ora2pg output.
//!
//! ora2pg reports progress as free text, one event per line. Rules are tried
//! in order and the first match wins; later rules never see that line.

use std::sync::LazyLock;

use regex_lite::{Captures, Regex};
use serde::Serialize;

/// Progress extracted from one process's output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressModel {
    /// Most recent object being processed, e.g. `processing table: USERS`.
    pub current_step: String,
    pub total_steps: u64,
    pub completed_steps: u64,
    /// Derived from `completed_steps / total_steps`; see [`ProgressModel::set_steps`].
    pub percentage: f64,
    pub processed_rows: u64,
    pub total_rows: u64,
    pub message: String,
}

impl ProgressModel {
    /// Record step counters and recompute the percentage from them.
    /// A zero total leaves the previous percentage in place.
    pub fn set_steps(&mut self, completed: u64, total: u64) {
        self.completed_steps = completed;
        self.total_steps = total;
        if total > 0 {
            self.percentage = completed as f64 / total as f64 * 100.0;
        }
    }
}

struct Rule {
    pattern: Regex,
    apply: fn(&Captures<'_>, &mut ProgressModel),
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        // "Processing table: USERS (3/10)"
        Rule {
            pattern: Regex::new(r"Processing\s+(\w+):\s+(\w+)\s+\((\d+)/(\d+)\)").unwrap(),
            apply: |caps, progress| {
                progress.current_step = format!("processing {}: {}", &caps[1], &caps[2]);
                let completed = caps[3].parse().unwrap_or(progress.completed_steps);
                let total = caps[4].parse().unwrap_or(progress.total_steps);
                progress.set_steps(completed, total);
            },
        },
        // "Exported 1500 rows"
        Rule {
            pattern: Regex::new(r"Exported\s+(\d+)\s+rows").unwrap(),
            apply: |caps, progress| {
                if let Ok(rows) = caps[1].parse() {
                    progress.processed_rows = rows;
                }
                progress.message = format!("exported {} rows", &caps[1]);
            },
        },
        // "Total rows: 10000"
        Rule {
            pattern: Regex::new(r"Total\s+rows:\s+(\d+)").unwrap(),
            apply: |caps, progress| {
                if let Ok(rows) = caps[1].parse() {
                    progress.total_rows = rows;
                }
            },
        },
        // "INFO: Starting migration process"
        Rule {
            pattern: Regex::new(r"^(INFO|WARNING|ERROR):\s+(.+)").unwrap(),
            apply: |caps, progress| {
                progress.message = caps[2].to_string();
            },
        },
    ]
});

const IMPORTANT_KEYWORDS: &[&str] = &[
    "error:",
    "warning:",
    "fatal:",
    "processing",
    "exported",
    "total",
    "completed",
    "failed",
];

/// Apply the first matching rule to `progress`. Returns whether any rule matched.
pub fn parse(line: &str, progress: &mut ProgressModel) -> bool {
    for rule in RULES.iter() {
        if let Some(caps) = rule.pattern.captures(line) {
            (rule.apply)(&caps, progress);
            return true;
        }
    }
    false
}

/// Whether a line is worth surfacing to the log. Case-insensitive.
pub fn is_important(line: &str) -> bool {
    if line.is_empty() {
        return false;
    }
    let lower = line.to_lowercase();
    IMPORTANT_KEYWORDS.iter().any(|k| lower.contains(k))
}
