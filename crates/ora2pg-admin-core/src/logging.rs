/// Sink for supervised-process lifecycle events and important output lines.
///
/// Core code takes this as `Arc<dyn Logger>` instead of logging globally so
/// that tests can capture what a run reported. [`TracingLogger`] is the
/// production implementation.
pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn debug(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards to `tracing` under the `ora2pg_admin::ora2pg` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "ora2pg_admin::ora2pg", "{message}");
    }

    fn debug(&self, message: &str) {
        tracing::debug!(target: "ora2pg_admin::ora2pg", "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "ora2pg_admin::ora2pg", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "ora2pg_admin::ora2pg", "{message}");
    }
}

/// In-memory logger for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CapturingLogger {
    pub(crate) entries: std::sync::Mutex<Vec<(&'static str, String)>>,
}

#[cfg(test)]
impl CapturingLogger {
    pub(crate) fn messages(&self, level: &str) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn push(&self, level: &'static str, message: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}

#[cfg(test)]
impl Logger for CapturingLogger {
    fn info(&self, message: &str) {
        self.push("info", message);
    }

    fn debug(&self, message: &str) {
        self.push("debug", message);
    }

    fn warn(&self, message: &str) {
        self.push("warn", message);
    }

    fn error(&self, message: &str) {
        self.push("error", message);
    }
}
