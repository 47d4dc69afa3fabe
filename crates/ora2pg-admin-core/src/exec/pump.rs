use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::classify::{self, ProgressModel};
use crate::logging::Logger;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drains one child stream line by line.
///
/// Every line lands in `buffer` before anything else happens to it, so a
/// full notification queue never costs captured output. Progress is shared
/// by both pumps of one execution and stays `None` until a line matches.
pub(crate) struct OutputPump {
    pub(crate) stream: &'static str,
    pub(crate) logger: Arc<dyn Logger>,
    pub(crate) buffer: Arc<Mutex<String>>,
    pub(crate) progress: Arc<Mutex<Option<ProgressModel>>>,
    pub(crate) updates: Option<mpsc::Sender<ProgressModel>>,
}

impl OutputPump {
    /// Run the pump on its own task. The handle resolves once the stream hits
    /// end of data or fails to read; that is the pump's completion signal.
    pub(crate) fn spawn<R>(self, reader: R) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(async move { self.run(reader).await })
    }

    async fn run<R>(self, reader: R)
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&raw);
                    self.handle_line(text.trim_end_matches(['\n', '\r']));
                }
                Err(e) => {
                    self.logger
                        .error(&format!("error reading {}: {e}", self.stream));
                    break;
                }
            }
        }
        self.logger.debug(&format!("{} closed", self.stream));
    }

    fn handle_line(&self, line: &str) {
        {
            let mut buffer = lock(&self.buffer);
            buffer.push_str(line);
            buffer.push('\n');
        }

        if let Some(snapshot) = self.classify(line)
            && let Some(tx) = &self.updates
        {
            // Dropped when the consumer lags; the final result still has the latest state.
            let _ = tx.try_send(snapshot);
        }

        if classify::is_important(line) {
            self.logger.info(line);
        }
    }

    fn classify(&self, line: &str) -> Option<ProgressModel> {
        let mut slot = lock(&self.progress);
        match slot.as_mut() {
            Some(model) => classify::parse(line, model).then(|| model.clone()),
            None => {
                let mut model = ProgressModel::default();
                if !classify::parse(line, &mut model) {
                    return None;
                }
                *slot = Some(model.clone());
                Some(model)
            }
        }
    }
}
