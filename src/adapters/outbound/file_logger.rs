use chrono::Local;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::common::{SimError, SimResult};
use crate::domains::logger::{DomainLogger, DynLogger};

#[derive(Debug, Clone, Copy)]
enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

/// Appends timestamped lines to a file. Writes happen on a background task
/// so logging never blocks the caller.
struct FileLogger {
    sender: mpsc::UnboundedSender<String>,
    debug: bool,
}

impl FileLogger {
    fn push(&self, level: Level, msg: &str) {
        let line = format!(
            "{} [{}] {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            level.label(),
            msg
        );
        // The writer only goes away with the runtime.
        let _ = self.sender.send(line);
    }
}

impl DomainLogger for FileLogger {
    fn debug(&self, msg: &str) {
        if self.debug {
            self.push(Level::Debug, msg);
        }
    }

    fn info(&self, msg: &str) {
        self.push(Level::Info, msg);
    }

    fn warn(&self, msg: &str) {
        self.push(Level::Warn, msg);
    }

    fn error(&self, msg: &str) {
        self.push(Level::Error, msg);
    }
}

/// Handle on the writer task. The task ends once every logger clone is
/// dropped and the queued lines are written.
pub struct FileLogGuard {
    writer: JoinHandle<()>,
}

impl FileLogGuard {
    /// Waits (bounded) for queued lines to reach the file.
    pub async fn finish(self) {
        let _ = tokio::time::timeout(Duration::from_secs(2), self.writer).await;
    }
}

/// Opens `path` for appending and starts the writer task. Must be called
/// from within a tokio runtime.
pub fn init_file_logger<P: AsRef<Path>>(
    path: P,
    debug: bool,
) -> SimResult<(DynLogger, FileLogGuard)> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            SimError::Configuration(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SimError::Configuration(format!("cannot open {}: {}", path.display(), e)))?;
    let mut file = tokio::fs::File::from_std(file);

    let (sender, mut lines) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        while let Some(line) = lines.recv().await {
            if file.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if file.flush().await.is_err() {
                break;
            }
        }
    });

    Ok((Arc::new(FileLogger { sender, debug }), FileLogGuard { writer }))
}
