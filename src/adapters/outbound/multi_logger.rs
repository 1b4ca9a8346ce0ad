use crate::domains::logger::{DomainLogger, DynLogger};
use std::sync::Arc;

use super::FileLogGuard;

/// Forwards every line to each of its targets in order.
pub struct MultiLogger {
    targets: Vec<DynLogger>,
}

impl MultiLogger {
    pub fn new(targets: Vec<DynLogger>) -> Self {
        Self { targets }
    }
}

impl DomainLogger for MultiLogger {
    fn debug(&self, msg: &str) {
        self.targets.iter().for_each(|t| t.debug(msg));
    }

    fn info(&self, msg: &str) {
        self.targets.iter().for_each(|t| t.info(msg));
    }

    fn warn(&self, msg: &str) {
        self.targets.iter().for_each(|t| t.warn(msg));
    }

    fn error(&self, msg: &str) {
        self.targets.iter().for_each(|t| t.error(msg));
    }
}

/// Console output plus, when `log_file` is set, a file copy. Falls back to
/// the console alone if the file cannot be opened.
pub fn init_combined_logger(
    log_file: Option<&str>,
    debug: bool,
) -> (DynLogger, Option<FileLogGuard>) {
    let console = super::init_console_logger();
    let Some(path) = log_file else {
        return (console, None);
    };
    match super::init_file_logger(path, debug) {
        Ok((file, guard)) => (Arc::new(MultiLogger::new(vec![console, file])), Some(guard)),
        Err(e) => {
            console.warn(&format!("file logging disabled: {}", e));
            (console, None)
        }
    }
}
