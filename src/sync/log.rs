/// Write-only progress sink for the sync job.
pub trait SyncLog {
    fn log(&self, message: &str, level: usize);
}

/// Forwards to `tracing`; the caller's span carries the run id.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl SyncLog for TracingLog {
    fn log(&self, message: &str, level: usize) {
        tracing::info!(indent = level, "{}{}", "  ".repeat(level), message);
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryLog {
    pub lines: std::cell::RefCell<Vec<(usize, String)>>,
}

#[cfg(test)]
impl SyncLog for MemoryLog {
    fn log(&self, message: &str, level: usize) {
        self.lines.borrow_mut().push((level, message.to_string()));
    }
}
