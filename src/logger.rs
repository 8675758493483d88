use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info};

/// Per-run log sink
///
/// Entries are echoed to the console through tracing and accumulated in
/// memory; `flush` writes them under the root directory as
/// `log-<start-timestamp>.txt`, plus `errors-<start-timestamp>.txt` when any
/// error entries were recorded. The buffers are mutex-guarded so concurrent
/// synchronization tasks can append freely.
pub struct RunLog {
    entries: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
    started: DateTime<Local>,
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            started: Local::now(),
        }
    }

    /// Record an informational entry, optionally scoped to one repository.
    pub fn log(&self, message: &str, repo: Option<&str>) {
        let entry = format_entry(Local::now(), message, repo);
        info!("{}", entry);
        self.entries
            .lock()
            .expect("log buffer poisoned")
            .push(entry);
    }

    /// Record an error entry; it lands in both the run log and the error log.
    pub fn error(&self, message: &str, repo: Option<&str>) {
        let entry = format_entry(Local::now(), message, repo);
        error!("{}", entry);
        self.entries
            .lock()
            .expect("log buffer poisoned")
            .push(entry.clone());
        self.errors
            .lock()
            .expect("error buffer poisoned")
            .push(entry);
    }

    /// Write accumulated entries to disk under `directory` and clear the
    /// buffers. Returns the path of the run log file.
    pub async fn flush(&self, directory: &Path) -> std::io::Result<PathBuf> {
        self.log("Flushing log", None);

        let entries = {
            let mut entries = self.entries.lock().expect("log buffer poisoned");
            std::mem::take(&mut *entries)
        };
        let errors = {
            let mut errors = self.errors.lock().expect("error buffer poisoned");
            std::mem::take(&mut *errors)
        };

        let log_path = directory.join(self.file_name("log"));
        tokio::fs::write(&log_path, entries.join("\n")).await?;

        if !errors.is_empty() {
            let errors_path = directory.join(self.file_name("errors"));
            tokio::fs::write(&errors_path, errors.join("\n")).await?;
        }

        Ok(log_path)
    }

    /// True when at least one error entry was recorded.
    pub fn has_errors(&self) -> bool {
        !self.errors.lock().expect("error buffer poisoned").is_empty()
    }

    fn file_name(&self, prefix: &str) -> String {
        format!("{}-{}.txt", prefix, self.started.format("%Y-%m-%d-%H-%M-%S"))
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

fn format_entry(time: DateTime<Local>, message: &str, repo: Option<&str>) -> String {
    match repo {
        Some(repo) => format!("[{}] {} [{}]", time.format("%Y-%m-%d %H:%M:%S"), message, repo),
        None => format!("[{}] {}", time.format("%Y-%m-%d %H:%M:%S"), message),
    }
}
