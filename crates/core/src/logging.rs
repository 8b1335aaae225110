use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Directory used for index command logs when none is configured.
pub const DEFAULT_INDEX_LOG_DIR: &str = "/tmp/logs";
const INDEX_LOG_SUFFIX: &str = "-index.log";

pub fn init_logging(component: &str, to_stderr: bool) -> WorkerGuard {
    let log_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".shenma/logs");
    let _ = std::fs::create_dir_all(&log_dir);

    // Roll daily, with the component name as the prefix
    let file_appender = tracing_appender::rolling::daily(&log_dir, component);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if to_stderr {
        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false);
        registry.with(stderr_layer).init();
    } else {
        registry.init();
    }

    guard
}

/// Raw log of build and index subprocess output for one codebase.
///
/// Cloning shares the underlying writer, so child stdout and stderr can be
/// copied into it from separate threads.
#[derive(Clone)]
pub struct IndexLog {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl IndexLog {
    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::from_writer(Box::new(io::stdout()))
    }

    /// Opens `<log_dir>/<codebase path, "/" as "_">-index.log` in append mode,
    /// falling back to stdout when the file cannot be created.
    pub fn open(log_dir: Option<&Path>, codebase_path: &Path) -> Self {
        let dir = log_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INDEX_LOG_DIR));
        let file_name = format!("{}{INDEX_LOG_SUFFIX}", log_file_prefix(codebase_path));
        let opened = fs::create_dir_all(&dir).and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(&file_name))
        });
        match opened {
            Ok(file) => Self::from_writer(Box::new(file)),
            Err(e) => {
                warn!(dir = %dir.display(), "failed to open index log, using stdout: {e}");
                Self::stdout()
            }
        }
    }

    /// Writes one timestamped line.
    pub fn info(&self, message: impl AsRef<str>) {
        let line = format!(
            "[{}] - {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            message.as_ref()
        );
        let _ = self.write_raw(line.as_bytes());
    }

    pub fn write_raw(&self, buf: &[u8]) -> io::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("index log lock poisoned"))?;
        guard.write_all(buf)
    }

    pub fn flush(&self) -> io::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("index log lock poisoned"))?;
        guard.flush()
    }
}

impl Write for IndexLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_raw(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        IndexLog::flush(self)
    }
}

fn log_file_prefix(codebase_path: &Path) -> String {
    codebase_path.to_string_lossy().replace('/', "_")
}

/// Removes index logs older than `retention_days`. Zero keeps everything.
pub fn clean_expired_index_logs(log_dir: &Path, retention_days: u32) -> usize {
    if retention_days == 0 {
        return 0;
    }
    let Ok(entries) = fs::read_dir(log_dir) else {
        return 0;
    };
    let max_age = Duration::from_secs(u64::from(retention_days) * 24 * 60 * 60);
    let now = SystemTime::now();
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_index_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(INDEX_LOG_SUFFIX));
        if !is_index_log {
            continue;
        }
        let expired = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > max_age);
        if expired {
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "removed expired index log");
                    removed += 1;
                }
                Err(e) => warn!(path = %path.display(), "failed to remove index log: {e}"),
            }
        }
    }
    removed
}
