use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "sched-console.log";

/// Keeps the log file handle alive for the lifetime of the process.
pub struct LogGuard {
    pub path: Option<PathBuf>,
    _file: Option<Arc<Mutex<File>>>,
}

struct SharedFile(Arc<Mutex<File>>);

impl Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut file) = self.0.lock() {
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Ok(mut file) = self.0.lock() {
            let _ = file.flush();
        }
        Ok(())
    }
}

pub fn init_logging(debug: bool, log_dir: Option<&Path>) -> LogGuard {
    let filter = build_filter(debug);

    if env_true("SCHED_LOG_STDOUT") {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        return LogGuard {
            path: None,
            _file: None,
        };
    }

    let dir = log_dir.map(Path::to_path_buf).unwrap_or_else(default_log_dir);
    let (path, file) = match open_log_file(&dir) {
        Ok((path, file)) => (Some(path), Some(Arc::new(Mutex::new(file)))),
        Err(_) => (None, None),
    };
    let make_writer = match &file {
        Some(file) => {
            let file = file.clone();
            BoxMakeWriter::new(move || SharedFile(file.clone()))
        }
        None => BoxMakeWriter::new(io::sink),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(make_writer)
        .try_init();
    LogGuard { path, _file: file }
}

fn build_filter(debug: bool) -> EnvFilter {
    if debug {
        return EnvFilter::new("debug");
    }
    let level = std::env::var("SCHED_LOG_LEVEL")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "info".to_string());
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn default_log_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|dir| dir.join("sched-console"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn open_log_file(dir: &Path) -> io::Result<(PathBuf, File)> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}

fn env_true(key: &str) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}
