use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Name of the symlink that always points at the newest log file
pub const LATEST_LOG_NAME: &str = "serialwire.log";

/// Global log file handle. When `Some`, `tlog!` also appends to this file.
pub(crate) static LOG_FILE: Mutex<Option<std::fs::File>> = Mutex::new(None);

/// When false, `tlog!` only writes to the log file.
static STDERR_ENABLED: AtomicBool = AtomicBool::new(true);

fn timestamp() -> chrono::format::DelayedFormat<chrono::format::StrftimeItems<'static>> {
    chrono::Local::now().format("%H:%M:%S%.3f")
}

/// Start file logging in `log_dir`.
/// Creates a timestamped log file and points the `serialwire.log` symlink at it
/// (Unix only). Returns the path of the new file.
pub fn init_file_logging(log_dir: &Path) -> Result<PathBuf, String> {
    std::fs::create_dir_all(log_dir)
        .map_err(|e| format!("Failed to create log dir {}: {}", log_dir.display(), e))?;

    let filename = chrono::Local::now()
        .format("%Y%m%d-%H%M%S-serialwire.log")
        .to_string();
    let log_path = log_dir.join(&filename);

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| format!("Failed to create log file: {}", e))?;

    #[cfg(unix)]
    {
        let symlink_path = log_dir.join(LATEST_LOG_NAME);
        let _ = std::fs::remove_file(&symlink_path);
        if let Err(e) = std::os::unix::fs::symlink(&filename, &symlink_path) {
            eprintln!("{} [logging] Failed to create {} symlink: {}", timestamp(), LATEST_LOG_NAME, e);
        }
    }

    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }

    // Not tlog!: announce on stderr only
    eprintln!("{} [logging] File logging started: {}", timestamp(), log_path.display());

    Ok(log_path)
}

/// Stop file logging and close the log file.
pub fn stop_file_logging() {
    if let Ok(mut guard) = LOG_FILE.lock() {
        if guard.take().is_some() {
            eprintln!("{} [logging] File logging stopped", timestamp());
        }
    }
}

/// Silence (or restore) the stderr copy of every log line.
/// Interactive front-ends use this so log output does not interleave with
/// device traffic; the log file is unaffected.
pub fn set_stderr_logging(enabled: bool) {
    STDERR_ENABLED.store(enabled, Ordering::SeqCst);
}

#[doc(hidden)]
pub fn write_log_line(args: std::fmt::Arguments<'_>) {
    use std::io::Write as _;

    let msg = format!("{} {}", timestamp(), args);
    if STDERR_ENABLED.load(Ordering::SeqCst) {
        eprintln!("{}", msg);
    }
    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(ref mut f) = *guard {
            let _ = writeln!(f, "{}", msg);
        }
    }
}

/// Timestamped logging macro.
/// Prepends `HH:MM:SS.mmm` local time; writes to stderr and, when enabled,
/// the log file.
macro_rules! tlog {
    ($($arg:tt)*) => {
        $crate::logging::write_log_line(format_args!($($arg)*))
    };
}
