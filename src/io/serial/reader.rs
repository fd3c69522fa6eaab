// src/io/serial/reader.rs
//
// Background reader for an open serial connection.
// Runs blocking device I/O on a dedicated thread: waits for readability,
// performs one bounded read and publishes the chunk into the FanOut.
// Cancellation is an explicit call that stops the loop and waits for it.

use std::io;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::io::device::SerialDevice;

use super::feed::FanOut;

// ============================================================================
// Constants
// ============================================================================

/// Largest chunk taken from the device per wakeup
pub const READ_CHUNK_SIZE: usize = 1024;

/// Upper bound on how long the loop goes without checking for cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(20);

// ============================================================================
// Reader Task
// ============================================================================

/// Owned handle to the producer thread of one open session
pub struct ReaderTask {
    label: String,
    cancel_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    fan_out: Arc<FanOut>,
}

impl ReaderTask {
    /// Start the producer for `device`, publishing into `fan_out`
    pub fn spawn(
        label: String,
        device: Arc<dyn SerialDevice>,
        fan_out: Arc<FanOut>,
    ) -> io::Result<Self> {
        let cancel_flag = Arc::new(AtomicBool::new(false));

        let thread_label = label.clone();
        let thread_cancel = cancel_flag.clone();
        let thread_fan_out = fan_out.clone();
        let handle = std::thread::Builder::new()
            .name(format!("serialwire-reader {}", label))
            .spawn(move || run_reader_blocking(thread_label, device, thread_fan_out, thread_cancel))?;

        Ok(ReaderTask {
            label,
            cancel_flag,
            handle: Some(handle),
            fan_out,
        })
    }

    /// Stop the producer and wait until it no longer touches the device.
    /// All feeds have ended once this returns.
    pub fn cancel(&mut self) {
        self.cancel_flag.store(true, Ordering::SeqCst);

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tlog!("[serial:{}] Reader thread panicked", self.label);
            }
        }

        // The loop finishes the fan-out on exit; repeat it in case it panicked
        self.fan_out.finish();
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for ReaderTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Producer loop. Empty reads, EAGAIN and EINTR publish nothing for that
/// wakeup; other read errors are logged and retried after the poll interval.
fn run_reader_blocking(
    label: String,
    device: Arc<dyn SerialDevice>,
    fan_out: Arc<FanOut>,
    cancel_flag: Arc<AtomicBool>,
) {
    let mut buf = [0u8; READ_CHUNK_SIZE];
    let mut total_bytes_read: u64 = 0;
    let mut last_error: Option<io::ErrorKind> = None;

    tlog!("[serial:{}] Reader started", label);

    while !cancel_flag.load(Ordering::SeqCst) {
        match device.wait_readable(POLL_INTERVAL) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                if last_error != Some(e.kind()) {
                    tlog!("[serial:{}] Readiness wait failed: {}", label, e);
                    last_error = Some(e.kind());
                }
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }
        }

        match device.read(&mut buf) {
            Ok(n) if n > 0 => {
                total_bytes_read += n as u64;
                last_error = None;
                fan_out.publish(&buf[..n]);
            }
            Ok(_) => {
                // Readable but empty (e.g. hang-up); avoid spinning on it
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(ref e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                if last_error != Some(e.kind()) {
                    tlog!("[serial:{}] Read error: {}", label, e);
                    last_error = Some(e.kind());
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }

    // Cancellation handler: every feed observes end-of-sequence
    fan_out.finish();

    tlog!(
        "[serial:{}] Reader stopped after {} bytes",
        label,
        total_bytes_read
    );
}

// ============================================================================
// Tests
// ============================================================================
