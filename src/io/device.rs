// src/io/device.rs
//
// Device abstraction for serial connections.
// A SerialConnection talks to its handle only through these traits, so the
// tty backend can be swapped for a scripted device in tests.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::io::error::SerialError;
use crate::io::serial::OpenMode;

// ============================================================================
// Line Attributes
// ============================================================================

/// Snapshot of a device's line discipline (the termios fields the connection
/// manipulates). Flag words and speeds use the platform's libc types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineAttributes {
    pub input_flags: libc::tcflag_t,
    pub output_flags: libc::tcflag_t,
    pub control_flags: libc::tcflag_t,
    pub local_flags: libc::tcflag_t,
    pub control_chars: [libc::cc_t; libc::NCCS],
    pub input_speed: libc::speed_t,
    pub output_speed: libc::speed_t,
}

impl Default for LineAttributes {
    fn default() -> Self {
        LineAttributes {
            input_flags: 0,
            output_flags: 0,
            control_flags: 0,
            local_flags: 0,
            control_chars: [0; libc::NCCS],
            input_speed: libc::B0,
            output_speed: libc::B0,
        }
    }
}

// ============================================================================
// Readiness
// ============================================================================

/// Outcome of a bounded writability wait
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// The wait finished before the timeout. `in_ready_set` reports whether the
    /// handle itself was flagged writable.
    Ready { in_ready_set: bool },
    /// The timeout elapsed with nothing ready
    TimedOut,
}

// ============================================================================
// Device Traits
// ============================================================================

/// An open serial handle.
///
/// Errors are raw `io::Error`s so callers can distinguish `Interrupted` and
/// `WouldBlock` from real failures.
pub trait SerialDevice: Send + Sync {
    /// One read of at most `buf.len()` bytes
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// One write; may accept fewer bytes than offered
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Wait up to `timeout` for input. Returns false when nothing arrived.
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool>;

    /// Wait up to `timeout` for the handle to accept output
    fn wait_writable(&self, timeout: Duration) -> io::Result<Readiness>;

    /// Fetch the current line discipline
    fn attributes(&self) -> io::Result<LineAttributes>;

    /// Commit a line discipline immediately
    fn set_attributes(&self, attributes: &LineAttributes) -> io::Result<()>;
}

/// Opens device handles for a path
pub trait DeviceOpener: Send + Sync {
    fn open(&self, path: &Path, mode: &OpenMode) -> Result<Arc<dyn SerialDevice>, SerialError>;
}
