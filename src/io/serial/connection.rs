// src/io/serial/connection.rs
//
// SerialConnection: owns one device handle and its open/close lifecycle,
// applies line settings, and hands out the feeds of the background reader.
//
// Every state transition happens under a single connection lock. The reader
// publishes without that lock; tearing it down (close) holds it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::io::device::{DeviceOpener, SerialDevice};
use crate::io::error::SerialError;

use super::feed::{FanOut, Feed};
use super::line_settings::{apply_line_settings, SerialSettings};
use super::reader::ReaderTask;
use super::tty::TtyOpener;
use super::utils::{AccessMode, OpenMode};

// ============================================================================
// State
// ============================================================================

/// Mutable state guarded by the connection lock
#[derive(Default)]
pub(super) struct ConnectionState {
    /// Present iff the connection is open
    pub(super) device: Option<Arc<dyn SerialDevice>>,
    pub(super) access: Option<AccessMode>,
    /// Last applied VTIME, reused as the write-readiness bound
    pub(super) pending_timeout: u8,
    reader: Option<ReaderTask>,
    fan_out: Option<Arc<FanOut>>,
    raw_chunk_feed: Option<Feed<Vec<u8>>>,
    byte_feed: Option<Feed<u8>>,
    line_feed: Option<Feed<String>>,
}

impl ConnectionState {
    /// Fan-out of the current session, checking open and read access
    fn read_session(&self) -> Result<&Arc<FanOut>, SerialError> {
        if self.device.is_none() {
            return Err(SerialError::MustBeOpen);
        }
        self.fan_out.as_ref().ok_or(SerialError::MustBeOpenForReading)
    }
}

// ============================================================================
// Connection
// ============================================================================

/// One serial device, open or not yet open.
///
/// All methods take `&self`; share the connection between threads with `Arc`.
pub struct SerialConnection {
    device_path: PathBuf,
    label: String,
    opener: Arc<dyn DeviceOpener>,
    state: Mutex<ConnectionState>,
}

impl SerialConnection {
    /// A closed connection to the character device at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_opener(path, Arc::new(TtyOpener))
    }

    /// A closed connection whose handles come from `opener`
    pub fn with_opener(path: impl Into<PathBuf>, opener: Arc<dyn DeviceOpener>) -> Self {
        let device_path = path.into();
        SerialConnection {
            label: device_path.display().to_string(),
            device_path,
            opener,
            state: Mutex::new(ConnectionState::default()),
        }
    }

    pub fn device_path(&self) -> &Path {
        &self.device_path
    }

    pub(super) fn label(&self) -> &str {
        &self.label
    }

    pub(super) fn lock(&self) -> Result<MutexGuard<'_, ConnectionState>, SerialError> {
        self.state.lock().map_err(|_| SerialError::lock_poisoned())
    }

    pub fn is_open(&self) -> bool {
        self.lock().map(|state| state.device.is_some()).unwrap_or(false)
    }

    /// Access mode of the current session (None when closed)
    pub fn access_mode(&self) -> Option<AccessMode> {
        self.lock().ok().and_then(|state| state.access)
    }

    /// Whether a background reader is running for the current session
    pub fn is_reading(&self) -> bool {
        self.lock()
            .map(|state| state.reader.as_ref().map(ReaderTask::is_running).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Inter-character timeout stored by the last `set_settings`, in tenths of a second
    pub fn pending_timeout(&self) -> u8 {
        self.lock().map(|state| state.pending_timeout).unwrap_or(0)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open the device. With read access the background reader starts before
    /// this returns and the raw-chunk feed exists.
    pub fn open(&self, mode: OpenMode) -> Result<(), SerialError> {
        let mut state = self.lock()?;
        if state.device.is_some() {
            return Err(SerialError::AlreadyOpen);
        }

        let device = self.opener.open(&self.device_path, &mode)?;

        if mode.access.can_read() {
            let fan_out = Arc::new(FanOut::new());
            let raw_chunk_feed = fan_out.attach_raw();
            let reader = ReaderTask::spawn(self.label.clone(), device.clone(), fan_out.clone())
                .map_err(SerialError::from_io)?;

            state.fan_out = Some(fan_out);
            state.raw_chunk_feed = Some(raw_chunk_feed);
            state.reader = Some(reader);
        }

        state.device = Some(device);
        state.access = Some(mode.access);

        tlog!("[serial:{}] Opened ({:?})", self.label, mode.access);
        Ok(())
    }

    /// Apply line settings to the open device and commit them immediately.
    ///
    /// Note: tcsetattr reports success when any part of the request was
    /// honoured, so a driver that silently drops part of it goes unnoticed.
    pub fn set_settings(&self, settings: &SerialSettings) -> Result<(), SerialError> {
        let mut state = self.lock()?;
        let device = state.device.as_ref().ok_or(SerialError::MustBeOpen)?;

        let mut attributes = device.attributes().map_err(SerialError::from_io)?;
        apply_line_settings(&mut attributes, settings);
        device.set_attributes(&attributes).map_err(SerialError::from_io)?;

        state.pending_timeout = settings.timeout;

        tlog!(
            "[serial:{}] Applied {} (vmin {}, vtime {}, rtscts {}, xonxoff {}, opost {})",
            self.label,
            settings.summary(),
            settings.min_bytes_to_read,
            settings.timeout,
            settings.hardware_flow_control,
            settings.software_flow_control,
            settings.output_processing
        );
        Ok(())
    }

    /// Cancel the reader, end all feeds and release the handle.
    /// Safe to call on a closed connection.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        // Producer first, so nothing reads from a released descriptor
        if let Some(mut reader) = state.reader.take() {
            reader.cancel();
        }
        state.fan_out = None;
        state.raw_chunk_feed = None;
        state.byte_feed = None;
        state.line_feed = None;

        if state.device.take().is_some() {
            state.access = None;
            tlog!("[serial:{}] Closed", self.label);
        }
    }

    // ========================================================================
    // Feeds
    // ========================================================================

    /// Raw chunks as read from the device
    pub fn raw_chunks(&self) -> Result<Feed<Vec<u8>>, SerialError> {
        let state = self.lock()?;
        state.read_session()?;
        state
            .raw_chunk_feed
            .clone()
            .ok_or(SerialError::MustBeOpenForReading)
    }

    /// Individual bytes, in read order. Created on first request.
    pub fn bytes(&self) -> Result<Feed<u8>, SerialError> {
        let mut state = self.lock()?;
        if let Some(feed) = &state.byte_feed {
            return Ok(feed.clone());
        }
        let feed = state.read_session()?.attach_bytes();
        state.byte_feed = Some(feed.clone());
        Ok(feed)
    }

    /// Newline-terminated lines (delimiter included). Created on first request.
    pub fn lines(&self) -> Result<Feed<String>, SerialError> {
        let mut state = self.lock()?;
        if let Some(feed) = &state.line_feed {
            return Ok(feed.clone());
        }
        let feed = state.read_session()?.attach_lines();
        state.line_feed = Some(feed.clone());
        Ok(feed)
    }
}

impl Drop for SerialConnection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SerialConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialConnection")
            .field("device_path", &self.device_path)
            .field("open", &self.is_open())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
