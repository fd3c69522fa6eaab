// src/io/serial/testing.rs
//
// Scripted serial device for tests that must not depend on real hardware.

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::io::device::{DeviceOpener, LineAttributes, Readiness, SerialDevice};
use crate::io::error::SerialError;
use crate::io::serial::utils::OpenMode;

/// Longest a scripted wait actually sleeps
const MAX_SCRIPTED_WAIT: Duration = Duration::from_millis(5);

/// In-memory device. Input is served one scripted chunk per read; writes are
/// recorded and optionally capped per call.
pub struct ScriptedDevice {
    input: Mutex<VecDeque<Vec<u8>>>,
    read_errors: Mutex<VecDeque<io::Error>>,
    written: Mutex<Vec<u8>>,
    write_calls: AtomicUsize,
    max_write: Mutex<Option<usize>>,
    writable: AtomicBool,
    readiness_script: Mutex<VecDeque<io::Result<Readiness>>>,
    attributes: Mutex<LineAttributes>,
    fail_attributes: Mutex<Option<i32>>,
    set_attribute_calls: AtomicUsize,
}

impl ScriptedDevice {
    pub fn new() -> Self {
        ScriptedDevice {
            input: Mutex::new(VecDeque::new()),
            read_errors: Mutex::new(VecDeque::new()),
            written: Mutex::new(Vec::new()),
            write_calls: AtomicUsize::new(0),
            max_write: Mutex::new(None),
            writable: AtomicBool::new(true),
            readiness_script: Mutex::new(VecDeque::new()),
            attributes: Mutex::new(LineAttributes::default()),
            fail_attributes: Mutex::new(None),
            set_attribute_calls: AtomicUsize::new(0),
        }
    }

    pub fn push_input(&self, chunk: &[u8]) {
        self.input.lock().unwrap().push_back(chunk.to_vec());
    }

    pub fn fail_next_read(&self, err: io::Error) {
        self.read_errors.lock().unwrap().push_back(err);
    }

    /// Accept at most `max` bytes per write call
    pub fn limit_writes(&self, max: usize) {
        *self.max_write.lock().unwrap() = Some(max);
    }

    pub fn set_writable(&self, writable: bool) {
        self.writable.store(writable, Ordering::SeqCst);
    }

    /// Queue an outcome returned by the next writability wait
    pub fn script_readiness(&self, outcome: io::Result<Readiness>) {
        self.readiness_script.lock().unwrap().push_back(outcome);
    }

    pub fn fail_attributes(&self, errno: i32) {
        *self.fail_attributes.lock().unwrap() = Some(errno);
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn current_attributes(&self) -> LineAttributes {
        self.attributes.lock().unwrap().clone()
    }

    pub fn set_attribute_calls(&self) -> usize {
        self.set_attribute_calls.load(Ordering::SeqCst)
    }
}

impl SerialDevice for ScriptedDevice {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.read_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        let mut input = self.input.lock().unwrap();
        let Some(chunk) = input.front_mut() else {
            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        chunk.drain(..n);
        if chunk.is_empty() {
            input.pop_front();
        }
        Ok(n)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let n = match *self.max_write.lock().unwrap() {
            Some(max) => buf.len().min(max),
            None => buf.len(),
        };
        self.written.lock().unwrap().extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        let pending = !self.input.lock().unwrap().is_empty() || !self.read_errors.lock().unwrap().is_empty();
        if !pending {
            std::thread::sleep(timeout.min(MAX_SCRIPTED_WAIT));
        }
        Ok(pending)
    }

    fn wait_writable(&self, timeout: Duration) -> io::Result<Readiness> {
        if let Some(outcome) = self.readiness_script.lock().unwrap().pop_front() {
            return outcome;
        }
        if self.writable.load(Ordering::SeqCst) {
            Ok(Readiness::Ready { in_ready_set: true })
        } else {
            std::thread::sleep(timeout.min(MAX_SCRIPTED_WAIT));
            Ok(Readiness::TimedOut)
        }
    }

    fn attributes(&self) -> io::Result<LineAttributes> {
        if let Some(errno) = *self.fail_attributes.lock().unwrap() {
            return Err(io::Error::from_raw_os_error(errno));
        }
        Ok(self.attributes.lock().unwrap().clone())
    }

    fn set_attributes(&self, attributes: &LineAttributes) -> io::Result<()> {
        self.set_attribute_calls.fetch_add(1, Ordering::SeqCst);
        *self.attributes.lock().unwrap() = attributes.clone();
        Ok(())
    }
}

/// Hands out a fresh ScriptedDevice per open and remembers each one
#[derive(Default)]
pub struct ScriptedOpener {
    opened: Mutex<Vec<(PathBuf, OpenMode, Arc<ScriptedDevice>)>>,
    fail_with: Mutex<Option<i32>>,
}

impl ScriptedOpener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next_open(&self, errno: i32) {
        *self.fail_with.lock().unwrap() = Some(errno);
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn last_device(&self) -> Arc<ScriptedDevice> {
        self.opened
            .lock()
            .unwrap()
            .last()
            .map(|(_, _, device)| device.clone())
            .expect("no device opened yet")
    }

    pub fn last_mode(&self) -> OpenMode {
        self.opened
            .lock()
            .unwrap()
            .last()
            .map(|(_, mode, _)| *mode)
            .expect("no device opened yet")
    }
}

impl DeviceOpener for ScriptedOpener {
    fn open(&self, path: &Path, mode: &OpenMode) -> Result<Arc<dyn SerialDevice>, SerialError> {
        if let Some(errno) = self.fail_with.lock().unwrap().take() {
            return Err(SerialError::from_open(
                &path.display().to_string(),
                io::Error::from_raw_os_error(errno),
            ));
        }
        let device = Arc::new(ScriptedDevice::new());
        self.opened
            .lock()
            .unwrap()
            .push((path.to_path_buf(), *mode, device.clone()));
        Ok(device)
    }
}
