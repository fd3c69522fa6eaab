// src/io/serial/tty.rs
//
// termios-backed serial device for Unix character devices.
// Opens the device with open(2) flags from OpenMode, waits for readiness with
// poll(2) and reads/writes the descriptor directly.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::io::device::{DeviceOpener, LineAttributes, Readiness, SerialDevice};
use crate::io::error::SerialError;
use crate::io::serial::utils::OpenMode;

// ============================================================================
// Opener
// ============================================================================

/// Opens real character devices
#[derive(Clone, Copy, Debug, Default)]
pub struct TtyOpener;

impl DeviceOpener for TtyOpener {
    fn open(&self, path: &Path, mode: &OpenMode) -> Result<Arc<dyn SerialDevice>, SerialError> {
        let device = TtyDevice::open(path, mode)?;
        Ok(Arc::new(device))
    }
}

// ============================================================================
// Device
// ============================================================================

/// An open tty. Closing happens when the last reference is dropped.
#[derive(Debug)]
pub struct TtyDevice {
    file: File,
}

impl TtyDevice {
    pub fn open(path: &Path, mode: &OpenMode) -> Result<Self, SerialError> {
        let path_str = path.display().to_string();

        let file = OpenOptions::new()
            .read(mode.access.can_read())
            .write(mode.access.can_write())
            .custom_flags(mode.custom_flags())
            .open(path)
            .map_err(|e| SerialError::from_open(&path_str, e))?;

        if mode.shared_lock && !cfg!(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd",
            target_os = "dragonfly"
        )) {
            tlog!("[tty:{}] Shared lock not supported on this platform, ignoring", path_str);
        }

        if mode.exclusive {
            // SAFETY: the descriptor is owned by `file` and stays valid for the call
            let rc = unsafe { libc::ioctl(file.as_raw_fd(), libc::TIOCEXCL as _) };
            if rc != 0 {
                return Err(SerialError::from_io(io::Error::last_os_error()));
            }
        }

        Ok(TtyDevice { file })
    }

    fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    fn get_termios(&self) -> io::Result<libc::termios> {
        // SAFETY: termios is plain data; tcgetattr fills it completely on success
        let mut termios: libc::termios = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::tcgetattr(self.fd(), &mut termios) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(termios)
    }

    fn poll(&self, events: libc::c_short, timeout: Duration) -> io::Result<Option<libc::c_short>> {
        let mut fds = [libc::pollfd {
            fd: self.fd(),
            events,
            revents: 0,
        }];
        let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        // SAFETY: fds is a valid array of one pollfd for the duration of the call
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), 1, timeout_ms) };
        match rc {
            rc if rc < 0 => Err(io::Error::last_os_error()),
            0 => Ok(None),
            _ => {
                if fds[0].revents & libc::POLLNVAL != 0 {
                    return Err(io::Error::from_raw_os_error(libc::EBADF));
                }
                Ok(Some(fds[0].revents))
            }
        }
    }
}

impl SerialDevice for TtyDevice {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.file).read(buf)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        (&self.file).write(buf)
    }

    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        // Hang-ups and errors count as readable so the following read reports them
        let ready = libc::POLLIN | libc::POLLHUP | libc::POLLERR;
        Ok(self
            .poll(libc::POLLIN, timeout)?
            .map(|revents| revents & ready != 0)
            .unwrap_or(false))
    }

    fn wait_writable(&self, timeout: Duration) -> io::Result<Readiness> {
        // Same convention as select(2): an error condition marks the handle writable
        let ready = libc::POLLOUT | libc::POLLHUP | libc::POLLERR;
        Ok(match self.poll(libc::POLLOUT, timeout)? {
            None => Readiness::TimedOut,
            Some(revents) => Readiness::Ready {
                in_ready_set: revents & ready != 0,
            },
        })
    }

    fn attributes(&self) -> io::Result<LineAttributes> {
        let termios = self.get_termios()?;
        // SAFETY: cfget*speed only read the struct
        let (input_speed, output_speed) =
            unsafe { (libc::cfgetispeed(&termios), libc::cfgetospeed(&termios)) };
        Ok(LineAttributes {
            input_flags: termios.c_iflag,
            output_flags: termios.c_oflag,
            control_flags: termios.c_cflag,
            local_flags: termios.c_lflag,
            control_chars: termios.c_cc,
            input_speed,
            output_speed,
        })
    }

    fn set_attributes(&self, attributes: &LineAttributes) -> io::Result<()> {
        // Start from the live struct so platform-private fields are preserved
        let mut termios = self.get_termios()?;
        termios.c_iflag = attributes.input_flags;
        termios.c_oflag = attributes.output_flags;
        termios.c_cflag = attributes.control_flags;
        termios.c_lflag = attributes.local_flags;
        termios.c_cc = attributes.control_chars;

        // SAFETY: termios is a valid, initialised struct owned by this frame
        unsafe {
            if libc::cfsetispeed(&mut termios, attributes.input_speed) != 0 {
                return Err(io::Error::last_os_error());
            }
            if libc::cfsetospeed(&mut termios, attributes.output_speed) != 0 {
                return Err(io::Error::last_os_error());
            }
            if libc::tcsetattr(self.fd(), libc::TCSANOW, &termios) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
