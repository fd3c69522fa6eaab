// src/io/serial/transmit.rs
//
// Write path for an open SerialConnection.
// Each call holds the connection lock for its whole duration, so concurrent
// writers and close() are serialized against it. A call either delivers every
// byte or fails; partial writes are resumed until the buffer is drained.

use std::io;
use std::time::Duration;

use crate::io::device::Readiness;
use crate::io::error::SerialError;

use super::connection::SerialConnection;
use super::utils::TextEncoding;

/// Bound on each writability wait, from the stored timeout in tenths of a second.
/// A stored timeout of 0 gives a zero-length wait.
pub fn write_wait_bound(tenths: u8) -> Duration {
    Duration::from_millis(u64::from(tenths) * 100)
}

impl SerialConnection {
    /// Write every byte of `data`, returning the count written
    pub fn write_bytes(&self, data: &[u8]) -> Result<usize, SerialError> {
        let state = self.lock()?;
        let device = state.device.as_ref().ok_or(SerialError::MustBeOpen)?;
        let wait = write_wait_bound(state.pending_timeout);

        let mut written = 0;
        while written < data.len() {
            match device.wait_writable(wait) {
                Ok(Readiness::Ready { in_ready_set: true }) => {}
                Ok(Readiness::Ready { in_ready_set: false }) => {
                    return Err(SerialError::InternalInconsistency(
                        "readiness wait returned without the port in its ready set".to_string(),
                    ));
                }
                Ok(Readiness::TimedOut) => {
                    tlog!(
                        "[serial:{}] Write timed out after {} of {} bytes",
                        self.label(),
                        written,
                        data.len()
                    );
                    return Err(SerialError::Timeout);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SerialError::from_io(e)),
            }

            match device.write(&data[written..]) {
                Ok(0) => {
                    return Err(SerialError::from_io(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "serial port accepted no bytes",
                    )));
                }
                Ok(n) => written += n,
                // Nothing accepted this round
                Err(ref e)
                    if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(SerialError::from_io(e)),
            }
        }

        Ok(written)
    }

    /// Write an owned or borrowed byte buffer
    pub fn write_data(&self, data: impl AsRef<[u8]>) -> Result<usize, SerialError> {
        self.write_bytes(data.as_ref())
    }

    /// Encode `text` and write it. Nothing is written if encoding fails.
    pub fn write_string(&self, text: &str, encoding: TextEncoding) -> Result<usize, SerialError> {
        let bytes = encoding.encode(text)?;
        self.write_bytes(&bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::serial::line_settings::SerialSettings;
    use crate::io::serial::testing::{ScriptedDevice, ScriptedOpener};
    use crate::io::serial::utils::OpenMode;
    use std::sync::Arc;

    fn open_scripted(mode: OpenMode) -> (SerialConnection, Arc<ScriptedDevice>) {
        let opener = ScriptedOpener::new();
        let conn = SerialConnection::with_opener("/dev/ttyTEST1", opener.clone());
        conn.open(mode).unwrap();
        let device = opener.last_device();
        (conn, device)
    }

    #[test]
    fn test_wait_bound() {
        assert_eq!(write_wait_bound(0), Duration::ZERO);
        assert_eq!(write_wait_bound(5), Duration::from_millis(500));
        assert_eq!(write_wait_bound(255), Duration::from_millis(25_500));
    }

    #[test]
    fn test_partial_writes_are_resumed() {
        let (conn, device) = open_scripted(OpenMode::transmit());
        device.limit_writes(3);

        assert_eq!(conn.write_bytes(b"0123456789").unwrap(), 10);
        assert_eq!(device.write_calls(), 4);
        assert_eq!(device.written(), b"0123456789".to_vec());
    }

    #[test]
    fn test_empty_write_touches_nothing() {
        let (conn, device) = open_scripted(OpenMode::transmit());
        assert_eq!(conn.write_bytes(&[]).unwrap(), 0);
        assert_eq!(device.write_calls(), 0);
    }

    #[test]
    fn test_write_accepting_nothing_fails() {
        let (conn, device) = open_scripted(OpenMode::transmit());
        device.limit_writes(0);

        assert!(matches!(
            conn.write_bytes(b"stuck"),
            Err(SerialError::Os { code: 0, .. })
        ));
        assert_eq!(device.write_calls(), 1);
        // The lock was released
        assert!(conn.is_open());
    }

    #[test]
    fn test_unwritable_port_times_out() {
        let (conn, device) = open_scripted(OpenMode::receive_and_transmit());
        conn.set_settings(&SerialSettings { timeout: 1, ..Default::default() }).unwrap();
        device.set_writable(false);

        assert!(matches!(conn.write_bytes(b"abc"), Err(SerialError::Timeout)));
        assert_eq!(device.write_calls(), 0);
    }

    #[test]
    fn test_zero_timeout_still_writes_when_ready() {
        let (conn, device) = open_scripted(OpenMode::transmit());
        assert_eq!(conn.pending_timeout(), 0);
        assert_eq!(conn.write_bytes(b"go").unwrap(), 2);

        device.set_writable(false);
        assert!(matches!(conn.write_bytes(b"stop"), Err(SerialError::Timeout)));
    }

    #[test]
    fn test_interrupted_wait_is_retried() {
        let (conn, device) = open_scripted(OpenMode::transmit());
        device.script_readiness(Err(io::Error::from_raw_os_error(libc::EINTR)));
        device.script_readiness(Err(io::Error::from_raw_os_error(libc::EINTR)));

        assert_eq!(conn.write_bytes(b"retry").unwrap(), 5);
        assert_eq!(device.written(), b"retry".to_vec());
    }

    #[test]
    fn test_ready_without_port_is_inconsistent() {
        let (conn, device) = open_scripted(OpenMode::transmit());
        device.script_readiness(Ok(Readiness::Ready { in_ready_set: false }));

        assert!(matches!(
            conn.write_bytes(b"x"),
            Err(SerialError::InternalInconsistency(_))
        ));
        assert_eq!(device.write_calls(), 0);
    }

    #[test]
    fn test_wait_failure_is_os_error() {
        let (conn, device) = open_scripted(OpenMode::transmit());
        device.script_readiness(Err(io::Error::from_raw_os_error(libc::EBADF)));

        assert!(matches!(
            conn.write_bytes(b"x"),
            Err(SerialError::Os { code, .. }) if code == libc::EBADF
        ));
    }

    #[test]
    fn test_write_string_encodings() {
        let (conn, device) = open_scripted(OpenMode::transmit());

        assert_eq!(conn.write_string("A\u{e9}", TextEncoding::Latin1).unwrap(), 2);
        assert_eq!(conn.write_string("hi", TextEncoding::Utf16Be).unwrap(), 4);
        assert_eq!(device.written(), vec![b'A', 0xE9, 0x00, b'h', 0x00, b'i']);
    }

    #[test]
    fn test_unencodable_text_writes_nothing() {
        let (conn, device) = open_scripted(OpenMode::transmit());

        assert!(matches!(
            conn.write_string("caf\u{e9}", TextEncoding::Ascii),
            Err(SerialError::Encoding(_))
        ));
        assert_eq!(device.write_calls(), 0);
    }

    #[test]
    fn test_write_after_close_fails() {
        let (conn, _device) = open_scripted(OpenMode::transmit());
        conn.close();
        assert!(matches!(conn.write_data(vec![1, 2, 3]), Err(SerialError::MustBeOpen)));
    }
}
