// src/io/error.rs
//
// Error type shared by the serial connection, its device backends and the
// write path.

use std::io;

use thiserror::Error;

use crate::io::serial::TextEncoding;

/// Errors raised by serial connection operations
#[derive(Debug, Error)]
pub enum SerialError {
    /// open() called while a handle is already held
    #[error("Serial port is already open")]
    AlreadyOpen,

    /// Operation needs an open handle
    #[error("Serial port must be open")]
    MustBeOpen,

    /// Read feed requested on a connection opened without read access
    #[error("Serial port must be open for reading")]
    MustBeOpenForReading,

    /// The device path does not resolve
    #[error("Invalid device path: {0}")]
    InvalidPath(String),

    /// The device did not become writable within the configured timeout
    #[error("Timed out waiting for the serial port to accept data")]
    Timeout,

    /// Text could not be represented in the requested encoding
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The readiness primitive violated its own contract
    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// Any other failure reported by the OS
    #[error("OS error {code}: {description}")]
    Os { code: i32, description: String },
}

impl SerialError {
    /// OS error for a raw errno value, described with the platform's strerror
    pub fn os(code: i32) -> Self {
        SerialError::Os {
            code,
            description: io::Error::from_raw_os_error(code).to_string(),
        }
    }

    /// Map an io::Error into the serial error space.
    /// Errors without an errno (synthetic io::Errors) keep their message with code 0.
    pub fn from_io(err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(code) => SerialError::os(code),
            None => SerialError::Os {
                code: 0,
                description: err.to_string(),
            },
        }
    }

    /// Map an open(2) failure, separating paths that do not resolve
    pub fn from_open(path: &str, err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::ENOENT) | Some(libc::ENOTDIR) => SerialError::InvalidPath(path.to_string()),
            _ if err.kind() == io::ErrorKind::InvalidInput => SerialError::InvalidPath(path.to_string()),
            _ => SerialError::from_io(err),
        }
    }

    pub(crate) fn encoding(encoding: TextEncoding, c: char) -> Self {
        SerialError::Encoding(format!(
            "{:?} cannot represent {:?} (U+{:04X})",
            encoding, c, u32::from(c)
        ))
    }

    pub(crate) fn lock_poisoned() -> Self {
        SerialError::InternalInconsistency("connection lock poisoned".to_string())
    }
}

impl From<io::Error> for SerialError {
    fn from(err: io::Error) -> Self {
        SerialError::from_io(err)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_error_carries_code_and_description() {
        match SerialError::os(libc::EBUSY) {
            SerialError::Os { code, description } => {
                assert_eq!(code, libc::EBUSY);
                assert!(!description.is_empty());
            }
            other => panic!("Expected Os error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_open_maps_missing_path() {
        let err = io::Error::from_raw_os_error(libc::ENOENT);
        assert!(matches!(
            SerialError::from_open("/dev/nope", err),
            SerialError::InvalidPath(p) if p == "/dev/nope"
        ));

        let err = io::Error::from_raw_os_error(libc::EACCES);
        assert!(matches!(
            SerialError::from_open("/dev/ttyS0", err),
            SerialError::Os { code, .. } if code == libc::EACCES
        ));
    }

    #[test]
    fn test_from_io_without_errno() {
        let err = io::Error::new(io::ErrorKind::Other, "synthetic");
        match SerialError::from(err) {
            SerialError::Os { code, description } => {
                assert_eq!(code, 0);
                assert!(description.contains("synthetic"));
            }
            other => panic!("Expected Os error, got {:?}", other),
        }
    }
}
