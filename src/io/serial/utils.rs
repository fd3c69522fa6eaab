// src/io/serial/utils.rs
//
// Configuration value types for serial connections.
// Provides the enumerated line settings, open-mode flags and text encodings,
// plus their translations into libc constants.

use serde::{Deserialize, Serialize};

use crate::io::error::SerialError;

// ============================================================================
// Baud Rates
// ============================================================================

/// Standard baud rates supported on every Unix target
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum BaudRate {
    Baud0,
    Baud50,
    Baud75,
    Baud110,
    Baud134,
    Baud150,
    Baud200,
    Baud300,
    Baud600,
    Baud1200,
    Baud1800,
    Baud2400,
    Baud4800,
    Baud9600,
    Baud19200,
    Baud38400,
    Baud57600,
    Baud115200,
    Baud230400,
}

/// (bits per second, rate) pairs in ascending order
const BAUD_RATES: [(u32, BaudRate); 19] = [
    (0, BaudRate::Baud0),
    (50, BaudRate::Baud50),
    (75, BaudRate::Baud75),
    (110, BaudRate::Baud110),
    (134, BaudRate::Baud134),
    (150, BaudRate::Baud150),
    (200, BaudRate::Baud200),
    (300, BaudRate::Baud300),
    (600, BaudRate::Baud600),
    (1200, BaudRate::Baud1200),
    (1800, BaudRate::Baud1800),
    (2400, BaudRate::Baud2400),
    (4800, BaudRate::Baud4800),
    (9600, BaudRate::Baud9600),
    (19200, BaudRate::Baud19200),
    (38400, BaudRate::Baud38400),
    (57600, BaudRate::Baud57600),
    (115200, BaudRate::Baud115200),
    (230400, BaudRate::Baud230400),
];

impl BaudRate {
    /// Bits per second for this rate
    pub fn bits_per_second(self) -> u32 {
        BAUD_RATES
            .iter()
            .find(|(_, rate)| *rate == self)
            .map(|(bps, _)| *bps)
            .unwrap_or(0)
    }

    /// The OS speed constant passed to cfsetispeed/cfsetospeed
    pub fn speed(self) -> libc::speed_t {
        match self {
            BaudRate::Baud0 => libc::B0,
            BaudRate::Baud50 => libc::B50,
            BaudRate::Baud75 => libc::B75,
            BaudRate::Baud110 => libc::B110,
            BaudRate::Baud134 => libc::B134,
            BaudRate::Baud150 => libc::B150,
            BaudRate::Baud200 => libc::B200,
            BaudRate::Baud300 => libc::B300,
            BaudRate::Baud600 => libc::B600,
            BaudRate::Baud1200 => libc::B1200,
            BaudRate::Baud1800 => libc::B1800,
            BaudRate::Baud2400 => libc::B2400,
            BaudRate::Baud4800 => libc::B4800,
            BaudRate::Baud9600 => libc::B9600,
            BaudRate::Baud19200 => libc::B19200,
            BaudRate::Baud38400 => libc::B38400,
            BaudRate::Baud57600 => libc::B57600,
            BaudRate::Baud115200 => libc::B115200,
            BaudRate::Baud230400 => libc::B230400,
        }
    }

    /// Map an OS speed constant back to a rate (None for non-standard speeds)
    pub fn from_speed(speed: libc::speed_t) -> Option<BaudRate> {
        BAUD_RATES
            .iter()
            .map(|(_, rate)| *rate)
            .find(|rate| rate.speed() == speed)
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        BaudRate::Baud9600
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = String;

    fn try_from(bps: u32) -> Result<Self, Self::Error> {
        BAUD_RATES
            .iter()
            .find(|(value, _)| *value == bps)
            .map(|(_, rate)| *rate)
            .ok_or_else(|| format!("Unsupported baud rate: {}", bps))
    }
}

impl From<BaudRate> for u32 {
    fn from(rate: BaudRate) -> Self {
        rate.bits_per_second()
    }
}

impl std::fmt::Display for BaudRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.bits_per_second())
    }
}

// ============================================================================
// Framing Parameters
// ============================================================================

/// Parity setting for serial port configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Even,
    Odd,
}

impl Default for Parity {
    fn default() -> Self {
        Parity::None
    }
}

impl Parity {
    /// Single-letter form used in "8N1" style summaries
    pub fn letter(self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        }
    }
}

/// Number of stop bits
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopBits {
    One,
    Two,
}

impl Default for StopBits {
    fn default() -> Self {
        StopBits::One
    }
}

impl StopBits {
    pub fn count(self) -> u8 {
        match self {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

/// Character width
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl Default for DataBits {
    fn default() -> Self {
        DataBits::Eight
    }
}

impl DataBits {
    pub fn count(self) -> u8 {
        match self {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }

    /// The CSx size flag for this width
    pub fn size_flag(self) -> libc::tcflag_t {
        match self {
            DataBits::Five => libc::CS5,
            DataBits::Six => libc::CS6,
            DataBits::Seven => libc::CS7,
            DataBits::Eight => libc::CS8,
        }
    }
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(format!("Invalid data bits: {}", other)),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        bits.count()
    }
}

// ============================================================================
// Open Modes
// ============================================================================

/// Read/write access requested when opening the device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl AccessMode {
    pub fn can_read(self) -> bool {
        matches!(self, AccessMode::Read | AccessMode::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, AccessMode::Write | AccessMode::ReadWrite)
    }
}

/// Flags used when opening the character device.
/// Each field maps onto an open(2) flag, except `exclusive` which is applied
/// with TIOCEXCL once the descriptor exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenMode {
    pub access: AccessMode,
    #[serde(default)]
    pub no_controlling_terminal: bool,
    #[serde(default)]
    pub non_blocking: bool,
    #[serde(default)]
    pub append: bool,
    #[serde(default)]
    pub exclusive: bool,
    #[serde(default)]
    pub shared_lock: bool,
    #[serde(default)]
    pub sync: bool,
    #[serde(default)]
    pub close_on_exec: bool,
}

impl OpenMode {
    /// Plain access with no extra flags
    pub fn new(access: AccessMode) -> Self {
        OpenMode {
            access,
            no_controlling_terminal: false,
            non_blocking: false,
            append: false,
            exclusive: false,
            shared_lock: false,
            sync: false,
            close_on_exec: false,
        }
    }

    fn preset(access: AccessMode) -> Self {
        OpenMode {
            no_controlling_terminal: true,
            non_blocking: true,
            exclusive: cfg!(target_os = "macos"),
            ..OpenMode::new(access)
        }
    }

    /// Read-only preset
    pub fn receive() -> Self {
        Self::preset(AccessMode::Read)
    }

    /// Write-only preset
    pub fn transmit() -> Self {
        Self::preset(AccessMode::Write)
    }

    /// Read-write preset
    pub fn receive_and_transmit() -> Self {
        Self::preset(AccessMode::ReadWrite)
    }

    /// Extra open(2) flags beyond the access mode.
    /// Note: `shared_lock` only exists on the BSD family; elsewhere it is left
    /// out and the caller logs that it was ignored.
    pub fn custom_flags(&self) -> libc::c_int {
        let mut flags = 0;
        if self.no_controlling_terminal {
            flags |= libc::O_NOCTTY;
        }
        if self.non_blocking {
            flags |= libc::O_NONBLOCK;
        }
        if self.append {
            flags |= libc::O_APPEND;
        }
        if self.sync {
            flags |= libc::O_SYNC;
        }
        if self.close_on_exec {
            flags |= libc::O_CLOEXEC;
        }
        #[cfg(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd",
            target_os = "dragonfly"
        ))]
        {
            if self.shared_lock {
                flags |= libc::O_SHLOCK;
            }
        }
        flags
    }
}

impl Default for OpenMode {
    fn default() -> Self {
        OpenMode::receive_and_transmit()
    }
}

// ============================================================================
// Text Encodings
// ============================================================================

/// Text encodings accepted by `write_string`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    Utf8,
    Ascii,
    Latin1,
    Utf16Le,
    Utf16Be,
}

impl Default for TextEncoding {
    fn default() -> Self {
        TextEncoding::Utf8
    }
}

impl TextEncoding {
    /// Encode `text`, failing on the first character the encoding cannot represent
    pub fn encode(self, text: &str) -> Result<Vec<u8>, SerialError> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Ascii => text
                .chars()
                .map(|c| {
                    if c.is_ascii() {
                        Ok(c as u8)
                    } else {
                        Err(SerialError::encoding(self, c))
                    }
                })
                .collect(),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| SerialError::encoding(self, c)))
                .collect(),
            TextEncoding::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            TextEncoding::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baud_rate_try_from() {
        assert_eq!(BaudRate::try_from(115200).unwrap(), BaudRate::Baud115200);
        assert_eq!(BaudRate::try_from(9600).unwrap(), BaudRate::Baud9600);
        assert!(BaudRate::try_from(12345).is_err());
    }

    #[test]
    fn test_baud_rate_speed_mapping() {
        assert_eq!(BaudRate::Baud19200.speed(), libc::B19200);
        assert_eq!(BaudRate::from_speed(libc::B57600), Some(BaudRate::Baud57600));
        assert_eq!(BaudRate::Baud230400.bits_per_second(), 230400);
    }

    #[test]
    fn test_data_bits_try_from() {
        assert_eq!(DataBits::try_from(7).unwrap(), DataBits::Seven);
        assert!(DataBits::try_from(9).is_err());
        assert_eq!(u8::from(DataBits::Five), 5);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Parity::default(), Parity::None);
        assert_eq!(StopBits::default(), StopBits::One);
        assert_eq!(DataBits::default(), DataBits::Eight);
        assert_eq!(TextEncoding::default(), TextEncoding::Utf8);
    }

    #[test]
    fn test_open_mode_presets() {
        let rx = OpenMode::receive();
        assert!(rx.access.can_read());
        assert!(!rx.access.can_write());
        assert!(rx.no_controlling_terminal);

        let tx = OpenMode::transmit();
        assert!(!tx.access.can_read());
        assert!(tx.access.can_write());

        let both = OpenMode::receive_and_transmit();
        assert!(both.access.can_read() && both.access.can_write());
    }

    #[test]
    fn test_open_mode_custom_flags() {
        let mode = OpenMode {
            no_controlling_terminal: true,
            non_blocking: true,
            ..OpenMode::new(AccessMode::ReadWrite)
        };
        let flags = mode.custom_flags();
        assert_ne!(flags & libc::O_NOCTTY, 0);
        assert_ne!(flags & libc::O_NONBLOCK, 0);
        assert_eq!(flags & libc::O_SYNC, 0);
        assert_eq!(OpenMode::new(AccessMode::Read).custom_flags(), 0);
    }

    #[test]
    fn test_append_is_an_open_flag() {
        let mode = OpenMode {
            append: true,
            ..OpenMode::new(AccessMode::Read)
        };
        assert_ne!(mode.custom_flags() & libc::O_APPEND, 0);
        assert_eq!(mode.custom_flags() & libc::O_NONBLOCK, 0);
    }

    #[test]
    fn test_encode_ascii_rejects_non_ascii() {
        assert_eq!(TextEncoding::Ascii.encode("AT\r").unwrap(), b"AT\r".to_vec());
        assert!(matches!(
            TextEncoding::Ascii.encode("caf\u{e9}"),
            Err(SerialError::Encoding(_))
        ));
    }

    #[test]
    fn test_encode_latin1() {
        assert_eq!(TextEncoding::Latin1.encode("caf\u{e9}").unwrap(), vec![b'c', b'a', b'f', 0xE9]);
        assert!(TextEncoding::Latin1.encode("\u{20ac}").is_err());
    }

    #[test]
    fn test_encode_utf16() {
        assert_eq!(TextEncoding::Utf16Le.encode("A").unwrap(), vec![0x41, 0x00]);
        assert_eq!(TextEncoding::Utf16Be.encode("A").unwrap(), vec![0x00, 0x41]);
    }
}
