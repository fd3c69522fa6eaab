// src/io/serial/line_settings.rs
//
// Translation of a SerialSettings value into termios line attributes.
//
// The steps run in a fixed order because later steps set bits that earlier
// steps may have cleared (and vice versa). The order is the same on every
// platform; only the flag constants in `platform` differ.

use serde::{Deserialize, Serialize};

use crate::io::device::LineAttributes;
use crate::io::serial::utils::{BaudRate, DataBits, Parity, StopBits};

// ============================================================================
// Platform Flag Table
// ============================================================================

mod platform {
    /// Hardware (RTS/CTS) flow control bits in c_cflag
    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub const HARDWARE_FLOW_CONTROL: libc::tcflag_t = libc::CRTSCTS;
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    pub const HARDWARE_FLOW_CONTROL: libc::tcflag_t = libc::CCTS_OFLOW | libc::CRTS_IFLOW;
    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios"
    )))]
    pub const HARDWARE_FLOW_CONTROL: libc::tcflag_t = libc::CRTSCTS;

    /// Software (XON/XOFF) flow control bits in c_iflag
    pub const SOFTWARE_FLOW_CONTROL: libc::tcflag_t = libc::IXON | libc::IXOFF | libc::IXANY;

    /// Input CR/NL translation bits in c_iflag
    pub const INPUT_NEWLINE_TRANSLATION: libc::tcflag_t = libc::ICRNL | libc::INLCR | libc::IGNCR;

    /// Canonical-mode, echo and signal bits in c_lflag
    pub const INTERACTIVE_LOCAL_MODES: libc::tcflag_t =
        libc::ICANON | libc::ECHO | libc::ECHOE | libc::ISIG;
}

pub use platform::HARDWARE_FLOW_CONTROL;

// ============================================================================
// Settings
// ============================================================================

/// Line settings applied by `SerialConnection::set_settings`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    pub receive_rate: BaudRate,
    pub transmit_rate: BaudRate,
    /// VMIN: minimum bytes a read waits for
    pub min_bytes_to_read: u8,
    /// VTIME: inter-character timeout in tenths of a second (0 = wait indefinitely)
    pub timeout: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub data_bits: DataBits,
    pub hardware_flow_control: bool,
    pub software_flow_control: bool,
    /// OPOST: output post-processing
    pub output_processing: bool,
}

impl Default for SerialSettings {
    fn default() -> Self {
        SerialSettings {
            receive_rate: BaudRate::Baud9600,
            transmit_rate: BaudRate::Baud9600,
            min_bytes_to_read: 1,
            timeout: 0,
            parity: Parity::None,
            stop_bits: StopBits::One,
            data_bits: DataBits::Eight,
            hardware_flow_control: false,
            software_flow_control: false,
            output_processing: false,
        }
    }
}

impl SerialSettings {
    /// Same rate in both directions
    pub fn with_baud_rate(baud_rate: BaudRate) -> Self {
        SerialSettings {
            receive_rate: baud_rate,
            transmit_rate: baud_rate,
            ..Default::default()
        }
    }

    /// "9600 8N1" style summary for logs
    pub fn summary(&self) -> String {
        let rate = if self.receive_rate == self.transmit_rate {
            self.receive_rate.to_string()
        } else {
            format!("{}/{}", self.receive_rate, self.transmit_rate)
        };
        format!(
            "{} {}{}{}",
            rate,
            self.data_bits.count(),
            self.parity.letter(),
            self.stop_bits.count()
        )
    }
}

// ============================================================================
// Application
// ============================================================================

fn set_flag(flags: &mut libc::tcflag_t, bits: libc::tcflag_t, on: bool) {
    if on {
        *flags |= bits;
    } else {
        *flags &= !bits;
    }
}

/// Apply `settings` on top of the attributes fetched from the device
pub fn apply_line_settings(attrs: &mut LineAttributes, settings: &SerialSettings) {
    // 1. Baud rates (input and output may differ)
    attrs.input_speed = settings.receive_rate.speed();
    attrs.output_speed = settings.transmit_rate.speed();

    // 2. Parity
    match settings.parity {
        Parity::None => attrs.control_flags &= !(libc::PARENB | libc::PARODD),
        Parity::Even => {
            attrs.control_flags |= libc::PARENB;
            attrs.control_flags &= !libc::PARODD;
        }
        Parity::Odd => attrs.control_flags |= libc::PARENB | libc::PARODD,
    }

    // 3. Stop bits
    set_flag(
        &mut attrs.control_flags,
        libc::CSTOPB,
        settings.stop_bits == StopBits::Two,
    );

    // 4. Data bits
    attrs.control_flags &= !libc::CSIZE;
    attrs.control_flags |= settings.data_bits.size_flag();

    // 5. No CR/NL translation on input
    attrs.input_flags &= !platform::INPUT_NEWLINE_TRANSLATION;

    // 6. Hardware flow control
    set_flag(
        &mut attrs.control_flags,
        platform::HARDWARE_FLOW_CONTROL,
        settings.hardware_flow_control,
    );

    // 7. Software flow control
    set_flag(
        &mut attrs.input_flags,
        platform::SOFTWARE_FLOW_CONTROL,
        settings.software_flow_control,
    );

    // 8. Receiver on, modem control lines ignored
    attrs.control_flags |= libc::CREAD | libc::CLOCAL;

    // 9. Raw input: no canonical mode, echo or signal characters
    attrs.local_flags &= !platform::INTERACTIVE_LOCAL_MODES;

    // 10. Output post-processing
    set_flag(&mut attrs.output_flags, libc::OPOST, settings.output_processing);

    // 11. Read thresholds
    attrs.control_chars[libc::VMIN] = settings.min_bytes_to_read;
    attrs.control_chars[libc::VTIME] = settings.timeout;
}

// ============================================================================
// Tests
// ============================================================================
