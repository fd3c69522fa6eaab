//! serialwire: serial port connections over Unix character devices.
//!
//! A [`SerialConnection`] opens a device, applies [`SerialSettings`] to its
//! line discipline, writes bytes or encoded text, and exposes what the device
//! sends as [`Feed`]s of raw chunks, bytes or newline-terminated lines.
//!
//! ```no_run
//! use serialwire::{OpenMode, SerialConnection, SerialSettings, BaudRate, TextEncoding};
//!
//! # async fn demo() -> Result<(), serialwire::SerialError> {
//! let conn = SerialConnection::new("/dev/ttyUSB0");
//! conn.open(OpenMode::receive_and_transmit())?;
//! conn.set_settings(&SerialSettings::with_baud_rate(BaudRate::Baud115200))?;
//! conn.write_string("AT\r", TextEncoding::Ascii)?;
//!
//! let lines = conn.lines()?;
//! while let Some(line) = lines.next().await {
//!     print!("{}", line);
//! }
//! # Ok(())
//! # }
//! ```

#[macro_use]
pub mod logging;

pub mod io;
pub mod settings;

pub use io::serial::{
    AccessMode, BaudRate, DataBits, Feed, OpenMode, Parity, SerialConnection, SerialSettings,
    StopBits, TextEncoding,
};
pub use io::SerialError;
pub use settings::{ModePreset, SerialProfile};
