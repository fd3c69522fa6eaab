// src/io/serial/mod.rs
//
// Serial connection over a Unix character device.
//
// Features:
// - Open/close lifecycle with configurable open(2) flags
// - Line settings (rates, framing, flow control, raw mode) via termios
// - Background reader publishing raw chunks, bytes and lines
// - Bounded, complete writes of bytes or encoded text

mod connection;
mod feed;
mod line_settings;
mod reader;
mod transmit;
pub mod tty;
mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::SerialConnection;
pub use feed::{Feed, LineAssembler, INVALID_LINE_PLACEHOLDER};
pub use line_settings::{apply_line_settings, SerialSettings, HARDWARE_FLOW_CONTROL};
pub use reader::READ_CHUNK_SIZE;
pub use transmit::write_wait_bound;
pub use tty::{TtyDevice, TtyOpener};
pub use utils::{AccessMode, BaudRate, DataBits, OpenMode, Parity, StopBits, TextEncoding};
