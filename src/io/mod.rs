// src/io/mod.rs
//
// Device I/O for serialwire.
// `device` defines the handle seam, `serial` builds connections on top of it.

pub mod device;
mod error;
pub mod serial;

pub use device::{DeviceOpener, LineAttributes, Readiness, SerialDevice};
pub use error::SerialError;
