//! Serial transport abstraction for jointlink.
//!
//! The link layer never talks to a port directly. It goes through the
//! [`SerialTransport`] trait, obtained from a [`PortOpener`]:
//! - [`SerialPortOpener`] opens real devices via the `serialport` crate
//!   (`serial` feature, on by default)
//! - [`LoopbackOpener`] hands out in-memory ports driven by a
//!   [`LoopbackHandle`], for tests and device simulation
//!
//! This is the lowest layer of jointlink.

pub mod error;
pub mod loopback;
pub mod traits;

#[cfg(feature = "serial")]
pub mod serial;

pub use error::{Result, TransportError};
pub use loopback::{LoopbackHandle, LoopbackOpener, LoopbackTransport};
pub use traits::{
    DataBits, FlowControl, Parity, PortOpener, PortOptions, PortSettings, SerialTransport,
    StopBits,
};

#[cfg(feature = "serial")]
pub use serial::{SerialPortOpener, SerialPortTransport};
