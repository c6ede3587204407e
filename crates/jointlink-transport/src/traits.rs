use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// An open serial port.
///
/// Implementations are owned by exactly one thread at a time; the link layer
/// moves them into its port slot and performs all I/O from the service
/// thread.
pub trait SerialTransport: Send {
    /// Number of received bytes waiting to be read.
    fn bytes_available(&mut self) -> Result<usize>;

    /// Read into `buf` until it is full or the read timeout elapses.
    ///
    /// Returns the number of bytes read, which is less than `buf.len()` when
    /// the timeout hit first. A timeout is not an error.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write the whole buffer.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Close the port. Further I/O fails with [`TransportError::Closed`].
    ///
    /// [`TransportError::Closed`]: crate::TransportError::Closed
    fn close(&mut self);

    /// Whether the port is still open.
    fn is_open(&self) -> bool;

    /// Device path the port was opened with.
    fn device(&self) -> &str;

    /// Configured baud rate.
    fn baud_rate(&self) -> u32;
}

impl fmt::Debug for dyn SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialTransport")
            .field("device", &self.device())
            .field("baud_rate", &self.baud_rate())
            .field("open", &self.is_open())
            .finish()
    }
}

/// Opens ports for the link layer.
pub trait PortOpener: Send + Sync {
    /// Open a port with the given settings.
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn SerialTransport>>;
}

/// Everything needed to open a port.
#[derive(Debug, Clone, PartialEq)]
pub struct PortSettings {
    /// Device path, e.g. `/dev/ttyACM0` or `COM3`.
    pub path: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Upper bound for a single [`SerialTransport::read`] call.
    pub read_timeout: Duration,
    /// Line settings.
    pub options: PortOptions,
}

/// Line settings passed through to the port backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortOptions {
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    #[default]
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowControl {
    #[default]
    None,
    Software,
    Hardware,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_8n1_without_flow_control() {
        let options = PortOptions::default();
        assert_eq!(options.data_bits, DataBits::Eight);
        assert_eq!(options.parity, Parity::None);
        assert_eq!(options.stop_bits, StopBits::One);
        assert_eq!(options.flow_control, FlowControl::None);
    }
}
