use std::time::Duration;

use jointlink_codec::PACKET_SIZE;
use jointlink_transport::PortOptions;

use crate::error::{LinkError, Result};

/// Margin for controllers with native USB CDC, where a whole packet arrives
/// in one USB transfer.
pub const USB_CDC_TIMEOUT_MARGIN: f64 = 1.1;

/// Margin for UART bridges such as FTDI chips.
pub const UART_BRIDGE_TIMEOUT_MARGIN: f64 = 10.0;

/// Link manager behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    /// Bytes per transport read. Must equal the codec's packet size.
    pub packet_size: usize,
    /// Sleep between service loop iterations. Bounds CPU use; not a
    /// real-time deadline.
    pub poll_interval: Duration,
    /// Sleep between polls in [`LinkManager::wait_for_message`].
    ///
    /// [`LinkManager::wait_for_message`]: crate::LinkManager::wait_for_message
    pub wait_interval: Duration,
    /// Time `stop` gives the service loop to observe the stop request.
    pub stop_grace: Duration,
    /// Multiplier for the per-packet read timeout derived from the baud
    /// rate when `connect` gets none.
    pub timeout_margin: f64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            packet_size: PACKET_SIZE,
            poll_interval: Duration::from_millis(1),
            wait_interval: Duration::from_millis(10),
            stop_grace: Duration::from_millis(1),
            timeout_margin: USB_CDC_TIMEOUT_MARGIN,
        }
    }
}

impl LinkConfig {
    /// Read timeout for one packet at `baud_rate`:
    /// `packet_size * (timeout_margin / baud_rate)` seconds.
    pub fn packet_read_timeout(&self, baud_rate: u32) -> Result<Duration> {
        if baud_rate == 0 {
            return Err(LinkError::InvalidBaudRate(baud_rate));
        }
        if !self.timeout_margin.is_finite() || self.timeout_margin <= 0.0 {
            return Err(LinkError::InvalidTimeoutMargin(self.timeout_margin));
        }

        let seconds = self.packet_size as f64 * (self.timeout_margin / f64::from(baud_rate));
        Duration::try_from_secs_f64(seconds)
            .map_err(|_| LinkError::InvalidTimeoutMargin(self.timeout_margin))
    }

    /// Check the packet size against the codec.
    pub fn validate(&self) -> Result<()> {
        if self.packet_size != PACKET_SIZE {
            return Err(LinkError::PacketSizeMismatch {
                configured: self.packet_size,
                codec: PACKET_SIZE,
            });
        }
        Ok(())
    }
}

/// Per-connection options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectOptions {
    /// Read timeout; derived from the baud rate when `None`.
    pub read_timeout: Option<Duration>,
    /// Line settings.
    pub port: PortOptions,
}

impl ConnectOptions {
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn with_port_options(mut self, port: PortOptions) -> Self {
        self.port = port;
        self
    }
}
