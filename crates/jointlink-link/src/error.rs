/// Errors that can occur in link operations.
///
/// Only lifecycle calls return these. I/O failures inside the service loop
/// close the port and are reported through logs and [`LinkStats`].
///
/// [`LinkStats`]: crate::LinkStats
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] jointlink_transport::TransportError),

    /// The configured packet size does not match the codec's.
    #[error("link packet size {configured} does not match codec packet size {codec}")]
    PacketSizeMismatch { configured: usize, codec: usize },

    /// A baud rate of zero.
    #[error("invalid baud rate {0}")]
    InvalidBaudRate(u32),

    /// The timeout margin cannot produce a read timeout.
    #[error("invalid read timeout margin {0}")]
    InvalidTimeoutMargin(f64),

    /// `start` was called while the service loop is running.
    #[error("service loop already running")]
    AlreadyRunning,

    /// The service thread could not be spawned.
    #[error("failed to spawn service thread: {0}")]
    Spawn(std::io::Error),

    /// The service thread panicked.
    #[error("service thread panicked")]
    ServiceThreadPanicked,
}

pub type Result<T> = std::result::Result<T, LinkError>;
