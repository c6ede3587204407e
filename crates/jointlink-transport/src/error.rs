/// Errors that can occur in serial transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the specified port.
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on an open port.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The port has been closed.
    #[error("port closed")]
    Closed,
}

impl TransportError {
    /// Wrap an open failure for `path`.
    pub fn open(path: impl Into<String>, source: impl Into<std::io::Error>) -> Self {
        Self::Open {
            path: path.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
