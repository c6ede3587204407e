/// Errors that can occur when building messages from structured data.
///
/// Wire decoding never fails; these only come from the structured side.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A payload value did not match the payload's field layout.
    #[error("invalid payload: {0}")]
    Structured(#[from] serde_json::Error),

    /// The message type name or id is not part of the protocol.
    #[error("unknown message type '{0}'")]
    UnknownMessageType(String),

    /// Structured message data must be a JSON object.
    #[error("structured message must be an object")]
    NotAnObject,

    /// The structured data names a field the message does not have.
    #[error("message type {msg_type} has no field '{field}'")]
    UnexpectedField { msg_type: String, field: String },

    /// A raw body longer than the packet body.
    #[error("raw body too long ({len} bytes, max {max})")]
    RawTooLong { len: usize, max: usize },

    /// A raw body element that is neither a signed nor an unsigned byte.
    #[error("raw byte {0} out of range -128..=255")]
    RawByteOutOfRange(i64),
}

pub type Result<T> = std::result::Result<T, CodecError>;
