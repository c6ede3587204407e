//! Fixed-size tagged packet codec for jointlink.
//!
//! Every packet is exactly [`PACKET_SIZE`] bytes:
//! - A 2-byte little-endian message type tag
//! - A body holding the packed payload selected by the tag, zero-padded
//!
//! There are no delimiters and no length field; the transport's fixed-size
//! read marks packet boundaries. Decoding never fails: unknown tags keep
//! their body as raw bytes.

pub mod codec;
pub mod error;
pub mod message;
pub mod msg_type;
pub mod payload;
pub mod structured;

pub use codec::{decode_message, encode_message, RawBody, BODY_SIZE, PACKET_SIZE, TAG_SIZE};
pub use error::{CodecError, Result};
pub use message::Message;
pub use msg_type::{MsgType, PayloadKind, PAYLOAD_TABLE, RAW_FIELD};
pub use payload::{JointMoveSpeed, JointsPositionSpeed, Status, Version, WireCodec, JOINT_COUNT};
pub use structured::StructuredConvertible;
