use std::fmt;

use bytes::BytesMut;
use serde_json::{Map, Value};

use crate::codec::{decode_message, encode_message, RawBody, BODY_SIZE, PACKET_SIZE, TAG_SIZE};
use crate::error::{CodecError, Result};
use crate::msg_type::{MsgType, PayloadKind, RAW_FIELD};
use crate::payload::{JointsPositionSpeed, Status, Version, WireCodec};
use crate::structured::StructuredConvertible;

/// A protocol message: one variant per message type.
///
/// Types without a payload carry their body as raw bytes. Ids outside
/// [`MsgType`] decode to [`Message::Unknown`] so newer firmware messages
/// survive a round trip untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Nop(RawBody),
    SetJointsPositionSpeed(JointsPositionSpeed),
    GetJointsPositionSpeed(JointsPositionSpeed),
    GetStatus(Status),
    GetVersion(Version),
    Unknown { msg_type: u16, raw: RawBody },
}

impl Message {
    /// A message of the given type with an all-zero body.
    pub fn new(ty: MsgType) -> Self {
        Self::from_body(ty, &[0u8; BODY_SIZE])
    }

    /// Interpret `body` according to `ty`.
    pub fn from_body(ty: MsgType, body: &RawBody) -> Self {
        let mut src = &body[..];
        match ty {
            MsgType::Nop => Message::Nop(*body),
            MsgType::SetJointsPositionSpeed => {
                Message::SetJointsPositionSpeed(JointsPositionSpeed::decode_from(&mut src))
            }
            MsgType::GetJointsPositionSpeed => {
                Message::GetJointsPositionSpeed(JointsPositionSpeed::decode_from(&mut src))
            }
            MsgType::GetStatus => Message::GetStatus(Status::decode_from(&mut src)),
            MsgType::GetVersion => Message::GetVersion(Version::decode_from(&mut src)),
        }
    }

    /// A message for any wire id, known or not, with an all-zero body.
    pub fn from_id(msg_type: u16) -> Self {
        match MsgType::from_id(msg_type) {
            Some(ty) => Self::new(ty),
            None => Message::Unknown {
                msg_type,
                raw: [0u8; BODY_SIZE],
            },
        }
    }

    /// Wire id of this message.
    pub fn msg_type_id(&self) -> u16 {
        match self {
            Message::Unknown { msg_type, .. } => *msg_type,
            known => known.msg_type().map(MsgType::id).unwrap_or_default(),
        }
    }

    /// Message type, or `None` for ids outside the protocol.
    pub fn msg_type(&self) -> Option<MsgType> {
        match self {
            Message::Nop(_) => Some(MsgType::Nop),
            Message::SetJointsPositionSpeed(_) => Some(MsgType::SetJointsPositionSpeed),
            Message::GetJointsPositionSpeed(_) => Some(MsgType::GetJointsPositionSpeed),
            Message::GetStatus(_) => Some(MsgType::GetStatus),
            Message::GetVersion(_) => Some(MsgType::GetVersion),
            Message::Unknown { .. } => None,
        }
    }

    /// Payload kind selected by the type → payload table.
    pub fn payload_kind(&self) -> Option<PayloadKind> {
        self.msg_type().and_then(MsgType::payload_kind)
    }

    /// Field name of the body in the structured form: the payload's
    /// semantic name, or `"raw"`.
    pub fn payload_field(&self) -> &'static str {
        self.payload_kind()
            .map(PayloadKind::field_name)
            .unwrap_or(RAW_FIELD)
    }

    /// Human-readable type name; `unknown(0x0007)` for ids outside the
    /// protocol.
    pub fn type_name(&self) -> String {
        match self.msg_type() {
            Some(ty) => ty.name().to_string(),
            None => format!("unknown({:#06x})", self.msg_type_id()),
        }
    }

    /// Append the wire bytes of this message to `dst`.
    pub fn encode_into(&self, dst: &mut BytesMut) {
        encode_message(self, dst);
    }

    /// Wire bytes of this message.
    pub fn encode(&self) -> [u8; PACKET_SIZE] {
        let mut buf = BytesMut::with_capacity(PACKET_SIZE);
        encode_message(self, &mut buf);
        let mut out = [0u8; PACKET_SIZE];
        out.copy_from_slice(&buf[..PACKET_SIZE]);
        out
    }

    /// Decode wire bytes. See [`decode_message`].
    pub fn decode(src: &[u8]) -> Self {
        decode_message(src)
    }

    /// Body bytes as they appear on the wire.
    pub fn body(&self) -> RawBody {
        let wire = self.encode();
        let mut body = [0u8; BODY_SIZE];
        body.copy_from_slice(&wire[TAG_SIZE..]);
        body
    }

    /// Structured payload, when the type has one.
    pub fn payload_structured(&self) -> Option<Value> {
        match self {
            Message::SetJointsPositionSpeed(joints) | Message::GetJointsPositionSpeed(joints) => {
                Some(joints.to_structured())
            }
            Message::GetStatus(status) => Some(status.to_structured()),
            Message::GetVersion(version) => Some(version.to_structured()),
            Message::Nop(_) | Message::Unknown { .. } => None,
        }
    }

    /// Structured form: a single-key object mapping [`Self::payload_field`]
    /// to the payload's field map, or `"raw"` to the body bytes.
    pub fn to_structured(&self) -> Value {
        let value = self
            .payload_structured()
            .unwrap_or_else(|| Value::from(self.body().to_vec()));

        let mut map = Map::new();
        map.insert(self.payload_field().to_string(), value);
        Value::Object(map)
    }

    /// Build a message of type `msg_type` from its structured form.
    ///
    /// Accepts the payload field of the type and `"raw"`, which overlays body
    /// bytes (zero-filled) and reinterprets them for the type. Fields that
    /// are absent keep their zero value.
    pub fn from_structured(msg_type: impl Into<u16>, value: Value) -> Result<Self> {
        let mut msg = Self::from_id(msg_type.into());
        let Value::Object(fields) = value else {
            return Err(CodecError::NotAnObject);
        };

        for (field, value) in fields {
            if field == RAW_FIELD {
                msg.set_raw(value)?;
            } else if Some(field.as_str()) == msg.payload_kind().map(PayloadKind::field_name) {
                msg.set_payload(value)?;
            } else {
                return Err(CodecError::UnexpectedField {
                    msg_type: msg.type_name(),
                    field,
                });
            }
        }

        Ok(msg)
    }

    /// Elements may be signed (-128..=-1) or unsigned; both map to the same
    /// byte.
    fn set_raw(&mut self, value: Value) -> Result<()> {
        let values: Vec<i64> = serde_json::from_value(value)?;
        if values.len() > BODY_SIZE {
            return Err(CodecError::RawTooLong {
                len: values.len(),
                max: BODY_SIZE,
            });
        }
        let bytes = values
            .into_iter()
            .map(|v| match v {
                -128..=255 => Ok(v as u8),
                _ => Err(CodecError::RawByteOutOfRange(v)),
            })
            .collect::<Result<Vec<u8>>>()?;

        let mut wire = Vec::with_capacity(PACKET_SIZE);
        wire.extend_from_slice(&self.msg_type_id().to_le_bytes());
        wire.extend_from_slice(&bytes);
        *self = decode_message(&wire);
        Ok(())
    }

    fn set_payload(&mut self, value: Value) -> Result<()> {
        match self {
            Message::SetJointsPositionSpeed(joints) | Message::GetJointsPositionSpeed(joints) => {
                *joints = JointsPositionSpeed::from_structured(value)?;
            }
            Message::GetStatus(status) => *status = Status::from_structured(value)?,
            Message::GetVersion(version) => *version = Version::from_structured(value)?,
            Message::Nop(_) | Message::Unknown { .. } => {
                return Err(CodecError::UnexpectedField {
                    msg_type: self.type_name(),
                    field: self.payload_field().to_string(),
                });
            }
        }
        Ok(())
    }
}

impl From<MsgType> for Message {
    fn from(ty: MsgType) -> Self {
        Self::new(ty)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.payload_structured() {
            Some(payload) => write!(f, "{}: {}", self.type_name(), payload),
            None => write!(f, "{}: -", self.type_name()),
        }
    }
}
