use bytes::{Buf, BufMut, BytesMut};

use crate::message::Message;
use crate::msg_type::MsgType;
use crate::payload::WireCodec;

/// Packet size used for all communication with the controller.
pub const PACKET_SIZE: usize = 16;

/// Message type tag: 2 bytes, little-endian.
pub const TAG_SIZE: usize = 2;

/// Body bytes following the tag.
pub const BODY_SIZE: usize = PACKET_SIZE - TAG_SIZE;

/// Uninterpreted packet body.
pub type RawBody = [u8; BODY_SIZE];

/// Encode a message into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬───────────────────────────────────────────┐
/// │ Type (2B)  │ Body (14B)                                │
/// │ u16 LE     │ packed payload, zero-padded to 14 bytes   │
/// └────────────┴───────────────────────────────────────────┘
/// ```
///
/// Always appends exactly [`PACKET_SIZE`] bytes.
pub fn encode_message(msg: &Message, dst: &mut BytesMut) {
    dst.reserve(PACKET_SIZE);
    let start = dst.len();

    dst.put_u16_le(msg.msg_type_id());
    match msg {
        Message::Nop(raw) | Message::Unknown { raw, .. } => dst.put_slice(raw),
        Message::SetJointsPositionSpeed(joints) | Message::GetJointsPositionSpeed(joints) => {
            joints.encode_into(dst)
        }
        Message::GetStatus(status) => status.encode_into(dst),
        Message::GetVersion(version) => version.encode_into(dst),
    }

    let written = dst.len() - start;
    dst.put_bytes(0, PACKET_SIZE - written);
}

/// Decode a message from a buffer.
///
/// Never fails. A buffer shorter than [`PACKET_SIZE`] is zero-filled, bytes
/// past [`PACKET_SIZE`] are ignored, and an unknown type keeps its body as
/// raw bytes.
pub fn decode_message(src: &[u8]) -> Message {
    let mut frame = [0u8; PACKET_SIZE];
    let len = src.len().min(PACKET_SIZE);
    frame[..len].copy_from_slice(&src[..len]);

    let mut cursor = &frame[..];
    let msg_type = cursor.get_u16_le();
    let mut raw: RawBody = [0u8; BODY_SIZE];
    raw.copy_from_slice(cursor);

    match MsgType::from_id(msg_type) {
        Some(ty) => Message::from_body(ty, &raw),
        None => Message::Unknown { msg_type, raw },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{JointMoveSpeed, JointsPositionSpeed, Status, Version};

    fn encoded(msg: &Message) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_message(msg, &mut buf);
        buf.to_vec()
    }

    fn all_messages() -> Vec<Message> {
        let extreme = JointMoveSpeed {
            position: i16::MIN,
            speed: i16::MAX,
        };
        vec![
            Message::Nop([0; BODY_SIZE]),
            Message::Nop([0xA5; BODY_SIZE]),
            Message::SetJointsPositionSpeed(JointsPositionSpeed {
                joints: [extreme, JointMoveSpeed::default(), extreme],
            }),
            Message::GetJointsPositionSpeed(JointsPositionSpeed {
                joints: [
                    JointMoveSpeed {
                        position: -1,
                        speed: 1,
                    };
                    3
                ],
            }),
            Message::GetStatus(Status {
                uptime: u32::MAX,
                transmission_errors: u16::MAX,
            }),
            Message::GetStatus(Status::default()),
            Message::GetVersion(Version {
                uptime: u32::MAX,
                major: u8::MAX,
                minor: u8::MIN,
            }),
            Message::Unknown {
                msg_type: 0xBEEF,
                raw: [0xFF; BODY_SIZE],
            },
        ]
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        for msg in all_messages() {
            let wire = encoded(&msg);
            assert_eq!(decode_message(&wire), msg, "roundtrip of {msg}");
        }
    }

    #[test]
    fn test_encoded_length_is_fixed() {
        for msg in all_messages() {
            assert_eq!(encoded(&msg).len(), PACKET_SIZE);
            assert_eq!(msg.encode().len(), PACKET_SIZE);
        }
    }

    #[test]
    fn test_encode_appends_to_existing_buffer() {
        let mut buf = BytesMut::new();
        encode_message(&Message::new(MsgType::GetVersion), &mut buf);
        encode_message(&Message::new(MsgType::GetStatus), &mut buf);
        assert_eq!(buf.len(), 2 * PACKET_SIZE);
        assert_eq!(&buf[..2], &[4, 0]);
        assert_eq!(&buf[PACKET_SIZE..PACKET_SIZE + 2], &[3, 0]);
    }

    #[test]
    fn test_tag_is_first_two_bytes_le() {
        let wire = encoded(&Message::Unknown {
            msg_type: 0x1234,
            raw: [0; BODY_SIZE],
        });
        assert_eq!(&wire[..2], &[0x34, 0x12]);
    }

    #[test]
    fn test_get_version_request_is_tag_then_zeros() {
        let wire = encoded(&Message::new(MsgType::GetVersion));
        assert_eq!(&wire[..2], &[4, 0]);
        assert!(wire[2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_set_joints_layout() {
        let mut joints = JointsPositionSpeed::default();
        joints.joints[0] = JointMoveSpeed {
            position: 50,
            speed: 100,
        };
        let wire = encoded(&Message::SetJointsPositionSpeed(joints));
        assert_eq!(
            wire,
            vec![0x01, 0x00, 0x32, 0x00, 0x64, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_status_body_is_zero_padded() {
        let wire = encoded(&Message::GetStatus(Status {
            uptime: 12345,
            transmission_errors: 2,
        }));
        assert_eq!(&wire[2..8], &[0x39, 0x30, 0x00, 0x00, 0x02, 0x00]);
        assert!(wire[8..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_decode_short_buffer_zero_fills() {
        let msg = decode_message(&[3, 0, 0x39, 0x30]);
        assert_eq!(
            msg,
            Message::GetStatus(Status {
                uptime: 12345,
                transmission_errors: 0,
            })
        );
    }

    #[test]
    fn test_decode_empty_buffer_is_nop() {
        assert_eq!(decode_message(&[]), Message::Nop([0; BODY_SIZE]));
        assert_eq!(decode_message(&[2]), Message::new(MsgType::GetJointsPositionSpeed));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut wire = encoded(&Message::new(MsgType::GetVersion));
        wire.extend_from_slice(&[0xFF; 8]);
        assert_eq!(decode_message(&wire), Message::new(MsgType::GetVersion));
    }

    #[test]
    fn test_decode_unknown_tag_keeps_body() {
        let mut wire = vec![0x07, 0x00];
        wire.extend(1..=14u8);
        let msg = decode_message(&wire);

        let expected: Vec<u8> = (1..=14).collect();
        match msg {
            Message::Unknown { msg_type, raw } => {
                assert_eq!(msg_type, 7);
                assert_eq!(raw.to_vec(), expected);
            }
            other => panic!("expected unknown message, got {other}"),
        }
    }

    #[test]
    fn test_known_tags_dispatch_through_payload_table() {
        for ty in MsgType::ALL {
            let msg = decode_message(&ty.id().to_le_bytes());
            assert_eq!(msg.msg_type(), Some(ty));
            assert_eq!(msg.payload_kind(), ty.payload_kind());
        }
    }
}
