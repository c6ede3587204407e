//! Payload layouts.
//!
//! Every payload is tightly packed, little-endian, in declared field order.
//! A payload only ever appears inside the packet body, so its packed size
//! must fit in [`BODY_SIZE`]; this is checked at compile time below.

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::codec::BODY_SIZE;
use crate::structured::StructuredConvertible;

/// Number of joints addressed by [`JointsPositionSpeed`].
pub const JOINT_COUNT: usize = 3;

/// Fixed-size binary encoding of a payload.
pub trait WireCodec: Sized {
    /// Packed size in bytes.
    const PACKED_SIZE: usize;

    /// Append the packed fields to `dst`.
    fn encode_into<B: BufMut>(&self, dst: &mut B);

    /// Read the packed fields from `src`.
    ///
    /// `src` must hold at least [`Self::PACKED_SIZE`] bytes. The codec always
    /// passes a full, zero-padded body.
    fn decode_from<B: Buf>(src: &mut B) -> Self;
}

/// Target of a single joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JointMoveSpeed {
    pub position: i16,
    pub speed: i16,
}

/// Targets for all joints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JointsPositionSpeed {
    pub joints: [JointMoveSpeed; JOINT_COUNT],
}

/// Controller health report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Status {
    pub uptime: u32,
    pub transmission_errors: u16,
}

/// Firmware version report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Version {
    pub uptime: u32,
    pub major: u8,
    pub minor: u8,
}

impl WireCodec for JointMoveSpeed {
    const PACKED_SIZE: usize = 4;

    fn encode_into<B: BufMut>(&self, dst: &mut B) {
        dst.put_i16_le(self.position);
        dst.put_i16_le(self.speed);
    }

    fn decode_from<B: Buf>(src: &mut B) -> Self {
        Self {
            position: src.get_i16_le(),
            speed: src.get_i16_le(),
        }
    }
}

impl WireCodec for JointsPositionSpeed {
    const PACKED_SIZE: usize = JOINT_COUNT * JointMoveSpeed::PACKED_SIZE;

    fn encode_into<B: BufMut>(&self, dst: &mut B) {
        for joint in &self.joints {
            joint.encode_into(dst);
        }
    }

    fn decode_from<B: Buf>(src: &mut B) -> Self {
        let mut joints = [JointMoveSpeed::default(); JOINT_COUNT];
        for joint in &mut joints {
            *joint = JointMoveSpeed::decode_from(src);
        }
        Self { joints }
    }
}

impl WireCodec for Status {
    const PACKED_SIZE: usize = 6;

    fn encode_into<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(self.uptime);
        dst.put_u16_le(self.transmission_errors);
    }

    fn decode_from<B: Buf>(src: &mut B) -> Self {
        Self {
            uptime: src.get_u32_le(),
            transmission_errors: src.get_u16_le(),
        }
    }
}

impl WireCodec for Version {
    const PACKED_SIZE: usize = 6;

    fn encode_into<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(self.uptime);
        dst.put_u8(self.major);
        dst.put_u8(self.minor);
    }

    fn decode_from<B: Buf>(src: &mut B) -> Self {
        Self {
            uptime: src.get_u32_le(),
            major: src.get_u8(),
            minor: src.get_u8(),
        }
    }
}

const _: () = assert!(JointsPositionSpeed::PACKED_SIZE <= BODY_SIZE);
const _: () = assert!(Status::PACKED_SIZE <= BODY_SIZE);
const _: () = assert!(Version::PACKED_SIZE <= BODY_SIZE);

impl StructuredConvertible for JointMoveSpeed {}
impl StructuredConvertible for JointsPositionSpeed {}
impl StructuredConvertible for Status {}
impl StructuredConvertible for Version {}
