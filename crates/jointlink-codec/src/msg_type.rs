//! Message type ids and the type → payload table.
//!
//! Ids are the first two bytes of every packet. Which payload layout the
//! remaining bytes carry is decided by [`PAYLOAD_TABLE`] alone.

use std::fmt;
use std::str::FromStr;

use crate::error::CodecError;
use crate::payload::{JointsPositionSpeed, Status, Version, WireCodec};

/// Message types understood by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum MsgType {
    Nop = 0,
    SetJointsPositionSpeed = 1,
    GetJointsPositionSpeed = 2,
    GetStatus = 3,
    GetVersion = 4,
}

/// Payload layouts a packet body can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    JointsPositionSpeed,
    Status,
    Version,
}

/// Type → payload lookup. Types missing here carry raw bytes.
pub const PAYLOAD_TABLE: [(MsgType, PayloadKind); 4] = [
    (MsgType::SetJointsPositionSpeed, PayloadKind::JointsPositionSpeed),
    (MsgType::GetJointsPositionSpeed, PayloadKind::JointsPositionSpeed),
    (MsgType::GetStatus, PayloadKind::Status),
    (MsgType::GetVersion, PayloadKind::Version),
];

/// Field name used for bodies without a known payload.
pub const RAW_FIELD: &str = "raw";

impl MsgType {
    /// Every message type, in id order.
    pub const ALL: [MsgType; 5] = [
        MsgType::Nop,
        MsgType::SetJointsPositionSpeed,
        MsgType::GetJointsPositionSpeed,
        MsgType::GetStatus,
        MsgType::GetVersion,
    ];

    /// Wire id.
    pub const fn id(self) -> u16 {
        self as u16
    }

    /// Look up a wire id.
    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.id() == id)
    }

    /// snake_case name, as used on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            MsgType::Nop => "nop",
            MsgType::SetJointsPositionSpeed => "set_joints_position_speed",
            MsgType::GetJointsPositionSpeed => "get_joints_position_speed",
            MsgType::GetStatus => "get_status",
            MsgType::GetVersion => "get_version",
        }
    }

    /// Look up a snake_case name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.name() == name)
    }

    /// Payload carried by this type, if any.
    pub fn payload_kind(self) -> Option<PayloadKind> {
        PAYLOAD_TABLE
            .iter()
            .find(|(ty, _)| *ty == self)
            .map(|(_, kind)| *kind)
    }

    /// Structured field name of this type's payload.
    pub fn payload_field(self) -> Option<&'static str> {
        self.payload_kind().map(PayloadKind::field_name)
    }

    /// Commands that push configuration to the controller.
    pub fn is_setter(self) -> bool {
        self.name().starts_with("set_") || self.name().starts_with("action_")
    }

    /// Commands answered by a reply from the controller.
    pub fn is_getter(self) -> bool {
        self.name().starts_with("get_")
    }
}

impl PayloadKind {
    /// Field name of the payload in a message's structured form.
    pub const fn field_name(self) -> &'static str {
        match self {
            PayloadKind::JointsPositionSpeed => "joints_position_speed",
            PayloadKind::Status => "status",
            PayloadKind::Version => "version",
        }
    }

    /// Packed wire size of the payload.
    pub const fn packed_size(self) -> usize {
        match self {
            PayloadKind::JointsPositionSpeed => JointsPositionSpeed::PACKED_SIZE,
            PayloadKind::Status => Status::PACKED_SIZE,
            PayloadKind::Version => Version::PACKED_SIZE,
        }
    }
}

impl From<MsgType> for u16 {
    fn from(ty: MsgType) -> Self {
        ty.id()
    }
}

impl TryFrom<u16> for MsgType {
    type Error = CodecError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        Self::from_id(id).ok_or_else(|| CodecError::UnknownMessageType(format!("{id:#06x}")))
    }
}

impl FromStr for MsgType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| CodecError::UnknownMessageType(s.to_string()))
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
