//! Fixed-size packet protocol and serial link manager for joint controllers.
//!
//! Every packet is 16 bytes: a little-endian message type tag followed by a
//! zero-padded payload. The link manager runs the serial I/O on its own
//! thread and hands messages to callers through queues.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial transport trait, `serialport` backend (behind the
//!   `serial` feature) and an in-memory loopback port
//! - [`codec`]: message types, payload layouts, wire and structured forms
//! - [`link`]: the queue-decoupled link manager
//!
//! ```
//! use jointlink::codec::{Message, MsgType};
//! use jointlink::link::{ConnectOptions, LinkManager};
//! use jointlink::transport::LoopbackOpener;
//!
//! let opener = LoopbackOpener::new();
//! let device = opener.handle();
//! let link = LinkManager::new(opener);
//! link.connect("/dev/ttyACM0", 115_200, ConnectOptions::default())?;
//! link.start()?;
//!
//! link.put_message(Message::new(MsgType::GetVersion));
//! device.feed(&Message::new(MsgType::GetVersion).encode());
//! let reply = link.wait_for_message();
//! assert_eq!(reply.msg_type(), Some(MsgType::GetVersion));
//!
//! link.stop();
//! link.join()?;
//! # Ok::<(), jointlink::link::LinkError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use jointlink_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use jointlink_codec::*;
}

/// Re-export link manager types.
pub mod link {
    pub use jointlink_link::*;
}
