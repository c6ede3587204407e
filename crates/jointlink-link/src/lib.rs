//! Queue-decoupled serial link management.
//!
//! [`LinkManager`] owns the serial port and a background service thread.
//! Callers queue outbound [`Message`](jointlink_codec::Message)s and pick up
//! decoded replies without ever touching the wire themselves.

pub mod config;
pub mod error;
pub mod link;
mod service;

pub use config::{ConnectOptions, LinkConfig, UART_BRIDGE_TIMEOUT_MARGIN, USB_CDC_TIMEOUT_MARGIN};
pub use error::{LinkError, Result};
pub use link::{ConnectionParameters, LinkManager};
pub use service::LinkStats;
