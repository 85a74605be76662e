//! # dost-core
//!
//! Foundation types shared by every DOST crate.
//!
//! - **Ids**: [`ids::UserId`] and [`ids::ConnectionId`] newtypes
//! - **Wire messages**: [`messages::InboundMessage`] (tagged union over the
//!   client `type` field) and [`messages::OutboundMessage`] (`{type, data, timestamp}`)
//! - **Records**: [`records::UserRecord`], [`records::ConversationRecord`],
//!   [`records::TaskRecord`], [`records::CalendarEvent`]
//! - **Logging**: [`logging::init_subscriber`]
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other dost crates.

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod messages;
pub mod records;

pub use ids::{ConnectionId, UserId};
pub use messages::{InboundMessage, MessageType, OutboundMessage, ProtocolError};
