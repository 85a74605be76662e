//! WebSocket connection management, inbound dispatch and offline delivery.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `connection` | Connection handle, per-socket read/write loops |
//! | `handler` | Inbound frame parsing and dispatch |
//! | `registry` | `ConnectionManager`: registry, dispatcher, idle sweep, lifecycle |
//! | `queue` | Bounded per-user offline queue |
//! | `session` | Per-user session view and stats snapshots |
//!
//! ## Data Flow
//!
//! `connection` (read loop) → `handler` → `registry` → `connection` (write loop).
//! HTTP handlers push through `registry` as well; messages for offline users
//! wait in `queue` until the next registration.

pub mod connection;
pub mod handler;
pub mod queue;
pub mod registry;
pub mod session;

pub use connection::{ClientConnection, ConnectionState};
pub use registry::ConnectionManager;
pub use session::{ConnectionInfo, ConnectionStats, UserSession};
