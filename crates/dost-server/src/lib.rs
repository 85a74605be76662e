//! # dost-server
//!
//! Axum HTTP + `WebSocket` server for the DOST assistant.
//!
//! - `WebSocket` gateway: per-user connection registry, inbound dispatch,
//!   bounded offline queue with replay on reconnect, periodic idle sweep
//! - HTTP endpoints: chat, voice, tasks, calendar, context, insights,
//!   predictions and feedback, health, stats and Prometheus metrics
//! - Collaborator traits ([`store::RecordStore`], [`assistant::Assistant`],
//!   [`transcription::Transcriber`]) with in-process implementations
//! - Graceful shutdown closes every socket before the listener drains
//!
//! ## Crate Position
//!
//! Depends on `dost-core`, `dost-settings` and `dost-learning`.
//! Depended on by `dost-agent`.

#![deny(unsafe_code)]

pub mod assistant;
pub mod health;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod store;
pub mod transcription;
pub mod websocket;

pub use server::{AppState, router, serve};
pub use websocket::ConnectionManager;
