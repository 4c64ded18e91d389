//! Realtime fan-out for the live-analytics pipeline.
//!
//! The `Hub` owns the named broadcast channels ("activity feed", "stats");
//! `wire` defines the payload shapes both sides of the socket agree on;
//! `auth` verifies the bearer credential on the channel handshake; `ws` is
//! the axum WebSocket endpoint that bridges hub channels to one connection.

pub mod auth;
pub mod hub;
pub mod wire;
pub mod ws;

pub use auth::AuthKeys;
pub use hub::Hub;
pub use wire::{ActivityPayload, ServerMessage, StatsUpdate};
pub use ws::{realtime_handler, RealtimeState};
