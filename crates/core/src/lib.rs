//! Core types, errors, and shared primitives for the live-analytics pipeline.

pub mod coalesce;
pub mod error;
pub mod events;
pub mod identity;
pub mod limits;
pub mod session;

pub use coalesce::CoalescingTrigger;
pub use error::{Error, Result};
pub use events::*;
pub use identity::*;
pub use session::*;
