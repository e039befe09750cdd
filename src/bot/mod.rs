//! Chat pipeline: line routing and the main processing loop.

pub mod router;
pub mod server;

pub use router::{ChatEvent, ChatLine, MessageRouter};
pub use server::{PrintBot, ShutdownToken, StopReason};
