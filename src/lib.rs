//! # Printbot - Moderated Twitch chat on a thermal printer
//!
//! Printbot joins a Twitch channel over the IRC gateway, records every chat message,
//! checks it against a forbidden-word list, and sends `!print`-style requests that pass
//! moderation to a small monochrome printer.
//!
//! ## Features
//!
//! - **IRC Session**: PASS/NICK/JOIN handshake, `\r\n` line framing across read boundaries,
//!   and synchronous PING/PONG keepalives.
//! - **Message Routing**: Pure classification of raw lines into keepalives, chat messages, and noise.
//! - **Moderation Store**: Sled-backed users, messages, forbidden words, and counters.
//! - **Print Queue**: TrueType text rendered onto a fixed-size 1-bit canvas and handed to a sink.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use printbot::bot::{PrintBot, ShutdownToken};
//! use printbot::config::Config;
//! use printbot::printer::{PrintQueue, SpoolSink, TrueTypeFace};
//! use printbot::storage::SledModerationStore;
//! use printbot::twitch::ChatSession;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("printbot.toml").await?;
//!     let store = SledModerationStore::open(&config.storage.db_path)?;
//!     let face = TrueTypeFace::load(&config.printer.font_path, config.printer.font_size)?;
//!     let sink = SpoolSink::new(&config.printer.spool_dir)?;
//!     let queue = PrintQueue::new(face, sink, &config.printer);
//!     let session = ChatSession::connect(&config.twitch).await?;
//!
//!     let mut bot = PrintBot::new(&config.bot.trigger, session, store, queue);
//!     bot.run(ShutdownToken::new()).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`twitch`] - IRC connection, handshake, line framing, and keepalive replies
//! - [`bot`] - Line classification and the main processing loop
//! - [`storage`] - Persistence and moderation decisions
//! - [`printer`] - Rasterization and delivery to the rendering sink
//! - [`config`] - Configuration loading and validation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Chat Session   │ ← framed lines, PING/PONG
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ Message Router  │ ← keepalive / chat / noise
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ Moderation Store│ ← persist + forbidden-word check
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Print Queue   │ ← bitmap → rendering sink
//! └─────────────────┘
//! ```

pub mod bot;
pub mod config;
pub mod logutil;
pub mod printer;
pub mod storage;
pub mod twitch;
pub mod validation;
