//! Test utilities & fixtures shared by the integration tests.
#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use printbot::bot::ShutdownToken;
use printbot::config::PrinterConfig;
use printbot::printer::{PrintError, PrintJob, PrintQueue, RenderSink, Typeface};
use printbot::storage::{
    MessageId, MessageRecord, ModerationStore, SledModerationStore, StoreError, UserId,
};
use printbot::twitch::{ChatSession, Credentials};
use tokio::io::DuplexStream;

/// Handshake bytes every session writes before anything else.
pub const HANDSHAKE: &str = "PASS oauth:test\r\nNICK printbot\r\nJOIN #chan\r\n";

/// Every non-space char is a solid block; enough to see ink land on the canvas.
pub struct BlockFace;

impl Typeface for BlockFace {
    fn ascent(&self) -> f32 {
        10.0
    }

    fn draw_glyph(
        &self,
        ch: char,
        x: f32,
        baseline: f32,
        plot: &mut dyn FnMut(i32, i32, f32),
    ) -> f32 {
        if !ch.is_whitespace() {
            for dy in 0..10 {
                for dx in 0..7 {
                    plot(x as i32 + dx, baseline as i32 - 10 + dy, 1.0);
                }
            }
        }
        8.0
    }
}

/// Sink that remembers every job. Can be told to fail, or to cancel a token on delivery.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub jobs: Arc<Mutex<Vec<PrintJob>>>,
    pub fail: bool,
    pub cancel_on_deliver: Option<ShutdownToken>,
}

impl RenderSink for RecordingSink {
    fn deliver(&mut self, job: &PrintJob) -> Result<(), PrintError> {
        self.jobs.lock().unwrap().push(job.clone());
        if let Some(token) = &self.cancel_on_deliver {
            token.cancel();
        }
        if self.fail {
            return Err(PrintError::Sink("printer offline".to_string()));
        }
        Ok(())
    }
}

pub fn print_queue(sink: RecordingSink) -> PrintQueue {
    let config = PrinterConfig {
        width: 64,
        height: 16,
        ..PrinterConfig::default()
    };
    PrintQueue::new(BlockFace, sink, &config)
}

pub fn open_store(dir: &tempfile::TempDir) -> SledModerationStore {
    SledModerationStore::open(dir.path().join("printbot.db")).expect("store")
}

/// Sled store with injected write failures: `ensure_user` fails for `broken_user`, and
/// the `fail_record_on`-th call to `record_message` (1-based) fails.
pub struct FlakyStore {
    pub inner: SledModerationStore,
    pub broken_user: Option<String>,
    pub fail_record_on: usize,
    record_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: SledModerationStore) -> Self {
        Self {
            inner,
            broken_user: None,
            fail_record_on: 0,
            record_calls: AtomicUsize::new(0),
        }
    }

    fn disk_full() -> StoreError {
        StoreError::Io(io::Error::new(io::ErrorKind::Other, "disk full"))
    }
}

impl ModerationStore for FlakyStore {
    fn ensure_user(&self, name: &str) -> Result<UserId, StoreError> {
        if self.broken_user.as_deref() == Some(name) {
            return Err(Self::disk_full());
        }
        self.inner.ensure_user(name)
    }

    fn record_message(&self, user_id: UserId, text: &str) -> Result<MessageRecord, StoreError> {
        let call = self.record_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_record_on {
            return Err(Self::disk_full());
        }
        self.inner.record_message(user_id, text)
    }

    fn is_blocked(&self, text: &str) -> Result<bool, StoreError> {
        self.inner.is_blocked(text)
    }

    fn mark_printed(&self, message_id: MessageId) -> Result<(), StoreError> {
        self.inner.mark_printed(message_id)
    }

    fn increment_statistic(&self, name: &str, delta: i64) -> Result<i64, StoreError> {
        self.inner.increment_statistic(name, delta)
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        username: "printbot".to_string(),
        token: "oauth:test".to_string(),
    }
}

/// Connect a session over an in-memory pipe. The returned half plays the chat server.
pub async fn joined_session() -> (ChatSession<DuplexStream>, DuplexStream) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let session = ChatSession::handshake(client, &credentials(), "chan")
        .await
        .expect("handshake");
    (session, server)
}
