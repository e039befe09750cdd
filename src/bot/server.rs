//! The chat pipeline: one session, one thread of control, strict arrival order.
//!
//! Each iteration of [`PrintBot::run`] polls the [`ShutdownToken`], performs exactly one
//! blocking read, and processes every line that read completed before reading again:
//!
//! 1. `PING` → `PONG` immediately, before the next line is looked at
//! 2. chat → ensure user, persist message (moderation decided at insert)
//! 3. unblocked print request → render, deliver, mark printed
//!
//! Read, persistence and delivery failures are logged and the loop carries on. Only
//! cancellation or the peer closing the connection ends it.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use super::router::{ChatEvent, ChatLine, MessageRouter};
use crate::logutil::escape_log;
use crate::printer::PrintQueue;
use crate::storage::{stats, ModerationStore};
use crate::twitch::ChatSession;

/// Pause after a failed read so a persistently broken socket does not spin.
const READ_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Cancellation flag shared between the signal handler and the loop. The loop only
/// looks at it between reads, so an in-flight read or message is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    cancelled: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancel this token on the first Ctrl+C. Must be called inside a Tokio runtime.
    pub fn cancel_on_ctrl_c(&self) {
        let token = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal, stopping after the current read");
                token.cancel();
            }
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    PeerClosed,
}

pub struct PrintBot<S, M> {
    router: MessageRouter,
    session: ChatSession<S>,
    store: M,
    queue: PrintQueue,
}

impl<S, M> PrintBot<S, M>
where
    S: AsyncRead + AsyncWrite + Unpin,
    M: ModerationStore,
{
    pub fn new(trigger: &str, session: ChatSession<S>, store: M, queue: PrintQueue) -> Self {
        Self {
            router: MessageRouter::new(trigger),
            session,
            store,
            queue,
        }
    }

    pub fn store(&self) -> &M {
        &self.store
    }

    pub fn session(&self) -> &ChatSession<S> {
        &self.session
    }

    /// Run until cancelled or the server hangs up, then close the session.
    pub async fn run(&mut self, shutdown: ShutdownToken) -> StopReason {
        info!("listening for !{} requests", self.router.trigger());
        let reason = loop {
            if shutdown.is_cancelled() {
                info!("will close all connections");
                break StopReason::Cancelled;
            }
            let lines = match self.session.read_lines().await {
                Ok(lines) => lines,
                Err(e) if e.is_terminal() => {
                    error!("{}", e);
                    break StopReason::PeerClosed;
                }
                Err(e) => {
                    warn!("{}", e);
                    tokio::time::sleep(READ_RETRY_DELAY).await;
                    continue;
                }
            };
            for line in lines {
                self.handle_line(&line).await;
            }
        };
        self.session.close().await;
        reason
    }

    /// Process one framed line to completion.
    pub async fn handle_line(&mut self, line: &str) {
        debug!("received: {}", escape_log(line));
        match self.router.classify(line) {
            ChatEvent::Keepalive { token } => {
                match self.session.respond_to_keepalive(&token).await {
                    Ok(()) => {
                        debug!("answered PING {}", token);
                        self.bump(stats::PINGS_ANSWERED);
                    }
                    Err(e) => warn!("failed to answer PING: {}", e),
                }
            }
            ChatEvent::Chat(chat) => self.handle_chat(chat),
            ChatEvent::Noise => trace!("ignoring: {}", escape_log(line)),
        }
    }

    fn handle_chat(&mut self, chat: ChatLine) {
        self.bump(stats::MESSAGES_RECEIVED);
        let user_id = match self.store.ensure_user(&chat.sender) {
            Ok(id) => id,
            Err(e) => {
                warn!("failed to record user {}: {}", escape_log(&chat.sender), e);
                return;
            }
        };
        let record = match self.store.record_message(user_id, &chat.text) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    "failed to record message from {}: {}",
                    escape_log(&chat.sender),
                    e
                );
                return;
            }
        };
        if record.blocked {
            info!(
                "blocked message {} from {}",
                record.id,
                escape_log(&chat.sender)
            );
            self.bump(stats::MESSAGES_BLOCKED);
            return;
        }
        if chat.print_payload.is_none() {
            return;
        }
        // Print the stored text, which is exactly what moderation saw.
        let Some(payload) = self.router.extract_trigger(&record.text) else {
            return;
        };

        self.bump(stats::PRINT_REQUESTS);
        match self.queue.print(record.id, &payload) {
            Ok(()) => {
                if let Err(e) = self.store.mark_printed(record.id) {
                    warn!("printed message {} but could not flag it: {}", record.id, e);
                }
                self.bump(stats::MESSAGES_PRINTED);
            }
            Err(e) => {
                warn!("failed to print message {}: {}", record.id, e);
                self.bump(stats::PRINT_FAILURES);
            }
        }
    }

    fn bump(&self, name: &str) {
        if let Err(e) = self.store.increment_statistic(name, 1) {
            debug!("failed to update counter {}: {}", name, e);
        }
    }
}
