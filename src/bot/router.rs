//! Line classification: keepalive probes, chat messages, and everything else.
//!
//! The router is pure. It turns one framed IRC line into a [`ChatEvent`] and, for chat
//! messages, decides whether the text is a print request of the form
//! `!<trigger> <payload>`. The trigger must be followed by whitespace, so with trigger
//! `print` the text `!printer hi` is ordinary chat.
//!
//! Chat lines use the Twitch IRC envelope, optionally preceded by IRCv3 tags:
//!
//! ```text
//! @badge-info=;color=#FF0000 :alice!alice@alice.tmi.twitch.tv PRIVMSG #chan :hello there
//! ```
use log::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// `PING <token>`; must be answered with `PONG <token>` before the next line.
    Keepalive { token: String },
    Chat(ChatLine),
    /// Server notices, numerics, JOIN echoes and anything malformed.
    Noise,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    /// Login name from the message prefix.
    pub sender: String,
    pub channel: String,
    pub text: String,
    /// Text after `!<trigger> ` when the message is a print request.
    pub print_payload: Option<String>,
}

pub struct MessageRouter {
    trigger: String,
}

impl MessageRouter {
    pub fn new(trigger: &str) -> Self {
        Self {
            trigger: trigger.trim().trim_start_matches('!').to_string(),
        }
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    pub fn classify(&self, raw: &str) -> ChatEvent {
        let line = raw.trim_end_matches(['\r', '\n']);
        if let Some(token) = parse_ping(line) {
            trace!("Parsed PING '{}'", token);
            return ChatEvent::Keepalive {
                token: token.to_string(),
            };
        }
        match parse_privmsg(line) {
            Some((sender, channel, text)) => {
                let print_payload = self.extract_trigger(text);
                ChatEvent::Chat(ChatLine {
                    sender: sender.to_string(),
                    channel: channel.to_string(),
                    text: text.to_string(),
                    print_payload,
                })
            }
            None => ChatEvent::Noise,
        }
    }

    /// Return the payload of `!<trigger> <payload>`. The trigger must match exactly,
    /// case included; an empty payload is not a print request.
    pub fn extract_trigger(&self, text: &str) -> Option<String> {
        let after = text.strip_prefix('!')?.strip_prefix(self.trigger.as_str())?;
        if !after.chars().next()?.is_whitespace() {
            return None;
        }
        let payload = after.trim();
        if payload.is_empty() {
            return None;
        }
        Some(payload.to_string())
    }
}

/// `PING :tmi.twitch.tv` → `:tmi.twitch.tv`. The token is the first argument as sent,
/// including any leading colon, so the reply mirrors it byte for byte.
fn parse_ping(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("PING")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    rest.split_whitespace().next()
}

fn parse_privmsg(line: &str) -> Option<(&str, &str, &str)> {
    let mut rest = line;
    if rest.starts_with('@') {
        let (_tags, after) = rest.split_once(' ')?;
        rest = after;
    }
    let prefix = rest.strip_prefix(':')?;
    let (prefix, after) = prefix.split_once(' ')?;
    let sender = prefix.split('!').next()?;
    if sender.is_empty() {
        return None;
    }
    let (command, params) = after.split_once(' ')?;
    if command != "PRIVMSG" {
        return None;
    }
    let (channel, trailing) = params.split_once(' ')?;
    let text = trailing.strip_prefix(':').unwrap_or(trailing);
    if text.is_empty() {
        return None;
    }
    Some((sender, channel, text))
}
