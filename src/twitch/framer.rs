//! Incremental `\r\n` line framer for the IRC byte stream.
//!
//! TCP reads do not respect line boundaries, so the framer keeps whatever follows the
//! last terminator and prefixes it to the next chunk. Splitting happens on raw bytes,
//! which also keeps multi-byte UTF-8 sequences intact when a read cuts one in half.
use bytes::{Buf, BytesMut};

/// Upper bound on a single buffered line. IRC caps lines at 512 bytes, Twitch tags push
/// that to a few KB; anything larger is treated as garbage and dropped.
const MAX_LINE_SIZE: usize = 16 * 1024;

pub struct LineFramer {
    buf: BytesMut,
}

impl LineFramer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Extract the next complete line without its terminator. A bare `\n` is accepted
    /// as a terminator too. Returns None until a full line is buffered.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else {
                if self.buf.len() > MAX_LINE_SIZE {
                    self.buf.clear();
                }
                return None;
            };
            let mut line = self.buf.split_to(pos);
            self.buf.advance(1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            if line.is_empty() {
                continue;
            }
            return Some(String::from_utf8_lossy(&line).into_owned());
        }
    }

    /// Drain every complete line currently buffered.
    pub fn drain_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line() {
            lines.push(line);
        }
        lines
    }

    /// Drop any partial line.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_complete_lines() {
        let mut framer = LineFramer::new();
        framer.push(b"PING :tmi.twitch.tv\r\n:a!a@a PRIVMSG #c :hi\r\n");
        assert_eq!(
            framer.drain_lines(),
            vec!["PING :tmi.twitch.tv", ":a!a@a PRIVMSG #c :hi"]
        );
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn partial_line_carries_over() {
        let mut framer = LineFramer::new();
        framer.push(b"PING :tmi.tw");
        assert!(framer.next_line().is_none());
        assert_eq!(framer.pending(), 12);
        framer.push(b"itch.tv\r");
        assert!(framer.next_line().is_none());
        framer.push(b"\nNEXT");
        assert_eq!(framer.next_line().as_deref(), Some("PING :tmi.twitch.tv"));
        assert!(framer.next_line().is_none());
        assert_eq!(framer.pending(), 4);
    }

    #[test]
    fn utf8_split_across_reads() {
        let bytes = "héllo\r\n".as_bytes();
        let mut framer = LineFramer::new();
        framer.push(&bytes[..2]);
        framer.push(&bytes[2..]);
        assert_eq!(framer.next_line().as_deref(), Some("héllo"));
    }

    #[test]
    fn skips_empty_lines_and_bare_newlines() {
        let mut framer = LineFramer::new();
        framer.push(b"\r\n\r\nA\nB\r\n");
        assert_eq!(framer.drain_lines(), vec!["A", "B"]);
    }

    #[test]
    fn oversize_garbage_is_dropped() {
        let mut framer = LineFramer::new();
        framer.push(&vec![b'x'; MAX_LINE_SIZE + 1]);
        assert!(framer.next_line().is_none());
        assert_eq!(framer.pending(), 0);
    }
}
