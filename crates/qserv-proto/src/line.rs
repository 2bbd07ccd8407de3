//! Line-based codec for tokio.
//!
//! Reads newline-terminated lines and writes CRLF-terminated ones. The
//! decoder never fails on content: invalid UTF-8 is replaced and overlong
//! lines are discarded, so a single bad line never tears down a link.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{self, ProtocolError};

/// Default maximum line length for server-to-server traffic.
///
/// Burst lines (channel membership lists in particular) routinely exceed
/// the 512-byte client limit.
pub const DEFAULT_MAX_LEN: usize = 64 * 1024;

/// Line-based codec that handles newline-terminated messages.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    /// Maximum line length
    max_len: usize,
    /// Set while skipping the remainder of an overlong line.
    discarding: bool,
}

impl LineCodec {
    /// Create a codec with [`DEFAULT_MAX_LEN`].
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LEN)
    }

    /// Create a codec with a custom max line length.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }

    /// Configured maximum line length in bytes.
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if src.len() > self.max_len {
                    // Drop what we have and skip to the next newline.
                    src.clear();
                    self.discarding = true;
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.len() > self.max_len {
                continue;
            }

            let text = String::from_utf8_lossy(&line);
            return Ok(Some(text.trim_end_matches(['\r', '\n']).to_string()));
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: String, dst: &mut BytesMut) -> error::Result<()> {
        let body = msg.trim_end_matches(['\r', '\n']);
        if let Some(ch) = body.chars().find(|c| matches!(c, '\r' | '\n' | '\0')) {
            return Err(ProtocolError::IllegalControlChar(ch));
        }
        if body.len() + 2 > self.max_len {
            return Err(ProtocolError::MessageTooLong {
                actual: body.len() + 2,
                limit: self.max_len,
            });
        }

        dst.reserve(body.len() + 2);
        dst.put_slice(body.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
