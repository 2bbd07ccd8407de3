//! # qserv-proto
//!
//! Line-level building blocks for IRC server-to-server links.
//!
//! - [`Message`]: one protocol line split into tags, source, verb,
//!   positional parameters and trailing parameter. Parsing never fails on
//!   malformed input; it degrades to partial fields.
//! - [`casemap`]: RFC 1459 case folding used for every nick, channel and
//!   account key.
//! - [`LineCodec`]: newline framing for `tokio_util::codec`.
//!
//! ```rust
//! use qserv_proto::Message;
//!
//! let msg: Message = ":042 FJOIN #rust 1700000000 + :o,042AAAAAB".parse().unwrap();
//! assert_eq!(msg.verb, "FJOIN");
//! assert_eq!(msg.param(0), Some("#rust"));
//! assert_eq!(msg.trailing.as_deref(), Some("o,042AAAAAB"));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod casemap;
pub mod chan;
pub mod error;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;

pub use self::casemap::{irc_eq, irc_lower_char, irc_to_lower};
pub use self::chan::ChannelExt;
pub use self::error::ProtocolError;
#[cfg(feature = "tokio")]
pub use self::line::LineCodec;
pub use self::message::Message;
