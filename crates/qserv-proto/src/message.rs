//! Protocol line parsing and serialization.

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// One parsed protocol line.
///
/// `verb` keeps the case it arrived with; dispatch compares it
/// case-insensitively. `raw` is the original text without the line
/// terminator and is left empty for locally built messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Tag payload without the leading `@`.
    pub tags: Option<String>,
    /// Source identifier without the leading `:`.
    pub source: Option<String>,
    /// Command verb or token. Empty when the line had none.
    pub verb: String,
    /// Positional parameters.
    pub params: Vec<String>,
    /// Trailing parameter (the text after ` :`), which may contain spaces.
    pub trailing: Option<String>,
    /// Original line text.
    pub raw: String,
}

impl Message {
    /// Build a message from a verb and positional parameters.
    pub fn new<V, I, S>(verb: V, params: I) -> Self
    where
        V: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            verb: verb.into(),
            params: params.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set the source identifier.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the trailing parameter.
    #[must_use]
    pub fn with_trailing(mut self, trailing: impl Into<String>) -> Self {
        self.trailing = Some(trailing.into());
        self
    }

    /// Parse one line.
    ///
    /// Returns `None` only for empty input. Anything else yields a message,
    /// possibly with an empty verb (a line holding only tags or only a
    /// source), which dispatch ignores.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return None;
        }

        let mut msg = Message {
            raw: line.to_string(),
            ..Message::default()
        };
        let mut rest = line;

        if let Some(tagged) = rest.strip_prefix('@') {
            match tagged.split_once(' ') {
                Some((tags, tail)) => {
                    msg.tags = Some(tags.to_string());
                    rest = tail;
                }
                None => {
                    msg.tags = Some(tagged.to_string());
                    return Some(msg);
                }
            }
        }

        if let Some(sourced) = rest.strip_prefix(':') {
            match sourced.split_once(' ') {
                Some((source, tail)) => {
                    msg.source = Some(source.to_string());
                    rest = tail;
                }
                None => {
                    msg.source = Some(sourced.to_string());
                    return Some(msg);
                }
            }
        }

        if let Some(idx) = rest.find(" :") {
            msg.trailing = Some(rest[idx + 2..].to_string());
            rest = &rest[..idx];
        }

        let mut tokens = rest.split_whitespace();
        if let Some(verb) = tokens.next() {
            msg.verb = verb.to_string();
            msg.params = tokens.map(str::to_string).collect();
        }

        Some(msg)
    }

    /// Upper-cased verb, the key used for dispatch.
    pub fn verb_upper(&self) -> String {
        self.verb.to_ascii_uppercase()
    }

    /// Positional parameter at `idx`.
    pub fn param(&self, idx: usize) -> Option<&str> {
        self.params.get(idx).map(String::as_str)
    }

    /// The trailing parameter if present, otherwise the last positional one.
    ///
    /// Some peers send a final single-word argument without the colon.
    pub fn last_arg(&self) -> Option<&str> {
        self.trailing
            .as_deref()
            .or_else(|| self.params.last().map(String::as_str))
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s).ok_or(ProtocolError::EmptyMessage)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tags) = &self.tags {
            write!(f, "@{tags} ")?;
        }
        if let Some(source) = &self.source {
            write!(f, ":{source} ")?;
        }
        f.write_str(&self.verb)?;
        for param in &self.params {
            write!(f, " {param}")?;
        }
        if let Some(trailing) = &self.trailing {
            write!(f, " :{trailing}")?;
        }
        Ok(())
    }
}
