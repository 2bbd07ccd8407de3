//! Link lifecycle state machine.
//!
//! `Disconnected → Connecting → Handshaking → Linked → Disconnected`.
//! Any state may fall back to `Disconnected`; every other move must follow
//! the chain.

use std::fmt;

use tracing::debug;

use crate::error::LinkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    /// Dialing the uplink (TCP, then TLS if configured).
    Connecting,
    /// Transport is up; handshake lines are being sent.
    Handshaking,
    /// Handshake sent; the read loop owns the connection.
    Linked,
}

impl LinkState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Linked => "linked",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the current [`LinkState`] and rejects illegal moves.
#[derive(Debug, Default)]
pub struct LinkMachine {
    state: LinkState,
    /// Successful handshakes since startup.
    sessions: u64,
}

impl LinkMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn sessions(&self) -> u64 {
        self.sessions
    }

    pub fn transition(&mut self, next: LinkState) -> Result<(), LinkError> {
        use LinkState::*;

        let allowed = matches!(
            (self.state, next),
            (_, Disconnected)
                | (Disconnected, Connecting)
                | (Connecting, Handshaking)
                | (Handshaking, Linked)
        );
        if !allowed {
            return Err(LinkError::InvalidTransition {
                from: self.state.as_str(),
                to: next.as_str(),
            });
        }

        if next == Linked {
            self.sessions += 1;
        }
        debug!(from = %self.state, to = %next, "Link state transition");
        self.state = next;
        Ok(())
    }
}
