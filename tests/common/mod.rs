//! Integration test common infrastructure.
//!
//! A fake uplink server that accepts the daemon's connection, plus helpers
//! to start the real link driver against it.

pub mod uplink;

#[allow(unused_imports)]
pub use uplink::{FakeUplink, Peer, Qserv};
