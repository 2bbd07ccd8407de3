//! qserv - channel service pseudo-server.
//!
//! Links to an IRC network as a server (InspIRCd 4 spanning tree or P10),
//! introduces one service client, and answers account and channel-access
//! commands sent to it.

pub mod bus;
pub mod config;
pub mod error;
pub mod link;
pub mod protocol;
pub mod security;
pub mod services;
pub mod state;
pub mod store;
