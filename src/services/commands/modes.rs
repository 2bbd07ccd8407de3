//! op, deop, voice, devoice.

use super::channel_arg;
use crate::error::Denial;
use crate::services::auth::{LEVEL_MODES, Requirement, authorize_channel};
use crate::services::{CommandResult, Request, ServiceContext, ServiceEffect};

/// One member-mode command.
pub struct MemberMode {
    change: &'static str,
    requirement: Requirement,
    usage: &'static str,
}

pub const OP: MemberMode = MemberMode {
    change: "+o",
    requirement: Requirement::new(LEVEL_MODES, "OP"),
    usage: "op <#channel> [nick]",
};
pub const DEOP: MemberMode = MemberMode {
    change: "-o",
    requirement: Requirement::new(LEVEL_MODES, "DEOP"),
    usage: "deop <#channel> [nick]",
};
pub const VOICE: MemberMode = MemberMode {
    change: "+v",
    requirement: Requirement::new(LEVEL_MODES, "VOICE"),
    usage: "voice <#channel> [nick]",
};
pub const DEVOICE: MemberMode = MemberMode {
    change: "-v",
    requirement: Requirement::new(LEVEL_MODES, "DEVOICE"),
    usage: "devoice <#channel> [nick]",
};

/// Apply `mode` to the caller, or to a named member of the channel.
pub fn member_mode(ctx: &ServiceContext, req: &Request, mode: MemberMode) -> CommandResult {
    let channel = channel_arg(req, 0, mode.usage)?;
    authorize_channel(ctx, &req.uid, channel, mode.requirement)?;

    let target_uid = match req.arg(1) {
        Some(nick) => ctx
            .state
            .member_by_nick(channel, nick)
            .ok_or_else(|| Denial::NotVisible {
                nick: nick.to_string(),
                channel: channel.to_string(),
            })?,
        None => req.uid.clone(),
    };
    let ts = ctx
        .state
        .channel_ts(channel)
        .ok_or_else(|| Denial::ChannelNotActive(channel.to_string()))?;

    Ok(vec![ServiceEffect::ChannelMode {
        channel: channel.to_string(),
        ts,
        change: mode.change,
        target_uid,
    }])
}
