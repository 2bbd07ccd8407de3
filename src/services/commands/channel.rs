//! regchan, join, part.

use tracing::info;

use super::{Persist, channel_arg};
use crate::error::Denial;
use crate::services::auth::{
    LEVEL_JOIN, Requirement, authorize_channel, refuse_suspended_channel, require_account,
};
use crate::services::{CommandResult, Request, ServiceContext, ServiceEffect};
use crate::store::now_ts;

const JOIN: Requirement = Requirement::new(LEVEL_JOIN, "JOIN");
const PART: Requirement = Requirement::new(LEVEL_JOIN, "PART");

/// `regchan <#channel> [owner-account]`; the owner form is for operators.
pub fn regchan(ctx: &ServiceContext, req: &Request) -> CommandResult {
    let channel = channel_arg(req, 0, "regchan <#channel> [owner-account]")?;
    refuse_suspended_channel(ctx, channel)?;

    let owner = match req.arg(1) {
        Some(owner) if ctx.state.is_oper(&req.uid) => ctx
            .stores
            .accounts
            .display_name(owner)
            .ok_or_else(|| Denial::NoSuchAccount(owner.to_string()))?,
        _ => require_account(ctx, &req.uid)?,
    };

    let stores = &ctx.stores;
    if stores.registry.is_registered(channel) {
        return Err(Denial::ChannelAlreadyRegistered(channel.to_string()));
    }
    let mut persist = Persist::default();
    if !persist.check(stores.registry.register(channel, &req.uid, &owner), true) {
        return Err(Denial::ChannelAlreadyRegistered(channel.to_string()));
    }
    persist.check(stores.access.set_owner(channel, &owner), ());

    info!(channel = %channel, owner = %owner, uid = %req.uid, "Channel registered");
    Ok(vec![persist.ack(format!("Registered {channel} (owner: {owner})."))])
}

pub fn join(ctx: &ServiceContext, req: &Request) -> CommandResult {
    let channel = channel_arg(req, 0, "join <#channel>")?;
    authorize_channel(ctx, &req.uid, channel, JOIN)?;

    let ts = ctx.state.record_ts(channel, now_ts());
    let uid = &ctx.protocol.identity().service_uid;
    ctx.state.add_members(channel, ts, [uid.as_str()]);

    Ok(vec![
        ServiceEffect::Join {
            channel: channel.to_string(),
            ts,
        },
        ServiceEffect::reply(format!("Joined {channel}.")),
    ])
}

pub fn part(ctx: &ServiceContext, req: &Request) -> CommandResult {
    let channel = channel_arg(req, 0, "part <#channel>")?;
    authorize_channel(ctx, &req.uid, channel, PART)?;

    ctx.state
        .remove_member(channel, &ctx.protocol.identity().service_uid);

    Ok(vec![
        ServiceEffect::reply(format!("Leaving {channel}.")),
        ServiceEffect::Part {
            channel: channel.to_string(),
            reason: "Requested".to_string(),
        },
    ])
}
