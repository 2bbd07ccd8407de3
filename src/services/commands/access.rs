//! adduser, deluser, access.

use tracing::info;

use super::{Persist, channel_arg, display, resolve_account};
use crate::error::Denial;
use crate::services::auth::authorize_access_change;
use crate::services::{CommandResult, Request, ServiceContext, ServiceEffect};
use crate::store::OWNER_LEVEL;

const ADDUSER_USAGE: &str = "adduser <#channel> <account-or-nick> <level 1-500>";
const DELUSER_USAGE: &str = "deluser <#channel> <account-or-nick>";

pub fn adduser(ctx: &ServiceContext, req: &Request) -> CommandResult {
    let channel = channel_arg(req, 0, ADDUSER_USAGE)?;
    let (Some(token), Some(level)) = (req.arg(1), req.arg(2)) else {
        return Err(Denial::Usage(ADDUSER_USAGE));
    };
    let actor = authorize_access_change(ctx, &req.uid, channel)?;

    let level = level
        .parse::<u16>()
        .ok()
        .filter(|l| (1..=OWNER_LEVEL).contains(l))
        .ok_or_else(|| Denial::Invalid(format!("Level must be between 1 and {OWNER_LEVEL}.")))?;
    let account = resolve_account(ctx, token);

    let access = &ctx.stores.access;
    if access.is_owner(channel, &account) {
        return Err(Denial::Invalid(format!(
            "{account} owns {channel}; the owner's level is fixed at {OWNER_LEVEL}."
        )));
    }

    let mut persist = Persist::default();
    persist.check(access.set_level(channel, &account, level), true);
    info!(channel = %channel, account = %account, level, by = %actor, "Access set");
    Ok(vec![persist.ack(format!(
        "Set access on {channel}: {account} = {level}"
    ))])
}

pub fn deluser(ctx: &ServiceContext, req: &Request) -> CommandResult {
    let channel = channel_arg(req, 0, DELUSER_USAGE)?;
    let token = req.arg(1).ok_or(Denial::Usage(DELUSER_USAGE))?;
    let actor = authorize_access_change(ctx, &req.uid, channel)?;
    let account = resolve_account(ctx, token);

    let access = &ctx.stores.access;
    if access.is_owner(channel, &account) {
        return Err(Denial::Invalid(format!(
            "The owner of {channel} cannot be removed."
        )));
    }

    let mut persist = Persist::default();
    if !persist.check(access.set_level(channel, &account, 0), true) {
        return Err(Denial::Invalid(format!("{account} has no access on {channel}.")));
    }
    info!(channel = %channel, account = %account, by = %actor, "Access removed");
    Ok(vec![persist.ack(format!(
        "Removed access on {channel} for {account}"
    ))])
}

/// `access <#channel>`: public listing, highest level first.
pub fn list(ctx: &ServiceContext, req: &Request) -> CommandResult {
    let channel = channel_arg(req, 0, "access <#channel>")?;
    let entries = ctx.stores.access.list(channel);
    if entries.is_empty() {
        return Ok(vec![ServiceEffect::reply(format!(
            "No access entries for {channel}."
        ))]);
    }

    let listing = entries
        .iter()
        .map(|(account, level)| format!("{}={}", display(ctx, account), level))
        .collect::<Vec<_>>()
        .join(" | ");
    Ok(vec![ServiceEffect::reply(format!(
        "Access for {channel}: {listing}"
    ))])
}
