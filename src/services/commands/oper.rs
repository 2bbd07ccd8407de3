//! Operator-only commands: purge, suspend, unsuspend.

use qserv_proto::ChannelExt;
use tracing::info;

use super::{Persist, channel_arg, resolve_account};
use crate::error::Denial;
use crate::services::auth::require_oper;
use crate::services::{CommandResult, Request, ServiceContext, ServiceEffect};
use crate::store::now_ts;

const SUSPEND_USAGE: &str = "suspend <#channel|account> <days> <reason>";
const UNSUSPEND_USAGE: &str = "unsuspend <#channel|account>";
const DEFAULT_REASON: &str = "No reason given";
const DAY_SECS: i64 = 86_400;
/// Longest suspension accepted, in days.
const MAX_DAYS: i64 = 36_500;

/// Leave the channel and forget everything stored about it.
pub fn purge(ctx: &ServiceContext, req: &Request) -> CommandResult {
    let channel = channel_arg(req, 0, "purge <#channel>")?;
    require_oper(ctx, &req.uid)?;

    let stores = &ctx.stores;
    let mut persist = Persist::default();
    persist.check(stores.access.remove_channel(channel), true);
    persist.check(stores.suspensions.remove_channel(channel), true);
    persist.check(stores.registry.remove(channel), true);
    ctx.state.drop_channel(channel);

    info!(channel = %channel, oper = %req.uid, "Channel purged");
    Ok(vec![
        ServiceEffect::Part {
            channel: channel.to_string(),
            reason: "Purged".to_string(),
        },
        persist.ack(format!("Purged {channel}")),
    ])
}

/// Suspend a channel (and every account on its access list) or an account.
pub fn suspend(ctx: &ServiceContext, req: &Request) -> CommandResult {
    require_oper(ctx, &req.uid)?;
    let target = req.arg(0).ok_or(Denial::Usage(SUSPEND_USAGE))?;
    let days = req
        .arg(1)
        .and_then(|d| d.parse::<i64>().ok())
        .ok_or(Denial::Usage(SUSPEND_USAGE))?
        .clamp(1, MAX_DAYS);
    let reason = match req.rest(2) {
        r if r.is_empty() => DEFAULT_REASON.to_string(),
        r => r,
    };
    let until = now_ts() + days * DAY_SECS;

    let suspensions = &ctx.stores.suspensions;
    let mut persist = Persist::default();

    let subject = if target.is_channel_name() {
        persist.check(suspensions.suspend_channel(target, until, &reason), ());
        let accounts = ctx.stores.access.accounts(target);
        let cascade = format!("Suspended via {target}: {reason}");
        persist.check(suspensions.suspend_accounts(&accounts, until, &cascade), ());
        info!(channel = %target, days, accounts = accounts.len(), oper = %req.uid, "Channel suspended");
        target.to_string()
    } else {
        let account = resolve_account(ctx, target);
        persist.check(suspensions.suspend_account(&account, until, &reason), ());
        info!(account = %account, days, oper = %req.uid, "Account suspended");
        account
    };

    Ok(vec![persist.ack(format!(
        "Suspended {subject} for {days} day(s): {reason}"
    ))])
}

/// Lift a suspension by moving its expiry into the past. A channel lifts
/// the accounts on its access list too.
pub fn unsuspend(ctx: &ServiceContext, req: &Request) -> CommandResult {
    require_oper(ctx, &req.uid)?;
    let target = req.arg(0).ok_or(Denial::Usage(UNSUSPEND_USAGE))?;

    let suspensions = &ctx.stores.suspensions;
    let mut persist = Persist::default();

    let (subject, was_active) = if target.is_channel_name() {
        let channel = persist.check(suspensions.unsuspend_channel(target), true);
        let accounts = ctx.stores.access.accounts(target);
        let members = persist.check(suspensions.unsuspend_accounts(&accounts), true);
        (target.to_string(), channel || members)
    } else {
        let account = resolve_account(ctx, target);
        let active = persist.check(suspensions.unsuspend_account(&account), true);
        (account, active)
    };

    if !was_active {
        return Err(Denial::Invalid(format!("{subject} is not suspended.")));
    }
    info!(target = %subject, oper = %req.uid, "Suspension lifted");
    Ok(vec![persist.ack(format!("Unsuspended {subject}."))])
}
