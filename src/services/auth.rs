//! Authorization rules.
//!
//! Channel-scoped checks run in a fixed order: channel suspension, then
//! login, then account suspension, then ownership, then numeric level.
//! Operator-only commands skip the level checks but need operator status.

use super::ServiceContext;
use crate::error::Denial;

/// Minimum level for op/deop/voice/devoice.
pub const LEVEL_MODES: u16 = 1;
/// Minimum level for changing another account's access.
pub const LEVEL_ACCESS: u16 = 400;
/// Minimum level for making the service join or part.
pub const LEVEL_JOIN: u16 = 450;

/// What a channel check is for; picks the denial wording.
#[derive(Debug, Clone, Copy)]
pub struct Requirement {
    pub min_level: u16,
    /// Verb shown in the denial ("OP", "JOIN", ...).
    pub action: &'static str,
}

impl Requirement {
    pub const fn new(min_level: u16, action: &'static str) -> Self {
        Self { min_level, action }
    }
}

/// The account bound to `uid`, unless it is suspended.
pub fn require_account(ctx: &ServiceContext, uid: &str) -> Result<String, Denial> {
    let account = ctx.state.session_account(uid).ok_or(Denial::NotLoggedIn)?;
    refuse_suspended_account(ctx, &account)?;
    Ok(account)
}

pub fn refuse_suspended_account(ctx: &ServiceContext, account: &str) -> Result<(), Denial> {
    match ctx.stores.suspensions.account(account) {
        Some(s) => Err(Denial::AccountSuspended(s.reason)),
        None => Ok(()),
    }
}

pub fn refuse_suspended_channel(ctx: &ServiceContext, channel: &str) -> Result<(), Denial> {
    if ctx.stores.suspensions.is_channel_suspended(channel) {
        return Err(Denial::ChannelSuspended(channel.to_string()));
    }
    Ok(())
}

/// Authorize a channel control command. Returns the acting account.
pub fn authorize_channel(
    ctx: &ServiceContext,
    uid: &str,
    channel: &str,
    req: Requirement,
) -> Result<String, Denial> {
    refuse_suspended_channel(ctx, channel)?;
    let account = require_account(ctx, uid)?;

    let access = &ctx.stores.access;
    if access.is_owner(channel, &account) || access.level(channel, &account) >= req.min_level {
        return Ok(account);
    }
    Err(Denial::InsufficientLevel {
        channel: channel.to_string(),
        needed: req.min_level,
        action: req.action,
    })
}

/// Authorize changing another account's access on `channel`.
pub fn authorize_access_change(
    ctx: &ServiceContext,
    uid: &str,
    channel: &str,
) -> Result<String, Denial> {
    authorize_channel(ctx, uid, channel, Requirement::new(LEVEL_ACCESS, "change access"))
        .map_err(|d| match d {
            Denial::InsufficientLevel { .. } => Denial::OwnerRequired(channel.to_string()),
            other => other,
        })
}

pub fn require_oper(ctx: &ServiceContext, uid: &str) -> Result<(), Denial> {
    if ctx.state.is_oper(uid) {
        Ok(())
    } else {
        Err(Denial::OperOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::Fixture;
    use crate::store::now_ts;

    const OP: Requirement = Requirement::new(LEVEL_MODES, "OP");
    const JOIN: Requirement = Requirement::new(LEVEL_JOIN, "JOIN");

    fn setup() -> Fixture {
        let fx = Fixture::new();
        let access = &fx.ctx.stores.access;
        access.set_owner("#test", "alice").unwrap();
        access.set_level("#test", "carol", 100).unwrap();
        fx.ctx.state.bind_session("u-alice", "alice");
        fx.ctx.state.bind_session("u-carol", "carol");
        fx
    }

    #[test]
    fn owner_passes_every_level() {
        let fx = setup();
        assert_eq!(authorize_channel(&fx.ctx, "u-alice", "#TEST", JOIN).unwrap(), "alice");
        assert!(authorize_access_change(&fx.ctx, "u-alice", "#test").is_ok());
    }

    #[test]
    fn level_is_compared_against_the_minimum() {
        let fx = setup();
        assert!(authorize_channel(&fx.ctx, "u-carol", "#test", OP).is_ok());
        assert_eq!(
            authorize_channel(&fx.ctx, "u-carol", "#test", JOIN).unwrap_err(),
            Denial::InsufficientLevel {
                channel: "#test".into(),
                needed: 450,
                action: "JOIN"
            }
        );
        assert_eq!(
            authorize_access_change(&fx.ctx, "u-carol", "#test").unwrap_err(),
            Denial::OwnerRequired("#test".into())
        );
    }

    #[test]
    fn precedence_order() {
        let fx = setup();
        let sus = &fx.ctx.stores.suspensions;

        assert_eq!(
            authorize_channel(&fx.ctx, "u-nobody", "#test", OP).unwrap_err(),
            Denial::NotLoggedIn
        );

        sus.suspend_account("alice", now_ts() + 3600, "abuse").unwrap();
        assert_eq!(
            authorize_channel(&fx.ctx, "u-alice", "#test", OP).unwrap_err(),
            Denial::AccountSuspended("abuse".into())
        );

        // Channel suspension outranks everything, even for the logged-out.
        sus.suspend_channel("#test", now_ts() + 3600, "spam").unwrap();
        assert_eq!(
            authorize_channel(&fx.ctx, "u-nobody", "#test", OP).unwrap_err(),
            Denial::ChannelSuspended("#test".into())
        );
    }

    #[test]
    fn oper_status_comes_from_state() {
        let fx = setup();
        assert_eq!(require_oper(&fx.ctx, "u-alice").unwrap_err(), Denial::OperOnly);
        fx.ctx.state.add_oper("u-alice");
        assert!(require_oper(&fx.ctx, "u-alice").is_ok());
    }
}
