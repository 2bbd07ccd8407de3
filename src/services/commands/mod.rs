//! Command catalog.

mod access;
mod account;
mod channel;
mod modes;
mod oper;

use qserv_proto::ChannelExt;
use tracing::error;

use super::{CommandResult, Request, ServiceContext, ServiceEffect};
use crate::error::{Denial, StoreError};

const HELP: &str = "Commands: register login logout regchan op deop voice devoice \
                    adduser deluser access join part purge suspend unsuspend ping help";

/// Run one command.
pub async fn dispatch(ctx: &ServiceContext, req: &Request) -> CommandResult {
    match req.command.as_str() {
        "ping" => Ok(vec![ServiceEffect::reply("pong")]),
        "help" => Ok(vec![ServiceEffect::reply(HELP)]),

        "register" => account::register(ctx, req).await,
        "login" => account::login(ctx, req).await,
        "logout" => account::logout(ctx, req),

        "regchan" | "regchannel" => channel::regchan(ctx, req),
        "join" => channel::join(ctx, req),
        "part" => channel::part(ctx, req),

        "op" => modes::member_mode(ctx, req, modes::OP),
        "deop" => modes::member_mode(ctx, req, modes::DEOP),
        "voice" => modes::member_mode(ctx, req, modes::VOICE),
        "devoice" => modes::member_mode(ctx, req, modes::DEVOICE),

        "adduser" => access::adduser(ctx, req),
        "deluser" => access::deluser(ctx, req),
        "access" | "flags" | "listaccess" => access::list(ctx, req),

        "purge" => oper::purge(ctx, req),
        "suspend" => oper::suspend(ctx, req),
        "unsuspend" => oper::unsuspend(ctx, req),

        other => Err(Denial::UnknownCommand(other.to_string())),
    }
}

/// The channel argument at `idx`.
fn channel_arg<'a>(req: &'a Request, idx: usize, usage: &'static str) -> Result<&'a str, Denial> {
    req.arg(idx)
        .filter(|c| c.is_channel_name())
        .ok_or(Denial::Usage(usage))
}

/// Resolve a target token to an account: the account bound to a user
/// currently using that nick, else the token itself as an account name.
fn resolve_account(ctx: &ServiceContext, token: &str) -> String {
    ctx.state
        .session_account_by_nick(token)
        .or_else(|| ctx.stores.accounts.display_name(token))
        .unwrap_or_else(|| token.to_string())
}

/// Registered spelling of a stored (canonical) account key.
fn display(ctx: &ServiceContext, key: &str) -> String {
    ctx.stores
        .accounts
        .display_name(key)
        .unwrap_or_else(|| key.to_string())
}

/// Tracks store save failures during one command.
///
/// A failed save happens only after the in-memory change went through,
/// so the change counts as applied and the acknowledgement says it is
/// not yet on disk.
#[derive(Debug, Default)]
struct Persist {
    unsaved: bool,
}

impl Persist {
    fn check<T>(&mut self, result: Result<T, StoreError>, applied: T) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                error!(error = %e, "Store save failed; change kept in memory");
                self.unsaved = true;
                applied
            }
        }
    }

    fn ack(&self, text: impl Into<String>) -> ServiceEffect {
        let mut text = text.into();
        if self.unsaved {
            text.push_str(" (not yet saved)");
        }
        ServiceEffect::Reply(text)
    }
}
