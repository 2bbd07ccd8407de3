//! register, login, logout.

use qserv_proto::ChannelExt;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use super::Persist;
use crate::error::Denial;
use crate::security::{hash_password, verify_password};
use crate::services::auth::refuse_suspended_account;
use crate::services::{CommandResult, Request, ServiceContext, ServiceEffect};

pub async fn register(ctx: &ServiceContext, req: &Request) -> CommandResult {
    let (Some(name), Some(password)) = (req.arg(0), req.arg(1)) else {
        return Err(Denial::Usage("register <account> <password>"));
    };
    if name.is_channel_name() {
        return Err(Denial::Invalid("Account names cannot look like channels.".into()));
    }
    if ctx.stores.accounts.exists(name) {
        return Err(Denial::AccountExists(name.to_string()));
    }

    let password = Zeroizing::new(password.to_string());
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            error!(error = %e, "Password hashing task failed");
            Denial::Internal
        })?
        .map_err(|e| {
            error!(error = %e, "Password hashing failed");
            Denial::Internal
        })?;

    let mut persist = Persist::default();
    if !persist.check(ctx.stores.accounts.create(name, hash), true) {
        return Err(Denial::AccountExists(name.to_string()));
    }
    info!(account = %name, uid = %req.uid, "Account registered");
    Ok(vec![persist.ack(format!(
        "Account registered. You can now: login {name} <password>"
    ))])
}

pub async fn login(ctx: &ServiceContext, req: &Request) -> CommandResult {
    let (Some(name), Some(password)) = (req.arg(0), req.arg(1)) else {
        return Err(Denial::Usage("login <account> <password>"));
    };
    let Some(account) = ctx.stores.accounts.get(name) else {
        return Err(Denial::BadCredentials);
    };

    let password = Zeroizing::new(password.to_string());
    let stored = account.hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| {
            error!(error = %e, "Password verification task failed");
            Denial::Internal
        })?;
    match verified {
        Ok(true) => {}
        Ok(false) => return Err(Denial::BadCredentials),
        Err(e) => {
            warn!(account = %account.name, error = %e, "Unreadable stored password hash");
            return Err(Denial::BadCredentials);
        }
    }
    refuse_suspended_account(ctx, &account.name)?;

    ctx.state.bind_session(&req.uid, &account.name);
    info!(account = %account.name, uid = %req.uid, "Logged in");

    let host = format!("{}.{}", account.name, ctx.config.service.user_host_suffix);
    Ok(vec![
        ServiceEffect::AccountIdentify {
            uid: req.uid.clone(),
            account: account.name.clone(),
        },
        ServiceEffect::SetHost {
            uid: req.uid.clone(),
            host,
        },
        ServiceEffect::reply(format!("You are now logged in as {}.", account.name)),
    ])
}

pub fn logout(ctx: &ServiceContext, req: &Request) -> CommandResult {
    let account = ctx
        .state
        .unbind_session(&req.uid)
        .ok_or(Denial::NotLoggedIn)?;
    info!(account = %account, uid = %req.uid, "Logged out");
    Ok(vec![
        ServiceEffect::AccountClear {
            uid: req.uid.clone(),
        },
        ServiceEffect::reply("You are now logged out."),
    ])
}
