//! Channel service.
//!
//! Commands arrive as `PRIVMSG` either to a channel, prefixed with the
//! configured marker (`!op`), or privately to the service client
//! (`op #chan`). Both surfaces accept the same verbs. A command produces
//! [`ServiceEffect`]s or a [`Denial`]; the handler applies the effects
//! through the link and sends the reply on the surface it came from.

mod auth;
mod commands;
mod effect;
mod uplink;

use std::sync::Arc;

use async_trait::async_trait;
use qserv_proto::{ChannelExt, Message, irc_eq};
use tracing::debug;

use crate::bus::{EventBus, Handler};
use crate::config::Config;
use crate::error::{Denial, HandlerError};
use crate::link::LineSink;
use crate::protocol::{self, Protocol};
use crate::state::{NetworkState, TRACKED_VERBS, Tracker};
use crate::store::Stores;

pub use effect::{ServiceEffect, apply_effects};
pub use uplink::UplinkHandler;

/// Result of one command.
pub type CommandResult = Result<Vec<ServiceEffect>, Denial>;

/// Process-wide service state shared by every link session.
pub struct ServiceContext {
    pub config: Arc<Config>,
    pub protocol: Arc<dyn Protocol>,
    pub state: Arc<NetworkState>,
    pub stores: Arc<Stores>,
}

impl ServiceContext {
    pub fn new(config: Arc<Config>, stores: Arc<Stores>) -> Self {
        Self {
            protocol: protocol::from_config(&config),
            state: Arc::new(NetworkState::new()),
            config,
            stores,
        }
    }
}

/// Build the event bus for one link session: state tracking first, then
/// the uplink lifecycle handler, then commands.
pub fn build_bus(ctx: &Arc<ServiceContext>, sink: Arc<dyn LineSink>) -> EventBus {
    let mut bus = EventBus::new();
    bus.subscribe_all(TRACKED_VERBS, Arc::new(Tracker::new(Arc::clone(&ctx.state))));

    let mut uplink_verbs = vec!["ENDBURST", "ERROR"];
    let trigger = ctx.protocol.setup_trigger();
    if !uplink_verbs.contains(&trigger) {
        uplink_verbs.push(trigger);
    }
    bus.subscribe_all(
        &uplink_verbs,
        Arc::new(UplinkHandler::new(Arc::clone(ctx), Arc::clone(&sink))),
    );

    bus.subscribe("PRIVMSG", Arc::new(CommandHandler::new(Arc::clone(ctx), sink)));
    bus
}

/// Where a command came from, and so where its reply goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Surface {
    /// In-channel with the command marker; replies go to the channel.
    Channel(String),
    /// Private message to the service; replies go to the sender.
    Private,
}

/// A tokenized command.
#[derive(Debug, Clone)]
pub struct Request {
    /// Identity that sent the command.
    pub uid: String,
    pub surface: Surface,
    /// Lowercased command name.
    pub command: String,
    pub args: Vec<String>,
}

impl Request {
    /// Tokenize `text`. `None` if it holds no command.
    pub fn parse(uid: &str, surface: Surface, text: &str) -> Option<Self> {
        let mut tokens = text.split_whitespace();
        let command = tokens.next()?.to_lowercase();
        let mut args: Vec<String> = tokens.map(str::to_string).collect();

        // In-channel commands name their channel implicitly.
        if let Surface::Channel(channel) = &surface
            && names_channel_implicitly(&command, &args)
        {
            args.insert(0, channel.clone());
        }

        Some(Self {
            uid: uid.to_string(),
            surface,
            command,
            args,
        })
    }

    /// Where replies for this request go.
    pub fn reply_target(&self) -> &str {
        match &self.surface {
            Surface::Channel(channel) => channel,
            Surface::Private => &self.uid,
        }
    }

    pub fn arg(&self, idx: usize) -> Option<&str> {
        self.args.get(idx).map(String::as_str)
    }

    /// Arguments from `idx` on, joined by spaces.
    pub fn rest(&self, idx: usize) -> String {
        self.args.get(idx..).map(|a| a.join(" ")).unwrap_or_default()
    }
}

/// Commands whose first argument is a channel.
fn takes_channel(command: &str) -> bool {
    matches!(
        command,
        "regchan"
            | "regchannel"
            | "op"
            | "deop"
            | "voice"
            | "devoice"
            | "adduser"
            | "deluser"
            | "access"
            | "flags"
            | "listaccess"
            | "join"
            | "part"
            | "purge"
    )
}

/// Whether an in-channel command is missing its channel argument.
///
/// `suspend` and `unsuspend` also take an account, so they only gain the
/// channel when no target was given (or, for `suspend`, when the first
/// argument is already the day count).
fn names_channel_implicitly(command: &str, args: &[String]) -> bool {
    let first = args.first().map(String::as_str);
    if first.is_some_and(|a| a.is_channel_name()) {
        return false;
    }
    match command {
        "suspend" => first.is_none_or(|a| a.parse::<i64>().is_ok()),
        "unsuspend" => first.is_none(),
        other => takes_channel(other),
    }
}

/// `PRIVMSG` handler for both command surfaces.
pub struct CommandHandler {
    ctx: Arc<ServiceContext>,
    sink: Arc<dyn LineSink>,
}

impl CommandHandler {
    pub fn new(ctx: Arc<ServiceContext>, sink: Arc<dyn LineSink>) -> Self {
        Self { ctx, sink }
    }

    /// Turn a `PRIVMSG` into a request, if it is one for us.
    fn request(&self, msg: &Message) -> Option<Request> {
        let uid = msg.source.as_deref().filter(|s| !s.is_empty())?;
        let target = msg.param(0)?;
        let text = msg.trailing.as_deref().or_else(|| msg.param(1))?.trim();

        if target.is_channel_name() {
            let prefix = self.ctx.config.service.command_prefix;
            let line = text.strip_prefix(prefix)?;
            return Request::parse(uid, Surface::Channel(target.to_string()), line);
        }

        let id = self.ctx.protocol.identity();
        if !(irc_eq(target, &id.service_uid) || irc_eq(target, &id.service_nick)) {
            return None;
        }
        Request::parse(uid, Surface::Private, text)
    }
}

#[async_trait]
impl Handler for CommandHandler {
    fn name(&self) -> &'static str {
        "commands"
    }

    async fn handle(&self, msg: &Message) -> Result<(), HandlerError> {
        let Some(req) = self.request(msg) else {
            return Ok(());
        };
        debug!(uid = %req.uid, command = %req.command, "Service command");

        let effects = match commands::dispatch(&self.ctx, &req).await {
            Ok(effects) => effects,
            Err(denial) => {
                debug!(uid = %req.uid, command = %req.command, code = denial.error_code(), "Command refused");
                vec![ServiceEffect::Reply(denial.to_string())]
            }
        };

        apply_effects(
            self.ctx.protocol.as_ref(),
            self.sink.as_ref(),
            req.reply_target(),
            effects,
        )
        .await?;
        Ok(())
    }
}
