//! Uplink lifecycle events: end of burst, post-burst setup, ERROR.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use qserv_proto::Message;
use tracing::{info, warn};

use super::ServiceContext;
use crate::bus::Handler;
use crate::error::HandlerError;
use crate::link::LineSink;
use crate::store::now_ts;

/// Answers the uplink's end of burst and sets the service client up.
///
/// Both steps run at most once per session; later servers joining the
/// network send their own end-of-burst markers.
pub struct UplinkHandler {
    ctx: Arc<ServiceContext>,
    sink: Arc<dyn LineSink>,
    burst_answered: AtomicBool,
    setup_done: AtomicBool,
}

impl UplinkHandler {
    pub fn new(ctx: Arc<ServiceContext>, sink: Arc<dyn LineSink>) -> Self {
        Self {
            ctx,
            sink,
            burst_answered: AtomicBool::new(false),
            setup_done: AtomicBool::new(false),
        }
    }

    /// Drop logins of users who did not come back in the burst, then
    /// acknowledge it.
    async fn answer_burst(&self) -> Result<(), HandlerError> {
        if self.burst_answered.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let dropped = self.ctx.state.prune_sessions();
        if dropped > 0 {
            info!(dropped, "Dropped logins of users gone after the burst");
        }
        let reply = self.ctx.protocol.end_of_burst_reply();
        if !reply.is_empty() {
            self.sink.send_lines(reply).await?;
        }
        Ok(())
    }

    /// Introduce (where the dialect needs it), annotate, and join the
    /// service channels.
    async fn setup_service(&self) -> Result<(), HandlerError> {
        if self.setup_done.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let protocol = &self.ctx.protocol;
        let now = now_ts();

        let mut lines = protocol.introduce_service(now);
        lines.extend(protocol.service_setup());
        self.sink.send_lines(lines).await?;

        let uid = &protocol.identity().service_uid;
        for channel in &self.ctx.config.service.channels {
            let ts = self.ctx.state.channel_ts(channel).unwrap_or(now);
            self.sink.send_lines(protocol.join(channel, ts)).await?;
            self.ctx.state.add_members(channel, ts, [uid.as_str()]);
        }

        info!(
            uid = %uid,
            channels = self.ctx.config.service.channels.len(),
            "Service client ready"
        );
        Ok(())
    }
}

#[async_trait]
impl Handler for UplinkHandler {
    fn name(&self) -> &'static str {
        "uplink"
    }

    async fn handle(&self, msg: &Message) -> Result<(), HandlerError> {
        let verb = msg.verb_upper();
        if verb == "ERROR" {
            warn!(reason = msg.last_arg().unwrap_or_default(), "Uplink error");
            return Ok(());
        }

        if verb == "ENDBURST" {
            info!(source = msg.source.as_deref().unwrap_or_default(), "Uplink finished bursting");
            self.answer_burst().await?;
        }
        if verb == self.ctx.protocol.setup_trigger() {
            self.setup_service().await?;
        }
        Ok(())
    }
}
