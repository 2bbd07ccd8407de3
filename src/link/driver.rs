//! Reconnecting link driver.
//!
//! Owns the [`LinkMachine`] and loops dial → handshake → read until
//! shutdown. Every failure is a transport fault: wait out the backoff
//! (doubling from `reconnect.base_secs` up to `reconnect.max_secs`) and
//! dial again. The backoff returns to its base only after a handshake has
//! gone through.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::{LineSink, LinkHandle, LinkMachine, LinkState, LinkStream, Session, upgrade_to_tls};
use crate::error::LinkError;
use crate::services::{self, ServiceContext};
use crate::store::now_ts;

pub struct LinkDriver {
    ctx: Arc<ServiceContext>,
    machine: LinkMachine,
}

impl LinkDriver {
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self {
            ctx,
            machine: LinkMachine::new(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.machine.state()
    }

    /// Run until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), LinkError> {
        let reconnect = self.ctx.config.reconnect.clone();
        let mut delay = reconnect.base();

        loop {
            let outcome = self.run_once(&mut shutdown, &mut delay).await;
            self.machine.transition(LinkState::Disconnected)?;

            match outcome {
                Err(LinkError::Shutdown) => break,
                Err(e @ LinkError::InvalidTransition { .. }) => return Err(e),
                Err(e) => warn!(
                    code = e.error_code(),
                    error = %e,
                    retry_in = ?delay,
                    "Uplink connection lost"
                ),
                Ok(()) => warn!(retry_in = ?delay, "Uplink session ended"),
            }

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            delay = next_delay(delay, reconnect.max());
        }

        info!(sessions = self.machine.sessions(), "Link driver stopped");
        Ok(())
    }

    async fn run_once(
        &mut self,
        shutdown: &mut broadcast::Receiver<()>,
        delay: &mut Duration,
    ) -> Result<(), LinkError> {
        let config = Arc::clone(&self.ctx.config);

        self.machine.transition(LinkState::Connecting)?;
        let stream = tokio::select! {
            _ = shutdown.recv() => return Err(LinkError::Shutdown),
            stream = self.connect() => stream?,
        };

        self.machine.transition(LinkState::Handshaking)?;
        let tls = stream.is_tls();
        let (reader, writer) = tokio::io::split(stream);
        let handle = Arc::new(LinkHandle::new(writer, config.timeouts.write()));

        // The uplink bursts everything again; forget the network (logins
        // stay) and use a bus that has never seen an earlier connection.
        self.ctx.state.reset();
        let sink: Arc<dyn LineSink> = Arc::clone(&handle) as Arc<dyn LineSink>;
        let bus = services::build_bus(&self.ctx, sink);

        let mut session = Session::new(
            Arc::clone(&self.ctx.protocol),
            handle,
            Arc::new(bus),
            config.timeouts.idle(),
        );
        session.handshake(now_ts()).await?;

        self.machine.transition(LinkState::Linked)?;
        *delay = config.reconnect.base();
        info!(
            uplink = %config.uplink.address(),
            protocol = config.protocol.as_str(),
            tls,
            "Link established"
        );

        session.run(reader, shutdown).await
    }

    async fn connect(&self) -> Result<LinkStream, LinkError> {
        let uplink = &self.ctx.config.uplink;
        let after = self.ctx.config.timeouts.connect();
        let addr = uplink.address();
        info!(addr = %addr, tls = uplink.tls, "Connecting to uplink");

        let tcp = match tokio::time::timeout(after, TcpStream::connect(&addr)).await {
            Err(_) => return Err(LinkError::DialTimeout { addr, after }),
            Ok(Err(source)) => return Err(LinkError::Dial { addr, source }),
            Ok(Ok(tcp)) => tcp,
        };
        tcp.set_nodelay(true)?;

        if !uplink.tls {
            return Ok(LinkStream::Plain(tcp));
        }
        match tokio::time::timeout(after, upgrade_to_tls(tcp, &uplink.host, uplink.verify_cert))
            .await
        {
            Err(_) => Err(LinkError::DialTimeout { addr, after }),
            Ok(tls) => Ok(LinkStream::Tls(Box::new(tls?))),
        }
    }
}

/// Double `delay`, capped at `max`.
fn next_delay(delay: Duration, max: Duration) -> Duration {
    delay.saturating_mul(2).min(max)
}
