//! One link session: handshake lines out, then the read loop.
//!
//! The read loop answers liveness probes itself and hands every other
//! line to the session's event bus without waiting for the handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use qserv_proto::{LineCodec, Message};
use tokio::io::AsyncRead;
use tokio::sync::broadcast;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use super::{LineSink, LinkHandle};
use crate::bus::EventBus;
use crate::error::LinkError;
use crate::protocol::{Probe, Protocol};

pub struct Session {
    protocol: Arc<dyn Protocol>,
    handle: Arc<LinkHandle>,
    bus: Arc<EventBus>,
    idle_timeout: Duration,
    remote_sid: Option<String>,
    last_rx: Instant,
}

impl Session {
    pub fn new(
        protocol: Arc<dyn Protocol>,
        handle: Arc<LinkHandle>,
        bus: Arc<EventBus>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            protocol,
            handle,
            bus,
            idle_timeout,
            remote_sid: None,
            last_rx: Instant::now(),
        }
    }

    /// The uplink's server identifier, once it has introduced itself.
    pub fn remote_sid(&self) -> Option<&str> {
        self.remote_sid.as_deref()
    }

    pub fn last_rx(&self) -> Instant {
        self.last_rx
    }

    /// Send the protocol's opening sequence. Any failure aborts the attempt.
    pub async fn handshake(&self, now: i64) -> Result<(), LinkError> {
        self.handle
            .send_lines(self.protocol.handshake(now))
            .await
            .map_err(|e| LinkError::Handshake(e.to_string()))
    }

    /// Read until the link fails or shutdown is signalled. Always returns
    /// the reason the session ended.
    pub async fn run<R>(
        &mut self,
        reader: R,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), LinkError>
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = FramedRead::new(reader, LineCodec::new());
        let fault = self.handle.fault().clone();

        loop {
            let next = tokio::select! {
                _ = shutdown.recv() => return Err(LinkError::Shutdown),
                _ = fault.cancelled() => return Err(LinkError::NotConnected),
                next = tokio::time::timeout(self.idle_timeout, lines.next()) => next,
            };

            let line = match next {
                Err(_) => return Err(LinkError::IdleTimeout(self.idle_timeout)),
                Ok(None) => return Err(LinkError::Closed),
                Ok(Some(Err(e))) => return Err(e.into()),
                Ok(Some(Ok(line))) => line,
            };
            self.process_line(&line).await?;
        }
    }

    async fn process_line(&mut self, line: &str) -> Result<(), LinkError> {
        self.last_rx = Instant::now();
        debug!(target: "qserv::wire", "< {}", line);

        let Some(parsed) = Message::parse(line) else {
            return Ok(());
        };

        for msg in self.protocol.normalize(parsed) {
            if let Some(sid) = self.protocol.remote_sid(&msg) {
                info!(sid = %sid, "Uplink introduced itself");
                self.remote_sid = Some(sid);
            }

            match self.protocol.probe(&msg) {
                Probe::Reply(reply) => self.handle.send_line(reply).await?,
                Probe::Ignore => {}
                Probe::NotProbe => {
                    let remote_error = msg
                        .verb
                        .eq_ignore_ascii_case("ERROR")
                        .then(|| msg.last_arg().unwrap_or_default().to_string());

                    let bus = Arc::clone(&self.bus);
                    let msg = Arc::new(msg);
                    tokio::spawn(async move {
                        bus.publish(msg).await;
                    });

                    if let Some(reason) = remote_error {
                        warn!(reason = %reason, "Uplink sent ERROR");
                        return Err(LinkError::Remote(reason));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Handler;
    use crate::config::ProtocolKind;
    use crate::error::HandlerError;
    use crate::protocol::{Insp4, test_identity};
    use async_trait::async_trait;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::mpsc;

    struct Forward(mpsc::UnboundedSender<String>);

    #[async_trait]
    impl Handler for Forward {
        fn name(&self) -> &'static str {
            "forward"
        }

        async fn handle(&self, msg: &Message) -> Result<(), HandlerError> {
            let _ = self.0.send(msg.verb.clone());
            Ok(())
        }
    }

    fn session(writer: tokio::io::DuplexStream, bus: EventBus) -> Session {
        Session::new(
            Arc::new(Insp4::new(test_identity(ProtocolKind::Insp4))),
            Arc::new(LinkHandle::new(writer, Duration::from_secs(1))),
            Arc::new(bus),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn answers_probes_and_dispatches_the_rest() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut bus = EventBus::new();
        bus.subscribe(crate::bus::WILDCARD, Arc::new(Forward(tx)));

        let (ours, mut uplink_out) = tokio::io::duplex(4096);
        let (mut uplink_in, reader) = tokio::io::duplex(4096);
        let mut s = session(ours, bus);
        let (_stop_tx, mut stop) = broadcast::channel(1);

        uplink_in
            .write_all(b"SERVER hub.example.org linkpass 034 :Hub\r\n:034 PING 042\r\n:042 PING 034\r\n:034AAAAAB PRIVMSG 042AAAAAA :help\r\n")
            .await
            .unwrap();
        drop(uplink_in);

        let err = s.run(reader, &mut stop).await.unwrap_err();
        assert!(matches!(err, LinkError::Closed));
        assert_eq!(s.remote_sid(), Some("034"));

        let mut buf = vec![0u8; 256];
        let n = uplink_out.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"PONG 034 042\r\n");

        let mut seen = Vec::new();
        for _ in 0..2 {
            seen.push(rx.recv().await.unwrap());
        }
        seen.sort();
        assert_eq!(seen, vec!["PRIVMSG", "SERVER"]);
    }

    #[tokio::test]
    async fn shutdown_interrupts_the_read() {
        let (ours, _uplink_out) = tokio::io::duplex(64);
        let (_uplink_in, reader) = tokio::io::duplex(64);
        let mut s = session(ours, EventBus::new());
        let (stop_tx, mut stop) = broadcast::channel(1);
        stop_tx.send(()).unwrap();
        assert!(matches!(
            s.run(reader, &mut stop).await,
            Err(LinkError::Shutdown)
        ));
    }

    #[tokio::test]
    async fn remote_error_ends_the_session() {
        let (ours, _uplink_out) = tokio::io::duplex(64);
        let (mut uplink_in, reader) = tokio::io::duplex(256);
        let mut s = session(ours, EventBus::new());
        let (_stop_tx, mut stop) = broadcast::channel(1);
        uplink_in.write_all(b"ERROR :Invalid password\r\n").await.unwrap();
        match s.run(reader, &mut stop).await {
            Err(LinkError::Remote(reason)) => assert_eq!(reason, "Invalid password"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn silent_uplink_hits_the_idle_timeout() {
        let (ours, _uplink_out) = tokio::io::duplex(64);
        let (_uplink_in, reader) = tokio::io::duplex(64);
        let mut s = session(ours, EventBus::new());
        let (_stop_tx, mut stop) = broadcast::channel(1);
        assert!(matches!(
            s.run(reader, &mut stop).await,
            Err(LinkError::IdleTimeout(_))
        ));
    }
}
