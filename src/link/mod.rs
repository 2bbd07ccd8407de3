//! Uplink connection.
//!
//! - [`driver`]: dial, handshake, read, reconnect with backoff.
//! - [`session`]: one connection's read loop and fast-path probe replies.
//! - [`LinkHandle`]: the serialized, deadline-bounded writer shared by
//!   every handler of a session.

pub mod driver;
mod handshake;
pub mod session;
mod stream;
mod tls;

use std::time::Duration;

use async_trait::async_trait;
use futures_util::SinkExt;
use qserv_proto::{LineCodec, ProtocolError};
use tokio::io::AsyncWrite;
use tokio::sync::Mutex;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::LinkError;

pub use driver::LinkDriver;
pub use handshake::{LinkMachine, LinkState};
pub use session::Session;
pub use stream::LinkStream;
pub use tls::upgrade_to_tls;

/// Destination for outbound protocol lines.
#[async_trait]
pub trait LineSink: Send + Sync {
    /// Send one line (without terminator).
    async fn send_line(&self, line: String) -> Result<(), LinkError>;

    /// Send lines in order, stopping at the first failure.
    async fn send_lines(&self, lines: Vec<String>) -> Result<(), LinkError> {
        for line in lines {
            self.send_line(line).await?;
        }
        Ok(())
    }
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Write half of a link session.
///
/// Concurrent senders are serialized by one lock; each write (including
/// the wait for the lock) is bounded by the write deadline. A failed or
/// timed-out write cancels [`LinkHandle::fault`], which ends the session.
pub struct LinkHandle {
    writer: Mutex<FramedWrite<BoxedWriter, LineCodec>>,
    write_timeout: Duration,
    fault: CancellationToken,
}

impl LinkHandle {
    pub fn new<W>(writer: W, write_timeout: Duration) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            writer: Mutex::new(FramedWrite::new(Box::new(writer), LineCodec::new())),
            write_timeout,
            fault: CancellationToken::new(),
        }
    }

    /// Cancelled once a write has failed.
    pub fn fault(&self) -> &CancellationToken {
        &self.fault
    }

    async fn write(&self, line: String) -> Result<(), LinkError> {
        let mut writer = self.writer.lock().await;
        if self.fault.is_cancelled() {
            return Err(LinkError::NotConnected);
        }
        writer.send(line).await.map_err(LinkError::from)
    }
}

#[async_trait]
impl LineSink for LinkHandle {
    async fn send_line(&self, line: String) -> Result<(), LinkError> {
        if self.fault.is_cancelled() {
            return Err(LinkError::NotConnected);
        }
        debug!(target: "qserv::wire", "> {}", line);

        let result = match tokio::time::timeout(self.write_timeout, self.write(line)).await {
            Ok(result) => result,
            Err(_) => Err(LinkError::WriteTimeout(self.write_timeout)),
        };
        if let Err(e) = &result
            && is_transport_fault(e)
        {
            warn!(code = e.error_code(), error = %e, "Link write failed");
            self.fault.cancel();
        }
        result
    }
}

/// Encoder rejections leave the stream intact; everything else kills it.
fn is_transport_fault(e: &LinkError) -> bool {
    !matches!(
        e,
        LinkError::NotConnected
            | LinkError::Protocol(
                ProtocolError::IllegalControlChar(_) | ProtocolError::MessageTooLong { .. }
            )
    )
}


#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn lines_are_terminated_in_order() {
        let (client, mut server) = tokio::io::duplex(1024);
        let handle = LinkHandle::new(client, Duration::from_secs(1));
        handle
            .send_lines(vec!["CAPAB START 1206".into(), "CAPAB END".into()])
            .await
            .unwrap();

        let mut buf = vec![0u8; 64];
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"CAPAB START 1206\r\nCAPAB END\r\n");
    }

    #[tokio::test]
    async fn stalled_peer_times_out_and_faults() {
        // A 16-byte pipe that nobody reads fills up immediately.
        let (client, _server) = tokio::io::duplex(16);
        let handle = LinkHandle::new(client, Duration::from_millis(50));
        let err = handle.send_line("x".repeat(64)).await.unwrap_err();
        assert!(matches!(err, LinkError::WriteTimeout(_)));
        assert!(handle.fault().is_cancelled());
        assert!(matches!(
            handle.send_line("PING".into()).await,
            Err(LinkError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn injection_is_refused_without_faulting() {
        let (client, _server) = tokio::io::duplex(1024);
        let handle = LinkHandle::new(client, Duration::from_secs(1));
        let err = handle.send_line("PRIVMSG #a :x\r\nQUIT".into()).await.unwrap_err();
        assert!(matches!(err, LinkError::Protocol(_)));
        assert!(!handle.fault().is_cancelled());
    }
}
