//! Fake uplink: a listener on an ephemeral port speaking raw lines.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use qserv::config::Config;
use qserv::link::LinkDriver;
use qserv::services::ServiceContext;
use qserv::store::Stores;
use qserv_proto::LineCodec;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

const RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// Listening side of the link, standing in for the network hub.
pub struct FakeUplink {
    listener: TcpListener,
}

impl FakeUplink {
    pub async fn bind() -> anyhow::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind("127.0.0.1:0").await?,
        })
    }

    pub fn port(&self) -> u16 {
        self.listener
            .local_addr()
            .map(|a| a.port())
            .unwrap_or_default()
    }

    /// Wait for the daemon to connect.
    pub async fn accept(&self) -> anyhow::Result<Peer> {
        let (stream, _) = tokio::time::timeout(RECV_TIMEOUT, self.listener.accept()).await??;
        Ok(Peer {
            framed: Framed::new(stream, LineCodec::new()),
        })
    }
}

/// One accepted daemon connection.
pub struct Peer {
    framed: Framed<TcpStream, LineCodec>,
}

impl Peer {
    pub async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        self.framed.send(line.to_string()).await?;
        Ok(())
    }

    pub async fn send_all(&mut self, lines: &[&str]) -> anyhow::Result<()> {
        for line in lines {
            self.send(line).await?;
        }
        Ok(())
    }

    /// Next line from the daemon.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        match tokio::time::timeout(RECV_TIMEOUT, self.framed.next()).await? {
            Some(line) => Ok(line?),
            None => anyhow::bail!("daemon closed the link"),
        }
    }

    pub async fn recv_n(&mut self, n: usize) -> anyhow::Result<Vec<String>> {
        let mut lines = Vec::with_capacity(n);
        for _ in 0..n {
            lines.push(self.recv().await?);
        }
        Ok(lines)
    }

    /// Read until `pred` matches; returns every line read, the match last.
    pub async fn recv_until<F>(&mut self, mut pred: F) -> anyhow::Result<Vec<String>>
    where
        F: FnMut(&str) -> bool,
    {
        let mut lines = Vec::new();
        loop {
            let line = self.recv().await?;
            let done = pred(&line);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    /// Text of the next service notice addressed to `target`.
    pub async fn notice_to(&mut self, target: &str) -> anyhow::Result<String> {
        let needle = format!(" {target} :");
        let lines = self
            .recv_until(|l| (l.contains(" NOTICE ") || l.contains(" O ")) && l.contains(&needle))
            .await?;
        let last = lines.last().map(String::as_str).unwrap_or_default();
        Ok(last
            .split_once(&needle)
            .map(|(_, text)| text.to_string())
            .unwrap_or_default())
    }
}

/// A running daemon: link driver plus its stores.
pub struct Qserv {
    pub ctx: Arc<ServiceContext>,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<Result<(), qserv::error::LinkError>>,
    _dir: TempDir,
}

impl Qserv {
    /// Start the driver against `port`, speaking `protocol` as server `sid`.
    pub fn start(port: u16, protocol: &str, sid: &str) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let text = format!(
            r##"
            protocol = "{protocol}"

            [uplink]
            host = "127.0.0.1"
            port = {port}
            password = "linkpass"

            [server]
            name = "services.example.org"
            sid = "{sid}"

            [service]
            channels = ["#feds"]

            [reconnect]
            base_secs = 1
            max_secs = 2
            "##
        );
        let config = Config::parse(&text)?;
        let stores = Stores::open(&config.storage.rooted_at(dir.path()))?;
        let ctx = Arc::new(ServiceContext::new(Arc::new(config), Arc::new(stores)));

        let (shutdown, rx) = broadcast::channel(1);
        let task = tokio::spawn(LinkDriver::new(Arc::clone(&ctx)).run(rx));
        Ok(Self {
            ctx,
            shutdown,
            task,
            _dir: dir,
        })
    }

    /// Signal shutdown and wait for the driver to return.
    pub async fn stop(self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(());
        tokio::time::timeout(RECV_TIMEOUT, self.task).await???;
        Ok(())
    }
}
