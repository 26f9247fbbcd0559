use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::Duration;
use tracing::debug;

use crate::conversation::Conversation;
use crate::error::TransferError;
use crate::request::{negotiate, TransferRequest};
use crate::session::{self, TransferSummary};

/// Everything one invocation needs; nothing is process-wide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server's well-known address (port 69 unless overridden).
    pub server: SocketAddr,
    pub blksize: u16,
    pub timeout: Duration,
    /// Retransmissions per step before giving up. 0 makes any timeout fatal.
    pub retries: u8,
}

impl ClientConfig {
    pub fn new(server: SocketAddr) -> Self {
        Self {
            server,
            blksize: crate::DEF_BLOCK_SIZE,
            timeout: Duration::from_millis(crate::DEF_TIMEOUT_MS),
            retries: crate::DEF_RETRY_COUNT,
        }
    }
}

/// Resolves `host` to the first address lookup yields.
pub async fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    lookup_host((host, port)).await?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no address found for {host}"),
        )
    })
}

#[derive(Debug, Clone)]
pub struct Client {
    config: ClientConfig,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Fetches `remote` from the server into `sink`.
    pub async fn download<W>(&self, remote: &str, sink: &mut W) -> Result<TransferSummary, TransferError>
    where
        W: AsyncWrite + Unpin,
    {
        let request = TransferRequest::read(remote, self.config.blksize);
        let mut conv = self.open().await?;
        let negotiated = negotiate(&mut conv, self.config.server, &request).await?;
        session::download(&mut conv, negotiated, sink).await
    }

    /// Stores `source` on the server as `remote`. `size` is advertised as tsize
    /// when known and nonzero.
    pub async fn upload<R>(
        &self,
        remote: &str,
        source: &mut R,
        size: Option<u64>,
    ) -> Result<TransferSummary, TransferError>
    where
        R: AsyncRead + Unpin,
    {
        let request = TransferRequest::write(remote, self.config.blksize, size);
        let mut conv = self.open().await?;
        let negotiated = negotiate(&mut conv, self.config.server, &request).await?;
        session::upload(&mut conv, negotiated, source).await
    }

    async fn open(&self) -> Result<Conversation, TransferError> {
        let bind_addr = if self.config.server.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(TransferError::Socket)?;
        let conv = Conversation::new(
            socket,
            self.config.server,
            self.config.timeout,
            self.config.retries,
        );
        if let Some(local) = conv.local_addr() {
            debug!(%local, server = %self.config.server, "socket bound");
        }
        Ok(conv)
    }
}
