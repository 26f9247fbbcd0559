use std::net::{IpAddr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Duration, Instant};
use tracing::{debug, warn};

use crate::error::{ErrorCode, TransferError};
use crate::packet::{TftpPacket, OPCODE_ERROR};

/// Which datagrams a wait accepts.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Expect {
    /// Negotiation: any port on the server's host. The first reply fixes the TID.
    Server(IpAddr),
    /// Session: only the peer learned during negotiation.
    Peer(SocketAddr),
}

/// One client invocation's UDP conversation. The socket lives exactly as long
/// as this value.
pub(crate) struct Conversation {
    socket: UdpSocket,
    timeout: Duration,
    retries: u8,
    buf: Vec<u8>,
    last: Vec<u8>,
    dest: SocketAddr,
    attempts: u32,
    deadline: Instant,
}

impl Conversation {
    pub(crate) fn new(socket: UdpSocket, server: SocketAddr, timeout: Duration, retries: u8) -> Self {
        Self {
            socket,
            timeout,
            retries,
            buf: vec![0; crate::RECV_BUFFER_SIZE],
            last: Vec::new(),
            dest: server,
            attempts: 0,
            deadline: Instant::now() + timeout,
        }
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }

    /// Sends `pkt` and arms the receive deadline for its answer.
    pub(crate) async fn send(&mut self, pkt: &TftpPacket, dest: SocketAddr) -> Result<(), TransferError> {
        self.last = pkt.serialize();
        self.dest = dest;
        self.attempts = 1;
        self.socket
            .send_to(&self.last, dest)
            .await
            .map_err(TransferError::Socket)?;
        self.deadline = Instant::now() + self.timeout;
        Ok(())
    }

    /// Waits for the next well-formed packet accepted by `expect`.
    ///
    /// Stale and foreign datagrams do not extend the deadline. On timeout the
    /// last packet is retransmitted while retries remain.
    pub(crate) async fn recv(&mut self, expect: Expect) -> Result<(TftpPacket, SocketAddr), TransferError> {
        let mut malformed: u8 = 0;
        loop {
            let received = timeout_at(self.deadline, self.socket.recv_from(&mut self.buf)).await;
            let (num, from) = match received {
                Ok(res) => res.map_err(TransferError::Socket)?,
                Err(_) => {
                    self.retransmit().await?;
                    continue;
                }
            };

            match expect {
                Expect::Server(ip) if from.ip() != ip => {
                    debug!(%from, "ignoring datagram from unexpected host");
                    continue;
                }
                Expect::Peer(peer) if from != peer => {
                    warn!(%from, "datagram from unknown transfer ID");
                    // ERROR packets are never answered.
                    if !is_error(&self.buf[..num]) {
                        self.reject(from, ErrorCode::UnknownTransferId, "Unknown transfer ID")
                            .await;
                    }
                    continue;
                }
                _ => (),
            }

            match TftpPacket::deserialize(&self.buf[..num]) {
                Ok(pkt) => return Ok((pkt, from)),
                Err(e) => {
                    malformed += 1;
                    warn!(%from, error = %e, "dropping malformed packet");
                    if malformed >= crate::MAX_MALFORMED {
                        return Err(e.into());
                    }
                }
            }
        }
    }

    async fn retransmit(&mut self) -> Result<(), TransferError> {
        if self.attempts > u32::from(self.retries) || self.last.is_empty() {
            return Err(TransferError::NoResponse {
                peer: self.dest,
                timeout: self.timeout,
                attempts: self.attempts,
            });
        }
        self.attempts += 1;
        warn!(dest = %self.dest, attempt = self.attempts, "timeout, retransmitting");
        self.socket
            .send_to(&self.last, self.dest)
            .await
            .map_err(TransferError::Socket)?;
        self.deadline = Instant::now() + self.timeout;
        Ok(())
    }

    /// Best-effort ERROR to `dest`; a failed send is only logged since the
    /// caller is already failing or ignoring `dest`.
    pub(crate) async fn reject(&self, dest: SocketAddr, code: ErrorCode, msg: &str) {
        let pkt = TftpPacket::Error {
            code: code.into(),
            msg: msg.to_string(),
        };
        if let Err(e) = self.socket.send_to(&pkt.serialize(), dest).await {
            warn!(%dest, error = %e, "failed to send error packet");
        }
    }
}

fn is_error(datagram: &[u8]) -> bool {
    datagram.len() >= 2 && u16::from_be_bytes([datagram[0], datagram[1]]) == OPCODE_ERROR
}
