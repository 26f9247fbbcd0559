use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

use crate::block::BlockCounter;
use crate::conversation::{Conversation, Expect};
use crate::error::{report, ErrorCode, TransferError};
use crate::packet::{PacketError, TftpPacket};
use crate::request::Negotiated;

/// What a completed transfer moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSummary {
    pub bytes: u64,
    /// Data blocks exchanged, terminal block included.
    pub blocks: u64,
    pub blksize: u16,
    pub elapsed: Duration,
}

impl TransferSummary {
    /// Throughput in MiB/s.
    pub fn speed(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.bytes as f64 / secs / 1024.0 / 1024.0
    }
}

/// Sends `source` block by block, one Data in flight, until a short block is acknowledged.
pub(crate) async fn upload<R>(
    conv: &mut Conversation,
    negotiated: Negotiated,
    source: &mut R,
) -> Result<TransferSummary, TransferError>
where
    R: AsyncRead + Unpin,
{
    let start = Instant::now();
    let peer = negotiated.peer;
    let blksize = usize::from(negotiated.blksize);
    let mut send_buf: Vec<u8> = vec![0; blksize];
    let mut block = BlockCounter::new();
    let mut total: u64 = 0;

    loop {
        let size = match read_block(source, &mut send_buf).await {
            Ok(size) => size,
            Err(e) => {
                conv.reject(peer, ErrorCode::NotDefined, "Read error on client")
                    .await;
                return Err(TransferError::LocalIo(e));
            }
        };
        let pkt = TftpPacket::Data {
            block: block.current(),
            data: send_buf[..size].to_vec(),
        };
        conv.send(&pkt, peer).await?;
        debug!(block = block.current(), size, "data sent");

        loop {
            match conv.recv(Expect::Peer(peer)).await?.0 {
                TftpPacket::Ack(ack) if block.matches(ack) => break,
                TftpPacket::Ack(ack) => {
                    debug!(expected = block.current(), got = ack, "discarding stale ack");
                }
                TftpPacket::Error { code, msg } => return Err(report(code, msg)),
                other => debug!(packet = other.name(), "discarding unexpected packet"),
            }
        }

        total += size as u64;
        block.advance();
        if size < blksize {
            break;
        }
    }

    let summary = TransferSummary {
        bytes: total,
        blocks: block.exchanged(),
        blksize: negotiated.blksize,
        elapsed: start.elapsed(),
    };
    info!(bytes = summary.bytes, blocks = summary.blocks, "upload complete");
    Ok(summary)
}

/// Receives blocks into `sink` until a short block arrives, acknowledging each one.
pub(crate) async fn download<W>(
    conv: &mut Conversation,
    negotiated: Negotiated,
    sink: &mut W,
) -> Result<TransferSummary, TransferError>
where
    W: AsyncWrite + Unpin,
{
    let start = Instant::now();
    let peer = negotiated.peer;
    let blksize = usize::from(negotiated.blksize);
    let mut block = BlockCounter::new();
    let mut total: u64 = 0;

    // Data(1) already in hand means the server skipped option negotiation.
    let mut pending = negotiated.first_block;
    if pending.is_none() {
        conv.send(&TftpPacket::Ack(0), peer).await?;
    }

    loop {
        let data = match pending.take() {
            Some(data) => data,
            None => match conv.recv(Expect::Peer(peer)).await?.0 {
                TftpPacket::Data { block: n, data } if block.matches(n) => data,
                TftpPacket::Data { block: n, .. } => {
                    debug!(expected = block.current(), got = n, "discarding duplicate block");
                    continue;
                }
                TftpPacket::Error { code, msg } => return Err(report(code, msg)),
                other => {
                    debug!(packet = other.name(), "discarding unexpected packet");
                    continue;
                }
            },
        };

        if data.len() > blksize {
            conv.reject(peer, ErrorCode::IllegalOperation, "Block exceeds negotiated blksize")
                .await;
            return Err(PacketError::BlockTooLarge {
                len: data.len(),
                blksize: negotiated.blksize,
            }
            .into());
        }

        if let Err(e) = sink.write_all(&data).await {
            conv.reject(peer, ErrorCode::DiskFull, "Disk full or allocation exceeded")
                .await;
            return Err(TransferError::LocalIo(e));
        }
        conv.send(&TftpPacket::Ack(block.current()), peer).await?;
        debug!(block = block.current(), size = data.len(), "data received");

        total += data.len() as u64;
        block.advance();
        if data.len() < blksize {
            break;
        }
    }

    sink.flush().await.map_err(TransferError::LocalIo)?;

    let summary = TransferSummary {
        bytes: total,
        blocks: block.exchanged(),
        blksize: negotiated.blksize,
        elapsed: start.elapsed(),
    };
    info!(bytes = summary.bytes, blocks = summary.blocks, "download complete");
    Ok(summary)
}

// Fills `buf` unless the source runs dry, so only the terminal block is short.
async fn read_block<R>(source: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
