use std::net::SocketAddr;
use tracing::{debug, info};

use crate::conversation::{Conversation, Expect};
use crate::error::{report, ErrorCode, TransferError};
use crate::packet::{RequestKind, TftpOptions, TftpPacket};

/// The opening RRQ/WRQ. Immutable once sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub kind: RequestKind,
    pub filename: String,
    pub blksize: u16,
    pub tsize: Option<u64>,
}

impl TransferRequest {
    pub fn read(filename: impl Into<String>, blksize: u16) -> Self {
        Self {
            kind: RequestKind::Read,
            filename: filename.into(),
            blksize: clamp_blksize(blksize),
            tsize: None,
        }
    }

    pub fn write(filename: impl Into<String>, blksize: u16, tsize: Option<u64>) -> Self {
        Self {
            kind: RequestKind::Write,
            filename: filename.into(),
            blksize: clamp_blksize(blksize),
            tsize,
        }
    }

    /// `blksize` always, then `tsize` for writes of a known, nonempty source.
    pub fn options(&self) -> TftpOptions {
        let mut options = TftpOptions::new();
        options.insert("blksize", self.blksize);
        if self.kind == RequestKind::Write {
            if let Some(tsize) = self.tsize.filter(|&n| n > 0) {
                options.insert("tsize", tsize);
            }
        }
        options
    }

    pub fn to_packet(&self) -> TftpPacket {
        TftpPacket::Request {
            kind: self.kind,
            filename: self.filename.clone(),
            mode: crate::MODE_OCTET.to_string(),
            options: self.options(),
        }
    }
}

fn clamp_blksize(blksize: u16) -> u16 {
    blksize.clamp(crate::MIN_BLOCK_SIZE, crate::MAX_BLOCK_SIZE)
}

/// Outcome of a successful negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// Source of the first reply; every later packet goes to and must come from here.
    pub peer: SocketAddr,
    pub blksize: u16,
    /// Transfer size echoed in an OACK, if any.
    pub tsize: Option<u64>,
    /// Set when the server skipped option negotiation and answered an RRQ
    /// with Data(1) directly.
    pub first_block: Option<Vec<u8>>,
}

/// Sends `request` to the server's well-known port and interprets the first reply.
pub(crate) async fn negotiate(
    conv: &mut Conversation,
    server: SocketAddr,
    request: &TransferRequest,
) -> Result<Negotiated, TransferError> {
    conv.send(&request.to_packet(), server).await?;
    debug!(%server, kind = %request.kind, filename = %request.filename, "request sent");

    loop {
        let (pkt, from) = conv.recv(Expect::Server(server.ip())).await?;
        let negotiated = match pkt {
            TftpPacket::Error { code, msg } => return Err(report(code, msg)),
            TftpPacket::OptionAck(options) => match accept_options(request, &options) {
                Ok((blksize, tsize)) => Negotiated {
                    peer: from,
                    blksize,
                    tsize,
                    first_block: None,
                },
                Err(e) => {
                    conv.reject(from, ErrorCode::BadOptions, &e.to_string()).await;
                    return Err(e);
                }
            },
            TftpPacket::Ack(0) => Negotiated {
                peer: from,
                blksize: request.blksize,
                tsize: None,
                first_block: None,
            },
            TftpPacket::Data { block: 1, data } if request.kind == RequestKind::Read => {
                Negotiated {
                    peer: from,
                    blksize: crate::DEF_BLOCK_SIZE,
                    tsize: None,
                    first_block: Some(data),
                }
            }
            other => {
                debug!(%from, packet = other.name(), "discarding unexpected reply");
                continue;
            }
        };

        info!(
            peer = %negotiated.peer,
            blksize = negotiated.blksize,
            tsize = ?negotiated.tsize,
            "negotiation complete"
        );
        return Ok(negotiated);
    }
}

/// Validates an OACK against what was requested. A server may only lower blksize.
pub(crate) fn accept_options(
    request: &TransferRequest,
    options: &TftpOptions,
) -> Result<(u16, Option<u64>), TransferError> {
    let requested = request.options();
    let mut blksize = crate::DEF_BLOCK_SIZE;
    let mut tsize = None;

    for (name, value) in options.iter() {
        let bad = || TransferError::BadOption {
            name: name.to_string(),
            value: value.to_string(),
        };
        if requested.get(name).is_none() {
            return Err(bad());
        }
        if name.eq_ignore_ascii_case("blksize") {
            let size: u16 = value.parse().map_err(|_| bad())?;
            if size < crate::MIN_BLOCK_SIZE || size > request.blksize {
                return Err(bad());
            }
            blksize = size;
        } else if name.eq_ignore_ascii_case("tsize") {
            tsize = Some(value.parse().map_err(|_| bad())?);
        }
    }
    Ok((blksize, tsize))
}
