mod block;
mod cli;
mod client;
mod conversation;
mod error;
mod packet;
mod request;
mod session;

pub use crate::block::BlockCounter;
pub use crate::cli::{Cli, Operation};
pub use crate::client::{resolve, Client, ClientConfig};
pub use crate::error::{ErrorCode, TransferError};
pub use crate::packet::{PacketError, RequestKind, TftpOptions, TftpPacket};
pub use crate::request::{Negotiated, TransferRequest};
pub use crate::session::TransferSummary;

pub const DEF_BLOCK_SIZE: u16 = 512; // RFC 1350
pub const MIN_BLOCK_SIZE: u16 = 8; // RFC 2348
pub const MAX_BLOCK_SIZE: u16 = 65464; // RFC 2348

/// Largest datagram a peer may legally send: 4 byte header plus the largest block.
pub const MAX_PACKET_SIZE: usize = 4 + MAX_BLOCK_SIZE as usize;

/// Receive buffer, above the largest UDP payload so oversized blocks are
/// never truncated into looking legal.
pub const RECV_BUFFER_SIZE: usize = 65536;

pub const DEF_SERVER_PORT: u16 = 69;
pub const DEF_TIMEOUT_MS: u64 = 5000;
pub const DEF_RETRY_COUNT: u8 = 0;

/// Consecutive malformed datagrams tolerated within one wait.
pub const MAX_MALFORMED: u8 = 3;

pub const MODE_OCTET: &str = "octet";
