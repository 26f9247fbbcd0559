use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

use crate::packet::PacketError;

/// Error codes from RFC 1350 appendix I, plus RFC 2347's option refusal.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorCode {
    NotDefined,
    FileNotFound,
    AccessViolation,
    DiskFull,
    IllegalOperation,
    UnknownTransferId,
    FileAlreadyExists,
    NoSuchUser,
    BadOptions,
    Unknown(u16),
}

impl From<u16> for ErrorCode {
    fn from(value: u16) -> Self {
        match value {
            0 => ErrorCode::NotDefined,
            1 => ErrorCode::FileNotFound,
            2 => ErrorCode::AccessViolation,
            3 => ErrorCode::DiskFull,
            4 => ErrorCode::IllegalOperation,
            5 => ErrorCode::UnknownTransferId,
            6 => ErrorCode::FileAlreadyExists,
            7 => ErrorCode::NoSuchUser,
            8 => ErrorCode::BadOptions,
            unknown => ErrorCode::Unknown(unknown),
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::NotDefined => 0,
            ErrorCode::FileNotFound => 1,
            ErrorCode::AccessViolation => 2,
            ErrorCode::DiskFull => 3,
            ErrorCode::IllegalOperation => 4,
            ErrorCode::UnknownTransferId => 5,
            ErrorCode::FileAlreadyExists => 6,
            ErrorCode::NoSuchUser => 7,
            ErrorCode::BadOptions => 8,
            ErrorCode::Unknown(v) => v,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorCode::NotDefined => "not defined",
            ErrorCode::FileNotFound => "file not found",
            ErrorCode::AccessViolation => "access violation",
            ErrorCode::DiskFull => "disk full or allocation exceeded",
            ErrorCode::IllegalOperation => "illegal TFTP operation",
            ErrorCode::UnknownTransferId => "unknown transfer ID",
            ErrorCode::FileAlreadyExists => "file already exists",
            ErrorCode::NoSuchUser => "no such user",
            ErrorCode::BadOptions => "option negotiation refused",
            ErrorCode::Unknown(code) => return write!(f, "unknown error {code}"),
        };
        f.write_str(text)
    }
}

/// Why a transfer ended in `Failed`. Every variant aborts the session.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("malformed packet: {0}")]
    MalformedPacket(#[from] PacketError),

    /// `message` is decoded lossily: bytes that are not UTF-8 become U+FFFD.
    #[error("server error {code}: {message}")]
    Protocol { code: u16, message: String },

    #[error("no response from {peer} after {attempts} attempt(s) of {timeout:?}")]
    NoResponse {
        peer: SocketAddr,
        timeout: Duration,
        attempts: u32,
    },

    #[error("local I/O error: {0}")]
    LocalIo(#[source] io::Error),

    #[error("socket error: {0}")]
    Socket(#[source] io::Error),

    #[error("server acknowledged unacceptable option {name}={value}")]
    BadOption { name: String, value: String },
}

impl TransferError {
    /// The server's error code, for `Protocol` failures.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            TransferError::Protocol { code, .. } => Some(ErrorCode::from(*code)),
            _ => None,
        }
    }
}

/// Turns a received ERROR packet into the failure that ends the session.
pub(crate) fn report(code: u16, message: String) -> TransferError {
    error!(code, kind = %ErrorCode::from(code), %message, "server aborted transfer");
    TransferError::Protocol { code, message }
}
