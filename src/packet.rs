use std::fmt;
use std::str;
use thiserror::Error;

pub const OPCODE_RRQ: u16 = 1;
pub const OPCODE_WRQ: u16 = 2;
pub const OPCODE_DATA: u16 = 3;
pub const OPCODE_ACK: u16 = 4;
pub const OPCODE_ERROR: u16 = 5;
pub const OPCODE_OACK: u16 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("packet length {0} too short")]
    TooShort(usize),
    #[error("invalid opcode: {0}")]
    InvalidOpcode(u16),
    #[error("missing terminator for {0}")]
    MissingTerminator(&'static str),
    #[error("invalid encoding for {0}")]
    InvalidEncoding(&'static str),
    #[error("data block of {len} bytes exceeds blksize {blksize}")]
    BlockTooLarge { len: usize, blksize: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Read,
    Write,
}

impl RequestKind {
    pub fn opcode(self) -> u16 {
        match self {
            RequestKind::Read => OPCODE_RRQ,
            RequestKind::Write => OPCODE_WRQ,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Read => f.write_str("RRQ"),
            RequestKind::Write => f.write_str("WRQ"),
        }
    }
}

/// Option name/value pairs in wire order. Names compare case-insensitively (RFC 2347).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TftpOptions(Vec<(String, String)>);

impl TftpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing an earlier value while keeping its position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
        let name = name.into();
        let value = value.to_string();
        match self.0.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(&name)) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TftpPacket {
    Request {
        kind: RequestKind,
        filename: String,
        mode: String,
        options: TftpOptions,
    },
    Data {
        block: u16,
        data: Vec<u8>,
    },
    Ack(u16),
    Error {
        code: u16,
        msg: String,
    },
    OptionAck(TftpOptions),
}

impl TftpPacket {
    pub fn opcode(&self) -> u16 {
        match self {
            TftpPacket::Request { kind, .. } => kind.opcode(),
            TftpPacket::Data { .. } => OPCODE_DATA,
            TftpPacket::Ack(_) => OPCODE_ACK,
            TftpPacket::Error { .. } => OPCODE_ERROR,
            TftpPacket::OptionAck(_) => OPCODE_OACK,
        }
    }

    /// Short name for log lines, avoids dumping payloads.
    pub fn name(&self) -> &'static str {
        match self {
            TftpPacket::Request {
                kind: RequestKind::Read,
                ..
            } => "RRQ",
            TftpPacket::Request {
                kind: RequestKind::Write,
                ..
            } => "WRQ",
            TftpPacket::Data { .. } => "DATA",
            TftpPacket::Ack(_) => "ACK",
            TftpPacket::Error { .. } => "ERROR",
            TftpPacket::OptionAck(_) => "OACK",
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = Vec::with_capacity(4);
        bytes.extend_from_slice(&self.opcode().to_be_bytes());

        match self {
            TftpPacket::Request {
                filename,
                mode,
                options,
                ..
            } => {
                write_cstr(&mut bytes, filename);
                write_cstr(&mut bytes, mode);
                write_options(&mut bytes, options);
            }
            TftpPacket::Data { block, data } => {
                bytes.extend_from_slice(&block.to_be_bytes());
                bytes.extend_from_slice(data);
            }
            TftpPacket::Ack(block) => {
                bytes.extend_from_slice(&block.to_be_bytes());
            }
            TftpPacket::Error { code, msg } => {
                bytes.extend_from_slice(&code.to_be_bytes());
                write_cstr(&mut bytes, msg);
            }
            TftpPacket::OptionAck(options) => {
                write_options(&mut bytes, options);
            }
        }
        bytes
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < 2 {
            return Err(PacketError::TooShort(buf.len()));
        }

        // A nonzero first byte yields an opcode above 255, rejected below.
        let opcode = u16::from_be_bytes([buf[0], buf[1]]);
        let body = &buf[2..];
        let pkt = match opcode {
            OPCODE_RRQ | OPCODE_WRQ => {
                let (filename, rest) = read_cstr(body, "filename")?;
                let (mode, rest) = read_cstr(rest, "mode")?;
                let options = read_options(rest)?;
                let kind = if opcode == OPCODE_RRQ {
                    RequestKind::Read
                } else {
                    RequestKind::Write
                };
                TftpPacket::Request {
                    kind,
                    filename,
                    mode,
                    options,
                }
            }
            OPCODE_DATA => {
                let block = read_u16(buf)?;
                TftpPacket::Data {
                    block,
                    data: buf[4..].to_vec(),
                }
            }
            OPCODE_ACK => TftpPacket::Ack(read_u16(buf)?),
            OPCODE_ERROR => {
                let code = read_u16(buf)?;
                // Some servers omit the trailing NUL; take the rest of the datagram then.
                let raw = &buf[4..];
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                let msg = String::from_utf8_lossy(&raw[..end]).into_owned();
                TftpPacket::Error { code, msg }
            }
            OPCODE_OACK => TftpPacket::OptionAck(read_options(body)?),
            _ => {
                return Err(PacketError::InvalidOpcode(opcode));
            }
        };

        Ok(pkt)
    }
}

// Reads the 16-bit field that follows the opcode.
fn read_u16(buf: &[u8]) -> Result<u16, PacketError> {
    if buf.len() < 4 {
        return Err(PacketError::TooShort(buf.len()));
    }
    Ok(u16::from_be_bytes([buf[2], buf[3]]))
}

fn write_cstr(bytes: &mut Vec<u8>, s: &str) {
    bytes.extend_from_slice(s.as_bytes());
    bytes.push(0);
}

fn write_options(bytes: &mut Vec<u8>, options: &TftpOptions) {
    for (key, value) in options.iter() {
        write_cstr(bytes, key);
        write_cstr(bytes, value);
    }
}

// Reads a NUL-terminated string, returning it with the remaining bytes.
fn read_cstr<'a>(buf: &'a [u8], field: &'static str) -> Result<(String, &'a [u8]), PacketError> {
    let pos = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or(PacketError::MissingTerminator(field))?;
    let s = str::from_utf8(&buf[..pos])
        .map_err(|_| PacketError::InvalidEncoding(field))?
        .to_string();
    Ok((s, &buf[pos + 1..]))
}

fn read_options(mut buf: &[u8]) -> Result<TftpOptions, PacketError> {
    let mut options = TftpOptions::new();
    while !buf.is_empty() {
        let (key, rest) = read_cstr(buf, "option name")?;
        let (value, rest) = read_cstr(rest, "option value")?;
        options.insert(key, value);
        buf = rest;
    }
    Ok(options)
}
