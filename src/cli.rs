use anstyle::AnsiColor;
use clap::builder::styling::Styles;
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::client::ClientConfig;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default())
    .usage(AnsiColor::Green.on_default())
    .literal(AnsiColor::Cyan.on_default())
    .placeholder(AnsiColor::Red.on_default());

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Send a local file to the server
    #[value(alias = "put")]
    Upload,
    /// Fetch a remote file from the server
    #[value(alias = "get")]
    Download,
}

#[derive(Parser, Debug)]
#[command(name = "tftp-client")]
#[command(about = "A simple TFTP client", long_about = None)]
#[command(styles = STYLES)]
pub struct Cli {
    /// Server host name or ip
    pub server: String,

    /// Transfer direction
    #[arg(value_enum)]
    pub operation: Operation,

    /// Local file to read (upload) or write (download)
    pub local: PathBuf,

    /// Remote file name, defaults to the local file name
    pub remote: Option<String>,

    /// Server port
    #[arg(short, long, default_value_t = crate::DEF_SERVER_PORT)]
    pub port: u16,

    /// Requested block size
    #[arg(
        short,
        long,
        default_value_t = crate::DEF_BLOCK_SIZE,
        value_parser = clap::value_parser!(u16).range(8..=65464)
    )]
    pub blksize: u16,

    /// Timeout (ms)
    #[arg(short, long, default_value_t = crate::DEF_TIMEOUT_MS)]
    pub timeout: u64,

    /// Max retries per block, 0 aborts on the first timeout
    #[arg(short, long, default_value_t = crate::DEF_RETRY_COUNT)]
    pub retry: u8,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn config(&self, server: SocketAddr) -> ClientConfig {
        ClientConfig {
            server,
            blksize: self.blksize,
            timeout: Duration::from_millis(self.timeout),
            retries: self.retry,
        }
    }

    pub fn remote_name(&self) -> Option<String> {
        match &self.remote {
            Some(remote) => Some(remote.clone()),
            None => self
                .local
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["tftp-client", "localhost", "get", "out/a.bin"]).unwrap();
        assert_eq!(cli.operation, Operation::Download);
        assert_eq!(cli.port, 69);
        assert_eq!(cli.blksize, 512);
        assert_eq!(cli.timeout, 5000);
        assert_eq!(cli.retry, 0);
        assert_eq!(cli.remote_name().as_deref(), Some("a.bin"));
    }

    #[test]
    fn explicit_options() {
        let cli = Cli::try_parse_from([
            "tftp-client", "10.0.0.1", "upload", "a.bin", "b.bin", "-b", "1024", "-t", "200", "-r",
            "2",
        ])
        .unwrap();
        let config = cli.config("10.0.0.1:69".parse().unwrap());
        assert_eq!(cli.remote_name().as_deref(), Some("b.bin"));
        assert_eq!(config.blksize, 1024);
        assert_eq!(config.timeout, Duration::from_millis(200));
        assert_eq!(config.retries, 2);
    }

    #[test]
    fn blksize_out_of_range_is_refused() {
        assert!(Cli::try_parse_from(["tftp-client", "h", "get", "a", "-b", "4"]).is_err());
    }
}
