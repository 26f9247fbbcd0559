use anyhow::{anyhow, Context};
use clap::Parser;
use tokio::fs::{self, File};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tftp_client::{Cli, Client, Operation};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let server = tftp_client::resolve(&args.server, args.port)
        .await
        .with_context(|| format!("failed to resolve {}", args.server))?;
    let remote = args
        .remote_name()
        .ok_or(anyhow!("no remote name for {}", args.local.display()))?;
    let client = Client::new(args.config(server));

    info!(
        %server,
        operation = ?args.operation,
        local = %args.local.display(),
        %remote,
        blksize = args.blksize,
        timeout_ms = args.timeout,
        retries = args.retry,
        "starting transfer"
    );

    let summary = match args.operation {
        Operation::Upload => {
            let mut file = File::open(&args.local)
                .await
                .with_context(|| format!("failed to open {}", args.local.display()))?;
            let size = file.metadata().await?.len();
            client.upload(&remote, &mut file, Some(size)).await?
        }
        Operation::Download => {
            let mut file = File::create(&args.local)
                .await
                .with_context(|| format!("failed to create {}", args.local.display()))?;
            let result = client.download(&remote, &mut file).await;
            drop(file);
            match result {
                Ok(summary) => summary,
                Err(e) => {
                    // A failed download leaves nothing behind.
                    if let Err(rm) = fs::remove_file(&args.local).await {
                        error!(error = %rm, "failed to remove partial file");
                    }
                    return Err(e.into());
                }
            }
        }
    };

    info!(
        "cost: {:.3}s, speed: {:.2} MB/s, {} bytes in {} blocks of {}",
        summary.elapsed.as_secs_f64(),
        summary.speed(),
        summary.bytes,
        summary.blocks,
        summary.blksize
    );
    Ok(())
}
