// ABOUTME: Fires many concurrent PINGs at once and reports the dispatcher's batching
// ABOUTME: stats, via the pool's metrics snapshot — shows C6 collapsing N calls into few writes

use argh::FromArgs;
use resp_client::{ClientBuilder, ClientConfig};
use std::error::Error;
use std::sync::Arc;

/// Submit N concurrent PINGs through one client and report batching stats.
#[derive(FromArgs)]
struct CliArgs {
    /// the hostname or IP address of the server (default: 127.0.0.1)
    #[argh(option)]
    host: Option<String>,

    /// the port to connect to (default: 6379)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// how many concurrent PINGs to submit (default: 1000)
    #[argh(option, short = 'n')]
    count: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();
    let host = cli_args.host.unwrap_or_else(|| "127.0.0.1".to_owned());
    let port = cli_args.port.unwrap_or(6379);
    let count = cli_args.count.unwrap_or(1000);

    let config = ClientConfig::new(host, port).with_pool_size(1);
    let client = Arc::new(ClientBuilder::new(config).connect().await.map_err(|e| {
        eprintln!("connect failed: {e}");
        Box::<dyn Error>::from(e.to_string())
    })?);

    let mut tasks = Vec::with_capacity(count);
    for _ in 0..count {
        let client = client.clone();
        tasks.push(tokio::spawn(async move { client.ping().await }));
    }
    for task in tasks {
        task.await??;
    }

    let snapshot = client.metrics();
    println!(
        "submitted={} completed={} batches={} avg_batch_size={:.1}",
        snapshot.submitted, snapshot.completed, snapshot.batches_processed, snapshot.average_batch_size
    );

    Ok(())
}
