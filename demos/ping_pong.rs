// ABOUTME: Smallest possible demonstration of ClientBuilder::connect and the command surface
// ABOUTME: Connects to a RESP server and issues a single PING, printing the reply

use argh::FromArgs;
use resp_client::ClientConfig;
use resp_client::ClientBuilder;
use std::error::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Ping a RESP2/RESP3 server once and print the reply.
#[derive(FromArgs)]
struct CliArgs {
    /// the hostname or IP address of the server (default: 127.0.0.1)
    #[argh(option)]
    host: Option<String>,

    /// the port to connect to (default: 6379)
    #[argh(option, short = 'p')]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let host = cli_args.host.unwrap_or_else(|| "127.0.0.1".to_owned());
    let port = cli_args.port.unwrap_or(6379);

    let config = ClientConfig::new(host.clone(), port).with_pool_size(1);
    let client = ClientBuilder::new(config).connect().await.map_err(|e| {
        eprintln!("connect failed: {e}");
        Box::<dyn Error>::from(e.to_string())
    })?;

    println!("Connected to {host}:{port}");

    let reply = client.ping().await?;
    println!("PING -> {reply}");

    Ok(())
}
