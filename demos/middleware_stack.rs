// ABOUTME: Demonstrates layering custom middleware (C8) in front of the command surface
// ABOUTME: One pass-through logging layer plus one that rewrites the outgoing command token

use argh::FromArgs;
use resp_client::middleware::{BoxFuture, LoggingMiddleware, Middleware, Next, RequestContext};
use resp_client::{ClientBuilder, ClientConfig, RespError, Value};
use std::error::Error;
use std::sync::Arc;

/// Uppercases the outgoing command token before it reaches the dispatcher. Illustrative
/// only: RESP command tokens are conventionally sent uppercase already.
struct UppercaseCommand;

impl Middleware for UppercaseCommand {
    fn handle(&self, mut ctx: RequestContext, next: Next) -> BoxFuture<Result<Value, RespError>> {
        ctx.command = bytes::Bytes::from(String::from_utf8_lossy(&ctx.command).to_uppercase());
        next.call(ctx)
    }
}

/// Connects with a two-layer middleware stack registered and issues a SET/GET pair.
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
    let host = cli_args.host.unwrap_or_else(|| "127.0.0.1".to_owned());
    let port = cli_args.port.unwrap_or(6379);

    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let config = ClientConfig::new(host, port).with_pool_size(1);
    let client = ClientBuilder::new(config)
        .with_middleware(Arc::new(LoggingMiddleware))
        .with_middleware(Arc::new(UppercaseCommand))
        .connect()
        .await
        .map_err(|e| {
            eprintln!("connect failed: {e}");
            Box::<dyn Error>::from(e.to_string())
        })?;

    client.set("demo:key", b"hello").await?;
    let value = client.get("demo:key").await?;
    println!("GET demo:key -> {:?}", value.map(|b| String::from_utf8_lossy(&b).into_owned()));

    Ok(())
}
