// ABOUTME: Client factory — dials a fixed pool of TCP connections, runs the protocol
// ABOUTME: handshake on each, and wires the pipelined dispatcher behind Client (C7)

use crate::client::facade::Client;
use crate::config::ClientConfig;
use crate::error::RespError;
use crate::metrics::PoolMetrics;
use crate::middleware::Middleware;
use crate::pool::health::HealthCheckConfig;
use crate::pool::{handshake, Connector, Pool};
use crate::queue::Dispatcher;
use crate::resp::value::Value;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Builds a `Client<TcpStream>` from a `ClientConfig`, the way the teacher's
/// `ClientBuilder` wires together a transport, a bind handshake and a transceiver.
/// Here the handshake is `HELLO`/`AUTH`/`SELECT` and the transceiver is the pipelined
/// dispatcher (C6); middleware (C8) layers on top in registration order.
pub struct ClientBuilder {
    config: ClientConfig,
    middlewares: Vec<Arc<dyn Middleware>>,
    push_sender: Option<mpsc::UnboundedSender<Value>>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        ClientBuilder { config, middlewares: Vec::new(), push_sender: None }
    }

    /// Registers a middleware layer. Layers run in registration order, outermost first.
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Opens a side channel RESP3 push frames are forwarded to instead of being
    /// silently dropped while a pending reply is read back.
    pub fn with_push_channel(mut self) -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push_sender = Some(tx);
        (self, rx)
    }

    /// Dials `config.pool_size` TCP connections, runs the handshake on each, and starts
    /// the pool's maintenance loop and the dispatcher's batching worker.
    pub async fn connect(self) -> Result<Client<TcpStream>, RespError> {
        let host = self.config.host.clone();
        let port = self.config.port;
        let connect_timeout = self.config.connect_timeout;

        let connector: Connector<TcpStream> = Arc::new(move || {
            let host = host.clone();
            Box::pin(async move {
                match tokio::time::timeout(connect_timeout, TcpStream::connect((host.as_str(), port))).await {
                    Ok(Ok(stream)) => Ok(stream),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out")),
                }
            })
        });

        let health_config = HealthCheckConfig {
            interval: self.config.health_check_interval,
            timeout: self.config.health_check_timeout,
            max_failures: self.config.health_check_max_failures,
            enabled: self.config.auto_reconnect,
        };

        let metrics = Arc::new(PoolMetrics::default());
        let config = Arc::new(self.config);
        let handshake_config = config.clone();

        // Retained by the pool and re-run on every reconnect, not just the initial
        // fill, so a replacement connection re-authenticates and re-selects the
        // configured database rather than silently reverting to defaults.
        let initializer: crate::pool::Initializer<TcpStream> = Arc::new(move |conn| {
            let config = handshake_config.clone();
            Box::pin(async move { handshake::handshake(conn, &config).await.map(|_| ()) })
        });

        let pool = Pool::connect(
            config.pool_size,
            connector,
            config.reconnect_policy,
            health_config.clone(),
            metrics,
            initializer,
        )
        .await?;
        let pool = Arc::new(pool);

        let maintenance_pool = pool.clone();
        let tick = health_config.interval;
        tokio::spawn(async move { maintenance_pool.run_maintenance(tick).await });

        let dispatcher = Dispatcher::spawn(
            pool.clone(),
            config.batch_profile,
            config.overflow_mode,
            config.ingress_capacity,
            config.handle_pool_size,
            config.command_cache_capacity,
            self.push_sender,
        );

        Ok(Client::new(pool, dispatcher, self.middlewares, config.command_timeout))
    }
}
