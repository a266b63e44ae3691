//! Low-overhead async client for RESP2/RESP3 key/value datastores.
//!
//! The crate is layered the way a pipelined client has to be: a zero-copy wire
//! codec ([`resp`]) underneath a buffered [`connection`], a round-robin
//! connection multiplexer ([`pool`]), a batching command queue that preserves
//! per-connection FIFO reply order ([`queue`]), an optional interceptor chain
//! ([`middleware`]), and a typed command surface on top ([`client`]).
//!
//! ```rust,no_run
//! use resp_client::{ClientBuilder, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("127.0.0.1", 6379).with_pool_size(4);
//!     let client = ClientBuilder::new(config).connect().await?;
//!
//!     client.set("greeting", b"hello").await?;
//!     let value = client.get("greeting").await?;
//!     println!("{:?}", value.map(|b| String::from_utf8_lossy(&b).into_owned()));
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod pool;
pub mod queue;
pub mod resp;

pub use client::{Client, ClientBuilder};
pub use config::{BatchProfile, ClientConfig, Credentials, OverflowMode};
pub use error::{RespError, RespResult};
pub use metrics::{MetricsSnapshot, PoolMetrics};
pub use middleware::{Chain, Middleware, RequestContext};
pub use resp::Value;

/// A specialized `Result` type for RESP client operations.
pub type Result<T> = std::result::Result<T, RespError>;
