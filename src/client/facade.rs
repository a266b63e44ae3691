// ABOUTME: Typed command surface (C7) over the pipelined queue, generalized from the
// ABOUTME: teacher's SmppTransmitter/SmppClient trait split into GET/SET/DEL/... methods

use crate::error::RespError;
use crate::metrics::MetricsSnapshot;
use crate::middleware::{Chain, Middleware, RequestContext};
use crate::pool::Pool;
use crate::queue::Dispatcher;
use crate::resp::value::Value;
use crate::resp::writer;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// Thin command-surface facade (C7). Translates high-level calls into the
/// `writer-fn` invocations C6 expects, routing every call through the middleware
/// chain (C8) built at connect time. This crate does not interpret command
/// semantics beyond validating the reply shape each wrapper promises — it treats
/// commands as opaque byte frames, per the design's stated non-goal.
pub struct Client<S> {
    pool: Arc<Pool<S>>,
    dispatcher: Arc<Dispatcher<S>>,
    chain: Chain,
    command_timeout: Option<Duration>,
}

impl<S> Clone for Client<S> {
    fn clone(&self) -> Self {
        Client {
            pool: self.pool.clone(),
            dispatcher: self.dispatcher.clone(),
            chain: self.chain.clone(),
            command_timeout: self.command_timeout,
        }
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub(crate) fn new(
        pool: Arc<Pool<S>>,
        dispatcher: Arc<Dispatcher<S>>,
        middlewares: Vec<Arc<dyn Middleware>>,
        command_timeout: Option<Duration>,
    ) -> Self {
        let terminal_dispatcher = dispatcher.clone();
        let chain = Chain::new(middlewares, move |ctx: RequestContext| {
            let dispatcher = terminal_dispatcher.clone();
            Box::pin(async move {
                // GET is the one command the cache (§4.6) recognizes: its encoding
                // depends on nothing but the key, so a repeated key can skip C3 entirely.
                if ctx.command.eq_ignore_ascii_case(b"GET") {
                    if let [key] = ctx.args.as_slice() {
                        let cache_key = key.clone();
                        let command = ctx.command.clone();
                        let args = ctx.args.clone();
                        return dispatcher
                            .submit_cached(cache_key, move |buf| {
                                writer::write_command(buf, &command, args.iter().map(|a| a.as_ref()));
                            })
                            .await;
                    }
                }
                dispatcher
                    .submit(move |buf| {
                        writer::write_command(buf, &ctx.command, ctx.args.iter().map(|a| a.as_ref()));
                    })
                    .await
            })
        });
        Client { pool, dispatcher, chain, command_timeout }
    }

    /// Snapshot of the observable counters from §6: submitted/completed commands,
    /// batches processed and their average size, connection counts.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.pool.metrics().snapshot()
    }

    /// Issues an arbitrary command through the middleware chain, for callers who need
    /// something not covered by a typed wrapper below.
    ///
    /// If `command_timeout` is configured, this races the chain call against that
    /// timer (§5 "Timeouts"). On expiry the caller gets `TimedOut` immediately; the
    /// submission itself is not cancelled — it was already dispatched onto a
    /// connection, so the dispatcher still reads its reply off the wire and discards
    /// it to keep that connection's FIFO correlation intact for every submission
    /// behind it in the same batch.
    pub async fn command(&self, token: &str, args: &[&[u8]]) -> Result<Value, RespError> {
        let ctx = RequestContext::new(
            Bytes::copy_from_slice(token.as_bytes()),
            args.iter().map(|a| Bytes::copy_from_slice(a)).collect(),
        );
        match self.command_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.chain.call(ctx)).await {
                Ok(result) => result,
                Err(_) => Err(RespError::TimedOut),
            },
            None => self.chain.call(ctx).await,
        }
    }

    /// Submits a command whose reply is read back and discarded by the dispatcher but
    /// never observed by this caller. Bypasses the middleware chain: there is no
    /// response for a middleware to inspect or rewrite, and no caller awaiting a
    /// synthesized short-circuit reply either.
    pub async fn fire_and_forget(&self, token: &str, args: &[&[u8]]) -> Result<(), RespError> {
        let token = token.as_bytes().to_vec();
        let args: Vec<Vec<u8>> = args.iter().map(|a| a.to_vec()).collect();
        self.dispatcher
            .submit_fire_and_forget(move |buf| {
                writer::write_command(buf, &token, args.iter().map(|a| a.as_slice()));
            })
            .await
    }

    pub async fn ping(&self) -> Result<String, RespError> {
        match self.command("PING", &[]).await? {
            Value::SimpleString(s) => Ok(String::from_utf8_lossy(&s).into_owned()),
            other => unexpected_reply("simple string", other),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Bytes>, RespError> {
        self.nullable_bulk_reply("GET", &[key.as_bytes()]).await
    }

    pub async fn set(&self, key: &str, value: &[u8]) -> Result<(), RespError> {
        match self.command("SET", &[key.as_bytes(), value]).await? {
            Value::SimpleString(s) if s.eq_ignore_ascii_case(b"OK") => Ok(()),
            other => unexpected_reply("+OK", other),
        }
    }

    pub async fn del(&self, keys: &[&str]) -> Result<i64, RespError> {
        let args: Vec<&[u8]> = keys.iter().map(|k| k.as_bytes()).collect();
        self.integer_reply("DEL", &args).await
    }

    pub async fn incr(&self, key: &str) -> Result<i64, RespError> {
        self.integer_reply("INCR", &[key.as_bytes()]).await
    }

    pub async fn exists(&self, keys: &[&str]) -> Result<i64, RespError> {
        let args: Vec<&[u8]> = keys.iter().map(|k| k.as_bytes()).collect();
        self.integer_reply("EXISTS", &args).await
    }

    pub async fn ttl(&self, key: &str) -> Result<i64, RespError> {
        self.integer_reply("TTL", &[key.as_bytes()]).await
    }

    /// Returns whether the key's expiry was set (RESP's `EXPIRE` returns `1`/`0`).
    pub async fn expire(&self, key: &str, seconds: i64) -> Result<bool, RespError> {
        let secs = seconds.to_string();
        let n = self.integer_reply("EXPIRE", &[key.as_bytes(), secs.as_bytes()]).await?;
        Ok(n == 1)
    }

    pub async fn hset(&self, key: &str, field: &str, value: &[u8]) -> Result<i64, RespError> {
        self.integer_reply("HSET", &[key.as_bytes(), field.as_bytes(), value]).await
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<Bytes>, RespError> {
        self.nullable_bulk_reply("HGET", &[key.as_bytes(), field.as_bytes()]).await
    }

    pub async fn lpush(&self, key: &str, value: &[u8]) -> Result<i64, RespError> {
        self.integer_reply("LPUSH", &[key.as_bytes(), value]).await
    }

    pub async fn rpop(&self, key: &str) -> Result<Option<Bytes>, RespError> {
        self.nullable_bulk_reply("RPOP", &[key.as_bytes()]).await
    }

    pub async fn sadd(&self, key: &str, member: &[u8]) -> Result<i64, RespError> {
        self.integer_reply("SADD", &[key.as_bytes(), member]).await
    }

    pub async fn srem(&self, key: &str, member: &[u8]) -> Result<i64, RespError> {
        self.integer_reply("SREM", &[key.as_bytes(), member]).await
    }

    async fn integer_reply(&self, token: &str, args: &[&[u8]]) -> Result<i64, RespError> {
        match self.command(token, args).await? {
            Value::Integer(n) => Ok(n),
            other => unexpected_reply("integer", other),
        }
    }

    async fn nullable_bulk_reply(&self, token: &str, args: &[&[u8]]) -> Result<Option<Bytes>, RespError> {
        match self.command(token, args).await? {
            Value::Null => Ok(None),
            Value::BulkString(b) => Ok(Some(b)),
            other => unexpected_reply("bulk string or null", other),
        }
    }
}

/// A well-formed RESP error frame surfaces as `ServerError`, per §7's "server errors
/// are surfaced as typed `ServerError` returns"; any other unexpected shape is the
/// `ProtocolViolation` the design reserves for wrappers that assume a fixed reply.
fn unexpected_reply<T>(expected: &str, actual: Value) -> Result<T, RespError> {
    if let Value::Error(msg) = &actual {
        return Err(RespError::ServerError(String::from_utf8_lossy(msg).into_owned()));
    }
    Err(RespError::ProtocolViolation { expected: expected.to_string(), actual: format!("{actual:?}") })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BatchProfile, OverflowMode};
    use crate::connection::Connection;
    use crate::pool::backoff::BackoffPolicy;
    use crate::pool::health::HealthCheckConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::DuplexStream;

    async fn test_client(
        server: impl FnOnce(DuplexStream) + Send + 'static,
    ) -> Client<DuplexStream> {
        let (client_end, server_end) = tokio::io::duplex(8192);
        server(server_end);

        let counter = Arc::new(AtomicUsize::new(0));
        let streams: Arc<std::sync::Mutex<Option<DuplexStream>>> =
            Arc::new(std::sync::Mutex::new(Some(client_end)));
        let connector: crate::pool::Connector<DuplexStream> = {
            let streams = streams.clone();
            let counter = counter.clone();
            Arc::new(move || {
                let streams = streams.clone();
                let counter = counter.clone();
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::Relaxed);
                    streams
                        .lock()
                        .unwrap()
                        .take()
                        .ok_or_else(|| std::io::Error::other("stream already consumed"))
                })
            })
        };

        let metrics = Arc::new(crate::metrics::PoolMetrics::default());
        let initializer: crate::pool::Initializer<DuplexStream> =
            Arc::new(|_conn: &mut Connection<DuplexStream>| Box::pin(async { Ok(()) }));
        let pool = Pool::connect(
            1,
            connector,
            BackoffPolicy::Fixed(std::time::Duration::from_millis(10)),
            HealthCheckConfig::disabled(),
            metrics,
            initializer,
        )
        .await
        .unwrap();
        let pool = Arc::new(pool);

        let dispatcher = Dispatcher::spawn(
            pool.clone(),
            BatchProfile::DEFAULT,
            OverflowMode::Wait,
            None,
            16,
            16,
            None,
        );
        Client::new(pool, dispatcher, vec![], None)
    }

    #[tokio::test]
    async fn command_timeout_returns_timed_out_without_cancelling_submission() {
        let (client_end, mut server_end) = tokio::io::duplex(8192);
        let counter = Arc::new(AtomicUsize::new(0));
        let streams: Arc<std::sync::Mutex<Option<DuplexStream>>> =
            Arc::new(std::sync::Mutex::new(Some(client_end)));
        let connector: crate::pool::Connector<DuplexStream> = {
            let streams = streams.clone();
            let counter = counter.clone();
            Arc::new(move || {
                let streams = streams.clone();
                let counter = counter.clone();
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::Relaxed);
                    streams
                        .lock()
                        .unwrap()
                        .take()
                        .ok_or_else(|| std::io::Error::other("stream already consumed"))
                })
            })
        };
        let metrics = Arc::new(crate::metrics::PoolMetrics::default());
        let initializer: crate::pool::Initializer<DuplexStream> =
            Arc::new(|_conn: &mut Connection<DuplexStream>| Box::pin(async { Ok(()) }));
        let pool = Pool::connect(
            1,
            connector,
            BackoffPolicy::Fixed(std::time::Duration::from_millis(10)),
            HealthCheckConfig::disabled(),
            metrics,
            initializer,
        )
        .await
        .unwrap();
        let pool = Arc::new(pool);
        let dispatcher =
            Dispatcher::spawn(pool.clone(), BatchProfile::DEFAULT, OverflowMode::Wait, None, 16, 16, None);
        let client =
            Client::new(pool, dispatcher, vec![], Some(std::time::Duration::from_millis(20)));

        // Server never replies; the submission stays in flight on the connection.
        let err = client.ping().await.unwrap_err();
        assert!(matches!(err, RespError::TimedOut));

        // The dispatcher is still waiting on that same reply; feeding it one now
        // proves the connection (and its FIFO position) survived the client's timeout.
        let mut buf = [0u8; 64];
        let n = tokio::io::AsyncReadExt::read(&mut server_end, &mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"*1\r\n$4\r\nPING\r\n");
        tokio::io::AsyncWriteExt::write_all(&mut server_end, b"+PONG\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn ping_returns_simple_string() {
        let client = test_client(|mut server| {
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                let n = tokio::io::AsyncReadExt::read(&mut server, &mut buf).await.unwrap();
                assert_eq!(&buf[..n], b"*1\r\n$4\r\nPING\r\n");
                tokio::io::AsyncWriteExt::write_all(&mut server, b"+PONG\r\n").await.unwrap();
            });
        })
        .await;

        assert_eq!(client.ping().await.unwrap(), "PONG");
    }

    #[tokio::test]
    async fn get_missing_key_is_none() {
        let client = test_client(|mut server| {
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                let _ = tokio::io::AsyncReadExt::read(&mut server, &mut buf).await.unwrap();
                tokio::io::AsyncWriteExt::write_all(&mut server, b"$-1\r\n").await.unwrap();
            });
        })
        .await;

        assert_eq!(client.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_accepts_case_insensitive_ok() {
        let client = test_client(|mut server| {
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                let _ = tokio::io::AsyncReadExt::read(&mut server, &mut buf).await.unwrap();
                tokio::io::AsyncWriteExt::write_all(&mut server, b"+ok\r\n").await.unwrap();
            });
        })
        .await;

        client.set("foo", b"bar").await.unwrap();
    }

    #[tokio::test]
    async fn set_non_ok_reply_is_protocol_violation() {
        let client = test_client(|mut server| {
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                let _ = tokio::io::AsyncReadExt::read(&mut server, &mut buf).await.unwrap();
                tokio::io::AsyncWriteExt::write_all(&mut server, b":1\r\n").await.unwrap();
            });
        })
        .await;

        let err = client.set("foo", b"bar").await.unwrap_err();
        assert!(matches!(err, RespError::ProtocolViolation { .. }));
    }

    #[tokio::test]
    async fn server_error_frame_surfaces_as_server_error() {
        let client = test_client(|mut server| {
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                let _ = tokio::io::AsyncReadExt::read(&mut server, &mut buf).await.unwrap();
                tokio::io::AsyncWriteExt::write_all(&mut server, b"-ERR no such key\r\n")
                    .await
                    .unwrap();
            });
        })
        .await;

        let err = client.incr("ctr").await.unwrap_err();
        assert!(matches!(err, RespError::ServerError(msg) if msg == "ERR no such key"));
    }

    #[tokio::test]
    async fn mget_style_array_reply_round_trips() {
        let client = test_client(|mut server| {
            tokio::spawn(async move {
                let mut buf = [0u8; 128];
                let _ = tokio::io::AsyncReadExt::read(&mut server, &mut buf).await.unwrap();
                tokio::io::AsyncWriteExt::write_all(&mut server, b"*2\r\n$1\r\nA\r\n$-1\r\n")
                    .await
                    .unwrap();
            });
        })
        .await;

        let reply = client.command("MGET", &[b"a", b"b"]).await.unwrap();
        assert_eq!(
            reply,
            Value::Array(vec![Value::bulk_string(&b"A"[..]), Value::Null])
        );
    }
}
