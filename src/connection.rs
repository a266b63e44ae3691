// ABOUTME: Buffered RESP connection over one transport — read/write ring buffers plus
// ABOUTME: batch framing, generalized from the teacher's (mini-redis derived) Connection

use crate::error::RespError;
use crate::resp::reader::{self, ReaderError, ReaderLimits};
use crate::resp::value::Value;
use crate::resp::writer;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

/// Default read/write buffer capacity. Larger than the teacher's 4 KiB default since a
/// pipelined client expects whole batches of replies to land in one `read_buf` call.
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Lifecycle state of one pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Failed,
    Closed,
}

/// One TCP (or in-memory, for tests) socket wrapped in RESP framing.
///
/// Generic over `S: AsyncRead + AsyncWrite` so tests can swap in `tokio::io::duplex`
/// instead of a real `TcpStream` — this is the same role the teacher's `Connection`
/// plays over a concrete `TcpStream`, generalized per §8 properties that need an
/// in-memory transport.
pub struct Connection<S> {
    stream: BufWriter<S>,
    read_buffer: BytesMut,
    limits: ReaderLimits,
    state: ConnectionState,
    batching: bool,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(socket: S) -> Self {
        Self::with_capacity(socket, DEFAULT_BUFFER_CAPACITY, ReaderLimits::default())
    }

    pub fn with_capacity(socket: S, capacity: usize, limits: ReaderLimits) -> Self {
        Connection {
            stream: BufWriter::with_capacity(capacity, socket),
            read_buffer: BytesMut::with_capacity(capacity),
            limits,
            state: ConnectionState::Connected,
            batching: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.state, ConnectionState::Connected)
    }

    pub fn mark_failed(&mut self) {
        self.state = ConnectionState::Failed;
    }

    /// Suspends the implicit per-write flush until `end_batch` — the dispatcher calls
    /// this before writing every submission in a batch so the whole batch goes out in
    /// as few syscalls as possible.
    pub fn begin_batch(&mut self) {
        self.batching = true;
    }

    /// Flushes the write buffer, ending a batch started with `begin_batch`.
    pub async fn end_batch(&mut self) -> Result<(), RespError> {
        self.batching = false;
        self.stream.flush().await.map_err(|e| {
            self.state = ConnectionState::Failed;
            RespError::from(e)
        })
    }

    /// Writes an already-encoded command (or any raw RESP bytes) to the connection.
    /// Flushes immediately unless a batch is in progress.
    pub async fn write_frame(&mut self, encoded: &[u8]) -> Result<(), RespError> {
        if let Err(e) = self.stream.write_all(encoded).await {
            self.state = ConnectionState::Failed;
            return Err(e.into());
        }
        if !self.batching {
            if let Err(e) = self.stream.flush().await {
                self.state = ConnectionState::Failed;
                return Err(e.into());
            }
        }
        Ok(())
    }

    pub async fn write_command<'a, I>(&mut self, token: &[u8], args: I) -> Result<(), RespError>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut buf = BytesMut::new();
        writer::write_command(&mut buf, token, args);
        self.write_frame(&buf).await
    }

    /// Reads a single decoded `Value` from the stream, buffering across partial reads
    /// exactly like the teacher's `read_frame`/`parse_frame` pair: try to decode what's
    /// already buffered, and only read more off the socket on `Incomplete`.
    pub async fn read_frame(&mut self) -> Result<Option<Value>, RespError> {
        loop {
            if let Some(value) = self.try_parse()? {
                return Ok(Some(value));
            }

            if 0 == self.stream.read_buf(&mut self.read_buffer).await.map_err(|e| {
                self.state = ConnectionState::Failed;
                RespError::from(e)
            })? {
                if self.read_buffer.is_empty() {
                    return Ok(None);
                } else {
                    self.state = ConnectionState::Failed;
                    return Err(RespError::Protocol(
                        "connection reset by peer mid-frame".into(),
                    ));
                }
            }
        }
    }

    fn try_parse(&mut self) -> Result<Option<Value>, RespError> {
        match reader::check(&self.read_buffer[..], self.limits) {
            Ok(consumed) => {
                let frame_bytes: Bytes = self.read_buffer.split_to(consumed).freeze();
                match reader::parse(&frame_bytes, self.limits) {
                    Ok(value) => Ok(Some(value)),
                    Err(e) => {
                        self.state = ConnectionState::Failed;
                        Err(e.into())
                    }
                }
            }
            Err(ReaderError::Incomplete) => Ok(None),
            Err(e) => {
                self.state = ConnectionState::Failed;
                Err(e.into())
            }
        }
    }

    pub async fn close(&mut self) -> Result<(), RespError> {
        self.state = ConnectionState::Closed;
        self.stream.shutdown().await.map_err(RespError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_back() {
        let (client, mut server) = tokio::io::duplex(4096);
        let mut conn = Connection::new(client);

        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let n = tokio::io::AsyncReadExt::read(&mut server, &mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"*1\r\n$4\r\nPING\r\n");
            tokio::io::AsyncWriteExt::write_all(&mut server, b"+PONG\r\n").await.unwrap();
        });

        conn.write_command(b"PING", std::iter::empty()).await.unwrap();
        let reply = conn.read_frame().await.unwrap().unwrap();
        assert_eq!(reply, Value::simple_string(&b"PONG"[..]));
    }

    #[tokio::test]
    async fn clean_close_returns_none() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let mut conn: Connection<_> = Connection::new(client);
        assert_eq!(conn.read_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn batching_defers_flush_until_end_batch() {
        let (client, mut server) = tokio::io::duplex(4096);
        let mut conn = Connection::new(client);
        conn.begin_batch();
        conn.write_command(b"PING", std::iter::empty()).await.unwrap();
        conn.write_command(b"PING", std::iter::empty()).await.unwrap();
        conn.end_batch().await.unwrap();

        let mut buf = [0u8; 64];
        let n = tokio::io::AsyncReadExt::read(&mut server, &mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n");
    }
}
