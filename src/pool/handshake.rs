// ABOUTME: HELLO/AUTH/SELECT negotiation run once per connection at pool-fill time

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::RespError;
use crate::resp::value::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

/// Which reply shapes a connection may legally produce, decided once at handshake time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    Resp2,
    Resp3,
}

/// Runs `HELLO`/`AUTH`/`SELECT` on a freshly dialed connection, as described by the
/// "Protocol negotiation" / "Authentication" / "Database select" paragraphs of the
/// external interfaces: try `HELLO 3`, fall back to RESP2 on error, then authenticate
/// and select a database if configured.
pub async fn handshake<S>(
    conn: &mut Connection<S>,
    config: &ClientConfig,
) -> Result<ProtocolVersion, RespError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let version = if config.use_resp3 {
        negotiate_resp3(conn).await?
    } else {
        ProtocolVersion::Resp2
    };

    if let Some(creds) = &config.credentials {
        authenticate(conn, creds).await?;
    }

    if config.database != 0 {
        select_database(conn, config.database).await?;
    }

    Ok(version)
}

async fn negotiate_resp3<S>(conn: &mut Connection<S>) -> Result<ProtocolVersion, RespError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    conn.write_command(b"HELLO", [&b"3"[..]]).await?;
    match conn.read_frame().await? {
        Some(Value::Map(_)) => {
            debug!("negotiated RESP3");
            Ok(ProtocolVersion::Resp3)
        }
        Some(Value::Error(msg)) => {
            warn!(
                reason = %String::from_utf8_lossy(&msg),
                "HELLO 3 rejected by server, falling back to RESP2"
            );
            Ok(ProtocolVersion::Resp2)
        }
        Some(_) => Err(RespError::ProtocolViolation {
            expected: "map reply to HELLO".into(),
            actual: "other frame".into(),
        }),
        None => Err(RespError::Broken),
    }
}

async fn authenticate<S>(
    conn: &mut Connection<S>,
    creds: &crate::config::Credentials,
) -> Result<(), RespError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let password = creds.password.as_bytes();
    match &creds.username {
        Some(username) => {
            conn.write_command(b"AUTH", [username.as_bytes(), password]).await?;
        }
        None => {
            conn.write_command(b"AUTH", [password]).await?;
        }
    }
    expect_ok(conn).await
}

async fn select_database<S>(conn: &mut Connection<S>, database: u32) -> Result<(), RespError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let db = database.to_string();
    conn.write_command(b"SELECT", [db.as_bytes()]).await?;
    expect_ok(conn).await
}

async fn expect_ok<S>(conn: &mut Connection<S>) -> Result<(), RespError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    match conn.read_frame().await? {
        Some(Value::SimpleString(s)) if &s[..] == b"OK" => Ok(()),
        Some(Value::Error(msg)) => Err(RespError::ServerError(String::from_utf8_lossy(&msg).into_owned())),
        Some(_) => Err(RespError::ProtocolViolation {
            expected: "+OK".into(),
            actual: "other frame".into(),
        }),
        None => Err(RespError::Broken),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    #[tokio::test]
    async fn falls_back_to_resp2_on_hello_error() {
        let (client, mut server) = tokio::io::duplex(4096);
        let mut conn = Connection::new(client);
        let config = ClientConfig::new("127.0.0.1", 6379);

        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let n = tokio::io::AsyncReadExt::read(&mut server, &mut buf).await.unwrap();
            assert!(buf[..n].starts_with(b"*2\r\n$5\r\nHELLO\r\n"));
            tokio::io::AsyncWriteExt::write_all(&mut server, b"-ERR unknown command\r\n").await.unwrap();
        });

        let version = handshake(&mut conn, &config).await.unwrap();
        assert_eq!(version, ProtocolVersion::Resp2);
    }
}
