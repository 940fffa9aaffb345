//! Request/reply connection over a framed transport.

use driftdb_protocol::{Request, Response};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::codec::LineCodec;
use crate::error::CodecError;

/// A framed protocol connection.
///
/// Every call to [`exchange`](Self::exchange) writes one request line and
/// reads exactly one response line. Taking `&mut self` means a second request
/// cannot be issued until the previous reply has been consumed.
pub struct Connection<T> {
    framed: Framed<T, LineCodec<Response>>,
    exchanges: u64,
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a transport with the default line length limit.
    pub fn new(transport: T) -> Self {
        Self::with_codec(transport, LineCodec::new())
    }

    /// Wrap a transport with a custom line length limit.
    pub fn with_max_line_length(transport: T, max_length: usize) -> Self {
        Self::with_codec(transport, LineCodec::with_max_length(max_length))
    }

    fn with_codec(transport: T, codec: LineCodec<Response>) -> Self {
        Self {
            framed: Framed::new(transport, codec),
            exchanges: 0,
        }
    }

    /// Send a request and wait for its response.
    ///
    /// A reply line that cannot be decoded fails this exchange only; the
    /// line is consumed and the connection stays aligned for the next one.
    pub async fn exchange(&mut self, request: &Request) -> Result<Response, CodecError> {
        self.framed.send(request).await?;
        let reply = self
            .framed
            .next()
            .await
            .ok_or(CodecError::ConnectionClosed)??;

        self.exchanges += 1;
        tracing::trace!(exchanges = self.exchanges, ok = reply.is_ok(), "exchange complete");
        reply
    }

    /// Number of completed exchanges.
    #[must_use]
    pub fn exchange_count(&self) -> u64 {
        self.exchanges
    }

    /// Flush pending output and shut down the write half of the transport.
    pub async fn close(&mut self) -> Result<(), CodecError> {
        SinkExt::<&Request>::close(&mut self.framed).await
    }

    /// Get a reference to the underlying transport.
    pub fn get_ref(&self) -> &T {
        self.framed.get_ref()
    }

    /// Consume the connection, returning the underlying transport.
    pub fn into_inner(self) -> T {
        self.framed.into_inner()
    }
}

impl<T> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("exchanges", &self.exchanges)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use driftdb_protocol::Value;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn test_exchange_round_trip() {
        let (client, server) = tokio::io::duplex(1024);
        let server = tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut lines = BufReader::new(read).lines();
            let line = lines.next_line().await.unwrap().unwrap();
            let request: Request = serde_json::from_str(&line).unwrap();
            assert_eq!(request.params, vec![Value::Int(7)]);
            write
                .write_all(b"{\"type\":\"result\",\"columns\":[\"n\"],\"rows\":[{\"n\":7}]}\n")
                .await
                .unwrap();
        });

        let mut conn = Connection::new(client);
        let response = conn
            .exchange(&Request::query("SELECT ?", vec![Value::Int(7)]))
            .await
            .unwrap();
        match response {
            Response::Result(r) => assert_eq!(r.columns, vec!["n"]),
            other => panic!("expected result, got {other:?}"),
        }
        assert_eq!(conn.exchange_count(), 1);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_exchange_server_hangs_up() {
        let (client, server) = tokio::io::duplex(1024);
        let server = tokio::spawn(async move {
            let (read, _write) = tokio::io::split(server);
            let mut lines = BufReader::new(read).lines();
            let _ = lines.next_line().await.unwrap();
        });

        let mut conn = Connection::new(client);
        let err = conn
            .exchange(&Request::query("SELECT 1", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::ConnectionClosed | CodecError::Io(_)
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_reply_keeps_connection_aligned() {
        let (client, server) = tokio::io::duplex(1024);
        tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut lines = BufReader::new(read).lines();
            while let Some(line) = lines.next_line().await.unwrap() {
                let request: Request = serde_json::from_str(&line).unwrap();
                let reply = if request.query == "BAD" {
                    "not json\n".to_string()
                } else {
                    format!(
                        "{{\"type\":\"result\",\"columns\":[\"q\"],\"rows\":[{{\"q\":\"{}\"}}]}}\n",
                        request.query
                    )
                };
                write.write_all(reply.as_bytes()).await.unwrap();
            }
        });

        let mut conn = Connection::new(client);
        let err = conn
            .exchange(&Request::query("BAD", vec![]))
            .await
            .unwrap_err();
        assert!(err.is_decode_error());

        for query in ["A", "B"] {
            match conn.exchange(&Request::query(query, vec![])).await.unwrap() {
                Response::Result(r) => assert_eq!(r.rows[0]["q"], Value::from(query)),
                other => panic!("expected result, got {other:?}"),
            }
        }
        assert_eq!(conn.exchange_count(), 3);
    }

    #[tokio::test]
    async fn test_error_response_is_not_a_codec_error() {
        let (client, server) = tokio::io::duplex(1024);
        tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut lines = BufReader::new(read).lines();
            while lines.next_line().await.unwrap().is_some() {
                write
                    .write_all(b"{\"type\":\"error\",\"message\":\"no such table\"}\n")
                    .await
                    .unwrap();
            }
        });

        let mut conn = Connection::new(client);
        for _ in 0..2 {
            let response = conn
                .exchange(&Request::query("SELECT * FROM nope", vec![]))
                .await
                .unwrap();
            assert!(matches!(response, Response::Error(e) if e.message == "no such table"));
        }
    }
}
