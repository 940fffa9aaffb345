//! Mock DriftDB server for unit testing.
//!
//! The server accepts any number of connections and treats each one as a
//! strict request/reply stream: it reads a request line, looks up a
//! [`MockResponse`], and writes exactly one reply line (unless the response
//! says otherwise).
//!
//! Lookup order for each request:
//!
//! 1. The custom handler, if one is installed and it returns `Some`.
//! 2. A response registered for the exact SQL text.
//! 3. The default response (an empty result unless overridden).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use driftdb_codec::{CodecError, LineCodec};
use driftdb_protocol::{QueryResponse, Request, Response, RowObject, ServerError, Value};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::codec::Framed;

/// Error type for mock server operations.
#[derive(Debug, Error)]
pub enum MockServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing or decoding error on a client connection.
    #[error("protocol error: {0}")]
    Codec(#[from] CodecError),
}

/// Result type for mock server operations.
pub type Result<T> = std::result::Result<T, MockServerError>;

type Handler = dyn Fn(&Request) -> Option<MockResponse> + Send + Sync;

/// Mock response configuration.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// A successful result set.
    Rows {
        /// Column names in order.
        columns: Vec<String>,
        /// Row values, positionally matching `columns`.
        rows: Vec<Vec<Value>>,
    },

    /// An error reply.
    Error {
        /// Error message.
        message: String,
        /// Optional SQLSTATE-style code.
        code: Option<String>,
    },

    /// Write this text verbatim, followed by a newline.
    Raw(String),

    /// Read the request but never reply.
    NoReply,

    /// Close the connection without replying.
    Disconnect,

    /// Send `response` after an extra pause.
    Delayed {
        /// Pause before replying.
        delay: Duration,
        /// The reply itself.
        response: Box<MockResponse>,
    },
}

impl MockResponse {
    /// A single row with a single column.
    pub fn scalar(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Rows {
            columns: vec![column.into()],
            rows: vec![vec![value.into()]],
        }
    }

    /// A single integer cell.
    pub fn scalar_int(column: impl Into<String>, value: i64) -> Self {
        Self::scalar(column, value)
    }

    /// An empty result with no columns.
    pub fn empty() -> Self {
        Self::Rows {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// A result set.
    pub fn rows<C: Into<String>>(columns: Vec<C>, rows: Vec<Vec<Value>>) -> Self {
        Self::Rows {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    /// An error reply without a code.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            code: None,
        }
    }

    /// An error reply with a SQLSTATE-style code.
    pub fn error_with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// An invalid-authorization error (SQLSTATE class 28).
    pub fn auth_failure(message: impl Into<String>) -> Self {
        Self::error_with_code("28000", message)
    }

    /// Hold this reply back for `delay`.
    #[must_use]
    pub fn after(self, delay: Duration) -> Self {
        Self::Delayed {
            delay,
            response: Box::new(self),
        }
    }

    /// A line that is not valid JSON.
    pub fn malformed() -> Self {
        Self::Raw("{this is not json".into())
    }

    fn to_response(&self) -> Option<Response> {
        match self {
            Self::Rows { columns, rows } => {
                let rows = rows
                    .iter()
                    .map(|values| {
                        columns
                            .iter()
                            .cloned()
                            .zip(values.iter().cloned())
                            .collect::<RowObject>()
                    })
                    .collect();
                Some(Response::Result(QueryResponse {
                    columns: columns.clone(),
                    rows,
                    execution_time_ms: Some(0.1),
                }))
            }
            Self::Error { message, code } => {
                let mut error = ServerError::new(message.clone());
                error.code = code.clone();
                Some(Response::Error(error))
            }
            Self::Delayed { response, .. } => response.to_response(),
            Self::Raw(_) | Self::NoReply | Self::Disconnect => None,
        }
    }
}

/// Configuration for the mock server.
struct MockServerConfig {
    /// Pre-configured responses for specific SQL queries.
    responses: HashMap<String, MockResponse>,
    /// Response for unmatched queries.
    default_response: MockResponse,
    /// Computes responses dynamically; `None` falls through to the table.
    handler: Option<Box<Handler>>,
    /// Delay before every reply.
    delay: Option<Duration>,
}

impl MockServerConfig {
    fn respond_to(&self, request: &Request) -> MockResponse {
        if let Some(response) = self.handler.as_ref().and_then(|h| h(request)) {
            return response;
        }
        self.responses
            .get(&request.query)
            .unwrap_or(&self.default_response)
            .clone()
    }
}

/// Builder for [`MockServer`].
pub struct MockServerBuilder {
    config: MockServerConfig,
}

impl MockServerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: MockServerConfig {
                responses: HashMap::new(),
                default_response: MockResponse::empty(),
                handler: None,
                delay: None,
            },
        }
    }

    /// Add a response for a specific SQL query.
    pub fn with_response(mut self, sql: impl Into<String>, response: MockResponse) -> Self {
        self.config.responses.insert(sql.into(), response);
        self
    }

    /// Set the default response for unmatched queries.
    pub fn with_default_response(mut self, response: MockResponse) -> Self {
        self.config.default_response = response;
        self
    }

    /// Install a handler consulted before the response table.
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Request) -> Option<MockResponse> + Send + Sync + 'static,
    {
        self.config.handler = Some(Box::new(handler));
        self
    }

    /// Delay every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.config.delay = Some(delay);
        self
    }

    /// Build and start the mock server.
    pub async fn build(self) -> Result<MockServer> {
        MockServer::start(self.config).await
    }
}

impl Default for MockServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared between the server handle and its connection tasks.
#[derive(Default)]
struct Shared {
    requests: Mutex<Vec<Request>>,
    open: AtomicUsize,
    accepted: AtomicUsize,
}

/// A mock DriftDB server for testing.
///
/// Stopping (or dropping) the server closes the listener and every open
/// connection.
pub struct MockServer {
    /// Server address.
    addr: SocketAddr,
    /// Shutdown signal sender.
    shutdown_tx: broadcast::Sender<()>,
    shared: Arc<Shared>,
}

impl MockServer {
    /// Create a new builder for the mock server.
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::new()
    }

    async fn start(config: MockServerConfig) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, _) = broadcast::channel(1);
        let config = Arc::new(config);
        let shared = Arc::new(Shared::default());

        let server = Self {
            addr,
            shutdown_tx: shutdown_tx.clone(),
            shared: Arc::clone(&shared),
        };

        // Spawn the accept loop
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _peer_addr)) => {
                                let config = Arc::clone(&config);
                                let shared = Arc::clone(&shared);
                                let shutdown_rx = shutdown_tx.subscribe();
                                shared.accepted.fetch_add(1, Ordering::SeqCst);
                                shared.open.fetch_add(1, Ordering::SeqCst);
                                tokio::spawn(async move {
                                    if let Err(e) =
                                        handle_connection(stream, &config, &shared, shutdown_rx).await
                                    {
                                        tracing::debug!(error = %e, "mock connection error");
                                    }
                                    shared.open.fetch_sub(1, Ordering::SeqCst);
                                });
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "accept error");
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Ok(server)
    }

    /// Get the server's listening address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the address as a `host:port` string.
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Get the host string for connection configuration.
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Get the port number.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Number of connections currently open.
    pub fn connection_count(&self) -> usize {
        self.shared.open.load(Ordering::SeqCst)
    }

    /// Number of connections accepted since start.
    pub fn total_connections(&self) -> usize {
        self.shared.accepted.load(Ordering::SeqCst)
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<Request> {
        self.shared.requests.lock().clone()
    }

    /// The SQL text of every request received so far.
    pub fn queries(&self) -> Vec<String> {
        self.shared
            .requests
            .lock()
            .iter()
            .map(|r| r.query.clone())
            .collect()
    }

    /// How many times exactly `sql` was received.
    pub fn query_count(&self, sql: &str) -> usize {
        self.shared
            .requests
            .lock()
            .iter()
            .filter(|r| r.query == sql)
            .count()
    }

    /// Forget all recorded requests.
    pub fn clear_requests(&self) {
        self.shared.requests.lock().clear();
    }

    /// Stop the server.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for MockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockServer")
            .field("addr", &self.addr)
            .field("open", &self.connection_count())
            .finish_non_exhaustive()
    }
}

/// Handle a single client connection.
async fn handle_connection(
    stream: TcpStream,
    config: &MockServerConfig,
    shared: &Shared,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let mut framed = Framed::new(stream, LineCodec::<Request>::new());

    loop {
        let request = tokio::select! {
            next = framed.next() => match next {
                Some(request) => request??,
                // Client disconnected
                None => break,
            },
            _ = shutdown_rx.recv() => break,
        };

        tracing::trace!(query = %request.query, "mock server received request");
        shared.requests.lock().push(request.clone());

        let mut reply = config.respond_to(&request);
        let mut pause = config.delay.unwrap_or_default();
        while let MockResponse::Delayed { delay, response } = reply {
            pause += delay;
            reply = *response;
        }
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        match reply {
            MockResponse::NoReply => {}
            MockResponse::Disconnect => break,
            MockResponse::Raw(line) => {
                let stream = framed.get_mut();
                stream.write_all(line.as_bytes()).await?;
                stream.write_all(b"\n").await?;
                stream.flush().await?;
            }
            other => {
                if let Some(response) = other.to_response() {
                    framed.send(&response).await?;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_response_keys_by_column() {
        let response = MockResponse::rows(
            vec!["id", "name"],
            vec![vec![Value::Int(1), Value::from("alice")]],
        );
        match response.to_response() {
            Some(Response::Result(result)) => {
                assert_eq!(result.columns, vec!["id", "name"]);
                assert_eq!(result.rows[0]["name"], Value::from("alice"));
            }
            other => panic!("expected result, got {other:?}"),
        }
    }

    #[test]
    fn test_delayed_reply_wraps_inner_response() {
        let delayed = MockResponse::scalar_int("n", 1).after(Duration::from_millis(5));
        assert!(matches!(
            delayed,
            MockResponse::Delayed { delay, .. } if delay == Duration::from_millis(5)
        ));
        assert_eq!(
            delayed.to_response(),
            MockResponse::scalar_int("n", 1).to_response()
        );
    }

    #[test]
    fn test_auth_failure_is_class_28() {
        match MockResponse::auth_failure("bad password").to_response() {
            Some(Response::Error(e)) => assert!(e.is_authentication_failure()),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn test_handler_takes_precedence() {
        let config = MockServerBuilder::new()
            .with_response("SELECT 1", MockResponse::scalar_int("n", 1))
            .with_handler(|req| {
                (req.params.len() == 1).then(|| MockResponse::scalar("echo", req.params[0].clone()))
            })
            .config;

        let plain = config.respond_to(&Request::query("SELECT 1", vec![]));
        assert!(matches!(plain, MockResponse::Rows { ref columns, .. } if columns == &["n"]));

        let echoed = config.respond_to(&Request::query("SELECT 1", vec![Value::Int(9)]));
        assert!(matches!(echoed, MockResponse::Rows { ref columns, .. } if columns == &["echo"]));

        let fallback = config.respond_to(&Request::query("SELECT 2", vec![]));
        assert!(matches!(fallback, MockResponse::Rows { ref rows, .. } if rows.is_empty()));
    }
}
