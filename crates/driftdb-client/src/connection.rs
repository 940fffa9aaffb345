//! Transport connections and the pool manager that creates them.

use std::time::Duration;

use driftdb_codec::{Connection, DEFAULT_MAX_LINE_LENGTH};
use driftdb_pool::ManageConnection;
use driftdb_protocol::{Request, Response, Value};
use tokio::net::TcpStream;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::result::QueryResult;

/// Link state of a [`TransportConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Never connected.
    Unconnected,
    /// Ready for exchanges.
    Connected,
    /// Closed; may be connected again.
    Closed,
}

/// One physical link to a DriftDB server.
///
/// A connection carries at most one request at a time: [`execute`](Self::execute)
/// takes `&mut self` and returns only after the reply has been read.
pub struct TransportConnection {
    host: String,
    port: u16,
    max_line_length: usize,
    link: Option<Connection<TcpStream>>,
    state: LinkState,
    /// Set while a request is written but its reply not yet read.
    mid_exchange: bool,
}

impl TransportConnection {
    /// Create an unconnected transport for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            link: None,
            state: LinkState::Unconnected,
            mid_exchange: false,
        }
    }

    /// Set the maximum accepted response line length.
    #[must_use]
    pub fn with_max_line_length(mut self, length: usize) -> Self {
        self.max_line_length = length;
        self
    }

    /// Server host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Current link state.
    #[must_use]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Whether the link is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Whether an exchange was abandoned before its reply was read.
    ///
    /// Such a connection has a stale reply in flight and must not be reused.
    #[must_use]
    pub fn is_mid_exchange(&self) -> bool {
        self.mid_exchange
    }

    /// Establish the link.
    ///
    /// Does nothing if already connected. Fails with
    /// [`Error::ConnectionTimeout`] if the TCP connect does not finish within
    /// `timeout`, and with [`Error::Connection`] on any transport error.
    pub async fn connect(&mut self, timeout: Duration) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        tracing::debug!(host = %self.host, port = self.port, "establishing TCP connection");
        let stream = tokio::time::timeout(
            timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| Error::ConnectionTimeout(timeout))?
        .map_err(|e| Error::Connection(format!("{}:{}: {e}", self.host, self.port)))?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY");
        }

        self.link = Some(Connection::with_max_line_length(stream, self.max_line_length));
        self.state = LinkState::Connected;
        self.mid_exchange = false;
        Ok(())
    }

    /// Send one query and wait for its reply.
    ///
    /// An error reply becomes [`Error::Server`] (or
    /// [`Error::Authentication`]); an undecodable reply becomes
    /// [`Error::Decode`] and leaves the link usable. Any other transport
    /// fault becomes [`Error::Transport`] and closes the link, so later
    /// calls fail with [`Error::NotConnected`].
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        if self.mid_exchange {
            return Err(Error::Transport(
                "previous exchange was abandoned before its reply".into(),
            ));
        }
        let link = match (&mut self.link, self.state) {
            (Some(link), LinkState::Connected) => link,
            _ => return Err(Error::NotConnected),
        };

        let request = Request::query(sql, params.to_vec());
        self.mid_exchange = true;
        let response = link.exchange(&request).await;
        self.mid_exchange = false;

        match response {
            Ok(Response::Result(result)) => Ok(QueryResult::from(result)),
            Ok(Response::Error(error)) => Err(error.into()),
            Err(e) if e.is_decode_error() => Err(e.into()),
            Err(e) => {
                tracing::debug!(error = %e, "transport fault; closing link");
                self.link = None;
                self.state = LinkState::Closed;
                Err(e.into())
            }
        }
    }

    /// Close the link.
    ///
    /// Idempotent and never fails; shutdown errors are logged.
    pub async fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.close().await {
                tracing::debug!(error = %e, "error while closing connection");
            }
        }
        self.state = LinkState::Closed;
        self.mid_exchange = false;
    }
}

impl std::fmt::Debug for TransportConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Creates [`TransportConnection`]s for the pool.
#[derive(Debug, Clone)]
pub struct TransportManager {
    host: String,
    port: u16,
    connect_timeout: Duration,
    max_line_length: usize,
}

impl TransportManager {
    /// Create a manager from client configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            connect_timeout: config.connect_timeout,
            max_line_length: config.max_line_length,
        }
    }
}

#[async_trait::async_trait]
impl ManageConnection for TransportManager {
    type Connection = TransportConnection;
    type Error = Error;

    async fn connect(&self) -> Result<TransportConnection> {
        let mut conn = TransportConnection::new(self.host.clone(), self.port)
            .with_max_line_length(self.max_line_length);
        conn.connect(self.connect_timeout).await?;
        Ok(conn)
    }

    async fn close(&self, mut conn: TransportConnection) -> Result<()> {
        conn.close().await;
        Ok(())
    }
}
