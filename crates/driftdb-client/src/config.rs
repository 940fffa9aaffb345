//! Client configuration.

use std::time::Duration;

use driftdb_codec::DEFAULT_MAX_LINE_LENGTH;
use driftdb_pool::PoolConfig;

use crate::error::{Error, Result};

/// URL scheme accepted in front of an address.
const SCHEME: &str = "driftdb://";

/// Configuration for connecting to a DriftDB server.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Server host name or IP address.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Connections opened when the client starts.
    pub min_connections: u32,

    /// Upper bound on live connections.
    pub max_connections: u32,

    /// Time allowed to establish one connection.
    pub connect_timeout: Duration,

    /// How long an acquire waits for an idle connection before opening one.
    pub idle_poll_interval: Duration,

    /// Deadline applied to queries that don't pass their own.
    pub command_timeout: Option<Duration>,

    /// Longest response line accepted from the server.
    pub max_line_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        let pool = PoolConfig::default();
        Self {
            host: "localhost".into(),
            port: 5433,
            min_connections: pool.min_connections,
            max_connections: pool.max_connections,
            connect_timeout: pool.connection_timeout,
            idle_poll_interval: pool.idle_poll_interval,
            command_timeout: None,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `host:port` address.
    ///
    /// Accepts an optional `driftdb://` prefix, a trailing `/`, and bracketed
    /// IPv6 literals such as `[::1]:5433`.
    pub fn from_address(address: &str) -> Result<Self> {
        let (host, port) = parse_address(address)?;
        Ok(Self::default().host(host).port(port))
    }

    /// Set the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the number of connections opened at startup.
    #[must_use]
    pub fn min_connections(mut self, count: u32) -> Self {
        self.min_connections = count;
        self
    }

    /// Set the maximum number of live connections.
    #[must_use]
    pub fn max_connections(mut self, count: u32) -> Self {
        self.max_connections = count;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the idle poll interval used by pool acquisition.
    #[must_use]
    pub fn idle_poll_interval(mut self, interval: Duration) -> Self {
        self.idle_poll_interval = interval;
        self
    }

    /// Set the default command timeout.
    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Set the maximum accepted response line length.
    #[must_use]
    pub fn max_line_length(mut self, length: usize) -> Self {
        self.max_line_length = length;
        self
    }

    /// The `host:port` this configuration points at.
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Pool settings derived from this configuration.
    #[must_use]
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new()
            .min_connections(self.min_connections)
            .max_connections(self.max_connections)
            .connection_timeout(self.connect_timeout)
            .idle_poll_interval(self.idle_poll_interval)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::InvalidAddress("host must not be empty".into()));
        }
        if self.max_line_length == 0 {
            return Err(Error::Config("max_line_length must be greater than 0".into()));
        }
        self.pool_config().validate::<Error>()?;
        Ok(())
    }
}

fn parse_address(address: &str) -> Result<(String, u16)> {
    let trimmed = address.trim();
    let rest = trimmed.strip_prefix(SCHEME).unwrap_or(trimmed);
    let rest = rest.strip_suffix('/').unwrap_or(rest);

    let invalid = || Error::InvalidAddress(format!("expected host:port, got {address:?}"));

    let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
        let (host, tail) = bracketed.split_once(']').ok_or_else(invalid)?;
        let port = tail.strip_prefix(':').ok_or_else(invalid)?;
        (host, port)
    } else {
        let (host, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
        if host.contains(':') {
            // Unbracketed IPv6 literal; the port boundary is ambiguous.
            return Err(invalid());
        }
        (host, port)
    };

    if host.is_empty() {
        return Err(invalid());
    }
    let port = port
        .parse::<u16>()
        .map_err(|e| Error::InvalidAddress(format!("invalid port in {address:?}: {e}")))?;

    Ok((host.to_string(), port))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.address(), "localhost:5433");
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.command_timeout.is_none());
        assert_eq!(config.max_line_length, DEFAULT_MAX_LINE_LENGTH);
    }

    #[test]
    fn test_parse_host_port() {
        let config = Config::from_address("db.internal:6000").unwrap();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6000);
    }

    #[test]
    fn test_parse_with_scheme() {
        let config = Config::from_address("driftdb://127.0.0.1:5433/").unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5433);
    }

    #[test]
    fn test_parse_ipv6() {
        let config = Config::from_address("[::1]:5433").unwrap();
        assert_eq!(config.host, "::1");
        assert_eq!(config.address(), "[::1]:5433");
    }

    #[test]
    fn test_parse_rejects_bad_addresses() {
        for address in ["localhost", ":5433", "localhost:", "localhost:99999", "::1:5433", "[::1]"] {
            let err = Config::from_address(address).unwrap_err();
            assert!(matches!(err, Error::InvalidAddress(_)), "{address}: {err}");
        }
    }

    #[test]
    fn test_config_builder_methods() {
        let config = Config::new()
            .host("example")
            .port(1)
            .min_connections(0)
            .max_connections(3)
            .connect_timeout(Duration::from_secs(2))
            .idle_poll_interval(Duration::from_millis(10))
            .command_timeout(Duration::from_secs(5))
            .max_line_length(1024);

        let pool = config.pool_config();
        assert_eq!(pool.min_connections, 0);
        assert_eq!(pool.max_connections, 3);
        assert_eq!(pool.connection_timeout, Duration::from_secs(2));
        assert_eq!(pool.idle_poll_interval, Duration::from_millis(10));
        assert_eq!(config.command_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.max_line_length, 1024);
    }

    #[test]
    fn test_validate() {
        assert!(Config::new().validate().is_ok());
        assert!(matches!(
            Config::new().min_connections(5).max_connections(2).validate(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::new().max_line_length(0).validate(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::new().host("").validate(),
            Err(Error::InvalidAddress(_))
        ));
    }
}
