//! Pool configuration.

use std::time::Duration;

use crate::error::PoolError;

/// Sizing and timing for a [`Pool`](crate::Pool).
///
/// Marked `#[non_exhaustive]`; build it from [`PoolConfig::new`] and the
/// setter methods.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Number of connections created by [`Pool::initialize`](crate::Pool::initialize).
    pub min_connections: u32,

    /// Upper bound on live connections, idle and checked out together.
    pub max_connections: u32,

    /// Time allowed to establish a single connection.
    pub connection_timeout: Duration,

    /// How long `acquire` waits for an idle connection before trying to
    /// create a new one.
    pub idle_poll_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 2,
            max_connections: 10,
            connection_timeout: Duration::from_secs(10),
            idle_poll_interval: Duration::from_secs(1),
        }
    }
}

impl PoolConfig {
    /// Defaults: 2 to 10 connections, 10 s connect timeout, 1 s idle poll.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how many connections `initialize` opens.
    #[must_use]
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Set the live connection ceiling.
    #[must_use]
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the per-connection establishment timeout.
    #[must_use]
    pub fn connection_timeout(mut self, limit: Duration) -> Self {
        self.connection_timeout = limit;
        self
    }

    /// Set the idle poll interval.
    #[must_use]
    pub fn idle_poll_interval(mut self, interval: Duration) -> Self {
        self.idle_poll_interval = interval;
        self
    }

    /// Reject a zero ceiling or a floor above the ceiling.
    pub fn validate<E>(&self) -> Result<(), PoolError<E>> {
        let (min, max) = (self.min_connections, self.max_connections);
        if max == 0 {
            return Err(PoolError::Configuration("max_connections is zero".into()));
        }
        if min > max {
            return Err(PoolError::Configuration(format!(
                "min_connections ({min}) exceeds max_connections ({max})"
            )));
        }
        Ok(())
    }
}
