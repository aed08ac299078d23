use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::types::ConnectionKey;

/// Keyed pool of live protocol connections.
///
/// Handlers borrow one connection per retrieval and hand it back through
/// [`release`](ConnectionPool::release) when it can be reused, or through
/// [`discard`](ConnectionPool::discard) when its state is unknown.
#[async_trait]
pub trait ConnectionPool: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Hands out a connection for `key`, waiting while one is being established
    async fn borrow(&self, key: &ConnectionKey) -> Result<Self::Connection, PoolError>;

    /// Returns a healthy connection to the pool
    fn release(&self, key: &ConnectionKey, connection: Self::Connection);

    /// Takes a connection out of circulation
    fn discard(&self, key: &ConnectionKey, connection: Self::Connection) {
        debug!("Discarding connection for {}", key);
        drop(connection);
    }
}

/// Opens and checks connections for a [`KeyedPool`]
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    type Connection: Send + 'static;

    async fn connect(&self, key: &ConnectionKey) -> Result<Self::Connection, anyhow::Error>;

    /// Checks an idle connection before it is handed out again
    async fn validate(&self, _connection: &mut Self::Connection) -> bool {
        true
    }
}

struct IdleConnection<C> {
    connection: C,
    idle_since: Instant,
}

/// [`ConnectionPool`] keeping a stack of idle connections per key.
///
/// A borrow reuses the most recently released connection that is neither
/// expired nor rejected by [`ConnectionFactory::validate`], and opens a new one
/// through the factory otherwise.
pub struct KeyedPool<F: ConnectionFactory> {
    factory: F,
    config: PoolConfig,
    idle: Mutex<HashMap<ConnectionKey, Vec<IdleConnection<F::Connection>>>>,
}

impl<F: ConnectionFactory> KeyedPool<F> {
    pub fn new(factory: F, config: PoolConfig) -> Self {
        Self {
            factory,
            config,
            idle: Mutex::new(HashMap::new()),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Number of idle connections currently held for `key`
    pub fn idle_count(&self, key: &ConnectionKey) -> usize {
        self.lock_idle().get(key).map_or(0, Vec::len)
    }

    /// Closes every idle connection
    pub fn clear(&self) {
        let drained: Vec<_> = self.lock_idle().drain().collect();
        let count: usize = drained.iter().map(|(_, idle)| idle.len()).sum();
        info!("Closing {} idle connections", count);
    }

    fn lock_idle(&self) -> MutexGuard<'_, HashMap<ConnectionKey, Vec<IdleConnection<F::Connection>>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_idle(&self, key: &ConnectionKey) -> Option<F::Connection> {
        let mut idle = self.lock_idle();
        let stack = idle.get_mut(key)?;
        let mut found = None;
        while let Some(entry) = stack.pop() {
            if entry.idle_since.elapsed() < self.config.idle_timeout {
                found = Some(entry.connection);
                break;
            }
            debug!("Closing expired idle connection for {}", key);
        }
        if stack.is_empty() {
            idle.remove(key);
        }
        found
    }
}

#[async_trait]
impl<F: ConnectionFactory> ConnectionPool for KeyedPool<F> {
    type Connection = F::Connection;

    async fn borrow(&self, key: &ConnectionKey) -> Result<Self::Connection, PoolError> {
        while let Some(mut connection) = self.take_idle(key) {
            if self.factory.validate(&mut connection).await {
                debug!("Reusing idle connection for {}", key);
                return Ok(connection);
            }
            warn!("Idle connection for {} failed validation, closing it", key);
        }

        debug!("Opening new connection for {}", key);
        match tokio::time::timeout(self.config.connect_timeout, self.factory.connect(key)).await {
            Ok(Ok(connection)) => Ok(connection),
            Ok(Err(e)) => Err(PoolError::Connect(e)),
            Err(_) => Err(PoolError::Timeout(self.config.connect_timeout)),
        }
    }

    fn release(&self, key: &ConnectionKey, connection: Self::Connection) {
        let mut idle = self.lock_idle();
        let stack = idle.entry(key.clone()).or_default();
        if stack.len() < self.config.max_idle_per_key {
            stack.push(IdleConnection {
                connection,
                idle_since: Instant::now(),
            });
        } else {
            debug!("Idle limit reached for {}, closing released connection", key);
        }
    }
}
