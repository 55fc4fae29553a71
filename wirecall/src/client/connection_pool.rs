//! Bounded pooling of outbound connections to one server address.
//!
//! The pool is the sole owner of connection lifetime. Callers check a
//! connection out with [`ConnectionPool::acquire`] and hand it back with
//! [`ConnectionPool::release`]; dropping a checked-out connection instead of
//! releasing it closes the socket, which is exactly what a caller wants after
//! an io error or an abandoned wait.
//!
//! A semaphore holds one permit per capacity slot and every checked-out
//! connection carries its permit, so the pool can never have more live
//! connections than `max_connections`; an idle connection's slot is freed
//! when it is parked, strictly after it lands in the idle set, so a waiter
//! woken by the freed slot always finds it there.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;

use crate::error::{Error, Result};

/// Sizing and timing knobs for a [`ConnectionPool`].
#[derive(Debug, Clone)]
pub struct PoolConfiguration {
    /// Connections dialed eagerly when the pool is built.
    pub initial_connections: usize,
    /// Hard ceiling on live connections, checked-out and idle combined.
    pub max_connections: usize,
    /// Idle connections beyond this are closed on release instead of kept.
    pub max_idle_connections: usize,
    /// An idle connection unused for this long is closed and evicted rather
    /// than reused.
    pub idle_timeout: Duration,
    /// Bound on each dial attempt.
    pub dial_timeout: Duration,
    /// How long `acquire` waits for a capacity slot when the pool is
    /// exhausted. `None` blocks until a slot frees up.
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            initial_connections: 1,
            max_connections: 16,
            max_idle_connections: 8,
            idle_timeout: Duration::from_secs(60),
            dial_timeout: Duration::from_secs(5),
            acquire_timeout: None,
        }
    }
}

/// A bounded set of reusable connections to one fixed address.
#[derive(Debug)]
pub struct ConnectionPool {
    address: String,
    configuration: PoolConfiguration,
    capacity: Arc<Semaphore>,
    idle: Mutex<VecDeque<IdleConnection>>,
}

#[derive(Debug)]
struct IdleConnection {
    stream: TcpStream,
    idle_since: Instant,
}

/// A connection checked out of a [`ConnectionPool`].
///
/// Return it with [`ConnectionPool::release`] when the exchange succeeded;
/// drop it to discard the connection and free its capacity slot.
#[derive(Debug)]
pub struct PooledConnection {
    stream: TcpStream,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// The underlying stream, for framed reads and writes.
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }
}

impl ConnectionPool {
    /// Build a pool for `address`, eagerly dialing the configured initial
    /// connections.
    pub async fn connect(
        address: impl Into<String>,
        configuration: PoolConfiguration,
    ) -> Result<Self> {
        if configuration.max_connections == 0 {
            return Err(Error::Validation(
                "pool max_connections must be at least 1".to_string(),
            ));
        }
        if configuration.initial_connections > configuration.max_idle_connections {
            return Err(Error::Validation(
                "pool initial_connections must not exceed max_idle_connections".to_string(),
            ));
        }
        if configuration.initial_connections > configuration.max_connections {
            return Err(Error::Validation(
                "pool initial_connections must not exceed max_connections".to_string(),
            ));
        }
        let pool = Self {
            address: address.into(),
            capacity: Arc::new(Semaphore::new(configuration.max_connections)),
            idle: Mutex::new(VecDeque::new()),
            configuration,
        };
        for _ in 0..pool.configuration.initial_connections {
            let stream = pool.dial().await?;
            pool.park(stream);
        }
        Ok(pool)
    }

    /// The address this pool dials.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Check a connection out, reusing a fresh idle one when available and
    /// dialing otherwise. Blocks (or fails, per `acquire_timeout`) when the
    /// pool is exhausted and at capacity.
    pub async fn acquire(&self) -> Result<PooledConnection> {
        let capacity = Arc::clone(&self.capacity);
        let permit = match self.configuration.acquire_timeout {
            Some(wait) => timeout(wait, capacity.acquire_owned())
                .await
                .map_err(|_elapsed| {
                    Error::Connection(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "connection pool exhausted",
                    ))
                })?,
            None => capacity.acquire_owned().await,
        }
        .expect("pool semaphore is never closed");

        if let Some(stream) = self.take_idle() {
            return Ok(PooledConnection {
                stream,
                _permit: permit,
            });
        }
        // dial failure drops the permit, freeing the slot for the next caller
        let stream = self.dial().await?;
        Ok(PooledConnection {
            stream,
            _permit: permit,
        })
    }

    /// Return a healthy connection to the idle set, or close it when the
    /// idle set is full. The capacity slot is freed either way.
    pub fn release(&self, connection: PooledConnection) {
        let PooledConnection { stream, _permit } = connection;
        self.park(stream);
        // _permit drops here, after the stream is parked
    }

    /// Close a connection that should not be reused. Equivalent to dropping
    /// it; the explicit name reads better at call sites.
    pub fn discard(&self, connection: PooledConnection) {
        drop(connection);
    }

    /// How many connections are currently parked idle.
    pub fn idle_connections(&self) -> usize {
        self.idle.lock().expect("pool mutex must not be poisoned").len()
    }

    fn park(&self, stream: TcpStream) {
        let mut idle = self.idle.lock().expect("pool mutex must not be poisoned");
        if idle.len() < self.configuration.max_idle_connections {
            idle.push_back(IdleConnection {
                stream,
                idle_since: Instant::now(),
            });
        } else {
            log::debug!("idle set full, closing released connection to {}", self.address);
        }
    }

    fn take_idle(&self) -> Option<TcpStream> {
        let mut idle = self.idle.lock().expect("pool mutex must not be poisoned");
        while let Some(connection) = idle.pop_front() {
            if connection.idle_since.elapsed() < self.configuration.idle_timeout {
                return Some(connection.stream);
            }
            log::debug!("evicting idle connection past its idle timeout");
        }
        None
    }

    async fn dial(&self) -> Result<TcpStream> {
        match timeout(
            self.configuration.dial_timeout,
            TcpStream::connect(self.address.as_str()),
        )
        .await
        {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    log::warn!("could not set nodelay: {e:?}");
                }
                Ok(stream)
            }
            Ok(Err(e)) => Err(Error::Connection(e)),
            Err(_elapsed) => Err(Error::Connection(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("dialing {} timed out", self.address),
            ))),
        }
    }
}
