//! Client side: typed calls against one remote service endpoint.
//!
//! [`RpcClient::call`] performs the whole remote-call sequence for one rpc:
//! serialize the argument, frame a request, check a connection out of the
//! pool, write, read, decode, and translate the response into a
//! [`Reply`]. Applications wrap it in a hand-written (or generated) struct
//! with one async method per remote method, so call sites read like local
//! function calls:
//!
//! a `GreeterClient::greet(&self, options, &request)` simply delegates to
//! `self.inner.call("greeter", "greet", options, request)`. See the
//! example-greeter workspace member for the full pattern.

mod connection_pool;

pub use connection_pool::{ConnectionPool, PoolConfiguration, PooledConnection};

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::SystemTime;

use crate::call::{CallOptions, Reply};
use crate::error::{Error, Result, ServiceError};
use crate::frame::{read_frame, write_frame};
use crate::message::{self, Request, Response, PROTOCOL_VERSION};
use crate::serialize::{Encoding, Serializer};

/// A client for one remote endpoint, bound to one payload encoding.
///
/// Cheap to share behind an `Arc`; every call checks its own connection out
/// of the pool, so concurrent calls proceed on independent connections.
#[derive(Debug)]
pub struct RpcClient<S> {
    pool: ConnectionPool,
    serializer: S,
    next_request_id: AtomicU32,
}

impl<S: Encoding> RpcClient<S> {
    /// Build a client for `address`, eagerly dialing the pool's initial
    /// connections.
    pub async fn connect(
        address: impl Into<String>,
        serializer: S,
        configuration: PoolConfiguration,
    ) -> Result<Self> {
        Ok(Self {
            pool: ConnectionPool::connect(address, configuration).await?,
            serializer,
            next_request_id: AtomicU32::new(1),
        })
    }

    /// The pool backing this client.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Invoke `method` on the remote `service`.
    ///
    /// On success the reply carries the decoded result, the business error
    /// text the method returned, or both; an empty response body leaves the
    /// value absent. A oneway call writes the request and then always returns
    /// [`Error::OnewayResult`] without reading anything.
    pub async fn call<A, R>(
        &self,
        service: &str,
        method: &str,
        options: CallOptions,
        argument: &A,
    ) -> Result<Reply<R>>
    where
        S: Serializer<A> + Serializer<R>,
    {
        message::validate_identifier("service", service)?;
        message::validate_identifier("method", method)?;
        message::validate_meta(options.meta())?;

        let data = <S as Serializer<A>>::encode(&self.serializer, argument)?;
        let mut request = Request {
            request_id: self.next_request_id.fetch_add(1, Ordering::Relaxed),
            version: PROTOCOL_VERSION,
            serializer_code: self.serializer.code(),
            service_name: service.to_string(),
            method_name: method.to_string(),
            meta: options.wire_meta(),
            data,
            ..Default::default()
        };
        let frame = request.encode();
        log::trace!(
            "calling {service}.{method} request {} ({} byte frame)",
            request.request_id,
            frame.len()
        );

        if options.is_oneway() {
            self.under_deadline(options.deadline(), async {
                let mut connection = self.pool.acquire().await?;
                let written = write_frame(connection.stream_mut(), &frame).await;
                // the server still sends a reply nobody will read; pooling
                // this connection would hand that stale reply to the next
                // call, so it always goes down
                self.pool.discard(connection);
                written.map_err(Error::Connection)
            })
            .await?;
            return Err(Error::OnewayResult);
        }

        let response = self
            .under_deadline(options.deadline(), self.exchange(&frame))
            .await?;

        let error = if response.error.is_empty() {
            None
        } else {
            Some(ServiceError::new(
                String::from_utf8_lossy(&response.error).into_owned(),
            ))
        };
        let value = if response.data.is_empty() {
            None
        } else {
            Some(<S as Serializer<R>>::decode(&self.serializer, &response.data)?)
        };
        Ok(Reply::from_parts(value, error))
    }

    /// One request/response exchange on a pooled connection. Only a clean
    /// exchange returns the connection to the pool; any failure discards it.
    async fn exchange(&self, frame: &[u8]) -> Result<Response> {
        let mut connection = self.pool.acquire().await?;
        if let Err(e) = write_frame(connection.stream_mut(), frame).await {
            self.pool.discard(connection);
            return Err(Error::Connection(e));
        }
        let response_frame = match read_frame(connection.stream_mut()).await {
            Ok(response_frame) => response_frame,
            Err(e) => {
                self.pool.discard(connection);
                return Err(Error::Connection(e));
            }
        };
        match Response::decode(&response_frame) {
            Ok(response) => {
                self.pool.release(connection);
                Ok(response)
            }
            Err(e) => {
                self.pool.discard(connection);
                Err(Error::Connection(io::Error::new(
                    io::ErrorKind::InvalidData,
                    e,
                )))
            }
        }
    }

    /// Run `operation` under the call deadline, if one is set. On expiry the
    /// operation future is dropped, which discards any connection it was
    /// holding mid-exchange.
    async fn under_deadline<T>(
        &self,
        deadline: Option<SystemTime>,
        operation: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match deadline {
            Some(deadline) => {
                let remaining = deadline
                    .duration_since(SystemTime::now())
                    .map_err(|_already_past| Error::DeadlineExceeded)?;
                match tokio::time::timeout(remaining, operation).await {
                    Ok(result) => result,
                    Err(_elapsed) => Err(Error::DeadlineExceeded),
                }
            }
            None => operation.await,
        }
    }
}
