//! Server side: accept loop, per-connection request loop, and dispatch.

mod dispatch;

pub use dispatch::ServiceHandler;

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use crate::call::CallContext;
use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::message::{Request, Response};
use crate::server::dispatch::DispatchOutcome;

/// A tcp server hosting a registry of named services.
///
/// Each accepted connection runs on its own task and is processed strictly
/// sequentially: one in-flight request at a time, so a slow handler delays
/// only its own connection. The service registry is immutable once serving
/// starts and is shared read-only across connection tasks.
#[derive(Debug, Default)]
pub struct Server {
    services: HashMap<String, ServiceHandler>,
}

impl Server {
    /// A server with no services registered yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under its declared name. Names must be unique;
    /// a duplicate is a setup error, not a silent replacement.
    pub fn register_service(&mut self, service: ServiceHandler) -> Result<()> {
        if self.services.contains_key(service.name()) {
            return Err(Error::Validation(format!(
                "service {} is already registered",
                service.name()
            )));
        }
        self.services.insert(service.name().to_string(), service);
        Ok(())
    }

    /// Bind `address` and serve until the listener fails.
    pub async fn serve(self, address: &str) -> Result<()> {
        let listener = TcpListener::bind(address).await.map_err(Error::Connection)?;
        self.serve_on(listener).await
    }

    /// Serve on an already-bound listener. Useful for ephemeral-port setups
    /// where the caller needs the local address before serving starts.
    pub async fn serve_on(self, listener: TcpListener) -> Result<()> {
        if let Ok(address) = listener.local_addr() {
            log::info!("serving {} services on {address}", self.services.len());
        }
        let server = Arc::new(self);
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    // transient accept failures (e.g. fd exhaustion) should
                    // not take down every established connection
                    log::warn!("accept failed: {e:?}");
                    continue;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                log::warn!("could not set nodelay: {e:?}");
            }
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                log::debug!("new connection from {peer}");
                match server.handle_connection(stream).await {
                    Ok(()) => log::debug!("connection {peer} closed"),
                    Err(e) => log::debug!("connection {peer} closed: {e:?}"),
                }
            });
        }
    }

    /// The read-decode-dispatch-encode-write loop for one connection. Any io
    /// or framing error ends this connection only.
    async fn handle_connection(&self, mut stream: TcpStream) -> io::Result<()> {
        loop {
            let frame = read_frame(&mut stream).await?;
            let request = Request::decode(&frame)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let mut response = self.handle_request(request).await;
            write_frame(&mut stream, &response.encode()).await?;
        }
    }

    /// Dispatch one decoded request and shape the outcome into a response.
    /// Lookup failures still produce a well-formed response frame.
    async fn handle_request(&self, request: Request) -> Response {
        log::trace!(
            "dispatching {}.{} request {}",
            request.service_name,
            request.method_name,
            request.request_id
        );
        let context = CallContext::from_meta(request.meta);
        let outcome = match self.services.get(&request.service_name) {
            Some(service) => {
                service
                    .dispatch(
                        context,
                        &request.method_name,
                        request.serializer_code,
                        request.data,
                    )
                    .await
            }
            None => {
                DispatchOutcome::error(format!("service not found: {}", request.service_name))
            }
        };
        if let Some(error) = &outcome.error {
            log::debug!(
                "{}.{} request {} answered with error: {error}",
                request.service_name,
                request.method_name,
                request.request_id
            );
        }
        Response {
            request_id: request.request_id,
            version: request.version,
            compressor: request.compressor,
            serializer_code: request.serializer_code,
            error: outcome.error.map(String::into_bytes).unwrap_or_default(),
            data: outcome.data.unwrap_or_default(),
            ..Default::default()
        }
    }
}
