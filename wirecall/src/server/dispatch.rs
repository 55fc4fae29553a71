//! Per-service method tables and the (de)serialization around a call.
//!
//! The table is built entirely at registration time: each registered method
//! becomes an erased async callable that decodes the argument, invokes the
//! typed handler, and encodes the result. The hot dispatch path does two
//! map lookups and an indirect call, no type inspection.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::call::{CallContext, Reply};
use crate::error::{Error, Result};
use crate::message;
use crate::serialize::Serializer;

/// What one dispatched call produced: optionally-encoded result bytes and
/// optionally a business error text. Both may be present; the server loop
/// writes them into the response as-is.
pub(crate) struct DispatchOutcome {
    pub data: Option<Vec<u8>>,
    pub error: Option<String>,
}

impl DispatchOutcome {
    pub(crate) fn error(text: String) -> Self {
        Self {
            data: None,
            error: Some(text),
        }
    }
}

type MethodFn = Arc<dyn Fn(CallContext, Vec<u8>) -> BoxFuture<'static, DispatchOutcome> + Send + Sync>;

#[derive(Default)]
struct MethodEntry {
    by_serializer: HashMap<u8, MethodFn>,
}

/// A named service and its method table.
///
/// Methods are registered once, before the handler is given to a
/// [`crate::server::Server`]; the table is read-only afterwards. A method is
/// registered under the serializer it speaks; registering it again under a
/// second serializer code makes the service reachable from clients using
/// either encoding.
pub struct ServiceHandler {
    name: String,
    methods: HashMap<String, MethodEntry>,
}

impl ServiceHandler {
    /// A handler for the service called `name`. The name is validated here,
    /// at setup time, so it can never corrupt a frame later.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        message::validate_identifier("service", &name)?;
        Ok(Self {
            name,
            methods: HashMap::new(),
        })
    }

    /// The stable name clients address this service by.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register `method`, speaking `serializer`, backed by `handler`.
    ///
    /// The handler has the uniform method shape: a [`CallContext`] and one
    /// argument in, a [`Reply`] out. Argument decode failures never reach
    /// it; they are answered with a serialization error text instead.
    pub fn register<S, A, R, F, Fut>(
        &mut self,
        method: &str,
        serializer: S,
        handler: F,
    ) -> Result<()>
    where
        S: Serializer<A> + Serializer<R>,
        A: Send + 'static,
        R: Send + 'static,
        F: Fn(CallContext, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Reply<R>> + Send + 'static,
    {
        message::validate_identifier("method", method)?;
        let code = serializer.code();
        let entry = self.methods.entry(method.to_string()).or_default();
        if entry.by_serializer.contains_key(&code) {
            return Err(Error::Validation(format!(
                "method {}.{method} is already registered for serializer code {code}",
                self.name
            )));
        }

        let serializer = Arc::new(serializer);
        let handler = Arc::new(handler);
        let call: MethodFn = Arc::new(move |context, data| {
            let serializer = Arc::clone(&serializer);
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let argument = match <S as Serializer<A>>::decode(&serializer, &data) {
                    Ok(argument) => argument,
                    Err(e) => return DispatchOutcome::error(e.to_string()),
                };
                let (value, error) = (*handler)(context, argument).await.into_parts();
                let data = match value {
                    Some(value) => match <S as Serializer<R>>::encode(&serializer, &value) {
                        Ok(bytes) => Some(bytes),
                        Err(e) => return DispatchOutcome::error(e.to_string()),
                    },
                    None => None,
                };
                DispatchOutcome {
                    data,
                    error: error.map(|error| error.message().to_string()),
                }
            })
        });
        entry.by_serializer.insert(code, call);
        Ok(())
    }

    /// Route one inbound call: method by name, then callable by serializer
    /// code. Lookup misses come back as business-shaped error texts, not
    /// transport failures.
    pub(crate) async fn dispatch(
        &self,
        context: CallContext,
        method: &str,
        serializer_code: u8,
        data: Vec<u8>,
    ) -> DispatchOutcome {
        let Some(entry) = self.methods.get(method) else {
            return DispatchOutcome::error(format!("method not found: {}.{method}", self.name));
        };
        let Some(call) = entry.by_serializer.get(&serializer_code) else {
            return DispatchOutcome::error(format!(
                "unsupported serializer code: {serializer_code}"
            ));
        };
        (call.as_ref())(context, data).await
    }
}

impl std::fmt::Debug for ServiceHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandler")
            .field("name", &self.name)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}
