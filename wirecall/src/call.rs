//! Cross-cutting call semantics: deadlines, oneway marking, and replies.
//!
//! On the wire these travel as entries in the request's string meta map; at
//! the api boundary they are typed. [`CallOptions`] is translated into meta
//! when a request is built, and [`CallContext`] is reconstructed from meta
//! when a request is dispatched. The translation happens nowhere else.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::ServiceError;

/// Reserved meta key carrying a call deadline as decimal epoch milliseconds.
pub const META_DEADLINE: &str = "deadline";

/// Reserved meta key marking a fire-and-forget call with the literal `true`.
pub const META_ONE_WAY: &str = "one-way";

/// Per-call settings supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    deadline: Option<SystemTime>,
    oneway: bool,
    meta: HashMap<String, String>,
}

impl CallOptions {
    /// Options with no deadline, not oneway, no extra meta.
    pub fn new() -> Self {
        Self::default()
    }

    /// Give up on the call this long from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(SystemTime::now() + timeout)
    }

    /// Give up on the call at an absolute point in time. The deadline is sent
    /// to the server as epoch milliseconds and also aborts the local wait.
    pub fn with_deadline(mut self, deadline: SystemTime) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Fire and forget: the frame is written but no response is ever read.
    pub fn oneway(mut self) -> Self {
        self.oneway = true;
        self
    }

    /// Attach an application meta entry. Keys and values must not contain
    /// `\n` or `\r`; the reserved keys are overwritten when the request is
    /// built.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// The configured deadline, if any.
    pub fn deadline(&self) -> Option<SystemTime> {
        self.deadline
    }

    /// Whether this call is fire-and-forget.
    pub fn is_oneway(&self) -> bool {
        self.oneway
    }

    /// The application meta entries, before the reserved keys are merged in.
    pub fn meta(&self) -> &HashMap<String, String> {
        &self.meta
    }

    /// Render these options into a request meta map.
    pub(crate) fn wire_meta(&self) -> HashMap<String, String> {
        let mut meta = self.meta.clone();
        if let Some(deadline) = self.deadline {
            let millis = deadline
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis();
            meta.insert(META_DEADLINE.to_string(), millis.to_string());
        }
        if self.oneway {
            meta.insert(META_ONE_WAY.to_string(), "true".to_string());
        }
        meta
    }
}

/// Per-call context handed to service methods, reconstructed from request
/// meta.
///
/// The framework does not abort a running handler when the deadline passes;
/// the client has already given up locally. Handlers that do slow work can
/// consult [`CallContext::time_remaining`] and bail out early.
#[derive(Debug, Clone)]
pub struct CallContext {
    deadline: Option<SystemTime>,
    oneway: bool,
    meta: HashMap<String, String>,
}

impl CallContext {
    pub(crate) fn from_meta(meta: HashMap<String, String>) -> Self {
        let deadline = meta
            .get(META_DEADLINE)
            .and_then(|value| value.parse::<u64>().ok())
            .map(|millis| UNIX_EPOCH + Duration::from_millis(millis));
        let oneway = meta.get(META_ONE_WAY).map(String::as_str) == Some("true");
        Self {
            deadline,
            oneway,
            meta,
        }
    }

    /// The caller's deadline, when one was sent.
    pub fn deadline(&self) -> Option<SystemTime> {
        self.deadline
    }

    /// How long until the caller gives up. `None` when no deadline was sent
    /// or it has already passed.
    pub fn time_remaining(&self) -> Option<Duration> {
        self.deadline
            .and_then(|deadline| deadline.duration_since(SystemTime::now()).ok())
    }

    /// Whether the caller marked this call fire-and-forget. The response is
    /// still computed and written; the client discards it.
    pub fn is_oneway(&self) -> bool {
        self.oneway
    }

    /// The full meta map as received, reserved keys included.
    pub fn meta(&self) -> &HashMap<String, String> {
        &self.meta
    }
}

/// The outcome of one rpc: a result value, a business error, or both.
///
/// A method may return a partial result alongside an error, and the wire
/// format carries the two independently, so the framework never collapses
/// them into an either-or.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    value: Option<T>,
    error: Option<ServiceError>,
}

impl<T> Reply<T> {
    /// A successful reply.
    pub fn ok(value: T) -> Self {
        Self {
            value: Some(value),
            error: None,
        }
    }

    /// A reply carrying only a business error.
    pub fn err(error: impl Into<ServiceError>) -> Self {
        Self {
            value: None,
            error: Some(error.into()),
        }
    }

    /// A partial result alongside a business error.
    pub fn partial(value: T, error: impl Into<ServiceError>) -> Self {
        Self {
            value: Some(value),
            error: Some(error.into()),
        }
    }

    pub(crate) fn from_parts(value: Option<T>, error: Option<ServiceError>) -> Self {
        Self { value, error }
    }

    /// The result value, absent when the reply carried no usable result.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// The business error, absent on success.
    pub fn error(&self) -> Option<&ServiceError> {
        self.error.as_ref()
    }

    /// Split into the value and the error.
    pub fn into_parts(self) -> (Option<T>, Option<ServiceError>) {
        (self.value, self.error)
    }

    /// Collapse into a `Result`, surfacing the error even when a partial
    /// value was also present.
    pub fn into_result(self) -> std::result::Result<Option<T>, ServiceError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.value),
        }
    }
}

impl<T> From<std::result::Result<T, ServiceError>> for Reply<T> {
    fn from(result: std::result::Result<T, ServiceError>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(error) => Self::err(error),
        }
    }
}
