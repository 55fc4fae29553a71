//! Transparent rpc over length-prefixed binary tcp frames.
//!
//! Callers invoke ordinary-looking async methods on a typed client wrapper;
//! each call is silently serialized, framed, written to a pooled connection,
//! and matched with the framed response from a remote service
//! implementation. Payload bytes are opaque to the framework: a pluggable
//! [`Serializer`] encodes arguments and results, identified on the wire by a
//! one-byte code that both sides agree on out of band. The sibling crates
//! `wirecall-json`, `wirecall-prost`, and `wirecall-messagepack` provide
//! ready implementations.
//!
//! The server side mirrors the client: a [`server::ServiceHandler`] holds a
//! method table built at registration time, a [`server::Server`] accepts
//! connections and runs each on its own task, and every inbound call is
//! routed by service name, method name, and serializer code.
//!
//! Cross-cutting call semantics ride in the request meta map: a deadline as
//! epoch milliseconds, and a oneway marker for fire-and-forget calls. At the
//! api boundary they are typed ([`CallOptions`] on the client,
//! [`CallContext`] in a handler); the string map exists only on the wire.
//!
//! Business methods may return a result, an error, or both at once, and the
//! protocol preserves all three shapes end to end: see [`Reply`].
//!
//! * See example-greeter for a runnable client and server pair.

#![deny(missing_docs)]

mod call;
mod error;
mod frame;
mod message;
mod serialize;

pub mod client;
pub mod server;

pub use call::{CallContext, CallOptions, Reply, META_DEADLINE, META_ONE_WAY};
pub use error::{Error, Result, ServiceError};
pub use frame::{read_frame, write_frame, LENGTH_PREFIX, MAX_FRAME_LENGTH};
pub use message::{DecodeError, Request, Response, FIXED_HEADER_LENGTH, PROTOCOL_VERSION};
pub use serialize::{Encoding, Serializer};
