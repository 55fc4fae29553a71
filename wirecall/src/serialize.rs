//! Pluggable payload encodings.
//!
//! Argument and result bytes cross the wire tagged with a one-byte code.
//! Client and server configure the same code-to-encoding mapping out of band;
//! nothing is negotiated on the wire. Implementations live in their own
//! crates (`wirecall-json`, `wirecall-prost`, `wirecall-messagepack`) so the
//! core stays encoding-agnostic.

use crate::error::Result;

/// A payload encoding identified by its one-byte wire code.
pub trait Encoding: Send + Sync + 'static {
    /// The code stamped into each frame so the receiving side can pick the
    /// matching decoder.
    fn code(&self) -> u8;
}

/// Encode and decode one payload type.
///
/// The trait is parameterized by the payload type rather than erasing it, so
/// every call site and method registration is checked against the concrete
/// argument and result types it actually moves. An encoding implements this
/// blanket-style for whatever family of types it can carry, e.g. serde
/// values for json, prost messages for protocol buffers.
pub trait Serializer<T>: Encoding {
    /// Encode a value to payload bytes.
    fn encode(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode payload bytes into a value.
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}
