//! Protocol buffers payload encoding for wirecall, via `prost`.
//!
//! Any `prost::Message` can travel with this serializer; generated schema
//! types stay opaque to the framework, exactly like any other payload.

use prost::Message;
use wirecall::{Encoding, Error, Serializer};

/// Wire code for the protocol buffers encoding.
pub const PROTOBUF_SERIALIZER_CODE: u8 = 2;

/// A serializer that encodes payloads as protocol buffers.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProstSerializer;

impl Encoding for ProstSerializer {
    fn code(&self) -> u8 {
        PROTOBUF_SERIALIZER_CODE
    }
}

impl<T> Serializer<T> for ProstSerializer
where
    T: Message + Default,
{
    fn encode(&self, value: &T) -> wirecall::Result<Vec<u8>> {
        Ok(value.encode_to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> wirecall::Result<T> {
        T::decode(bytes).map_err(|e| Error::Serialization(Box::new(e)))
    }
}
