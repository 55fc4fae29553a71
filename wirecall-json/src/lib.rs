//! Json payload encoding for wirecall, via `serde_json`.
//!
//! Any payload type that is `serde::Serialize + DeserializeOwned` can travel
//! with this serializer. Json is the interoperable default: self-describing,
//! debuggable on the wire, and schema-free.

use serde::de::DeserializeOwned;
use serde::Serialize;
use wirecall::{Encoding, Error, Serializer};

/// Wire code for the json encoding.
pub const JSON_SERIALIZER_CODE: u8 = 1;

/// A serializer that encodes payloads as json.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Encoding for JsonSerializer {
    fn code(&self) -> u8 {
        JSON_SERIALIZER_CODE
    }
}

impl<T> Serializer<T> for JsonSerializer
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> wirecall::Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| Error::Serialization(Box::new(e)))
    }

    fn decode(&self, bytes: &[u8]) -> wirecall::Result<T> {
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(Box::new(e)))
    }
}
