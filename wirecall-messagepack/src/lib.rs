//! Messagepack payload encoding for wirecall, via `rmp-serde`.
//!
//! The compact binary sibling of the json encoding: same serde type family,
//! smaller frames.

use serde::de::DeserializeOwned;
use serde::Serialize;
use wirecall::{Encoding, Error, Serializer};

/// Wire code for the messagepack encoding.
pub const MESSAGEPACK_SERIALIZER_CODE: u8 = 3;

/// A serializer that encodes payloads as messagepack.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessagePackSerializer;

impl Encoding for MessagePackSerializer {
    fn code(&self) -> u8 {
        MESSAGEPACK_SERIALIZER_CODE
    }
}

impl<T> Serializer<T> for MessagePackSerializer
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> wirecall::Result<Vec<u8>> {
        rmp_serde::to_vec(value).map_err(|e| Error::Serialization(Box::new(e)))
    }

    fn decode(&self, bytes: &[u8]) -> wirecall::Result<T> {
        rmp_serde::from_slice(bytes).map_err(|e| Error::Serialization(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct User {
        id: i64,
        name: String,
    }

    #[test]
    fn round_trip() {
        let user = User {
            id: 123,
            name: "hello world".to_string(),
        };
        let bytes = MessagePackSerializer.encode(&user).expect("encodes");
        let back: User = MessagePackSerializer.decode(&bytes).expect("decodes");
        assert_eq!(user, back);
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        let result: wirecall::Result<User> = MessagePackSerializer.decode(&[0xc1]);
        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}
