use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Turns arbitrary payload objects into bytes and back.
///
/// Messages carry raw bytes on the wire; applications that want to send
/// structured values plug a marshaller in at the payload boundary. The
/// target type chosen by the caller at deserialization time plays the role
/// of a class-resolution context: the same bytes can be read back as any
/// compatible type.
pub trait Marshaller {
    /// Serialize `value` into a payload buffer.
    fn to_bytes<T: Serialize>(&self, value: &T) -> Result<Bytes>;

    /// Deserialize a payload buffer into a `T`.
    fn from_bytes<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// JSON marshaller backed by serde_json.
///
/// Self-describing and debuggable; swap in a binary marshaller when payload
/// size matters.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMarshaller;

impl Marshaller for JsonMarshaller {
    fn to_bytes<T: Serialize>(&self, value: &T) -> Result<Bytes> {
        let encoded = serde_json::to_vec(value)?;
        Ok(Bytes::from(encoded))
    }

    fn from_bytes<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::error::WireError;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping {
        seqno: u64,
        from: String,
    }

    #[test]
    fn object_roundtrip() {
        let ping = Ping {
            seqno: 42,
            from: "node-a".to_string(),
        };
        let bytes = JsonMarshaller.to_bytes(&ping).unwrap();
        let decoded: Ping = JsonMarshaller.from_bytes(&bytes).unwrap();
        assert_eq!(decoded, ping);
    }

    #[test]
    fn garbage_input_fails() {
        let result: Result<Ping> = JsonMarshaller.from_bytes(b"not json");
        assert!(matches!(result, Err(WireError::Marshal(_))));
    }

    #[test]
    fn primitive_values_roundtrip() {
        let bytes = JsonMarshaller.to_bytes(&7u32).unwrap();
        let n: u32 = JsonMarshaller.from_bytes(&bytes).unwrap();
        assert_eq!(n, 7);
    }
}
