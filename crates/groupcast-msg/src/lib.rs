//! Message envelope and wire framing for group communication.
//!
//! Every unit of data exchanged between cluster members is a [`Message`]:
//! destination and source addresses, a set of per-protocol-layer headers,
//! two flag words (persistent and transient), and a variant-specific
//! payload. Protocol layers annotate a message on the way down the stack,
//! the envelope frames itself for transport, and the receiving side
//! reconstructs headers and the variant through open runtime registries.
//!
//! The crate is generic over the address type; see `groupcast-wire` for
//! the [`Address`](groupcast_wire::Address) contract and the default
//! [`MemberAddress`](groupcast_wire::MemberAddress).

pub mod bytes_msg;
mod codec;
pub mod envelope;
pub mod error;
pub mod flags;
pub mod headers;
pub mod message;
pub mod registry;

pub use bytes_msg::{BytesMessage, MAX_PAYLOAD_LEN};
pub use envelope::Envelope;
pub use error::{MessageError, Result};
pub use flags::{flags_to_string, transient_flags_to_string, Flag, TransientFlag};
pub use headers::{Header, HeaderEntry, Headers, HEADER_OVERHEAD, MAX_HEADERS};
pub use message::Message;
pub use registry::{HeaderRegistry, MessageRegistry, BYTES_MSG};

#[cfg(test)]
pub(crate) mod testutil {
    //! Header types shared by the unit tests.

    use std::any::Any;

    use bytes::{Buf, BufMut, Bytes, BytesMut};

    use crate::error::{MessageError, Result};
    use crate::headers::Header;
    use crate::registry::HeaderRegistry;

    /// A sequence-number header, the kind a reliability layer would attach.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SeqnoHeader {
        seqno: u64,
    }

    impl SeqnoHeader {
        pub const MAGIC_ID: u16 = 21;

        pub fn new(seqno: u64) -> Self {
            Self { seqno }
        }

        pub fn seqno(&self) -> u64 {
            self.seqno
        }

        pub fn decode(buf: &mut Bytes) -> Result<Box<dyn Header>> {
            if buf.remaining() < 8 {
                return Err(MessageError::Truncated {
                    needed: 8,
                    remaining: buf.remaining(),
                });
            }
            Ok(Box::new(SeqnoHeader::new(buf.get_u64())))
        }
    }

    impl Header for SeqnoHeader {
        fn magic_id(&self) -> u16 {
            Self::MAGIC_ID
        }

        fn serialized_size(&self) -> usize {
            8
        }

        fn write_to(&self, out: &mut BytesMut) {
            out.put_u64(self.seqno);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// A bodyless marker header, like an ack request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AckRequestHeader;

    impl AckRequestHeader {
        pub const MAGIC_ID: u16 = 22;

        pub fn decode(_buf: &mut Bytes) -> Result<Box<dyn Header>> {
            Ok(Box::new(AckRequestHeader))
        }
    }

    impl Header for AckRequestHeader {
        fn magic_id(&self) -> u16 {
            Self::MAGIC_ID
        }

        fn serialized_size(&self) -> usize {
            0
        }

        fn write_to(&self, _out: &mut BytesMut) {}

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    pub fn test_registry() -> HeaderRegistry {
        let mut registry = HeaderRegistry::new();
        registry.register(SeqnoHeader::MAGIC_ID, SeqnoHeader::decode);
        registry.register(AckRequestHeader::MAGIC_ID, AckRequestHeader::decode);
        registry
    }
}
