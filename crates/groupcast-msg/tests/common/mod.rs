//! Shared fixtures: a couple of realistic header types and a populated
//! header registry.
#![allow(dead_code)]

use std::any::Any;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use groupcast_msg::{Header, HeaderRegistry, MessageError, Result};
use groupcast_wire::MemberAddress;

/// A sequence-number header, the kind a reliability layer attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqnoHeader {
    pub seqno: u64,
}

impl SeqnoHeader {
    pub const MAGIC_ID: u16 = 21;

    pub fn new(seqno: u64) -> Self {
        Self { seqno }
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

pub fn header_registry() -> HeaderRegistry {
    let mut registry = HeaderRegistry::new();
    registry.register(SeqnoHeader::MAGIC_ID, SeqnoHeader::decode);
    registry.register(AckRequestHeader::MAGIC_ID, AckRequestHeader::decode);
    registry
}

pub fn addr(tag: u8) -> MemberAddress {
    MemberAddress::from_bytes([tag; 16])
}
