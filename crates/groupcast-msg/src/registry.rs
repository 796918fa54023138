//! Open runtime registries for header and message reconstruction.
//!
//! Wire frames identify header types by a 16-bit magic id and message
//! variants by an 8-bit type tag. Both mappings are populated at process
//! start by every participating component, which keeps the wire format
//! extensible without a closed variant list. Decoding anything whose id
//! was never registered is a fatal error for that decode.

use std::collections::HashMap;
use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use groupcast_wire::Address;
use tracing::{debug, warn};

use crate::bytes_msg::BytesMessage;
use crate::codec;
use crate::error::{MessageError, Result};
use crate::headers::Header;
use crate::message::Message;

/// Type tag of [`BytesMessage`], registered by default.
pub const BYTES_MSG: u8 = 1;

/// Decodes one header body from the buffer.
pub type HeaderDecoder = fn(&mut Bytes) -> Result<Box<dyn Header>>;

/// Creates an empty message variant for frame reconstruction.
pub type MessageFactory<A> = fn() -> Box<dyn Message<A>>;

/// Magic-id-keyed registry of header decoders.
#[derive(Default)]
pub struct HeaderRegistry {
    decoders: HashMap<u16, HeaderDecoder>,
}

impl HeaderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder for a magic id. Re-registering an id replaces
    /// the previous decoder.
    pub fn register(&mut self, magic_id: u16, decoder: HeaderDecoder) {
        if self.decoders.insert(magic_id, decoder).is_some() {
            warn!(magic_id, "replacing existing header decoder");
        } else {
            debug!(magic_id, "registered header decoder");
        }
    }

    /// True if a decoder is registered for `magic_id`.
    pub fn is_registered(&self, magic_id: u16) -> bool {
        self.decoders.contains_key(&magic_id)
    }

    /// Decode one header body identified by `magic_id`.
    pub fn decode(&self, magic_id: u16, buf: &mut Bytes) -> Result<Box<dyn Header>> {
        let decoder = self
            .decoders
            .get(&magic_id)
            .ok_or(MessageError::UnknownHeader(magic_id))?;
        decoder(buf)
    }
}

impl fmt::Debug for HeaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<u16> = self.decoders.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("HeaderRegistry").field("ids", &ids).finish()
    }
}

/// Type-tag-keyed registry of message variant factories.
pub struct MessageRegistry<A: Address> {
    factories: HashMap<u8, MessageFactory<A>>,
}

impl<A: Address + 'static> MessageRegistry<A> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with the built-in variants registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(BYTES_MSG, bytes_message_factory::<A>);
        registry
    }

    /// Register a factory for a type tag. Re-registering a tag replaces
    /// the previous factory.
    pub fn register(&mut self, type_tag: u8, factory: MessageFactory<A>) {
        if self.factories.insert(type_tag, factory).is_some() {
            warn!(type_tag, "replacing existing message factory");
        } else {
            debug!(type_tag, "registered message factory");
        }
    }

    /// True if a factory is registered for `type_tag`.
    pub fn is_registered(&self, type_tag: u8) -> bool {
        self.factories.contains_key(&type_tag)
    }

    /// Instantiate an empty message for `type_tag`.
    pub fn create(&self, type_tag: u8) -> Result<Box<dyn Message<A>>> {
        let factory = self
            .factories
            .get(&type_tag)
            .ok_or(MessageError::UnknownMessage(type_tag))?;
        Ok(factory())
    }

    /// Write a tagged frame: one type-tag byte followed by the message's
    /// full frame. The counterpart of [`MessageRegistry::read_message`].
    pub fn write_message(&self, msg: &dyn Message<A>, out: &mut BytesMut) {
        out.put_u8(msg.type_tag());
        msg.write_to(out);
    }

    /// Read a tagged frame: the type-tag byte selects the factory, the
    /// fresh instance then decodes its own frame.
    pub fn read_message(
        &self,
        buf: &mut Bytes,
        headers: &HeaderRegistry,
    ) -> Result<Box<dyn Message<A>>> {
        let type_tag = codec::read_u8(buf)?;
        let mut msg = self.create(type_tag)?;
        msg.read_from(buf, headers)?;
        Ok(msg)
    }
}

impl<A: Address + 'static> Default for MessageRegistry<A> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<A: Address> fmt::Debug for MessageRegistry<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<u8> = self.factories.keys().copied().collect();
        tags.sort_unstable();
        f.debug_struct("MessageRegistry").field("tags", &tags).finish()
    }
}

fn bytes_message_factory<A: Address + 'static>() -> Box<dyn Message<A>> {
    Box::new(BytesMessage::new(None))
}
