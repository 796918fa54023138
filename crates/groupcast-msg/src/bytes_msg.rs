//! The byte-buffer message variant.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use groupcast_wire::{Address, Marshaller, WireError};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec;
use crate::envelope::Envelope;
use crate::error::{MessageError, Result};
use crate::message::Message;
use crate::registry::{HeaderRegistry, BYTES_MSG};

/// Payload length sentinel for "no buffer attached".
const NO_PAYLOAD: i32 = -1;

/// Maximum payload length; the wire length field is an `i32` with negative
/// values reserved for the absent-payload sentinel.
pub const MAX_PAYLOAD_LEN: usize = i32::MAX as usize;

fn check_payload_len(length: usize) -> Result<()> {
    if length > MAX_PAYLOAD_LEN {
        return Err(MessageError::PayloadTooLarge {
            length,
            max: MAX_PAYLOAD_LEN,
        });
    }
    Ok(())
}

/// A message carrying a raw byte buffer as payload.
///
/// The buffer is held by reference ([`Bytes`]) and may be shared by several
/// logical messages at once, e.g. a retransmitted copy aliasing the
/// original's storage. `offset`/`length` delimit the logical subrange in
/// use; only that subrange is serialized. `Bytes` is immutable, so aliased
/// payloads cannot be changed in place — rewriting a payload always means
/// attaching a new buffer.
pub struct BytesMessage<A: Address> {
    envelope: Envelope<A>,
    buf: Option<Bytes>,
    offset: usize,
    length: usize,
}

impl<A: Address> BytesMessage<A> {
    /// Create an empty message addressed to `dest` (`None` = the whole
    /// group).
    pub fn new(dest: Option<A>) -> Self {
        Self {
            envelope: Envelope::new(dest),
            buf: None,
            offset: 0,
            length: 0,
        }
    }

    /// Create a message with a payload buffer.
    pub fn with_payload(dest: Option<A>, payload: impl Into<Bytes>) -> Result<Self> {
        let mut msg = Self::new(dest);
        msg.set_payload(Some(payload.into()))?;
        Ok(msg)
    }

    /// Create a message whose payload is a subrange of `payload`.
    pub fn with_payload_range(
        dest: Option<A>,
        payload: Bytes,
        offset: usize,
        length: usize,
    ) -> Result<Self> {
        let mut msg = Self::new(dest);
        msg.set_payload_range(payload, offset, length)?;
        Ok(msg)
    }

    /// Create a message whose payload is `value` marshalled to bytes.
    pub fn with_object<T: Serialize>(
        dest: Option<A>,
        value: &T,
        marshaller: &impl Marshaller,
    ) -> Result<Self> {
        let mut msg = Self::new(dest);
        msg.set_object(value, marshaller)?;
        Ok(msg)
    }

    /// Attach a payload buffer, using it in full. `None` detaches the
    /// payload.
    ///
    /// A buffer longer than [`MAX_PAYLOAD_LEN`] is rejected with
    /// [`MessageError::PayloadTooLarge`]: the wire length field could not
    /// describe it and the frame would decode as payload-less. The
    /// previously attached payload is untouched on failure.
    pub fn set_payload(&mut self, payload: Option<Bytes>) -> Result<()> {
        match payload {
            Some(buf) => {
                check_payload_len(buf.len())?;
                self.offset = 0;
                self.length = buf.len();
                self.buf = Some(buf);
            }
            None => {
                self.buf = None;
                self.offset = 0;
                self.length = 0;
            }
        }
        Ok(())
    }

    /// Attach a payload buffer, using only `offset..offset + length`.
    ///
    /// The range is validated against the buffer and against
    /// [`MAX_PAYLOAD_LEN`], never clamped; on a violation the previously
    /// attached payload is untouched.
    pub fn set_payload_range(&mut self, payload: Bytes, offset: usize, length: usize) -> Result<()> {
        check_payload_len(length)?;
        let size = payload.len();
        let in_bounds = offset <= size
            && offset
                .checked_add(length)
                .map_or(false, |end| end <= size);
        if !in_bounds {
            return Err(MessageError::Bounds {
                offset,
                length,
                size,
            });
        }
        self.buf = Some(payload);
        self.offset = offset;
        self.length = length;
        Ok(())
    }

    /// The logical payload subrange.
    ///
    /// May alias the underlying buffer or be a fresh handle; callers must
    /// not rely on which.
    pub fn payload(&self) -> Option<Bytes> {
        self.buf.as_ref().map(|buf| {
            if self.offset == 0 && self.length == buf.len() {
                buf.clone()
            } else {
                buf.slice(self.offset..self.offset + self.length)
            }
        })
    }

    /// The entire underlying buffer, regardless of offset/length. For
    /// producers that manage subranging themselves.
    pub fn raw_payload(&self) -> Option<&Bytes> {
        self.buf.as_ref()
    }

    /// True if a payload buffer is attached.
    pub fn has_payload(&self) -> bool {
        self.buf.is_some()
    }

    /// Offset of the logical subrange into the underlying buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Marshal `value` into the payload buffer.
    ///
    /// Raw bytes and pre-built [`Bytes`] buffers should go through
    /// [`BytesMessage::set_payload`] directly; this is the convenience path
    /// for structured values.
    pub fn set_object<T: Serialize>(
        &mut self,
        value: &T,
        marshaller: &impl Marshaller,
    ) -> Result<()> {
        let bytes = marshaller.to_bytes(value)?;
        self.set_payload(Some(bytes))
    }

    /// Unmarshal the payload into a `T`. The target type is chosen by the
    /// caller and acts as the resolution context for the stored bytes.
    pub fn object<T: DeserializeOwned>(&self, marshaller: &impl Marshaller) -> Result<T> {
        match &self.buf {
            Some(buf) => Ok(marshaller.from_bytes(&buf[self.offset..self.offset + self.length])?),
            None => Err(WireError::Marshal("message has no payload".to_string()).into()),
        }
    }

    /// A typed copy; same semantics as [`Message::copy`] without boxing.
    ///
    /// With `copy_payload` false the buffer is shared by reference. With it
    /// true the logical subrange is copied into a fresh, exactly-sized
    /// buffer, decoupling the copy from the original's backing storage.
    /// Headers follow the shallow-copy rule of [`Envelope::copy`].
    pub fn copy_bytes(&self, copy_payload: bool, copy_headers: bool) -> Self {
        let (buf, offset, length) = match (&self.buf, copy_payload) {
            (Some(buf), false) => (Some(buf.clone()), self.offset, self.length),
            (Some(buf), true) => (
                Some(Bytes::copy_from_slice(
                    &buf[self.offset..self.offset + self.length],
                )),
                0,
                self.length,
            ),
            (None, _) => (None, 0, 0),
        };
        Self {
            envelope: self.envelope.copy(copy_headers),
            buf,
            offset,
            length,
        }
    }

    /// Selective copy for layers that strip lower-layer headers before
    /// re-encoding: keeps only headers whose protocol id is at least
    /// `starting_id` or appears in `copy_only_ids`.
    pub fn copy_with_headers(
        &self,
        copy_payload: bool,
        starting_id: u16,
        copy_only_ids: &[u16],
    ) -> Self {
        let retval = self.copy_bytes(copy_payload, false);
        for entry in self.envelope.headers().snapshot().iter() {
            if entry.prot_id >= starting_id || copy_only_ids.contains(&entry.prot_id) {
                // A subset of a table that already fits the count field.
                let _ = retval
                    .envelope
                    .put_header(entry.prot_id, entry.header.clone());
            }
        }
        retval
    }

    /// A fresh message addressed back to this message's source, with this
    /// message's destination as the reply's source when present. A
    /// convenience, not a protocol guarantee.
    pub fn make_reply(&self) -> Self {
        let mut reply = Self::new(self.envelope.src().cloned());
        if let Some(dest) = self.envelope.dest() {
            reply.envelope.set_src(Some(dest.clone()));
        }
        reply
    }

    fn write_payload(&self, out: &mut BytesMut) {
        match &self.buf {
            Some(buf) => {
                // set_payload/set_payload_range keep length within i32.
                out.put_i32(self.length as i32);
                out.put_slice(&buf[self.offset..self.offset + self.length]);
            }
            None => out.put_i32(NO_PAYLOAD),
        }
    }
}

impl<A: Address + 'static> Message<A> for BytesMessage<A> {
    fn type_tag(&self) -> u8 {
        BYTES_MSG
    }

    fn envelope(&self) -> &Envelope<A> {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope<A> {
        &mut self.envelope
    }

    fn payload_length(&self) -> usize {
        self.length
    }

    fn serialized_size(&self) -> usize {
        let mut size = self.envelope.serialized_size() + 4;
        if self.buf.is_some() {
            size += self.length;
        }
        size
    }

    fn write_to(&self, out: &mut BytesMut) {
        self.envelope.write_to(out);
        self.write_payload(out);
    }

    fn write_to_no_addrs(&self, known_src: Option<&A>, out: &mut BytesMut, excluded_ids: &[u16]) {
        self.envelope.write_to_no_addrs(known_src, out, excluded_ids);
        self.write_payload(out);
    }

    fn read_from(&mut self, buf: &mut Bytes, registry: &HeaderRegistry) -> Result<()> {
        let envelope = Envelope::decode(buf, registry)?;
        let declared = codec::read_i32(buf)?;
        let payload = if declared >= 0 {
            Some(codec::read_bytes(buf, declared as usize)?)
        } else {
            // Absent payload stays absent, not empty.
            None
        };

        self.length = payload.as_ref().map_or(0, Bytes::len);
        self.offset = 0;
        self.buf = payload;
        self.envelope = envelope;
        Ok(())
    }

    fn copy(&self, copy_payload: bool, copy_headers: bool) -> Box<dyn Message<A>> {
        Box::new(self.copy_bytes(copy_payload, copy_headers))
    }
}

impl<A: Address> fmt::Display for BytesMessage<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, size={} bytes", self.envelope, self.length)
    }
}

impl<A: Address> fmt::Debug for BytesMessage<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BytesMessage")
            .field("envelope", &self.envelope)
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("has_payload", &self.buf.is_some())
            .finish()
    }
}
