//! The shared envelope core: addresses, flags, headers and the framing
//! skeleton common to every message variant.

use std::fmt;
use std::sync::atomic::{AtomicU16, AtomicU8, Ordering};
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use groupcast_wire::Address;

use crate::codec;
use crate::error::Result;
use crate::flags::{flags_to_string, transient_flags_to_string, Flag, TransientFlag};
use crate::headers::{Header, Headers};
use crate::registry::HeaderRegistry;

/// Leading-byte bit: destination address present in the frame.
const DEST_SET: u8 = 1;
/// Leading-byte bit: source address present in the frame.
const SRC_SET: u8 = 1 << 1;

/// Skeleton overhead: leading byte + flags word + header count.
const SKELETON_SIZE: usize = 1 + 2 + 2;

/// The state every message variant shares: destination and source
/// addresses, the header multiplexer, and both flag words.
///
/// A `None` destination means the message is sent to the whole group.
/// Flag words are atomics and header storage is internally synchronized,
/// so a message can be annotated by one protocol layer while another
/// (e.g. a retransmission path) still reads it.
///
/// Frame layout, in order: leading byte (address presence bits), `u16`
/// persistent flags, destination, source, `u16` header count, then per
/// header the protocol id, the magic id and the self-encoded body.
/// Transient flags never hit the wire.
pub struct Envelope<A: Address> {
    dest: Option<A>,
    src: Option<A>,
    headers: Headers,
    flags: AtomicU16,
    transient_flags: AtomicU8,
}

impl<A: Address> Envelope<A> {
    /// Create an envelope addressed to `dest` (`None` = the whole group).
    pub fn new(dest: Option<A>) -> Self {
        Self {
            dest,
            src: None,
            headers: Headers::new(),
            flags: AtomicU16::new(0),
            transient_flags: AtomicU8::new(0),
        }
    }

    pub fn dest(&self) -> Option<&A> {
        self.dest.as_ref()
    }

    pub fn set_dest(&mut self, dest: Option<A>) {
        self.dest = dest;
    }

    pub fn src(&self) -> Option<&A> {
        self.src.as_ref()
    }

    pub fn set_src(&mut self, src: Option<A>) {
        self.src = src;
    }

    /// The header multiplexer.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Attach a header under a protocol id, overwriting any existing one.
    /// Fails only when a new id would overflow the wire header count; see
    /// [`Headers::put`].
    pub fn put_header(&self, id: u16, header: Arc<dyn Header>) -> Result<()> {
        self.headers.put(id, header)
    }

    /// Look up a header by protocol id. Fails for id 0; see
    /// [`Headers::get`].
    pub fn get_header(&self, id: u16) -> Result<Option<Arc<dyn Header>>> {
        self.headers.get(id)
    }

    /// Number of attached headers.
    pub fn num_headers(&self) -> usize {
        self.headers.len()
    }

    // ------------------------------------------------------------------
    // Flags
    // ------------------------------------------------------------------

    /// Set one persistent flag.
    pub fn set_flag(&self, flag: Flag) {
        self.flags.fetch_or(flag.value(), Ordering::SeqCst);
    }

    /// Set several persistent flags in one operation.
    pub fn set_flags(&self, flags: &[Flag]) {
        let mut word = 0u16;
        for flag in flags {
            word |= flag.value();
        }
        self.flags.fetch_or(word, Ordering::SeqCst);
    }

    /// Clear one persistent flag. No-op if it was not set.
    pub fn clear_flag(&self, flag: Flag) {
        self.flags.fetch_and(!flag.value(), Ordering::SeqCst);
    }

    pub fn is_flag_set(&self, flag: Flag) -> bool {
        self.flags.load(Ordering::SeqCst) & flag.value() != 0
    }

    /// Set one transient flag. Transient flags are never marshalled.
    pub fn set_transient_flag(&self, flag: TransientFlag) {
        self.transient_flags.fetch_or(flag.value(), Ordering::SeqCst);
    }

    /// Clear one transient flag. No-op if it was not set.
    pub fn clear_transient_flag(&self, flag: TransientFlag) {
        self.transient_flags
            .fetch_and(!flag.value(), Ordering::SeqCst);
    }

    pub fn is_transient_flag_set(&self, flag: TransientFlag) -> bool {
        self.transient_flags.load(Ordering::SeqCst) & flag.value() != 0
    }

    /// Atomically set a transient flag if it is not already set.
    ///
    /// Under concurrent callers racing on the same message, exactly one
    /// observes `true` per flag. Used e.g. to deduplicate out-of-band
    /// delivery.
    pub fn set_transient_flag_if_absent(&self, flag: TransientFlag) -> bool {
        let bit = flag.value();
        let prev = self.transient_flags.fetch_or(bit, Ordering::SeqCst);
        prev & bit == 0
    }

    /// OR a raw flag word in. Wire-compatible escape hatch for layers that
    /// carry several flags as one value.
    pub fn set_raw_flags(&self, flags: u16) {
        self.flags.fetch_or(flags, Ordering::SeqCst);
    }

    /// The raw persistent flag word. Diagnostics and tests only; the
    /// numeric encoding is not a stable API.
    pub fn flags_raw(&self) -> u16 {
        self.flags.load(Ordering::SeqCst)
    }

    /// The raw transient flag word. Diagnostics and tests only.
    pub fn transient_flags_raw(&self) -> u8 {
        self.transient_flags.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Framing
    // ------------------------------------------------------------------

    /// Exact size in bytes of the full frame skeleton, without encoding.
    ///
    /// Kept in lock-step with [`Envelope::write_to`]; used to pre-size
    /// output buffers.
    pub fn serialized_size(&self) -> usize {
        let mut size = SKELETON_SIZE;
        if let Some(dest) = &self.dest {
            size += dest.serialized_size();
        }
        if let Some(src) = &self.src {
            size += src.serialized_size();
        }
        size + self.headers.marshalled_size()
    }

    /// Write the full frame skeleton.
    pub fn write_to(&self, out: &mut BytesMut) {
        let mut leading = 0u8;
        if self.dest.is_some() {
            leading |= DEST_SET;
        }
        if self.src.is_some() {
            leading |= SRC_SET;
        }
        out.put_u8(leading);
        out.put_u16(self.flags.load(Ordering::SeqCst));

        if let Some(dest) = &self.dest {
            dest.write_to(out);
        }
        if let Some(src) = &self.src {
            src.write_to(out);
        }

        let snapshot = self.headers.snapshot();
        // Headers::put keeps the table within the u16 count field.
        out.put_u16(snapshot.len() as u16);
        for entry in snapshot.iter() {
            out.put_u16(entry.prot_id);
            out.put_u16(entry.header.magic_id());
            entry.header.write_to(out);
        }
    }

    /// Write an address-eliding frame, a transport-level size optimization
    /// for connections that already convey the addresses out of band.
    ///
    /// The destination is never written. The source is written only when
    /// it differs from `known_src` (or when no known source is supplied
    /// and this envelope has one). Headers whose protocol id appears in
    /// `excluded_ids` are left out of both the count and the body.
    ///
    /// The result decodes through the ordinary [`Envelope::read_from`]
    /// path; the caller of the decoder injects the elided fields.
    pub fn write_to_no_addrs(&self, known_src: Option<&A>, out: &mut BytesMut, excluded_ids: &[u16]) {
        let write_src = match known_src {
            Some(known) => self.src.as_ref().is_some_and(|src| src != known),
            None => self.src.is_some(),
        };

        let mut leading = 0u8;
        if write_src {
            leading |= SRC_SET;
        }
        out.put_u8(leading);
        out.put_u16(self.flags.load(Ordering::SeqCst));

        if write_src {
            if let Some(src) = &self.src {
                src.write_to(out);
            }
        }

        let snapshot = self.headers.snapshot();
        let count = snapshot
            .iter()
            .filter(|entry| !excluded_ids.contains(&entry.prot_id))
            .count();
        out.put_u16(count as u16);
        for entry in snapshot.iter() {
            if excluded_ids.contains(&entry.prot_id) {
                continue;
            }
            out.put_u16(entry.prot_id);
            out.put_u16(entry.header.magic_id());
            entry.header.write_to(out);
        }
    }

    /// Decode a frame skeleton, reconstructing headers through `registry`.
    ///
    /// The header table is sized exactly to the declared count. Transient
    /// flags always come up zero on the decoded envelope.
    pub fn decode(buf: &mut Bytes, registry: &HeaderRegistry) -> Result<Self> {
        let leading = codec::read_u8(buf)?;
        let flags = codec::read_u16(buf)?;

        let dest = if leading & DEST_SET != 0 {
            Some(A::read_from(buf)?)
        } else {
            None
        };
        let src = if leading & SRC_SET != 0 {
            Some(A::read_from(buf)?)
        } else {
            None
        };

        let count = codec::read_u16(buf)? as usize;
        let headers = Headers::with_capacity(count);
        for _ in 0..count {
            let prot_id = codec::read_u16(buf)?;
            let magic_id = codec::read_u16(buf)?;
            let header = registry.decode(magic_id, buf)?;
            headers.put(prot_id, Arc::from(header))?;
        }

        Ok(Self {
            dest,
            src,
            headers,
            flags: AtomicU16::new(flags),
            transient_flags: AtomicU8::new(0),
        })
    }

    /// Decode in place. On failure the envelope is left unchanged.
    pub fn read_from(&mut self, buf: &mut Bytes, registry: &HeaderRegistry) -> Result<()> {
        *self = Self::decode(buf, registry)?;
        Ok(())
    }

    /// An independent copy of this envelope.
    ///
    /// Addresses and both flag words are copied (later flag mutations on
    /// one side never affect the other). With `copy_headers` the header
    /// table is shallow-copied (shared header references); without it the
    /// copy still gets a fresh empty table, never an absent one, so `put`
    /// on the copy always works.
    pub fn copy(&self, copy_headers: bool) -> Self {
        Self {
            dest: self.dest.clone(),
            src: self.src.clone(),
            headers: if copy_headers {
                self.headers.shallow_copy()
            } else {
                Headers::new()
            },
            flags: AtomicU16::new(self.flags.load(Ordering::SeqCst)),
            transient_flags: AtomicU8::new(self.transient_flags.load(Ordering::SeqCst)),
        }
    }
}

impl<A: Address> fmt::Display for Envelope<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[dst: ")?;
        match &self.dest {
            Some(dest) => write!(f, "{dest}")?,
            None => write!(f, "<all>")?,
        }
        write!(f, ", src: ")?;
        match &self.src {
            Some(src) => write!(f, "{src}")?,
            None => write!(f, "<null>")?,
        }
        let num_headers = self.num_headers();
        if num_headers > 0 {
            write!(f, " ({num_headers} headers)")?;
        }
        let flags = self.flags_raw();
        if flags > 0 {
            write!(f, ", flags={}", flags_to_string(flags))?;
        }
        let transient = self.transient_flags_raw();
        if transient > 0 {
            write!(f, ", transient_flags={}", transient_flags_to_string(transient))?;
        }
        write!(f, "]")
    }
}

impl<A: Address> fmt::Debug for Envelope<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("dest", &self.dest)
            .field("src", &self.src)
            .field("headers", &self.headers)
            .field("flags", &self.flags_raw())
            .field("transient_flags", &self.transient_flags_raw())
            .finish()
    }
}
