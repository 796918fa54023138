use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use groupcast_wire::Address;

use crate::envelope::Envelope;
use crate::error::Result;
use crate::flags::{Flag, TransientFlag};
use crate::headers::Header;
use crate::registry::HeaderRegistry;

/// A unit of data exchanged between cluster members.
///
/// Concrete variants own the payload representation; the shared envelope
/// (addresses, flags, headers) and the framing skeleton live in
/// [`Envelope`]. The type tag identifies the variant on the wire so the
/// receiving side can reconstruct it through its message registry; tags
/// are plain integers rather than a closed enum because deployments
/// register their own variants at runtime.
pub trait Message<A: Address>: fmt::Debug + fmt::Display + Send + Sync {
    /// The variant's registry tag.
    fn type_tag(&self) -> u8;

    /// The shared envelope.
    fn envelope(&self) -> &Envelope<A>;

    /// The shared envelope, mutably.
    fn envelope_mut(&mut self) -> &mut Envelope<A>;

    /// Length in bytes of the logical payload.
    fn payload_length(&self) -> usize;

    /// Exact size of the full frame this message will encode to.
    fn serialized_size(&self) -> usize;

    /// Encode the full frame (skeleton + variant payload).
    fn write_to(&self, out: &mut BytesMut);

    /// Encode the address-eliding frame; see
    /// [`Envelope::write_to_no_addrs`].
    fn write_to_no_addrs(&self, known_src: Option<&A>, out: &mut BytesMut, excluded_ids: &[u16]);

    /// Decode a full frame in place. On failure the message is left
    /// unchanged.
    fn read_from(&mut self, buf: &mut Bytes, registry: &HeaderRegistry) -> Result<()>;

    /// Copy this message; payload and header semantics are
    /// variant-specific.
    fn copy(&self, copy_payload: bool, copy_headers: bool) -> Box<dyn Message<A>>;

    // Envelope conveniences, so protocol layers can work against
    // `dyn Message` without reaching through `envelope()` every time.

    fn dest(&self) -> Option<&A> {
        self.envelope().dest()
    }

    fn src(&self) -> Option<&A> {
        self.envelope().src()
    }

    fn put_header(&self, id: u16, header: Arc<dyn Header>) -> Result<()> {
        self.envelope().put_header(id, header)
    }

    fn get_header(&self, id: u16) -> Result<Option<Arc<dyn Header>>> {
        self.envelope().get_header(id)
    }

    fn num_headers(&self) -> usize {
        self.envelope().num_headers()
    }

    fn set_flag(&self, flag: Flag) {
        self.envelope().set_flag(flag);
    }

    fn is_flag_set(&self, flag: Flag) -> bool {
        self.envelope().is_flag_set(flag)
    }

    fn set_transient_flag_if_absent(&self, flag: TransientFlag) -> bool {
        self.envelope().set_transient_flag_if_absent(flag)
    }
}
