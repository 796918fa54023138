use std::fmt;
use std::hash::Hash;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WireError};

/// Identity of a cluster member, with an exact binary codec.
///
/// The message layer is generic over the address type: whatever implements
/// this trait decides its own wire representation. The only requirement is
/// that `read_from(write_to(a)) == a` for every address.
pub trait Address: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync {
    /// The number of bytes `write_to` will produce for this address.
    fn serialized_size(&self) -> usize;

    /// Append the wire form of this address to `out`.
    fn write_to(&self, out: &mut BytesMut);

    /// Read an address back from `buf`, consuming exactly the bytes
    /// `write_to` produced.
    fn read_from(buf: &mut Bytes) -> Result<Self>;
}

/// Wire size of a [`MemberAddress`].
pub const MEMBER_ADDR_LEN: usize = 16;

/// A logical member identity: 16 opaque bytes, usually random.
///
/// Members are identified logically rather than by their transport endpoint,
/// so an address survives reconnects and interface changes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberAddress([u8; MEMBER_ADDR_LEN]);

impl MemberAddress {
    /// Create an address from raw bytes.
    pub fn from_bytes(bytes: [u8; MEMBER_ADDR_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random address.
    pub fn new_random() -> Self {
        Self(rand::random())
    }

    /// The raw bytes of this address.
    pub fn as_bytes(&self) -> &[u8; MEMBER_ADDR_LEN] {
        &self.0
    }
}

impl Address for MemberAddress {
    fn serialized_size(&self) -> usize {
        MEMBER_ADDR_LEN
    }

    fn write_to(&self, out: &mut BytesMut) {
        out.put_slice(&self.0);
    }

    fn read_from(buf: &mut Bytes) -> Result<Self> {
        if buf.remaining() < MEMBER_ADDR_LEN {
            return Err(WireError::Truncated {
                needed: MEMBER_ADDR_LEN,
                remaining: buf.remaining(),
            });
        }
        let mut bytes = [0u8; MEMBER_ADDR_LEN];
        buf.copy_to_slice(&mut bytes);
        Ok(Self(bytes))
    }
}

impl fmt::Display for MemberAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // uuid-style grouping: 4-2-2-2-6
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
            b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15],
        )
    }
}

impl fmt::Debug for MemberAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemberAddress({self})")
    }
}
