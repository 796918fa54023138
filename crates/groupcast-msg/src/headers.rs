//! The per-message header multiplexer.
//!
//! Every protocol layer attaches at most one header to a message, keyed by
//! its protocol id. Headers are opaque to the envelope: they know their own
//! magic id and encode themselves.
//!
//! The container is built for the access pattern of a protocol stack:
//! mostly reads, occasional single-header inserts, and concurrent readers
//! (a retransmitter inspecting a message while an upper layer still
//! annotates it). Mutation is copy-on-write: the replacement storage is
//! built fully, then published with one `Arc` swap, so a reader always
//! observes either the old or the new storage, never a half-built one.

use std::any::Any;
use std::fmt;
use std::fmt::Write;
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::RwLock;

use crate::error::{MessageError, Result};

/// Per-entry wire overhead: 2-byte protocol id + 2-byte magic id.
pub const HEADER_OVERHEAD: usize = 4;

/// Maximum number of headers one message can carry; the wire header count
/// is a `u16`.
pub const MAX_HEADERS: usize = u16::MAX as usize;

/// Initial capacity of a freshly created header table.
const DEFAULT_CAPACITY: usize = 3;

/// Opaque per-layer metadata attached to a message.
///
/// A header belongs to exactly one protocol layer. It carries a magic id
/// identifying its concrete type for reconstruction on decode, and encodes
/// its own body. Headers shared across message copies must never be mutated
/// in place; replace them via [`Headers::put`] instead.
pub trait Header: fmt::Debug + Send + Sync {
    /// Magic id used to look up the decoder on the receiving side.
    fn magic_id(&self) -> u16;

    /// Exact number of bytes `write_to` will produce for the body.
    fn serialized_size(&self) -> usize;

    /// Append the header body to `out`.
    fn write_to(&self, out: &mut BytesMut);

    /// Downcast hook for the owning protocol layer.
    fn as_any(&self) -> &dyn Any;
}

/// One occupied slot: a header tagged with the protocol id it was stored
/// under.
#[derive(Clone)]
pub struct HeaderEntry {
    pub prot_id: u16,
    pub header: Arc<dyn Header>,
}

/// Compact associative container mapping protocol ids to headers.
///
/// Keys are unique; iteration order is insertion order. An id of 0 may be
/// stored but can never be retrieved through [`Headers::get`] — callers
/// doing lookups must hold a real protocol id. This asymmetry is
/// deliberate and load-bearing; see the `id_zero` tests.
pub struct Headers {
    entries: RwLock<Arc<Vec<HeaderEntry>>>,
}

impl Headers {
    /// Create an empty table with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty table pre-sized for `capacity` entries. Used by the
    /// decoder, which knows the exact header count up front.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::with_capacity(capacity.max(1)))),
        }
    }

    /// Insert a header under `id`, overwriting any existing entry.
    ///
    /// Inserts are mutually exclusive with each other but never invalidate
    /// a snapshot a concurrent reader already holds. A new id is rejected
    /// with [`MessageError::TooManyHeaders`] once the table holds
    /// [`MAX_HEADERS`] entries, keeping the count within the wire field;
    /// overwrites never grow the table and always succeed.
    pub fn put(&self, id: u16, header: Arc<dyn Header>) -> Result<()> {
        let mut guard = self.entries.write();
        let mut next: Vec<HeaderEntry> = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        match next.iter_mut().find(|entry| entry.prot_id == id) {
            Some(entry) => entry.header = header,
            None => {
                if next.len() >= MAX_HEADERS {
                    return Err(MessageError::TooManyHeaders { max: MAX_HEADERS });
                }
                next.push(HeaderEntry { prot_id: id, header });
            }
        }
        *guard = Arc::new(next);
        Ok(())
    }

    /// Look up the header stored under `id`.
    ///
    /// `id` must be a real protocol id (> 0); passing 0 is a caller bug and
    /// fails with [`MessageError::InvalidProtocolId`].
    pub fn get(&self, id: u16) -> Result<Option<Arc<dyn Header>>> {
        if id == 0 {
            return Err(MessageError::InvalidProtocolId(id));
        }
        let snapshot = self.snapshot();
        Ok(snapshot
            .iter()
            .find(|entry| entry.prot_id == id)
            .map(|entry| Arc::clone(&entry.header)))
    }

    /// Number of occupied entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if no headers are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// A stable snapshot of the current entries, in insertion order.
    ///
    /// The snapshot is decoupled from subsequent mutation; serialization
    /// and printing iterate over it without holding any lock.
    pub fn snapshot(&self) -> Arc<Vec<HeaderEntry>> {
        Arc::clone(&self.entries.read())
    }

    /// Shallow copy: fresh backing storage, shared header references.
    ///
    /// Header objects are not cloned. A layer that wants to change a header
    /// on one of the copies must build a new header and `put` it.
    pub fn shallow_copy(&self) -> Self {
        let snapshot = self.snapshot();
        Self {
            entries: RwLock::new(Arc::new(snapshot.as_ref().clone())),
        }
    }

    /// Total wire size of all entries: per-entry overhead plus each
    /// header's own body size.
    pub fn marshalled_size(&self) -> usize {
        self.snapshot()
            .iter()
            .map(|entry| HEADER_OVERHEAD + entry.header.serialized_size())
            .sum()
    }

    /// Compact `id: header` rendering for diagnostics.
    pub fn print_headers(&self) -> String {
        let mut out = String::new();
        for entry in self.snapshot().iter() {
            if !out.is_empty() {
                out.push_str(", ");
            }
            let _ = write!(out, "{}: {:?}", entry.prot_id, entry.header);
        }
        out
    }
}

impl Default for Headers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Headers {{ {} }}", self.print_headers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::SeqnoHeader;

    fn seqno(n: u64) -> Arc<dyn Header> {
        Arc::new(SeqnoHeader::new(n))
    }

    #[test]
    fn put_and_get() {
        let headers = Headers::new();
        headers.put(3, seqno(1)).unwrap();
        headers.put(7, seqno(2)).unwrap();

        assert_eq!(headers.len(), 2);
        let hdr = headers.get(7).unwrap().unwrap();
        assert_eq!(
            hdr.as_any().downcast_ref::<SeqnoHeader>().unwrap().seqno(),
            2
        );
        assert!(headers.get(9).unwrap().is_none());
    }

    #[test]
    fn put_overwrites_existing_id() {
        let headers = Headers::new();
        headers.put(3, seqno(1)).unwrap();
        headers.put(3, seqno(99)).unwrap();

        assert_eq!(headers.len(), 1);
        let hdr = headers.get(3).unwrap().unwrap();
        assert_eq!(
            hdr.as_any().downcast_ref::<SeqnoHeader>().unwrap().seqno(),
            99
        );
    }

    #[test]
    fn insertion_order_is_preserved() {
        let headers = Headers::with_capacity(1);
        for id in [5u16, 2, 9, 1] {
            headers.put(id, seqno(u64::from(id))).unwrap();
        }
        let ids: Vec<u16> = headers.snapshot().iter().map(|e| e.prot_id).collect();
        assert_eq!(ids, vec![5, 2, 9, 1]);
    }

    #[test]
    fn id_zero_may_be_stored_but_not_retrieved() {
        let headers = Headers::new();
        headers.put(0, seqno(1)).unwrap();
        assert_eq!(headers.len(), 1);

        // Deliberate quirk: lookups need a real protocol id.
        assert!(matches!(
            headers.get(0),
            Err(MessageError::InvalidProtocolId(0))
        ));
    }

    #[test]
    fn put_fails_when_count_field_would_overflow() {
        // Build a full table directly; 65535 puts would be quadratic.
        let full: Vec<HeaderEntry> = (0..u16::MAX)
            .map(|id| HeaderEntry {
                prot_id: id,
                header: seqno(0),
            })
            .collect();
        let headers = Headers {
            entries: RwLock::new(Arc::new(full)),
        };
        assert_eq!(headers.len(), MAX_HEADERS);

        assert!(matches!(
            headers.put(u16::MAX, seqno(1)),
            Err(MessageError::TooManyHeaders { max: MAX_HEADERS })
        ));

        // Overwrites never grow the table, so they still succeed.
        headers.put(7, seqno(9)).unwrap();
        assert_eq!(headers.len(), MAX_HEADERS);
    }

    #[test]
    fn snapshot_survives_mutation() {
        let headers = Headers::new();
        headers.put(1, seqno(1)).unwrap();
        let snapshot = headers.snapshot();

        headers.put(2, seqno(2)).unwrap();
        headers.put(1, seqno(3)).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot[0]
                .header
                .as_any()
                .downcast_ref::<SeqnoHeader>()
                .unwrap()
                .seqno(),
            1
        );
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn shallow_copy_shares_header_references() {
        let headers = Headers::new();
        let hdr = seqno(7);
        headers.put(4, Arc::clone(&hdr)).unwrap();

        let copy = headers.shallow_copy();
        let copied = copy.get(4).unwrap().unwrap();
        assert!(Arc::ptr_eq(&copied, &hdr));

        // Mutating the copy must not affect the original.
        copy.put(4, seqno(8)).unwrap();
        let original = headers.get(4).unwrap().unwrap();
        assert!(Arc::ptr_eq(&original, &hdr));
    }

    #[test]
    fn marshalled_size_counts_overhead_and_bodies() {
        let headers = Headers::new();
        headers.put(1, seqno(1)).unwrap();
        headers.put(2, seqno(2)).unwrap();

        let body = SeqnoHeader::new(0).serialized_size();
        assert_eq!(headers.marshalled_size(), 2 * (HEADER_OVERHEAD + body));
    }

    #[test]
    fn print_headers_lists_entries() {
        let headers = Headers::new();
        assert_eq!(headers.print_headers(), "");
        headers.put(3, seqno(42)).unwrap();
        assert!(headers.print_headers().starts_with("3: "));
    }
}
