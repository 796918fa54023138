//! Delivery flags carried by every message.
//!
//! Two disjoint vocabularies: [`Flag`] bits are marshalled with the message
//! and influence handling across the cluster; [`TransientFlag`] bits are
//! process-local bookkeeping and never hit the wire.

use std::fmt::Write;

/// Persistent, marshalled flags. Stored as a `u16` on the wire.
///
/// The numeric values are part of the wire contract and must not change.
/// Note the gap at `1 << 3`: a historical flag was retired and its bit is
/// kept reserved so old and new nodes agree on the remaining values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Flag {
    /// Out-of-band: deliver without waiting for ordered delivery.
    Oob = 1,
    /// Don't bundle this message with others at the transport.
    DontBundle = 1 << 1,
    /// Bypass flow control.
    NoFc = 1 << 2,
    /// Bypass reliability (no retransmission tracking).
    NoReliability = 1 << 4,
    /// Bypass total-order delivery.
    NoTotalOrder = 1 << 5,
    /// Bypass site relaying.
    NoRelay = 1 << 6,
    /// Request an ack for a multicast.
    Rsvp = 1 << 7,
    /// Non-blocking variant of [`Flag::Rsvp`].
    RsvpNb = 1 << 8,
    /// Reserved for internal control traffic.
    Internal = 1 << 9,
    /// Pass through a closed barrier.
    SkipBarrier = 1 << 10,
}

impl Flag {
    /// The bit this flag occupies in the persistent flag word.
    pub const fn value(self) -> u16 {
        self as u16
    }

    /// All persistent flags, in bit order.
    pub const ALL: [Flag; 10] = [
        Flag::Oob,
        Flag::DontBundle,
        Flag::NoFc,
        Flag::NoReliability,
        Flag::NoTotalOrder,
        Flag::NoRelay,
        Flag::Rsvp,
        Flag::RsvpNb,
        Flag::Internal,
        Flag::SkipBarrier,
    ];

    fn name(self) -> &'static str {
        match self {
            Flag::Oob => "OOB",
            Flag::DontBundle => "DONT_BUNDLE",
            Flag::NoFc => "NO_FC",
            Flag::NoReliability => "NO_RELIABILITY",
            Flag::NoTotalOrder => "NO_TOTAL_ORDER",
            Flag::NoRelay => "NO_RELAY",
            Flag::Rsvp => "RSVP",
            Flag::RsvpNb => "RSVP_NB",
            Flag::Internal => "INTERNAL",
            Flag::SkipBarrier => "SKIP_BARRIER",
        }
    }
}

/// Transient, process-local flags. Never marshalled. Stored as a `u8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransientFlag {
    /// The message was already delivered out-of-band; regular delivery
    /// must skip it.
    OobDelivered = 1,
    /// Don't loop a multicast back up to the sender.
    DontLoopback = 1 << 1,
}

impl TransientFlag {
    /// The bit this flag occupies in the transient flag word.
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// All transient flags, in bit order.
    pub const ALL: [TransientFlag; 2] = [TransientFlag::OobDelivered, TransientFlag::DontLoopback];

    fn name(self) -> &'static str {
        match self {
            TransientFlag::OobDelivered => "OOB_DELIVERED",
            TransientFlag::DontLoopback => "DONT_LOOPBACK",
        }
    }
}

/// Render a persistent flag word as `FLAG|FLAG|...` for diagnostics.
pub fn flags_to_string(flags: u16) -> String {
    join_set(Flag::ALL.iter().filter(|f| flags & f.value() != 0).map(|f| f.name()))
}

/// Render a transient flag word for diagnostics.
pub fn transient_flags_to_string(flags: u8) -> String {
    join_set(
        TransientFlag::ALL
            .iter()
            .filter(|f| flags & f.value() != 0)
            .map(|f| f.name()),
    )
}

fn join_set<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for name in names {
        if !out.is_empty() {
            out.push('|');
        }
        let _ = write!(out, "{name}");
    }
    out
}
