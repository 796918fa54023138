//! Addresses, codec traits and payload marshalling for the groupcast stack.
//!
//! This crate defines the interfaces the message layer consumes:
//! - [`Address`]: the identity of a cluster member, with an exact wire codec
//! - [`Marshaller`]: pluggable object (de)serialization for message payloads
//!
//! Everything here is transport-agnostic. The message layer
//! (`groupcast-msg`) composes these into framed envelopes.

pub mod address;
pub mod error;
pub mod marshal;

pub use address::{Address, MemberAddress, MEMBER_ADDR_LEN};
pub use error::{Result, WireError};
pub use marshal::{JsonMarshaller, Marshaller};
