use groupcast_wire::WireError;

/// Errors raised by the message envelope and its codec.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// A protocol id that is not valid for the attempted operation.
    /// Header lookup requires a real (non-zero) protocol id.
    #[error("protocol id {0} is invalid for header lookup")]
    InvalidProtocolId(u16),

    /// Payload offset/length outside the bounds of the buffer. Never
    /// silently clamped.
    #[error("payload range out of bounds (offset {offset}, length {length}, buffer size {size})")]
    Bounds {
        offset: usize,
        length: usize,
        size: usize,
    },

    /// Payload longer than the wire length field can describe.
    #[error("payload too large ({length} bytes, max {max})")]
    PayloadTooLarge { length: usize, max: usize },

    /// The header table already holds as many entries as the wire count
    /// field can describe.
    #[error("header table full (max {max} entries)")]
    TooManyHeaders { max: usize },

    /// Decode encountered a header magic id with no registered decoder.
    /// Fatal for the whole message: reconstruction is aborted.
    #[error("no header decoder registered for magic id {0}")]
    UnknownHeader(u16),

    /// Decode encountered a message type tag with no registered factory.
    #[error("no message factory registered for type tag {0}")]
    UnknownMessage(u8),

    /// The frame ended before its declared contents.
    #[error("truncated frame (needed {needed} bytes, {remaining} remaining)")]
    Truncated { needed: usize, remaining: usize },

    /// Address codec or payload marshalling failure.
    #[error(transparent)]
    Wire(#[from] WireError),
}

pub type Result<T> = std::result::Result<T, MessageError>;
