//! Bounds-checked primitive reads for frame decoding.
//!
//! All wire integers are big-endian; the frame layout is an interop
//! contract shared with other implementations.

use bytes::{Buf, Bytes};

use crate::error::{MessageError, Result};

pub(crate) fn read_u8(buf: &mut Bytes) -> Result<u8> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

pub(crate) fn read_u16(buf: &mut Bytes) -> Result<u16> {
    ensure(buf, 2)?;
    Ok(buf.get_u16())
}

pub(crate) fn read_i32(buf: &mut Bytes) -> Result<i32> {
    ensure(buf, 4)?;
    Ok(buf.get_i32())
}

pub(crate) fn read_bytes(buf: &mut Bytes, len: usize) -> Result<Bytes> {
    ensure(buf, len)?;
    Ok(buf.copy_to_bytes(len))
}

fn ensure(buf: &Bytes, needed: usize) -> Result<()> {
    let remaining = buf.remaining();
    if remaining < needed {
        return Err(MessageError::Truncated { needed, remaining });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_consume_in_order() {
        let mut buf = Bytes::from_static(&[0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0xaa]);
        assert_eq!(read_u8(&mut buf).unwrap(), 1);
        assert_eq!(read_u16(&mut buf).unwrap(), 2);
        assert_eq!(read_i32(&mut buf).unwrap(), 3);
        assert_eq!(read_bytes(&mut buf, 1).unwrap().as_ref(), &[0xaa]);
        assert!(buf.is_empty());
    }

    #[test]
    fn truncated_reads_fail() {
        let mut buf = Bytes::from_static(&[0x00]);
        assert!(matches!(
            read_u16(&mut buf),
            Err(MessageError::Truncated {
                needed: 2,
                remaining: 1
            })
        ));
    }

    #[test]
    fn negative_i32_roundtrips() {
        let mut buf = Bytes::copy_from_slice(&(-1i32).to_be_bytes());
        assert_eq!(read_i32(&mut buf).unwrap(), -1);
    }
}
