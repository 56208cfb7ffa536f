//! Primitive encoding helpers.
//!
//! All multi-byte integers are big-endian. Strings and tables carry a `u16`
//! length prefix.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{UnitError, UnitResult};

/// Writes a `u16` element count, failing if `len` does not fit.
pub(crate) fn put_count(buf: &mut BytesMut, len: usize, table: &'static str) -> UnitResult<()> {
    let count = u16::try_from(len).map_err(|_| UnitError::TableOverflow(table))?;
    buf.put_u16(count);
    Ok(())
}

/// Writes a length-prefixed UTF-8 string.
pub(crate) fn put_str(buf: &mut BytesMut, value: &str) -> UnitResult<()> {
    let len = u16::try_from(value.len()).map_err(|_| UnitError::StringTooLong(value.len()))?;
    buf.put_u16(len);
    buf.put_slice(value.as_bytes());
    Ok(())
}

/// Bounds-checked reader over an encoded unit.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub(crate) const fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, n: usize, context: &'static str) -> UnitResult<()> {
        if self.buf.remaining() < n {
            return Err(UnitError::Truncated {
                context,
                needed: n - self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub(crate) fn u8(&mut self, context: &'static str) -> UnitResult<u8> {
        self.need(1, context)?;
        Ok(self.buf.get_u8())
    }

    pub(crate) fn u16(&mut self, context: &'static str) -> UnitResult<u16> {
        self.need(2, context)?;
        Ok(self.buf.get_u16())
    }

    pub(crate) fn u32(&mut self, context: &'static str) -> UnitResult<u32> {
        self.need(4, context)?;
        Ok(self.buf.get_u32())
    }

    pub(crate) fn i32(&mut self, context: &'static str) -> UnitResult<i32> {
        self.need(4, context)?;
        Ok(self.buf.get_i32())
    }

    pub(crate) fn u64(&mut self, context: &'static str) -> UnitResult<u64> {
        self.need(8, context)?;
        Ok(self.buf.get_u64())
    }

    pub(crate) fn i64(&mut self, context: &'static str) -> UnitResult<i64> {
        self.need(8, context)?;
        Ok(self.buf.get_i64())
    }

    pub(crate) fn array<const N: usize>(&mut self, context: &'static str) -> UnitResult<[u8; N]> {
        self.need(N, context)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    pub(crate) fn string(&mut self, context: &'static str) -> UnitResult<String> {
        let len = usize::from(self.u16(context)?);
        self.need(len, context)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        std::str::from_utf8(head)
            .map(str::to_string)
            .map_err(|_| UnitError::InvalidUtf8(context))
    }
}
