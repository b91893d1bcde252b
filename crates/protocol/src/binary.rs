//! Binary reading and writing utilities.
//!
//! All values are little-endian. Strings are UTF-8 and NUL-terminated.

use crate::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Longest string field accepted from a client, terminator excluded.
pub const MAX_STRING_LEN: usize = 256;

/// A reader for parsing binary protocol messages.
///
/// Every read is checked; running off the end yields
/// [`ProtocolError::UnexpectedEof`] instead of panicking.
#[derive(Debug)]
pub struct BinaryReader {
    buf: Bytes,
}

impl BinaryReader {
    /// Create a new reader from raw bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { buf: data.into() }
    }

    /// Returns remaining bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    #[inline]
    fn ensure(&self, n: usize) -> Result<(), ProtocolError> {
        if self.buf.remaining() >= n {
            Ok(())
        } else {
            Err(ProtocolError::UnexpectedEof)
        }
    }

    #[inline]
    pub fn get_u8(&mut self) -> Result<u8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    #[inline]
    pub fn get_u16(&mut self) -> Result<u16, ProtocolError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    #[inline]
    pub fn get_u32(&mut self) -> Result<u32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    #[inline]
    pub fn get_u64(&mut self) -> Result<u64, ProtocolError> {
        self.ensure(8)?;
        Ok(self.buf.get_u64_le())
    }

    #[inline]
    pub fn get_f32(&mut self) -> Result<f32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_f32_le())
    }

    /// Read a NUL-terminated UTF-8 string of at most `max_len` bytes.
    pub fn get_string(&mut self, max_len: usize) -> Result<String, ProtocolError> {
        let end = self
            .buf
            .iter()
            .position(|&b| b == 0)
            .ok_or(ProtocolError::UnexpectedEof)?;
        if end > max_len {
            return Err(ProtocolError::StringTooLong { max: max_len });
        }
        let raw = self.buf.split_to(end);
        self.buf.advance(1);
        String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }
}

/// A writer for building binary protocol messages.
#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: BytesMut,
}

impl BinaryWriter {
    /// Create a new writer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new writer with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Returns the current length.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    #[inline]
    pub fn put_u16(&mut self, v: u16) {
        self.buf.put_u16_le(v);
    }

    #[inline]
    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    #[inline]
    pub fn put_u64(&mut self, v: u64) {
        self.buf.put_u64_le(v);
    }

    #[inline]
    pub fn put_f32(&mut self, v: f32) {
        self.buf.put_f32_le(v);
    }

    /// Write a NUL-terminated UTF-8 string. Interior NULs are dropped.
    pub fn put_string(&mut self, s: &str) {
        for b in s.bytes().filter(|&b| b != 0) {
            self.buf.put_u8(b);
        }
        self.buf.put_u8(0);
    }

    /// Consume the writer and return the built buffer.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    /// Get current buffer as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_reads_up_to_terminator() {
        let mut w = BinaryWriter::new();
        w.put_string("hello");
        w.put_u8(7);
        let mut r = BinaryReader::new(w.finish());
        assert_eq!(r.get_string(MAX_STRING_LEN).unwrap(), "hello");
        assert_eq!(r.get_u8().unwrap(), 7);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_short_buffer_is_eof() {
        let mut r = BinaryReader::new(vec![1u8, 2]);
        assert_eq!(r.get_u32(), Err(ProtocolError::UnexpectedEof));
    }

    #[test]
    fn test_unterminated_string_is_eof() {
        let mut r = BinaryReader::new(b"abc".to_vec());
        assert_eq!(r.get_string(16), Err(ProtocolError::UnexpectedEof));
    }

    #[test]
    fn test_string_length_limit() {
        let mut w = BinaryWriter::new();
        w.put_string("abcdef");
        let mut r = BinaryReader::new(w.finish());
        assert_eq!(r.get_string(3), Err(ProtocolError::StringTooLong { max: 3 }));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut r = BinaryReader::new(vec![0xFFu8, 0xFE, 0x00]);
        assert_eq!(r.get_string(16), Err(ProtocolError::InvalidUtf8));
    }

    #[test]
    fn test_writer_drops_interior_nul() {
        let mut w = BinaryWriter::new();
        w.put_string("a\0b");
        assert_eq!(w.as_slice(), b"ab\0");
    }
}
