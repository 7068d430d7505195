//! Big-endian byte buffers for the binary key layouts.
//!
//! [`LayoutWriter`] builds fixed-size records (the 78-byte extended key) and
//! rejects any field whose width does not match the layout. [`SshWriter`]
//! builds the length-prefixed SSH wire encoding. [`Reader`] walks a fixed
//! record back field by field.

use crate::error::{KeyError, Result};

fn width_error(field: &str, expected: usize, got: usize) -> KeyError {
    KeyError::EncodingError(format!("{field}: expected {expected} bytes, got {got}"))
}

/// Fixed-capacity writer for a record of exactly `N` bytes.
pub struct LayoutWriter<const N: usize> {
    buf: [u8; N],
    pos: usize,
}

impl<const N: usize> LayoutWriter<N> {
    pub fn new() -> Self {
        LayoutWriter {
            buf: [0u8; N],
            pos: 0,
        }
    }

    pub fn put_u8(&mut self, field: &str, value: u8) -> Result<&mut Self> {
        self.put(field, &[value], 1)
    }

    pub fn put_u32(&mut self, field: &str, value: u32) -> Result<&mut Self> {
        self.put(field, &value.to_be_bytes(), 4)
    }

    /// Write `bytes` as a field that must be exactly `width` bytes wide.
    pub fn put(&mut self, field: &str, bytes: &[u8], width: usize) -> Result<&mut Self> {
        if bytes.len() != width {
            return Err(width_error(field, width, bytes.len()));
        }
        let end = self.pos + width;
        if end > N {
            return Err(KeyError::EncodingError(format!(
                "{field}: layout overflow at offset {} (capacity {N})",
                self.pos
            )));
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(self)
    }

    /// Return the record, failing if any byte was left unwritten.
    pub fn finish(&self) -> Result<[u8; N]> {
        if self.pos != N {
            return Err(KeyError::EncodingError(format!(
                "layout incomplete: wrote {} of {N} bytes",
                self.pos
            )));
        }
        Ok(self.buf)
    }
}

impl<const N: usize> Default for LayoutWriter<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Growable writer for the SSH wire format (RFC 4251 `uint32` and `string`).
#[derive(Debug, Default)]
pub struct SshWriter {
    buf: Vec<u8>,
}

impl SshWriter {
    pub fn new() -> Self {
        SshWriter { buf: Vec::new() }
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Length-prefixed byte string.
    pub fn string(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| KeyError::EncodingError("string longer than u32::MAX".to_string()))?;
        self.u32(len);
        self.buf.extend_from_slice(bytes);
        Ok(self)
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a byte slice; every read checks the remaining length.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    pub fn take(&mut self, field: &str, len: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(width_error(field, len, remaining));
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn array<const M: usize>(&mut self, field: &str) -> Result<[u8; M]> {
        let mut out = [0u8; M];
        out.copy_from_slice(self.take(field, M)?);
        Ok(out)
    }

    pub fn u8(&mut self, field: &str) -> Result<u8> {
        Ok(self.array::<1>(field)?[0])
    }

    pub fn u32(&mut self, field: &str) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array::<4>(field)?))
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Fail if any input was left unread.
    pub fn finish(&self, what: &str) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(KeyError::EncodingError(format!(
                "{what}: {n} trailing bytes"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_writer_exact_fill() {
        let mut w = LayoutWriter::<9>::new();
        w.put_u32("version", 0x0488ade4)
            .unwrap()
            .put_u8("depth", 7)
            .unwrap()
            .put("tag", &[1, 2, 3, 4], 4)
            .unwrap();
        assert_eq!(w.finish().unwrap(), [0x04, 0x88, 0xad, 0xe4, 7, 1, 2, 3, 4]);
    }

    #[test]
    fn test_layout_writer_rejects_wrong_width() {
        let mut w = LayoutWriter::<8>::new();
        let err = w.put("chain code", &[0u8; 31], 32).err().unwrap();
        assert_eq!(
            err,
            KeyError::EncodingError("chain code: expected 32 bytes, got 31".to_string())
        );
    }

    #[test]
    fn test_layout_writer_rejects_overflow_and_short() {
        let mut w = LayoutWriter::<4>::new();
        w.put_u8("a", 1).unwrap();
        assert!(w.put_u32("b", 2).is_err());
        assert!(w.finish().is_err());
    }

    #[test]
    fn test_ssh_string_layout() {
        let mut w = SshWriter::new();
        w.string(b"ssh-ed25519").unwrap().u32(42);
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        assert_eq!(r.u32("len").unwrap(), 11);
        assert_eq!(r.take("name", 11).unwrap(), b"ssh-ed25519");
        assert_eq!(r.u32("n").unwrap(), 42);
        r.finish("test").unwrap();
    }

    #[test]
    fn test_reader_truncated_field() {
        let bytes = [0u8, 0, 0, 10, 1, 2, 3];
        let mut r = Reader::new(&bytes);
        assert_eq!(r.u32("len").unwrap(), 10);
        assert_eq!(
            r.array::<10>("blob").err(),
            Some(KeyError::EncodingError("blob: expected 10 bytes, got 3".to_string()))
        );
        assert_eq!(r.remaining(), 3);
        assert!(r.finish("test").is_err());
    }
}
