//! A non-panicking cursor over a packet body.
//!
//! Every read advances a `&[u8]` slice in place and returns `io::Result`
//! instead of panicking on a short read.

use std::io;

use byteorder::{ByteOrder, LittleEndian};
use memchr::memchr;

pub(crate) trait Buf<'a> {
    fn advance(&mut self, cnt: usize);

    fn get_u8(&mut self) -> io::Result<u8>;
    fn get_i8(&mut self) -> io::Result<i8>;

    fn get_u16(&mut self) -> io::Result<u16>;
    fn get_i16(&mut self) -> io::Result<i16>;

    fn get_u24(&mut self) -> io::Result<u32>;

    fn get_u32(&mut self) -> io::Result<u32>;
    fn get_i32(&mut self) -> io::Result<i32>;

    fn get_u64(&mut self) -> io::Result<u64>;
    fn get_i64(&mut self) -> io::Result<i64>;

    fn get_f32(&mut self) -> io::Result<f32>;
    fn get_f64(&mut self) -> io::Result<f64>;

    /// Length-encoded integer; `None` for the `0xFB` null lead.
    fn get_lenenc_int(&mut self) -> io::Result<Option<u64>>;

    fn get_bytes(&mut self, len: usize) -> io::Result<&'a [u8]>;

    /// Length-encoded byte string; `None` for the `0xFB` null lead.
    fn get_lenenc_bytes(&mut self) -> io::Result<Option<&'a [u8]>>;

    /// NUL-terminated string, not including the terminator.
    fn get_str_nul(&mut self) -> io::Result<&'a str>;

    /// The remainder of the buffer as a UTF-8 string.
    fn get_str_eof(&mut self) -> io::Result<&'a str>;

    fn remaining(&self) -> usize;
}

fn eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of packet")
}

impl<'a> Buf<'a> for &'a [u8] {
    fn advance(&mut self, cnt: usize) {
        *self = &self[cnt..];
    }

    fn get_u8(&mut self) -> io::Result<u8> {
        if self.is_empty() {
            return Err(eof());
        }
        let val = self[0];
        self.advance(1);
        Ok(val)
    }

    fn get_i8(&mut self) -> io::Result<i8> {
        Ok(self.get_u8()? as i8)
    }

    fn get_u16(&mut self) -> io::Result<u16> {
        if self.len() < 2 {
            return Err(eof());
        }
        let val = LittleEndian::read_u16(self);
        self.advance(2);
        Ok(val)
    }

    fn get_i16(&mut self) -> io::Result<i16> {
        Ok(self.get_u16()? as i16)
    }

    fn get_u24(&mut self) -> io::Result<u32> {
        if self.len() < 3 {
            return Err(eof());
        }
        let val = LittleEndian::read_u24(self);
        self.advance(3);
        Ok(val)
    }

    fn get_u32(&mut self) -> io::Result<u32> {
        if self.len() < 4 {
            return Err(eof());
        }
        let val = LittleEndian::read_u32(self);
        self.advance(4);
        Ok(val)
    }

    fn get_i32(&mut self) -> io::Result<i32> {
        Ok(self.get_u32()? as i32)
    }

    fn get_u64(&mut self) -> io::Result<u64> {
        if self.len() < 8 {
            return Err(eof());
        }
        let val = LittleEndian::read_u64(self);
        self.advance(8);
        Ok(val)
    }

    fn get_i64(&mut self) -> io::Result<i64> {
        Ok(self.get_u64()? as i64)
    }

    fn get_f32(&mut self) -> io::Result<f32> {
        if self.len() < 4 {
            return Err(eof());
        }
        let val = LittleEndian::read_f32(self);
        self.advance(4);
        Ok(val)
    }

    fn get_f64(&mut self) -> io::Result<f64> {
        if self.len() < 8 {
            return Err(eof());
        }
        let val = LittleEndian::read_f64(self);
        self.advance(8);
        Ok(val)
    }

    fn get_lenenc_int(&mut self) -> io::Result<Option<u64>> {
        let lead = self.get_u8()?;
        Ok(Some(match lead {
            0xFB => return Ok(None),
            0xFC => self.get_u16()? as u64,
            0xFD => self.get_u24()? as u64,
            0xFE => self.get_u64()?,
            0xFF => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "0xFF is not a valid length-encoded integer lead",
                ))
            }
            small => small as u64,
        }))
    }

    fn get_bytes(&mut self, len: usize) -> io::Result<&'a [u8]> {
        if self.len() < len {
            return Err(eof());
        }
        let (head, tail) = self.split_at(len);
        *self = tail;
        Ok(head)
    }

    fn get_lenenc_bytes(&mut self) -> io::Result<Option<&'a [u8]>> {
        match self.get_lenenc_int()? {
            None => Ok(None),
            Some(len) => Ok(Some(self.get_bytes(len as usize)?)),
        }
    }

    fn get_str_nul(&mut self) -> io::Result<&'a str> {
        let nul_pos = memchr(b'\0', self).ok_or_else(eof)?;
        let bytes = self.get_bytes(nul_pos)?;
        self.advance(1);
        std::str::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn get_str_eof(&mut self) -> io::Result<&'a str> {
        let bytes = *self;
        self.advance(bytes.len());
        std::str::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn remaining(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenenc_int_small() {
        let mut buf: &[u8] = &[0x05];
        assert_eq!(buf.get_lenenc_int().unwrap(), Some(5));
    }

    #[test]
    fn lenenc_int_null() {
        let mut buf: &[u8] = &[0xFB];
        assert_eq!(buf.get_lenenc_int().unwrap(), None);
    }

    #[test]
    fn lenenc_int_u16() {
        let mut buf: &[u8] = &[0xFC, 0x2C, 0x01];
        assert_eq!(buf.get_lenenc_int().unwrap(), Some(300));
    }

    #[test]
    fn lenenc_int_u64() {
        let mut buf: &[u8] = &[0xFE, 1, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(buf.get_lenenc_int().unwrap(), Some(1));
    }

    #[test]
    fn str_nul_reads_to_terminator() {
        let mut buf: &[u8] = b"abc\0def";
        assert_eq!(buf.get_str_nul().unwrap(), "abc");
        assert_eq!(buf.get_str_eof().unwrap(), "def");
    }

    #[test]
    fn short_read_is_an_error_not_a_panic() {
        let mut buf: &[u8] = &[0x01];
        assert!(buf.get_u32().is_err());
    }
}
