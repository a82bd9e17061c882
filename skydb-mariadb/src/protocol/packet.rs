//! Packet framing: 3-byte little-endian length + 1-byte sequence number,
//! with 16 MiB continuation framing in both directions.

use std::io::{self, Read, Write};

use byteorder::{ByteOrder, LittleEndian};

use skydb_core::{Error, Result};

/// Maximum payload carried by a single wire frame, `2^24 - 1`.
pub(crate) const MAX_FRAME_LEN: usize = 0x00FF_FFFF;

/// Framed read/write over a raw byte stream, tracking the per-command
/// sequence counter.
pub(crate) struct PacketStream<S> {
    inner: S,
    next_seq_no: u8,
}

impl<S: Read + Write> PacketStream<S> {
    pub(crate) fn new(inner: S) -> Self {
        Self { inner, next_seq_no: 0 }
    }

    pub(crate) fn into_inner(self) -> S {
        self.inner
    }

    pub(crate) fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Resets the sequence counter at the start of a new client-initiated
    /// command exchange.
    pub(crate) fn start_sequence(&mut self) {
        self.next_seq_no = 0;
    }

    /// Reads one logical packet, transparently reassembling continuation
    /// frames. Enforces that the first frame's sequence number is exactly
    /// the expected next one.
    pub(crate) fn read_packet(&mut self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        let mut first = true;

        loop {
            let mut header = [0u8; 4];
            self.inner.read_exact(&mut header).map_err(io_to_error)?;

            let len = LittleEndian::read_u24(&header[..3]) as usize;
            let seq = header[3];

            if first {
                if seq != self.next_seq_no {
                    return Err(Error::ProtocolError(format!(
                        "out-of-sequence packet: expected {}, got {}",
                        self.next_seq_no, seq
                    )));
                }
                first = false;
            }
            self.next_seq_no = seq.wrapping_add(1);

            let mut chunk = vec![0u8; len];
            self.inner.read_exact(&mut chunk).map_err(io_to_error)?;
            body.extend_from_slice(&chunk);

            if len < MAX_FRAME_LEN {
                break;
            }
        }

        Ok(body)
    }

    /// Writes one logical packet, splitting it into continuation frames if
    /// it exceeds `MAX_FRAME_LEN`. Emits a trailing zero-length frame when
    /// the body is an exact multiple of `MAX_FRAME_LEN`.
    pub(crate) fn write_packet(&mut self, body: &[u8]) -> Result<()> {
        let mut offset = 0;

        loop {
            let remaining = body.len() - offset;
            let chunk_len = remaining.min(MAX_FRAME_LEN);
            let chunk = &body[offset..offset + chunk_len];

            let mut header = [0u8; 4];
            LittleEndian::write_u24(&mut header[..3], chunk_len as u32);
            header[3] = self.next_seq_no;
            self.next_seq_no = self.next_seq_no.wrapping_add(1);

            self.inner.write_all(&header).map_err(io_to_error)?;
            self.inner.write_all(chunk).map_err(io_to_error)?;

            offset += chunk_len;

            if chunk_len < MAX_FRAME_LEN {
                break;
            }
            if offset == body.len() {
                // exact multiple: terminate with a zero-length frame
                let mut header = [0u8; 4];
                header[3] = self.next_seq_no;
                self.next_seq_no = self.next_seq_no.wrapping_add(1);
                self.inner.write_all(&header).map_err(io_to_error)?;
                break;
            }
        }

        self.inner.flush().map_err(io_to_error)?;
        Ok(())
    }
}

fn io_to_error(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof
        || err.kind() == io::ErrorKind::ConnectionReset
        || err.kind() == io::ErrorKind::ConnectionAborted
        || err.kind() == io::ErrorKind::BrokenPipe
    {
        Error::ConnectionLost
    } else {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Default)]
    struct LoopBuf {
        data: Vec<u8>,
        pos: usize,
    }

    impl Read for LoopBuf {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let remaining = &self.data[self.pos..];
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.pos += n;
            Ok(n)
        }
    }

    impl Write for LoopBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn small_packet_round_trips() {
        let mut stream = PacketStream::new(LoopBuf::default());
        stream.write_packet(b"hello").unwrap();
        stream.start_sequence();
        let body = stream.read_packet().unwrap();
        assert_eq!(body, b"hello");
    }

    #[test]
    fn rejects_out_of_sequence_reply() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&[3, 0, 0, 5]); // len=3, seq=5 (unexpected)
        raw.extend_from_slice(b"abc");
        let cursor = Cursor::new(raw);
        let mut stream = PacketStream::new(cursor);
        let err = stream.read_packet().unwrap_err();
        assert!(matches!(err, Error::ProtocolError(_)));
    }
}
