use skydb_core::{Error, Result};

use crate::io::buf::Buf;

#[derive(Debug)]
pub(crate) struct ErrPacket {
    pub code: u16,
    pub sqlstate: Option<String>,
    pub message: String,
}

impl ErrPacket {
    pub(crate) fn decode(mut buf: &[u8]) -> Result<Self> {
        let header = buf.get_u8().map_err(proto_err)?;
        if header != 0xFF {
            return Err(Error::ProtocolError(format!(
                "expected ERR packet header (0xFF), got 0x{:02X}",
                header
            )));
        }

        let code = buf.get_u16().map_err(proto_err)?;

        let sqlstate = if buf.remaining() > 0 && buf.remaining() >= 6 && buf[0] == b'#' {
            buf.advance(1);
            let marker = buf.get_bytes(5).map_err(proto_err)?;
            Some(String::from_utf8_lossy(marker).to_string())
        } else {
            None
        };

        let message = buf.get_str_eof().map_err(proto_err)?.to_string();

        Ok(Self { code, sqlstate, message })
    }

    /// Surfaces this packet as `Error::ServerError` (for mid-command
    /// replies) or `Error::HandshakeFailed` (for login-time replies).
    pub(crate) fn as_server_error(self) -> Error {
        Error::ServerError { code: self.code, sqlstate: self.sqlstate, message: self.message }
    }

    pub(crate) fn as_handshake_failed(self) -> Error {
        Error::HandshakeFailed { code: self.code, sqlstate: self.sqlstate, message: self.message }
    }
}

fn proto_err(err: std::io::Error) -> Error {
    Error::ProtocolError(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_code_sqlstate_and_message() {
        let mut packet = vec![0xFF];
        packet.extend_from_slice(&[0x15, 0x04]); // code = 1045
        packet.extend_from_slice(b"#28000");
        packet.extend_from_slice(b"Access denied");

        let err = ErrPacket::decode(&packet).unwrap();
        assert_eq!(err.code, 1045);
        assert_eq!(err.sqlstate.as_deref(), Some("28000"));
        assert_eq!(err.message, "Access denied");
    }
}
