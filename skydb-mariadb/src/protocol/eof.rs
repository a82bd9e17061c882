use skydb_core::{Error, Result};

use crate::io::buf::Buf;

#[derive(Debug, Default)]
pub(crate) struct EofPacket {
    pub warnings: u16,
    pub status_flags: u16,
}

impl EofPacket {
    pub(crate) fn decode(mut buf: &[u8]) -> Result<Self> {
        let header = buf.get_u8().map_err(proto_err)?;
        if header != 0xFE {
            return Err(Error::ProtocolError(format!(
                "expected EOF packet header (0xFE), got 0x{:02X}",
                header
            )));
        }

        let warnings = buf.get_u16().unwrap_or(0);
        let status_flags = buf.get_u16().unwrap_or(0);

        Ok(Self { warnings, status_flags })
    }
}

fn proto_err(err: std::io::Error) -> Error {
    Error::ProtocolError(err.to_string())
}
