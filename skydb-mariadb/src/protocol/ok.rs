use skydb_core::{Error, Result};

use crate::io::buf::Buf;

#[derive(Debug, Default)]
pub(crate) struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: u16,
    pub warnings: u16,
}

impl OkPacket {
    pub(crate) fn decode(mut buf: &[u8]) -> Result<Self> {
        let header = buf.get_u8().map_err(proto_err)?;
        if header != 0x00 && header != 0xFE {
            return Err(Error::ProtocolError(format!(
                "expected OK packet header (0x00/0xFE), got 0x{:02X}",
                header
            )));
        }

        let affected_rows = buf.get_lenenc_int().map_err(proto_err)?.unwrap_or(0);
        let last_insert_id = buf.get_lenenc_int().map_err(proto_err)?.unwrap_or(0);
        let status_flags = buf.get_u16().unwrap_or(0);
        let warnings = buf.get_u16().unwrap_or(0);

        Ok(Self { affected_rows, last_insert_id, status_flags, warnings })
    }
}

fn proto_err(err: std::io::Error) -> Error {
    Error::ProtocolError(err.to_string())
}
