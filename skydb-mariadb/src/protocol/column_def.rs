use skydb_core::{Error, Result};

use crate::io::buf::Buf;
use crate::protocol::types::ColumnType;

#[derive(Debug)]
pub(crate) struct ColumnDefinitionPacket {
    pub name: String,
    pub column_type: ColumnType,
    pub character_set: u16,
    pub column_length: u32,
    pub flags: u16,
    pub decimals: u8,
}

impl ColumnDefinitionPacket {
    pub(crate) fn decode(mut buf: &[u8]) -> Result<Self> {
        let _catalog = buf.get_lenenc_bytes().map_err(proto_err)?;
        let _schema = buf.get_lenenc_bytes().map_err(proto_err)?;
        let _table = buf.get_lenenc_bytes().map_err(proto_err)?;
        let _org_table = buf.get_lenenc_bytes().map_err(proto_err)?;
        let name_bytes = buf.get_lenenc_bytes().map_err(proto_err)?.unwrap_or(&[]);
        let name = String::from_utf8_lossy(name_bytes).to_string();
        let _org_column_name = buf.get_lenenc_bytes().map_err(proto_err)?;

        let fixed_len = buf.get_lenenc_int().map_err(proto_err)?.unwrap_or(0);
        if fixed_len != 12 {
            return Err(Error::ProtocolError(format!(
                "column definition fixed-length field must be 12, got {}",
                fixed_len
            )));
        }

        let character_set = buf.get_u16().map_err(proto_err)?;
        let column_length = buf.get_u32().map_err(proto_err)?;
        let column_type = ColumnType::from_byte(buf.get_u8().map_err(proto_err)?);
        let flags = buf.get_u16().map_err(proto_err)?;
        let decimals = buf.get_u8().map_err(proto_err)?;
        let _filler = buf.get_u16().map_err(proto_err)?;

        Ok(Self { name, column_type, character_set, column_length, flags, decimals })
    }
}

fn proto_err(err: std::io::Error) -> Error {
    Error::ProtocolError(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::buf_mut::BufMut;

    #[test]
    fn decodes_a_column_definition() {
        let mut packet = Vec::new();
        packet.put_lenenc_bytes(b"def");
        packet.put_lenenc_bytes(b"mydb");
        packet.put_lenenc_bytes(b"mytable");
        packet.put_lenenc_bytes(b"mytable");
        packet.put_lenenc_bytes(b"id");
        packet.put_lenenc_bytes(b"id");
        packet.put_lenenc_int(12);
        packet.put_u16_le(33);
        packet.put_u32_le(11);
        packet.put_u8(0x08); // LONGLONG
        packet.put_u16_le(0);
        packet.put_u8(0);
        packet.put_u16_le(0);

        let col = ColumnDefinitionPacket::decode(&packet).unwrap();
        assert_eq!(col.name, "id");
        assert_eq!(col.column_type, ColumnType::LongLong);
    }

    #[test]
    fn rejects_wrong_fixed_length_marker() {
        let mut packet = Vec::new();
        packet.put_lenenc_bytes(b"def");
        packet.put_lenenc_bytes(b"");
        packet.put_lenenc_bytes(b"");
        packet.put_lenenc_bytes(b"");
        packet.put_lenenc_bytes(b"x");
        packet.put_lenenc_bytes(b"");
        packet.put_lenenc_int(99);

        assert!(ColumnDefinitionPacket::decode(&packet).is_err());
    }
}
