//! Initial greeting, SSL request, login (handshake response), and auth
//! switch packet layouts.

use skydb_core::{Error, Result};

use crate::io::buf::Buf;
use crate::io::buf_mut::BufMut;
use crate::protocol::capabilities::Capabilities;

/// The server's initial greeting, parsed field-by-field in wire order.
#[derive(Debug)]
pub(crate) struct InitialHandshakePacket {
    pub protocol_version: u8,
    pub server_version: String,
    pub connection_id: u32,
    pub scramble: Vec<u8>,
    pub capabilities: Capabilities,
    pub collation: u8,
    pub status_flags: u16,
    pub auth_plugin_name: String,
}

impl InitialHandshakePacket {
    pub(crate) fn decode(mut buf: &[u8]) -> Result<Self> {
        let protocol_version = buf.get_u8().map_err(proto_err)?;
        let server_version = buf.get_str_nul().map_err(proto_err)?.to_string();
        let connection_id = buf.get_u32().map_err(proto_err)?;

        let scramble_1 = buf.get_bytes(8).map_err(proto_err)?.to_vec();
        let _reserved = buf.get_u8().map_err(proto_err)?;

        let capabilities_low = buf.get_u16().map_err(proto_err)?;
        let collation = buf.get_u8().map_err(proto_err)?;
        let status_flags = buf.get_u16().map_err(proto_err)?;
        let capabilities_high = buf.get_u16().map_err(proto_err)?;

        let plugin_data_len = buf.get_u8().map_err(proto_err)?;
        let _reserved = buf.get_bytes(6).map_err(proto_err)?;
        let capabilities_extended = buf.get_u32().map_err(proto_err)?;

        let scramble_2_len = std::cmp::max(12, plugin_data_len as i32 - 9).max(0) as usize;
        let scramble_2 = buf.get_bytes(scramble_2_len).map_err(proto_err)?;
        let _reserved = buf.get_u8().map_err(proto_err)?;

        let auth_plugin_name = buf.get_str_nul().unwrap_or("mysql_native_password").to_string();

        let mut scramble = scramble_1;
        scramble.extend_from_slice(scramble_2);

        let capabilities =
            Capabilities::from_greeting(capabilities_low, capabilities_high, capabilities_extended);

        Ok(Self {
            protocol_version,
            server_version,
            connection_id,
            scramble,
            capabilities,
            collation,
            status_flags,
            auth_plugin_name,
        })
    }
}

/// Sent before the TLS handshake when the server advertises `CLIENT_SSL`
/// and the client supports it. 32-byte fixed payload.
pub(crate) struct SslRequest {
    pub capabilities: Capabilities,
    pub collation: u8,
}

impl SslRequest {
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32);
        buf.put_u32_le(self.capabilities.bits() as u32);
        buf.put_u32_le(0x00FF_FFFF); // max packet size
        buf.put_u8(self.collation);
        buf.put_bytes(&[0u8; 23]);
        buf
    }
}

/// The client's login packet (`HandshakeResponse41`-equivalent).
pub(crate) struct HandshakeResponsePacket<'a> {
    pub capabilities: Capabilities,
    pub collation: u8,
    pub username: &'a str,
    pub auth_response: &'a [u8],
    pub database: Option<&'a str>,
    pub auth_plugin_name: &'a str,
}

impl<'a> HandshakeResponsePacket<'a> {
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.put_u32_le(self.capabilities.bits() as u32);
        buf.put_u32_le(0x00FF_FFFF); // max packet size
        buf.put_u8(self.collation);
        buf.put_bytes(&[0u8; 23]);
        buf.put_u32_le((self.capabilities.bits() >> 32) as u32);

        buf.put_str_nul(self.username);

        if self
            .capabilities
            .contains(Capabilities::PLUGIN_AUTH_LENENC_CLIENT_DATA)
        {
            buf.put_lenenc_bytes(self.auth_response);
        } else {
            buf.put_u8(self.auth_response.len() as u8);
            buf.put_bytes(self.auth_response);
        }

        if let Some(database) = self.database {
            buf.put_str_nul(database);
        }

        if self.capabilities.contains(Capabilities::PLUGIN_AUTH) {
            buf.put_str_nul(self.auth_plugin_name);
        }

        if self.capabilities.contains(Capabilities::CONNECT_ATTRS) {
            buf.put_u8(0); // zero-length connection attributes
        }

        buf
    }
}

/// Sent by the server instead of OK/ERR to switch authentication plugins
/// (first body byte `0xFE`).
pub(crate) struct AuthSwitchRequest {
    pub plugin_name: String,
    pub scramble: Vec<u8>,
}

impl AuthSwitchRequest {
    pub(crate) fn decode(mut buf: &[u8]) -> Result<Self> {
        let _marker = buf.get_u8().map_err(proto_err)?;
        let plugin_name = buf.get_str_nul().map_err(proto_err)?.to_string();
        let mut scramble = buf.get_bytes(buf.remaining()).map_err(proto_err)?.to_vec();
        if scramble.last() == Some(&0) {
            scramble.pop();
        }
        Ok(Self { plugin_name, scramble })
    }
}

fn proto_err(err: std::io::Error) -> Error {
    Error::ProtocolError(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // byte-exact MariaDB greeting, matching the field layout in §4.2.
    #[test]
    fn decodes_a_realistic_greeting() {
        let mut packet = Vec::new();
        packet.push(10u8); // protocol version
        packet.extend_from_slice(b"5.5.5-10.5.9-MariaDB\0");
        packet.extend_from_slice(&[1, 0, 0, 0]); // connection id
        packet.extend_from_slice(b"abcdefgh"); // scramble part 1 (8 bytes)
        packet.push(0); // reserved
        packet.extend_from_slice(&[0xFF, 0xF7]); // capabilities low
        packet.push(0x21); // collation
        packet.extend_from_slice(&[2, 0]); // status flags
        packet.extend_from_slice(&[0x00, 0x80]); // capabilities high
        packet.push(21); // plugin data length
        packet.extend_from_slice(&[0u8; 6]); // reserved
        packet.extend_from_slice(&[0, 0, 0, 0]); // capabilities extended
        packet.extend_from_slice(b"ijklmnopqrst\0"); // scramble part 2 (12 bytes) + NUL
        packet.extend_from_slice(b"mysql_native_password\0");

        let greeting = InitialHandshakePacket::decode(&packet).unwrap();
        assert_eq!(greeting.protocol_version, 10);
        assert_eq!(greeting.server_version, "5.5.5-10.5.9-MariaDB");
        assert_eq!(greeting.scramble.len(), 20);
        assert_eq!(greeting.auth_plugin_name, "mysql_native_password");
        assert!(greeting.capabilities.contains(Capabilities::CLIENT_PROTOCOL_41));
    }

    /// The scramble is random bytes, not necessarily valid UTF-8; decode
    /// must not treat it as a string.
    #[test]
    fn decodes_auth_switch_request_with_non_utf8_scramble() {
        let mut packet = vec![0xFEu8];
        packet.extend_from_slice(b"mysql_native_password\0");
        packet.extend_from_slice(&[0xFF, 0x00, 0x9F, 0x01, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0x00]);
        packet.push(0); // trailing NUL some servers append

        let switch = AuthSwitchRequest::decode(&packet).unwrap();
        assert_eq!(switch.plugin_name, "mysql_native_password");
        assert_eq!(switch.scramble.len(), 20);
        assert_eq!(switch.scramble[0], 0xFF);
    }
}
