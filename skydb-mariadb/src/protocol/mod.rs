pub(crate) mod capabilities;
pub(crate) mod column_def;
pub(crate) mod eof;
pub(crate) mod err;
pub(crate) mod handshake;
pub(crate) mod ok;
pub(crate) mod packet;
pub(crate) mod types;

pub(crate) use capabilities::Capabilities;
pub(crate) use column_def::ColumnDefinitionPacket;
pub(crate) use eof::EofPacket;
pub(crate) use err::ErrPacket;
pub(crate) use handshake::{AuthSwitchRequest, HandshakeResponsePacket, InitialHandshakePacket, SslRequest};
pub(crate) use ok::OkPacket;
pub(crate) use packet::PacketStream;
pub(crate) use types::ColumnType;
