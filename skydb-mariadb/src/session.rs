//! One authenticated connection: handshake, command dispatch, and row
//! decoding. Owned exclusively by the pool, which leases it to one thread
//! at a time.

use std::net::TcpStream;
use std::time::Duration;

use native_tls::TlsConnector;
use skydb_core::{ConnectOptions, Error, Result, TypeDescriptor, Value};

use crate::auth;
use crate::io::buf::Buf;
use crate::io::buf_mut::BufMut;
use crate::protocol::{
    AuthSwitchRequest, Capabilities, ColumnDefinitionPacket, ColumnType, EofPacket, ErrPacket,
    HandshakeResponsePacket, InitialHandshakePacket, OkPacket, PacketStream, SslRequest,
};
use crate::stream::Stream;

const COM_QUIT: u8 = 0x01;
const COM_QUERY: u8 = 0x03;
const COM_PING: u8 = 0x0E;
const COM_STATISTICS: u8 = 0x09;

/// A materialized reply to a text command.
pub(crate) enum QueryOutcome {
    Ok(OkPacket),
    /// `0xFB` LOCAL INFILE: treated as "successful, empty result" per spec.
    Empty,
    ResultSet { columns: Vec<ColumnDefinitionPacket>, rows: Vec<Vec<Value>> },
}

pub(crate) struct Session {
    packets: PacketStream<Stream>,
    capabilities: Capabilities,
    query_response_timeout: Duration,
}

impl Session {
    pub(crate) fn connect(opts: &ConnectOptions) -> Result<Self> {
        let tcp = TcpStream::connect((opts.host.as_str(), opts.port))?;
        tcp.set_nodelay(true).ok();

        let mut packets = PacketStream::new(Stream::Plain(tcp));

        let greeting_bytes = packets.read_packet()?;
        let greeting = InitialHandshakePacket::decode(&greeting_bytes)?;

        let mut client_capabilities = Capabilities::client_default();
        if opts.database.is_some() {
            client_capabilities |= Capabilities::CONNECT_WITH_DB;
        }

        let wants_tls = opts.tls && greeting.capabilities.contains(Capabilities::CLIENT_SSL);
        if wants_tls {
            client_capabilities |= Capabilities::CLIENT_SSL;
        }

        if wants_tls {
            let ssl_request =
                SslRequest { capabilities: client_capabilities, collation: greeting.collation };
            packets.write_packet(&ssl_request.encode())?;

            let tcp = match packets.into_inner() {
                Stream::Plain(tcp) => tcp,
                Stream::Tls(_) => unreachable!("TLS upgrade attempted twice"),
            };

            let connector = TlsConnector::new().map_err(|e| Error::TlsUpgrade(Box::new(e)))?;
            let tls = connector
                .connect(&opts.host, tcp)
                .map_err(|e| Error::TlsUpgrade(Box::new(e)))?;

            packets = PacketStream::new(Stream::Tls(tls));
        }

        let mut scramble =
            auth::scramble_password(&opts.credentials.password, opts.credentials.hash_kind, &greeting.scramble);

        let login = HandshakeResponsePacket {
            capabilities: client_capabilities,
            collation: greeting.collation,
            username: &opts.credentials.username,
            auth_response: &scramble,
            database: opts.database.as_deref(),
            auth_plugin_name: &greeting.auth_plugin_name,
        };
        packets.write_packet(&login.encode())?;

        let mut reply = packets.read_packet()?;

        // Plugin re-challenge loop: first body byte 0xFE means "switch auth plugins".
        while reply.first() == Some(&0xFE) && reply.len() > 1 {
            let switch = AuthSwitchRequest::decode(&reply)?;
            scramble = auth::scramble_password(
                &opts.credentials.password,
                opts.credentials.hash_kind,
                &switch.scramble,
            );
            packets.write_packet(&scramble)?;
            reply = packets.read_packet()?;
        }

        match reply.first() {
            Some(0x00) | Some(0xFE) => {}
            Some(0xFF) => return Err(ErrPacket::decode(&reply)?.as_handshake_failed()),
            _ => {
                return Err(Error::HandshakeFailed {
                    code: 0,
                    sqlstate: None,
                    message: "unexpected reply to login packet".to_string(),
                })
            }
        }

        Ok(Self {
            packets,
            capabilities: client_capabilities & greeting.capabilities,
            query_response_timeout: Duration::from_millis(opts.query_response_timeout_ms),
        })
    }

    pub(crate) fn ping(&mut self) -> Result<()> {
        self.send_command(COM_PING, &[])?;
        self.receive_ok_or_err()?;
        Ok(())
    }

    pub(crate) fn close(mut self) {
        let _ = self.send_command(COM_QUIT, &[]);
        let _ = self.packets.get_mut().shutdown();
    }

    /// Runs `COM_STATISTICS` and returns the server's free-text reply.
    pub(crate) fn statistics(&mut self) -> Result<String> {
        self.send_command(COM_STATISTICS, &[])?;
        let reply = self.read_with_timeout()?;
        let mut slice: &[u8] = &reply;
        Ok(slice.get_str_eof().map_err(|e| Error::ProtocolError(e.to_string()))?.to_string())
    }

    pub(crate) fn query(&mut self, sql: &str) -> Result<QueryOutcome> {
        self.send_command(COM_QUERY, sql.as_bytes())?;

        let reply = self.read_with_timeout()?;

        match reply.first() {
            Some(0x00) => Ok(QueryOutcome::Ok(OkPacket::decode(&reply)?)),
            Some(0xFB) => Ok(QueryOutcome::Empty),
            Some(0xFF) => Err(ErrPacket::decode(&reply)?.as_server_error()),
            _ => self.read_result_set(&reply),
        }
    }

    fn read_result_set(&mut self, first_reply: &[u8]) -> Result<QueryOutcome> {
        let capabilities = self.capabilities;
        decode_result_set(|| self.read_with_timeout(), capabilities, first_reply)
    }

    fn receive_ok_or_err(&mut self) -> Result<OkPacket> {
        let reply = self.read_with_timeout()?;
        match reply.first() {
            Some(0x00) | Some(0xFE) => Ok(OkPacket::decode(&reply)?),
            Some(0xFF) => Err(ErrPacket::decode(&reply)?.as_server_error()),
            _ => Err(Error::ProtocolError(
                "expected OK or ERR packet".to_string(),
            )),
        }
    }

    fn send_command(&mut self, command: u8, payload: &[u8]) -> Result<()> {
        self.packets.start_sequence();
        let mut body = Vec::with_capacity(1 + payload.len());
        body.put_u8(command);
        body.put_bytes(payload);
        self.packets
            .get_mut()
            .set_read_timeout(Some(self.query_response_timeout))
            .ok();
        self.packets.write_packet(&body)
    }

    fn read_with_timeout(&mut self) -> Result<Vec<u8>> {
        self.packets.read_packet().map_err(|e| {
            if let Error::Io(ref io_err) = e {
                if io_err.kind() == std::io::ErrorKind::WouldBlock
                    || io_err.kind() == std::io::ErrorKind::TimedOut
                {
                    return Error::Timeout;
                }
            }
            e
        })
    }
}

/// Header/columns/EOF/rows/terminal-EOF sequencing for a non-OK, non-ERR
/// first reply (spec §4.4). Factored out of [`Session::read_result_set`]
/// so the streaming decode logic is testable against a canned sequence of
/// packets without a live socket.
fn decode_result_set(
    mut read_packet: impl FnMut() -> Result<Vec<u8>>,
    capabilities: Capabilities,
    first_reply: &[u8],
) -> Result<QueryOutcome> {
    let mut slice: &[u8] = first_reply;
    let column_count = slice
        .get_lenenc_int()
        .map_err(|e| Error::ProtocolError(e.to_string()))?
        .ok_or_else(|| Error::ProtocolError("null column count".to_string()))?;

    let mut columns = Vec::with_capacity(column_count as usize);
    for _ in 0..column_count {
        let packet = read_packet()?;
        columns.push(ColumnDefinitionPacket::decode(&packet)?);
    }

    if !capabilities.contains(Capabilities::CLIENT_DEPRECATE_EOF) {
        let packet = read_packet()?;
        EofPacket::decode(&packet)?;
    }

    let mut rows = Vec::new();
    loop {
        let packet = read_packet()?;

        if packet.first() == Some(&0xFF) {
            return Err(ErrPacket::decode(&packet)?.as_server_error());
        }

        let is_terminal = if capabilities.contains(Capabilities::CLIENT_DEPRECATE_EOF) {
            packet.first() == Some(&0xFE) && packet.len() < 0xFF_FFFF
        } else {
            packet.first() == Some(&0xFE) && packet.len() < 9
        };

        if is_terminal {
            break;
        }

        rows.push(decode_row(&packet, &columns)?);
    }

    Ok(QueryOutcome::ResultSet { columns, rows })
}

fn decode_row(packet: &[u8], columns: &[ColumnDefinitionPacket]) -> Result<Vec<Value>> {
    let mut slice: &[u8] = packet;
    let mut row = Vec::with_capacity(columns.len());

    for column in columns {
        let descriptor = column.column_type.type_descriptor();
        let raw = slice.get_lenenc_bytes().map_err(|e| Error::ProtocolError(e.to_string()))?;

        let value = match raw {
            None if descriptor.forbids_null() => empty_value(descriptor),
            None => Value::Null,
            Some(bytes) => decode_typed(column.column_type, bytes)?,
        };

        row.push(value);
    }

    Ok(row)
}

fn empty_value(descriptor: TypeDescriptor) -> Value {
    match descriptor {
        TypeDescriptor::String => Value::Str(String::new()),
        TypeDescriptor::Bytes => Value::Bytes(Vec::new()),
        _ => Value::Null,
    }
}

fn decode_typed(column_type: ColumnType, bytes: &[u8]) -> Result<Value> {
    let text = || std::str::from_utf8(bytes).unwrap_or_default();

    Ok(match column_type {
        ColumnType::Tiny => Value::I8(text().parse().unwrap_or_default()),
        ColumnType::Short => Value::I16(text().parse().unwrap_or_default()),
        ColumnType::Long | ColumnType::Int24 | ColumnType::Year => {
            Value::I32(text().parse().unwrap_or_default())
        }
        ColumnType::LongLong => Value::I64(text().parse().unwrap_or_default()),
        ColumnType::Float => Value::F32(text().parse().unwrap_or_default()),
        ColumnType::Double => Value::F64(text().parse().unwrap_or_default()),
        ColumnType::VarChar | ColumnType::VarString | ColumnType::String => {
            Value::Str(String::from_utf8_lossy(bytes).to_string())
        }
        _ => Value::Bytes(bytes.to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::buf_mut::BufMut;
    use std::collections::VecDeque;

    fn column_def_packet(name: &str, column_type: u8) -> Vec<u8> {
        let mut packet = Vec::new();
        packet.put_lenenc_bytes(b"def");
        packet.put_lenenc_bytes(b"db");
        packet.put_lenenc_bytes(b"t");
        packet.put_lenenc_bytes(b"t");
        packet.put_lenenc_bytes(name.as_bytes());
        packet.put_lenenc_bytes(name.as_bytes());
        packet.put_lenenc_int(12);
        packet.put_u16_le(33);
        packet.put_u32_le(11);
        packet.put_u8(column_type);
        packet.put_u16_le(0);
        packet.put_u8(0);
        packet.put_u16_le(0);
        packet
    }

    /// Exercises the streaming header/columns/EOF/rows/terminal-EOF sequence
    /// from spec §4.4 end to end against a canned packet sequence, covering
    /// a typed integer cell, a string cell, and a null cell forced to the
    /// empty-string substitution (spec §3's row-0-excluded invariant).
    #[test]
    fn decodes_a_two_column_result_set_with_a_null_cell() {
        let mut queue: VecDeque<Vec<u8>> = VecDeque::new();
        queue.push_back(column_def_packet("pk", 0x08)); // LONGLONG
        queue.push_back(column_def_packet("name", 0x0F)); // VARCHAR
        queue.push_back(vec![0xFE, 0x00, 0x00, 0x00, 0x00]); // intermediate EOF

        let mut row1 = Vec::new();
        row1.put_lenenc_bytes(b"42");
        row1.put_lenenc_bytes(b"hello");
        queue.push_back(row1);

        let mut row2 = Vec::new();
        row2.put_lenenc_bytes(b"7");
        row2.put_u8(0xFB); // null name
        queue.push_back(row2);

        queue.push_back(vec![0xFE, 0x00, 0x00, 0x00, 0x00]); // terminal EOF

        let mut first_reply = Vec::new();
        first_reply.put_lenenc_int(2);

        let capabilities = Capabilities::CLIENT_PROTOCOL_41;
        let outcome = decode_result_set(
            || Ok(queue.pop_front().expect("test sent too few packets")),
            capabilities,
            &first_reply,
        )
        .unwrap();

        match outcome {
            QueryOutcome::ResultSet { columns, rows } => {
                assert_eq!(columns.len(), 2);
                assert_eq!(columns[0].name, "pk");
                assert_eq!(columns[1].name, "name");
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0], vec![Value::I64(42), Value::Str("hello".to_string())]);
                assert_eq!(rows[1], vec![Value::I64(7), Value::Str(String::new())]);
            }
            _ => panic!("expected a result set"),
        }
    }

    #[test]
    fn decode_result_set_surfaces_a_server_error_mid_stream() {
        let mut queue: VecDeque<Vec<u8>> = VecDeque::new();
        queue.push_back(column_def_packet("pk", 0x08));

        let mut err_packet = Vec::new();
        err_packet.put_u8(0xFF);
        err_packet.put_u16_le(1146);
        err_packet.put_bytes(b"#42S02");
        err_packet.put_bytes(b"Table 'db.t' doesn't exist");
        queue.push_back(err_packet);

        let mut first_reply = Vec::new();
        first_reply.put_lenenc_int(1);

        // CLIENT_DEPRECATE_EOF so the column list isn't followed by an
        // intermediate EOF packet before the (here, erroring) row stream.
        let err = decode_result_set(
            || Ok(queue.pop_front().expect("test sent too few packets")),
            Capabilities::CLIENT_PROTOCOL_41 | Capabilities::CLIENT_DEPRECATE_EOF,
            &first_reply,
        )
        .unwrap_err();

        assert!(matches!(err, Error::ServerError { code: 1146, .. }));
    }
}
