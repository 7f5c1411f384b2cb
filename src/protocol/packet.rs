// Fixed packet shapes: OK, ERR, EOF, and the two handshake packets

use bytes::{BufMut, Bytes, BytesMut};

use super::capability::CapabilityFlags;
use super::codec::{self, PayloadReader};
use super::error::{codes, ProtocolError, SqlError};
use super::{Result, AUTH_PLUGIN_DATA_LEN, PROTOCOL_VERSION, SERVER_VERSION};

pub const OK_HEADER: u8 = 0x00;
pub const EOF_HEADER: u8 = 0xFE;
pub const ERR_HEADER: u8 = 0xFF;

/// Client reply to the initial handshake.
#[derive(Debug, Clone)]
pub struct HandshakeResponse {
    pub capabilities: CapabilityFlags,
    pub max_packet_size: u32,
    pub charset: u8,
    pub username: String,
    pub auth_response: Vec<u8>,
    pub database: Option<String>,
    pub auth_plugin_name: Option<String>,
    pub connect_attrs: Vec<(String, String)>,
}

/// Builds and parses the fixed packet shapes for one session.
///
/// The capability set decides field presence: `PROTOCOL_41` gates the
/// status/warning tails of OK/EOF and the SQLSTATE marker of ERR;
/// `PLUGIN_AUTH` and `SECURE_CONNECTION` gate parts of the initial
/// handshake. Sets missing the latter two never reach a coder (they are
/// rejected at `ServerCapabilities` construction), so every encoder here is
/// total.
#[derive(Debug, Clone, Copy)]
pub struct PacketCoder {
    capabilities: CapabilityFlags,
}

impl PacketCoder {
    pub fn new(capabilities: CapabilityFlags) -> Self {
        Self { capabilities }
    }

    pub fn encode_ok(&self, status_flags: u16, affected_rows: u64, last_insert_id: u64) -> Bytes {
        let mut buf = BytesMut::with_capacity(16);
        buf.put_u8(OK_HEADER);
        codec::put_lenenc_int(&mut buf, affected_rows);
        codec::put_lenenc_int(&mut buf, last_insert_id);
        if self.capabilities.contains(CapabilityFlags::PROTOCOL_41) {
            buf.put_u16_le(status_flags);
            buf.put_u16_le(0); // warnings are not tracked
        }
        buf.freeze()
    }

    pub fn encode_eof(&self, warnings: u16, status_flags: u16) -> Bytes {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u8(EOF_HEADER);
        if self.capabilities.contains(CapabilityFlags::PROTOCOL_41) {
            buf.put_u16_le(warnings);
            buf.put_u16_le(status_flags);
        }
        buf.freeze()
    }

    /// Encodes any connection error as an ERR packet. Errors without an
    /// explicit (code, state, message) triple map to `ER_UNKNOWN_ERROR`
    /// with their display text.
    pub fn encode_err(&self, err: &ProtocolError) -> Bytes {
        let sql = match err {
            ProtocolError::Sql(e) => e.clone(),
            other => SqlError::new(codes::ER_UNKNOWN_ERROR, other.to_string()),
        };
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(ERR_HEADER);
        buf.put_u16_le(sql.code);
        if self.capabilities.contains(CapabilityFlags::PROTOCOL_41) {
            buf.put_u8(b'#');
            buf.put_slice(sql.state.as_bytes());
        }
        // The message is the rest of the packet, no length prefix.
        buf.put_slice(sql.message.as_bytes());
        buf.freeze()
    }

    /// Encodes the server greeting that opens every connection.
    pub fn encode_initial_handshake(
        &self,
        connection_id: u32,
        status_flags: u16,
        collation_id: u8,
        salt: &[u8; AUTH_PLUGIN_DATA_LEN],
    ) -> Bytes {
        let mut buf = BytesMut::with_capacity(128);
        buf.put_u8(PROTOCOL_VERSION);
        buf.put_slice(SERVER_VERSION.as_bytes());
        buf.put_u8(0);
        buf.put_u32_le(connection_id);
        buf.put_slice(&salt[..8]);
        buf.put_u8(0); // filler
        buf.put_u16_le(self.capabilities.low_bits());
        buf.put_u8(collation_id);
        buf.put_u16_le(status_flags);
        buf.put_u16_le(self.capabilities.high_bits());
        if self.capabilities.contains(CapabilityFlags::PLUGIN_AUTH) {
            buf.put_u8(AUTH_PLUGIN_DATA_LEN as u8);
        } else {
            buf.put_u8(0);
        }
        buf.put_bytes(0, 10); // reserved
        if self.capabilities.contains(CapabilityFlags::SECURE_CONNECTION) {
            buf.put_slice(&salt[8..]);
        }
        buf.put_u8(0); // auth plugin name, sent empty
        buf.freeze()
    }

    /// Parses the client's handshake response.
    ///
    /// Field presence is gated by the capability set the client declares in
    /// the payload itself, not by the server's advertised set.
    pub fn decode_handshake_response(&self, payload: &[u8]) -> Result<HandshakeResponse> {
        let mut reader = PayloadReader::new(payload);
        let capabilities = CapabilityFlags::from_bits_retain(reader.read_u32_le()?);
        let max_packet_size = reader.read_u32_le()?;
        let charset = reader.read_u8()?;
        reader.skip(23)?;

        let username = lossy(reader.read_null_terminated()?);
        let auth_response = if capabilities.contains(CapabilityFlags::SECURE_CONNECTION) {
            let len = reader.read_u8()? as usize;
            reader.read_bytes(len)?.to_vec()
        } else {
            reader.read_null_terminated()?.to_vec()
        };
        let database = if capabilities.contains(CapabilityFlags::CONNECT_WITH_DB) {
            Some(lossy(reader.read_null_terminated()?))
        } else {
            None
        };
        let auth_plugin_name = if capabilities.contains(CapabilityFlags::PLUGIN_AUTH) {
            Some(lossy(reader.read_null_terminated()?))
        } else {
            None
        };

        let mut connect_attrs = Vec::new();
        if capabilities.contains(CapabilityFlags::CONNECT_ATTRS) {
            // The declared block length is clamped to the payload; pairs are
            // read until it is consumed or the buffer ends.
            let total = reader.read_lenenc_int()?.value as usize;
            let end = reader.position().saturating_add(total).min(payload.len());
            while reader.position() < end && reader.remaining() > 0 {
                let (key, _) = reader.read_lenenc_bytes()?;
                let (value, _) = reader.read_lenenc_bytes()?;
                connect_attrs.push((lossy(key), lossy(value)));
            }
        }

        Ok(HandshakeResponse {
            capabilities,
            max_packet_size,
            charset,
            username,
            auth_response,
            database,
            auth_plugin_name,
            connect_attrs,
        })
    }
}

fn lossy(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}
