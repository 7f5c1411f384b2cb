// Capability flags negotiated during the connection handshake

use bitflags::bitflags;

use super::error::ProtocolError;
use super::Result;

bitflags! {
    /// Client/server capability flags exchanged during the handshake.
    ///
    /// Split across two 16-bit halves in the initial handshake packet.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CapabilityFlags: u32 {
        const LONG_PASSWORD = 1;
        const FOUND_ROWS = 1 << 1;
        const LONG_FLAG = 1 << 2;
        const CONNECT_WITH_DB = 1 << 3;
        const NO_SCHEMA = 1 << 4;
        const COMPRESS = 1 << 5;
        const ODBC = 1 << 6;
        const LOCAL_FILES = 1 << 7;
        const IGNORE_SPACE = 1 << 8;
        const PROTOCOL_41 = 1 << 9;
        const INTERACTIVE = 1 << 10;
        const SSL = 1 << 11;
        const IGNORE_SIGPIPE = 1 << 12;
        const TRANSACTIONS = 1 << 13;
        const RESERVED = 1 << 14;
        const SECURE_CONNECTION = 1 << 15;
        const MULTI_STATEMENTS = 1 << 16;
        const MULTI_RESULTS = 1 << 17;
        const PS_MULTI_RESULTS = 1 << 18;
        const PLUGIN_AUTH = 1 << 19;
        const CONNECT_ATTRS = 1 << 20;
        const PLUGIN_AUTH_LENENC_CLIENT_DATA = 1 << 21;
        const CAN_HANDLE_EXPIRED_PASSWORDS = 1 << 22;
        const SESSION_TRACK = 1 << 23;
        const DEPRECATE_EOF = 1 << 24;
    }
}

impl CapabilityFlags {
    /// Capability set the server advertises by default.
    pub fn server_default() -> Self {
        Self::PROTOCOL_41
            | Self::SECURE_CONNECTION
            | Self::PLUGIN_AUTH
            | Self::CONNECT_WITH_DB
            | Self::CONNECT_ATTRS
    }

    /// Low 16 bits, as laid out in the initial handshake.
    pub fn low_bits(self) -> u16 {
        self.bits() as u16
    }

    /// High 16 bits, as laid out in the initial handshake.
    pub fn high_bits(self) -> u16 {
        (self.bits() >> 16) as u16
    }
}

/// Capability set validated for use as the server's advertised set.
///
/// The initial handshake layout structurally requires `PLUGIN_AUTH` (the
/// auth-data length byte) and `SECURE_CONNECTION` (the second salt half), so
/// sets missing either are rejected here rather than surfacing mid-encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerCapabilities(CapabilityFlags);

impl ServerCapabilities {
    pub fn new(flags: CapabilityFlags) -> Result<Self> {
        if !flags.contains(CapabilityFlags::PLUGIN_AUTH) {
            return Err(ProtocolError::Configuration(
                "capability set is missing PLUGIN_AUTH".to_string(),
            ));
        }
        if !flags.contains(CapabilityFlags::SECURE_CONNECTION) {
            return Err(ProtocolError::Configuration(
                "capability set is missing SECURE_CONNECTION".to_string(),
            ));
        }
        Ok(Self(flags))
    }

    pub fn flags(self) -> CapabilityFlags {
        self.0
    }
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        // The default set carries both structurally required flags.
        Self(CapabilityFlags::server_default())
    }
}
