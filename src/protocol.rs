// MySQL wire protocol: packet shapes, codecs, and error model

pub mod capability;
pub mod codec;
pub mod command;
pub mod error;
pub mod packet;

// Re-export commonly used types
pub use capability::{CapabilityFlags, ServerCapabilities};
pub use command::Command;
pub use error::{ProtocolError, SqlError};
pub use packet::{HandshakeResponse, PacketCoder};

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Protocol version byte sent in the initial handshake.
pub const PROTOCOL_VERSION: u8 = 10;

/// Server version string sent in the initial handshake.
pub const SERVER_VERSION: &str = "5.5.31-ironshard-0.1";

/// Default collation advertised by the server (utf8_general_ci).
pub const DEFAULT_COLLATION_ID: u8 = 33;

/// Length of the auth challenge (salt) carried by the initial handshake.
pub const AUTH_PLUGIN_DATA_LEN: usize = 20;

/// Server status flags reported in OK/EOF packets and the initial handshake.
pub mod status {
    pub const SERVER_STATUS_IN_TRANS: u16 = 0x0001;
    pub const SERVER_STATUS_AUTOCOMMIT: u16 = 0x0002;
    pub const SERVER_MORE_RESULTS_EXISTS: u16 = 0x0008;
    pub const SERVER_STATUS_NO_GOOD_INDEX_USED: u16 = 0x0010;
    pub const SERVER_STATUS_NO_INDEX_USED: u16 = 0x0020;
    pub const SERVER_STATUS_CURSOR_EXISTS: u16 = 0x0040;
    pub const SERVER_STATUS_LAST_ROW_SENT: u16 = 0x0080;
    pub const SERVER_STATUS_DB_DROPPED: u16 = 0x0100;
    pub const SERVER_STATUS_NO_BACKSLASH_ESCAPES: u16 = 0x0200;
    pub const SERVER_STATUS_METADATA_CHANGED: u16 = 0x0400;
    pub const SERVER_QUERY_WAS_SLOW: u16 = 0x0800;
    pub const SERVER_PS_OUT_PARAMS: u16 = 0x1000;
}
