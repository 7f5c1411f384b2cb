// Error taxonomy and the MySQL error-code/SQLSTATE tables

use thiserror::Error;

/// Error codes this crate emits or recognizes.
pub mod codes {
    pub const ER_CON_COUNT_ERROR: u16 = 1040;
    pub const ER_HANDSHAKE_ERROR: u16 = 1043;
    pub const ER_DBACCESS_DENIED_ERROR: u16 = 1044;
    pub const ER_ACCESS_DENIED_ERROR: u16 = 1045;
    pub const ER_NO_DB_ERROR: u16 = 1046;
    pub const ER_UNKNOWN_COM_ERROR: u16 = 1047;
    pub const ER_BAD_NULL_ERROR: u16 = 1048;
    pub const ER_BAD_DB_ERROR: u16 = 1049;
    pub const ER_TABLE_EXISTS_ERROR: u16 = 1050;
    pub const ER_BAD_TABLE_ERROR: u16 = 1051;
    pub const ER_BAD_FIELD_ERROR: u16 = 1054;
    pub const ER_DUP_ENTRY: u16 = 1062;
    pub const ER_PARSE_ERROR: u16 = 1064;
    pub const ER_NO_TABLES_USED: u16 = 1096;
    pub const ER_UNKNOWN_ERROR: u16 = 1105;
    pub const ER_NO_SUCH_TABLE: u16 = 1146;
    pub const ER_SYNTAX_ERROR: u16 = 1149;
}

/// SQLSTATE reported for codes absent from the mapping table.
pub const DEFAULT_SQL_STATE: &str = "HY000";

/// Standard SQLSTATE class for a MySQL error code.
pub fn sqlstate(code: u16) -> &'static str {
    match code {
        1040 => "08004",
        1043 | 1047 => "08S01",
        1044 | 1049 | 1064 | 1149 => "42000",
        1045 => "28000",
        1046 => "3D000",
        1048 | 1062 => "23000",
        1050 => "42S01",
        1051 | 1146 => "42S02",
        1054 => "42S22",
        _ => DEFAULT_SQL_STATE,
    }
}

/// An error reportable to the client as an ERR packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("ERROR {code} ({state}): {message}")]
pub struct SqlError {
    pub code: u16,
    pub state: &'static str,
    pub message: String,
}

impl SqlError {
    /// Builds the (code, SQLSTATE, message) triple, looking the state up
    /// from the code table.
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            state: sqlstate(code),
            message: message.into(),
        }
    }
}

/// Everything that can go wrong on a protocol connection.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// I/O failure: short read/write or a closed socket. Always fatal.
    #[error("Bad connection: {0}")]
    BadConnection(#[from] std::io::Error),

    /// Malformed frame, sequence mismatch, or truncated field. Fatal; the
    /// client gets one best-effort ERR packet first.
    #[error("Protocol violation: {0}")]
    Violation(String),

    /// A recognized error condition sent to the client as an ERR packet.
    /// The connection stays open.
    #[error("{0}")]
    Sql(#[from] SqlError),

    /// A capability set the encoders cannot serve. Rejected at construction,
    /// before any bytes move.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProtocolError {
    /// Shorthand for a protocol violation with the given description.
    pub fn violation(message: impl Into<String>) -> Self {
        Self::Violation(message.into())
    }

    /// Whether this error must terminate the connection.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Sql(_))
    }
}
