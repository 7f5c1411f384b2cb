// MySQL wire protocol network module

pub mod connection;
pub mod framer;
pub mod handshake;
pub mod server;
pub mod session;

// Re-export commonly used types
pub use connection::Connection;
pub use framer::{FrameHeader, PacketFramer, FRAME_HEADER_LEN, MAX_FRAME_PAYLOAD};
pub use handshake::{Handshake, HandshakeState};
pub use server::{serve_connection, Server};
pub use session::Session;

pub use crate::protocol::{ProtocolError, Result};

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;

use crate::protocol::{Command, PacketCoder, SqlError, AUTH_PLUGIN_DATA_LEN};

// Default MySQL-compatible listen port
pub const DEFAULT_PORT: u16 = 4001;

/// Executes post-handshake commands.
///
/// The connection loop owns the wire: it frames each returned payload and
/// turns an `Err` into a single ERR packet, keeping the connection open.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        command: Command,
        body: &[u8],
        session: &Session,
    ) -> std::result::Result<Vec<Bytes>, SqlError>;
}

/// Handler that acknowledges every command with an empty OK.
pub struct AckHandler;

#[async_trait]
impl CommandHandler for AckHandler {
    async fn handle(
        &self,
        _command: Command,
        _body: &[u8],
        session: &Session,
    ) -> std::result::Result<Vec<Bytes>, SqlError> {
        let coder = PacketCoder::new(session.capabilities());
        Ok(vec![coder.encode_ok(session.status_flags(), 0, 0)])
    }
}

/// Produces the auth plugin data sent in each greeting.
pub trait SaltSource: Send + Sync {
    fn next_salt(&self) -> [u8; AUTH_PLUGIN_DATA_LEN];
}

/// Fresh random bytes per connection.
pub struct RandomSalt;

impl SaltSource for RandomSalt {
    fn next_salt(&self) -> [u8; AUTH_PLUGIN_DATA_LEN] {
        let mut salt = [0u8; AUTH_PLUGIN_DATA_LEN];
        rand::thread_rng().fill(&mut salt[..]);
        salt
    }
}
