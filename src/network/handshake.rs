// Connection-phase state machine: greeting out, response in, OK out

use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};

use super::framer::PacketFramer;
use super::session::Session;
use crate::protocol::{PacketCoder, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    New,
    InitialHandshakeSent,
    AwaitingResponse,
    Established,
    Failed,
}

/// Drives one connection through the handshake exchange.
///
/// The whole exchange runs on a single frame sequence: greeting at 0, client
/// response at 1, final OK at 2. A `Handshake` is one-shot; once it reaches
/// `Established` or `Failed` it stays there.
pub struct Handshake {
    state: HandshakeState,
}

impl Handshake {
    pub fn new() -> Self {
        Self {
            state: HandshakeState::New,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub async fn negotiate<S>(
        &mut self,
        framer: &mut PacketFramer<S>,
        session: &mut Session,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.drive(framer, session).await {
            Ok(()) => {
                self.state = HandshakeState::Established;
                Ok(())
            }
            Err(e) => {
                self.state = HandshakeState::Failed;
                Err(e)
            }
        }
    }

    async fn drive<S>(&mut self, framer: &mut PacketFramer<S>, session: &mut Session) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let coder = PacketCoder::new(session.capabilities());

        let greeting = coder.encode_initial_handshake(
            session.connection_id(),
            session.status_flags(),
            session.collation_id(),
            session.salt(),
        );
        framer.write_frame(&greeting).await?;
        self.state = HandshakeState::InitialHandshakeSent;

        self.state = HandshakeState::AwaitingResponse;
        let payload = framer.read_frame().await?;
        let response = coder.decode_handshake_response(&payload)?;
        debug!(
            "connection {}: handshake response from user {:?} (database {:?})",
            session.connection_id(),
            response.username,
            response.database
        );
        session.absorb_response(&response);

        // The final packet of the exchange mirrors a successful command: an
        // OK with nothing affected.
        framer.write_frame(&coder.encode_ok(0, 0, 0)).await?;
        Ok(())
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}
