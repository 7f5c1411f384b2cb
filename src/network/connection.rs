// One accepted connection: handshake, then the command loop

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};

use super::framer::PacketFramer;
use super::handshake::Handshake;
use super::session::Session;
use super::CommandHandler;
use crate::protocol::error::codes;
use crate::protocol::{Command, PacketCoder, ProtocolError, Result, SqlError};

pub struct Connection<S> {
    framer: PacketFramer<S>,
    session: Session,
    coder: PacketCoder,
    handler: Arc<dyn CommandHandler>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(stream: S, session: Session, handler: Arc<dyn CommandHandler>) -> Self {
        let coder = PacketCoder::new(session.capabilities());
        Self {
            framer: PacketFramer::new(stream),
            session,
            coder,
            handler,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Serves the connection to completion: handshake first, then commands
    /// until QUIT, peer disconnect, or a fatal error.
    ///
    /// On a fatal error one best-effort ERR packet is written before
    /// returning, except when the transport itself failed.
    pub async fn run(&mut self) -> Result<()> {
        let mut handshake = Handshake::new();
        if let Err(e) = handshake
            .negotiate(&mut self.framer, &mut self.session)
            .await
        {
            self.report_fatal(&e).await;
            return Err(e);
        }

        let result = self.command_loop().await;
        if let Err(ref e) = result {
            self.report_fatal(e).await;
        }
        result
    }

    async fn command_loop(&mut self) -> Result<()> {
        loop {
            // Each client round-trip restarts the frame sequence.
            self.framer.reset_sequence();
            let payload = match self.framer.read_frame().await {
                Ok(payload) => payload,
                Err(ProtocolError::BadConnection(ref e))
                    if e.kind() == io::ErrorKind::UnexpectedEof =>
                {
                    debug!(
                        "connection {}: peer disconnected",
                        self.session.connection_id()
                    );
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            if payload.is_empty() {
                return Err(ProtocolError::violation("empty command packet"));
            }
            let code = payload[0];
            let body = &payload[1..];

            match Command::from_byte(code) {
                Some(Command::Quit) => {
                    debug!("connection {}: client quit", self.session.connection_id());
                    return Ok(());
                }
                Some(command) => {
                    let result = self.handler.handle(command, body, &self.session).await;
                    self.send_responses(result).await?;
                }
                None => {
                    let err = SqlError::new(
                        codes::ER_UNKNOWN_COM_ERROR,
                        format!("unknown command {:#04x}", code),
                    );
                    self.framer
                        .write_frame(&self.coder.encode_err(&ProtocolError::Sql(err)))
                        .await?;
                }
            }
        }
    }

    async fn send_responses(
        &mut self,
        result: std::result::Result<Vec<Bytes>, SqlError>,
    ) -> Result<()> {
        match result {
            Ok(payloads) => {
                for payload in payloads {
                    self.framer.write_frame(&payload).await?;
                }
            }
            Err(sql) => {
                let err = ProtocolError::Sql(sql);
                self.framer.write_frame(&self.coder.encode_err(&err)).await?;
            }
        }
        Ok(())
    }

    /// Best-effort ERR at the current sequence position. Skipped when the
    /// transport already failed.
    async fn report_fatal(&mut self, err: &ProtocolError) {
        if matches!(err, ProtocolError::BadConnection(_)) {
            return;
        }
        if let Err(e) = self.framer.write_frame(&self.coder.encode_err(err)).await {
            debug!(
                "connection {}: could not send final error: {}",
                self.session.connection_id(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::AckHandler;
    use crate::protocol::{CapabilityFlags, ServerCapabilities};
    use async_trait::async_trait;
    use bytes::{BufMut, BytesMut};
    use tokio::io::DuplexStream;
    use tokio::task::JoinHandle;

    struct FailingHandler;

    #[async_trait]
    impl CommandHandler for FailingHandler {
        async fn handle(
            &self,
            _command: Command,
            _body: &[u8],
            _session: &Session,
        ) -> std::result::Result<Vec<Bytes>, SqlError> {
            Err(SqlError::new(codes::ER_NO_TABLES_USED, "No tables used"))
        }
    }

    fn spawn_connection(
        handler: Arc<dyn CommandHandler>,
    ) -> (PacketFramer<DuplexStream>, JoinHandle<Result<()>>) {
        let (server_side, client_side) = tokio::io::duplex(4096);
        let session = Session::new(10001, ServerCapabilities::default(), [0x41; 20]);
        let server = tokio::spawn(async move {
            Connection::new(server_side, session, handler).run().await
        });
        (PacketFramer::new(client_side), server)
    }

    fn response_payload() -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u32_le(CapabilityFlags::server_default().bits());
        buf.put_u32_le(1 << 24);
        buf.put_u8(33);
        buf.put_bytes(0, 23);
        buf.put_slice(b"root\0");
        buf.put_u8(0);
        buf.put_slice(b"orders\0");
        buf.put_slice(b"mysql_native_password\0");
        buf.put_u8(0);
        buf
    }

    async fn shake_hands(client: &mut PacketFramer<DuplexStream>) {
        let greeting = client.read_frame().await.unwrap();
        assert_eq!(greeting[0], 10);
        client.write_frame(&response_payload()).await.unwrap();
        let ok = client.read_frame().await.unwrap();
        assert_eq!(ok[0], 0x00);
    }

    async fn send_command(client: &mut PacketFramer<DuplexStream>, code: u8, body: &[u8]) {
        client.reset_sequence();
        let mut frame = vec![code];
        frame.extend_from_slice(body);
        client.write_frame(&frame).await.unwrap();
    }

    #[tokio::test]
    async fn test_serves_commands_after_the_handshake() {
        let (mut client, server) = spawn_connection(Arc::new(AckHandler));
        shake_hands(&mut client).await;

        send_command(&mut client, Command::Query.as_byte(), b"select 1").await;
        let ok = client.read_frame().await.unwrap();
        assert_eq!(ok, [0x00, 0, 0, 2, 0, 0, 0]); // autocommit status

        send_command(&mut client, 0xAB, b"").await;
        let err = client.read_frame().await.unwrap();
        assert_eq!(&err[..3], &[0xFF, 0x17, 0x04]); // 1047, unknown command
        assert_eq!(&err[3..9], b"#08S01");

        send_command(&mut client, Command::Quit.as_byte(), b"").await;
        assert!(server.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_handler_errors_keep_the_connection_open() {
        let (mut client, server) = spawn_connection(Arc::new(FailingHandler));
        shake_hands(&mut client).await;

        for _ in 0..2 {
            send_command(&mut client, Command::Query.as_byte(), b"select 1").await;
            let err = client.read_frame().await.unwrap();
            assert_eq!(&err[..3], &[0xFF, 0x48, 0x04]); // 1096
            assert_eq!(&err[9..], b"No tables used");
        }

        send_command(&mut client, Command::Quit.as_byte(), b"").await;
        assert!(server.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_peer_disconnect_ends_the_loop_cleanly() {
        let (mut client, server) = spawn_connection(Arc::new(AckHandler));
        shake_hands(&mut client).await;

        drop(client);
        assert!(server.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_stale_sequence_id_gets_a_final_error_packet() {
        let (mut client, server) = spawn_connection(Arc::new(AckHandler));
        shake_hands(&mut client).await;

        // Skipping the per-command sequence reset leaves this frame at the
        // handshake's counter position.
        client.write_frame(&[Command::Query.as_byte()]).await.unwrap();

        client.reset_sequence();
        let err = client.read_frame().await.unwrap();
        assert_eq!(&err[..3], &[0xFF, 0x51, 0x04]); // 1105, unknown error
        assert!(matches!(
            server.await.unwrap(),
            Err(ProtocolError::Violation(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_command_packet_is_a_violation() {
        let (mut client, server) = spawn_connection(Arc::new(AckHandler));
        shake_hands(&mut client).await;

        send_command(&mut client, Command::Query.as_byte(), b"").await;
        let ok = client.read_frame().await.unwrap();
        assert_eq!(ok[0], 0x00); // a bare command byte is still a command

        client.reset_sequence();
        client.write_frame(&[]).await.unwrap();
        let err = client.read_frame().await.unwrap();
        assert_eq!(&err[..3], &[0xFF, 0x51, 0x04]);
        assert!(matches!(
            server.await.unwrap(),
            Err(ProtocolError::Violation(_))
        ));
    }
}
