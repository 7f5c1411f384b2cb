// TCP accept loop: one spawned task per connection

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use super::connection::Connection;
use super::session::Session;
use super::{CommandHandler, Result, SaltSource, DEFAULT_PORT};
use crate::protocol::ServerCapabilities;

/// Connection ids start above this value, matching the numbering a client
/// sees from a stock server that has served a while.
pub const CONNECTION_ID_BASE: u32 = 10_000;

const READ_BUFFER_SIZE: usize = 8 * 1024;

pub struct Server {
    capabilities: ServerCapabilities,
    handler: Arc<dyn CommandHandler>,
    salt_source: Arc<dyn SaltSource>,
    max_connections: usize,
    next_connection_id: AtomicU32,
}

impl Server {
    pub fn new(
        capabilities: ServerCapabilities,
        handler: Arc<dyn CommandHandler>,
        salt_source: Arc<dyn SaltSource>,
        max_connections: usize,
    ) -> Self {
        Self {
            capabilities,
            handler,
            salt_source,
            max_connections,
            next_connection_id: AtomicU32::new(CONNECTION_ID_BASE + 1),
        }
    }

    /// Hands out process-unique connection ids.
    pub fn next_connection_id(&self) -> u32 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn run(&self, addr: Option<SocketAddr>) -> Result<()> {
        let addr = addr.unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)));
        let listener = TcpListener::bind(addr).await?;

        info!("listening on {}", addr);

        // Connection limiter
        let connection_semaphore = Arc::new(Semaphore::new(self.max_connections));

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("accept failed: {}", e);
                    continue;
                }
            };

            let connection_id = self.next_connection_id();
            let session = Session::new(
                connection_id,
                self.capabilities,
                self.salt_source.next_salt(),
            );

            // Clone what we need for the spawned task
            let handler = self.handler.clone();
            let semaphore = connection_semaphore.clone();

            // Spawn a task to handle this connection
            tokio::spawn(async move {
                // Acquire connection permit
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!("connection {}: limiter is closed", connection_id);
                        return;
                    }
                };

                debug!("connection {}: accepted from {}", connection_id, peer_addr);

                let stream = BufReader::with_capacity(READ_BUFFER_SIZE, stream);
                // A fault in one worker must not take down the accept loop
                // or its siblings.
                let outcome = AssertUnwindSafe(serve_connection(stream, session, handler))
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(Ok(())) => debug!("connection {}: closed", connection_id),
                    Ok(Err(e)) => error!("connection {}: {}", connection_id, e),
                    Err(_) => error!("connection {}: worker panicked", connection_id),
                }
            });
        }
    }
}

/// Serves one already-accepted stream to completion.
pub async fn serve_connection<S>(
    stream: S,
    session: Session,
    handler: Arc<dyn CommandHandler>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut connection = Connection::new(stream, session, handler);
    connection.run().await
}
