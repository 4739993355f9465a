//! Session server listener
//!
//! Handles the TCP accept loop and spawns one session task per connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::Semaphore;
use vidforge_common::Result;

use super::session::Session;
use super::ServerContext;

/// Session protocol server
pub struct Server {
    listener: TcpListener,
    ctx: Arc<ServerContext>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl Server {
    /// Bind the listening socket.
    ///
    /// `max_connections` of 0 means unlimited.
    pub async fn bind(
        addr: impl ToSocketAddrs,
        ctx: ServerContext,
        max_connections: usize,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;

        let connection_semaphore = if max_connections > 0 {
            Some(Arc::new(Semaphore::new(max_connections)))
        } else {
            None
        };

        Ok(Self {
            listener,
            ctx: Arc::new(ctx),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        })
    }

    /// Address the server is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the server
    ///
    /// This method only returns on an unrecoverable error.
    pub async fn run(&self) -> Result<()> {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "Server listening");
        self.accept_loop().await
    }

    /// Run the server until `shutdown` resolves.
    ///
    /// Stops accepting new connections; sessions already running finish on
    /// their own.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "Server listening");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop() => result,
        }
    }

    async fn accept_loop(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // The permit travels with the session task and is released when it ends.
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = socket.set_nodelay(true) {
            tracing::debug!(session_id = session_id, error = %e, "Failed to set TCP_NODELAY");
        }

        let ctx = Arc::clone(&self.ctx);

        tokio::spawn(async move {
            let _permit = permit;
            let (reader, writer) = socket.into_split();
            let mut session = Session::new(session_id, peer_addr.to_string(), reader, writer, ctx);

            if let Err(e) = session.run().await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }

            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }
}
