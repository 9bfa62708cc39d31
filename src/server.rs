use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::sync::Semaphore;
use tokio::task;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::engine::QueryEngine;
use crate::protocol::{self, FrameError, Request, Response};

pub const DEFAULT_PORT: u16 = 9991;
pub const DEFAULT_POOL_SIZE: usize = 15;
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

const INTERNAL_ERROR: &str = "Internal server error.";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Connections handled at once; the rest wait in the listen backlog.
    pub pool_size: usize,
    pub io_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            pool_size: DEFAULT_POOL_SIZE,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("pool size must be between 1 and {max}, got {0}", max = u32::MAX)]
    InvalidPoolSize(usize),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub struct QueryServer {
    listener: TcpListener,
    config: ServerConfig,
}

impl QueryServer {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        if config.pool_size == 0 || u32::try_from(config.pool_size).is_err() {
            return Err(ServerError::InvalidPoolSize(config.pool_size));
        }
        info!(
            %config.addr,
            pool_size = config.pool_size,
            io_timeout = ?config.io_timeout,
            "Binding query listener"
        );
        let listener = TcpListener::bind(config.addr).await?;
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` resolves, then waits for in-flight ones to finish.
    pub async fn run<F>(self, engine: Arc<QueryEngine>, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let pool = Arc::new(Semaphore::new(self.config.pool_size));
        tokio::pin!(shutdown);

        loop {
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = Arc::clone(&pool).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!(error = %err, "Failed to accept connection");
                        continue;
                    }
                },
            };

            let engine = Arc::clone(&engine);
            let io_timeout = self.config.io_timeout;
            task::spawn(async move {
                handle_connection(stream, peer, engine, io_timeout).await;
                drop(permit);
            });
        }

        info!("Draining in-flight connections");
        if let Ok(all) = u32::try_from(self.config.pool_size) {
            let _ = pool.acquire_many(all).await;
        }
        info!("Query server exited");
        Ok(())
    }
}

/// Serves until Ctrl-C or SIGTERM.
pub async fn serve(engine: Arc<QueryEngine>, config: ServerConfig) -> Result<(), ServerError> {
    QueryServer::bind(config)
        .await?
        .run(engine, shutdown_signal())
        .await
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    engine: Arc<QueryEngine>,
    io_timeout: Duration,
) {
    let response = match timeout(io_timeout, protocol::receive::<_, Request>(&mut stream)).await {
        Err(_) => {
            warn!(%peer, "Timed out waiting for request");
            return;
        }
        Ok(Err(FrameError::Io(err))) => {
            warn!(%peer, error = %err, "Failed to read request");
            return;
        }
        Ok(Err(err)) => {
            info!(%peer, error = %err, "Rejected malformed request");
            Response::failure(err.to_string())
        }
        Ok(Ok(request)) => {
            debug!(%peer, query = %request.query, "Received request");
            match task::spawn_blocking(move || engine.respond(&request)).await {
                Ok(response) => response,
                Err(err) => {
                    error!(%peer, error = %err, "Query worker failed");
                    Response::failure(INTERNAL_ERROR)
                }
            }
        }
    };

    match timeout(io_timeout, protocol::send(&mut stream, &response)).await {
        Ok(Ok(())) => debug!(%peer, status = ?response.status, "Sent response"),
        Ok(Err(err)) => warn!(%peer, error = %err, "Failed to write response"),
        Err(_) => warn!(%peer, "Timed out writing response"),
    }
    let _ = stream.shutdown().await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
