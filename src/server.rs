//! HTTP server builder and shutdown wiring.

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use thiserror::Error;
use tokio::{
    net::{lookup_host, TcpSocket, ToSocketAddrs},
    task::JoinHandle,
};
use tracing::{debug, error, info};

use crate::{
    config::HttpConfig,
    signal::{SignalError, SignalStream},
};

/// Error type returned by the server builder.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServerBuilderError {
    /// Unable to parse endpoint address.
    #[error("unable to parse endpoint address: {0}")]
    AddressParse(#[source] std::io::Error),
    /// Unable to resolve DNS name.
    #[error("unable to resolve DNS name: {0}")]
    Resolve(String),
    /// Unable to create socket.
    #[error("unable to create socket: {0}")]
    SocketCreate(#[source] std::io::Error),
    /// Unable to set `SO_REUSEADDR`.
    #[error("unable to set SO_REUSEADDR: {0}")]
    SetReuseAddr(#[source] std::io::Error),
    /// Unable to bind socket to local address.
    #[error("unable to bind socket to local address {0}: {1}")]
    BindAddr(SocketAddr, #[source] std::io::Error),
    /// Unable to listen on socket.
    #[error("unable to listen on socket {0}: {1}")]
    Listen(SocketAddr, #[source] std::io::Error),
    /// Unable to perform conversion into std listener.
    #[error("unable to perform conversion into std listener: {0}")]
    ConvertListener(#[source] std::io::Error),
    /// Signal handler error.
    #[error(transparent)]
    SignalHandler(#[from] SignalError),
}

/// Size of the TCP backlog queue.
const TCP_BACKLOG: u32 = 1024;

/// Builder for the exporter's HTTP server.
pub struct ServerBuilder {
    /// Host/address and port to listen on.
    listen: String,
    /// Maximum allowed time to wait for a client to send request headers.
    header_read_timeout: Duration,
}

impl From<&HttpConfig> for ServerBuilder {
    fn from(cfg: &HttpConfig) -> Self {
        Self {
            listen: cfg.listen.clone(),
            header_read_timeout: cfg.header_read_timeout,
        }
    }
}

impl ServerBuilder {
    /// Build the network server.
    ///
    /// # Errors
    ///
    /// Returns `Err` if setting up the listening socket fails.
    pub async fn build(&self) -> Result<axum_server::Server, ServerBuilderError> {
        let (sock, addr) = socket(&self.listen).await?;
        sock.bind(addr)
            .map_err(|err| ServerBuilderError::BindAddr(addr, err))?;
        let listener = sock
            .listen(TCP_BACKLOG)
            .map_err(|err| ServerBuilderError::Listen(addr, err))?
            .into_std()
            .map_err(ServerBuilderError::ConvertListener)?;
        let mut server = axum_server::from_tcp(listener);
        server
            .http_builder()
            .http1()
            .header_read_timeout(self.header_read_timeout);
        info!(listen = %self.listen, "finished building server");
        Ok(server)
    }

    /// Launch a task that captures common UNIX signals.
    ///
    /// Shutdown signals gracefully stop the server within `shutdown_timeout`.
    /// SIGHUP is acknowledged and ignored; log rotation belongs to the
    /// appender.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a signal handler cannot be registered.
    pub fn spawn_signal_handler(
        &self,
        handle: Handle,
        shutdown_timeout: Duration,
    ) -> Result<JoinHandle<()>, ServerBuilderError> {
        let mut sig = SignalStream::new()?;
        Ok(tokio::spawn(async move {
            loop {
                match sig.next().await {
                    Ok(sig) if sig.is_shutdown() => {
                        info!("received {}, shutting down server", sig.name());
                        handle.graceful_shutdown(Some(shutdown_timeout));
                        break;
                    }
                    Ok(sig) => {
                        debug!("nothing to do for signal {}, ignoring", sig.name());
                    }
                    Err(err) => {
                        error!("error in signal handler: {err}");
                    }
                }
            }
        }))
    }
}

/// Turn a DNS name or address into a bound-ready socket.
///
/// If a name resolves to multiple addresses, all of them are tried in order.
async fn socket<O>(origin: O) -> Result<(TcpSocket, SocketAddr), ServerBuilderError>
where
    O: ToSocketAddrs + ToString,
{
    let mut ret_err = None;
    let ret = lookup_host(&origin)
        .await
        .map_err(ServerBuilderError::AddressParse)?
        .find_map(|addr| match sock_create(&addr) {
            Ok(sock) => Some((sock, addr)),
            Err(err) => {
                ret_err = Some(err);
                None
            }
        });
    match ret {
        Some(pair) => Ok(pair),
        None => match ret_err {
            Some(err) => Err(err),
            None => Err(ServerBuilderError::Resolve(origin.to_string())),
        },
    }
}

/// Create a socket matching the address family of `addr`.
fn sock_create(addr: &SocketAddr) -> Result<TcpSocket, ServerBuilderError> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }
    .map_err(ServerBuilderError::SocketCreate)?;
    socket
        .set_reuseaddr(true)
        .map_err(ServerBuilderError::SetReuseAddr)?;
    Ok(socket)
}
