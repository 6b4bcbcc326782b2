//! TCP transport with opportunistic TLS upgrade
//!
//! The wire exchange is a plain command-string/response-bytes pair: connect,
//! optionally wrap the stream in TLS, write the command, read one bounded
//! response. A failed TLS handshake downgrades to a fresh unencrypted
//! connection within the same attempt instead of failing it.

use crate::error::{QueryError, Result};
use crate::transport::{DeviceTransport, ExchangeReply, ExchangeRequest, RESPONSE_BUFFER_SIZE};
use async_trait::async_trait;
use rustls::pki_types::ServerName;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

/// Production transport: tokio TCP with a rustls upgrade path.
pub struct TcpTransport {
    connector: TlsConnector,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpTransport {
    /// Create a transport with the webpki trust anchors.
    pub fn new() -> Self {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Self {
            connector: TlsConnector::from(Arc::new(config)),
        }
    }

    async fn connect_plain(
        &self,
        address: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<TcpStream> {
        match tokio::time::timeout(connect_timeout, TcpStream::connect((address, port))).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(QueryError::from_io("connect", e)),
            Err(_) => Err(QueryError::timeout(format!(
                "connect to {address}:{port} exceeded {connect_timeout:?}"
            ))),
        }
    }

    async fn upgrade(&self, address: &str, stream: TcpStream) -> Result<TlsStream<TcpStream>> {
        let server_name = ServerName::try_from(address.to_string())
            .map_err(|e| QueryError::tls(format!("invalid server name {address}: {e}")))?;
        self.connector
            .connect(server_name, stream)
            .await
            .map_err(|e| QueryError::tls(format!("handshake with {address}: {e}")))
    }

    async fn exchange_inner(&self, request: &ExchangeRequest<'_>) -> Result<ExchangeReply> {
        let stream = self
            .connect_plain(request.address, request.port, request.connect_timeout)
            .await?;

        if request.use_tls {
            match self.upgrade(request.address, stream).await {
                Ok(mut tls_stream) => {
                    let payload = converse(&mut tls_stream, request.command)
                        .await
                        .map_err(|e| QueryError::from_io("exchange", e))?;
                    Ok(ExchangeReply {
                        payload,
                        tls_downgraded: false,
                    })
                }
                Err(handshake_error) => {
                    // Graceful downgrade: the handshake consumed the stream,
                    // so the unencrypted exchange needs a fresh connection.
                    // Still the same attempt; no retry is consumed.
                    warn!(
                        address = request.address,
                        error = %handshake_error,
                        "TLS handshake failed, falling back to unencrypted exchange"
                    );
                    let mut plain = self
                        .connect_plain(request.address, request.port, request.connect_timeout)
                        .await?;
                    let payload = converse(&mut plain, request.command)
                        .await
                        .map_err(|e| QueryError::from_io("exchange", e))?;
                    Ok(ExchangeReply {
                        payload,
                        tls_downgraded: true,
                    })
                }
            }
        } else {
            let mut plain = stream;
            let payload = converse(&mut plain, request.command)
                .await
                .map_err(|e| QueryError::from_io("exchange", e))?;
            Ok(ExchangeReply {
                payload,
                tls_downgraded: false,
            })
        }
    }
}

#[async_trait]
impl DeviceTransport for TcpTransport {
    async fn exchange(&self, request: ExchangeRequest<'_>) -> Result<ExchangeReply> {
        let attempt_timeout = request.attempt_timeout;
        match tokio::time::timeout(attempt_timeout, self.exchange_inner(&request)).await {
            Ok(result) => result,
            Err(_) => Err(QueryError::timeout(format!(
                "attempt against {}:{} exceeded {attempt_timeout:?}",
                request.address, request.port
            ))),
        }
        // the connection is dropped on every path out of exchange_inner
    }

    async fn probe_tls(&self, address: &str, port: u16, timeout: Duration) -> bool {
        let probe = async {
            let stream = self.connect_plain(address, port, timeout).await?;
            self.upgrade(address, stream).await.map(|_| ())
        };
        match tokio::time::timeout(timeout, probe).await {
            Ok(Ok(())) => {
                debug!(address, "TLS capability probe succeeded");
                true
            }
            Ok(Err(e)) => {
                debug!(address, error = %e, "TLS capability probe failed");
                false
            }
            Err(_) => {
                debug!(address, "TLS capability probe timed out");
                false
            }
        }
    }
}

/// Write the command and read one bounded response.
async fn converse<S>(stream: &mut S, command: &str) -> std::io::Result<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(command.as_bytes()).await?;
    stream.flush().await?;

    let mut buffer = [0u8; RESPONSE_BUFFER_SIZE];
    let read = stream.read(&mut buffer).await?;
    Ok(String::from_utf8_lossy(&buffer[..read]).into_owned())
}
