//! TLS Gemini listener
//!
//! One task per connection: TLS accept, read the request line, run it through
//! the [`Gateway`], write the response and close. Shutdown stops accepting and
//! waits a bounded time for in-flight connections.

use duckling::gemini::MAX_REQUEST_URL_BYTES;
use duckling::{ConfigError, Gateway, GeminiRequest, GeminiResponse, RequestError};
use rustls::ServerConfig;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

/// Time allowed for the TLS handshake and the request line
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed to write a response
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(60);

/// Time in-flight connections get to finish after shutdown is requested
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// URL plus CRLF
const REQUEST_LINE_LIMIT: usize = MAX_REQUEST_URL_BYTES + 2;

/// Startup failures
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("No certificate given: pass --server-cert or set CERT")]
    MissingCertificate,

    #[error("No private key given: pass --server-key or set KEY")]
    MissingKey,

    #[error("Failed to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid PEM data: {0}")]
    Pem(#[source] io::Error),

    #[error("No certificate found in PEM data")]
    NoCertificate,

    #[error("No private key found in PEM data")]
    NoPrivateKey,

    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("Failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// PEM-encoded certificate chain and private key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
}

/// Resolve key material from the environment or from files
///
/// A non-empty `env_cert` wins; `env_key` must then be set too. Otherwise
/// both paths are read.
pub fn load_key_material(
    env_cert: Option<String>,
    env_key: Option<String>,
    cert_path: Option<&Path>,
    key_path: Option<&Path>,
) -> Result<KeyMaterial, ServeError> {
    if let Some(cert) = env_cert.filter(|c| !c.is_empty()) {
        let key = env_key
            .filter(|k| !k.is_empty())
            .ok_or(ServeError::MissingKey)?;
        return Ok(KeyMaterial {
            cert_pem: cert.into_bytes(),
            key_pem: key.into_bytes(),
        });
    }

    let cert_path = cert_path.ok_or(ServeError::MissingCertificate)?;
    let key_path = key_path.ok_or(ServeError::MissingKey)?;

    Ok(KeyMaterial {
        cert_pem: read_file(cert_path)?,
        key_pem: read_file(key_path)?,
    })
}

fn read_file(path: &Path) -> Result<Vec<u8>, ServeError> {
    std::fs::read(path).map_err(|source| ServeError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Build the rustls server configuration from PEM key material
pub fn tls_config(material: &KeyMaterial) -> Result<Arc<ServerConfig>, ServeError> {
    let certs = rustls_pemfile::certs(&mut material.cert_pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(ServeError::Pem)?;
    if certs.is_empty() {
        return Err(ServeError::NoCertificate);
    }

    let key = rustls_pemfile::private_key(&mut material.key_pem.as_slice())
        .map_err(ServeError::Pem)?
        .ok_or(ServeError::NoPrivateKey)?;

    let config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(certs, key)?;

    Ok(Arc::new(config))
}

/// Bind the listening socket
///
/// `address` is a host name or an IP literal. IPv6 literals may come with or
/// without brackets.
pub async fn bind(address: &str, port: u16) -> Result<TcpListener, ServeError> {
    let host = address.trim_start_matches('[').trim_end_matches(']');
    TcpListener::bind((host, port))
        .await
        .map_err(|source| ServeError::Bind {
            addr: display_addr(host, port),
            source,
        })
}

/// `host:port`, bracketing IPv6 literals
fn display_addr(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Gemini server sharing one gateway across connections
pub struct Server {
    gateway: Arc<Gateway>,
    acceptor: TlsAcceptor,
}

impl Server {
    pub fn new(gateway: Gateway, tls: Arc<ServerConfig>) -> Self {
        Self {
            gateway: Arc::new(gateway),
            acceptor: TlsAcceptor::from(tls),
        }
    }

    /// Accept connections until `shutdown` resolves, then drain
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down...");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let acceptor = self.acceptor.clone();
                        let gateway = Arc::clone(&self.gateway);
                        connections.spawn(serve_connection(acceptor, stream, peer, gateway));
                    }
                    Err(e) => warn!(error = %e, "Accept failed"),
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Connection task failed");
                    }
                }
            }
        }

        drain(connections).await;
    }
}

async fn drain(mut connections: JoinSet<()>) {
    let pending = connections.len();
    if pending > 0 {
        info!(pending, "Waiting for open connections");
    }

    let drained = timeout(SHUTDOWN_TIMEOUT, async {
        while connections.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        warn!(
            remaining = connections.len(),
            "Shutdown timeout elapsed, aborting connections"
        );
        connections.abort_all();
    }
}

async fn serve_connection(
    acceptor: TlsAcceptor,
    stream: TcpStream,
    peer: SocketAddr,
    gateway: Arc<Gateway>,
) {
    let mut tls = match timeout(READ_TIMEOUT, acceptor.accept(stream)).await {
        Ok(Ok(tls)) => tls,
        Ok(Err(e)) => {
            debug!(%peer, error = %e, "TLS handshake failed");
            return;
        }
        Err(_) => {
            debug!(%peer, "TLS handshake timed out");
            return;
        }
    };

    let line = match timeout(READ_TIMEOUT, read_request_line(&mut tls)).await {
        Ok(Ok(line)) => line,
        Ok(Err(e)) => {
            debug!(%peer, error = %e, "Failed to read request");
            return;
        }
        Err(_) => {
            debug!(%peer, "Request read timed out");
            return;
        }
    };

    let response = match parse_request(&line) {
        Ok(request) => gateway.handle(&request.url).await,
        Err(e) => {
            info!(%peer, error = %e, "Bad request");
            GeminiResponse::bad_request(&e)
        }
    };

    match timeout(WRITE_TIMEOUT, write_response(&mut tls, &response)).await {
        Ok(Ok(())) => debug!(%peer, status = %response.status, "Response sent"),
        Ok(Err(e)) => debug!(%peer, error = %e, "Failed to write response"),
        Err(_) => debug!(%peer, "Response write timed out"),
    }
}

/// Read up to and including the first LF, never more than one request line
async fn read_request_line<R>(stream: &mut R) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream.take(REQUEST_LINE_LIMIT as u64));
    let mut line = Vec::with_capacity(256);
    reader.read_until(b'\n', &mut line).await?;
    Ok(line)
}

fn parse_request(line: &[u8]) -> Result<GeminiRequest, RequestError> {
    if line.len() >= REQUEST_LINE_LIMIT && !line.ends_with(b"\r\n") {
        return Err(RequestError::TooLong {
            limit: MAX_REQUEST_URL_BYTES,
        });
    }
    GeminiRequest::parse(line)
}

async fn write_response<S>(stream: &mut S, response: &GeminiResponse) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    response.write_to(stream).await?;
    stream.shutdown().await
}
