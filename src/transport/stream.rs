//! Gateway endpoints and the connected stream.
//!
//! # Example
//!
//! ```
//! use edge_pt_client::transport::Endpoint;
//!
//! let tcp: Endpoint = "tcp://127.0.0.1:9100".parse().unwrap();
//! assert_eq!(tcp, Endpoint::Tcp("127.0.0.1:9100".into()));
//!
//! let unix: Endpoint = "/tmp/edge.sock".parse().unwrap();
//! assert_eq!(unix, Endpoint::Unix("/tmp/edge.sock".into()));
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

use crate::error::{EdgeError, Result};

/// Where the gateway listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP `host:port`.
    Tcp(String),
    /// Unix domain socket path.
    Unix(PathBuf),
}

impl FromStr for Endpoint {
    type Err = EdgeError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(addr) = s.strip_prefix("tcp://") {
            return Ok(Endpoint::Tcp(addr.to_string()));
        }
        if let Some(path) = s.strip_prefix("unix://") {
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }
        if s.starts_with('/') || s.starts_with('.') {
            return Ok(Endpoint::Unix(PathBuf::from(s)));
        }
        if s.rsplit_once(':').is_some_and(|(host, port)| {
            !host.is_empty() && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit())
        }) {
            return Ok(Endpoint::Tcp(s.to_string()));
        }
        Err(EdgeError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("cannot parse endpoint '{}'", s),
        )))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// A connected gateway stream.
pub enum EdgeStream {
    /// TCP connection.
    Tcp(TcpStream),
    /// Unix domain socket connection.
    #[cfg(unix)]
    Unix(tokio::net::UnixStream),
}

/// Connect to `endpoint`.
///
/// # Errors
///
/// Refusals (nothing listening yet) map to `ConnectionRefused` so the
/// session can retry them; other failures are `Io`.
pub async fn connect(endpoint: &Endpoint) -> Result<EdgeStream> {
    let result = match endpoint {
        Endpoint::Tcp(addr) => TcpStream::connect(addr.as_str()).await.map(|s| {
            let _ = s.set_nodelay(true);
            EdgeStream::Tcp(s)
        }),
        #[cfg(unix)]
        Endpoint::Unix(path) => tokio::net::UnixStream::connect(path)
            .await
            .map(EdgeStream::Unix),
        #[cfg(not(unix))]
        Endpoint::Unix(_) => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "unix sockets are not available on this platform",
        )),
    };

    result.map_err(|e| match e.kind() {
        // A missing socket file is the unix equivalent of nobody listening.
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => {
            EdgeError::ConnectionRefused {
                endpoint: endpoint.to_string(),
            }
        }
        _ => EdgeError::Io(e),
    })
}

impl AsyncRead for EdgeStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            EdgeStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(unix)]
            EdgeStream::Unix(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for EdgeStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            EdgeStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(unix)]
            EdgeStream::Unix(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            EdgeStream::Tcp(s) => Pin::new(s).poll_write_vectored(cx, bufs),
            #[cfg(unix)]
            EdgeStream::Unix(s) => Pin::new(s).poll_write_vectored(cx, bufs),
        }
    }

    fn is_write_vectored(&self) -> bool {
        match self {
            EdgeStream::Tcp(s) => s.is_write_vectored(),
            #[cfg(unix)]
            EdgeStream::Unix(s) => s.is_write_vectored(),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            EdgeStream::Tcp(s) => Pin::new(s).poll_flush(cx),
            #[cfg(unix)]
            EdgeStream::Unix(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            EdgeStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(unix)]
            EdgeStream::Unix(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}
