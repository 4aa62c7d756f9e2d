// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job IPC addresses and the socket factory that binds and connects them.

use async_trait::async_trait;
use hp_core::WorkerId;
use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

/// TCP port of worker `n` is `TCP_BASE_PORT + n`.
pub const TCP_BASE_PORT: u16 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobAddress {
    Unix(PathBuf),
    Tcp(SocketAddr),
}

impl JobAddress {
    /// The address worker `id` listens on.
    #[cfg(unix)]
    pub fn for_worker(runtime_dir: &Path, id: WorkerId) -> Self {
        JobAddress::Unix(runtime_dir.join(format!("worker-{id}.sock")))
    }

    #[cfg(not(unix))]
    pub fn for_worker(_runtime_dir: &Path, id: WorkerId) -> Self {
        Self::tcp_for_worker(id)
    }

    pub fn tcp_for_worker(id: WorkerId) -> Self {
        let port = TCP_BASE_PORT.saturating_add(id.get() as u16);
        JobAddress::Tcp(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
    }
}

impl fmt::Display for JobAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobAddress::Unix(path) => write!(f, "unix:{}", path.display()),
            JobAddress::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

/// A connected byte stream of either flavour.
pub trait JobStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> JobStream for T {}

pub type BoxStream = Box<dyn JobStream>;

pub enum JobListener {
    #[cfg(unix)]
    Unix {
        listener: tokio::net::UnixListener,
        path: PathBuf,
    },
    Tcp(TcpListener),
}

impl JobListener {
    pub async fn accept(&self) -> io::Result<BoxStream> {
        match self {
            #[cfg(unix)]
            JobListener::Unix { listener, .. } => {
                let (stream, _) = listener.accept().await?;
                Ok(Box::new(stream))
            }
            JobListener::Tcp(listener) => {
                let (stream, _) = listener.accept().await?;
                stream.set_nodelay(true)?;
                Ok(Box::new(stream))
            }
        }
    }
}

impl Drop for JobListener {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let JobListener::Unix { path, .. } = self {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Creates job listeners and outbound job connections.
#[async_trait]
pub trait SocketFactory: Send + Sync {
    async fn bind(&self, address: &JobAddress) -> io::Result<JobListener>;

    async fn connect(&self, address: &JobAddress, timeout: Duration) -> io::Result<BoxStream>;
}

/// Binds plain Unix-domain or TCP sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSocketFactory;

#[async_trait]
impl SocketFactory for DefaultSocketFactory {
    async fn bind(&self, address: &JobAddress) -> io::Result<JobListener> {
        match address {
            #[cfg(unix)]
            JobAddress::Unix(path) => {
                // A previous incarnation of this worker may have left its socket behind.
                match std::fs::remove_file(path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
                let listener = tokio::net::UnixListener::bind(path)?;
                Ok(JobListener::Unix {
                    listener,
                    path: path.clone(),
                })
            }
            #[cfg(not(unix))]
            JobAddress::Unix(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "unix sockets are not available on this platform",
            )),
            JobAddress::Tcp(addr) => Ok(JobListener::Tcp(TcpListener::bind(addr).await?)),
        }
    }

    async fn connect(&self, address: &JobAddress, timeout: Duration) -> io::Result<BoxStream> {
        let connect = async {
            match address {
                #[cfg(unix)]
                JobAddress::Unix(path) => {
                    let stream = tokio::net::UnixStream::connect(path).await?;
                    Ok::<BoxStream, io::Error>(Box::new(stream))
                }
                #[cfg(not(unix))]
                JobAddress::Unix(_) => Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "unix sockets are not available on this platform",
                )),
                JobAddress::Tcp(addr) => {
                    let stream = TcpStream::connect(addr).await?;
                    stream.set_nodelay(true)?;
                    Ok(Box::new(stream) as BoxStream)
                }
            }
        };
        tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))?
    }
}

#[cfg(test)]
#[path = "address_tests.rs"]
mod tests;
