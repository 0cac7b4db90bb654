// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP transport (JetDirect, port 9100).
//
// The simplest network path to a label printer: open a TCP socket and
// stream command-language bytes. Most network-attached label printers
// echo a short status frame after PRINT, so this is the one variant
// that expects a status reply.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use labelwerk_core::error::{LabelwerkError, Result};

use super::Transport;

/// Default raw TCP print port.
pub const RAW_PORT: u16 = 9100;

/// Largest status frame a label printer is known to send.
const STATUS_BUF: usize = 64;

/// TCP channel to a network-attached printer.
pub struct NetworkTransport {
    stream: Option<TcpStream>,
    addr: String,
}

impl NetworkTransport {
    /// Connect to `host:port` (bare `host` gets the default raw port).
    pub async fn connect(address: &str, connect_timeout: Duration) -> Result<Self> {
        let addr = normalize_address(address)?;
        info!(addr = %addr, "connecting via raw TCP");

        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                LabelwerkError::Transport(format!(
                    "connect to {} timed out after {:?}",
                    addr, connect_timeout
                ))
            })?
            .map_err(|e| LabelwerkError::Transport(format!("connect to {}: {}", addr, e)))?;

        // Label jobs are tiny; coalescing hurts far more than it helps.
        stream
            .set_nodelay(true)
            .map_err(|e| LabelwerkError::Transport(format!("set_nodelay on {}: {}", addr, e)))?;

        Ok(Self {
            stream: Some(stream),
            addr,
        })
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| LabelwerkError::Transport(format!("{}: connection closed", self.addr)))
    }
}

#[async_trait]
impl Transport for NetworkTransport {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let addr = self.addr.clone();
        let stream = self.stream_mut()?;
        stream
            .write_all(chunk)
            .await
            .map_err(|e| LabelwerkError::Transport(format!("send to {}: {}", addr, e)))?;
        stream
            .flush()
            .await
            .map_err(|e| LabelwerkError::Transport(format!("flush to {}: {}", addr, e)))?;
        debug!(addr = %addr, bytes = chunk.len(), "chunk written");
        Ok(())
    }

    async fn read_status(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let addr = self.addr.clone();
        let stream = self.stream_mut()?;
        let mut buf = [0u8; STATUS_BUF];

        let n = tokio::time::timeout(timeout, stream.read(&mut buf))
            .await
            .map_err(|_| LabelwerkError::StatusTimeout(timeout))?
            .map_err(|e| LabelwerkError::Transport(format!("status read from {}: {}", addr, e)))?;

        if n == 0 {
            return Err(LabelwerkError::Transport(format!(
                "{}: connection closed before status",
                addr
            )));
        }
        debug!(addr = %addr, bytes = n, "status received");
        Ok(buf[..n].to_vec())
    }

    fn expects_status(&self) -> bool {
        true
    }

    async fn is_alive(&mut self) -> bool {
        match &self.stream {
            Some(stream) => stream.peer_addr().is_ok(),
            None => false,
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream
                .flush()
                .await
                .map_err(|e| LabelwerkError::Transport(format!("flush to {}: {}", self.addr, e)))?;
            stream.shutdown().await.map_err(|e| {
                LabelwerkError::Transport(format!("shutdown to {}: {}", self.addr, e))
            })?;
            info!(addr = %self.addr, "connection closed");
        }
        Ok(())
    }
}

/// Accept `host:port` or a bare host (default raw port appended).
fn normalize_address(address: &str) -> Result<String> {
    if address.is_empty() {
        return Err(LabelwerkError::Address("empty network address".into()));
    }
    match address.rsplit_once(':') {
        Some((host, port)) => {
            if host.is_empty() {
                return Err(LabelwerkError::Address(format!("missing host in {address:?}")));
            }
            port.parse::<u16>()
                .map_err(|_| LabelwerkError::Address(format!("bad port in {address:?}")))?;
            Ok(address.to_string())
        }
        None => Ok(format!("{}:{}", address, RAW_PORT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_default_port() {
        assert_eq!(normalize_address("192.168.1.50").unwrap(), "192.168.1.50:9100");
    }

    #[test]
    fn explicit_port_is_kept() {
        assert_eq!(normalize_address("printer:631").unwrap(), "printer:631");
    }

    #[test]
    fn malformed_addresses_are_rejected() {
        assert!(matches!(
            normalize_address(""),
            Err(LabelwerkError::Address(_))
        ));
        assert!(matches!(
            normalize_address(":9100"),
            Err(LabelwerkError::Address(_))
        ));
        assert!(matches!(
            normalize_address("printer:notaport"),
            Err(LabelwerkError::Address(_))
        ));
    }

    #[tokio::test]
    async fn status_roundtrip_against_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 256];
            let n = sock.read(&mut buf).await.unwrap();
            // Echo a two-byte "ready" status once the job arrived.
            sock.write_all(&[0x00, 0x40]).await.unwrap();
            buf.truncate(n);
            buf
        });

        let mut transport = NetworkTransport::connect(
            &addr.to_string(),
            Duration::from_secs(5),
        )
        .await
        .expect("connect");

        transport.write_chunk(b"PRINT 1,1\r\n").await.expect("write");
        let status = transport
            .read_status(Duration::from_secs(5))
            .await
            .expect("status");
        assert_eq!(status, vec![0x00, 0x40]);

        transport.close().await.expect("close");
        let seen = server.await.unwrap();
        assert_eq!(seen, b"PRINT 1,1\r\n");
    }

    #[tokio::test]
    async fn connect_refused_is_transport_error() {
        // Bind then drop to get a port that refuses connections.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result =
            NetworkTransport::connect(&addr.to_string(), Duration::from_secs(5)).await;
        assert!(matches!(result, Err(LabelwerkError::Transport(_))));
    }
}
