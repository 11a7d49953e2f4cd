//! TCP transport with NetBIOS session framing

use super::SmbTransport;
use crate::error::{Error, Result};
use crate::netbios::{NetBiosHeader, NetBiosMessage};
use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// TCP transport for SMB traffic.
pub struct TcpTransport {
    stream: TcpStream,
    read_buffer: BytesMut,
    remote_addr: Option<SocketAddr>,
}

impl TcpTransport {
    /// Wrap an accepted or connected stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        let remote_addr = stream.peer_addr().ok();
        Self {
            stream,
            read_buffer: BytesMut::with_capacity(65536),
            remote_addr,
        }
    }

    /// Connect to a server (used by the test client).
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::from_stream(stream))
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    async fn read_more(&mut self) -> Result<usize> {
        let mut temp_buf = [0u8; 8192];
        let n = self.stream.read(&mut temp_buf).await?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        self.read_buffer.put_slice(&temp_buf[..n]);
        Ok(n)
    }
}

#[async_trait]
impl SmbTransport for TcpTransport {
    async fn send_message(&mut self, data: &[u8]) -> Result<()> {
        let msg = NetBiosMessage::session_message(data.to_vec())?;
        self.stream.write_all(&msg.to_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn receive_message(&mut self) -> Result<Vec<u8>> {
        while self.read_buffer.len() < NetBiosHeader::SIZE {
            self.read_more().await?;
        }

        let header = NetBiosHeader::parse(&self.read_buffer)?;
        let total_size = NetBiosHeader::SIZE + header.length as usize;

        while self.read_buffer.len() < total_size {
            self.read_more().await?;
        }

        let message_bytes = self.read_buffer.split_to(total_size);
        let message = NetBiosMessage::parse(&message_bytes)?;
        Ok(message.payload)
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        self.read_buffer.clear();
        Ok(())
    }
}
