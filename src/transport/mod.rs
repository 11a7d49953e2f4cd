//! Transport layer
//!
//! tokio-based async transport carrying NetBIOS-framed SMB2 messages,
//! behind a trait so tests can drive the server over any stream.

use crate::error::Result;
use async_trait::async_trait;

pub mod tcp;

pub use tcp::TcpTransport;

/// A framed SMB transport: whole messages in, whole messages out.
#[async_trait]
pub trait SmbTransport: Send {
    /// Send one SMB message, applying NetBIOS session framing.
    async fn send_message(&mut self, data: &[u8]) -> Result<()>;

    /// Receive one complete SMB message, stripping the framing.
    async fn receive_message(&mut self) -> Result<Vec<u8>>;

    /// Close the transport.
    async fn close(&mut self) -> Result<()>;
}
