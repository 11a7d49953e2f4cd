//! End-to-end tests: a real server task on loopback TCP driven by a
//! hand-rolled SMB2 test client.

mod smb2_client;
mod scenarios;

use crate::auth::ChallengePolicy;
use crate::config::{CredentialSpec, ServerConfig, ShareSpec};
use crate::error::Result;
use crate::server::SmbServer;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::task::JoinHandle;

pub const TEST_USER: &str = "hello-world";
pub const TEST_PASSWORD: &str = "h3110w0r1d";
pub const TEST_SHARE: &str = "INTEGRATION";

/// A running fixture server on an ephemeral loopback port plus the
/// temporary directory backing its share.
pub struct TestServer {
    pub addr: SocketAddr,
    pub share_root: TempDir,
    server_task: JoinHandle<Result<()>>,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        let share_root = tempfile::tempdir()?;

        let config = ServerConfig {
            listen_address: "127.0.0.1".parse().expect("loopback"),
            port: 0,
            shares: vec![ShareSpec {
                name: TEST_SHARE.into(),
                path: share_root.path().to_path_buf(),
                comment: "My-Share".into(),
            }],
            credentials: vec![CredentialSpec {
                username: TEST_USER.into(),
                password: TEST_PASSWORD.into(),
            }],
            challenge: ChallengePolicy::Random,
            ..ServerConfig::default()
        };

        let server = Arc::new(SmbServer::new(config)?);
        let listener = server.bind().await?;
        let addr = listener
            .local_addr()
            .map_err(crate::error::Error::Io)?;

        let server_task = tokio::spawn(async move { server.serve(listener).await });

        Ok(Self {
            addr,
            share_root,
            server_task,
        })
    }

    pub fn stop(self) {
        self.server_task.abort();
    }
}
