//! SMB server: listener and per-connection tasks

pub mod connection;

use crate::auth::{Authenticator, Credential, CredentialStore};
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::share::ShareRegistry;
use crate::transport::TcpTransport;
use connection::ConnectionHandler;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// The SMB fixture server.
///
/// Holds the read-only state every connection shares; everything
/// mutable lives in the per-connection [`crate::protocol::Smb2Engine`].
pub struct SmbServer {
    config: ServerConfig,
    authenticator: Arc<Authenticator>,
    shares: Arc<ShareRegistry>,
}

impl SmbServer {
    /// Validate the configuration and build the server. Any problem
    /// here is a configuration error and fatal.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let mut shares = ShareRegistry::new();
        for spec in &config.shares {
            shares.add_share(&spec.name, spec.path.clone(), &spec.comment)?;
        }
        if shares.is_empty() {
            return Err(Error::Configuration("no shares configured".into()));
        }

        let mut store = CredentialStore::new();
        for spec in &config.credentials {
            store.register(Credential::from_password(
                &spec.username,
                &config.workgroup,
                &spec.password,
            )?);
        }
        if store.is_empty() {
            return Err(Error::Configuration("no credentials configured".into()));
        }

        let authenticator = Arc::new(Authenticator::new(store, config.challenge));

        Ok(Self {
            config,
            authenticator,
            shares: Arc::new(shares),
        })
    }

    /// The address the server will bind.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.config.listen_address, self.config.port)
    }

    /// Bind the listener. Failure to bind (port in use, permission
    /// denied) is reported as a configuration error, distinct from any
    /// runtime failure.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.listen_addr();
        TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Configuration(format!("cannot bind {}: {}", addr, e)))
    }

    /// Run the accept loop forever on a pre-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local = listener
            .local_addr()
            .map_err(|e| Error::Configuration(format!("listener address: {}", e)))?;
        info!(addr = %local, "SMB server listening");
        for share in self.shares.iter() {
            info!(share = %share.name, root = %share.root.display(), "exporting share");
        }

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            debug!(peer = %remote_addr, "connection accepted");

            let authenticator = Arc::clone(&self.authenticator);
            let shares = Arc::clone(&self.shares);
            let server_name = self.config.server_name.clone();

            tokio::spawn(async move {
                let transport = TcpTransport::from_stream(stream);
                let mut handler =
                    ConnectionHandler::new(transport, authenticator, shares, server_name);

                match handler.run().await {
                    Ok(()) => debug!(peer = %remote_addr, "connection closed"),
                    Err(e) => error!(peer = %remote_addr, error = %e, "connection failed"),
                }
            });
        }
    }

    /// Bind and serve.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CredentialSpec, ShareSpec};
    use tempfile::TempDir;

    fn valid_config(dir: &TempDir) -> ServerConfig {
        ServerConfig {
            shares: vec![ShareSpec {
                name: "INTEGRATION".into(),
                path: dir.path().to_path_buf(),
                comment: "My-Share".into(),
            }],
            credentials: vec![CredentialSpec {
                username: "hello-world".into(),
                password: "h3110w0r1d".into(),
            }],
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_valid_config_accepted() {
        let dir = TempDir::new().unwrap();
        assert!(SmbServer::new(valid_config(&dir)).is_ok());
    }

    #[test]
    fn test_missing_share_root_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let mut config = valid_config(&dir);
        config.shares[0].path = dir.path().join("does-not-exist");
        assert!(matches!(
            SmbServer::new(config),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_empty_shares_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = valid_config(&dir);
        config.shares.clear();
        assert!(matches!(
            SmbServer::new(config),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_empty_credentials_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = valid_config(&dir);
        config.credentials.clear();
        assert!(matches!(
            SmbServer::new(config),
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let mut config = valid_config(&dir);
        config.listen_address = "127.0.0.1".parse().unwrap();

        // Occupy a port, then ask the server to bind it.
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        config.port = occupied.local_addr().unwrap().port();

        let server = SmbServer::new(config).unwrap();
        assert!(matches!(
            server.bind().await,
            Err(Error::Configuration(_))
        ));
    }
}
