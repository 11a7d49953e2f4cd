//! SMB2 fixture server binary
//!
//! Serves one or more directories over SMB2 with NTLM authentication,
//! the way an integration-test suite expects a scratch SMB server to
//! behave:
//!
//! ```text
//! fakesmb --share INTEGRATION:/tmp/files:My-Share \
//!         --user hello-world:h3110w0r1d \
//!         --challenge "" --port 445
//! ```

use clap::Parser;
use fakesmb::auth::ChallengePolicy;
use fakesmb::config::{parse_challenge, CredentialSpec, ServerConfig, ShareSpec};
use fakesmb::SmbServer;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fakesmb")]
#[command(about = "Minimal SMB2 server fixture for integration tests", long_about = None)]
struct Args {
    /// Bind address
    #[arg(short = 'b', long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Port to listen on
    #[arg(short = 'p', long, default_value = "445")]
    port: u16,

    /// Server name announced in NTLM challenges
    #[arg(short = 'n', long, default_value = "FAKESMB")]
    server_name: String,

    /// Workgroup/domain name
    #[arg(short = 'w', long, default_value = "WORKGROUP")]
    workgroup: String,

    /// Share definition NAME:PATH[:COMMENT]; repeatable
    #[arg(short = 's', long = "share", required = true, value_parser = ShareSpec::parse)]
    shares: Vec<ShareSpec>,

    /// Credential USER:PASSWORD; repeatable
    #[arg(short = 'u', long = "user", required = true, value_parser = CredentialSpec::parse)]
    users: Vec<CredentialSpec>,

    /// Fixed server challenge as 16 hex digits. An empty value selects
    /// the well-known test constant 4141414141414141. Fixed challenges
    /// make handshakes deterministic but guessable; without this flag
    /// a fresh random challenge is drawn per session.
    #[arg(long = "challenge", value_parser = parse_challenge)]
    challenge: Option<ChallengePolicy>,

    /// Write logs to this file instead of stderr
    #[arg(short = 'l', long)]
    log_file: Option<PathBuf>,

    /// Log level filter
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level));

    match &args.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Arc::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args)?;

    let config = ServerConfig {
        listen_address: args.bind,
        port: args.port,
        server_name: args.server_name,
        workgroup: args.workgroup,
        shares: args.shares,
        credentials: args.users,
        challenge: args.challenge.unwrap_or(ChallengePolicy::Random),
    };

    let server = SmbServer::new(config)?;

    tokio::spawn(async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutdown signal received");
        std::process::exit(0);
    });

    server.run().await?;
    Ok(())
}
