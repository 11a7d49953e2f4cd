//! fakesmb - a minimal SMB2 server fixture
//!
//! A small, protocol-conformant SMB2 file server meant to stand in for a
//! real file server in integration tests of remote-filesystem clients:
//! one process, a handful of shares, NTLM-authenticated users, and
//! honest file I/O against a local directory tree.

#![forbid(unsafe_code)]

pub mod auth;
pub mod config;
pub mod error;
pub mod netbios;
pub mod protocol;
pub mod server;
pub mod share;
pub mod transport;

#[cfg(test)]
mod e2e_tests;

pub use config::ServerConfig;
pub use error::{Error, NtStatus, Result};
pub use server::SmbServer;
