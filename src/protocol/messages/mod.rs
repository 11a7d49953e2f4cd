//! SMB2 message codecs

pub mod common;
pub mod directory;
pub mod file_ops;
pub mod info;
pub mod negotiate;
pub mod session;
pub mod tree;

pub use common::{FileId, Smb2Header, SmbMessage};
