//! SMB2 protocol: constants, message codecs, and the per-connection engine

pub mod constants;
pub mod engine;
pub mod messages;

pub use constants::Smb2Command;
pub use engine::Smb2Engine;
