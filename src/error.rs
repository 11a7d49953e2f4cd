//! Error types for the SMB fixture server

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for server operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid startup configuration; fatal before the listener starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Protocol parsing error
    #[error("Protocol parsing error: {0}")]
    ParseError(String),

    /// Protocol violation (bad frame, unexpected command sequence)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Unsupported command or feature
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Authentication failed (unknown user or bad response)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid state transition
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Access denied
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// File not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unknown share name in a tree connect
    #[error("Bad network name: {0}")]
    BadNetworkName(String),

    /// File or directory already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Stale or unknown file handle
    #[error("Invalid handle")]
    InvalidHandle,

    /// Invalid parameter in a request
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Buffer too small
    #[error("Buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall { need: usize, have: usize },

    /// Connection closed by the peer
    #[error("Connection closed")]
    ConnectionClosed,
}

impl Error {
    /// Map this error to the NTSTATUS reported to the client.
    pub fn ntstatus(&self) -> NtStatus {
        match self {
            Error::AuthenticationFailed(_) => NtStatus::LogonFailure,
            Error::AccessDenied(_) => NtStatus::AccessDenied,
            Error::NotFound(_) => NtStatus::ObjectNameNotFound,
            Error::BadNetworkName(_) => NtStatus::BadNetworkName,
            Error::AlreadyExists(_) => NtStatus::ObjectNameCollision,
            Error::InvalidHandle => NtStatus::InvalidHandle,
            Error::NotSupported(_) => NtStatus::NotSupported,
            Error::BufferTooSmall { .. } => NtStatus::BufferTooSmall,
            Error::Io(e) => match e.kind() {
                io::ErrorKind::NotFound => NtStatus::ObjectNameNotFound,
                io::ErrorKind::PermissionDenied => NtStatus::AccessDenied,
                io::ErrorKind::AlreadyExists => NtStatus::ObjectNameCollision,
                _ => NtStatus::InvalidParameter,
            },
            _ => NtStatus::InvalidParameter,
        }
    }

    /// Errors in this class end the connection instead of producing an
    /// error response.
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(
            self,
            Error::ParseError(_) | Error::Protocol(_) | Error::ConnectionClosed
        )
    }
}

/// SMB protocol status codes (subset of NTSTATUS)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum NtStatus {
    /// The operation completed successfully
    Success = 0x00000000,
    /// No more files in an enumeration
    NoMoreFiles = 0x80000006,
    /// The specified handle is invalid
    InvalidHandle = 0xC0000008,
    /// The parameter is incorrect
    InvalidParameter = 0xC000000D,
    /// More processing required (mid-handshake session setup)
    MoreProcessingRequired = 0xC0000016,
    /// Access denied
    AccessDenied = 0xC0000022,
    /// The buffer is too small
    BufferTooSmall = 0xC0000023,
    /// The object name is not found
    ObjectNameNotFound = 0xC0000034,
    /// Cannot create a file that already exists
    ObjectNameCollision = 0xC0000035,
    /// The user name or password is incorrect
    LogonFailure = 0xC000006D,
    /// The request is not supported
    NotSupported = 0xC00000BB,
    /// Bad network name
    BadNetworkName = 0xC00000CC,
}

impl NtStatus {
    /// Check if this is a success status
    pub fn is_success(self) -> bool {
        self == NtStatus::Success
    }

    /// Check if this is an error status
    pub fn is_error(self) -> bool {
        (self as u32) & 0xC0000000 == 0xC0000000
    }
}

impl fmt::Display for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            NtStatus::Success => "Success",
            NtStatus::NoMoreFiles => "No more files",
            NtStatus::InvalidHandle => "Invalid handle",
            NtStatus::InvalidParameter => "Invalid parameter",
            NtStatus::MoreProcessingRequired => "More processing required",
            NtStatus::AccessDenied => "Access denied",
            NtStatus::BufferTooSmall => "Buffer too small",
            NtStatus::ObjectNameNotFound => "Object name not found",
            NtStatus::ObjectNameCollision => "Object name collision",
            NtStatus::LogonFailure => "Logon failure",
            NtStatus::NotSupported => "Not supported",
            NtStatus::BadNetworkName => "Bad network name",
        };
        write!(f, "{} (0x{:08X})", msg, *self as u32)
    }
}
