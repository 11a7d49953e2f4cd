//! SMB2 Tree Connect and Tree Disconnect messages

use super::common::{decode_utf16le, encode_utf16le, extract_body_buffer, SmbMessage};
use crate::error::{Error, Result};
use crate::protocol::constants::{structure_size, DesiredAccess, ShareType};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;
use std::io::{self, Write};

/// SMB2 TreeConnect Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2TreeConnectRequest {
    pub flags: u16,
    /// UNC path of the form `\\server\share`
    pub path: String,
}

impl Smb2TreeConnectRequest {
    pub fn new(path: String) -> Self {
        Self { flags: 0, path }
    }
}

impl SmbMessage for Smb2TreeConnectRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 8 {
            return Err(Error::ParseError("TreeConnect request too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::TREE_CONNECT_REQUEST {
            return Err(Error::ParseError(format!(
                "Invalid TreeConnect request structure size: {}",
                size
            )));
        }

        let flags = cursor.read_u16::<LittleEndian>()?;
        let path_offset = cursor.read_u16::<LittleEndian>()?;
        let path_length = cursor.read_u16::<LittleEndian>()?;

        let path_bytes = extract_body_buffer(buf, path_offset as usize, path_length as usize)?;
        let path = decode_utf16le(path_bytes);

        Ok(Self { flags, path })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let path_bytes = encode_utf16le(&self.path);
        let path_offset = if path_bytes.is_empty() { 0u16 } else { 64 + 8 };

        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::TREE_CONNECT_REQUEST)?;
        buf.write_u16::<LittleEndian>(self.flags)?;
        buf.write_u16::<LittleEndian>(path_offset)?;
        buf.write_u16::<LittleEndian>(path_bytes.len() as u16)?;
        buf.write_all(&path_bytes)?;

        Ok(buf)
    }
}

/// SMB2 TreeConnect Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2TreeConnectResponse {
    pub share_type: ShareType,
    pub share_flags: u32,
    pub capabilities: u32,
    pub maximal_access: u32,
}

impl Smb2TreeConnectResponse {
    pub fn disk() -> Self {
        Self {
            share_type: ShareType::Disk,
            share_flags: 0,
            capabilities: 0,
            maximal_access: DesiredAccess::FILE_ALL_ACCESS.bits(),
        }
    }
}

impl SmbMessage for Smb2TreeConnectResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 16 {
            return Err(Error::ParseError("TreeConnect response too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::TREE_CONNECT_RESPONSE {
            return Err(Error::ParseError(format!(
                "Invalid TreeConnect response structure size: {}",
                size
            )));
        }

        let share_type = ShareType::try_from(cursor.read_u8()?)?;
        let _reserved = cursor.read_u8()?;
        let share_flags = cursor.read_u32::<LittleEndian>()?;
        let capabilities = cursor.read_u32::<LittleEndian>()?;
        let maximal_access = cursor.read_u32::<LittleEndian>()?;

        Ok(Self {
            share_type,
            share_flags,
            capabilities,
            maximal_access,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::TREE_CONNECT_RESPONSE)?;
        buf.write_u8(self.share_type as u8)?;
        buf.write_u8(0)?; // reserved
        buf.write_u32::<LittleEndian>(self.share_flags)?;
        buf.write_u32::<LittleEndian>(self.capabilities)?;
        buf.write_u32::<LittleEndian>(self.maximal_access)?;
        Ok(buf)
    }
}

/// SMB2 TreeDisconnect request and response (4 bytes each).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Smb2TreeDisconnect;

impl SmbMessage for Smb2TreeDisconnect {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 4 {
            return Err(Error::ParseError("TreeDisconnect too short".into()));
        }
        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::TREE_DISCONNECT {
            return Err(Error::ParseError(format!(
                "Invalid TreeDisconnect structure size: {}",
                size
            )));
        }
        Ok(Self)
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(4);
        buf.write_u16::<LittleEndian>(structure_size::TREE_DISCONNECT)?;
        buf.write_u16::<LittleEndian>(0)?; // reserved
        Ok(buf)
    }
}
