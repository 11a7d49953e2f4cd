//! Common types for SMB2 messages

use crate::error::{Error, Result};
use crate::protocol::constants::{header_flags, Smb2Command, SMB2_MAGIC_U32};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;
use std::io::{self, Read};

/// Trait for SMB messages that can be parsed from and serialized to bytes
pub trait SmbMessage: Sized {
    /// Parse message from bytes (the command body, header excluded)
    fn parse(buf: &[u8]) -> Result<Self>;

    /// Serialize message to bytes
    fn serialize(&self) -> Result<Vec<u8>>;
}

/// Offsets inside SMB2 bodies are measured from the start of the
/// 64-byte header; this resolves one into the body slice.
pub fn extract_body_buffer(body: &[u8], offset: usize, length: usize) -> Result<&[u8]> {
    if length == 0 {
        return Ok(&[]);
    }
    let start = offset
        .checked_sub(crate::protocol::constants::SMB2_HEADER_SIZE)
        .ok_or_else(|| Error::ParseError("Buffer offset inside header".into()))?;
    let end = start
        .checked_add(length)
        .filter(|&end| end <= body.len())
        .ok_or_else(|| Error::ParseError("Buffer extends beyond message".into()))?;
    Ok(&body[start..end])
}

/// Decode a UTF-16LE byte slice.
pub fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Encode a string as UTF-16LE bytes.
pub fn encode_utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|c| c.to_le_bytes()).collect()
}

/// SMB2 Header (64 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2Header {
    pub protocol_id: u32,
    pub structure_size: u16,
    pub credit_charge: u16,
    pub status: u32,
    pub command: Smb2Command,
    pub credits: u16,
    pub flags: u32,
    pub next_command: u32,
    pub message_id: u64,
    pub reserved: u32,
    pub tree_id: u32,
    pub session_id: u64,
    pub signature: [u8; 16],
}

impl Smb2Header {
    pub const SIZE: usize = 64;

    pub fn new(command: Smb2Command) -> Self {
        Self {
            protocol_id: SMB2_MAGIC_U32,
            structure_size: 64,
            credit_charge: 0,
            status: 0,
            command,
            credits: 1,
            flags: 0,
            next_command: 0,
            message_id: 0,
            reserved: 0,
            tree_id: 0,
            session_id: 0,
            signature: [0; 16],
        }
    }

    /// Build the response header for a request, echoing its message,
    /// session, and tree ids.
    pub fn response_to(request: &Smb2Header, status: u32) -> Self {
        Self {
            protocol_id: SMB2_MAGIC_U32,
            structure_size: 64,
            credit_charge: 0,
            status,
            command: request.command,
            credits: 1,
            flags: header_flags::RESPONSE,
            next_command: 0,
            message_id: request.message_id,
            reserved: 0,
            tree_id: request.tree_id,
            session_id: request.session_id,
            signature: [0u8; 16],
        }
    }

    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(Error::BufferTooSmall {
                need: Self::SIZE,
                have: buf.len(),
            });
        }

        let mut cursor = io::Cursor::new(buf);
        let protocol_id = cursor.read_u32::<LittleEndian>()?;

        if protocol_id != SMB2_MAGIC_U32 {
            return Err(Error::ParseError(format!(
                "Invalid protocol ID: 0x{:08x}",
                protocol_id
            )));
        }

        let structure_size = cursor.read_u16::<LittleEndian>()?;
        let credit_charge = cursor.read_u16::<LittleEndian>()?;
        let status = cursor.read_u32::<LittleEndian>()?;
        let command = Smb2Command::try_from(cursor.read_u16::<LittleEndian>()?)?;
        let credits = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u32::<LittleEndian>()?;
        let next_command = cursor.read_u32::<LittleEndian>()?;
        let message_id = cursor.read_u64::<LittleEndian>()?;
        let reserved = cursor.read_u32::<LittleEndian>()?;
        let tree_id = cursor.read_u32::<LittleEndian>()?;
        let session_id = cursor.read_u64::<LittleEndian>()?;

        let mut signature = [0u8; 16];
        cursor.read_exact(&mut signature)?;

        Ok(Self {
            protocol_id,
            structure_size,
            credit_charge,
            status,
            command,
            credits,
            flags,
            next_command,
            message_id,
            reserved,
            tree_id,
            session_id,
            signature,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.write_u32::<LittleEndian>(self.protocol_id)?;
        buf.write_u16::<LittleEndian>(self.structure_size)?;
        buf.write_u16::<LittleEndian>(self.credit_charge)?;
        buf.write_u32::<LittleEndian>(self.status)?;
        buf.write_u16::<LittleEndian>(self.command as u16)?;
        buf.write_u16::<LittleEndian>(self.credits)?;
        buf.write_u32::<LittleEndian>(self.flags)?;
        buf.write_u32::<LittleEndian>(self.next_command)?;
        buf.write_u64::<LittleEndian>(self.message_id)?;
        buf.write_u32::<LittleEndian>(self.reserved)?;
        buf.write_u32::<LittleEndian>(self.tree_id)?;
        buf.write_u64::<LittleEndian>(self.session_id)?;
        buf.extend_from_slice(&self.signature);
        Ok(buf)
    }

    pub fn is_response(&self) -> bool {
        self.flags & header_flags::RESPONSE != 0
    }
}

/// File ID for SMB2 operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    pub persistent: u64,
    pub volatile: u64,
}

impl FileId {
    pub fn generate() -> Self {
        Self {
            persistent: rand::random(),
            volatile: rand::random(),
        }
    }

    pub fn read_from(cursor: &mut io::Cursor<&[u8]>) -> Result<Self> {
        Ok(Self {
            persistent: cursor.read_u64::<LittleEndian>()?,
            volatile: cursor.read_u64::<LittleEndian>()?,
        })
    }

    pub fn write_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u64::<LittleEndian>(self.persistent)?;
        buf.write_u64::<LittleEndian>(self.volatile)?;
        Ok(())
    }
}

/// SMB2 error response body (MS-SMB2 2.2.2)
pub fn error_response_body() -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(9);
    buf.write_u16::<LittleEndian>(crate::protocol::constants::structure_size::ERROR_RESPONSE)?;
    buf.push(0); // ErrorContextCount
    buf.push(0); // Reserved
    buf.write_u32::<LittleEndian>(0)?; // ByteCount
    buf.push(0); // ErrorData
    Ok(buf)
}
