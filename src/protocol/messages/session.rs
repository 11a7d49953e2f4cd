//! SMB2 Session Setup and Logoff messages

use super::common::{extract_body_buffer, SmbMessage};
use crate::error::{Error, Result};
use crate::protocol::constants::{structure_size, SecurityMode, Smb2Capabilities};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Write};

/// SMB2 SessionSetup Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2SessionSetupRequest {
    pub flags: u8,
    pub security_mode: SecurityMode,
    pub capabilities: Smb2Capabilities,
    pub previous_session_id: u64,
    pub security_blob: Vec<u8>,
}

impl Smb2SessionSetupRequest {
    pub fn with_security_blob(blob: Vec<u8>) -> Self {
        Self {
            flags: 0,
            security_mode: SecurityMode::SIGNING_ENABLED,
            capabilities: Smb2Capabilities::empty(),
            previous_session_id: 0,
            security_blob: blob,
        }
    }
}

impl SmbMessage for Smb2SessionSetupRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 24 {
            return Err(Error::ParseError("SessionSetup request too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::SESSION_SETUP_REQUEST {
            return Err(Error::ParseError(format!(
                "Invalid SessionSetup request structure size: {}",
                size
            )));
        }

        let flags = cursor.read_u8()?;
        let security_mode = SecurityMode::from_bits_truncate(cursor.read_u8()? as u16);
        let capabilities = Smb2Capabilities::from_bits_truncate(cursor.read_u32::<LittleEndian>()?);
        let _channel = cursor.read_u32::<LittleEndian>()?;
        let security_buffer_offset = cursor.read_u16::<LittleEndian>()?;
        let security_buffer_length = cursor.read_u16::<LittleEndian>()?;
        let previous_session_id = cursor.read_u64::<LittleEndian>()?;

        let security_blob = extract_body_buffer(
            buf,
            security_buffer_offset as usize,
            security_buffer_length as usize,
        )?
        .to_vec();

        Ok(Self {
            flags,
            security_mode,
            capabilities,
            previous_session_id,
            security_blob,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::SESSION_SETUP_REQUEST)?;
        buf.write_u8(self.flags)?;
        buf.write_u8(self.security_mode.bits() as u8)?;
        buf.write_u32::<LittleEndian>(self.capabilities.bits())?;
        buf.write_u32::<LittleEndian>(0)?; // channel

        let security_buffer_offset = if self.security_blob.is_empty() {
            0u16
        } else {
            (64 + 24) as u16
        };
        buf.write_u16::<LittleEndian>(security_buffer_offset)?;
        buf.write_u16::<LittleEndian>(self.security_blob.len() as u16)?;
        buf.write_u64::<LittleEndian>(self.previous_session_id)?;

        buf.write_all(&self.security_blob)?;

        Ok(buf)
    }
}

/// SMB2 SessionSetup Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2SessionSetupResponse {
    pub session_flags: u16,
    pub security_blob: Vec<u8>,
}

impl Smb2SessionSetupResponse {
    pub fn with_security_blob(blob: Vec<u8>) -> Self {
        Self {
            session_flags: 0,
            security_blob: blob,
        }
    }
}

impl SmbMessage for Smb2SessionSetupResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 8 {
            return Err(Error::ParseError("SessionSetup response too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::SESSION_SETUP_RESPONSE {
            return Err(Error::ParseError(format!(
                "Invalid SessionSetup response structure size: {}",
                size
            )));
        }

        let session_flags = cursor.read_u16::<LittleEndian>()?;
        let security_buffer_offset = cursor.read_u16::<LittleEndian>()?;
        let security_buffer_length = cursor.read_u16::<LittleEndian>()?;

        let security_blob = extract_body_buffer(
            buf,
            security_buffer_offset as usize,
            security_buffer_length as usize,
        )?
        .to_vec();

        Ok(Self {
            session_flags,
            security_blob,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::SESSION_SETUP_RESPONSE)?;
        buf.write_u16::<LittleEndian>(self.session_flags)?;

        let security_buffer_offset = if self.security_blob.is_empty() {
            0u16
        } else {
            (64 + 8) as u16
        };
        buf.write_u16::<LittleEndian>(security_buffer_offset)?;
        buf.write_u16::<LittleEndian>(self.security_blob.len() as u16)?;

        buf.write_all(&self.security_blob)?;

        Ok(buf)
    }
}

/// SMB2 Logoff request and response share the same 4-byte shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Smb2Logoff;

impl SmbMessage for Smb2Logoff {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 4 {
            return Err(Error::ParseError("Logoff message too short".into()));
        }
        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::LOGOFF {
            return Err(Error::ParseError(format!(
                "Invalid Logoff structure size: {}",
                size
            )));
        }
        Ok(Self)
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(4);
        buf.write_u16::<LittleEndian>(structure_size::LOGOFF)?;
        buf.write_u16::<LittleEndian>(0)?; // reserved
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_setup_request_roundtrip() {
        let req = Smb2SessionSetupRequest::with_security_blob(b"NTLMSSP\0blob".to_vec());
        let bytes = req.serialize().unwrap();

        let parsed = Smb2SessionSetupRequest::parse(&bytes).unwrap();
        assert_eq!(parsed.security_blob, b"NTLMSSP\0blob");
    }

    #[test]
    fn test_session_setup_response_roundtrip() {
        let resp = Smb2SessionSetupResponse::with_security_blob(vec![1, 2, 3]);
        let bytes = resp.serialize().unwrap();

        let parsed = Smb2SessionSetupResponse::parse(&bytes).unwrap();
        assert_eq!(parsed.security_blob, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_blob_has_zero_offset() {
        let resp = Smb2SessionSetupResponse::with_security_blob(Vec::new());
        let bytes = resp.serialize().unwrap();
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 0);
    }

    #[test]
    fn test_logoff_roundtrip() {
        let bytes = Smb2Logoff.serialize().unwrap();
        assert_eq!(bytes, vec![4, 0, 0, 0]);
        Smb2Logoff::parse(&bytes).unwrap();
    }
}
