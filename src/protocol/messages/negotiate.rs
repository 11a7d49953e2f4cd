//! SMB2 Negotiate messages

use super::common::{extract_body_buffer, SmbMessage};
use crate::error::{Error, Result};
use crate::protocol::constants::{
    structure_size, SecurityMode, Smb2Capabilities, Smb2Dialect,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;
use std::io::{self, Read, Write};
use uuid::Uuid;

/// SMB2 Negotiate Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2NegotiateRequest {
    pub security_mode: SecurityMode,
    pub capabilities: Smb2Capabilities,
    pub client_guid: Uuid,
    pub dialects: Vec<Smb2Dialect>,
}

impl Smb2NegotiateRequest {
    pub fn new(dialects: Vec<Smb2Dialect>) -> Self {
        Self {
            security_mode: SecurityMode::SIGNING_ENABLED,
            capabilities: Smb2Capabilities::empty(),
            client_guid: Uuid::new_v4(),
            dialects,
        }
    }
}

impl SmbMessage for Smb2NegotiateRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 36 {
            return Err(Error::ParseError("Negotiate request too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::NEGOTIATE_REQUEST {
            return Err(Error::ParseError(format!(
                "Invalid negotiate request structure size: {}",
                size
            )));
        }

        let dialect_count = cursor.read_u16::<LittleEndian>()?;
        let security_mode = SecurityMode::from_bits_truncate(cursor.read_u16::<LittleEndian>()?);
        let _reserved = cursor.read_u16::<LittleEndian>()?;
        let capabilities = Smb2Capabilities::from_bits_truncate(cursor.read_u32::<LittleEndian>()?);

        let mut guid_bytes = [0u8; 16];
        cursor.read_exact(&mut guid_bytes)?;
        let client_guid = Uuid::from_bytes(guid_bytes);

        let _client_start_time = cursor.read_u64::<LittleEndian>()?;

        let mut dialects = Vec::with_capacity(dialect_count as usize);
        for _ in 0..dialect_count {
            let value = cursor.read_u16::<LittleEndian>()?;
            // Skip dialects this server does not know rather than
            // failing the whole negotiate.
            if let Ok(dialect) = Smb2Dialect::try_from(value) {
                dialects.push(dialect);
            }
        }

        Ok(Self {
            security_mode,
            capabilities,
            client_guid,
            dialects,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::NEGOTIATE_REQUEST)?;
        buf.write_u16::<LittleEndian>(self.dialects.len() as u16)?;
        buf.write_u16::<LittleEndian>(self.security_mode.bits())?;
        buf.write_u16::<LittleEndian>(0)?; // reserved
        buf.write_u32::<LittleEndian>(self.capabilities.bits())?;
        buf.write_all(self.client_guid.as_bytes())?;
        buf.write_u64::<LittleEndian>(0)?; // client start time

        for dialect in &self.dialects {
            buf.write_u16::<LittleEndian>(dialect.to_u16())?;
        }

        Ok(buf)
    }
}

/// SMB2 Negotiate Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2NegotiateResponse {
    pub security_mode: SecurityMode,
    pub dialect_revision: Smb2Dialect,
    pub server_guid: Uuid,
    pub capabilities: Smb2Capabilities,
    pub max_transact_size: u32,
    pub max_read_size: u32,
    pub max_write_size: u32,
    pub system_time: u64,
    pub server_start_time: u64,
    pub security_blob: Vec<u8>,
}

impl SmbMessage for Smb2NegotiateResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 64 {
            return Err(Error::ParseError("Negotiate response too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::NEGOTIATE_RESPONSE {
            return Err(Error::ParseError(format!(
                "Invalid negotiate response structure size: {}",
                size
            )));
        }

        let security_mode = SecurityMode::from_bits_truncate(cursor.read_u16::<LittleEndian>()?);
        let dialect_revision = Smb2Dialect::try_from(cursor.read_u16::<LittleEndian>()?)?;
        let _reserved = cursor.read_u16::<LittleEndian>()?;

        let mut guid_bytes = [0u8; 16];
        cursor.read_exact(&mut guid_bytes)?;
        let server_guid = Uuid::from_bytes(guid_bytes);

        let capabilities = Smb2Capabilities::from_bits_truncate(cursor.read_u32::<LittleEndian>()?);
        let max_transact_size = cursor.read_u32::<LittleEndian>()?;
        let max_read_size = cursor.read_u32::<LittleEndian>()?;
        let max_write_size = cursor.read_u32::<LittleEndian>()?;
        let system_time = cursor.read_u64::<LittleEndian>()?;
        let server_start_time = cursor.read_u64::<LittleEndian>()?;
        let security_buffer_offset = cursor.read_u16::<LittleEndian>()?;
        let security_buffer_length = cursor.read_u16::<LittleEndian>()?;
        let _reserved2 = cursor.read_u32::<LittleEndian>()?;

        let security_blob = extract_body_buffer(
            buf,
            security_buffer_offset as usize,
            security_buffer_length as usize,
        )?
        .to_vec();

        Ok(Self {
            security_mode,
            dialect_revision,
            server_guid,
            capabilities,
            max_transact_size,
            max_read_size,
            max_write_size,
            system_time,
            server_start_time,
            security_blob,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::NEGOTIATE_RESPONSE)?;
        buf.write_u16::<LittleEndian>(self.security_mode.bits())?;
        buf.write_u16::<LittleEndian>(self.dialect_revision.to_u16())?;
        buf.write_u16::<LittleEndian>(0)?; // reserved
        buf.write_all(self.server_guid.as_bytes())?;
        buf.write_u32::<LittleEndian>(self.capabilities.bits())?;
        buf.write_u32::<LittleEndian>(self.max_transact_size)?;
        buf.write_u32::<LittleEndian>(self.max_read_size)?;
        buf.write_u32::<LittleEndian>(self.max_write_size)?;
        buf.write_u64::<LittleEndian>(self.system_time)?;
        buf.write_u64::<LittleEndian>(self.server_start_time)?;

        // Offsets count from the SMB2 header: 64 (header) + 64 (fixed
        // response fields rounded to the blob position).
        let security_buffer_offset = if self.security_blob.is_empty() {
            0u16
        } else {
            128
        };
        buf.write_u16::<LittleEndian>(security_buffer_offset)?;
        buf.write_u16::<LittleEndian>(self.security_blob.len() as u16)?;
        buf.write_u32::<LittleEndian>(0)?; // reserved2

        buf.write_all(&self.security_blob)?;

        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiate_request_roundtrip() {
        let req = Smb2NegotiateRequest::new(vec![Smb2Dialect::Smb202, Smb2Dialect::Smb210]);
        let bytes = req.serialize().unwrap();

        let parsed = Smb2NegotiateRequest::parse(&bytes).unwrap();
        assert_eq!(parsed.dialects, req.dialects);
        assert_eq!(parsed.client_guid, req.client_guid);
    }

    #[test]
    fn test_unknown_dialects_skipped() {
        let mut req = Smb2NegotiateRequest::new(vec![Smb2Dialect::Smb210]);
        req.dialects = vec![Smb2Dialect::Smb210];
        let mut bytes = req.serialize().unwrap();

        // Append a bogus dialect value and bump the count.
        bytes.extend_from_slice(&0x9999u16.to_le_bytes());
        bytes[2..4].copy_from_slice(&2u16.to_le_bytes());

        let parsed = Smb2NegotiateRequest::parse(&bytes).unwrap();
        assert_eq!(parsed.dialects, vec![Smb2Dialect::Smb210]);
    }

    #[test]
    fn test_negotiate_response_roundtrip() {
        let resp = Smb2NegotiateResponse {
            security_mode: SecurityMode::SIGNING_ENABLED,
            dialect_revision: Smb2Dialect::Smb210,
            server_guid: Uuid::new_v4(),
            capabilities: Smb2Capabilities::LARGE_MTU,
            max_transact_size: 1048576,
            max_read_size: 1048576,
            max_write_size: 1048576,
            system_time: 132000000000000000,
            server_start_time: 0,
            security_blob: Vec::new(),
        };

        let bytes = resp.serialize().unwrap();
        let parsed = Smb2NegotiateResponse::parse(&bytes).unwrap();
        assert_eq!(parsed.dialect_revision, Smb2Dialect::Smb210);
        assert_eq!(parsed.max_read_size, 1048576);
    }
}
