//! SMB2 Query/Set Info messages

use super::common::{extract_body_buffer, FileId, SmbMessage};
use crate::error::{Error, Result};
use crate::protocol::constants::structure_size;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;
use std::io::{self, Write};

/// Info types for QueryInfo/SetInfo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InfoType {
    File = 0x01,
    Filesystem = 0x02,
    Security = 0x03,
    Quota = 0x04,
}

impl TryFrom<u8> for InfoType {
    type Error = Error;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0x01 => Ok(InfoType::File),
            0x02 => Ok(InfoType::Filesystem),
            0x03 => Ok(InfoType::Security),
            0x04 => Ok(InfoType::Quota),
            _ => Err(Error::InvalidParameter(format!(
                "Invalid info type: {}",
                value
            ))),
        }
    }
}

/// File information classes handled by the fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileInfoClass {
    Basic = 0x04,
    Standard = 0x05,
    Internal = 0x06,
    Ea = 0x07,
    Access = 0x08,
    Name = 0x09,
    Disposition = 0x0D,
    Position = 0x0E,
    Mode = 0x10,
    Alignment = 0x11,
    All = 0x12,
    EndOfFile = 0x14,
    NetworkOpen = 0x22,
    /// Anything the fixture does not interpret
    Other(u8),
}

impl From<u8> for FileInfoClass {
    fn from(value: u8) -> Self {
        match value {
            0x04 => FileInfoClass::Basic,
            0x05 => FileInfoClass::Standard,
            0x06 => FileInfoClass::Internal,
            0x07 => FileInfoClass::Ea,
            0x08 => FileInfoClass::Access,
            0x09 => FileInfoClass::Name,
            0x0D => FileInfoClass::Disposition,
            0x0E => FileInfoClass::Position,
            0x10 => FileInfoClass::Mode,
            0x11 => FileInfoClass::Alignment,
            0x12 => FileInfoClass::All,
            0x14 => FileInfoClass::EndOfFile,
            0x22 => FileInfoClass::NetworkOpen,
            other => FileInfoClass::Other(other),
        }
    }
}

impl FileInfoClass {
    pub fn to_u8(self) -> u8 {
        match self {
            FileInfoClass::Basic => 0x04,
            FileInfoClass::Standard => 0x05,
            FileInfoClass::Internal => 0x06,
            FileInfoClass::Ea => 0x07,
            FileInfoClass::Access => 0x08,
            FileInfoClass::Name => 0x09,
            FileInfoClass::Disposition => 0x0D,
            FileInfoClass::Position => 0x0E,
            FileInfoClass::Mode => 0x10,
            FileInfoClass::Alignment => 0x11,
            FileInfoClass::All => 0x12,
            FileInfoClass::EndOfFile => 0x14,
            FileInfoClass::NetworkOpen => 0x22,
            FileInfoClass::Other(other) => other,
        }
    }
}

/// SMB2 QUERY_INFO Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2QueryInfoRequest {
    pub info_type: InfoType,
    pub file_info_class: FileInfoClass,
    pub output_buffer_length: u32,
    pub file_id: FileId,
}

impl Smb2QueryInfoRequest {
    pub fn new(file_id: FileId, info_type: InfoType, file_info_class: FileInfoClass) -> Self {
        Self {
            info_type,
            file_info_class,
            output_buffer_length: 65536,
            file_id,
        }
    }
}

impl SmbMessage for Smb2QueryInfoRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 40 {
            return Err(Error::ParseError("QueryInfo request too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::QUERY_INFO_REQUEST {
            return Err(Error::ParseError(format!(
                "Invalid QueryInfo request structure size: {}",
                size
            )));
        }

        let info_type = InfoType::try_from(cursor.read_u8()?)?;
        let file_info_class = FileInfoClass::from(cursor.read_u8()?);
        let output_buffer_length = cursor.read_u32::<LittleEndian>()?;
        let _input_buffer_offset = cursor.read_u16::<LittleEndian>()?;
        let _reserved = cursor.read_u16::<LittleEndian>()?;
        let _input_buffer_length = cursor.read_u32::<LittleEndian>()?;
        let _additional_information = cursor.read_u32::<LittleEndian>()?;
        let _flags = cursor.read_u32::<LittleEndian>()?;
        let file_id = FileId::read_from(&mut cursor)?;

        Ok(Self {
            info_type,
            file_info_class,
            output_buffer_length,
            file_id,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::QUERY_INFO_REQUEST)?;
        buf.write_u8(self.info_type as u8)?;
        buf.write_u8(self.file_info_class.to_u8())?;
        buf.write_u32::<LittleEndian>(self.output_buffer_length)?;
        buf.write_u16::<LittleEndian>(0)?; // input buffer offset
        buf.write_u16::<LittleEndian>(0)?; // reserved
        buf.write_u32::<LittleEndian>(0)?; // input buffer length
        buf.write_u32::<LittleEndian>(0)?; // additional information
        buf.write_u32::<LittleEndian>(0)?; // flags
        self.file_id.write_to(&mut buf)?;
        Ok(buf)
    }
}

/// SMB2 QUERY_INFO Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2QueryInfoResponse {
    pub output_buffer: Vec<u8>,
}

impl SmbMessage for Smb2QueryInfoResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 8 {
            return Err(Error::ParseError("QueryInfo response too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::QUERY_INFO_RESPONSE {
            return Err(Error::ParseError(format!(
                "Invalid QueryInfo response structure size: {}",
                size
            )));
        }

        let output_buffer_offset = cursor.read_u16::<LittleEndian>()?;
        let output_buffer_length = cursor.read_u32::<LittleEndian>()?;

        let output_buffer = extract_body_buffer(
            buf,
            output_buffer_offset as usize,
            output_buffer_length as usize,
        )?
        .to_vec();

        Ok(Self { output_buffer })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::QUERY_INFO_RESPONSE)?;
        let offset = if self.output_buffer.is_empty() { 0u16 } else { 72 };
        buf.write_u16::<LittleEndian>(offset)?;
        buf.write_u32::<LittleEndian>(self.output_buffer.len() as u32)?;
        buf.write_all(&self.output_buffer)?;
        Ok(buf)
    }
}

/// SMB2 SET_INFO Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2SetInfoRequest {
    pub info_type: InfoType,
    pub file_info_class: FileInfoClass,
    pub file_id: FileId,
    pub buffer: Vec<u8>,
}

impl Smb2SetInfoRequest {
    pub fn new(
        file_id: FileId,
        info_type: InfoType,
        file_info_class: FileInfoClass,
        buffer: Vec<u8>,
    ) -> Self {
        Self {
            info_type,
            file_info_class,
            file_id,
            buffer,
        }
    }
}

impl SmbMessage for Smb2SetInfoRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 32 {
            return Err(Error::ParseError("SetInfo request too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::SET_INFO_REQUEST {
            return Err(Error::ParseError(format!(
                "Invalid SetInfo request structure size: {}",
                size
            )));
        }

        let info_type = InfoType::try_from(cursor.read_u8()?)?;
        let file_info_class = FileInfoClass::from(cursor.read_u8()?);
        let buffer_length = cursor.read_u32::<LittleEndian>()?;
        let buffer_offset = cursor.read_u16::<LittleEndian>()?;
        let _reserved = cursor.read_u16::<LittleEndian>()?;
        let _additional_information = cursor.read_u32::<LittleEndian>()?;
        let file_id = FileId::read_from(&mut cursor)?;

        let buffer =
            extract_body_buffer(buf, buffer_offset as usize, buffer_length as usize)?.to_vec();

        Ok(Self {
            info_type,
            file_info_class,
            file_id,
            buffer,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let buffer_offset = if self.buffer.is_empty() { 0u16 } else { 64 + 32 };

        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::SET_INFO_REQUEST)?;
        buf.write_u8(self.info_type as u8)?;
        buf.write_u8(self.file_info_class.to_u8())?;
        buf.write_u32::<LittleEndian>(self.buffer.len() as u32)?;
        buf.write_u16::<LittleEndian>(buffer_offset)?;
        buf.write_u16::<LittleEndian>(0)?; // reserved
        buf.write_u32::<LittleEndian>(0)?; // additional information
        self.file_id.write_to(&mut buf)?;
        buf.write_all(&self.buffer)?;
        Ok(buf)
    }
}

/// SMB2 SET_INFO Response (2 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Smb2SetInfoResponse;

impl SmbMessage for Smb2SetInfoResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 2 {
            return Err(Error::ParseError("SetInfo response too short".into()));
        }
        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::SET_INFO_RESPONSE {
            return Err(Error::ParseError(format!(
                "Invalid SetInfo response structure size: {}",
                size
            )));
        }
        Ok(Self)
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(2);
        buf.write_u16::<LittleEndian>(structure_size::SET_INFO_RESPONSE)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_info_request_roundtrip() {
        let req = Smb2QueryInfoRequest::new(
            FileId::generate(),
            InfoType::File,
            FileInfoClass::Standard,
        );
        let parsed = Smb2QueryInfoRequest::parse(&req.serialize().unwrap()).unwrap();
        assert_eq!(parsed.info_type, InfoType::File);
        assert_eq!(parsed.file_info_class, FileInfoClass::Standard);
        assert_eq!(parsed.file_id, req.file_id);
    }

    #[test]
    fn test_query_info_response_roundtrip() {
        let resp = Smb2QueryInfoResponse {
            output_buffer: vec![9, 8, 7],
        };
        let parsed = Smb2QueryInfoResponse::parse(&resp.serialize().unwrap()).unwrap();
        assert_eq!(parsed.output_buffer, vec![9, 8, 7]);
    }

    #[test]
    fn test_set_info_request_roundtrip() {
        let req = Smb2SetInfoRequest::new(
            FileId::generate(),
            InfoType::File,
            FileInfoClass::Disposition,
            vec![1],
        );
        let parsed = Smb2SetInfoRequest::parse(&req.serialize().unwrap()).unwrap();
        assert_eq!(parsed.file_info_class, FileInfoClass::Disposition);
        assert_eq!(parsed.buffer, vec![1]);
    }

    #[test]
    fn test_unknown_file_info_class_preserved() {
        assert_eq!(FileInfoClass::from(0x37), FileInfoClass::Other(0x37));
        assert_eq!(FileInfoClass::Other(0x37).to_u8(), 0x37);
    }
}
