//! SMB2 file operation messages (Create, Close, Flush, Read, Write)

use super::common::{
    decode_utf16le, encode_utf16le, extract_body_buffer, FileId, SmbMessage,
};
use crate::error::{Error, Result};
use crate::protocol::constants::{
    impersonation_level, oplock_level, structure_size, CreateDisposition, CreateOptions,
    DesiredAccess, FileAttributes, ShareAccess,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;
use std::io::{self, Write};

/// SMB2 Create (Open) Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2CreateRequest {
    pub requested_oplock_level: u8,
    pub impersonation_level: u32,
    pub desired_access: DesiredAccess,
    pub file_attributes: FileAttributes,
    pub share_access: ShareAccess,
    pub create_disposition: CreateDisposition,
    pub create_options: CreateOptions,
    /// Path relative to the tree connect, backslash-separated
    pub file_name: String,
}

impl Smb2CreateRequest {
    pub fn open_read(file_name: String) -> Self {
        Self {
            requested_oplock_level: oplock_level::NONE,
            impersonation_level: impersonation_level::IMPERSONATION,
            desired_access: DesiredAccess::FILE_GENERIC_READ,
            file_attributes: FileAttributes::empty(),
            share_access: ShareAccess::FILE_SHARE_READ,
            create_disposition: CreateDisposition::Open,
            create_options: CreateOptions::empty(),
            file_name,
        }
    }

    pub fn create_write(file_name: String) -> Self {
        Self {
            requested_oplock_level: oplock_level::NONE,
            impersonation_level: impersonation_level::IMPERSONATION,
            desired_access: DesiredAccess::FILE_GENERIC_READ | DesiredAccess::FILE_GENERIC_WRITE,
            file_attributes: FileAttributes::NORMAL,
            share_access: ShareAccess::FILE_SHARE_READ | ShareAccess::FILE_SHARE_WRITE,
            create_disposition: CreateDisposition::OverwriteIf,
            create_options: CreateOptions::empty(),
            file_name,
        }
    }
}

impl SmbMessage for Smb2CreateRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 56 {
            return Err(Error::ParseError("Create request too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::CREATE_REQUEST {
            return Err(Error::ParseError(format!(
                "Invalid Create request structure size: {}",
                size
            )));
        }

        let _security_flags = cursor.read_u8()?;
        let requested_oplock_level = cursor.read_u8()?;
        let impersonation_level = cursor.read_u32::<LittleEndian>()?;
        let _smb_create_flags = cursor.read_u64::<LittleEndian>()?;
        let _reserved = cursor.read_u64::<LittleEndian>()?;
        let desired_access = DesiredAccess::from_bits_truncate(cursor.read_u32::<LittleEndian>()?);
        let file_attributes =
            FileAttributes::from_bits_truncate(cursor.read_u32::<LittleEndian>()?);
        let share_access = ShareAccess::from_bits_truncate(cursor.read_u32::<LittleEndian>()?);
        let create_disposition = CreateDisposition::try_from(cursor.read_u32::<LittleEndian>()?)?;
        let create_options = CreateOptions::from_bits_truncate(cursor.read_u32::<LittleEndian>()?);
        let name_offset = cursor.read_u16::<LittleEndian>()?;
        let name_length = cursor.read_u16::<LittleEndian>()?;
        let _create_contexts_offset = cursor.read_u32::<LittleEndian>()?;
        let _create_contexts_length = cursor.read_u32::<LittleEndian>()?;

        let name_bytes = extract_body_buffer(buf, name_offset as usize, name_length as usize)?;
        let file_name = decode_utf16le(name_bytes);

        Ok(Self {
            requested_oplock_level,
            impersonation_level,
            desired_access,
            file_attributes,
            share_access,
            create_disposition,
            create_options,
            file_name,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let name_bytes = encode_utf16le(&self.file_name);
        let name_offset = if name_bytes.is_empty() { 0u16 } else { 64 + 56 };

        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::CREATE_REQUEST)?;
        buf.write_u8(0)?; // security flags
        buf.write_u8(self.requested_oplock_level)?;
        buf.write_u32::<LittleEndian>(self.impersonation_level)?;
        buf.write_u64::<LittleEndian>(0)?; // smb create flags
        buf.write_u64::<LittleEndian>(0)?; // reserved
        buf.write_u32::<LittleEndian>(self.desired_access.bits())?;
        buf.write_u32::<LittleEndian>(self.file_attributes.bits())?;
        buf.write_u32::<LittleEndian>(self.share_access.bits())?;
        buf.write_u32::<LittleEndian>(self.create_disposition.to_u32())?;
        buf.write_u32::<LittleEndian>(self.create_options.bits())?;
        buf.write_u16::<LittleEndian>(name_offset)?;
        buf.write_u16::<LittleEndian>(name_bytes.len() as u16)?;
        buf.write_u32::<LittleEndian>(0)?; // create contexts offset
        buf.write_u32::<LittleEndian>(0)?; // create contexts length
        buf.write_all(&name_bytes)?;

        Ok(buf)
    }
}

/// SMB2 Create (Open) Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2CreateResponse {
    pub oplock_level: u8,
    pub create_action: u32,
    pub creation_time: u64,
    pub last_access_time: u64,
    pub last_write_time: u64,
    pub change_time: u64,
    pub allocation_size: u64,
    pub end_of_file: u64,
    pub file_attributes: FileAttributes,
    pub file_id: FileId,
}

impl SmbMessage for Smb2CreateResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 88 {
            return Err(Error::ParseError("Create response too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::CREATE_RESPONSE {
            return Err(Error::ParseError(format!(
                "Invalid Create response structure size: {}",
                size
            )));
        }

        let oplock_level = cursor.read_u8()?;
        let _flags = cursor.read_u8()?;
        let create_action = cursor.read_u32::<LittleEndian>()?;
        let creation_time = cursor.read_u64::<LittleEndian>()?;
        let last_access_time = cursor.read_u64::<LittleEndian>()?;
        let last_write_time = cursor.read_u64::<LittleEndian>()?;
        let change_time = cursor.read_u64::<LittleEndian>()?;
        let allocation_size = cursor.read_u64::<LittleEndian>()?;
        let end_of_file = cursor.read_u64::<LittleEndian>()?;
        let file_attributes =
            FileAttributes::from_bits_truncate(cursor.read_u32::<LittleEndian>()?);
        let _reserved2 = cursor.read_u32::<LittleEndian>()?;
        let file_id = FileId::read_from(&mut cursor)?;

        Ok(Self {
            oplock_level,
            create_action,
            creation_time,
            last_access_time,
            last_write_time,
            change_time,
            allocation_size,
            end_of_file,
            file_attributes,
            file_id,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::CREATE_RESPONSE)?;
        buf.write_u8(self.oplock_level)?;
        buf.write_u8(0)?; // flags
        buf.write_u32::<LittleEndian>(self.create_action)?;
        buf.write_u64::<LittleEndian>(self.creation_time)?;
        buf.write_u64::<LittleEndian>(self.last_access_time)?;
        buf.write_u64::<LittleEndian>(self.last_write_time)?;
        buf.write_u64::<LittleEndian>(self.change_time)?;
        buf.write_u64::<LittleEndian>(self.allocation_size)?;
        buf.write_u64::<LittleEndian>(self.end_of_file)?;
        buf.write_u32::<LittleEndian>(self.file_attributes.bits())?;
        buf.write_u32::<LittleEndian>(0)?; // reserved2
        self.file_id.write_to(&mut buf)?;
        buf.write_u32::<LittleEndian>(0)?; // create contexts offset
        buf.write_u32::<LittleEndian>(0)?; // create contexts length
        Ok(buf)
    }
}

/// SMB2 Close Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2CloseRequest {
    pub flags: u16,
    pub file_id: FileId,
}

impl Smb2CloseRequest {
    pub fn new(file_id: FileId) -> Self {
        Self { flags: 0, file_id }
    }
}

impl SmbMessage for Smb2CloseRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 24 {
            return Err(Error::ParseError("Close request too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::CLOSE_REQUEST {
            return Err(Error::ParseError(format!(
                "Invalid Close request structure size: {}",
                size
            )));
        }

        let flags = cursor.read_u16::<LittleEndian>()?;
        let _reserved = cursor.read_u32::<LittleEndian>()?;
        let file_id = FileId::read_from(&mut cursor)?;

        Ok(Self { flags, file_id })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::CLOSE_REQUEST)?;
        buf.write_u16::<LittleEndian>(self.flags)?;
        buf.write_u32::<LittleEndian>(0)?; // reserved
        self.file_id.write_to(&mut buf)?;
        Ok(buf)
    }
}

/// SMB2 Close Response
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Smb2CloseResponse {
    pub flags: u16,
    pub creation_time: u64,
    pub last_access_time: u64,
    pub last_write_time: u64,
    pub change_time: u64,
    pub allocation_size: u64,
    pub end_of_file: u64,
    pub file_attributes: u32,
}

impl SmbMessage for Smb2CloseResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 60 {
            return Err(Error::ParseError("Close response too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::CLOSE_RESPONSE {
            return Err(Error::ParseError(format!(
                "Invalid Close response structure size: {}",
                size
            )));
        }

        let flags = cursor.read_u16::<LittleEndian>()?;
        let _reserved = cursor.read_u32::<LittleEndian>()?;
        let creation_time = cursor.read_u64::<LittleEndian>()?;
        let last_access_time = cursor.read_u64::<LittleEndian>()?;
        let last_write_time = cursor.read_u64::<LittleEndian>()?;
        let change_time = cursor.read_u64::<LittleEndian>()?;
        let allocation_size = cursor.read_u64::<LittleEndian>()?;
        let end_of_file = cursor.read_u64::<LittleEndian>()?;
        let file_attributes = cursor.read_u32::<LittleEndian>()?;

        Ok(Self {
            flags,
            creation_time,
            last_access_time,
            last_write_time,
            change_time,
            allocation_size,
            end_of_file,
            file_attributes,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::CLOSE_RESPONSE)?;
        buf.write_u16::<LittleEndian>(self.flags)?;
        buf.write_u32::<LittleEndian>(0)?; // reserved
        buf.write_u64::<LittleEndian>(self.creation_time)?;
        buf.write_u64::<LittleEndian>(self.last_access_time)?;
        buf.write_u64::<LittleEndian>(self.last_write_time)?;
        buf.write_u64::<LittleEndian>(self.change_time)?;
        buf.write_u64::<LittleEndian>(self.allocation_size)?;
        buf.write_u64::<LittleEndian>(self.end_of_file)?;
        buf.write_u32::<LittleEndian>(self.file_attributes)?;
        Ok(buf)
    }
}

/// SMB2 Flush Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2FlushRequest {
    pub file_id: FileId,
}

impl SmbMessage for Smb2FlushRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 24 {
            return Err(Error::ParseError("Flush request too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::FLUSH_REQUEST {
            return Err(Error::ParseError(format!(
                "Invalid Flush request structure size: {}",
                size
            )));
        }

        let _reserved1 = cursor.read_u16::<LittleEndian>()?;
        let _reserved2 = cursor.read_u32::<LittleEndian>()?;
        let file_id = FileId::read_from(&mut cursor)?;

        Ok(Self { file_id })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::FLUSH_REQUEST)?;
        buf.write_u16::<LittleEndian>(0)?;
        buf.write_u32::<LittleEndian>(0)?;
        self.file_id.write_to(&mut buf)?;
        Ok(buf)
    }
}

/// SMB2 Read Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2ReadRequest {
    pub length: u32,
    pub offset: u64,
    pub file_id: FileId,
    pub minimum_count: u32,
}

impl Smb2ReadRequest {
    pub fn new(file_id: FileId, offset: u64, length: u32) -> Self {
        Self {
            length,
            offset,
            file_id,
            minimum_count: 0,
        }
    }
}

impl SmbMessage for Smb2ReadRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 48 {
            return Err(Error::ParseError("Read request too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::READ_REQUEST {
            return Err(Error::ParseError(format!(
                "Invalid Read request structure size: {}",
                size
            )));
        }

        let _padding = cursor.read_u8()?;
        let _flags = cursor.read_u8()?;
        let length = cursor.read_u32::<LittleEndian>()?;
        let offset = cursor.read_u64::<LittleEndian>()?;
        let file_id = FileId::read_from(&mut cursor)?;
        let minimum_count = cursor.read_u32::<LittleEndian>()?;

        Ok(Self {
            length,
            offset,
            file_id,
            minimum_count,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::READ_REQUEST)?;
        buf.write_u8(0)?; // padding
        buf.write_u8(0)?; // flags
        buf.write_u32::<LittleEndian>(self.length)?;
        buf.write_u64::<LittleEndian>(self.offset)?;
        self.file_id.write_to(&mut buf)?;
        buf.write_u32::<LittleEndian>(self.minimum_count)?;
        buf.write_u32::<LittleEndian>(0)?; // channel
        buf.write_u32::<LittleEndian>(0)?; // remaining bytes
        buf.write_u16::<LittleEndian>(0)?; // read channel info offset
        buf.write_u16::<LittleEndian>(0)?; // read channel info length
        buf.write_u8(0)?; // one-byte buffer placeholder
        Ok(buf)
    }
}

/// SMB2 Read Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2ReadResponse {
    pub data: Vec<u8>,
}

impl Smb2ReadResponse {
    /// Data begins right after the header and the 16-byte fixed part.
    pub const DATA_OFFSET: u8 = 80;
}

impl SmbMessage for Smb2ReadResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 16 {
            return Err(Error::ParseError("Read response too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::READ_RESPONSE {
            return Err(Error::ParseError(format!(
                "Invalid Read response structure size: {}",
                size
            )));
        }

        let data_offset = cursor.read_u8()?;
        let _reserved = cursor.read_u8()?;
        let data_length = cursor.read_u32::<LittleEndian>()?;
        let _data_remaining = cursor.read_u32::<LittleEndian>()?;
        let _reserved2 = cursor.read_u32::<LittleEndian>()?;

        let data = extract_body_buffer(buf, data_offset as usize, data_length as usize)?.to_vec();

        Ok(Self { data })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::READ_RESPONSE)?;
        buf.write_u8(Self::DATA_OFFSET)?;
        buf.write_u8(0)?; // reserved
        buf.write_u32::<LittleEndian>(self.data.len() as u32)?;
        buf.write_u32::<LittleEndian>(0)?; // data remaining
        buf.write_u32::<LittleEndian>(0)?; // reserved2
        buf.write_all(&self.data)?;
        Ok(buf)
    }
}

/// SMB2 Write Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2WriteRequest {
    pub offset: u64,
    pub file_id: FileId,
    pub data: Vec<u8>,
}

impl Smb2WriteRequest {
    /// Data begins right after the header and the 48-byte fixed part.
    pub const DATA_OFFSET: u16 = 112;

    pub fn new(file_id: FileId, offset: u64, data: Vec<u8>) -> Self {
        Self {
            offset,
            file_id,
            data,
        }
    }
}

impl SmbMessage for Smb2WriteRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 48 {
            return Err(Error::ParseError("Write request too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::WRITE_REQUEST {
            return Err(Error::ParseError(format!(
                "Invalid Write request structure size: {}",
                size
            )));
        }

        let data_offset = cursor.read_u16::<LittleEndian>()?;
        let length = cursor.read_u32::<LittleEndian>()?;
        let offset = cursor.read_u64::<LittleEndian>()?;
        let file_id = FileId::read_from(&mut cursor)?;
        let _channel = cursor.read_u32::<LittleEndian>()?;
        let _remaining_bytes = cursor.read_u32::<LittleEndian>()?;
        let _write_channel_info_offset = cursor.read_u16::<LittleEndian>()?;
        let _write_channel_info_length = cursor.read_u16::<LittleEndian>()?;
        let _flags = cursor.read_u32::<LittleEndian>()?;

        let data = extract_body_buffer(buf, data_offset as usize, length as usize)?.to_vec();

        Ok(Self {
            offset,
            file_id,
            data,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::WRITE_REQUEST)?;
        buf.write_u16::<LittleEndian>(Self::DATA_OFFSET)?;
        buf.write_u32::<LittleEndian>(self.data.len() as u32)?;
        buf.write_u64::<LittleEndian>(self.offset)?;
        self.file_id.write_to(&mut buf)?;
        buf.write_u32::<LittleEndian>(0)?; // channel
        buf.write_u32::<LittleEndian>(0)?; // remaining bytes
        buf.write_u16::<LittleEndian>(0)?; // write channel info offset
        buf.write_u16::<LittleEndian>(0)?; // write channel info length
        buf.write_u32::<LittleEndian>(0)?; // flags
        buf.write_all(&self.data)?;
        Ok(buf)
    }
}

/// SMB2 Write Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2WriteResponse {
    pub count: u32,
}

impl SmbMessage for Smb2WriteResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 16 {
            return Err(Error::ParseError("Write response too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::WRITE_RESPONSE {
            return Err(Error::ParseError(format!(
                "Invalid Write response structure size: {}",
                size
            )));
        }

        let _reserved = cursor.read_u16::<LittleEndian>()?;
        let count = cursor.read_u32::<LittleEndian>()?;

        Ok(Self { count })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::WRITE_RESPONSE)?;
        buf.write_u16::<LittleEndian>(0)?; // reserved
        buf.write_u32::<LittleEndian>(self.count)?;
        buf.write_u32::<LittleEndian>(0)?; // remaining
        buf.write_u16::<LittleEndian>(0)?; // write channel info offset
        buf.write_u16::<LittleEndian>(0)?; // write channel info length
        Ok(buf)
    }
}
