//! SMB2 Query Directory messages and directory listing encoding

use super::common::{
    decode_utf16le, encode_utf16le, extract_body_buffer, FileId, SmbMessage,
};
use crate::error::{Error, Result};
use crate::protocol::constants::{structure_size, unix_to_filetime, FileAttributes};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Write};

/// SMB2 QUERY_DIRECTORY Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2QueryDirectoryRequest {
    pub file_information_class: u8,
    pub flags: u8,
    pub file_index: u32,
    pub file_id: FileId,
    /// Search pattern; `*` when empty
    pub file_name: String,
    pub output_buffer_length: u32,
}

impl Smb2QueryDirectoryRequest {
    /// FileIdBothDirectoryInformation, the class smbclient asks for.
    pub const FILE_ID_BOTH_DIRECTORY_INFORMATION: u8 = 0x25;

    pub fn new(file_id: FileId, pattern: String) -> Self {
        Self {
            file_information_class: Self::FILE_ID_BOTH_DIRECTORY_INFORMATION,
            flags: 0,
            file_index: 0,
            file_id,
            file_name: pattern,
            output_buffer_length: 65536,
        }
    }
}

impl SmbMessage for Smb2QueryDirectoryRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 32 {
            return Err(Error::ParseError("QueryDirectory request too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::QUERY_DIRECTORY_REQUEST {
            return Err(Error::ParseError(format!(
                "Invalid QueryDirectory request structure size: {}",
                size
            )));
        }

        let file_information_class = cursor.read_u8()?;
        let flags = cursor.read_u8()?;
        let file_index = cursor.read_u32::<LittleEndian>()?;
        let file_id = FileId::read_from(&mut cursor)?;
        let file_name_offset = cursor.read_u16::<LittleEndian>()?;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let output_buffer_length = cursor.read_u32::<LittleEndian>()?;

        let file_name = decode_utf16le(extract_body_buffer(
            buf,
            file_name_offset as usize,
            file_name_length as usize,
        )?);

        Ok(Self {
            file_information_class,
            flags,
            file_index,
            file_id,
            file_name,
            output_buffer_length,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let name_bytes = encode_utf16le(&self.file_name);
        let name_offset = if name_bytes.is_empty() { 0u16 } else { 64 + 32 };

        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(structure_size::QUERY_DIRECTORY_REQUEST)?;
        buf.write_u8(self.file_information_class)?;
        buf.write_u8(self.flags)?;
        buf.write_u32::<LittleEndian>(self.file_index)?;
        self.file_id.write_to(&mut buf)?;
        buf.write_u16::<LittleEndian>(name_offset)?;
        buf.write_u16::<LittleEndian>(name_bytes.len() as u16)?;
        buf.write_u32::<LittleEndian>(self.output_buffer_length)?;
        buf.write_all(&name_bytes)?;

        Ok(buf)
    }
}

/// SMB2 QUERY_DIRECTORY Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2QueryDirectoryResponse {
    pub output_buffer: Vec<u8>,
}

impl SmbMessage for Smb2QueryDirectoryResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 8 {
            return Err(Error::ParseError("QueryDirectory response too short".into()));
        }

        let mut cursor = io::Cursor::new(buf);
        let size = cursor.read_u16::<LittleEndian>()?;
        if size != structure_size::QUERY_DIRECTORY_RESPONSE {
            return Err(Error::ParseError(format!(
                "Invalid QueryDirectory response structure size: {}",
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
        buf.write_u16::<LittleEndian>(structure_size::QUERY_DIRECTORY_RESPONSE)?;
        // Offset counts from the SMB2 header: 64 + 8 fixed bytes.
        let offset = if self.output_buffer.is_empty() { 0u16 } else { 72 };
        buf.write_u16::<LittleEndian>(offset)?;
        buf.write_u32::<LittleEndian>(self.output_buffer.len() as u32)?;
        buf.write_all(&self.output_buffer)?;
        Ok(buf)
    }
}

/// One FileIdBothDirectoryInformation entry (MS-FSCC 2.4.17)
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub file_name: String,
    pub is_directory: bool,
    pub size: u64,
    pub created: u64,
    pub modified: u64,
}

impl DirectoryEntry {
    pub fn new(file_name: String, is_directory: bool, size: u64, created: u64, modified: u64) -> Self {
        Self {
            file_name,
            is_directory,
            size,
            created,
            modified,
        }
    }

    /// Build an entry from host metadata (Unix timestamps).
    pub fn from_metadata(file_name: String, metadata: &std::fs::Metadata) -> Self {
        let to_secs = |time: std::io::Result<std::time::SystemTime>| {
            time.ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0)
        };

        Self {
            file_name,
            is_directory: metadata.is_dir(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            created: to_secs(metadata.created()),
            modified: to_secs(metadata.modified()),
        }
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let attributes = if self.is_directory {
            FileAttributes::DIRECTORY
        } else {
            FileAttributes::NORMAL
        };
        let created = unix_to_filetime(self.created);
        let modified = unix_to_filetime(self.modified);

        let name_bytes = encode_utf16le(&self.file_name);

        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(0)?; // NextEntryOffset, patched by the builder
        buf.write_u32::<LittleEndian>(0)?; // FileIndex
        buf.write_u64::<LittleEndian>(created)?;
        buf.write_u64::<LittleEndian>(modified)?; // last access
        buf.write_u64::<LittleEndian>(modified)?; // last write
        buf.write_u64::<LittleEndian>(modified)?; // change
        buf.write_u64::<LittleEndian>(self.size)?; // end of file
        buf.write_u64::<LittleEndian>((self.size + 4095) & !4095)?; // allocation
        buf.write_u32::<LittleEndian>(attributes.bits())?;
        buf.write_u32::<LittleEndian>(name_bytes.len() as u32)?;
        buf.write_u32::<LittleEndian>(0)?; // EaSize
        buf.write_u8(0)?; // ShortNameLength
        buf.write_u8(0)?; // Reserved1
        buf.write_all(&[0u8; 24])?; // ShortName
        buf.write_u16::<LittleEndian>(0)?; // Reserved2
        // FileId derived from the name so repeated listings agree.
        buf.write_u64::<LittleEndian>(name_hash(&self.file_name))?;
        buf.write_all(&name_bytes)?;

        Ok(buf)
    }
}

fn name_hash(name: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}

/// Concatenate entries with 8-byte-aligned NextEntryOffset chaining.
pub fn build_directory_listing(entries: &[DirectoryEntry]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();

    for (i, entry) in entries.iter().enumerate() {
        let mut entry_buf = entry.serialize()?;

        if i < entries.len() - 1 {
            let aligned = (entry_buf.len() + 7) & !7;
            entry_buf[0..4].copy_from_slice(&(aligned as u32).to_le_bytes());
            entry_buf.resize(aligned, 0);
        }

        buffer.extend_from_slice(&entry_buf);
    }

    Ok(buffer)
}
