//! NTLM message encoding and decoding
//!
//! Wire structures for the three NTLMSSP messages exchanged during
//! session setup. The server parses Type 1 (Negotiate) and Type 3
//! (Authenticate) and produces Type 2 (Challenge).

use crate::error::{Error, Result};
use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;
use std::io::{self, Read, Write};

/// NTLM signature - "NTLMSSP\0"
pub const NTLMSSP_SIGNATURE: &[u8] = b"NTLMSSP\0";

/// NTLM message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum NtlmMessageType {
    /// Type 1: Negotiate message (client -> server)
    Negotiate = 0x00000001,
    /// Type 2: Challenge message (server -> client)
    Challenge = 0x00000002,
    /// Type 3: Authenticate message (client -> server)
    Authenticate = 0x00000003,
}

impl TryFrom<u32> for NtlmMessageType {
    type Error = Error;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        match value {
            0x00000001 => Ok(Self::Negotiate),
            0x00000002 => Ok(Self::Challenge),
            0x00000003 => Ok(Self::Authenticate),
            _ => Err(Error::ParseError(format!(
                "Invalid NTLM message type: {}",
                value
            ))),
        }
    }
}

bitflags! {
    /// NTLM negotiation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NtlmFlags: u32 {
        const NEGOTIATE_UNICODE = 0x00000001;
        const NEGOTIATE_OEM = 0x00000002;
        const REQUEST_TARGET = 0x00000004;
        const NEGOTIATE_SIGN = 0x00000010;
        const NEGOTIATE_SEAL = 0x00000020;
        const NEGOTIATE_DATAGRAM = 0x00000040;
        const NEGOTIATE_LAN_MANAGER_KEY = 0x00000080;
        const NEGOTIATE_NTLM = 0x00000200;
        const NEGOTIATE_ANONYMOUS = 0x00000800;
        const NEGOTIATE_DOMAIN_SUPPLIED = 0x00001000;
        const NEGOTIATE_WORKSTATION_SUPPLIED = 0x00002000;
        const NEGOTIATE_ALWAYS_SIGN = 0x00008000;
        const TARGET_TYPE_DOMAIN = 0x00010000;
        const TARGET_TYPE_SERVER = 0x00020000;
        const NEGOTIATE_EXTENDED_SECURITY = 0x00080000;
        const NEGOTIATE_IDENTIFY = 0x00100000;
        const REQUEST_NON_NT_SESSION_KEY = 0x00400000;
        const NEGOTIATE_TARGET_INFO = 0x00800000;
        const NEGOTIATE_VERSION = 0x02000000;
        const NEGOTIATE_128 = 0x20000000;
        const NEGOTIATE_KEY_EXCHANGE = 0x40000000;
        const NEGOTIATE_56 = 0x80000000;
    }
}

/// Target info attribute-value pair ids
mod av_id {
    pub const EOL: u16 = 0x0000;
    pub const NB_COMPUTER_NAME: u16 = 0x0001;
    pub const NB_DOMAIN_NAME: u16 = 0x0002;
}

/// Security buffer descriptor: {length, max length, offset} pointing
/// into the variable-data tail of an NTLM message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityBuffer {
    pub length: u16,
    pub max_length: u16,
    pub offset: u32,
}

impl SecurityBuffer {
    pub fn empty() -> Self {
        Self {
            length: 0,
            max_length: 0,
            offset: 0,
        }
    }

    pub fn with_data(data_len: usize, offset: u32) -> Self {
        Self {
            length: data_len as u16,
            max_length: data_len as u16,
            offset,
        }
    }

    pub fn parse(cursor: &mut io::Cursor<&[u8]>) -> Result<Self> {
        let length = cursor.read_u16::<LittleEndian>()?;
        let max_length = cursor.read_u16::<LittleEndian>()?;
        let offset = cursor.read_u32::<LittleEndian>()?;

        Ok(Self {
            length,
            max_length,
            offset,
        })
    }

    pub fn serialize(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_u16::<LittleEndian>(self.length)?;
        buf.write_u16::<LittleEndian>(self.max_length)?;
        buf.write_u32::<LittleEndian>(self.offset)?;
        Ok(())
    }

    pub fn extract_data<'a>(&self, message: &'a [u8]) -> Result<&'a [u8]> {
        let start = self.offset as usize;
        let end = start + self.length as usize;

        if end > message.len() {
            return Err(Error::ParseError(
                "Security buffer extends beyond message".into(),
            ));
        }

        Ok(&message[start..end])
    }
}

fn encode_utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|c| c.to_le_bytes()).collect()
}

fn decode_buffer_string(buffer: &SecurityBuffer, message: &[u8], unicode: bool) -> Result<String> {
    if buffer.length == 0 {
        return Ok(String::new());
    }
    let bytes = buffer.extract_data(message)?;
    if unicode {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        Ok(String::from_utf16_lossy(&units))
    } else {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// NTLM Type 1 Message - Negotiate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtlmNegotiateMessage {
    pub flags: NtlmFlags,
    pub domain_name: String,
    pub workstation_name: String,
}

impl NtlmNegotiateMessage {
    pub fn new(domain: String, workstation: String) -> Self {
        Self {
            flags: NtlmFlags::NEGOTIATE_UNICODE
                | NtlmFlags::NEGOTIATE_NTLM
                | NtlmFlags::REQUEST_TARGET
                | NtlmFlags::NEGOTIATE_EXTENDED_SECURITY
                | NtlmFlags::NEGOTIATE_ALWAYS_SIGN,
            domain_name: domain,
            workstation_name: workstation,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 32 {
            return Err(Error::ParseError("NTLM negotiate message too short".into()));
        }

        let mut cursor = io::Cursor::new(data);

        let mut signature = [0u8; 8];
        cursor.read_exact(&mut signature)?;
        if signature != *NTLMSSP_SIGNATURE {
            return Err(Error::ParseError("Invalid NTLM signature".into()));
        }

        let message_type = NtlmMessageType::try_from(cursor.read_u32::<LittleEndian>()?)?;
        if message_type != NtlmMessageType::Negotiate {
            return Err(Error::ParseError("Not a negotiate message".into()));
        }

        let flags = NtlmFlags::from_bits_truncate(cursor.read_u32::<LittleEndian>()?);

        let domain = SecurityBuffer::parse(&mut cursor)?;
        let workstation = SecurityBuffer::parse(&mut cursor)?;

        // Supplied names in the Type 1 message are OEM-encoded.
        let domain_name = decode_buffer_string(&domain, data, false)?;
        let workstation_name = decode_buffer_string(&workstation, data, false)?;

        Ok(Self {
            flags,
            domain_name,
            workstation_name,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();

        buf.write_all(NTLMSSP_SIGNATURE)?;
        buf.write_u32::<LittleEndian>(NtlmMessageType::Negotiate as u32)?;
        buf.write_u32::<LittleEndian>(self.flags.bits())?;

        let mut offset = 32u32;
        let domain_bytes = self.domain_name.as_bytes();
        let workstation_bytes = self.workstation_name.as_bytes();

        let domain_buffer = if domain_bytes.is_empty() {
            SecurityBuffer::empty()
        } else {
            let b = SecurityBuffer::with_data(domain_bytes.len(), offset);
            offset += domain_bytes.len() as u32;
            b
        };
        domain_buffer.serialize(&mut buf)?;

        let workstation_buffer = if workstation_bytes.is_empty() {
            SecurityBuffer::empty()
        } else {
            SecurityBuffer::with_data(workstation_bytes.len(), offset)
        };
        workstation_buffer.serialize(&mut buf)?;

        buf.write_all(domain_bytes)?;
        buf.write_all(workstation_bytes)?;

        Ok(buf)
    }
}

/// NTLM Type 2 Message - Challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtlmChallengeMessage {
    pub flags: NtlmFlags,
    pub challenge: [u8; 8],
    pub target_name: String,
    pub target_info: Vec<u8>,
}

impl NtlmChallengeMessage {
    /// Build a challenge message for a server identified by
    /// `target_name`, with a minimal target-info block (domain and
    /// computer name AV pairs).
    pub fn new(target_name: String, challenge: [u8; 8]) -> Self {
        let target_info = Self::build_target_info(&target_name, &target_name);
        Self {
            flags: NtlmFlags::NEGOTIATE_UNICODE
                | NtlmFlags::NEGOTIATE_NTLM
                | NtlmFlags::REQUEST_TARGET
                | NtlmFlags::TARGET_TYPE_SERVER
                | NtlmFlags::NEGOTIATE_TARGET_INFO
                | NtlmFlags::NEGOTIATE_EXTENDED_SECURITY,
            challenge,
            target_name,
            target_info,
        }
    }

    fn build_target_info(domain: &str, computer: &str) -> Vec<u8> {
        let mut info = Vec::new();
        for (id, value) in [(av_id::NB_DOMAIN_NAME, domain), (av_id::NB_COMPUTER_NAME, computer)] {
            let bytes = encode_utf16le(value);
            info.extend_from_slice(&id.to_le_bytes());
            info.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
            info.extend_from_slice(&bytes);
        }
        info.extend_from_slice(&av_id::EOL.to_le_bytes());
        info.extend_from_slice(&0u16.to_le_bytes());
        info
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 48 {
            return Err(Error::ParseError("NTLM challenge message too short".into()));
        }

        let mut cursor = io::Cursor::new(data);

        let mut signature = [0u8; 8];
        cursor.read_exact(&mut signature)?;
        if signature != *NTLMSSP_SIGNATURE {
            return Err(Error::ParseError("Invalid NTLM signature".into()));
        }

        let message_type = NtlmMessageType::try_from(cursor.read_u32::<LittleEndian>()?)?;
        if message_type != NtlmMessageType::Challenge {
            return Err(Error::ParseError("Not a challenge message".into()));
        }

        let target_name_buffer = SecurityBuffer::parse(&mut cursor)?;
        let flags = NtlmFlags::from_bits_truncate(cursor.read_u32::<LittleEndian>()?);

        let mut challenge = [0u8; 8];
        cursor.read_exact(&mut challenge)?;

        // Reserved context field
        let _context = cursor.read_u64::<LittleEndian>()?;

        let target_info_buffer = SecurityBuffer::parse(&mut cursor)?;

        let unicode = flags.contains(NtlmFlags::NEGOTIATE_UNICODE);
        let target_name = decode_buffer_string(&target_name_buffer, data, unicode)?;
        let target_info = if target_info_buffer.length > 0 {
            target_info_buffer.extract_data(data)?.to_vec()
        } else {
            Vec::new()
        };

        Ok(Self {
            flags,
            challenge,
            target_name,
            target_info,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();

        buf.write_all(NTLMSSP_SIGNATURE)?;
        buf.write_u32::<LittleEndian>(NtlmMessageType::Challenge as u32)?;

        let target_name_bytes = encode_utf16le(&self.target_name);
        let mut offset = 48u32;

        let target_name_buffer = if target_name_bytes.is_empty() {
            SecurityBuffer::empty()
        } else {
            let b = SecurityBuffer::with_data(target_name_bytes.len(), offset);
            offset += target_name_bytes.len() as u32;
            b
        };
        target_name_buffer.serialize(&mut buf)?;

        buf.write_u32::<LittleEndian>(self.flags.bits())?;
        buf.write_all(&self.challenge)?;
        buf.write_u64::<LittleEndian>(0)?; // context

        let target_info_buffer = if self.target_info.is_empty() {
            SecurityBuffer::empty()
        } else {
            SecurityBuffer::with_data(self.target_info.len(), offset)
        };
        target_info_buffer.serialize(&mut buf)?;

        buf.write_all(&target_name_bytes)?;
        buf.write_all(&self.target_info)?;

        Ok(buf)
    }
}

/// NTLM Type 3 Message - Authenticate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtlmAuthenticateMessage {
    pub flags: NtlmFlags,
    pub lm_response: Vec<u8>,
    pub nt_response: Vec<u8>,
    pub domain: String,
    pub username: String,
    pub workstation: String,
    pub session_key: Vec<u8>,
}

impl NtlmAuthenticateMessage {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 64 {
            return Err(Error::ParseError(
                "NTLM authenticate message too short".into(),
            ));
        }

        let mut cursor = io::Cursor::new(data);

        let mut signature = [0u8; 8];
        cursor.read_exact(&mut signature)?;
        if signature != *NTLMSSP_SIGNATURE {
            return Err(Error::ParseError("Invalid NTLM signature".into()));
        }

        let message_type = NtlmMessageType::try_from(cursor.read_u32::<LittleEndian>()?)?;
        if message_type != NtlmMessageType::Authenticate {
            return Err(Error::ParseError("Not an authenticate message".into()));
        }

        let lm_buffer = SecurityBuffer::parse(&mut cursor)?;
        let nt_buffer = SecurityBuffer::parse(&mut cursor)?;
        let domain_buffer = SecurityBuffer::parse(&mut cursor)?;
        let user_buffer = SecurityBuffer::parse(&mut cursor)?;
        let workstation_buffer = SecurityBuffer::parse(&mut cursor)?;
        let session_key_buffer = SecurityBuffer::parse(&mut cursor)?;

        let flags = NtlmFlags::from_bits_truncate(cursor.read_u32::<LittleEndian>()?);
        let unicode = flags.contains(NtlmFlags::NEGOTIATE_UNICODE);

        let lm_response = if lm_buffer.length > 0 {
            lm_buffer.extract_data(data)?.to_vec()
        } else {
            Vec::new()
        };
        let nt_response = if nt_buffer.length > 0 {
            nt_buffer.extract_data(data)?.to_vec()
        } else {
            Vec::new()
        };
        let session_key = if session_key_buffer.length > 0 {
            session_key_buffer.extract_data(data)?.to_vec()
        } else {
            Vec::new()
        };

        Ok(Self {
            flags,
            lm_response,
            nt_response,
            domain: decode_buffer_string(&domain_buffer, data, unicode)?,
            username: decode_buffer_string(&user_buffer, data, unicode)?,
            workstation: decode_buffer_string(&workstation_buffer, data, unicode)?,
            session_key,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let unicode = self.flags.contains(NtlmFlags::NEGOTIATE_UNICODE);
        let encode = |s: &str| -> Vec<u8> {
            if unicode {
                encode_utf16le(s)
            } else {
                s.as_bytes().to_vec()
            }
        };

        let domain_bytes = encode(&self.domain);
        let user_bytes = encode(&self.username);
        let workstation_bytes = encode(&self.workstation);

        let mut buf = Vec::new();
        buf.write_all(NTLMSSP_SIGNATURE)?;
        buf.write_u32::<LittleEndian>(NtlmMessageType::Authenticate as u32)?;

        let mut offset = 64u32;
        let mut write_buffer = |buf: &mut Vec<u8>, data: &[u8]| -> Result<()> {
            let b = if data.is_empty() {
                SecurityBuffer::empty()
            } else {
                let b = SecurityBuffer::with_data(data.len(), offset);
                offset += data.len() as u32;
                b
            };
            b.serialize(buf)
        };

        write_buffer(&mut buf, &self.lm_response)?;
        write_buffer(&mut buf, &self.nt_response)?;
        write_buffer(&mut buf, &domain_bytes)?;
        write_buffer(&mut buf, &user_bytes)?;
        write_buffer(&mut buf, &workstation_bytes)?;
        write_buffer(&mut buf, &self.session_key)?;

        buf.write_u32::<LittleEndian>(self.flags.bits())?;

        buf.write_all(&self.lm_response)?;
        buf.write_all(&self.nt_response)?;
        buf.write_all(&domain_bytes)?;
        buf.write_all(&user_bytes)?;
        buf.write_all(&workstation_bytes)?;
        buf.write_all(&self.session_key)?;

        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_buffer_roundtrip() {
        let buffer = SecurityBuffer::with_data(10, 100);
        let mut buf = Vec::new();
        buffer.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), 8);

        let mut cursor = io::Cursor::new(&buf[..]);
        let parsed = SecurityBuffer::parse(&mut cursor).unwrap();
        assert_eq!(parsed, buffer);
    }

    #[test]
    fn test_negotiate_roundtrip() {
        let msg = NtlmNegotiateMessage::new("WORKGROUP".into(), "CLIENT".into());
        let serialized = msg.serialize().unwrap();
        assert_eq!(&serialized[0..8], NTLMSSP_SIGNATURE);

        let parsed = NtlmNegotiateMessage::parse(&serialized).unwrap();
        assert_eq!(parsed.domain_name, "WORKGROUP");
        assert_eq!(parsed.workstation_name, "CLIENT");
    }

    #[test]
    fn test_challenge_roundtrip() {
        let challenge = [0x41; 8];
        let msg = NtlmChallengeMessage::new("FAKESMB".into(), challenge);

        let serialized = msg.serialize().unwrap();
        let parsed = NtlmChallengeMessage::parse(&serialized).unwrap();
        assert_eq!(parsed.challenge, challenge);
        assert_eq!(parsed.target_name, "FAKESMB");
        assert!(!parsed.target_info.is_empty());
        // Target info terminates with an EOL pair.
        let len = parsed.target_info.len();
        assert_eq!(&parsed.target_info[len - 4..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_authenticate_roundtrip() {
        let msg = NtlmAuthenticateMessage {
            flags: NtlmFlags::NEGOTIATE_UNICODE | NtlmFlags::NEGOTIATE_NTLM,
            lm_response: vec![0u8; 24],
            nt_response: vec![0xab; 24],
            domain: "WORKGROUP".into(),
            username: "hello-world".into(),
            workstation: "CLIENT".into(),
            session_key: Vec::new(),
        };

        let serialized = msg.serialize().unwrap();
        let parsed = NtlmAuthenticateMessage::parse(&serialized).unwrap();
        assert_eq!(parsed.username, "hello-world");
        assert_eq!(parsed.domain, "WORKGROUP");
        assert_eq!(parsed.nt_response, vec![0xab; 24]);
    }

    #[test]
    fn test_bad_signature_rejected() {
        let mut data = NtlmNegotiateMessage::new(String::new(), String::new())
            .serialize()
            .unwrap();
        data[0] = b'X';
        assert!(NtlmNegotiateMessage::parse(&data).is_err());
    }
}
