//! Server configuration
//!
//! Everything the server needs is carried in one explicit structure
//! built at startup; there is no process-wide mutable configuration.

use crate::auth::{ChallengePolicy, FIXED_TEST_CHALLENGE};
use crate::error::{Error, Result};
use std::net::IpAddr;
use std::path::PathBuf;

/// A share definition before validation.
#[derive(Debug, Clone)]
pub struct ShareSpec {
    pub name: String,
    pub path: PathBuf,
    pub comment: String,
}

impl ShareSpec {
    /// Parse `NAME:PATH[:COMMENT]`.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.splitn(3, ':').collect();
        if parts.len() < 2 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(Error::Configuration(format!(
                "share must be NAME:PATH[:COMMENT], got {:?}",
                s
            )));
        }
        Ok(Self {
            name: parts[0].to_string(),
            path: PathBuf::from(parts[1]),
            comment: parts.get(2).unwrap_or(&"").to_string(),
        })
    }
}

/// A credential definition before hashing.
#[derive(Debug, Clone)]
pub struct CredentialSpec {
    pub username: String,
    pub password: String,
}

impl CredentialSpec {
    /// Parse `USER:PASSWORD`.
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((user, password)) if !user.is_empty() => Ok(Self {
                username: user.to_string(),
                password: password.to_string(),
            }),
            _ => Err(Error::Configuration(format!(
                "credential must be USER:PASSWORD, got {:?}",
                s
            ))),
        }
    }
}

/// Parse the challenge option: an empty string selects the documented
/// fixed test constant, otherwise exactly 16 hex digits.
pub fn parse_challenge(s: &str) -> Result<ChallengePolicy> {
    if s.is_empty() {
        return Ok(ChallengePolicy::Fixed(FIXED_TEST_CHALLENGE));
    }
    if s.len() != 16 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::Configuration(format!(
            "challenge must be 16 hex digits, got {:?}",
            s
        )));
    }

    let mut challenge = [0u8; 8];
    for (i, byte) in challenge.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
            .map_err(|e| Error::Configuration(format!("challenge hex: {}", e)))?;
    }
    Ok(ChallengePolicy::Fixed(challenge))
}

/// Complete server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind
    pub listen_address: IpAddr,
    /// Port to bind (445 unless testing unprivileged)
    pub port: u16,
    /// Name announced in NTLM challenges
    pub server_name: String,
    /// NTLM domain/workgroup for registered credentials
    pub workgroup: String,
    /// Exported shares
    pub shares: Vec<ShareSpec>,
    /// Registered users
    pub credentials: Vec<CredentialSpec>,
    /// Challenge policy; random unless explicitly pinned
    pub challenge: ChallengePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: IpAddr::from([0, 0, 0, 0]),
            port: 445,
            server_name: "FAKESMB".to_string(),
            workgroup: "WORKGROUP".to_string(),
            shares: Vec::new(),
            credentials: Vec::new(),
            challenge: ChallengePolicy::Random,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_spec_parse() {
        let spec = ShareSpec::parse("INTEGRATION:/srv/files:My-Share").unwrap();
        assert_eq!(spec.name, "INTEGRATION");
        assert_eq!(spec.path, PathBuf::from("/srv/files"));
        assert_eq!(spec.comment, "My-Share");

        let no_comment = ShareSpec::parse("DATA:/srv/data").unwrap();
        assert_eq!(no_comment.comment, "");

        assert!(ShareSpec::parse("JUSTNAME").is_err());
        assert!(ShareSpec::parse(":/srv/x").is_err());
    }

    #[test]
    fn test_credential_spec_parse() {
        let spec = CredentialSpec::parse("hello-world:h3110w0r1d").unwrap();
        assert_eq!(spec.username, "hello-world");
        assert_eq!(spec.password, "h3110w0r1d");

        // Password may contain colons.
        let colons = CredentialSpec::parse("user:pa:ss").unwrap();
        assert_eq!(colons.password, "pa:ss");

        assert!(CredentialSpec::parse("nopassword").is_err());
        assert!(CredentialSpec::parse(":pw").is_err());
    }

    #[test]
    fn test_challenge_parse() {
        assert_eq!(
            parse_challenge("").unwrap(),
            ChallengePolicy::Fixed(*b"AAAAAAAA")
        );
        assert_eq!(
            parse_challenge("4141414141414141").unwrap(),
            ChallengePolicy::Fixed(*b"AAAAAAAA")
        );
        assert_eq!(
            parse_challenge("0102030405060708").unwrap(),
            ChallengePolicy::Fixed([1, 2, 3, 4, 5, 6, 7, 8])
        );
        assert!(parse_challenge("zz").is_err());
        assert!(parse_challenge("41414141414141").is_err());
    }
}
