//! NTLM cryptographic functions
//!
//! Hashing and response computation for NTLMv1, NTLM2 session security,
//! and NTLMv2. The server only ever stores LM/NT hashes; plaintext
//! passwords are hashed once at configuration time.

use crate::error::{Error, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use des::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use des::Des;
use hmac::{Hmac, Mac};
use md4::{Digest, Md4};
use md5::Md5;

type HmacMd5 = Hmac<Md5>;

/// Compute the NT hash of a password (MD4 over UTF-16LE).
pub fn nt_hash(password: &str) -> Result<[u8; 16]> {
    let mut pwd_utf16 = Vec::new();
    for ch in password.encode_utf16() {
        pwd_utf16.write_u16::<LittleEndian>(ch)?;
    }

    let mut hasher = Md4::new();
    hasher.update(&pwd_utf16);
    let result = hasher.finalize();
    let mut hash = [0u8; 16];
    hash.copy_from_slice(&result);
    Ok(hash)
}

/// Compute the LM hash of a password.
///
/// The uppercased password, truncated or zero-padded to 14 bytes, keys
/// two DES encryptions of the constant block `KGS!@#$%`.
pub fn lm_hash(password: &str) -> Result<[u8; 16]> {
    let mut password_bytes = password.to_uppercase().into_bytes();
    password_bytes.truncate(14);
    password_bytes.resize(14, 0);

    let plaintext = GenericArray::from(*b"KGS!@#$%");
    let mut hash = [0u8; 16];

    for half in 0..2 {
        let key7: [u8; 7] = password_bytes[half * 7..half * 7 + 7]
            .try_into()
            .map_err(|_| Error::InvalidParameter("LM key split".into()))?;
        let des = Des::new(&GenericArray::from(expand_des_key(&key7)));
        let mut block = plaintext;
        des.encrypt_block(&mut block);
        hash[half * 8..half * 8 + 8].copy_from_slice(&block);
    }

    Ok(hash)
}

/// Expand a 56-bit DES key half into the 64-bit form the cipher takes.
///
/// Each output byte carries 7 key bits; the low bit is the (ignored)
/// parity position.
fn expand_des_key(key7: &[u8; 7]) -> [u8; 8] {
    [
        key7[0],
        (key7[0] << 7) | (key7[1] >> 1),
        (key7[1] << 6) | (key7[2] >> 2),
        (key7[2] << 5) | (key7[3] >> 3),
        (key7[3] << 4) | (key7[4] >> 4),
        (key7[4] << 3) | (key7[5] >> 5),
        (key7[5] << 2) | (key7[6] >> 6),
        key7[6] << 1,
    ]
}

/// NTLMv1-style DES response: the 16-byte hash is padded to 21 bytes,
/// split into three DES keys, and each encrypts the 8-byte challenge.
pub fn des_long(hash: &[u8; 16], data: &[u8; 8]) -> Result<[u8; 24]> {
    let mut key = [0u8; 21];
    key[..16].copy_from_slice(hash);

    let mut response = [0u8; 24];
    for i in 0..3 {
        let key7: [u8; 7] = key[i * 7..i * 7 + 7]
            .try_into()
            .map_err(|_| Error::InvalidParameter("DES key split".into()))?;
        let des = Des::new(&GenericArray::from(expand_des_key(&key7)));
        let mut block = GenericArray::from(*data);
        des.encrypt_block(&mut block);
        response[i * 8..i * 8 + 8].copy_from_slice(&block);
    }

    Ok(response)
}

/// Expected NTLMv1 response for a hash and server challenge.
pub fn ntlmv1_response(hash: &[u8; 16], server_challenge: &[u8; 8]) -> Result<[u8; 24]> {
    des_long(hash, server_challenge)
}

/// Expected NTLM2 session response (extended session security).
///
/// The DES input is the first 8 bytes of MD5(server challenge ||
/// client challenge); the client challenge arrives in the LM response
/// field of the Type 3 message.
pub fn ntlm2_session_response(
    nt_hash: &[u8; 16],
    server_challenge: &[u8; 8],
    client_challenge: &[u8; 8],
) -> Result<[u8; 24]> {
    let mut hasher = Md5::new();
    hasher.update(server_challenge);
    hasher.update(client_challenge);
    let digest = hasher.finalize();

    let mut session_challenge = [0u8; 8];
    session_challenge.copy_from_slice(&digest[..8]);
    des_long(nt_hash, &session_challenge)
}

/// NTLMv2 hash: HMAC-MD5 keyed with the NT hash over the uppercased
/// username concatenated with the domain, both UTF-16LE.
pub fn ntlmv2_hash(nt_hash: &[u8; 16], username: &str, domain: &str) -> Result<[u8; 16]> {
    let user_domain = format!("{}{}", username.to_uppercase(), domain);
    let mut ud_utf16 = Vec::new();
    for ch in user_domain.encode_utf16() {
        ud_utf16.write_u16::<LittleEndian>(ch)?;
    }

    let mut mac = <HmacMd5 as Mac>::new_from_slice(nt_hash)
        .map_err(|e| Error::InvalidParameter(format!("HMAC key: {}", e)))?;
    mac.update(&ud_utf16);

    let mut hash = [0u8; 16];
    hash.copy_from_slice(&mac.finalize().into_bytes());
    Ok(hash)
}

/// Verify an NTLMv2 proof in constant time.
///
/// The Type 3 NT response is `proof[16] || blob`; the expected proof is
/// HMAC-MD5(v2 hash, server challenge || blob). `Mac::verify_slice`
/// performs the constant-time comparison.
pub fn verify_ntlmv2_proof(
    ntlmv2_hash: &[u8; 16],
    server_challenge: &[u8; 8],
    nt_response: &[u8],
) -> Result<bool> {
    if nt_response.len() <= 16 {
        return Ok(false);
    }
    let (proof, blob) = nt_response.split_at(16);

    let mut mac = <HmacMd5 as Mac>::new_from_slice(ntlmv2_hash)
        .map_err(|e| Error::InvalidParameter(format!("HMAC key: {}", e)))?;
    mac.update(server_challenge);
    mac.update(blob);

    Ok(mac.verify_slice(proof).is_ok())
}

/// Constant-time byte comparison for the DES-based response paths.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference values from the protocol documentation: user "User",
    // domain "Domain", password "Password", challenge 0102030405060708.
    const CHALLENGE: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn test_nt_hash_reference() {
        let hash = nt_hash("Password").unwrap();
        assert_eq!(
            hash,
            [
                0xa4, 0xf4, 0x9c, 0x40, 0x65, 0x10, 0xbd, 0xca, 0xb6, 0x82, 0x4e, 0xe7, 0xc3,
                0x0f, 0xd8, 0x52
            ]
        );
    }

    #[test]
    fn test_lm_hash_reference() {
        let hash = lm_hash("Password").unwrap();
        assert_eq!(
            hash,
            [
                0xe5, 0x2c, 0xac, 0x67, 0x41, 0x9a, 0x9a, 0x22, 0x4a, 0x3b, 0x10, 0x8f, 0x3f,
                0xa6, 0xcb, 0x6d
            ]
        );
    }

    #[test]
    fn test_ntlmv1_response_reference() {
        let hash = nt_hash("Password").unwrap();
        let response = ntlmv1_response(&hash, &CHALLENGE).unwrap();
        assert_eq!(
            response,
            [
                0x67, 0xc4, 0x30, 0x11, 0xf3, 0x02, 0x98, 0xa2, 0xad, 0x35, 0xec, 0xe6, 0x4f,
                0x16, 0x33, 0x1c, 0x44, 0xbd, 0xbe, 0xd9, 0x27, 0x84, 0x1f, 0x94
            ]
        );
    }

    #[test]
    fn test_ntlmv2_hash_reference() {
        let hash = nt_hash("Password").unwrap();
        let v2 = ntlmv2_hash(&hash, "User", "Domain").unwrap();
        assert_eq!(
            v2,
            [
                0x0c, 0x86, 0x8a, 0x40, 0x3b, 0xfd, 0x7a, 0x93, 0xa3, 0x00, 0x1e, 0xf2, 0x2e,
                0xf0, 0x2e, 0x3f
            ]
        );
    }

    #[test]
    fn test_ntlmv2_proof_roundtrip() {
        let hash = nt_hash("h3110w0r1d").unwrap();
        let v2 = ntlmv2_hash(&hash, "hello-world", "WORKGROUP").unwrap();

        // Build a proof the way a client would, then verify it.
        let blob = vec![0x01, 0x01, 0x00, 0x00, 0xaa, 0xbb, 0xcc, 0xdd];
        let mut mac = <HmacMd5 as Mac>::new_from_slice(&v2).unwrap();
        mac.update(&CHALLENGE);
        mac.update(&blob);
        let proof = mac.finalize().into_bytes();

        let mut nt_response = proof.to_vec();
        nt_response.extend_from_slice(&blob);

        assert!(verify_ntlmv2_proof(&v2, &CHALLENGE, &nt_response).unwrap());

        // Flipping a proof bit must fail.
        let mut tampered = nt_response.clone();
        tampered[0] ^= 0x01;
        assert!(!verify_ntlmv2_proof(&v2, &CHALLENGE, &tampered).unwrap());
    }

    #[test]
    fn test_ntlm2_session_response_differs_from_v1() {
        let hash = nt_hash("Password").unwrap();
        let plain = ntlmv1_response(&hash, &CHALLENGE).unwrap();
        let session = ntlm2_session_response(&hash, &CHALLENGE, &[0xaa; 8]).unwrap();
        assert_ne!(plain, session);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
