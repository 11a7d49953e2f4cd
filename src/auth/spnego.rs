//! Minimal SPNEGO wrapping for NTLM tokens
//!
//! SMB2 clients usually carry NTLM inside a SPNEGO negotiation token.
//! Only the subset needed to shuttle NTLMSSP blobs in and out is
//! implemented; mechanism negotiation always selects NTLM.

use super::ntlm::NTLMSSP_SIGNATURE;

/// OID for NTLMSSP: 1.3.6.1.4.1.311.2.2.10
const NTLMSSP_OID: [u8; 10] = [0x2b, 0x06, 0x01, 0x04, 0x01, 0x82, 0x37, 0x02, 0x02, 0x0a];

/// True if the blob looks like a SPNEGO token rather than raw NTLMSSP.
///
/// negTokenInit starts with APPLICATION 0 (0x60), negTokenTarg with
/// CONTEXT 1 (0xa1).
pub fn is_spnego(blob: &[u8]) -> bool {
    !blob.is_empty() && (blob[0] == 0x60 || blob[0] == 0xa1)
}

/// Locate the NTLMSSP token inside a SPNEGO blob.
///
/// Full ASN.1 parsing is not required for the fixture; scanning for the
/// NTLMSSP signature inside the token is sufficient for every client
/// the fixture serves.
pub fn unwrap_ntlm(blob: &[u8]) -> Option<&[u8]> {
    if !is_spnego(blob) || blob.len() < 16 {
        return None;
    }

    (0..blob.len().saturating_sub(NTLMSSP_SIGNATURE.len()))
        .find(|&i| &blob[i..i + NTLMSSP_SIGNATURE.len()] == NTLMSSP_SIGNATURE)
        .map(|i| &blob[i..])
}

fn write_der_length(out: &mut Vec<u8>, len: usize) {
    if len < 128 {
        out.push(len as u8);
    } else if len < 256 {
        out.push(0x81);
        out.push(len as u8);
    } else {
        out.push(0x82);
        out.push((len >> 8) as u8);
        out.push((len & 0xff) as u8);
    }
}

fn write_der(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    write_der_length(out, content.len());
    out.extend_from_slice(content);
}

/// Wrap an NTLM challenge in a negTokenTarg with accept-incomplete,
/// naming NTLMSSP as the supported mechanism.
pub fn wrap_challenge(ntlm_token: &[u8]) -> Vec<u8> {
    let mut content = Vec::new();

    // negResult [0] ENUMERATED accept-incomplete (1)
    write_der(&mut content, 0xa0, &[0x0a, 0x01, 0x01]);

    // supportedMech [1] OBJECT IDENTIFIER
    let mut mech = Vec::new();
    write_der(&mut mech, 0x06, &NTLMSSP_OID);
    write_der(&mut content, 0xa1, &mech);

    // responseToken [2] OCTET STRING
    let mut token = Vec::new();
    write_der(&mut token, 0x04, ntlm_token);
    write_der(&mut content, 0xa2, &token);

    let mut sequence = Vec::new();
    write_der(&mut sequence, 0x30, &content);

    let mut result = Vec::new();
    write_der(&mut result, 0xa1, &sequence);
    result
}

/// Build a negTokenTarg carrying accept-completed.
pub fn accept_completed() -> Vec<u8> {
    let mut content = Vec::new();
    write_der(&mut content, 0xa0, &[0x0a, 0x01, 0x00]);

    let mut sequence = Vec::new();
    write_der(&mut sequence, 0x30, &content);

    let mut result = Vec::new();
    write_der(&mut result, 0xa1, &sequence);
    result
}
