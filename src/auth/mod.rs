//! Authentication: credential store and NTLM challenge-response
//!
//! The store maps usernames to precomputed LM/NT hash pairs; the
//! authenticator issues per-session challenges and verifies Type 3
//! responses against the store. Plaintext passwords never reach this
//! module.

pub mod crypto;
pub mod ntlm;
pub mod spnego;

use crate::error::{Error, Result};
use ntlm::NtlmAuthenticateMessage;
use rand::RngCore;
use std::collections::HashMap;
use tracing::debug;

/// The well-known challenge used when deterministic handshakes are
/// requested with an empty challenge value ("AAAAAAAA"). Guessable by
/// construction; only suitable for tests.
pub const FIXED_TEST_CHALLENGE: [u8; 8] = *b"AAAAAAAA";

/// One registered user: a name, an optional domain, and the LM/NT hash
/// pair derived from the password at configuration time.
#[derive(Debug, Clone)]
pub struct Credential {
    pub username: String,
    pub domain: String,
    pub lm_hash: [u8; 16],
    pub nt_hash: [u8; 16],
}

impl Credential {
    /// Hash a plaintext password into a credential.
    pub fn from_password(username: &str, domain: &str, password: &str) -> Result<Self> {
        Ok(Self {
            username: username.to_string(),
            domain: domain.to_string(),
            lm_hash: crypto::lm_hash(password)?,
            nt_hash: crypto::nt_hash(password)?,
        })
    }
}

/// In-memory credential store. Built before the listener starts and
/// never mutated afterwards; shared read-only across connections.
#[derive(Debug, Default)]
pub struct CredentialStore {
    entries: HashMap<String, Credential>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a credential. Duplicate usernames overwrite the
    /// previous entry. Lookup is case-insensitive, matching client
    /// behavior.
    pub fn register(&mut self, credential: Credential) {
        self.entries
            .insert(credential.username.to_lowercase(), credential);
    }

    pub fn lookup(&self, username: &str) -> Option<&Credential> {
        self.entries.get(&username.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How server challenges are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengePolicy {
    /// Fresh random challenge per session (default).
    Random,
    /// A fixed challenge, explicitly opted into for deterministic
    /// handshakes in tests.
    Fixed([u8; 8]),
}

impl Default for ChallengePolicy {
    fn default() -> Self {
        ChallengePolicy::Random
    }
}

/// Server-side NTLM authenticator.
pub struct Authenticator {
    store: CredentialStore,
    policy: ChallengePolicy,
}

impl Authenticator {
    pub fn new(store: CredentialStore, policy: ChallengePolicy) -> Self {
        Self { store, policy }
    }

    /// Produce the server challenge for one session. Random challenges
    /// are drawn fresh per call so no two sessions share one.
    pub fn generate_challenge(&self) -> [u8; 8] {
        match self.policy {
            ChallengePolicy::Fixed(challenge) => challenge,
            ChallengePolicy::Random => {
                let mut challenge = [0u8; 8];
                rand::thread_rng().fill_bytes(&mut challenge);
                challenge
            }
        }
    }

    /// Verify a Type 3 authenticate message against the store.
    ///
    /// Accepts NTLMv2, NTLMv1, NTLM2 session security, and LMv1
    /// responses; each comparison is constant-time. Returns the
    /// authenticated username.
    pub fn verify(
        &self,
        auth: &NtlmAuthenticateMessage,
        server_challenge: &[u8; 8],
    ) -> Result<String> {
        let credential = self.store.lookup(&auth.username).ok_or_else(|| {
            debug!(username = %auth.username, "unknown user");
            Error::AuthenticationFailed(format!("unknown user: {}", auth.username))
        })?;

        if self.verify_responses(credential, auth, server_challenge)? {
            Ok(credential.username.clone())
        } else {
            debug!(username = %auth.username, "response mismatch");
            Err(Error::AuthenticationFailed(format!(
                "bad response for user: {}",
                auth.username
            )))
        }
    }

    fn verify_responses(
        &self,
        credential: &Credential,
        auth: &NtlmAuthenticateMessage,
        server_challenge: &[u8; 8],
    ) -> Result<bool> {
        // NTLMv2: proof + blob, longer than the fixed 24-byte v1 form.
        if auth.nt_response.len() > 24 {
            // The client computes the v2 hash with the domain it sent;
            // some clients send an empty domain.
            for domain in [auth.domain.as_str(), ""] {
                let v2_hash = crypto::ntlmv2_hash(&credential.nt_hash, &auth.username, domain)?;
                if crypto::verify_ntlmv2_proof(&v2_hash, server_challenge, &auth.nt_response)? {
                    return Ok(true);
                }
            }
            return Ok(false);
        }

        if auth.nt_response.len() == 24 {
            // Plain NTLMv1
            let expected = crypto::ntlmv1_response(&credential.nt_hash, server_challenge)?;
            if crypto::constant_time_eq(&expected, &auth.nt_response) {
                return Ok(true);
            }

            // NTLM2 session security: client challenge travels in the
            // first 8 bytes of the LM response field.
            if auth.lm_response.len() >= 8 {
                let client_challenge: [u8; 8] = auth.lm_response[..8]
                    .try_into()
                    .map_err(|_| Error::InvalidParameter("LM response".into()))?;
                let expected = crypto::ntlm2_session_response(
                    &credential.nt_hash,
                    server_challenge,
                    &client_challenge,
                )?;
                if crypto::constant_time_eq(&expected, &auth.nt_response) {
                    return Ok(true);
                }
            }
        }

        // LMv1 fallback for clients that only fill the LM field.
        if auth.lm_response.len() == 24 {
            let expected = crypto::ntlmv1_response(&credential.lm_hash, server_challenge)?;
            if crypto::constant_time_eq(&expected, &auth.lm_response) {
                return Ok(true);
            }
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmac::{Hmac, Mac};
    use md5::Md5;
    use super::ntlm::NtlmFlags;

    fn store_with(username: &str, password: &str) -> CredentialStore {
        let mut store = CredentialStore::new();
        store.register(Credential::from_password(username, "WORKGROUP", password).unwrap());
        store
    }

    fn type3(username: &str, nt_response: Vec<u8>, lm_response: Vec<u8>) -> NtlmAuthenticateMessage {
        NtlmAuthenticateMessage {
            flags: NtlmFlags::NEGOTIATE_UNICODE | NtlmFlags::NEGOTIATE_NTLM,
            lm_response,
            nt_response,
            domain: "WORKGROUP".into(),
            username: username.into(),
            workstation: "CLIENT".into(),
            session_key: Vec::new(),
        }
    }

    #[test]
    fn test_store_overwrites_duplicates() {
        let mut store = CredentialStore::new();
        store.register(Credential::from_password("user", "", "first").unwrap());
        store.register(Credential::from_password("USER", "", "second").unwrap());
        let entry = store.lookup("User").unwrap();
        assert_eq!(entry.nt_hash, crypto::nt_hash("second").unwrap());
    }

    #[test]
    fn test_fixed_challenge_policy() {
        let auth = Authenticator::new(CredentialStore::new(), ChallengePolicy::Fixed([0x41; 8]));
        assert_eq!(auth.generate_challenge(), FIXED_TEST_CHALLENGE);
        assert_eq!(auth.generate_challenge(), auth.generate_challenge());
    }

    #[test]
    fn test_random_challenges_differ() {
        let auth = Authenticator::new(CredentialStore::new(), ChallengePolicy::Random);
        assert_ne!(auth.generate_challenge(), auth.generate_challenge());
    }

    #[test]
    fn test_ntlmv1_accepted() {
        let auth = Authenticator::new(
            store_with("hello-world", "h3110w0r1d"),
            ChallengePolicy::Fixed(FIXED_TEST_CHALLENGE),
        );
        let challenge = auth.generate_challenge();

        let nt_hash = crypto::nt_hash("h3110w0r1d").unwrap();
        let response = crypto::ntlmv1_response(&nt_hash, &challenge).unwrap();

        let user = auth
            .verify(&type3("hello-world", response.to_vec(), Vec::new()), &challenge)
            .unwrap();
        assert_eq!(user, "hello-world");
    }

    #[test]
    fn test_ntlmv2_accepted() {
        let auth = Authenticator::new(
            store_with("hello-world", "h3110w0r1d"),
            ChallengePolicy::Fixed(FIXED_TEST_CHALLENGE),
        );
        let challenge = auth.generate_challenge();

        let nt_hash = crypto::nt_hash("h3110w0r1d").unwrap();
        let v2_hash = crypto::ntlmv2_hash(&nt_hash, "hello-world", "WORKGROUP").unwrap();

        let blob = vec![0x01, 0x01, 0, 0, 0, 0, 0, 0, 0xde, 0xad, 0xbe, 0xef];
        let mut mac = Hmac::<Md5>::new_from_slice(&v2_hash).unwrap();
        mac.update(&challenge);
        mac.update(&blob);
        let mut nt_response = mac.finalize().into_bytes().to_vec();
        nt_response.extend_from_slice(&blob);

        let user = auth
            .verify(&type3("hello-world", nt_response, Vec::new()), &challenge)
            .unwrap();
        assert_eq!(user, "hello-world");
    }

    #[test]
    fn test_wrong_password_rejected() {
        let auth = Authenticator::new(
            store_with("hello-world", "h3110w0r1d"),
            ChallengePolicy::Fixed(FIXED_TEST_CHALLENGE),
        );
        let challenge = auth.generate_challenge();

        let nt_hash = crypto::nt_hash("wrong-password").unwrap();
        let response = crypto::ntlmv1_response(&nt_hash, &challenge).unwrap();

        let result = auth.verify(&type3("hello-world", response.to_vec(), Vec::new()), &challenge);
        assert!(matches!(result, Err(Error::AuthenticationFailed(_))));
    }

    #[test]
    fn test_unknown_user_rejected() {
        let auth = Authenticator::new(
            store_with("hello-world", "h3110w0r1d"),
            ChallengePolicy::Fixed(FIXED_TEST_CHALLENGE),
        );
        let challenge = auth.generate_challenge();
        let result = auth.verify(&type3("nobody", vec![0u8; 24], Vec::new()), &challenge);
        assert!(matches!(result, Err(Error::AuthenticationFailed(_))));
    }

    #[test]
    fn test_username_lookup_case_insensitive() {
        let auth = Authenticator::new(
            store_with("hello-world", "h3110w0r1d"),
            ChallengePolicy::Fixed(FIXED_TEST_CHALLENGE),
        );
        let challenge = auth.generate_challenge();

        let nt_hash = crypto::nt_hash("h3110w0r1d").unwrap();
        let response = crypto::ntlmv1_response(&nt_hash, &challenge).unwrap();

        assert!(auth
            .verify(&type3("HELLO-WORLD", response.to_vec(), Vec::new()), &challenge)
            .is_ok());
    }
}
