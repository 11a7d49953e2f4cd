//! Minimal SMB2 client used only by the end-to-end tests

use crate::auth::{crypto, ntlm};
use crate::error::{NtStatus, Result};
use crate::protocol::constants::Smb2Command;
use crate::protocol::messages::directory::{
    Smb2QueryDirectoryRequest, Smb2QueryDirectoryResponse,
};
use crate::protocol::messages::file_ops::{
    Smb2CloseRequest, Smb2CreateRequest, Smb2CreateResponse, Smb2ReadRequest, Smb2ReadResponse,
    Smb2WriteRequest, Smb2WriteResponse,
};
use crate::protocol::messages::negotiate::{Smb2NegotiateRequest, Smb2NegotiateResponse};
use crate::protocol::messages::session::Smb2SessionSetupRequest;
use crate::protocol::messages::tree::Smb2TreeConnectRequest;
use crate::protocol::messages::{FileId, Smb2Header, SmbMessage};
use crate::protocol::constants::Smb2Dialect;
use crate::transport::{SmbTransport, TcpTransport};
use hmac::{Hmac, Mac};
use md5::Md5;
use std::net::SocketAddr;

pub struct TestClient {
    transport: TcpTransport,
    message_id: u64,
    session_id: u64,
    tree_id: u32,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        Ok(Self {
            transport: TcpTransport::connect(addr).await?,
            message_id: 0,
            session_id: 0,
            tree_id: 0,
        })
    }

    pub async fn close(mut self) -> Result<()> {
        self.transport.close().await
    }

    /// Send one command and wait for its response.
    pub async fn request(
        &mut self,
        command: Smb2Command,
        body: &[u8],
    ) -> Result<(Smb2Header, Vec<u8>)> {
        let mut header = Smb2Header::new(command);
        header.message_id = self.message_id;
        self.message_id += 1;
        header.session_id = self.session_id;
        header.tree_id = self.tree_id;

        let mut message = header.serialize()?;
        message.extend_from_slice(body);
        self.transport.send_message(&message).await?;

        let response = self.transport.receive_message().await?;
        let response_header = Smb2Header::parse(&response)?;
        assert_eq!(
            response_header.message_id, header.message_id,
            "response out of order"
        );
        Ok((response_header, response[Smb2Header::SIZE..].to_vec()))
    }

    pub async fn negotiate(&mut self) -> Result<Smb2NegotiateResponse> {
        let req = Smb2NegotiateRequest::new(vec![Smb2Dialect::Smb202, Smb2Dialect::Smb210]);
        let (header, body) = self
            .request(Smb2Command::Negotiate, &req.serialize()?)
            .await?;
        assert_eq!(header.status, NtStatus::Success as u32);
        Smb2NegotiateResponse::parse(&body)
    }

    /// Full NTLM handshake (raw NTLMSSP, NTLMv2 response). Returns the
    /// final session setup status; the session id is adopted on
    /// success.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<u32> {
        let type1 = ntlm::NtlmNegotiateMessage::new("WORKGROUP".into(), "E2ECLIENT".into())
            .serialize()?;
        let req = Smb2SessionSetupRequest::with_security_blob(type1);
        let (header, body) = self
            .request(Smb2Command::SessionSetup, &req.serialize()?)
            .await?;
        assert_eq!(header.status, NtStatus::MoreProcessingRequired as u32);
        let setup =
            crate::protocol::messages::session::Smb2SessionSetupResponse::parse(&body)?;
        let challenge_msg = ntlm::NtlmChallengeMessage::parse(&setup.security_blob)?;

        // Adopt the provisional session id for the Type 3 leg.
        self.session_id = header.session_id;

        let type3 = build_ntlmv2_authenticate(username, password, &challenge_msg)?;
        let req = Smb2SessionSetupRequest::with_security_blob(type3);
        let (header, _body) = self
            .request(Smb2Command::SessionSetup, &req.serialize()?)
            .await?;

        if header.status == NtStatus::Success as u32 {
            self.session_id = header.session_id;
        }
        Ok(header.status)
    }

    pub async fn tree_connect(&mut self, share: &str) -> Result<u32> {
        let path = format!("\\\\127.0.0.1\\{}", share);
        let req = Smb2TreeConnectRequest::new(path);
        let (header, _body) = self
            .request(Smb2Command::TreeConnect, &req.serialize()?)
            .await?;
        if header.status == NtStatus::Success as u32 {
            self.tree_id = header.tree_id;
        }
        Ok(header.status)
    }

    pub async fn create(&mut self, req: &Smb2CreateRequest) -> Result<(u32, Option<Smb2CreateResponse>)> {
        let (header, body) = self.request(Smb2Command::Create, &req.serialize()?).await?;
        if header.status == NtStatus::Success as u32 {
            Ok((header.status, Some(Smb2CreateResponse::parse(&body)?)))
        } else {
            Ok((header.status, None))
        }
    }

    pub async fn read(&mut self, file_id: FileId, offset: u64, length: u32) -> Result<Vec<u8>> {
        let req = Smb2ReadRequest::new(file_id, offset, length);
        let (header, body) = self.request(Smb2Command::Read, &req.serialize()?).await?;
        assert_eq!(header.status, NtStatus::Success as u32);
        Ok(Smb2ReadResponse::parse(&body)?.data)
    }

    pub async fn write(&mut self, file_id: FileId, offset: u64, data: &[u8]) -> Result<u32> {
        let req = Smb2WriteRequest::new(file_id, offset, data.to_vec());
        let (header, body) = self.request(Smb2Command::Write, &req.serialize()?).await?;
        assert_eq!(header.status, NtStatus::Success as u32);
        Ok(Smb2WriteResponse::parse(&body)?.count)
    }

    pub async fn close_file(&mut self, file_id: FileId) -> Result<u32> {
        let req = Smb2CloseRequest::new(file_id);
        let (header, _body) = self.request(Smb2Command::Close, &req.serialize()?).await?;
        Ok(header.status)
    }

    pub async fn query_directory(&mut self, file_id: FileId) -> Result<(u32, Vec<u8>)> {
        let req = Smb2QueryDirectoryRequest::new(file_id, "*".into());
        let (header, body) = self
            .request(Smb2Command::QueryDirectory, &req.serialize()?)
            .await?;
        if header.status == NtStatus::Success as u32 {
            Ok((
                header.status,
                Smb2QueryDirectoryResponse::parse(&body)?.output_buffer,
            ))
        } else {
            Ok((header.status, Vec::new()))
        }
    }

    pub async fn logoff(&mut self) -> Result<u32> {
        let body =
            crate::protocol::messages::session::Smb2Logoff.serialize()?;
        let (header, _body) = self.request(Smb2Command::Logoff, &body).await?;
        self.session_id = 0;
        self.tree_id = 0;
        Ok(header.status)
    }
}

/// Compute a Type 3 message with an NTLMv2 response, the way a real
/// client would answer the server's challenge.
fn build_ntlmv2_authenticate(
    username: &str,
    password: &str,
    challenge: &ntlm::NtlmChallengeMessage,
) -> Result<Vec<u8>> {
    let domain = "WORKGROUP";
    let nt_hash = crypto::nt_hash(password)?;
    let v2_hash = crypto::ntlmv2_hash(&nt_hash, username, domain)?;

    let client_challenge: [u8; 8] = rand::random();
    let mut blob = Vec::new();
    blob.extend_from_slice(&[0x01, 0x01, 0x00, 0x00]); // version
    blob.extend_from_slice(&[0x00; 4]); // reserved
    blob.extend_from_slice(&0u64.to_le_bytes()); // timestamp
    blob.extend_from_slice(&client_challenge);
    blob.extend_from_slice(&[0x00; 4]); // unknown
    blob.extend_from_slice(&challenge.target_info);
    blob.extend_from_slice(&[0x00; 4]); // terminator

    let mut mac = Hmac::<Md5>::new_from_slice(&v2_hash).expect("hmac accepts any key length");
    mac.update(&challenge.challenge);
    mac.update(&blob);
    let mut nt_response = mac.finalize().into_bytes().to_vec();
    nt_response.extend_from_slice(&blob);

    ntlm::NtlmAuthenticateMessage {
        flags: ntlm::NtlmFlags::NEGOTIATE_UNICODE
            | ntlm::NtlmFlags::NEGOTIATE_NTLM
            | ntlm::NtlmFlags::NEGOTIATE_EXTENDED_SECURITY,
        lm_response: Vec::new(),
        nt_response,
        domain: domain.into(),
        username: username.into(),
        workstation: "E2ECLIENT".into(),
        session_key: Vec::new(),
    }
    .serialize()
}
