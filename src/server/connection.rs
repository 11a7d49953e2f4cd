//! Per-connection request dispatch
//!
//! Reads framed SMB2 requests, routes them through the connection's
//! engine, and writes responses back in request order. Filesystem and
//! authentication errors become protocol error responses; protocol
//! violations terminate the connection.

use crate::auth::Authenticator;
use crate::error::{Error, NtStatus, Result};
use crate::protocol::constants::{structure_size, Smb2Command};
use crate::protocol::engine::Smb2Engine;
use crate::protocol::messages::common::error_response_body;
use crate::protocol::messages::directory::Smb2QueryDirectoryRequest;
use crate::protocol::messages::file_ops::{
    Smb2CloseRequest, Smb2CreateRequest, Smb2FlushRequest, Smb2ReadRequest, Smb2WriteRequest,
};
use crate::protocol::messages::info::{Smb2QueryInfoRequest, Smb2SetInfoRequest};
use crate::protocol::messages::negotiate::Smb2NegotiateRequest;
use crate::protocol::messages::session::Smb2SessionSetupRequest;
use crate::protocol::messages::tree::Smb2TreeConnectRequest;
use crate::protocol::messages::{Smb2Header, SmbMessage};
use crate::share::ShareRegistry;
use crate::transport::SmbTransport;
use byteorder::{LittleEndian, WriteBytesExt};
use std::sync::Arc;
use tracing::{debug, trace};

/// Ids the engine assigned while handling a command; they override the
/// ids echoed from the request header.
#[derive(Default)]
struct IdGrants {
    session_id: Option<u64>,
    tree_id: Option<u32>,
}

/// Handles one client connection to completion.
pub struct ConnectionHandler<T: SmbTransport> {
    transport: T,
    engine: Smb2Engine,
}

impl<T: SmbTransport> ConnectionHandler<T> {
    pub fn new(
        transport: T,
        authenticator: Arc<Authenticator>,
        shares: Arc<ShareRegistry>,
        server_name: String,
    ) -> Self {
        Self {
            transport,
            engine: Smb2Engine::new(authenticator, shares, server_name),
        }
    }

    /// Serve requests until the client disconnects or a protocol
    /// violation occurs. All engine-owned resources are released when
    /// this returns, simply because `self.engine` is dropped.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let data = match self.transport.receive_message().await {
                Ok(data) => data,
                Err(Error::ConnectionClosed) => return Ok(()),
                Err(e) => return Err(e),
            };

            // Keepalive frames carry no SMB payload.
            if data.is_empty() {
                continue;
            }

            let header = Smb2Header::parse(&data)?;
            let body = &data[Smb2Header::SIZE..];
            trace!(command = ?header.command, message_id = header.message_id, "request");

            let mut grants = IdGrants::default();
            let result = self.dispatch(&header, body, &mut grants).await;

            let (response_body, status) = match result {
                Ok((body, status)) => (body, status),
                Err(e) if e.is_fatal_to_connection() => return Err(e),
                Err(e) => {
                    debug!(command = ?header.command, error = %e, "error response");
                    (error_response_body()?, e.ntstatus())
                }
            };

            let mut response_header = Smb2Header::response_to(&header, status as u32);
            if let Some(session_id) = grants.session_id {
                response_header.session_id = session_id;
            }
            if let Some(tree_id) = grants.tree_id {
                response_header.tree_id = tree_id;
            }

            let mut response = response_header.serialize()?;
            response.extend_from_slice(&response_body);
            self.transport.send_message(&response).await?;

            if header.command == Smb2Command::Logoff {
                // Session state is already torn down; keep serving in
                // case the client sets up a new session.
                continue;
            }
        }
    }

    async fn dispatch(
        &mut self,
        header: &Smb2Header,
        body: &[u8],
        grants: &mut IdGrants,
    ) -> Result<(Vec<u8>, NtStatus)> {
        match header.command {
            Smb2Command::Negotiate => {
                let req = Smb2NegotiateRequest::parse(body)?;
                let resp = self.engine.handle_negotiate(&req)?;
                Ok((resp.serialize()?, NtStatus::Success))
            }
            Smb2Command::SessionSetup => {
                let req = Smb2SessionSetupRequest::parse(body)?;
                let outcome = self.engine.handle_session_setup(&req)?;
                grants.session_id = Some(outcome.session_id);
                Ok((outcome.response.serialize()?, outcome.status))
            }
            Smb2Command::Logoff => {
                self.engine.handle_logoff()?;
                Ok((logoff_response()?, NtStatus::Success))
            }
            Smb2Command::TreeConnect => {
                let req = Smb2TreeConnectRequest::parse(body)?;
                let (tree_id, resp) = self.engine.handle_tree_connect(&req)?;
                grants.tree_id = Some(tree_id);
                Ok((resp.serialize()?, NtStatus::Success))
            }
            Smb2Command::TreeDisconnect => {
                self.engine.handle_tree_disconnect(header.tree_id)?;
                Ok((tree_disconnect_response()?, NtStatus::Success))
            }
            Smb2Command::Create => {
                let req = Smb2CreateRequest::parse(body)?;
                let resp = self.engine.handle_create(header.tree_id, &req).await?;
                Ok((resp.serialize()?, NtStatus::Success))
            }
            Smb2Command::Close => {
                let req = Smb2CloseRequest::parse(body)?;
                let resp = self.engine.handle_close(&req).await?;
                Ok((resp.serialize()?, NtStatus::Success))
            }
            Smb2Command::Flush => {
                let req = Smb2FlushRequest::parse(body)?;
                self.engine.handle_flush(&req).await?;
                Ok((flush_response()?, NtStatus::Success))
            }
            Smb2Command::Read => {
                let req = Smb2ReadRequest::parse(body)?;
                let resp = self.engine.handle_read(&req).await?;
                Ok((resp.serialize()?, NtStatus::Success))
            }
            Smb2Command::Write => {
                let req = Smb2WriteRequest::parse(body)?;
                let resp = self.engine.handle_write(&req).await?;
                Ok((resp.serialize()?, NtStatus::Success))
            }
            Smb2Command::QueryDirectory => {
                let req = Smb2QueryDirectoryRequest::parse(body)?;
                let resp = self.engine.handle_query_directory(&req).await?;
                let status = if resp.output_buffer.is_empty() {
                    NtStatus::NoMoreFiles
                } else {
                    NtStatus::Success
                };
                Ok((resp.serialize()?, status))
            }
            Smb2Command::GetInfo => {
                let req = Smb2QueryInfoRequest::parse(body)?;
                let resp = self.engine.handle_query_info(&req).await?;
                Ok((resp.serialize()?, NtStatus::Success))
            }
            Smb2Command::SetInfo => {
                let req = Smb2SetInfoRequest::parse(body)?;
                let resp = self.engine.handle_set_info(&req).await?;
                Ok((resp.serialize()?, NtStatus::Success))
            }
            Smb2Command::Echo => Ok((echo_response()?, NtStatus::Success)),
            other => {
                debug!(command = ?other, "unsupported command");
                Err(Error::NotSupported(format!("{:?}", other)))
            }
        }
    }
}

fn four_byte_response(size: u16) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(4);
    buf.write_u16::<LittleEndian>(size)?;
    buf.write_u16::<LittleEndian>(0)?;
    Ok(buf)
}

fn logoff_response() -> Result<Vec<u8>> {
    four_byte_response(structure_size::LOGOFF)
}

fn tree_disconnect_response() -> Result<Vec<u8>> {
    four_byte_response(structure_size::TREE_DISCONNECT)
}

fn flush_response() -> Result<Vec<u8>> {
    four_byte_response(structure_size::FLUSH_RESPONSE)
}

fn echo_response() -> Result<Vec<u8>> {
    four_byte_response(structure_size::ECHO)
}
