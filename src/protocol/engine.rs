//! Per-connection SMB2 protocol engine
//!
//! One engine instance exists per accepted connection and owns every
//! piece of mutable state for it: the connection phase, the
//! authenticated session, tree connections, and open files (including
//! their host file handles). Dropping the engine releases everything,
//! which is what makes the release-on-disconnect invariant hold by
//! construction.

use crate::auth::{ntlm, spnego, Authenticator};
use crate::error::{Error, NtStatus, Result};
use crate::protocol::constants::{
    unix_to_filetime, CreateAction, CreateDisposition, CreateOptions, DesiredAccess,
    FileAttributes, Smb2Dialect, SecurityMode, Smb2Capabilities, SessionFlags,
    DEFAULT_MAX_READ_SIZE, DEFAULT_MAX_TRANSACT_SIZE, DEFAULT_MAX_WRITE_SIZE,
};
use crate::protocol::messages::directory::{
    build_directory_listing, DirectoryEntry, Smb2QueryDirectoryRequest,
    Smb2QueryDirectoryResponse,
};
use crate::protocol::messages::file_ops::{
    Smb2CloseRequest, Smb2CloseResponse, Smb2CreateRequest, Smb2CreateResponse, Smb2FlushRequest,
    Smb2ReadRequest, Smb2ReadResponse, Smb2WriteRequest, Smb2WriteResponse,
};
use crate::protocol::messages::info::{
    FileInfoClass, InfoType, Smb2QueryInfoRequest, Smb2QueryInfoResponse, Smb2SetInfoRequest,
    Smb2SetInfoResponse,
};
use crate::protocol::messages::negotiate::{Smb2NegotiateRequest, Smb2NegotiateResponse};
use crate::protocol::messages::session::{Smb2SessionSetupRequest, Smb2SessionSetupResponse};
use crate::protocol::messages::tree::{Smb2TreeConnectRequest, Smb2TreeConnectResponse};
use crate::protocol::messages::FileId;
use crate::share::{Share, ShareRegistry};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

/// Connection phase
#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    /// Waiting for the protocol negotiation
    Negotiating,
    /// Negotiated; session setup may begin or be in flight
    SessionSetup,
    /// A session is established
    Authenticated,
}

/// The authenticated session of this connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: u64,
    pub username: String,
}

/// One tree connection, scoped to this engine.
struct TreeConnection {
    #[allow(dead_code)]
    tree_id: u32,
    share: Share,
}

/// One open file or directory, owning its host handle.
struct OpenFile {
    tree_id: u32,
    path: PathBuf,
    access: DesiredAccess,
    file: Option<fs::File>,
    is_directory: bool,
    delete_on_close: bool,
    enumeration_done: bool,
    create_time: u64,
    write_time: u64,
    end_of_file: u64,
}

/// Everything `handle_session_setup` tells the connection handler.
pub struct SessionSetupOutcome {
    pub response: Smb2SessionSetupResponse,
    pub status: NtStatus,
    pub session_id: u64,
}

/// SMB2 protocol engine for a single connection.
pub struct Smb2Engine {
    authenticator: Arc<Authenticator>,
    shares: Arc<ShareRegistry>,
    server_name: String,

    phase: Phase,
    dialect: Option<Smb2Dialect>,
    /// Challenge issued to the in-flight session setup
    pending_challenge: Option<[u8; 8]>,
    session: Option<Session>,

    trees: HashMap<u32, TreeConnection>,
    open_files: HashMap<FileId, OpenFile>,
    next_tree_id: u32,
    next_session_id: u64,
}

impl Smb2Engine {
    pub fn new(
        authenticator: Arc<Authenticator>,
        shares: Arc<ShareRegistry>,
        server_name: String,
    ) -> Self {
        Self {
            authenticator,
            shares,
            server_name,
            phase: Phase::Negotiating,
            dialect: None,
            pending_challenge: None,
            session: None,
            trees: HashMap::new(),
            open_files: HashMap::new(),
            next_tree_id: 1,
            next_session_id: 1,
        }
    }

    /// Number of live open files; used by tests to confirm teardown.
    pub fn open_file_count(&self) -> usize {
        self.open_files.len()
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The dialect chosen during negotiation, if any.
    pub fn dialect(&self) -> Option<Smb2Dialect> {
        self.dialect
    }

    fn require_session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| Error::InvalidState("no session established".into()))
    }

    fn tree(&self, tree_id: u32) -> Result<&TreeConnection> {
        self.trees
            .get(&tree_id)
            .ok_or_else(|| Error::InvalidParameter(format!("unknown tree id {}", tree_id)))
    }

    fn now_filetime() -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        unix_to_filetime(now)
    }

    pub fn handle_negotiate(&mut self, req: &Smb2NegotiateRequest) -> Result<Smb2NegotiateResponse> {
        if self.phase != Phase::Negotiating {
            return Err(Error::InvalidState("already negotiated".into()));
        }

        // Prefer 2.1, fall back to 2.0.2.
        let dialect = if req.dialects.contains(&Smb2Dialect::Smb210) {
            Smb2Dialect::Smb210
        } else if req.dialects.contains(&Smb2Dialect::Smb202) {
            Smb2Dialect::Smb202
        } else {
            return Err(Error::Protocol("no supported dialect offered".into()));
        };

        self.dialect = Some(dialect);
        self.phase = Phase::SessionSetup;
        debug!(?dialect, "negotiated");

        Ok(Smb2NegotiateResponse {
            security_mode: SecurityMode::SIGNING_ENABLED,
            dialect_revision: dialect,
            server_guid: Uuid::new_v4(),
            capabilities: Smb2Capabilities::LARGE_MTU,
            max_transact_size: DEFAULT_MAX_TRANSACT_SIZE,
            max_read_size: DEFAULT_MAX_READ_SIZE,
            max_write_size: DEFAULT_MAX_WRITE_SIZE,
            system_time: Self::now_filetime(),
            server_start_time: 0,
            security_blob: Vec::new(),
        })
    }

    pub fn handle_session_setup(
        &mut self,
        req: &Smb2SessionSetupRequest,
    ) -> Result<SessionSetupOutcome> {
        if self.phase == Phase::Negotiating {
            return Err(Error::InvalidState("protocol not negotiated".into()));
        }

        let was_spnego = spnego::is_spnego(&req.security_blob);
        let token = if was_spnego {
            spnego::unwrap_ntlm(&req.security_blob)
                .ok_or_else(|| Error::ParseError("no NTLM token in SPNEGO blob".into()))?
        } else {
            &req.security_blob[..]
        };

        if token.len() < 12 || &token[0..8] != ntlm::NTLMSSP_SIGNATURE {
            return Err(Error::ParseError("security blob is not NTLMSSP".into()));
        }

        let mut cursor = std::io::Cursor::new(&token[8..12]);
        let message_type = ntlm::NtlmMessageType::try_from(ReadBytesExt::read_u32::<LittleEndian>(&mut cursor)?)?;

        match message_type {
            ntlm::NtlmMessageType::Negotiate => {
                ntlm::NtlmNegotiateMessage::parse(token)?;

                let challenge = self.authenticator.generate_challenge();
                self.pending_challenge = Some(challenge);

                let challenge_msg =
                    ntlm::NtlmChallengeMessage::new(self.server_name.clone(), challenge);
                let challenge_bytes = challenge_msg.serialize()?;

                let blob = if was_spnego {
                    spnego::wrap_challenge(&challenge_bytes)
                } else {
                    challenge_bytes
                };

                Ok(SessionSetupOutcome {
                    response: Smb2SessionSetupResponse::with_security_blob(blob),
                    status: NtStatus::MoreProcessingRequired,
                    session_id: self.next_session_id,
                })
            }
            ntlm::NtlmMessageType::Authenticate => {
                let auth = ntlm::NtlmAuthenticateMessage::parse(token)?;
                let challenge = self.pending_challenge.ok_or_else(|| {
                    Error::InvalidState("authenticate without prior negotiate".into())
                })?;

                // On failure the pending challenge stays armed so the
                // client may retry within the same exchange.
                let username = self.authenticator.verify(&auth, &challenge)?;

                let session_id = self.next_session_id;
                self.next_session_id += 1;
                self.pending_challenge = None;
                self.session = Some(Session {
                    session_id,
                    username: username.clone(),
                });
                self.phase = Phase::Authenticated;
                debug!(username = %username, session_id, "session established");

                let blob = if was_spnego {
                    spnego::accept_completed()
                } else {
                    Vec::new()
                };

                let mut response = Smb2SessionSetupResponse::with_security_blob(blob);
                response.session_flags = SessionFlags::empty().bits();

                Ok(SessionSetupOutcome {
                    response,
                    status: NtStatus::Success,
                    session_id,
                })
            }
            ntlm::NtlmMessageType::Challenge => Err(Error::ParseError(
                "unexpected NTLM challenge message from client".into(),
            )),
        }
    }

    /// Tear down the session and everything scoped to it. The
    /// connection survives and may set up a new session.
    pub fn handle_logoff(&mut self) -> Result<()> {
        self.require_session()?;
        debug!(
            trees = self.trees.len(),
            open_files = self.open_files.len(),
            "logoff"
        );
        self.open_files.clear();
        self.trees.clear();
        self.session = None;
        self.pending_challenge = None;
        self.phase = Phase::SessionSetup;
        Ok(())
    }

    pub fn handle_tree_connect(
        &mut self,
        req: &Smb2TreeConnectRequest,
    ) -> Result<(u32, Smb2TreeConnectResponse)> {
        self.require_session()?;

        let share = self.shares.resolve_tree_path(&req.path)?.clone();
        let tree_id = self.next_tree_id;
        self.next_tree_id += 1;

        debug!(share = %share.name, tree_id, "tree connect");
        self.trees.insert(tree_id, TreeConnection { tree_id, share });

        Ok((tree_id, Smb2TreeConnectResponse::disk()))
    }

    /// Destroy a tree connection and every file opened through it.
    pub fn handle_tree_disconnect(&mut self, tree_id: u32) -> Result<()> {
        self.require_session()?;
        if self.trees.remove(&tree_id).is_none() {
            return Err(Error::InvalidParameter(format!(
                "unknown tree id {}",
                tree_id
            )));
        }
        self.open_files.retain(|_, f| f.tree_id != tree_id);
        Ok(())
    }

    pub async fn handle_create(
        &mut self,
        tree_id: u32,
        req: &Smb2CreateRequest,
    ) -> Result<Smb2CreateResponse> {
        self.require_session()?;
        let share = &self.tree(tree_id)?.share;
        let path = share.resolve_path(&req.file_name)?;

        let wants_directory = req
            .create_options
            .contains(CreateOptions::FILE_DIRECTORY_FILE)
            || req.file_attributes.contains(FileAttributes::DIRECTORY);

        let existing = fs::metadata(&path).await.ok();
        let exists = existing.is_some();
        let is_directory = existing.as_ref().map(|m| m.is_dir()).unwrap_or(wants_directory);

        if exists
            && is_directory
            && req
                .create_options
                .contains(CreateOptions::FILE_NON_DIRECTORY_FILE)
        {
            return Err(Error::AccessDenied(format!(
                "{} is a directory",
                req.file_name
            )));
        }

        let create_action = match (req.create_disposition, exists) {
            (CreateDisposition::Open, false) => {
                return Err(Error::NotFound(req.file_name.clone()));
            }
            (CreateDisposition::Open, true) => CreateAction::Opened,
            (CreateDisposition::Create, true) => {
                return Err(Error::AlreadyExists(req.file_name.clone()));
            }
            (CreateDisposition::Create, false) => CreateAction::Created,
            (CreateDisposition::OpenIf, true) => CreateAction::Opened,
            (CreateDisposition::OpenIf, false) => CreateAction::Created,
            (CreateDisposition::Overwrite, false) => {
                return Err(Error::NotFound(req.file_name.clone()));
            }
            (CreateDisposition::Overwrite, true) => CreateAction::Overwritten,
            (CreateDisposition::OverwriteIf, true) => CreateAction::Overwritten,
            (CreateDisposition::OverwriteIf, false) => CreateAction::Created,
            (CreateDisposition::Supersede, true) => CreateAction::Superseded,
            (CreateDisposition::Supersede, false) => CreateAction::Created,
        };

        let truncate = exists
            && !is_directory
            && matches!(
                create_action,
                CreateAction::Overwritten | CreateAction::Superseded
            );

        let file = if is_directory {
            if !exists {
                fs::create_dir_all(&path).await?;
            }
            None
        } else {
            let mut options = fs::OpenOptions::new();
            let write = req.desired_access.grants_write() || truncate || !exists;
            // A handle is always opened readable so metadata and
            // attribute-only opens work; data access is still gated by
            // the granted access mask.
            options.read(true).write(write);
            if !exists {
                options.create(true);
            }
            if truncate {
                options.truncate(true);
            }
            Some(options.open(&path).await?)
        };

        let metadata = fs::metadata(&path).await?;
        let to_secs = |time: std::io::Result<SystemTime>| {
            time.ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0)
        };
        let create_time = unix_to_filetime(to_secs(metadata.created()));
        let write_time = unix_to_filetime(to_secs(metadata.modified()));
        let end_of_file = if metadata.is_dir() { 0 } else { metadata.len() };

        let file_id = FileId::generate();
        debug!(
            file = %req.file_name,
            ?file_id,
            action = ?create_action,
            "create"
        );

        self.open_files.insert(
            file_id,
            OpenFile {
                tree_id,
                path,
                access: req.desired_access,
                file,
                is_directory: metadata.is_dir(),
                delete_on_close: req
                    .create_options
                    .contains(CreateOptions::FILE_DELETE_ON_CLOSE),
                enumeration_done: false,
                create_time,
                write_time,
                end_of_file,
            },
        );

        Ok(Smb2CreateResponse {
            oplock_level: 0,
            create_action: create_action as u32,
            creation_time: create_time,
            last_access_time: write_time,
            last_write_time: write_time,
            change_time: write_time,
            allocation_size: (end_of_file + 4095) & !4095,
            end_of_file,
            file_attributes: if metadata.is_dir() {
                FileAttributes::DIRECTORY
            } else {
                FileAttributes::NORMAL
            },
            file_id,
        })
    }

    pub async fn handle_close(&mut self, req: &Smb2CloseRequest) -> Result<Smb2CloseResponse> {
        self.require_session()?;
        let open_file = self
            .open_files
            .remove(&req.file_id)
            .ok_or(Error::InvalidHandle)?;

        let response = Smb2CloseResponse {
            flags: req.flags,
            creation_time: open_file.create_time,
            last_access_time: open_file.write_time,
            last_write_time: open_file.write_time,
            change_time: open_file.write_time,
            allocation_size: (open_file.end_of_file + 4095) & !4095,
            end_of_file: open_file.end_of_file,
            file_attributes: if open_file.is_directory {
                FileAttributes::DIRECTORY.bits()
            } else {
                FileAttributes::NORMAL.bits()
            },
        };

        let delete_on_close = open_file.delete_on_close;
        let is_directory = open_file.is_directory;
        let path = open_file.path.clone();

        // Drop the handle before unlinking.
        drop(open_file);

        if delete_on_close {
            debug!(path = %path.display(), "delete on close");
            let result = if is_directory {
                fs::remove_dir(&path).await
            } else {
                fs::remove_file(&path).await
            };
            if let Err(e) = result {
                debug!(path = %path.display(), error = %e, "delete on close failed");
            }
        }

        Ok(response)
    }

    pub async fn handle_flush(&mut self, req: &Smb2FlushRequest) -> Result<()> {
        self.require_session()?;
        let open_file = self
            .open_files
            .get_mut(&req.file_id)
            .ok_or(Error::InvalidHandle)?;

        if let Some(file) = open_file.file.as_mut() {
            file.sync_all().await?;
        }
        Ok(())
    }

    pub async fn handle_read(&mut self, req: &Smb2ReadRequest) -> Result<Smb2ReadResponse> {
        self.require_session()?;
        let open_file = self
            .open_files
            .get_mut(&req.file_id)
            .ok_or(Error::InvalidHandle)?;

        if !open_file.access.grants_read() {
            return Err(Error::AccessDenied("handle not opened for read".into()));
        }
        let file = open_file
            .file
            .as_mut()
            .ok_or_else(|| Error::AccessDenied("read on a directory handle".into()))?;

        file.seek(std::io::SeekFrom::Start(req.offset)).await?;

        let mut data = vec![0u8; req.length as usize];
        let mut total = 0;
        while total < data.len() {
            let n = file.read(&mut data[total..]).await?;
            if n == 0 {
                break;
            }
            total += n;
        }
        data.truncate(total);

        debug!(offset = req.offset, bytes = total, "read");
        Ok(Smb2ReadResponse { data })
    }

    pub async fn handle_write(&mut self, req: &Smb2WriteRequest) -> Result<Smb2WriteResponse> {
        self.require_session()?;
        let open_file = self
            .open_files
            .get_mut(&req.file_id)
            .ok_or(Error::InvalidHandle)?;

        if !open_file.access.grants_write() {
            return Err(Error::AccessDenied("handle not opened for write".into()));
        }
        let file = open_file
            .file
            .as_mut()
            .ok_or_else(|| Error::AccessDenied("write on a directory handle".into()))?;

        file.seek(std::io::SeekFrom::Start(req.offset)).await?;
        file.write_all(&req.data).await?;
        file.flush().await?;

        let end = req.offset + req.data.len() as u64;
        if end > open_file.end_of_file {
            open_file.end_of_file = end;
        }

        debug!(offset = req.offset, bytes = req.data.len(), "write");
        Ok(Smb2WriteResponse {
            count: req.data.len() as u32,
        })
    }

    pub async fn handle_query_directory(
        &mut self,
        req: &Smb2QueryDirectoryRequest,
    ) -> Result<Smb2QueryDirectoryResponse> {
        use crate::protocol::constants::query_directory_flags as qd;

        self.require_session()?;
        let open_file = self
            .open_files
            .get_mut(&req.file_id)
            .ok_or(Error::InvalidHandle)?;

        if !open_file.is_directory {
            return Err(Error::InvalidParameter("not a directory handle".into()));
        }

        if req.flags & (qd::RESTART_SCANS | qd::REOPEN) != 0 {
            open_file.enumeration_done = false;
        }

        // The whole listing fits one response for fixture-sized shares;
        // a repeat query reports the end of the enumeration.
        if open_file.enumeration_done {
            return Ok(Smb2QueryDirectoryResponse {
                output_buffer: Vec::new(),
            });
        }
        open_file.enumeration_done = true;

        let pattern = if req.file_name.is_empty() {
            "*".to_string()
        } else {
            req.file_name.clone()
        };

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut entries = vec![
            DirectoryEntry::new(".".into(), true, 0, now, now),
            DirectoryEntry::new("..".into(), true, 0, now, now),
        ];

        let mut dir = fs::read_dir(&open_file.path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !pattern_matches(&pattern, &name) {
                continue;
            }
            let metadata = entry.metadata().await?;
            entries.push(DirectoryEntry::from_metadata(name, &metadata));
        }

        debug!(
            path = %open_file.path.display(),
            entries = entries.len(),
            "query directory"
        );

        Ok(Smb2QueryDirectoryResponse {
            output_buffer: build_directory_listing(&entries)?,
        })
    }

    pub async fn handle_query_info(
        &mut self,
        req: &Smb2QueryInfoRequest,
    ) -> Result<Smb2QueryInfoResponse> {
        self.require_session()?;
        let open_file = self
            .open_files
            .get(&req.file_id)
            .ok_or(Error::InvalidHandle)?;

        if req.info_type != InfoType::File {
            return Err(Error::NotSupported(format!(
                "info type {:?}",
                req.info_type
            )));
        }

        let attributes = if open_file.is_directory {
            FileAttributes::DIRECTORY.bits()
        } else {
            FileAttributes::NORMAL.bits()
        };

        let write_basic = |buf: &mut Vec<u8>| -> Result<()> {
            WriteBytesExt::write_u64::<LittleEndian>(buf, open_file.create_time)?;
            WriteBytesExt::write_u64::<LittleEndian>(buf, open_file.write_time)?;
            WriteBytesExt::write_u64::<LittleEndian>(buf, open_file.write_time)?;
            WriteBytesExt::write_u64::<LittleEndian>(buf, open_file.write_time)?;
            WriteBytesExt::write_u32::<LittleEndian>(buf, attributes)?;
            WriteBytesExt::write_u32::<LittleEndian>(buf, 0)?; // reserved
            Ok(())
        };
        let write_standard = |buf: &mut Vec<u8>| -> Result<()> {
            WriteBytesExt::write_u64::<LittleEndian>(buf, (open_file.end_of_file + 4095) & !4095)?;
            WriteBytesExt::write_u64::<LittleEndian>(buf, open_file.end_of_file)?;
            WriteBytesExt::write_u32::<LittleEndian>(buf, 1)?; // number of links
            WriteBytesExt::write_u8(buf, u8::from(open_file.delete_on_close))?;
            WriteBytesExt::write_u8(buf, u8::from(open_file.is_directory))?;
            WriteBytesExt::write_u16::<LittleEndian>(buf, 0)?; // reserved
            Ok(())
        };

        let mut buf = Vec::new();
        match req.file_info_class {
            FileInfoClass::Basic => write_basic(&mut buf)?,
            FileInfoClass::Standard => write_standard(&mut buf)?,
            FileInfoClass::All => {
                write_basic(&mut buf)?;
                write_standard(&mut buf)?;
                WriteBytesExt::write_u64::<LittleEndian>(&mut buf, 0)?; // internal: index number
                WriteBytesExt::write_u32::<LittleEndian>(&mut buf, 0)?; // ea size
                WriteBytesExt::write_u32::<LittleEndian>(&mut buf, open_file.access.bits())?;
                WriteBytesExt::write_u64::<LittleEndian>(&mut buf, 0)?; // current byte offset
                WriteBytesExt::write_u32::<LittleEndian>(&mut buf, 0)?; // mode
                WriteBytesExt::write_u32::<LittleEndian>(&mut buf, 0)?; // alignment
                let name = open_file
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let name_bytes = crate::protocol::messages::common::encode_utf16le(&name);
                WriteBytesExt::write_u32::<LittleEndian>(&mut buf, name_bytes.len() as u32)?;
                buf.extend_from_slice(&name_bytes);
            }
            other => {
                return Err(Error::NotSupported(format!("file info class {:?}", other)));
            }
        }

        Ok(Smb2QueryInfoResponse { output_buffer: buf })
    }

    pub async fn handle_set_info(&mut self, req: &Smb2SetInfoRequest) -> Result<Smb2SetInfoResponse> {
        self.require_session()?;
        let open_file = self
            .open_files
            .get_mut(&req.file_id)
            .ok_or(Error::InvalidHandle)?;

        if req.info_type != InfoType::File {
            debug!(info_type = ?req.info_type, "set info ignored");
            return Ok(Smb2SetInfoResponse);
        }

        match req.file_info_class {
            FileInfoClass::Disposition => {
                if let Some(&flag) = req.buffer.first() {
                    open_file.delete_on_close = flag != 0;
                    debug!(
                        path = %open_file.path.display(),
                        delete_on_close = open_file.delete_on_close,
                        "set disposition"
                    );
                }
            }
            FileInfoClass::EndOfFile => {
                if req.buffer.len() >= 8 {
                    let mut cursor = std::io::Cursor::new(&req.buffer[..8]);
                    let new_size = ReadBytesExt::read_u64::<LittleEndian>(&mut cursor)?;
                    let file = open_file
                        .file
                        .as_mut()
                        .ok_or_else(|| Error::AccessDenied("truncate on a directory".into()))?;
                    file.set_len(new_size).await?;
                    open_file.end_of_file = new_size;
                }
            }
            other => {
                // Unsupported classes are ignored for client compatibility.
                debug!(class = ?other, "set info class ignored");
            }
        }

        Ok(Smb2SetInfoResponse)
    }
}

/// Match a directory search pattern: `*` matches everything, a single
/// leading `*` matches by suffix (`*.txt`), otherwise names compare
/// case-insensitively.
fn pattern_matches(pattern: &str, name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return name.to_lowercase().ends_with(&suffix.to_lowercase());
    }
    pattern.eq_ignore_ascii_case(name)
}
