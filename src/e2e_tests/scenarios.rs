//! End-to-end scenarios against a live server task

use super::smb2_client::TestClient;
use super::{TestServer, TEST_PASSWORD, TEST_SHARE, TEST_USER};
use crate::error::NtStatus;
use crate::protocol::constants::{CreateOptions, Smb2Command, Smb2Dialect};
use crate::protocol::messages::common::decode_utf16le;
use crate::protocol::messages::file_ops::Smb2CreateRequest;
use crate::protocol::messages::SmbMessage;

async fn authenticated_client(server: &TestServer) -> TestClient {
    let mut client = TestClient::connect(server.addr).await.unwrap();
    client.negotiate().await.unwrap();
    let status = client.authenticate(TEST_USER, TEST_PASSWORD).await.unwrap();
    assert_eq!(status, NtStatus::Success as u32);
    client
}

#[tokio::test]
async fn integration_share_read_scenario() {
    let server = TestServer::start().await.unwrap();
    std::fs::write(server.share_root.path().join("a.txt"), b"hello").unwrap();

    let mut client = TestClient::connect(server.addr).await.unwrap();

    let negotiate = client.negotiate().await.unwrap();
    assert_eq!(negotiate.dialect_revision, Smb2Dialect::Smb210);

    let status = client.authenticate(TEST_USER, TEST_PASSWORD).await.unwrap();
    assert_eq!(status, NtStatus::Success as u32);

    let status = client.tree_connect(TEST_SHARE).await.unwrap();
    assert_eq!(status, NtStatus::Success as u32);

    let (status, create) = client
        .create(&Smb2CreateRequest::open_read("a.txt".into()))
        .await
        .unwrap();
    assert_eq!(status, NtStatus::Success as u32);
    let create = create.unwrap();
    assert_eq!(create.end_of_file, 5);

    let data = client.read(create.file_id, 0, 1024).await.unwrap();
    assert_eq!(data, b"hello");

    let status = client.close_file(create.file_id).await.unwrap();
    assert_eq!(status, NtStatus::Success as u32);

    let status = client.logoff().await.unwrap();
    assert_eq!(status, NtStatus::Success as u32);

    client.close().await.unwrap();
    server.stop();
}

#[tokio::test]
async fn wrong_password_rejected() {
    let server = TestServer::start().await.unwrap();

    let mut client = TestClient::connect(server.addr).await.unwrap();
    client.negotiate().await.unwrap();

    let status = client.authenticate(TEST_USER, "not-the-password").await.unwrap();
    assert_eq!(status, NtStatus::LogonFailure as u32);

    // The connection survives; a second attempt with the right
    // password succeeds.
    let status = client.authenticate(TEST_USER, TEST_PASSWORD).await.unwrap();
    assert_eq!(status, NtStatus::Success as u32);

    client.close().await.unwrap();
    server.stop();
}

#[tokio::test]
async fn unknown_user_rejected() {
    let server = TestServer::start().await.unwrap();

    let mut client = TestClient::connect(server.addr).await.unwrap();
    client.negotiate().await.unwrap();

    let status = client.authenticate("nobody", TEST_PASSWORD).await.unwrap();
    assert_eq!(status, NtStatus::LogonFailure as u32);

    server.stop();
}

#[tokio::test]
async fn unknown_share_not_found() {
    let server = TestServer::start().await.unwrap();
    let mut client = authenticated_client(&server).await;

    let status = client.tree_connect("NOSUCHSHARE").await.unwrap();
    assert_eq!(status, NtStatus::BadNetworkName as u32);

    // Session still works: the real share connects fine afterwards.
    let status = client.tree_connect(TEST_SHARE).await.unwrap();
    assert_eq!(status, NtStatus::Success as u32);

    server.stop();
}

#[tokio::test]
async fn write_roundtrip_across_sessions() {
    let server = TestServer::start().await.unwrap();

    // First connection writes the file.
    {
        let mut client = authenticated_client(&server).await;
        client.tree_connect(TEST_SHARE).await.unwrap();

        let (status, create) = client
            .create(&Smb2CreateRequest::create_write("roundtrip.bin".into()))
            .await
            .unwrap();
        assert_eq!(status, NtStatus::Success as u32);
        let create = create.unwrap();

        let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let written = client.write(create.file_id, 0, &payload).await.unwrap();
        assert_eq!(written as usize, payload.len());

        client.close_file(create.file_id).await.unwrap();
        client.close().await.unwrap();
    }

    // A fresh connection reads the identical bytes back.
    {
        let mut client = authenticated_client(&server).await;
        client.tree_connect(TEST_SHARE).await.unwrap();

        let (_, create) = client
            .create(&Smb2CreateRequest::open_read("roundtrip.bin".into()))
            .await
            .unwrap();
        let create = create.unwrap();
        assert_eq!(create.end_of_file, 10_000);

        let mut data = Vec::new();
        // Read in two chunks to exercise offsets.
        data.extend(client.read(create.file_id, 0, 4096).await.unwrap());
        data.extend(
            client
                .read(create.file_id, data.len() as u64, 10_000)
                .await
                .unwrap(),
        );

        let expected: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        assert_eq!(data, expected);

        client.close_file(create.file_id).await.unwrap();
        client.close().await.unwrap();
    }

    server.stop();
}

#[tokio::test]
async fn path_traversal_always_denied() {
    let server = TestServer::start().await.unwrap();
    let mut client = authenticated_client(&server).await;
    client.tree_connect(TEST_SHARE).await.unwrap();

    for path in ["..\\secret.txt", "..\\..\\etc\\passwd", "a\\..\\..\\b.txt"] {
        let (status, _) = client
            .create(&Smb2CreateRequest::open_read(path.into()))
            .await
            .unwrap();
        assert_eq!(status, NtStatus::AccessDenied as u32, "path {:?}", path);
    }

    server.stop();
}

#[tokio::test]
async fn double_close_reports_invalid_handle() {
    let server = TestServer::start().await.unwrap();
    std::fs::write(server.share_root.path().join("a.txt"), b"hello").unwrap();

    let mut client = authenticated_client(&server).await;
    client.tree_connect(TEST_SHARE).await.unwrap();

    let (_, create) = client
        .create(&Smb2CreateRequest::open_read("a.txt".into()))
        .await
        .unwrap();
    let file_id = create.unwrap().file_id;

    assert_eq!(
        client.close_file(file_id).await.unwrap(),
        NtStatus::Success as u32
    );
    assert_eq!(
        client.close_file(file_id).await.unwrap(),
        NtStatus::InvalidHandle as u32
    );

    // The connection is still healthy after the failed close.
    let (status, _) = client
        .create(&Smb2CreateRequest::open_read("a.txt".into()))
        .await
        .unwrap();
    assert_eq!(status, NtStatus::Success as u32);

    server.stop();
}

#[tokio::test]
async fn directory_listing_contains_files() {
    let server = TestServer::start().await.unwrap();
    std::fs::write(server.share_root.path().join("a.txt"), b"hello").unwrap();
    std::fs::write(server.share_root.path().join("b.txt"), b"world").unwrap();

    let mut client = authenticated_client(&server).await;
    client.tree_connect(TEST_SHARE).await.unwrap();

    let mut open_dir = Smb2CreateRequest::open_read(String::new());
    open_dir.create_options = CreateOptions::FILE_DIRECTORY_FILE;
    let (status, create) = client.create(&open_dir).await.unwrap();
    assert_eq!(status, NtStatus::Success as u32);
    let file_id = create.unwrap().file_id;

    let (status, listing) = client.query_directory(file_id).await.unwrap();
    assert_eq!(status, NtStatus::Success as u32);

    // The UTF-16 names appear in the listing buffer.
    let haystack = decode_utf16le(&listing);
    assert!(haystack.contains("a.txt"));
    assert!(haystack.contains("b.txt"));

    // The enumeration then reports completion.
    let (status, _) = client.query_directory(file_id).await.unwrap();
    assert_eq!(status, NtStatus::NoMoreFiles as u32);

    client.close_file(file_id).await.unwrap();
    server.stop();
}

#[tokio::test]
async fn unsupported_command_keeps_connection_alive() {
    let server = TestServer::start().await.unwrap();
    std::fs::write(server.share_root.path().join("a.txt"), b"hello").unwrap();

    let mut client = authenticated_client(&server).await;
    client.tree_connect(TEST_SHARE).await.unwrap();

    // Lock is out of scope; the server answers with an error instead
    // of dropping the connection.
    let (header, _) = client
        .request(Smb2Command::Lock, &[48u8, 0, 0, 0])
        .await
        .unwrap();
    assert_eq!(header.status, NtStatus::NotSupported as u32);

    let (status, _) = client
        .create(&Smb2CreateRequest::open_read("a.txt".into()))
        .await
        .unwrap();
    assert_eq!(status, NtStatus::Success as u32);

    server.stop();
}

#[tokio::test]
async fn echo_keepalive() {
    let server = TestServer::start().await.unwrap();
    let mut client = authenticated_client(&server).await;

    let body = crate::protocol::messages::session::Smb2Logoff.serialize().unwrap();
    let (header, _) = client.request(Smb2Command::Echo, &body).await.unwrap();
    assert_eq!(header.status, NtStatus::Success as u32);

    server.stop();
}

#[tokio::test]
async fn concurrent_connections_are_independent() {
    let server = TestServer::start().await.unwrap();
    std::fs::write(server.share_root.path().join("a.txt"), b"hello").unwrap();

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let addr = server.addr;
        tasks.push(tokio::spawn(async move {
            let mut client = TestClient::connect(addr).await.unwrap();
            client.negotiate().await.unwrap();
            let status = client.authenticate(TEST_USER, TEST_PASSWORD).await.unwrap();
            assert_eq!(status, NtStatus::Success as u32);
            client.tree_connect(TEST_SHARE).await.unwrap();

            let (_, create) = client
                .create(&Smb2CreateRequest::open_read("a.txt".into()))
                .await
                .unwrap();
            let file_id = create.unwrap().file_id;
            let data = client.read(file_id, 0, 64).await.unwrap();
            assert_eq!(data, b"hello");
            client.close_file(file_id).await.unwrap();
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    server.stop();
}
