//! Login negotiation tests against the scripted mock server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ase_client::{Config, Connection, Credentials, Error, LoginConfig, RemoteServer};
use ase_protocol::package::{
    CapabilityPackage, CapabilityType, EnvChangeType, LanguagePackage, LoginAckStatus, MsgId,
    MsgPackage, MsgStatus, RequestCapability, ResponseCapability,
};
use ase_protocol::{FieldData, MessageType, Package, PacketQueue, PacketSize, Token};
use ase_testing::fixtures::{self, ServerKey};
use ase_testing::{MockServer, Script, Step};
use ase_types::{Endian, SqlValue};

fn config(server: &MockServer) -> Config {
    Config::new()
        .host(server.host())
        .port(server.port())
        .credentials(Credentials::new("sa", "secret"))
        .client_hostname("testhost")
        .packet_read_timeout(Duration::from_secs(2))
        .logout_timeout(Duration::from_secs(5))
}

fn record_len(login: &LoginConfig) -> usize {
    login.record().encode(Endian::Little).unwrap().len()
}

fn binary(field: &FieldData) -> &[u8] {
    match &field.value {
        SqlValue::Binary(bytes) => bytes,
        other => panic!("expected binary parameter, got {other:?}"),
    }
}

#[tokio::test]
async fn test_encrypted_login() {
    let key = ServerKey::generate().unwrap();
    let mut success = vec![fixtures::packet_size_change(512, 2048)];
    success.extend(fixtures::login_success(CapabilityPackage::client_default()));

    let server = MockServer::start(
        Script::new()
            .receive()
            .send(0, key.negotiation().unwrap())
            .receive()
            .send(0, success),
    )
    .await
    .unwrap();

    let config = config(&server);
    let login = LoginConfig::new(&config).remote_server(RemoteServer::new("REMOTE", "remotepw"));
    let conn = Connection::connect(config).await.unwrap();
    let channel = conn.primary_channel().await.unwrap();

    let changes = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&changes);
    channel.register_env_change_hook(move |kind, old, new| {
        seen.lock().unwrap().push((kind, old.to_string(), new.to_string()));
    });

    channel.login(&login).await.unwrap();
    assert_eq!(conn.packet_size(), 2048);
    assert_eq!(
        changes.lock().unwrap().as_slice(),
        &[(EnvChangeType::PacketSize, "512".to_string(), "2048".to_string())]
    );

    // Fits a single packet only with the negotiated size.
    let batch = format!("select '{}'", "x".repeat(1000));
    channel
        .send_package(&Package::Language(LanguagePackage::new(&batch)))
        .await
        .unwrap();

    conn.close().await.unwrap();
    let transcript = server.finish().await.unwrap();

    let record = &transcript[0];
    assert_eq!(record.header.message_type, MessageType::Login);
    let after_record = record.packages_from(record_len(&login), Endian::Little).unwrap();
    assert!(matches!(after_record.as_slice(), [Package::Capability(_)]));

    let secrets = transcript[1].packages(Endian::Little).unwrap();
    assert_eq!(secrets.len(), 9);
    let msg_ids: Vec<_> = secrets
        .iter()
        .filter_map(|p| match p {
            Package::Msg(msg) => Some(*msg),
            _ => None,
        })
        .collect();
    assert_eq!(
        msg_ids,
        vec![
            MsgPackage::new(MsgStatus::HasArgs, MsgId::SecLogPwd3),
            MsgPackage::new(MsgStatus::HasArgs, MsgId::SecRemPwd3),
            MsgPackage::new(MsgStatus::HasArgs, MsgId::SecSymKey),
        ]
    );

    let Package::Params(password) = &secrets[2] else {
        panic!("expected password parameters, got {}", secrets[2]);
    };
    assert_eq!(key.decrypt(binary(&password.fields[0])).unwrap(), b"secret");

    let Package::Params(remote) = &secrets[5] else {
        panic!("expected remote server parameters, got {}", secrets[5]);
    };
    assert_eq!(remote.fields.len(), 4);
    assert_eq!(key.decrypt(binary(&remote.fields[1])).unwrap(), b"secret");
    assert_eq!(remote.fields[2].value, SqlValue::String("REMOTE".to_string()));
    assert_eq!(key.decrypt(binary(&remote.fields[3])).unwrap(), b"remotepw");

    let Package::Params(symmetric) = &secrets[8] else {
        panic!("expected symmetric key parameters, got {}", secrets[8]);
    };
    assert_eq!(key.decrypt(binary(&symmetric.fields[0])).unwrap().len(), 32);

    let language = &transcript[2];
    assert_eq!(language.headers.len(), 1);
    assert!(usize::from(language.header.length) > 512);

    let logout = transcript[3].packages(Endian::Little).unwrap();
    assert!(matches!(logout.as_slice(), [Package::Logout(_)]));
}

async fn encrypted_login(success: Step) -> (Connection, Result<(), Error>) {
    let key = ServerKey::generate().unwrap();
    let server = MockServer::start(
        Script::new()
            .receive()
            .send(0, key.negotiation().unwrap())
            .receive()
            .step(success),
    )
    .await
    .unwrap();

    let config = config(&server);
    let login = LoginConfig::new(&config);
    let conn = Connection::connect(config).await.unwrap();
    let channel = conn.primary_channel().await.unwrap();
    let result = channel.login(&login).await;
    (conn, result)
}

#[tokio::test]
async fn test_login_adopts_echoed_capabilities() {
    let echo = CapabilityPackage::new(
        &[RequestCapability::Lang, RequestCapability::Dynf],
        &[ResponseCapability::ResNoTdscontrol],
        &[],
    )
    .unwrap();
    assert_ne!(echo, CapabilityPackage::client_default());

    let success = Step::Send {
        channel: 0,
        message_type: MessageType::Normal,
        packages: fixtures::login_success(echo.clone()),
    };
    let (conn, result) = encrypted_login(success).await;
    result.unwrap();

    let adopted = conn.capabilities();
    for kind in [CapabilityType::Request, CapabilityType::Response] {
        assert_eq!(adopted.mask(kind).to_bytes(), echo.mask(kind).to_bytes(), "{kind:?}");
    }
    assert!(adopted.has_request(RequestCapability::Dynf));
    assert!(!adopted.has_request(RequestCapability::Mstmt));

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_login_fails_when_requested_category_is_empty() {
    // The package writer leaves out empty categories, so the echo is
    // written by hand: an all-zero request mask next to the usual response
    // mask.
    let response = CapabilityPackage::client_default().response.to_bytes();
    let empty_request = [0u8; 14];

    let mut queue = PacketQueue::new(PacketSize::default(), Endian::Little);
    fixtures::login_ack(LoginAckStatus::Succeed)
        .encode(&mut queue)
        .unwrap();
    queue.write_u8(Token::Capability.as_u8());
    queue.write_u16((4 + empty_request.len() + response.len()) as u16);
    for (kind, mask) in [
        (CapabilityType::Request, &empty_request[..]),
        (CapabilityType::Response, &response[..]),
    ] {
        queue.write_u8(kind as u8);
        queue.write_u8(mask.len() as u8);
        queue.write_bytes(mask);
    }
    fixtures::done().encode(&mut queue).unwrap();

    let (conn, result) = encrypted_login(Step::SendPackets(queue.take_packets(true))).await;
    assert!(
        matches!(result, Err(Error::CapabilityRejected(CapabilityType::Request))),
        "{result:?}"
    );
    // the connection keeps its own request set
    assert!(conn.capabilities().has_request(RequestCapability::Mstmt));
}

#[tokio::test]
async fn test_plain_login() {
    let server = MockServer::start(
        Script::new()
            .receive()
            .send(0, vec![fixtures::login_ack(LoginAckStatus::Succeed), fixtures::done()]),
    )
    .await
    .unwrap();

    let config = config(&server);
    let login = LoginConfig::new(&config).encryption(None);
    let conn = Connection::connect(config).await.unwrap();
    let channel = conn.primary_channel().await.unwrap();

    channel.login(&login).await.unwrap();
    conn.close().await.unwrap();

    let transcript = server.finish().await.unwrap();
    let payload = &transcript[0].payload;
    // hostname and username slots precede the password slot
    assert_eq!(&payload[62..68], b"secret");
    assert_eq!(payload[92], 6);
}

#[tokio::test]
async fn test_requested_encryption_below_level_four_is_rejected() {
    let server = MockServer::start(Script::new()).await.unwrap();

    let config = config(&server);
    let login = LoginConfig::new(&config).encryption(Some(MsgId::SecEncrypt2));
    let conn = Connection::connect(config).await.unwrap();
    let channel = conn.primary_channel().await.unwrap();

    let err = channel.login(&login).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedEncryption(MsgId::SecEncrypt2)));

    conn.close().await.unwrap();
    let transcript = server.finish().await.unwrap();
    // nothing but the logout went over the wire
    assert_eq!(transcript.len(), 1);
}

#[tokio::test]
async fn test_server_offering_older_encryption_fails_login() {
    let server = MockServer::start(Script::new().receive().send(
        0,
        vec![
            fixtures::login_ack(LoginAckStatus::Negotiate),
            Package::Msg(MsgPackage::new(MsgStatus::HasArgs, MsgId::SecEncrypt3)),
            fixtures::done(),
        ],
    ))
    .await
    .unwrap();

    let config = config(&server);
    let login = LoginConfig::new(&config);
    let conn = Connection::connect(config).await.unwrap();
    let channel = conn.primary_channel().await.unwrap();

    let err = channel.login(&login).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedEncryption(MsgId::SecEncrypt3)));
}

#[tokio::test]
async fn test_failed_login_ack() {
    let server = MockServer::start(Script::new().receive().send(
        0,
        vec![
            fixtures::eed(4002, "Login failed.", false),
            fixtures::login_ack(LoginAckStatus::Fail),
            fixtures::done(),
        ],
    ))
    .await
    .unwrap();

    let config = config(&server);
    let login = LoginConfig::new(&config).encryption(None);
    let conn = Connection::connect(config).await.unwrap();
    let channel = conn.primary_channel().await.unwrap();

    let err = channel.login(&login).await.unwrap_err();
    // the error message arrives before the acknowledgment
    assert!(matches!(
        err,
        Error::UnexpectedPackage {
            expected: "LoginAck",
            ..
        }
    ));
}
