//! Channel behavior tests against the scripted mock server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ase_client::{Channel, Config, Connection, Credentials, Error};
use ase_protocol::package::LanguagePackage;
use ase_protocol::{MessageType, Package, Packet};
use ase_testing::fixtures;
use ase_testing::{MockServer, Script, Step};
use ase_types::Endian;

fn config(server: &MockServer) -> Config {
    Config::new()
        .host(server.host())
        .port(server.port())
        .credentials(Credentials::new("sa", "secret"))
        .packet_read_timeout(Duration::from_secs(2))
        .logout_timeout(Duration::from_secs(5))
}

async fn send_batch(channel: &Channel, batch: &str) {
    channel
        .send_package(&Package::Language(LanguagePackage::new(batch)))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_channel_setup_and_teardown() {
    let server = MockServer::start(
        Script::new()
            .receive()
            .send_header_only(1, MessageType::ProtAck),
    )
    .await
    .unwrap();

    let conn = Connection::connect(config(&server)).await.unwrap();
    let primary = conn.new_channel().await.unwrap();
    assert_eq!(primary.id(), 0);

    let channel = conn.new_channel().await.unwrap();
    assert_eq!(channel.id(), 1);
    assert_eq!(channel.current_header_type(), MessageType::Normal);

    send_batch(&channel, "select 1").await;
    channel.close().await.unwrap();
    assert!(channel.is_closed());
    assert!(matches!(
        channel.next_package(false).await,
        Err(Error::ChannelClosed { channel: 1 })
    ));
    // closing twice is a no-op
    channel.close().await.unwrap();

    conn.close().await.unwrap();
    let transcript = server.finish().await.unwrap();

    let setup = &transcript[0];
    assert!(setup.is_header_only());
    assert_eq!(setup.header.message_type, MessageType::Setup);
    assert_eq!(setup.header.channel, 1);
    assert_eq!(setup.header.length, 8);

    let batch = &transcript[1];
    assert_eq!(batch.header.message_type, MessageType::Normal);
    assert_eq!(batch.header.channel, 1);
    assert_eq!(batch.header.packet_nr, 1);

    let teardown = &transcript[2];
    assert!(teardown.is_header_only());
    assert_eq!(teardown.header.message_type, MessageType::Close);
    assert_eq!(teardown.header.packet_nr, 2);

    let logout = &transcript[3];
    assert_eq!(logout.header.channel, 0);
    assert_eq!(logout.header.packet_nr, 0);
}

#[tokio::test]
async fn test_synthetic_final_done() {
    let server = MockServer::start(
        Script::new()
            .receive()
            .send(0, vec![fixtures::eed(208, "t not found", false)])
            .receive()
            .send(
                0,
                vec![fixtures::eed(5701, "changed database", true), fixtures::done()],
            ),
    )
    .await
    .unwrap();

    let conn = Connection::connect(config(&server)).await.unwrap();
    let channel = conn.primary_channel().await.unwrap();

    let errors = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&errors);
    channel.register_eed_hook(move |eed| seen.lock().unwrap().push(eed.msg_number));

    send_batch(&channel, "select * from t").await;
    assert!(matches!(channel.next_package(true).await.unwrap(), Package::Eed(_)));
    // the message ended without a final done
    assert!(channel.next_package(true).await.unwrap().is_done_final());

    send_batch(&channel, "use master").await;
    // the info message is swallowed and no second done is made up
    assert!(channel.next_package(true).await.unwrap().is_done_final());
    assert!(matches!(
        channel.next_package(false).await,
        Err(Error::NoPackageReady)
    ));

    assert_eq!(errors.lock().unwrap().as_slice(), &[208]);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_final_done_is_tracked_per_message() {
    let server = MockServer::start(
        Script::new()
            .receive()
            .send(0, vec![fixtures::done()])
            .receive()
            .send(0, vec![fixtures::eed(5701, "changed database", true)]),
    )
    .await
    .unwrap();

    let conn = Connection::connect(config(&server)).await.unwrap();
    let channel = conn.primary_channel().await.unwrap();

    send_batch(&channel, "select 1").await;
    assert!(channel.next_package(true).await.unwrap().is_done_final());

    // the previous message's done does not count for this one
    send_batch(&channel, "use master").await;
    let done = tokio::time::timeout(Duration::from_secs(2), channel.next_package(true))
        .await
        .expect("no done for second message")
        .unwrap();
    assert!(done.is_done_final());
    assert!(matches!(
        channel.next_package(false).await,
        Err(Error::NoPackageReady)
    ));

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_next_package_until_collects_eeds() {
    let server = MockServer::start(
        Script::new()
            .receive()
            .send(
                0,
                vec![
                    fixtures::eed(207, "Invalid column name", false),
                    fixtures::login_ack(ase_protocol::package::LoginAckStatus::Succeed),
                    fixtures::done(),
                ],
            )
            .receive()
            .send(0, vec![fixtures::eed(102, "Incorrect syntax", false), fixtures::done()]),
    )
    .await
    .unwrap();

    let conn = Connection::connect(config(&server)).await.unwrap();
    let channel = conn.primary_channel().await.unwrap();

    send_batch(&channel, "select nope").await;
    let mut seen = Vec::new();
    let err = channel
        .next_package_until(true, |package| {
            seen.push(package.name());
            Err(Error::Login("stop".into()))
        })
        .await
        .unwrap_err();

    // only the first non-EED package reached the callback, the rest was drained
    assert_eq!(seen, vec!["LoginAck"]);
    let Error::Server(eed) = err else {
        panic!("expected server error, got {err}");
    };
    assert_eq!(eed.packages.len(), 1);
    assert!(matches!(eed.source.as_deref(), Some(Error::Processing(_))));

    send_batch(&channel, "select 1").await;
    let done = channel
        .next_package_until(true, |package| Ok(package.is_done_final()))
        .await
        .unwrap();
    assert!(done.is_done_final());

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_eof_from_processing_function() {
    let server = MockServer::start(
        Script::new()
            .receive()
            .send(0, vec![fixtures::done()]),
    )
    .await
    .unwrap();

    let conn = Connection::connect(config(&server)).await.unwrap();
    let channel = conn.primary_channel().await.unwrap();

    send_batch(&channel, "select 1").await;
    let err = channel
        .next_package_until(true, |_| Err(Error::eof()))
        .await
        .unwrap_err();
    let Error::Eof(Some(package)) = err else {
        panic!("expected EOF with package, got {err}");
    };
    assert!(package.is_done_final());

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_packet_for_unknown_channel() {
    let server = MockServer::start(
        Script::new()
            .receive()
            .step(Step::SendPackets(vec![Packet::header_only(
                MessageType::Normal,
                7,
            )]))
            .receive()
            .send(0, vec![fixtures::done()]),
    )
    .await
    .unwrap();

    let conn = Connection::connect(config(&server)).await.unwrap();
    let channel = conn.primary_channel().await.unwrap();

    send_batch(&channel, "select 1").await;
    let err = channel.next_package(true).await.unwrap_err();
    let Error::Connection(inner) = &err else {
        panic!("expected connection error, got {err}");
    };
    assert!(matches!(inner.as_ref(), Error::UnknownChannel(7)));
    assert!(!err.is_fatal());

    // the connection keeps working
    send_batch(&channel, "select 2").await;
    assert!(channel.next_package(true).await.unwrap().is_done_final());

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_server_closing_connection_is_fatal() {
    let server = MockServer::start(Script::new().receive().close())
        .await
        .unwrap();

    let conn = Connection::connect(config(&server)).await.unwrap();
    let channel = conn.primary_channel().await.unwrap();

    send_batch(&channel, "select 1").await;
    let err = channel.next_package(true).await.unwrap_err();
    assert!(err.is_fatal(), "{err}");
    assert!(conn.is_closed());
    assert!(matches!(
        conn.new_channel().await,
        Err(Error::Connection(_))
    ));
}

#[tokio::test]
async fn test_close_reports_unconsumed_packages() {
    let server = MockServer::start(
        Script::new()
            .receive()
            .send_header_only(1, MessageType::ProtAck)
            .receive()
            .send(1, vec![fixtures::done()]),
    )
    .await
    .unwrap();

    let conn = Connection::connect(config(&server)).await.unwrap();
    let _primary = conn.new_channel().await.unwrap();
    let channel = conn.new_channel().await.unwrap();

    send_batch(&channel, "select 1").await;
    // let the response arrive before closing
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = channel.close().await.unwrap_err();
    assert!(matches!(err, Error::PackageStillQueued(_)), "{err}");

    conn.close().await.unwrap();
    let transcript = server.finish().await.unwrap();
    let logout = transcript.last().unwrap().packages(Endian::Little).unwrap();
    assert!(matches!(logout.as_slice(), [Package::Logout(_)]));
}

#[tokio::test]
async fn test_cancelled_wait() {
    let server = MockServer::start(Script::new()).await.unwrap();

    let conn = Connection::connect(config(&server)).await.unwrap();
    let channel = conn.primary_channel().await.unwrap();

    let cancel = tokio_util::sync::CancellationToken::new();
    cancel.cancel();
    assert!(matches!(
        channel.next_package_with_cancel(true, &cancel).await,
        Err(Error::Cancelled)
    ));

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_close_releases_blocked_receiver() {
    let server = MockServer::start(
        Script::new()
            .receive()
            .send_header_only(1, MessageType::ProtAck)
            // the teardown is never acknowledged
            .receive()
            .step(Step::Pause(Duration::from_millis(500))),
    )
    .await
    .unwrap();

    let conn = Connection::connect(config(&server).packet_read_timeout(Duration::from_millis(200)))
        .await
        .unwrap();
    let _primary = conn.new_channel().await.unwrap();
    let channel = conn.new_channel().await.unwrap();

    let waiter = channel.clone();
    let blocked = tokio::spawn(async move { waiter.next_package(true).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(2), channel.close())
        .await
        .expect("close waited on the blocked receiver")
        .unwrap();
    assert!(matches!(
        blocked.await.unwrap(),
        Err(Error::ChannelClosed { channel: 1 })
    ));

    conn.close().await.unwrap();
}
