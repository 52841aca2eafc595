//! Integration tests for the protocol client.
//!
//! These tests verify that the client can interact with a real server over
//! TCP, backed by a file spool in a temporary directory.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{sync::Arc, time::Duration};

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio::{net::TcpListener, time::timeout};
use twmailer_common::{Identity, config::ClientTimeouts, traits::protocol::Protocol};
use twmailer_proto::{
    Mailer, MailerArgs,
    auth::StaticAuthenticator,
    client::Client,
    error::ClientError,
};
use twmailer_spool::{FileMailboxStore, MessageNumber, Subject};

/// Helper function to start a test server on a random port.
async fn start_test_server(spool: &TempDir) -> (u16, tokio::task::JoinHandle<()>) {
    let store = FileMailboxStore::builder()
        .path(spool.path())
        .build()
        .unwrap();
    store.init().unwrap();

    let authenticator = StaticAuthenticator::default()
        .with_user(identity("alice"), "secret")
        .with_user(identity("bob"), "hunter2");

    let mut args = MailerArgs::builder()
        .with_store(Arc::new(store))
        .with_authenticator(Arc::new(authenticator));
    Mailer.validate(&mut args).unwrap();

    // Bind to port 0 to get a random available port
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);

    let handle = tokio::spawn(async move {
        while let Ok((stream, peer)) = listener.accept().await {
            let shutdown_rx = shutdown_tx.subscribe();
            let session = Mailer.handle(stream, peer, args.clone());

            tokio::spawn(async move {
                let _ = timeout(Duration::from_secs(30), session.run(shutdown_rx)).await;
            });
        }
    });

    (port, handle)
}

fn identity(value: &str) -> Identity {
    Identity::parse(value).unwrap()
}

fn subject(value: &str) -> Subject {
    Subject::parse(value).unwrap()
}

fn number(value: u64) -> MessageNumber {
    MessageNumber::new(value).unwrap()
}

async fn connect(port: u16) -> Client {
    Client::connect(format!("127.0.0.1:{port}"), ClientTimeouts::default())
        .await
        .unwrap()
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_greeting() {
    let spool = TempDir::new().unwrap();
    let (port, _handle) = start_test_server(&spool).await;

    let client = connect(port).await;
    assert_eq!(client.greeting(), "Welcome to TWMailer!");
    client.quit().await.unwrap();
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_alice_sends_bob_reads() {
    let spool = TempDir::new().unwrap();
    let (port, _handle) = start_test_server(&spool).await;

    let mut alice = connect(port).await;
    assert!(alice.login(&identity("alice"), "secret").await.unwrap());
    assert!(
        alice
            .send(
                &identity("bob"),
                &subject("hi"),
                &["hello".to_string(), "world".to_string()],
            )
            .await
            .unwrap()
    );
    alice.quit().await.unwrap();

    let mut bob = connect(port).await;
    assert!(bob.login(&identity("bob"), "hunter2").await.unwrap());
    assert_eq!(bob.list().await.unwrap(), Some(vec!["hi".to_string()]));
    assert_eq!(
        bob.read(number(1)).await.unwrap(),
        Some(vec!["hello".to_string(), "world".to_string()])
    );
    assert!(bob.delete(number(1)).await.unwrap());
    assert_eq!(bob.read(number(1)).await.unwrap(), None);
    assert_eq!(bob.list().await.unwrap(), Some(Vec::new()));
    bob.quit().await.unwrap();

    let record = std::fs::read_dir(spool.path().join("bob"))
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".txt"))
        .count();
    assert_eq!(record, 0);
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_commands_refused_before_login() {
    let spool = TempDir::new().unwrap();
    let (port, _handle) = start_test_server(&spool).await;

    let mut client = connect(port).await;
    assert_eq!(client.list().await.unwrap(), None);
    assert_eq!(client.read(number(1)).await.unwrap(), None);
    assert!(!client.delete(number(1)).await.unwrap());
    assert!(
        !client
            .send(&identity("bob"), &subject("hi"), &[])
            .await
            .unwrap()
    );

    assert!(!client.login(&identity("alice"), "wrong").await.unwrap());
    assert!(client.login(&identity("alice"), "secret").await.unwrap());
    assert!(!client.login(&identity("alice"), "secret").await.unwrap());
    client.quit().await.unwrap();

    assert!(!spool.path().join("bob").exists());
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_numbering_survives_deletes() {
    let spool = TempDir::new().unwrap();
    let (port, _handle) = start_test_server(&spool).await;

    let mut client = connect(port).await;
    assert!(client.login(&identity("alice"), "secret").await.unwrap());

    for title in ["one", "two", "three"] {
        assert!(
            client
                .send(&identity("alice"), &subject(title), &[title.to_string()])
                .await
                .unwrap()
        );
    }

    assert!(client.delete(number(3)).await.unwrap());
    assert!(
        client
            .send(&identity("alice"), &subject("four"), &["four".to_string()])
            .await
            .unwrap()
    );

    assert_eq!(
        client.list().await.unwrap(),
        Some(vec!["one".to_string(), "two".to_string(), "four".to_string()])
    );
    assert_eq!(client.read(number(3)).await.unwrap(), None);
    assert_eq!(
        client.read(number(4)).await.unwrap(),
        Some(vec!["four".to_string()])
    );
    client.quit().await.unwrap();
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_body_terminator_is_refused_locally() {
    let spool = TempDir::new().unwrap();
    let (port, _handle) = start_test_server(&spool).await;

    let mut client = connect(port).await;
    assert!(client.login(&identity("alice"), "secret").await.unwrap());

    let result = client
        .send(
            &identity("bob"),
            &subject("dot"),
            &["before".to_string(), ".".to_string(), "after".to_string()],
        )
        .await;
    assert!(matches!(result, Err(ClientError::InvalidBody)));

    // Nothing was written, so the session is still usable
    assert_eq!(client.list().await.unwrap(), Some(Vec::new()));
    client.quit().await.unwrap();
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn test_concurrent_senders() {
    let spool = TempDir::new().unwrap();
    let (port, _handle) = start_test_server(&spool).await;

    let senders = (0..8).map(|i| {
        tokio::spawn(async move {
            let mut client = connect(port).await;
            assert!(client.login(&identity("alice"), "secret").await.unwrap());
            assert!(
                client
                    .send(&identity("bob"), &subject(&format!("msg {i}")), &[])
                    .await
                    .unwrap()
            );
            client.quit().await.unwrap();
        })
    });

    for sender in senders.collect::<Vec<_>>() {
        sender.await.unwrap();
    }

    let mut bob = connect(port).await;
    assert!(bob.login(&identity("bob"), "hunter2").await.unwrap());
    let subjects = bob.list().await.unwrap().unwrap();
    assert_eq!(subjects.len(), 8);
    bob.quit().await.unwrap();
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = Client::connect(format!("127.0.0.1:{port}"), ClientTimeouts::default()).await;
    assert!(matches!(result, Err(ClientError::Connection(_))));
}
