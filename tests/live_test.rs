//! Live integration tests against a real FTP server
//!
//! Disabled by default; run with:
//! `cargo test --features live-tests --test live_test`
//!
//! Environment variables:
//! - FTP_TEST_HOST (required)
//! - FTP_TEST_PORT (default: 21)
//! - FTP_TEST_USER (default: anonymous)
//! - FTP_TEST_PASS (default: empty)
//! - FTP_TEST_TLS  (set to use explicit TLS)

#![cfg(feature = "live-tests")]

use ftp_rs::{EncryptionMode, FtpClient, SessionConfig};

fn live_config() -> SessionConfig {
    let host = std::env::var("FTP_TEST_HOST").expect("FTP_TEST_HOST not set");
    let username = std::env::var("FTP_TEST_USER").unwrap_or_else(|_| "anonymous".to_string());
    let password = std::env::var("FTP_TEST_PASS").unwrap_or_default();

    let mut config = SessionConfig::new(host, username, password);
    if let Some(port) = std::env::var("FTP_TEST_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
    {
        config.port = port;
    }
    if std::env::var("FTP_TEST_TLS").is_ok() {
        config.encryption = EncryptionMode::Explicit;
    }
    config
}

#[tokio::test]
async fn test_live_login_and_list() {
    let mut client = FtpClient::new(live_config());
    client.login().await.unwrap();
    assert!(client.is_authenticated());
    assert!(client.working_directory().starts_with('/'));

    let nodes = client.list_all(None).await.unwrap();
    println!(
        "{} entries in {} via {:?}",
        nodes.len(),
        client.working_directory(),
        client.listing_strategy()
    );

    client.logout().await;
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn test_live_noop_and_liveness() {
    let mut client = FtpClient::new(live_config());
    client.login().await.unwrap();
    client.noop().await.unwrap();
    assert!(client.is_connected().await);
    client.logout().await;
}
