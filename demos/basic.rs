//! Basic FTP client example
//!
//! Run with: cargo run --example basic

use ftp_rs::{EncryptionMode, FtpClient, SessionConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Configure the FTP server
    // Replace with your actual server credentials
    let mut config = SessionConfig::new(
        std::env::var("FTP_HOST").unwrap_or_else(|_| "ftp.example.com".to_string()),
        std::env::var("FTP_USER").unwrap_or_else(|_| "anonymous".to_string()),
        std::env::var("FTP_PASS").unwrap_or_default(),
    );
    if std::env::var("FTP_TLS").is_ok() {
        config.encryption = EncryptionMode::Explicit;
    }
    if let Some(port) = std::env::var("FTP_PORT").ok().and_then(|p| p.parse().ok()) {
        config.port = port;
    }

    println!("Connecting to {}:{}...", config.host, config.port);

    let mut client = FtpClient::new(config);
    client.login().await?;
    println!(
        "Logged in. Encrypted: {}. Listing via {:?}.",
        client.is_encrypted(),
        client.listing_strategy()
    );
    println!("Working directory: {}", client.working_directory());

    // Enumerate the current directory
    let nodes = client.list_all(None).await?;
    println!("\n{} entries:", nodes.len());
    for node in nodes.iter().take(20) {
        println!("  {:>12}  {:?}  {}", node.size, node.node_type, node.name);
    }
    if nodes.len() > 20 {
        println!("  ... and {} more", nodes.len() - 20);
    }

    // Fetch the first regular file, if any
    if let Some(file) = nodes.iter().find(|n| n.is_file()) {
        println!("\nDownloading {}...", file.name);
        let payload = client.download(&file.name).await?;
        println!("Got {} bytes", payload.len());
    }

    // Close gracefully
    client.logout().await;
    println!("\nConnection closed.");

    Ok(())
}
