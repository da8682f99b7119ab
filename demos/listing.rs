//! Streaming directory listing example
//!
//! Yields entries as the server sends them instead of materializing the
//! whole listing. Run with: cargo run --example listing

use ftp_rs::{FtpClient, SessionConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = SessionConfig::anonymous(
        std::env::var("FTP_HOST").unwrap_or_else(|_| "ftp.example.com".to_string()),
    );

    let mut client = FtpClient::new(config);
    client.login().await?;

    let mut listing = client.open_list().await?;
    let mut count = 0usize;
    while let Some(node) = listing.next_node().await? {
        count += 1;
        println!("{:>12}  {}", node.size, node.name);
    }
    println!("{} entries in {}", count, client.working_directory());

    client.logout().await;
    Ok(())
}
