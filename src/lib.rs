#![doc = include_str!("../README.md")]

mod client;
/// FTP command builders and reply extractors
pub mod commands;
mod config;
/// Control channel: socket ownership, round trips, TLS activation
pub mod control;
mod data;
mod error;
mod features;
/// Directory listing decoding (MLSD and Unix LIST)
pub mod listing;
/// FTP reply types and status codes
pub mod reply;
mod resolver;
mod session;

pub use client::FtpClient;
pub use commands::Command;
pub use config::{
    ClientIdentity, EncryptionMode, IpVersion, SessionConfig, TlsVersions, TransferMode,
};
pub use control::{ControlStream, Encoding};
pub use data::DataStream;
pub use error::{FtpError, Result};
pub use features::Features;
pub use listing::{
    sort_nodes, ListingStrategy, NodeInfo, NodeStream, NodeType, SortBy, SortOrder,
};
pub use reply::{codes, FtpReply};
pub use session::FtpSession;
