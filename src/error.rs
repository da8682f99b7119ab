//! FTP error types

use thiserror::Error;

/// FTP protocol and connection errors
#[derive(Error, Debug)]
pub enum FtpError {
    /// IO error during network operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS error during secure connection
    #[error("TLS error: {0}")]
    Tls(String),

    /// Connection or read/write timeout
    #[error("Connection timeout")]
    Timeout,

    /// Reply failed structural parsing (bad status line, missing PWD quotes,
    /// malformed PASV host/port group, ...)
    #[error("Invalid reply: {0}")]
    InvalidReply(String),

    /// Unexpected reply code for a command that requires a specific outcome
    #[error("FTP error {code}: {message}")]
    Protocol {
        /// FTP reply code (e.g., 530, 550)
        code: u16,
        /// Error message from server
        message: String,
    },

    /// Malformed caller input: empty path, "." path, bad configuration
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation issued before a successful login
    #[error("Not logged in")]
    NotLoggedIn,

    /// Both EPSV and PASV were refused; no passive data port available
    #[error("No data port: {0}")]
    NoDataPort(String),

    /// Name resolution produced no address matching the IP-version preference
    #[error("No usable address for {0}")]
    NoEndpoint(String),

    /// Connection closed unexpectedly
    #[error("Connection closed")]
    ConnectionClosed,
}

impl FtpError {
    /// Whether this error forces the session into the disconnected state.
    ///
    /// Protocol and parse failures leave the connection usable; socket and
    /// TLS failures do not.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FtpError::Io(_) | FtpError::Tls(_) | FtpError::Timeout | FtpError::ConnectionClosed
        )
    }
}

/// Result type alias using FtpError
pub type Result<T> = std::result::Result<T, FtpError>;
