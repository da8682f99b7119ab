//! User-facing FTP client facade
//!
//! A thin dispatcher over [`FtpSession`]: validates arguments, gates
//! operations on login state, and forwards to the orchestrator.

use crate::config::SessionConfig;
use crate::data::DataStream;
use crate::error::{FtpError, Result};
use crate::features::Features;
use crate::listing::{sort_nodes, ListingStrategy, NodeInfo, NodeStream, SortBy, SortOrder};
use crate::session::FtpSession;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Async FTP/FTPS client
///
/// # Example
///
/// ```no_run
/// use ftp_rs::{FtpClient, SessionConfig};
///
/// # async fn example() -> Result<(), ftp_rs::FtpError> {
/// let config = SessionConfig::explicit_tls("ftp.example.com", "user", "pass");
/// let mut client = FtpClient::new(config);
/// client.login().await?;
///
/// for node in client.list_files(None).await? {
///     println!("{} ({} bytes)", node.name, node.size);
/// }
///
/// let report = client.download("report.txt").await?;
/// println!("fetched {} bytes", report.len());
///
/// client.logout().await;
/// # Ok(())
/// # }
/// ```
pub struct FtpClient {
    session: FtpSession,
}

impl FtpClient {
    /// Create a client in the disconnected state
    pub fn new(config: SessionConfig) -> Self {
        Self {
            session: FtpSession::new(config),
        }
    }

    /// Connect and run the full login/negotiation sequence
    ///
    /// A client that is already connected logs out first.
    ///
    /// # Errors
    ///
    /// Any failure during the sequence closes the session:
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - connect or socket failure
    /// - [`FtpError::Tls`] - TLS activation failed
    /// - [`FtpError::Protocol`] - unexpected reply (bad credentials, refused
    ///   TYPE, unexpected greeting, ...)
    pub async fn login(&mut self) -> Result<()> {
        self.session.login().await
    }

    /// Send `QUIT` best-effort and drop the connection
    pub async fn logout(&mut self) {
        self.session.logout().await;
    }

    /// Probe connection liveness; a dead socket disconnects the session
    pub async fn is_connected(&mut self) -> bool {
        self.session.is_connected().await
    }

    /// Whether the session holds an authenticated, open connection
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Whether the control channel is TLS-wrapped
    pub fn is_encrypted(&self) -> bool {
        self.session.is_encrypted()
    }

    /// Cached working directory, always absolute
    pub fn working_directory(&self) -> &str {
        self.session.working_directory()
    }

    /// Features the server advertised during login
    pub fn features(&self) -> &Features {
        self.session.features()
    }

    /// Listing strategy chosen after FEAT
    pub fn listing_strategy(&self) -> ListingStrategy {
        self.session.listing_strategy()
    }

    /// `NOOP` keep-alive
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - the server answered with a non-2xx reply
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn noop(&mut self) -> Result<()> {
        self.session.noop().await
    }

    /// Change the working directory
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::InvalidArgument`] - `path` is empty or `"."`
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `CWD` was refused (typically 550) or the
    ///   follow-up `PWD` did not answer 257
    /// - [`FtpError::InvalidReply`] - the `PWD` reply carried no quoted path
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn change_directory(&mut self, path: &str) -> Result<()> {
        validate_path(path)?;
        self.session.change_directory(path).await
    }

    /// Create a single directory
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::InvalidArgument`] - `path` is empty or `"."`
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `MKD` was refused (550 on an existing or
    ///   forbidden path)
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn make_directory(&mut self, path: &str) -> Result<()> {
        validate_path(path)?;
        self.session.make_directory(path).await
    }

    /// Create a directory path, creating missing segments along the way
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::InvalidArgument`] - `path` is empty or `"."`
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `MKD` on a missing segment was refused, a
    ///   freshly created segment could not be entered, or the original
    ///   working directory could not be restored
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn make_directory_recursive(&mut self, path: &str) -> Result<()> {
        validate_path(path)?;
        self.session.create_directory_recursive(path).await
    }

    /// Delete a file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::InvalidArgument`] - `path` is empty or `"."`
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `DELE` was refused (typically 550)
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn delete_file(&mut self, path: &str) -> Result<()> {
        validate_path(path)?;
        self.session.delete_file(path).await
    }

    /// Delete a directory and, if necessary, everything inside it
    ///
    /// A 550 refusal of the plain `RMD` triggers the recursive path, which
    /// lists the directory and deletes each entry first.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::InvalidArgument`] - `path` is empty or `"."`
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `RMD`, a nested `DELE`, or a traversal
    ///   `CWD` was refused
    /// - [`FtpError::NoDataPort`] - no passive endpoint for the nested
    ///   listing; closes the session
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn delete_directory(&mut self, path: &str) -> Result<()> {
        validate_path(path)?;
        self.session.delete_directory(path).await
    }

    /// Rename a file or directory
    ///
    /// # Arguments
    ///
    /// * `from` - current name or path
    /// * `to` - target name or path
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::InvalidArgument`] - either path is empty or `"."`
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `RNFR` did not answer 350, or `RNTO` did
    ///   not answer 250/226
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        validate_path(from)?;
        validate_path(to)?;
        self.session.rename(from, to).await
    }

    /// Size of a remote file in bytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::InvalidArgument`] - `path` is empty or `"."`
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `SIZE` did not answer 213
    /// - [`FtpError::InvalidReply`] - the 213 reply carried no byte count
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn size(&mut self, path: &str) -> Result<u64> {
        validate_path(path)?;
        self.session.size(path).await
    }

    /// List every entry of the working directory, optionally sorted
    ///
    /// # Arguments
    ///
    /// * `sort` - optional key and direction; `None` keeps server order
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - the listing command was refused
    /// - [`FtpError::NoDataPort`] - both `EPSV` and `PASV` were refused;
    ///   closes the session
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn list_all(
        &mut self,
        sort: Option<(SortBy, SortOrder)>,
    ) -> Result<Vec<NodeInfo>> {
        let mut nodes = self.session.list_all().await?;
        if let Some((by, order)) = sort {
            sort_nodes(&mut nodes, by, order);
        }
        Ok(nodes)
    }

    /// List regular files of the working directory, optionally sorted
    ///
    /// # Errors
    ///
    /// Same as [`list_all`](Self::list_all).
    pub async fn list_files(
        &mut self,
        sort: Option<(SortBy, SortOrder)>,
    ) -> Result<Vec<NodeInfo>> {
        let mut nodes = self.session.list_all().await?;
        nodes.retain(NodeInfo::is_file);
        if let Some((by, order)) = sort {
            sort_nodes(&mut nodes, by, order);
        }
        Ok(nodes)
    }

    /// List subdirectories of the working directory, optionally sorted
    ///
    /// # Errors
    ///
    /// Same as [`list_all`](Self::list_all).
    pub async fn list_directories(
        &mut self,
        sort: Option<(SortBy, SortOrder)>,
    ) -> Result<Vec<NodeInfo>> {
        let mut nodes = self.session.list_all().await?;
        nodes.retain(NodeInfo::is_directory);
        if let Some((by, order)) = sort {
            sort_nodes(&mut nodes, by, order);
        }
        Ok(nodes)
    }

    /// Start a lazy listing of the working directory
    ///
    /// Entries are yielded as the server sends them, without materializing
    /// the full listing.
    ///
    /// # Errors
    ///
    /// Opening the listing fails like [`list_all`](Self::list_all); errors
    /// on individual entries surface from [`NodeStream::next_node`].
    pub async fn open_list(&mut self) -> Result<NodeStream> {
        self.session.open_list().await
    }

    /// Bare entry names of the working directory (`NLST`)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `NLST` was refused
    /// - [`FtpError::NoDataPort`] - both `EPSV` and `PASV` were refused;
    ///   closes the session
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn name_list(&mut self) -> Result<Vec<String>> {
        self.session.name_list().await
    }

    /// Open a remote file for reading
    ///
    /// Read to EOF, then call [`DataStream::finish`] to consume the
    /// transfer's terminal reply.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::InvalidArgument`] - `path` is empty or `"."`
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `RETR` was refused (550 on a missing
    ///   file)
    /// - [`FtpError::NoDataPort`] - both `EPSV` and `PASV` were refused;
    ///   closes the session
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn open_read(&mut self, path: &str) -> Result<DataStream> {
        validate_path(path)?;
        self.session.open_read(path).await
    }

    /// Open a remote file for writing
    ///
    /// The target is the working directory joined with `name`; missing
    /// intermediate directories are created first.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::InvalidArgument`] - `name` is empty or `"."`
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `STOR` or the creation of an intermediate
    ///   directory was refused
    /// - [`FtpError::NoDataPort`] - both `EPSV` and `PASV` were refused;
    ///   closes the session
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn open_write(&mut self, name: &str) -> Result<DataStream> {
        validate_path(name)?;
        self.session.open_write(name).await
    }

    /// Download a remote file into memory
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use ftp_rs::FtpClient;
    /// # async fn example(client: &mut FtpClient) -> Result<(), ftp_rs::FtpError> {
    /// let bytes = client.download("pub/readme.txt").await?;
    /// println!("{} bytes", bytes.len());
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Fails like [`open_read`](Self::open_read); additionally
    /// [`FtpError::Io`] if reading the data channel fails mid-payload.
    pub async fn download(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut stream = self.open_read(path).await?;
        let mut payload = Vec::new();
        stream.read_to_end(&mut payload).await?;
        stream.finish().await?;
        Ok(payload)
    }

    /// Upload a byte slice to a remote file
    ///
    /// # Arguments
    ///
    /// * `name` - target name, joined with the working directory
    /// * `payload` - file contents to send
    ///
    /// # Errors
    ///
    /// Fails like [`open_write`](Self::open_write); additionally
    /// [`FtpError::Io`] if writing the data channel fails mid-payload.
    pub async fn upload(&mut self, name: &str, payload: &[u8]) -> Result<()> {
        let mut stream = self.open_write(name).await?;
        stream.write_all(payload).await?;
        stream.finish().await
    }
}

fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() || path == "." {
        return Err(FtpError::InvalidArgument(format!(
            "unusable path: {:?}",
            path
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;

    #[test]
    fn test_path_validation() {
        assert!(validate_path("/pub").is_ok());
        assert!(validate_path("a.txt").is_ok());
        assert!(matches!(
            validate_path(""),
            Err(FtpError::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_path("."),
            Err(FtpError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_argument_beats_login_check() {
        let mut client = FtpClient::new(SessionConfig::anonymous("ftp.example.com"));
        assert!(matches!(
            client.delete_file("").await,
            Err(FtpError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_not_logged_in() {
        let mut client = FtpClient::new(SessionConfig::anonymous("ftp.example.com"));
        assert!(matches!(
            client.size("a.txt").await,
            Err(FtpError::NotLoggedIn)
        ));
    }
}
