//! FTP session orchestration: login handshake, feature negotiation,
//! working-directory state, and the data-transfer operations built on the
//! control stream.

use crate::commands::{self, Command};
use crate::config::SessionConfig;
use crate::control::{ControlStream, Encoding};
use crate::data::DataStream;
use crate::error::{FtpError, Result};
use crate::features::Features;
use crate::listing::{ListingStrategy, NodeInfo, NodeStream, NodeType};
use crate::reply::codes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Client name announced with `CLNT` when the server advertises it
const CLIENT_NAME: &str = "ftp-rs";

/// An FTP session: one control connection plus its negotiated state
///
/// Orchestrates the login sequence, tracks the working directory from
/// parsed `PWD` replies, and opens data streams for transfers. At most one
/// data transfer runs at a time, enforced by a capacity-1 permit.
pub struct FtpSession {
    config: Arc<SessionConfig>,
    control: Arc<ControlStream>,
    data_guard: Arc<Semaphore>,
    authenticated: bool,
    features: Features,
    strategy: ListingStrategy,
    working_directory: String,
}

impl FtpSession {
    /// Create a session in the disconnected state
    pub fn new(config: SessionConfig) -> Self {
        let config = Arc::new(config);
        Self {
            control: Arc::new(ControlStream::new(config.clone())),
            config,
            data_guard: Arc::new(Semaphore::new(1)),
            authenticated: false,
            features: Features::new(),
            strategy: ListingStrategy::default(),
            working_directory: "/".to_string(),
        }
    }

    /// Connect, authenticate, and negotiate the session
    ///
    /// Runs the full login sequence: connect (with TLS activation), USER/
    /// PASS, PBSZ/PROT on encrypted channels, FEAT, listing strategy and
    /// UTF-8 selection, TYPE, and the change into the configured base
    /// directory (created on demand). Any failure closes the session.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::NoEndpoint`] - resolution produced no usable address
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - connect or socket
    ///   failure
    /// - [`FtpError::Tls`] - TLS activation failed
    /// - [`FtpError::Protocol`] - unexpected reply anywhere in the
    ///   sequence: greeting not 220, rejected credentials, refused `OPTS`
    ///   or `TYPE`, failed base-directory change
    /// - [`FtpError::InvalidReply`] - the final `PWD` carried no quoted
    ///   path
    pub async fn login(&mut self) -> Result<()> {
        if self.control.is_open() {
            self.logout().await;
        }

        let result = self.login_sequence().await;
        if let Err(e) = &result {
            warn!("Login failed, closing session: {}", e);
            self.control.disconnect().await;
            self.authenticated = false;
        }
        result
    }

    async fn login_sequence(&mut self) -> Result<()> {
        self.control.connect().await?;

        let username = self.config.effective_username().to_string();
        let reply = self.control.send_and_read(&commands::user(&username)).await?;
        commands::require(
            &reply,
            &[codes::LOGGED_IN, codes::NEED_PASSWORD, codes::NEED_ACCOUNT],
        )?;

        let reply = self
            .control
            .send_and_read(&commands::pass(&self.config.password))
            .await?;
        commands::require(&reply, &[codes::LOGGED_IN, codes::COMMAND_SUPERFLUOUS])?;
        self.authenticated = true;
        debug!("Logged in as {}", username);

        // RFC 4217 data-channel protection; refusals are logged, not fatal
        if self.control.is_encrypted() {
            for command in [commands::pbsz(0), commands::prot('P')] {
                let reply = self.control.send_and_read(&command).await?;
                if reply.code / 100 != 2 {
                    warn!(
                        "{} refused: {} {}",
                        command.verb(),
                        reply.code,
                        reply.message
                    );
                }
            }
        }

        let reply = self.control.send_and_read(&commands::feat()).await?;
        self.features = if reply.is_success() {
            Features::parse(&commands::parse_feat_lines(&reply))
        } else {
            debug!("FEAT unsupported: {} {}", reply.code, reply.message);
            Features::new()
        };

        if self.features.has("CLNT") {
            let reply = self.control.send_and_read(&commands::clnt(CLIENT_NAME)).await?;
            if !reply.is_success() {
                debug!("CLNT refused: {} {}", reply.code, reply.message);
            }
        }

        self.strategy = if self.features.has("MLSD") {
            ListingStrategy::Mlsd
        } else {
            ListingStrategy::List
        };
        debug!("Listing strategy: {:?}", self.strategy);

        if self.control.encoding() == Encoding::Ascii && self.features.has("UTF8") {
            self.control.set_encoding(Encoding::Utf8);
            let reply = self.control.send_and_read(&commands::opts_utf8_on()).await?;
            commands::require_completion(&reply)?;
        }

        let type_command = commands::transfer_type(
            self.config.transfer_mode.type_char(),
            self.config.mode_second_type,
        );
        let reply = self.control.send_and_read(&type_command).await?;
        commands::require(&reply, &[codes::COMMAND_OK])?;

        let base = self.config.base_directory.clone();
        if base != "/" {
            self.create_directory_recursive(&base).await?;
        }
        self.change_directory(&base).await?;

        Ok(())
    }

    /// Send `QUIT` best-effort and drop the connection
    pub async fn logout(&mut self) {
        if self.control.is_open() {
            if let Err(e) = self.control.send_and_read(&commands::quit()).await {
                debug!("QUIT failed: {}", e);
            }
        }
        self.control.disconnect().await;
        self.authenticated = false;
        self.features = Features::new();
        self.strategy = ListingStrategy::default();
        self.working_directory = "/".to_string();
    }

    /// Whether the session holds an authenticated, open connection
    pub fn is_authenticated(&self) -> bool {
        self.authenticated && self.control.is_open()
    }

    /// Whether the control channel is TLS-wrapped
    pub fn is_encrypted(&self) -> bool {
        self.control.is_encrypted()
    }

    /// Probe connection liveness; a dead socket disconnects the session
    pub async fn is_connected(&mut self) -> bool {
        let alive = self.control.is_connected().await;
        if !alive {
            self.authenticated = false;
        }
        alive
    }

    /// Server-advertised features from the login FEAT exchange
    pub fn features(&self) -> &Features {
        &self.features
    }

    /// Listing strategy chosen after FEAT
    pub fn listing_strategy(&self) -> ListingStrategy {
        self.strategy
    }

    /// Cached working directory, always absolute
    pub fn working_directory(&self) -> &str {
        &self.working_directory
    }

    /// The control stream, for direct command access
    pub fn control(&self) -> Arc<ControlStream> {
        self.control.clone()
    }

    fn ensure_login(&self) -> Result<()> {
        if self.authenticated && self.control.is_open() {
            Ok(())
        } else {
            Err(FtpError::NotLoggedIn)
        }
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
        self.ensure_login()?;
        let reply = self.control.send_and_read(&commands::noop()).await?;
        commands::require_completion(&reply)
    }

    /// Change the working directory and refresh the cache from `PWD`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `CWD` was refused or `PWD` did not
    ///   answer 257
    /// - [`FtpError::InvalidReply`] - the `PWD` reply carried no quoted
    ///   path
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn change_directory(&mut self, path: &str) -> Result<()> {
        self.ensure_login()?;
        let reply = self.control.send_and_read(&commands::cwd(path)).await?;
        commands::require(&reply, &[codes::FILE_ACTION_OK])?;
        self.refresh_working_directory().await
    }

    /// Re-read the working directory from a `PWD` reply
    ///
    /// The cache is only ever set from the quoted path of a 257 reply.
    async fn refresh_working_directory(&mut self) -> Result<()> {
        let path = self
            .control
            .send_and_read_typed(&commands::pwd(), |reply| {
                commands::require(reply, &[codes::PATHNAME_CREATED])?;
                commands::parse_pwd(reply)
            })
            .await?;
        self.working_directory = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        Ok(())
    }

    /// Create a single directory
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `MKD` was refused
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn make_directory(&mut self, path: &str) -> Result<()> {
        self.ensure_login()?;
        let reply = self.control.send_and_read(&commands::mkd(path)).await?;
        commands::require(&reply, &[codes::PATHNAME_CREATED, codes::FILE_ACTION_OK])
    }

    /// Create a directory path segment by segment
    ///
    /// Walks the path with `CWD`; a 550 on a segment means it does not
    /// exist yet and triggers `MKD` + `CWD`. Other refusals skip the
    /// segment. The original working directory is restored at the end.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `MKD` on a missing segment was refused, a
    ///   freshly created segment could not be entered, or the original
    ///   working directory could not be restored
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn create_directory_recursive(&mut self, path: &str) -> Result<()> {
        self.ensure_login()?;
        let original = self.working_directory.clone();

        if path.starts_with('/') {
            let reply = self.control.send_and_read(&commands::cwd("/")).await?;
            commands::require(&reply, &[codes::FILE_ACTION_OK])?;
        }

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let reply = self.control.send_and_read(&commands::cwd(segment)).await?;
            match reply.code {
                codes::FILE_ACTION_OK => {}
                codes::FILE_UNAVAILABLE => {
                    let reply = self.control.send_and_read(&commands::mkd(segment)).await?;
                    commands::require_completion(&reply)?;
                    let reply = self.control.send_and_read(&commands::cwd(segment)).await?;
                    commands::require(&reply, &[codes::FILE_ACTION_OK])?;
                }
                code => {
                    debug!("CWD {} answered {}; skipping segment", segment, code);
                }
            }
        }

        let reply = self.control.send_and_read(&commands::cwd(&original)).await?;
        commands::require(&reply, &[codes::FILE_ACTION_OK])
    }

    /// Delete a file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `DELE` was refused
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn delete_file(&mut self, path: &str) -> Result<()> {
        self.ensure_login()?;
        let reply = self.control.send_and_read(&commands::dele(path)).await?;
        commands::require(&reply, &[codes::FILE_ACTION_OK, codes::COMMAND_OK])
    }

    /// Delete a directory, recursing into it when the server refuses
    /// because it is not empty
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `RMD` failed with something other than
    ///   550, or a nested `DELE`/`RMD`/`CWD` of the recursion was refused
    /// - [`FtpError::NoDataPort`] - no passive endpoint for the nested
    ///   listing; closes the session
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn delete_directory(&mut self, path: &str) -> Result<()> {
        self.ensure_login()?;
        let reply = self.control.send_and_read(&commands::rmd(path)).await?;
        match reply.code {
            codes::FILE_ACTION_OK | codes::COMMAND_OK => Ok(()),
            codes::FILE_UNAVAILABLE => self.delete_directory_tree(path).await,
            code => Err(FtpError::Protocol {
                code,
                message: reply.message,
            }),
        }
    }

    /// Empty a directory entry by entry, then remove it
    fn delete_directory_tree<'a>(
        &'a mut self,
        path: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let reply = self.control.send_and_read(&commands::cwd(path)).await?;
            commands::require(&reply, &[codes::FILE_ACTION_OK])?;

            let nodes = self.list_all().await?;
            for node in nodes.iter().filter(|n| n.name != "." && n.name != "..") {
                match node.node_type {
                    NodeType::Directory => self.delete_directory(&node.name).await?,
                    _ => self.delete_file(&node.name).await?,
                }
            }

            let reply = self.control.send_and_read(&commands::cwd("..")).await?;
            commands::require(&reply, &[codes::FILE_ACTION_OK])?;
            let reply = self.control.send_and_read(&commands::rmd(path)).await?;
            commands::require(&reply, &[codes::FILE_ACTION_OK, codes::COMMAND_OK])
        })
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
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `RNFR` did not answer 350, or `RNTO` did
    ///   not answer 250/226
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        self.ensure_login()?;
        let reply = self.control.send_and_read(&commands::rnfr(from)).await?;
        commands::require(&reply, &[codes::FILE_ACTION_PENDING])?;
        let reply = self.control.send_and_read(&commands::rnto(to)).await?;
        commands::require(&reply, &[codes::FILE_ACTION_OK, codes::CLOSING_DATA])
    }

    /// Size of a remote file in bytes (RFC 3659 `SIZE`)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `SIZE` did not answer 213
    /// - [`FtpError::InvalidReply`] - the 213 reply carried no byte count
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn size(&mut self, path: &str) -> Result<u64> {
        self.ensure_login()?;
        self.control
            .send_and_read_typed(&commands::size(path), |reply| {
                commands::require(reply, &[codes::FILE_STATUS])?;
                commands::parse_size(reply)
            })
            .await
    }

    /// Acquire a passive data endpoint: `EPSV`, falling back to `PASV`
    ///
    /// Both failing closes the session with [`FtpError::NoDataPort`].
    async fn passive_endpoint(&mut self) -> Result<(String, u16)> {
        let reply = self.control.send_and_read(&commands::epsv()).await?;
        if reply.code == codes::ENTERING_EXTENDED_PASSIVE {
            if let Ok(port) = commands::parse_epsv(&reply) {
                // EPSV names only the port; the host is the control peer
                let host = self
                    .control
                    .peer_addr()
                    .map(|addr| addr.ip().to_string())
                    .ok_or(FtpError::ConnectionClosed)?;
                return Ok((host, port));
            }
        }
        debug!(
            "EPSV unavailable ({} {}), trying PASV",
            reply.code, reply.message
        );

        let reply = self.control.send_and_read(&commands::pasv()).await?;
        if reply.code == codes::ENTERING_PASSIVE {
            if let Ok(endpoint) = commands::parse_pasv(&reply) {
                return Ok(endpoint);
            }
        }

        warn!("No passive mode available, closing session");
        self.control.disconnect().await;
        self.authenticated = false;
        Err(FtpError::NoDataPort(format!(
            "{} {}",
            reply.code, reply.message
        )))
    }

    /// Open the data connection and issue `command` on the control channel
    async fn open_transfer(&mut self, command: &Command) -> Result<DataStream> {
        let permit = self
            .data_guard
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FtpError::ConnectionClosed)?;

        let (host, port) = self.passive_endpoint().await?;
        let socket = self.control.open_data_socket(&host, port).await?;

        let reply = self.control.send_and_read(command).await?;
        commands::require(
            &reply,
            &[
                codes::DATA_ALREADY_OPEN,
                codes::OPENING_DATA,
                codes::CLOSING_DATA,
            ],
        )?;

        Ok(DataStream::new(socket, self.control.clone(), permit))
    }

    /// Open a remote file for reading
    ///
    /// Read the stream to EOF, then call [`DataStream::finish`] to consume
    /// the transfer's terminal reply.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `RETR` was refused
    /// - [`FtpError::NoDataPort`] - both `EPSV` and `PASV` were refused;
    ///   closes the session
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn open_read(&mut self, path: &str) -> Result<DataStream> {
        self.ensure_login()?;
        self.open_transfer(&commands::retr(path)).await
    }

    /// Open a remote file for writing
    ///
    /// The target path is the working directory joined with `name`;
    /// intermediate directories are created as needed. Write the payload,
    /// then call [`DataStream::finish`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`FtpError::NotLoggedIn`] - no authenticated session
    /// - [`FtpError::Protocol`] - `STOR` or the creation of an intermediate
    ///   directory was refused
    /// - [`FtpError::NoDataPort`] - both `EPSV` and `PASV` were refused;
    ///   closes the session
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - socket failure; forces
    ///   a disconnect
    pub async fn open_write(&mut self, name: &str) -> Result<DataStream> {
        self.ensure_login()?;
        let path = join_paths(&self.working_directory, name);
        if let Some(parent) = parent_directory(&path) {
            if parent != "/" {
                self.create_directory_recursive(&parent).await?;
            }
        }
        self.open_transfer(&commands::stor(&path)).await
    }

    /// Start a listing of the working directory, yielding entries lazily
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
    pub async fn open_list(&mut self) -> Result<NodeStream> {
        self.ensure_login()?;
        let strategy = self.strategy;
        let data = self.open_transfer(&strategy.command()).await?;
        Ok(NodeStream::new(data, strategy, self.config.timeout()))
    }

    /// List every entry of the working directory
    ///
    /// # Errors
    ///
    /// Fails like [`open_list`](Self::open_list); additionally
    /// [`FtpError::Io`] / [`FtpError::Timeout`] while reading listing
    /// lines from the data channel.
    pub async fn list_all(&mut self) -> Result<Vec<NodeInfo>> {
        let stream = self.open_list().await?;
        stream.collect_all().await
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
        self.ensure_login()?;
        let data = self.open_transfer(&commands::nlst()).await?;
        let io_timeout = self.config.timeout();

        let mut reader = BufReader::new(data);
        let mut names = Vec::new();
        loop {
            let mut raw = Vec::new();
            let n = timeout(io_timeout, reader.read_until(b'\n', &mut raw))
                .await
                .map_err(|_| FtpError::Timeout)??;
            if n == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\r', '\n']);
            if !line.is_empty() {
                names.push(line.to_string());
            }
        }
        reader.into_inner().finish().await?;
        Ok(names)
    }
}

/// Join a base directory and a name URI-style
///
/// Trailing slashes of the base and leading slashes of the name collapse
/// into a single separator.
fn join_paths(base: &str, name: &str) -> String {
    let left = base.trim_end_matches('/');
    let right = name.trim_start_matches('/');
    format!("{}/{}", left, right)
}

/// Directory part of an absolute path, `None` at the root
fn parent_directory(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    let cut = trimmed.rfind('/')?;
    if cut == 0 {
        Some("/".to_string())
    } else {
        Some(trimmed[..cut].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/", "a.txt"), "/a.txt");
        assert_eq!(join_paths("/pub/", "/a.txt"), "/pub/a.txt");
        assert_eq!(join_paths("/pub", "sub/a.txt"), "/pub/sub/a.txt");
    }

    #[test]
    fn test_parent_directory() {
        assert_eq!(parent_directory("/a/b/c.txt").as_deref(), Some("/a/b"));
        assert_eq!(parent_directory("/c.txt").as_deref(), Some("/"));
        assert!(parent_directory("/").is_none());
    }

    #[test]
    fn test_new_session_state() {
        let session = FtpSession::new(SessionConfig::anonymous("ftp.example.com"));
        assert!(!session.is_authenticated());
        assert_eq!(session.working_directory(), "/");
        assert_eq!(session.listing_strategy(), ListingStrategy::List);
        assert!(session.features().is_empty());
    }

    #[tokio::test]
    async fn test_operations_require_login() {
        let mut session = FtpSession::new(SessionConfig::anonymous("ftp.example.com"));
        assert!(matches!(
            session.noop().await,
            Err(FtpError::NotLoggedIn)
        ));
        assert!(matches!(
            session.change_directory("/pub").await,
            Err(FtpError::NotLoggedIn)
        ));
        assert!(matches!(
            session.open_read("x").await,
            Err(FtpError::NotLoggedIn)
        ));
        assert!(matches!(
            session.list_all().await,
            Err(FtpError::NotLoggedIn)
        ));
    }
}
