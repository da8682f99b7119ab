//! FTP control channel: socket ownership, command/reply round trips, TLS
//! activation, and the liveness probe.
//!
//! The control stream is deliberately a concrete struct with a narrow
//! surface rather than a general byte-stream implementation: it reads
//! replies, writes command lines, hands out data sockets, and nothing else.
//!
//! Lock discipline: `send_lock` serializes a full command/reply round trip;
//! the `wire` mutex guards the socket itself and doubles as the receive
//! lock. Reading a terminal reply after a data transfer takes only the
//! `wire` mutex, so it cannot deadlock against a queued sender.

use crate::commands::{self, Command};
use crate::config::{EncryptionMode, SessionConfig, TlsVersions};
use crate::error::{FtpError, Result};
use crate::reply::{codes, FtpReply};
use crate::resolver;
use socket2::SockRef;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Interest, ReadBuf,
};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::crypto::{ring, CryptoProvider};
use tokio_rustls::rustls::pki_types::{
    CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName, UnixTime,
};
use tokio_rustls::rustls::{
    self, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};
use tokio_rustls::TlsConnector;
use tracing::{debug, trace, warn};

/// Wire encoding negotiated for command lines and listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// 7-bit ASCII, the RFC 959 default
    #[default]
    Ascii,
    /// UTF-8 after `OPTS UTF8 ON` (RFC 2640)
    Utf8,
}

/// Probe the socket only when this much time passed since the last exchange
const SOCKET_POLL_INTERVAL: Duration = Duration::from_secs(15);
/// How long the liveness probe waits for the socket to become readable
const LIVENESS_PROBE_TIMEOUT: Duration = Duration::from_millis(500);
/// Upper bound on consuming one stale reply before a fresh command
const STALE_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);
/// Reply buffering; listings and replies are small compared to payloads
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Either side of the TLS upgrade, one reader/writer behind one type
pub(crate) enum WireStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl WireStream {
    fn tcp(&self) -> &TcpStream {
        match self {
            WireStream::Plain(stream) => stream,
            WireStream::Tls(stream) => stream.get_ref().0,
        }
    }
}

impl AsyncRead for WireStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            WireStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            WireStream::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for WireStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            WireStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            WireStream::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            WireStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            WireStream::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            WireStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            WireStream::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Certificate verifier that accepts anything
///
/// **Security warning:** disables all certificate validation. Installed
/// only when the configuration sets `ignore_certificate_errors`.
#[derive(Debug)]
struct InsecureCertVerifier;

impl ServerCertVerifier for InsecureCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
            SignatureScheme::ED448,
        ]
    }
}

/// Reusable TLS client state shared between control and data sockets
#[derive(Clone)]
struct TlsContext {
    connector: TlsConnector,
    server_name: ServerName<'static>,
}

struct Wire {
    stream: Option<BufReader<WireStream>>,
}

/// Forces a disconnect when a round trip is dropped with partial protocol
/// state on the wire
///
/// Armed once command bytes may have left the buffer, disarmed once the
/// reply is fully read (or the failure already tore the connection down).
/// A future cancelled in between leaves a half-written command or a
/// half-read reply behind; reusing the socket would desync command/reply
/// pairing, so the guard drops the connection instead.
struct RoundTripGuard<'a> {
    control: &'a ControlStream,
    armed: bool,
}

impl<'a> RoundTripGuard<'a> {
    fn new(control: &'a ControlStream) -> Self {
        Self {
            control,
            armed: false,
        }
    }

    fn arm(&mut self) {
        self.armed = true;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RoundTripGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.control.poison();
        }
    }
}

/// The FTP control channel
///
/// Owns the control socket and serializes every command/reply exchange.
/// Cheap state queries (`is_open`, `is_encrypted`, `encoding`) never touch
/// the network; `is_connected` may probe the socket.
pub struct ControlStream {
    config: Arc<SessionConfig>,
    send_lock: Mutex<()>,
    wire: Mutex<Wire>,
    connected: AtomicBool,
    encrypted: AtomicBool,
    /// Set when a cancelled round trip could not close the socket itself;
    /// the next wire access finishes the teardown
    poisoned: AtomicBool,
    tls: StdMutex<Option<TlsContext>>,
    peer: StdMutex<Option<SocketAddr>>,
    last_activity: StdMutex<Instant>,
    encoding: StdMutex<Encoding>,
}

/// Take a std mutex guard, surviving a poisoning panic in another task
fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ControlStream {
    /// Create a disconnected control stream for the given configuration
    pub fn new(config: Arc<SessionConfig>) -> Self {
        Self {
            config,
            send_lock: Mutex::new(()),
            wire: Mutex::new(Wire { stream: None }),
            connected: AtomicBool::new(false),
            encrypted: AtomicBool::new(false),
            poisoned: AtomicBool::new(false),
            tls: StdMutex::new(None),
            peer: StdMutex::new(None),
            last_activity: StdMutex::new(Instant::now()),
            encoding: StdMutex::new(Encoding::Ascii),
        }
    }

    /// Connect the control socket, perform any TLS activation, and consume
    /// the server greeting
    ///
    /// # Errors
    ///
    /// - [`FtpError::NoEndpoint`] - resolution produced no usable address
    /// - [`FtpError::Io`] / [`FtpError::Timeout`] - TCP connect failed
    /// - [`FtpError::Tls`] - handshake or certificate configuration failed
    /// - [`FtpError::Protocol`] - greeting was not 220 or `AUTH TLS` refused
    pub async fn connect(&self) -> Result<FtpReply> {
        self.disconnect().await;

        debug!(
            "Connecting to {}:{} ({:?})",
            self.config.host, self.config.port, self.config.encryption
        );

        let addr = resolver::resolve(
            &self.config.host,
            self.config.port,
            self.config.ip_version,
        )
        .await?;

        let tcp = timeout(self.config.timeout(), TcpStream::connect(addr))
            .await
            .map_err(|_| FtpError::Timeout)??;
        tcp.set_nodelay(true)?;
        // Abortive close on drop: an FTP control socket has nothing worth
        // flushing once the session is being torn down.
        SockRef::from(&tcp).set_linger(Some(Duration::ZERO))?;

        let tls_ctx = if self.config.wants_tls() {
            Some(build_tls_context(&self.config)?)
        } else {
            None
        };

        let stream = match (&tls_ctx, self.config.encryption) {
            (Some(ctx), EncryptionMode::Implicit) => {
                let tls = self.tls_handshake(ctx, tcp).await?;
                self.encrypted.store(true, Ordering::SeqCst);
                WireStream::Tls(Box::new(tls))
            }
            _ => WireStream::Plain(tcp),
        };

        *lock(&self.peer) = Some(addr);
        *lock(&self.tls) = tls_ctx;
        {
            let mut wire = self.wire.lock().await;
            wire.stream = Some(BufReader::with_capacity(READ_BUFFER_SIZE, stream));
        }
        self.connected.store(true, Ordering::SeqCst);
        self.touch();

        // Block until the greeting arrives; a server that says anything but
        // 220 is not offering FTP service.
        let greeting = match self.read_reply().await {
            Ok(reply) => reply,
            Err(e) => {
                self.disconnect().await;
                return Err(e);
            }
        };
        if greeting.code != codes::SERVICE_READY {
            self.disconnect().await;
            return Err(FtpError::Protocol {
                code: greeting.code,
                message: greeting.message,
            });
        }
        debug!("Greeting: {} {}", greeting.code, greeting.message);

        if self.config.encryption == EncryptionMode::Explicit {
            self.upgrade_to_tls().await?;
        }

        Ok(greeting)
    }

    /// Send `AUTH TLS` and wrap the control socket
    async fn upgrade_to_tls(&self) -> Result<()> {
        let reply = self.send_and_read(&commands::auth_tls()).await?;
        if let Err(e) = commands::require_completion(&reply) {
            self.disconnect().await;
            return Err(e);
        }

        let ctx = lock(&self.tls).clone().ok_or_else(|| {
            FtpError::Tls("TLS requested but no TLS context was prepared".to_string())
        })?;

        let mut wire = self.wire.lock().await;
        let reader = wire.stream.take().ok_or(FtpError::ConnectionClosed)?;
        match reader.into_inner() {
            WireStream::Plain(tcp) => match self.tls_handshake(&ctx, tcp).await {
                Ok(tls) => {
                    wire.stream = Some(BufReader::with_capacity(
                        READ_BUFFER_SIZE,
                        WireStream::Tls(Box::new(tls)),
                    ));
                    self.encrypted.store(true, Ordering::SeqCst);
                    debug!("Control channel upgraded to TLS");
                    Ok(())
                }
                Err(e) => {
                    self.teardown_locked(&mut wire).await;
                    Err(e)
                }
            },
            WireStream::Tls(_) => {
                self.teardown_locked(&mut wire).await;
                Err(FtpError::Tls("control channel already encrypted".to_string()))
            }
        }
    }

    async fn tls_handshake(&self, ctx: &TlsContext, tcp: TcpStream) -> Result<TlsStream<TcpStream>> {
        timeout(
            self.config.timeout(),
            ctx.connector.connect(ctx.server_name.clone(), tcp),
        )
        .await
        .map_err(|_| FtpError::Timeout)?
        .map_err(|e| FtpError::Tls(format!("TLS handshake failed: {}", e)))
    }

    /// Send one command and read its reply, serialized against other senders
    ///
    /// Cancellation: dropping the returned future between the start of the
    /// write and the end of the reply read leaves partial protocol state on
    /// the wire, so the connection is torn down instead of reused.
    pub async fn send_and_read(&self, command: &Command) -> Result<FtpReply> {
        let _round_trip = self.send_lock.lock().await;
        let mut guard = RoundTripGuard::new(self);
        {
            let mut wire = self.wire.lock().await;
            self.drain_stale_locked(&mut wire).await;
            guard.arm();
            if let Err(e) = self.write_command_locked(&mut wire, command).await {
                // The write path already tore the connection down
                guard.disarm();
                return Err(e);
            }
        }
        // Reacquire only the receive lock for the reply, mirroring the
        // data-stream close path
        let result = {
            let mut wire = self.wire.lock().await;
            self.read_reply_locked(&mut wire).await
        };
        guard.disarm();
        result
    }

    /// Send one command and run a typed extractor over the reply
    pub async fn send_and_read_typed<T>(
        &self,
        command: &Command,
        parser: impl FnOnce(&FtpReply) -> Result<T>,
    ) -> Result<T> {
        let reply = self.send_and_read(command).await?;
        parser(&reply)
    }

    /// Read a reply without sending anything
    ///
    /// Used to consume the terminal reply after a data transfer and stray
    /// unsolicited lines. Takes only the receive side of the lock pair.
    /// Cancellation mid-read disconnects: a partially consumed reply cannot
    /// be repaired.
    pub async fn read_reply(&self) -> Result<FtpReply> {
        let mut guard = RoundTripGuard::new(self);
        let mut wire = self.wire.lock().await;
        guard.arm();
        let result = self.read_reply_locked(&mut wire).await;
        guard.disarm();
        result
    }

    async fn read_reply_locked(&self, wire: &mut Wire) -> Result<FtpReply> {
        if self.poisoned.swap(false, Ordering::SeqCst) {
            wire.stream = None;
            return Err(FtpError::ConnectionClosed);
        }
        let result = self.read_reply_inner(wire).await;
        match &result {
            Ok(_) => self.touch(),
            Err(e) if e.is_fatal() => self.teardown_locked(wire).await,
            Err(_) => {}
        }
        result
    }

    /// Accumulate lines until the terminal `ddd text` line of the reply
    async fn read_reply_inner(&self, wire: &mut Wire) -> Result<FtpReply> {
        let stream = wire.stream.as_mut().ok_or(FtpError::ConnectionClosed)?;
        let mut lines: Vec<String> = Vec::new();

        loop {
            let mut raw = Vec::new();
            let n = timeout(self.config.timeout(), stream.read_until(b'\n', &mut raw))
                .await
                .map_err(|_| FtpError::Timeout)??;
            if n == 0 {
                return Err(FtpError::ConnectionClosed);
            }

            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\r', '\n']);
            trace!("S: {}", line);

            if commands::is_terminal_line(line) {
                let (code, message) = commands::parse_reply_line(line)?;
                return Ok(FtpReply {
                    code,
                    message,
                    lines,
                });
            }
            lines.push(line.to_string());
        }
    }

    async fn write_command_locked(&self, wire: &mut Wire, command: &Command) -> Result<()> {
        if self.poisoned.swap(false, Ordering::SeqCst) {
            wire.stream = None;
            return Err(FtpError::ConnectionClosed);
        }
        trace!("C: {}", command.to_loggable());
        let rendered = command.render();

        let result: Result<()> = async {
            let stream = wire.stream.as_mut().ok_or(FtpError::ConnectionClosed)?;
            timeout(
                self.config.timeout(),
                stream.get_mut().write_all(rendered.as_bytes()),
            )
            .await
            .map_err(|_| FtpError::Timeout)??;
            timeout(self.config.timeout(), stream.get_mut().flush())
                .await
                .map_err(|_| FtpError::Timeout)??;
            Ok(())
        }
        .await;

        match &result {
            Ok(()) => self.touch(),
            Err(e) if e.is_fatal() => self.teardown_locked(wire).await,
            Err(_) => {}
        }
        result
    }

    /// Discard one already-buffered reply before sending a fresh command
    ///
    /// A previous data transfer abandoned without a clean close leaves its
    /// terminal reply unread; absorbing it here keeps command/reply pairing
    /// intact.
    async fn drain_stale_locked(&self, wire: &mut Wire) {
        let (available, readable) = {
            let Some(stream) = wire.stream.as_mut() else {
                return;
            };
            let buffered = stream.buffer().len();
            let readable = buffered > 0
                || matches!(
                    timeout(
                        Duration::ZERO,
                        stream.get_ref().tcp().ready(Interest::READABLE)
                    )
                    .await,
                    Ok(Ok(_))
                );
            (buffered, readable)
        };
        if !readable {
            return;
        }

        match timeout(STALE_DRAIN_TIMEOUT, self.read_reply_inner(wire)).await {
            Ok(Ok(reply)) => warn!(
                "Discarded stale reply ({} buffered bytes): {} {}",
                available, reply.code, reply.message
            ),
            Ok(Err(e)) => warn!("Failed to drain stale input: {}", e),
            Err(_) => warn!("Stale input did not form a complete reply"),
        }
    }

    /// Open a data socket toward the passive endpoint, TLS-wrapped when the
    /// control channel is encrypted
    pub(crate) async fn open_data_socket(&self, host: &str, port: u16) -> Result<WireStream> {
        let addr = resolver::resolve(host, port, self.config.ip_version).await?;
        let tcp = timeout(self.config.timeout(), TcpStream::connect(addr))
            .await
            .map_err(|_| FtpError::Timeout)??;
        tcp.set_nodelay(true)?;
        trace!("Data connection to {}", addr);

        if self.is_encrypted() {
            let ctx = lock(&self.tls).clone().ok_or_else(|| {
                FtpError::Tls("encrypted control channel without TLS context".to_string())
            })?;
            let tls = self.tls_handshake(&ctx, tcp).await?;
            Ok(WireStream::Tls(Box::new(tls)))
        } else {
            Ok(WireStream::Plain(tcp))
        }
    }

    /// Liveness test with a side effect: a dead socket disconnects the stream
    ///
    /// Recently-active connections are assumed alive; older ones are probed
    /// with a bounded peek. Peer EOF and socket errors disconnect.
    pub async fn is_connected(&self) -> bool {
        if !self.is_open() {
            return false;
        }
        let age = lock(&self.last_activity).elapsed();
        if age < SOCKET_POLL_INTERVAL {
            return true;
        }

        let alive = {
            let mut wire = self.wire.lock().await;
            let Some(stream) = wire.stream.as_mut() else {
                return false;
            };
            if stream.buffer().is_empty() {
                let mut probe = [0u8; 1];
                match timeout(LIVENESS_PROBE_TIMEOUT, stream.get_ref().tcp().peek(&mut probe))
                    .await
                {
                    // Nothing readable within the window: idle but alive
                    Err(_) => true,
                    Ok(Ok(0)) => false,
                    Ok(Ok(_)) => true,
                    Ok(Err(_)) => false,
                }
            } else {
                true
            }
        };

        if alive {
            self.touch();
        } else {
            debug!("Liveness probe found the control socket dead");
            self.disconnect().await;
        }
        alive
    }

    /// Whether the socket is held open, without probing the network
    pub fn is_open(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Whether the control channel is TLS-wrapped
    pub fn is_encrypted(&self) -> bool {
        self.encrypted.load(Ordering::SeqCst)
    }

    /// Negotiated wire encoding
    pub fn encoding(&self) -> Encoding {
        *lock(&self.encoding)
    }

    /// Record the negotiated wire encoding
    ///
    /// Command lines are always written as UTF-8 bytes (a strict superset
    /// of ASCII); the encoding gates negotiation state, not byte layout.
    pub(crate) fn set_encoding(&self, encoding: Encoding) {
        *lock(&self.encoding) = encoding;
    }

    /// Remote address of the control socket, once connected
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        *lock(&self.peer)
    }

    /// Drop TLS state and the socket; safe to call repeatedly
    pub async fn disconnect(&self) {
        let mut wire = self.wire.lock().await;
        self.teardown_locked(&mut wire).await;
    }

    async fn teardown_locked(&self, wire: &mut Wire) {
        if let Some(mut stream) = wire.stream.take() {
            let _ = stream.get_mut().shutdown().await;
        }
        self.connected.store(false, Ordering::SeqCst);
        self.encrypted.store(false, Ordering::SeqCst);
        self.poisoned.store(false, Ordering::SeqCst);
        *lock(&self.tls) = None;
        *lock(&self.peer) = None;
    }

    /// Synchronous teardown for round trips cancelled mid-exchange
    ///
    /// Runs from `Drop`, so it cannot await: the socket is closed by
    /// dropping it (abortively, given linger 0) under a try-lock. If the
    /// wire mutex is contended the poisoned flag stays set and the next
    /// wire access finishes the job.
    fn poison(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            warn!("Round trip cancelled mid-exchange; dropping the connection");
        }
        self.poisoned.store(true, Ordering::SeqCst);
        if let Ok(mut wire) = self.wire.try_lock() {
            wire.stream = None;
            self.poisoned.store(false, Ordering::SeqCst);
        }
        self.encrypted.store(false, Ordering::SeqCst);
        *lock(&self.tls) = None;
        *lock(&self.peer) = None;
    }

    fn touch(&self) {
        *lock(&self.last_activity) = Instant::now();
    }
}

/// Build the rustls client state for this session
fn build_tls_context(config: &SessionConfig) -> Result<TlsContext> {
    let _ = CryptoProvider::install_default(ring::default_provider());

    let versions: &[&rustls::SupportedProtocolVersion] = match config.tls_versions {
        TlsVersions::All => rustls::ALL_VERSIONS,
        TlsVersions::Tls12 => &[&rustls::version::TLS12],
        TlsVersions::Tls13 => &[&rustls::version::TLS13],
    };
    let builder = ClientConfig::builder_with_protocol_versions(versions);

    let wants_cert = if config.ignore_certificate_errors {
        warn!("TLS certificate validation disabled; connection is open to MITM");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(InsecureCertVerifier))
    } else {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots)
    };

    let client_config = match &config.client_identity {
        Some(identity) => {
            let chain: Vec<CertificateDer<'static>> = identity
                .cert_chain
                .iter()
                .map(|der| CertificateDer::from(der.clone()))
                .collect();
            let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(identity.key.clone()));
            wants_cert
                .with_client_auth_cert(chain, key)
                .map_err(|e| FtpError::Tls(format!("client certificate rejected: {}", e)))?
        }
        None => wants_cert.with_no_client_auth(),
    };

    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|e| FtpError::Tls(format!("invalid server name: {}", e)))?;

    Ok(TlsContext {
        connector: TlsConnector::from(Arc::new(client_config)),
        server_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stream_is_disconnected() {
        let config = Arc::new(SessionConfig::anonymous("ftp.example.com"));
        let control = ControlStream::new(config);
        assert!(!control.is_open());
        assert!(!control.is_encrypted());
        assert_eq!(control.encoding(), Encoding::Ascii);
        assert!(control.peer_addr().is_none());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let config = Arc::new(SessionConfig::anonymous("ftp.example.com"));
        let control = ControlStream::new(config);
        control.disconnect().await;
        control.disconnect().await;
        assert!(!control.is_open());
    }

    #[tokio::test]
    async fn test_send_on_closed_stream() {
        let config = Arc::new(SessionConfig::anonymous("ftp.example.com"));
        let control = ControlStream::new(config);
        let err = control.send_and_read(&commands::noop()).await.unwrap_err();
        assert!(matches!(err, FtpError::ConnectionClosed));
    }

    #[test]
    fn test_encoding_never_reverts_by_setter_discipline() {
        let config = Arc::new(SessionConfig::anonymous("ftp.example.com"));
        let control = ControlStream::new(config);
        control.set_encoding(Encoding::Utf8);
        assert_eq!(control.encoding(), Encoding::Utf8);
    }
}
