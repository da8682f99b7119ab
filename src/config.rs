//! FTP session configuration

/// Transfer mode sent with `TYPE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferMode {
    /// ASCII text mode (`TYPE A`)
    Ascii,
    /// Binary / image mode (`TYPE I`)
    #[default]
    Image,
}

impl TransferMode {
    /// The single-character TYPE code for this mode
    pub fn type_char(self) -> char {
        match self {
            TransferMode::Ascii => 'A',
            TransferMode::Image => 'I',
        }
    }
}

/// Control-channel encryption mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EncryptionMode {
    /// Plaintext control and data channels
    #[default]
    None,
    /// Plaintext connect, then `AUTH TLS` upgrades the control channel (RFC 4217)
    Explicit,
    /// TLS from byte zero on a dedicated port, typically 990
    Implicit,
}

/// TLS protocol versions the client will offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TlsVersions {
    /// TLS 1.2 and 1.3
    #[default]
    All,
    /// TLS 1.2 only
    Tls12,
    /// TLS 1.3 only
    Tls13,
}

/// IP version preference for name resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IpVersion {
    /// First resolved address of either family
    #[default]
    Any,
    /// IPv4 addresses only
    V4,
    /// IPv6 addresses only
    V6,
}

/// Client certificate identity for mutual TLS
///
/// Certificates and key are DER-encoded; the key must be PKCS#8.
#[derive(Debug, Clone, Default)]
pub struct ClientIdentity {
    /// Certificate chain, leaf first
    pub cert_chain: Vec<Vec<u8>>,
    /// PKCS#8 private key
    pub key: Vec<u8>,
}

/// FTP session configuration
///
/// Immutable once a session begins. The `host` accepts either a bare
/// hostname or a fully-qualified URI whose host part is extracted.
///
/// # Example
///
/// ```
/// use ftp_rs::SessionConfig;
///
/// let config = SessionConfig::explicit_tls("ftp.example.com", "user", "pass");
/// assert_eq!(config.port, 21);
///
/// let anon = SessionConfig::anonymous("ftp://ftp.example.com/pub");
/// assert_eq!(anon.host, "ftp.example.com");
/// assert_eq!(anon.username, "anonymous");
/// ```
#[must_use]
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// Server hostname
    pub host: String,

    /// Server port (21 for plain/explicit TLS, 990 for implicit TLS)
    #[cfg_attr(feature = "serde", serde(default = "default_port"))]
    pub port: u16,

    /// Username; empty means anonymous
    #[cfg_attr(feature = "serde", serde(default))]
    pub username: String,

    /// Password; empty for anonymous logins
    #[cfg_attr(feature = "serde", serde(default))]
    pub password: String,

    /// Directory the session changes into after login, created on demand.
    /// Normalized to begin with `/`.
    #[cfg_attr(feature = "serde", serde(default = "default_base_directory"))]
    pub base_directory: String,

    /// Transfer mode for `TYPE`
    #[cfg_attr(feature = "serde", serde(default))]
    pub transfer_mode: TransferMode,

    /// Optional second TYPE byte (e.g. `N` for non-print)
    #[cfg_attr(feature = "serde", serde(default))]
    pub mode_second_type: Option<char>,

    /// Control/data channel encryption
    #[cfg_attr(feature = "serde", serde(default))]
    pub encryption: EncryptionMode,

    /// Accept any server certificate
    ///
    /// **Security warning:** disables all certificate validation; the
    /// connection becomes vulnerable to man-in-the-middle attacks. Only for
    /// testing or servers trusted over a secure network.
    #[cfg_attr(feature = "serde", serde(default))]
    pub ignore_certificate_errors: bool,

    /// Client certificate for mutual TLS, if the server requires one
    #[cfg_attr(feature = "serde", serde(skip))]
    pub client_identity: Option<ClientIdentity>,

    /// TLS protocol versions to offer
    #[cfg_attr(feature = "serde", serde(default))]
    pub tls_versions: TlsVersions,

    /// IP version preference for resolving `host`
    #[cfg_attr(feature = "serde", serde(default))]
    pub ip_version: IpVersion,

    /// Timeout in seconds applied to connect, TLS handshake, and every
    /// socket read/write
    #[cfg_attr(feature = "serde", serde(default = "default_timeout"))]
    pub timeout_secs: u64,
}

#[cfg(feature = "serde")]
fn default_port() -> u16 {
    21
}

#[cfg(feature = "serde")]
fn default_base_directory() -> String {
    "/".to_string()
}

#[cfg(feature = "serde")]
fn default_timeout() -> u64 {
    30
}

impl SessionConfig {
    /// Create a plaintext configuration on port 21
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host_from_uri(&host.into()),
            port: 21,
            username: username.into(),
            password: password.into(),
            base_directory: "/".to_string(),
            transfer_mode: TransferMode::Image,
            mode_second_type: None,
            encryption: EncryptionMode::None,
            ignore_certificate_errors: false,
            client_identity: None,
            tls_versions: TlsVersions::All,
            ip_version: IpVersion::Any,
            timeout_secs: 30,
        }
    }

    /// Create an anonymous plaintext configuration
    pub fn anonymous(host: impl Into<String>) -> Self {
        Self::new(host, "anonymous", "")
    }

    /// Create an explicit-TLS (`AUTH TLS`) configuration on port 21
    pub fn explicit_tls(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let mut config = Self::new(host, username, password);
        config.encryption = EncryptionMode::Explicit;
        config
    }

    /// Create an implicit-TLS configuration on port 990
    pub fn implicit_tls(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let mut config = Self::new(host, username, password);
        config.encryption = EncryptionMode::Implicit;
        config.port = 990;
        config
    }

    /// Set the directory the session enters after login
    pub fn with_base_directory(mut self, dir: impl Into<String>) -> Self {
        let dir = dir.into();
        self.base_directory = if dir.starts_with('/') {
            dir
        } else {
            format!("/{}", dir)
        };
        self
    }

    /// Effective username: empty input falls back to `anonymous`
    pub(crate) fn effective_username(&self) -> &str {
        if self.username.is_empty() {
            "anonymous"
        } else {
            &self.username
        }
    }

    pub(crate) fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    pub(crate) fn wants_tls(&self) -> bool {
        self.encryption != EncryptionMode::None
    }
}

/// Extract the host part from a URI-shaped string
///
/// `ftp://user@host:21/pub` → `host`; bare hostnames pass through.
fn host_from_uri(input: &str) -> String {
    let rest = match input.split_once("://") {
        Some((_, rest)) => rest,
        None => input,
    };
    let rest = match rest.rsplit_once('@') {
        Some((_, host)) => host,
        None => rest,
    };
    let rest = rest.split(['/', '?']).next().unwrap_or(rest);
    // Strip a port suffix, but leave bracketed IPv6 literals intact
    let host = if rest.starts_with('[') {
        rest.trim_start_matches('[')
            .split(']')
            .next()
            .unwrap_or(rest)
    } else {
        match rest.rsplit_once(':') {
            // A second colon means a bare IPv6 literal, not a port suffix
            Some((host, port))
                if !host.contains(':') && port.chars().all(|c| c.is_ascii_digit()) =>
            {
                host
            }
            _ => rest,
        }
    };
    host.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults() {
        let config = SessionConfig::new("ftp.example.com", "user", "pass");
        assert_eq!(config.host, "ftp.example.com");
        assert_eq!(config.port, 21);
        assert_eq!(config.base_directory, "/");
        assert_eq!(config.transfer_mode, TransferMode::Image);
        assert_eq!(config.encryption, EncryptionMode::None);
        assert_eq!(config.timeout_secs, 30);
        assert!(!config.ignore_certificate_errors);
    }

    #[test]
    fn test_implicit_tls_port() {
        let config = SessionConfig::implicit_tls("ftp.example.com", "user", "pass");
        assert_eq!(config.port, 990);
        assert_eq!(config.encryption, EncryptionMode::Implicit);
    }

    #[test]
    fn test_anonymous() {
        let config = SessionConfig::anonymous("ftp.example.com");
        assert_eq!(config.username, "anonymous");
        assert_eq!(config.password, "");
        assert_eq!(config.effective_username(), "anonymous");
    }

    #[test]
    fn test_empty_username_defaults_to_anonymous() {
        let config = SessionConfig::new("ftp.example.com", "", "");
        assert_eq!(config.effective_username(), "anonymous");
    }

    #[test]
    fn test_host_from_uri() {
        assert_eq!(host_from_uri("ftp.example.com"), "ftp.example.com");
        assert_eq!(host_from_uri("ftp://ftp.example.com"), "ftp.example.com");
        assert_eq!(
            host_from_uri("ftp://user:pw@ftp.example.com:2121/pub/x"),
            "ftp.example.com"
        );
        assert_eq!(host_from_uri("ftps://[::1]:990/"), "::1");
        assert_eq!(host_from_uri("ftp.example.com:21"), "ftp.example.com");
    }

    #[test]
    fn test_base_directory_normalized() {
        let config = SessionConfig::anonymous("h").with_base_directory("pub/files");
        assert_eq!(config.base_directory, "/pub/files");
        let config = SessionConfig::anonymous("h").with_base_directory("/pub");
        assert_eq!(config.base_directory, "/pub");
    }

    #[test]
    fn test_type_char() {
        assert_eq!(TransferMode::Ascii.type_char(), 'A');
        assert_eq!(TransferMode::Image.type_char(), 'I');
    }
}
