//! FTP reply types and status codes

/// A complete FTP reply: terminal status line plus any preceding lines
/// of a multi-line reply (RFC 959 §4.2).
///
/// `lines` holds every line received before the terminal `ddd text` line,
/// with line endings stripped. FEAT parsing relies on them; most replies
/// have none.
#[derive(Debug, Clone)]
pub struct FtpReply {
    /// 3-digit FTP reply code from the terminal line
    pub code: u16,
    /// Text after the code on the terminal line
    pub message: String,
    /// Lines accumulated before the terminal line (multi-line replies)
    pub lines: Vec<String>,
}

impl FtpReply {
    /// Check if the reply indicates success (2xx or 3xx)
    ///
    /// FTP intermediate codes (3xx) are positive: they mean "proceed with
    /// the next command of the sequence" (USER → 331, RNFR → 350).
    pub fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 400
    }

    /// Check if the reply is a positive intermediate (3xx)
    pub fn is_intermediate(&self) -> bool {
        self.code >= 300 && self.code < 400
    }

    /// Check if the reply indicates failure (4xx or 5xx)
    pub fn is_error(&self) -> bool {
        self.code >= 400
    }
}

/// FTP reply codes (RFC 959, RFC 2389, RFC 2428, RFC 3659)
#[allow(dead_code)]
pub mod codes {
    // 1xx - Positive preliminary
    /// File status okay; about to open data connection
    pub const OPENING_DATA: u16 = 150;
    /// Data connection already open; transfer starting
    pub const DATA_ALREADY_OPEN: u16 = 125;

    // 2xx - Positive completion
    /// Command okay
    pub const COMMAND_OK: u16 = 200;
    /// Command not implemented, superfluous at this site
    pub const COMMAND_SUPERFLUOUS: u16 = 202;
    /// System status or help reply; also FEAT list terminator (RFC 2389)
    pub const SYSTEM_STATUS: u16 = 211;
    /// File status (SIZE reply, RFC 3659 §4)
    pub const FILE_STATUS: u16 = 213;
    /// Service ready for new user
    pub const SERVICE_READY: u16 = 220;
    /// Service closing control connection
    pub const CLOSING_CONTROL: u16 = 221;
    /// Closing data connection; requested file action successful
    pub const CLOSING_DATA: u16 = 226;
    /// Entering passive mode (h1,h2,h3,h4,p1,p2)
    pub const ENTERING_PASSIVE: u16 = 227;
    /// Entering extended passive mode (|||port|) (RFC 2428)
    pub const ENTERING_EXTENDED_PASSIVE: u16 = 229;
    /// User logged in, proceed
    pub const LOGGED_IN: u16 = 230;
    /// Security data exchange complete (AUTH TLS accepted, RFC 4217)
    pub const SECURITY_EXCHANGE_OK: u16 = 234;
    /// Requested file action okay, completed
    pub const FILE_ACTION_OK: u16 = 250;
    /// Pathname created (MKD/PWD reply)
    pub const PATHNAME_CREATED: u16 = 257;

    // 3xx - Positive intermediate
    /// User name okay, need password
    pub const NEED_PASSWORD: u16 = 331;
    /// Need account for login
    pub const NEED_ACCOUNT: u16 = 332;
    /// Requested file action pending further information (RNFR accepted)
    pub const FILE_ACTION_PENDING: u16 = 350;

    // 4xx - Transient negative
    /// Service not available, closing control connection
    pub const SERVICE_NOT_AVAILABLE: u16 = 421;
    /// Can't open data connection
    pub const CANT_OPEN_DATA: u16 = 425;
    /// Connection closed; transfer aborted
    pub const TRANSFER_ABORTED: u16 = 426;

    // 5xx - Permanent negative
    /// Syntax error, command unrecognized
    pub const COMMAND_UNRECOGNIZED: u16 = 500;
    /// Syntax error in parameters or arguments
    pub const SYNTAX_ERROR: u16 = 501;
    /// Command not implemented
    pub const NOT_IMPLEMENTED: u16 = 502;
    /// Not logged in
    pub const NOT_LOGGED_IN: u16 = 530;
    /// Requested action not taken; file unavailable (also "directory does
    /// not exist" during recursive creation)
    pub const FILE_UNAVAILABLE: u16 = 550;
}
