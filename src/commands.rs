//! FTP command builders and reply extractors

use crate::error::{FtpError, Result};
use crate::reply::FtpReply;

/// An FTP command envelope: verb plus optional argument.
///
/// Rendered on the wire as `VERB\r\n` or `VERB ARG\r\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    verb: String,
    arg: Option<String>,
}

impl Command {
    /// Create a command without an argument
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            arg: None,
        }
    }

    /// Create a command with an argument
    pub fn with_arg(verb: impl Into<String>, arg: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            arg: Some(arg.into()),
        }
    }

    /// The command verb (e.g. `RETR`)
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// The command argument, if any
    pub fn arg(&self) -> Option<&str> {
        self.arg.as_deref()
    }

    /// Render the command as a wire line including CRLF
    pub fn render(&self) -> String {
        match &self.arg {
            Some(arg) => format!("{} {}\r\n", self.verb, arg),
            None => format!("{}\r\n", self.verb),
        }
    }

    /// Parse a wire line back into an envelope
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        match line.split_once(' ') {
            Some((verb, arg)) => Self::with_arg(verb, arg),
            None => Self::new(line),
        }
    }

    /// Render for logging, masking `PASS` arguments
    pub fn to_loggable(&self) -> String {
        if self.verb.eq_ignore_ascii_case("PASS") && self.arg.is_some() {
            format!("{} ****", self.verb)
        } else {
            match &self.arg {
                Some(arg) => format!("{} {}", self.verb, arg),
                None => self.verb.clone(),
            }
        }
    }
}

/// Build USER command
pub fn user(username: &str) -> Command {
    Command::with_arg("USER", username)
}

/// Build PASS command
pub fn pass(password: &str) -> Command {
    Command::with_arg("PASS", password)
}

/// Build QUIT command
pub fn quit() -> Command {
    Command::new("QUIT")
}

/// Build NOOP command
pub fn noop() -> Command {
    Command::new("NOOP")
}

/// Build FEAT command (RFC 2389)
pub fn feat() -> Command {
    Command::new("FEAT")
}

/// Build EPSV command (RFC 2428)
pub fn epsv() -> Command {
    Command::new("EPSV")
}

/// Build PASV command
pub fn pasv() -> Command {
    Command::new("PASV")
}

/// Build CWD command
pub fn cwd(path: &str) -> Command {
    Command::with_arg("CWD", path)
}

/// Build PWD command
pub fn pwd() -> Command {
    Command::new("PWD")
}

/// Build CLNT command (client identification)
pub fn clnt(name: &str) -> Command {
    Command::with_arg("CLNT", name)
}

/// Build LIST command for the current directory
pub fn list() -> Command {
    Command::new("LIST")
}

/// Build MLSD command for the current directory (RFC 3659)
pub fn mlsd() -> Command {
    Command::new("MLSD")
}

/// Build NLST command for the current directory
pub fn nlst() -> Command {
    Command::new("NLST")
}

/// Build RETR command
pub fn retr(path: &str) -> Command {
    Command::with_arg("RETR", path)
}

/// Build STOR command
pub fn stor(path: &str) -> Command {
    Command::with_arg("STOR", path)
}

/// Build DELE command
pub fn dele(path: &str) -> Command {
    Command::with_arg("DELE", path)
}

/// Build MKD command
pub fn mkd(path: &str) -> Command {
    Command::with_arg("MKD", path)
}

/// Build RMD command
pub fn rmd(path: &str) -> Command {
    Command::with_arg("RMD", path)
}

/// Build RNFR command (rename from)
pub fn rnfr(path: &str) -> Command {
    Command::with_arg("RNFR", path)
}

/// Build RNTO command (rename to)
pub fn rnto(path: &str) -> Command {
    Command::with_arg("RNTO", path)
}

/// Build SIZE command (RFC 3659)
pub fn size(path: &str) -> Command {
    Command::with_arg("SIZE", path)
}

/// Build TYPE command
///
/// `second` is the optional second type byte (e.g. `N` for non-print).
pub fn transfer_type(primary: char, second: Option<char>) -> Command {
    match second {
        Some(s) => Command::with_arg("TYPE", format!("{} {}", primary, s)),
        None => Command::with_arg("TYPE", primary.to_string()),
    }
}

/// Build OPTS UTF8 ON command (RFC 2389 OPTS + UTF8 feature)
pub fn opts_utf8_on() -> Command {
    Command::with_arg("OPTS", "UTF8 ON")
}

/// Build AUTH TLS command (RFC 4217)
pub fn auth_tls() -> Command {
    Command::with_arg("AUTH", "TLS")
}

/// Build PBSZ command (RFC 4217)
pub fn pbsz(size: u32) -> Command {
    Command::with_arg("PBSZ", size.to_string())
}

/// Build PROT command (RFC 4217; level `P` = private)
pub fn prot(level: char) -> Command {
    Command::with_arg("PROT", level.to_string())
}

/// Parse an FTP reply line into code and message
///
/// Accepts both terminal (`ddd text`) and bare (`ddd`) forms; the caller
/// decides terminality from the separator character.
pub fn parse_reply_line(line: &str) -> Result<(u16, String)> {
    let bytes = line.as_bytes();
    if bytes.len() < 3
        || !bytes[0].is_ascii_digit()
        || !bytes[1].is_ascii_digit()
        || !bytes[2].is_ascii_digit()
    {
        return Err(FtpError::InvalidReply(line.chars().take(100).collect()));
    }

    // Safe to slice since we verified ASCII digits
    let code = line[0..3]
        .parse::<u16>()
        .map_err(|_| FtpError::InvalidReply(line.chars().take(100).collect()))?;

    let message = if line.len() > 4 {
        line[4..].to_string()
    } else {
        String::new()
    };

    Ok((code, message))
}

/// Whether a line terminates a reply: `ddd text` or a bare `ddd`
///
/// Continuation lines (`ddd-text`) and free-form text lines inside a
/// multi-line reply do not terminate it.
pub fn is_terminal_line(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_digit()
        && bytes[1].is_ascii_digit()
        && bytes[2].is_ascii_digit()
        && (bytes.len() == 3 || bytes[3] == b' ')
}

/// Require the reply code to be one of `accepted`
pub fn require(reply: &FtpReply, accepted: &[u16]) -> Result<()> {
    if accepted.contains(&reply.code) {
        Ok(())
    } else {
        Err(FtpError::Protocol {
            code: reply.code,
            message: reply.message.clone(),
        })
    }
}

/// Require any 2xx completion reply
pub fn require_completion(reply: &FtpReply) -> Result<()> {
    if reply.code / 100 == 2 {
        Ok(())
    } else {
        Err(FtpError::Protocol {
            code: reply.code,
            message: reply.message.clone(),
        })
    }
}

/// Extract the working directory from a PWD (257) reply
///
/// Searches the last line containing a double quote and returns the content
/// between the first pair of quotes.
pub fn parse_pwd(reply: &FtpReply) -> Result<String> {
    let quoted = reply
        .lines
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(reply.message.as_str()))
        .filter(|line| line.contains('"'))
        .next_back();

    let line = quoted.ok_or_else(|| {
        FtpError::InvalidReply(format!("PWD reply without quoted path: {}", reply.message))
    })?;

    let mut parts = line.splitn(3, '"');
    parts.next();
    match (parts.next(), parts.next()) {
        (Some(path), Some(_)) => Ok(path.to_string()),
        _ => Err(FtpError::InvalidReply(format!(
            "PWD reply with unterminated quote: {}",
            line
        ))),
    }
}

/// Extract the data port from an EPSV (229) reply
///
/// The reply carries `(|||port|)`; the port is the decimal run between the
/// final two delimiter characters (`|` or `,`).
pub fn parse_epsv(reply: &FtpReply) -> Result<u16> {
    let msg = reply.message.as_bytes();
    let mut port: Option<u16> = None;

    let mut i = 0;
    while i < msg.len() {
        if msg[i] == b'|' || msg[i] == b',' {
            let digits_start = i + 1;
            let mut j = digits_start;
            while j < msg.len() && msg[j].is_ascii_digit() {
                j += 1;
            }
            if j > digits_start && j < msg.len() && (msg[j] == b'|' || msg[j] == b',') {
                if let Ok(p) = reply.message[digits_start..j].parse::<u16>() {
                    port = Some(p);
                }
                i = j;
                continue;
            }
        }
        i += 1;
    }

    port.ok_or_else(|| {
        FtpError::InvalidReply(format!("EPSV reply without a port: {}", reply.message))
    })
}

/// Extract host and port from a PASV (227) reply
///
/// The reply carries six 0-255 integers `h1,h2,h3,h4,p1,p2` (comma- or
/// pipe-separated); host is `h1.h2.h3.h4`, port is `p1 * 256 + p2`.
pub fn parse_pasv(reply: &FtpReply) -> Result<(String, u16)> {
    let mut groups: Vec<u16> = Vec::new();
    let mut current = String::new();
    let mut best: Option<Vec<u16>> = None;

    let flush_number = |groups: &mut Vec<u16>, current: &mut String| {
        if !current.is_empty() {
            match current.parse::<u16>() {
                Ok(n) if n <= 255 => groups.push(n),
                _ => groups.clear(),
            }
            current.clear();
        }
    };

    for ch in reply.message.chars() {
        match ch {
            '0'..='9' => current.push(ch),
            ',' | '|' => flush_number(&mut groups, &mut current),
            _ => {
                flush_number(&mut groups, &mut current);
                if groups.len() >= 6 {
                    best = Some(groups.clone());
                }
                groups.clear();
            }
        }
    }
    flush_number(&mut groups, &mut current);
    if groups.len() >= 6 {
        best = Some(groups);
    }

    let run = best.ok_or_else(|| {
        FtpError::InvalidReply(format!(
            "PASV reply without a host/port group: {}",
            reply.message
        ))
    })?;

    // A stray leading number glued to the run is tolerated; the address is
    // always the last six values.
    let h = &run[run.len() - 6..];
    let host = format!("{}.{}.{}.{}", h[0], h[1], h[2], h[3]);
    let port = h[4] * 256 + h[5];
    Ok((host, port))
}

/// Extract feature lines from a FEAT (211) reply
///
/// Drops the `211` framing lines and blanks, trims the single-space indent
/// RFC 2389 prescribes for feature lines.
pub fn parse_feat_lines(reply: &FtpReply) -> Vec<String> {
    reply
        .lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with("211"))
        .map(str::to_string)
        .collect()
}

/// Extract the byte count from a SIZE (213) reply
pub fn parse_size(reply: &FtpReply) -> Result<u64> {
    let msg = reply.message.trim();
    let digits: String = msg.chars().take_while(char::is_ascii_digit).collect();
    digits.parse::<u64>().map_err(|_| {
        FtpError::InvalidReply(format!("SIZE reply without a byte count: {}", reply.message))
    })
}
