//! Directory listing: MLSD and legacy LIST decoding (RFC 3659, RFC 959)
//!
//! The strategy is chosen once per session after FEAT: `MLSD` when the
//! server advertises it, the Unix `LIST` grammar otherwise.

use crate::commands::{self, Command};
use crate::data::DataStream;
use crate::error::{FtpError, Result};
use chrono::{DateTime, NaiveDateTime, TimeDelta, TimeZone, Utc};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::timeout;

/// Kind of a remote filesystem node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link, and any MLSD type that is neither `file` nor `dir`
    SymbolicLink,
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// Entry name as sent by the server
    pub name: String,
    /// Node kind
    pub node_type: NodeType,
    /// Size in bytes; 0 when the listing does not carry one
    pub size: u64,
    /// Last modification time; Unix epoch when unavailable or unparsable
    pub modified: DateTime<Utc>,
}

impl NodeInfo {
    /// Whether this entry is a regular file
    pub fn is_file(&self) -> bool {
        self.node_type == NodeType::File
    }

    /// Whether this entry is a directory
    pub fn is_directory(&self) -> bool {
        self.node_type == NodeType::Directory
    }
}

/// Listing command the session settled on after FEAT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingStrategy {
    /// Legacy human-readable `LIST`
    #[default]
    List,
    /// Machine-parseable `MLSD`
    Mlsd,
}

impl ListingStrategy {
    pub(crate) fn command(self) -> Command {
        match self {
            ListingStrategy::List => commands::list(),
            ListingStrategy::Mlsd => commands::mlsd(),
        }
    }

    /// Decode one listing line; `None` for lines that carry no entry
    /// (`total N` headers, malformed facts, blanks)
    pub fn decode(self, line: &str) -> Option<NodeInfo> {
        match self {
            ListingStrategy::List => parse_list_line(line),
            ListingStrategy::Mlsd => parse_mlsd_line(line),
        }
    }
}

/// Sort key for listing results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    /// Lexicographic by entry name
    Name,
    /// By modification time
    Modified,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Stable in-place sort of listing entries
pub fn sort_nodes(nodes: &mut [NodeInfo], by: SortBy, order: SortOrder) {
    nodes.sort_by(|a, b| {
        let ordering = match by {
            SortBy::Name => a.name.cmp(&b.name),
            SortBy::Modified => a.modified.cmp(&b.modified),
        };
        match order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });
}

/// Decode an MLSD fact line: `key=value;...;key=value; name`
///
/// Keys are matched case-insensitively. Missing `size` defaults to 0;
/// missing or malformed `modify` defaults to the epoch; `type` values other
/// than `file`/`dir` (including `cdir`/`pdir`) decode as symbolic links.
pub fn parse_mlsd_line(line: &str) -> Option<NodeInfo> {
    let (facts, name) = line.split_once(' ')?;
    if name.is_empty() {
        return None;
    }

    let mut node_type = NodeType::File;
    let mut size = 0u64;
    let mut modified = DateTime::UNIX_EPOCH;

    for fact in facts.split(';').filter(|f| !f.is_empty()) {
        let Some((key, value)) = fact.split_once('=') else {
            continue;
        };
        if key.eq_ignore_ascii_case("type") {
            node_type = match value.to_ascii_lowercase().as_str() {
                "dir" => NodeType::Directory,
                "file" => NodeType::File,
                _ => NodeType::SymbolicLink,
            };
        } else if key.eq_ignore_ascii_case("size") {
            size = value.parse().unwrap_or(0);
        } else if key.eq_ignore_ascii_case("modify") {
            modified = parse_mlsd_timestamp(value);
        }
    }

    Some(NodeInfo {
        name: name.to_string(),
        node_type,
        size,
        modified,
    })
}

/// Parse `yyyyMMddHHmmss` or `yyyyMMddHHmmss.fff` (UTC) per RFC 3659 §2.3
fn parse_mlsd_timestamp(value: &str) -> DateTime<Utc> {
    let (seconds, fraction) = match value.split_once('.') {
        Some((s, f)) => (s, Some(f)),
        None => (value, None),
    };

    let Ok(naive) = NaiveDateTime::parse_from_str(seconds, "%Y%m%d%H%M%S") else {
        return DateTime::UNIX_EPOCH;
    };

    let millis: i64 = fraction
        .map(|f| f.chars().take(3).collect::<String>())
        .and_then(|f| f.parse().ok())
        .unwrap_or(0);

    Utc.from_utc_datetime(&naive) + TimeDelta::milliseconds(millis)
}

/// Decode a Unix-style LIST line
///
/// `-rw-r--r-- 1 ftp ftp 1024 Jan 15 12:34 name with spaces`
///
/// Requires at least nine whitespace-separated fields; the name is the
/// remainder of the line starting at field nine, inner spacing preserved.
/// LIST carries no machine-readable timestamp, so `modified` stays at the
/// epoch.
pub fn parse_list_line(line: &str) -> Option<NodeInfo> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 9 {
        return None;
    }

    let node_type = match fields[0].chars().next()? {
        'd' => NodeType::Directory,
        'l' => NodeType::SymbolicLink,
        _ => NodeType::File,
    };
    let size = fields[4].parse().unwrap_or(0);

    let name_start = field_start(line, 8)?;
    let name = &line[name_start..];
    if name.is_empty() {
        return None;
    }

    Some(NodeInfo {
        name: name.to_string(),
        node_type,
        size,
        modified: DateTime::UNIX_EPOCH,
    })
}

/// Byte offset where the n-th (0-based) whitespace-separated field begins
fn field_start(line: &str, n: usize) -> Option<usize> {
    let mut count = 0;
    let mut in_field = false;
    for (i, ch) in line.char_indices() {
        if ch.is_whitespace() {
            in_field = false;
        } else if !in_field {
            in_field = true;
            if count == n {
                return Some(i);
            }
            count += 1;
        }
    }
    None
}

/// Lazily yields listing entries as lines arrive on the data channel
///
/// Exhausting the stream closes the data connection and consumes the
/// terminal control reply; entries are never materialized as a whole.
pub struct NodeStream {
    reader: Option<BufReader<DataStream>>,
    strategy: ListingStrategy,
    timeout: Duration,
}

impl NodeStream {
    pub(crate) fn new(stream: DataStream, strategy: ListingStrategy, timeout: Duration) -> Self {
        Self {
            reader: Some(BufReader::new(stream)),
            strategy,
            timeout,
        }
    }

    /// Next decoded entry, or `None` once the listing is exhausted
    pub async fn next_node(&mut self) -> Result<Option<NodeInfo>> {
        loop {
            let mut raw = Vec::new();
            let n = {
                let Some(reader) = self.reader.as_mut() else {
                    return Ok(None);
                };
                timeout(self.timeout, reader.read_until(b'\n', &mut raw))
                    .await
                    .map_err(|_| FtpError::Timeout)??
            };

            if n == 0 {
                if let Some(reader) = self.reader.take() {
                    reader.into_inner().finish().await?;
                }
                return Ok(None);
            }

            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\r', '\n']);
            if let Some(node) = self.strategy.decode(line) {
                return Ok(Some(node));
            }
        }
    }

    /// Drain the stream into a vector
    pub async fn collect_all(mut self) -> Result<Vec<NodeInfo>> {
        let mut nodes = Vec::new();
        while let Some(node) = self.next_node().await? {
            nodes.push(node);
        }
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mlsd_file_line() {
        let node =
            parse_mlsd_line("type=file;size=1024;modify=20240115123456; report.txt").unwrap();
        assert_eq!(node.name, "report.txt");
        assert_eq!(node.node_type, NodeType::File);
        assert_eq!(node.size, 1024);
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 12, 34, 56).unwrap();
        assert_eq!(node.modified, expected);
    }

    #[test]
    fn test_mlsd_directory_line() {
        let node = parse_mlsd_line("type=dir;modify=20240101000000; pub").unwrap();
        assert_eq!(node.node_type, NodeType::Directory);
        assert_eq!(node.size, 0);
    }

    #[test]
    fn test_mlsd_fractional_timestamp() {
        let node = parse_mlsd_line("type=file;modify=20240115123456.500; x").unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 12, 34, 56).unwrap()
            + TimeDelta::milliseconds(500);
        assert_eq!(node.modified, expected);
    }

    #[test]
    fn test_mlsd_cdir_pdir_decode_as_symlink() {
        let node = parse_mlsd_line("type=cdir; .").unwrap();
        assert_eq!(node.node_type, NodeType::SymbolicLink);
        let node = parse_mlsd_line("type=pdir; ..").unwrap();
        assert_eq!(node.node_type, NodeType::SymbolicLink);
        let node = parse_mlsd_line("type=OS.unix=slink:/target; link").unwrap();
        assert_eq!(node.node_type, NodeType::SymbolicLink);
    }

    #[test]
    fn test_mlsd_missing_size_and_modify_defaults() {
        let node = parse_mlsd_line("type=file; bare").unwrap();
        assert_eq!(node.size, 0);
        assert_eq!(node.modified, DateTime::UNIX_EPOCH);

        let node = parse_mlsd_line("type=file;size=junk;modify=notatime; bare").unwrap();
        assert_eq!(node.size, 0);
        assert_eq!(node.modified, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_mlsd_case_insensitive_keys() {
        let node = parse_mlsd_line("Type=DIR;Size=5; data").unwrap();
        assert_eq!(node.node_type, NodeType::Directory);
        assert_eq!(node.size, 5);
    }

    #[test]
    fn test_mlsd_name_with_spaces() {
        let node = parse_mlsd_line("type=file;size=1; my file.txt").unwrap();
        assert_eq!(node.name, "my file.txt");
    }

    #[test]
    fn test_mlsd_line_without_name_skipped() {
        assert!(parse_mlsd_line("type=file;size=1;").is_none());
    }

    #[test]
    fn test_list_file_line() {
        let node =
            parse_list_line("-rw-r--r--    1 ftp      ftp          1024 Jan 15 12:34 report.txt")
                .unwrap();
        assert_eq!(node.name, "report.txt");
        assert_eq!(node.node_type, NodeType::File);
        assert_eq!(node.size, 1024);
        assert_eq!(node.modified, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_list_directory_and_symlink_lines() {
        let node = parse_list_line("drwxr-xr-x 2 ftp ftp 4096 Jan 15 12:34 pub").unwrap();
        assert_eq!(node.node_type, NodeType::Directory);

        let node = parse_list_line("lrwxrwxrwx 1 ftp ftp 9 Jan 15 12:34 link -> target").unwrap();
        assert_eq!(node.node_type, NodeType::SymbolicLink);
        assert_eq!(node.name, "link -> target");
    }

    #[test]
    fn test_list_name_preserves_inner_spacing() {
        let node = parse_list_line("-rw-r--r-- 1 ftp ftp 10 Jan 15 12:34 two  spaces.txt").unwrap();
        assert_eq!(node.name, "two  spaces.txt");
    }

    #[test]
    fn test_list_total_header_skipped() {
        assert!(parse_list_line("total 12").is_none());
        assert!(parse_list_line("").is_none());
    }

    #[test]
    fn test_sort_stability_and_orders() {
        let make = |name: &str, secs: i64| NodeInfo {
            name: name.to_string(),
            node_type: NodeType::File,
            size: 0,
            modified: Utc.timestamp_opt(secs, 0).unwrap(),
        };
        let mut nodes = vec![make("b", 2), make("a", 1), make("c", 2)];

        sort_nodes(&mut nodes, SortBy::Name, SortOrder::Ascending);
        let names: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);

        sort_nodes(&mut nodes, SortBy::Modified, SortOrder::Descending);
        let names: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
        // b and c share a timestamp; stable sort keeps their relative order
        assert_eq!(names, ["b", "c", "a"]);
    }
}
