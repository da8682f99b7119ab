//! FEAT negotiation results (RFC 2389)
//!
//! The FEAT reply lists one extension per line, optionally with arguments
//! (e.g. `MLST type*;size*;modify*;`). Membership checks are
//! case-insensitive on the feature token.

use std::collections::HashMap;

/// Server-advertised feature set
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct Features {
    /// Uppercased feature token mapped to the rest of its line
    features: HashMap<String, String>,
}

impl Features {
    /// Create an empty feature set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the trimmed feature lines of a FEAT reply
    pub fn parse(lines: &[String]) -> Self {
        let mut features = HashMap::new();

        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (token, args) = match line.split_once(' ') {
                Some((token, args)) => (token, args.trim()),
                None => (line, ""),
            };
            features.insert(token.to_uppercase(), args.to_string());
        }

        Self { features }
    }

    /// Check if a feature is advertised
    #[must_use]
    pub fn has(&self, feature: &str) -> bool {
        self.features.contains_key(&feature.to_uppercase())
    }

    /// Argument string of a feature, if advertised
    #[must_use]
    pub fn args(&self, feature: &str) -> Option<&str> {
        self.features.get(&feature.to_uppercase()).map(String::as_str)
    }

    /// All advertised feature tokens
    pub fn list(&self) -> Vec<String> {
        self.features.keys().cloned().collect()
    }

    /// Whether any feature has been recorded
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_features() {
        let feats = Features::parse(&lines(&["UTF8", "MLSD", "REST STREAM", "SIZE"]));
        assert!(feats.has("UTF8"));
        assert!(feats.has("MLSD"));
        assert!(feats.has("REST"));
        assert!(feats.has("SIZE"));
        assert!(!feats.has("TVFS"));
    }

    #[test]
    fn test_case_insensitive_membership() {
        let feats = Features::parse(&lines(&["utf8", "Mlsd"]));
        assert!(feats.has("UTF8"));
        assert!(feats.has("utf8"));
        assert!(feats.has("MLSD"));
    }

    #[test]
    fn test_feature_args() {
        let feats = Features::parse(&lines(&["MLST type*;size*;modify*;", "REST STREAM"]));
        assert_eq!(feats.args("MLST"), Some("type*;size*;modify*;"));
        assert_eq!(feats.args("REST"), Some("STREAM"));
        assert_eq!(feats.args("UTF8"), None);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let feats = Features::parse(&lines(&["", "UTF8", "  "]));
        assert!(feats.has("UTF8"));
        assert_eq!(feats.list().len(), 1);
    }
}
