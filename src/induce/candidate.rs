use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Attribute-assignment header such as `href="` or `src = "`.
pub const HEADER_SHAPE: &str = r#"[a-z]{0,10}\s*=\s*""#;

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{}", HEADER_SHAPE)).unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kind {
    AbsoluteUrl,
    TagAttribute,
}

/// Classify a raw match. `None` means the string is not a usable candidate.
pub fn classify(s: &str) -> Option<Kind> {
    let mut parts = s.split("://");
    if let (Some(scheme), Some(rest), None) = (parts.next(), parts.next(), parts.next()) {
        if !scheme.is_empty() && !rest.is_empty() {
            return Some(Kind::AbsoluteUrl);
        }
    }
    if HEADER_RE.is_match(s) {
        return Some(Kind::TagAttribute);
    }
    None
}

/// Split a tag candidate into its attribute header and the remainder.
pub fn strip_header(s: &str) -> Option<(&str, &str)> {
    let m = HEADER_RE.find(s)?;
    Some(s.split_at(m.end()))
}
