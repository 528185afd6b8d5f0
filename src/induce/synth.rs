use regex::Regex;
use serde::Serialize;

use super::candidate::{classify, strip_header, Kind};
use super::error::{InduceError, Result};

/// Lazy filler between the generalized prefix and the suffix.
pub const WILDCARD: &str = r"\S*?";

const LOWER: &str = "[a-z]";
const UPPER: &str = "[A-Z]";
const DIGIT: &str = "[0-9]";

/// A regular expression induced from one block.
///
/// Tag patterns capture the relative path in group 1 and carry the host of
/// the page they came from so matches can be turned back into absolute URLs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    pub kind: Kind,
    pub regex: String,
    pub host: Option<String>,
}

impl Pattern {
    pub fn compile(&self) -> Result<Regex> {
        Regex::new(&self.regex).map_err(|e| InduceError::InvalidPattern(e.to_string()))
    }

    /// Every absolute URL this pattern finds in `text`, in page order.
    pub fn find_urls(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.collect_urls(&self.compile()?, text))
    }

    /// Like [`Pattern::find_urls`] with a regex compiled once by the caller.
    pub fn collect_urls(&self, re: &Regex, text: &str) -> Vec<String> {
        match (&self.kind, &self.host) {
            (Kind::TagAttribute, Some(host)) => re
                .captures_iter(text)
                .filter_map(|c| c.get(1))
                .map(|m| format!("{}{}", host, m.as_str()))
                .collect(),
            _ => re.find_iter(text).map(|m| m.as_str().to_string()).collect(),
        }
    }
}

/// Induce one pattern matching every item of a block (or a slice of one).
///
/// All items must classify to the same [`Kind`] and end in a resource
/// suffix. `host` is attached only to tag-attribute patterns.
pub fn synthesize(items: &[String], host: &str) -> Result<Pattern> {
    let first = items.first().ok_or(InduceError::EmptySelection {
        start: None,
        end: None,
        len: 0,
    })?;
    let kind = classify(first).ok_or_else(|| not_a_candidate(first))?;
    for item in &items[1..] {
        match classify(item) {
            Some(k) if k == kind => {}
            Some(_) => {
                return Err(InduceError::InhomogeneousBlock(
                    "block mixes absolute URLs and tag attributes".into(),
                ))
            }
            None => return Err(not_a_candidate(item)),
        }
    }

    let items: Vec<&str> = items.iter().map(String::as_str).collect();
    match kind {
        Kind::AbsoluteUrl => url_pattern(&items),
        Kind::TagAttribute => tag_pattern(&items, host),
    }
}

fn url_pattern(items: &[&str]) -> Result<Pattern> {
    let shape = Shape::of(items)?;
    let shared = &items[0][..shape.shared];
    let (scheme, rest) = shared
        .split_once("//")
        .ok_or_else(|| {
            InduceError::InhomogeneousBlock(
                "items do not share a scheme; choose a single-scheme slice with --start/--end"
                    .into(),
            )
        })?;

    let mut segments = rest.split('/');
    let authority = segments.next().unwrap_or_default();

    let mut regex = String::with_capacity(shared.len() * LOWER.len() + 16);
    regex.push_str(&regex::escape(scheme));
    regex.push_str("//");
    regex.push_str(&regex::escape(authority));
    for segment in segments {
        regex.push('/');
        generalize(segment, &mut regex);
    }
    if shape.wildcard {
        regex.push_str(WILDCARD);
    }
    regex.push_str(&shape.suffix_tail());

    Ok(Pattern {
        kind: Kind::AbsoluteUrl,
        regex,
        host: None,
    })
}

fn tag_pattern(items: &[&str], host: &str) -> Result<Pattern> {
    let common = longest_common_run(items);
    let (header, _) = strip_header(&items[0][..common]).ok_or_else(|| {
        InduceError::InhomogeneousBlock("items do not share an attribute header".into())
    })?;

    let bodies: Vec<&str> = items.iter().map(|s| &s[header.len()..]).collect();
    let shape = Shape::of(&bodies)?;

    let mut regex = String::with_capacity(shape.shared * LOWER.len() + header.len() + 24);
    regex.push_str(&regex::escape(header));
    regex.push('(');
    generalize(&bodies[0][..shape.shared], &mut regex);
    if shape.wildcard {
        regex.push_str(WILDCARD);
    }
    regex.push_str(&shape.suffix_tail());
    regex.push(')');
    regex.push_str(r#"\S*""#);

    Ok(Pattern {
        kind: Kind::TagAttribute,
        regex,
        host: Some(host.to_string()),
    })
}

/// Where a block's items agree, and what follows.
struct Shape<'a> {
    /// Byte length of the literal region shared by every item, never
    /// reaching past any item's suffix dot.
    shared: usize,
    /// Some item continues past `shared` before its suffix.
    wildcard: bool,
    /// Distinct suffixes in first-seen order.
    suffixes: Vec<&'a str>,
}

impl<'a> Shape<'a> {
    fn of(items: &[&'a str]) -> Result<Self> {
        let mut shared = longest_common_run(items);
        let mut dots = Vec::with_capacity(items.len());
        let mut suffixes: Vec<&str> = Vec::new();
        for item in items {
            let (dot, suffix) = resource_suffix(item).ok_or_else(|| {
                InduceError::InhomogeneousBlock(format!("{:?} has no resource suffix", item))
            })?;
            if !suffixes.contains(&suffix) {
                suffixes.push(suffix);
            }
            dots.push(dot);
        }
        if let Some(&min_dot) = dots.iter().min() {
            shared = shared.min(min_dot);
        }
        let wildcard = dots.iter().any(|&d| d > shared);
        Ok(Self {
            shared,
            wildcard,
            suffixes,
        })
    }

    fn suffix_tail(&self) -> String {
        let escaped: Vec<String> = self.suffixes.iter().map(|s| regex::escape(s)).collect();
        if escaped.len() == 1 {
            format!(r"\.{}", escaped[0])
        } else {
            format!(r"\.(?:{})", escaped.join("|"))
        }
    }
}

/// Byte length of the prefix shared by the whole block: the full item for a
/// single item, otherwise the shortest prefix shared by adjacent pairs.
pub fn longest_common_run(items: &[&str]) -> usize {
    match items {
        [] => 0,
        [only] => only.len(),
        _ => items
            .windows(2)
            .map(|w| common_prefix_len(w[0], w[1]))
            .min()
            .unwrap_or(0),
    }
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .map(|(c, _)| c.len_utf8())
        .sum()
}

/// Position of the suffix dot and the suffix itself, ignoring any query,
/// fragment and quotes after the path.
fn resource_suffix(item: &str) -> Option<(usize, &str)> {
    let end = item.find(['?', '#']).unwrap_or(item.len());
    let path = item[..end].trim_end_matches('"');
    let dot = path.rfind('.')?;
    let suffix = &path[dot + 1..];
    if suffix.is_empty() || suffix.contains('/') || suffix.contains('"') {
        return None;
    }
    Some((dot, suffix))
}

/// Replace letters and digits by their character class; everything else
/// stays literal.
fn generalize(s: &str, out: &mut String) {
    let mut buf = [0u8; 4];
    for c in s.chars() {
        match c {
            'a'..='z' => out.push_str(LOWER),
            'A'..='Z' => out.push_str(UPPER),
            '0'..='9' => out.push_str(DIGIT),
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
}

fn not_a_candidate(item: &str) -> InduceError {
    InduceError::InhomogeneousBlock(format!("{:?} is neither a URL nor a tag attribute", item))
}
