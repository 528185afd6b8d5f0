pub mod candidate;
pub mod cluster;
pub mod error;
pub mod extract;
pub mod similarity;
pub mod synth;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use candidate::{classify, strip_header, Kind};
pub use error::{InduceError, Result};
pub use synth::Pattern;

/// Minimum anchor similarity for an item to join a block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityThreshold(f64);

impl SimilarityThreshold {
    pub fn new(value: f64) -> Result<Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InduceError::InvalidThreshold(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Ordered candidates judged similar to the first one (the anchor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub items: Vec<String>,
}

impl Block {
    pub fn new(items: Vec<String>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `start` and `end` select the inclusive range, `start` alone a single
    /// item. Without `start` the whole block is taken and `end` is ignored.
    pub fn select(&self, start: Option<usize>, end: Option<usize>) -> Result<&[String]> {
        let len = self.items.len();
        let range = match (start, end) {
            (Some(s), Some(e)) if s <= e && e < len => s..e + 1,
            (Some(s), None) if s < len => s..s + 1,
            (None, _) if !self.is_empty() => 0..len,
            _ => return Err(InduceError::EmptySelection { start, end, len }),
        };
        Ok(&self.items[range])
    }
}

/// Blocks from one clustering pass plus the host of the scanned page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub host: String,
    pub blocks: Vec<Block>,
}

impl ResultSet {
    pub fn block(&self, index: usize) -> Result<&Block> {
        self.blocks.get(index).ok_or(InduceError::UnknownBlock {
            index,
            count: self.blocks.len(),
        })
    }

    /// Synthesize a fresh pattern from a block or a slice of one.
    pub fn pattern(&self, index: usize, start: Option<usize>, end: Option<usize>) -> Result<Pattern> {
        let items = self.block(index)?.select(start, end)?;
        synth::synthesize(items, &self.host)
    }

    /// Human-readable form: tag candidates are resolved against the host.
    pub fn display_form(&self, item: &str) -> String {
        match (classify(item), strip_header(item)) {
            (Some(Kind::TagAttribute), Some((_, path))) => {
                format!("{}{}", self.host, path.strip_suffix('"').unwrap_or(path))
            }
            _ => item.to_string(),
        }
    }

    pub fn item_count(&self) -> usize {
        self.blocks.iter().map(Block::len).sum()
    }
}

/// Extract, filter and cluster the candidates of one decoded page.
pub fn analyze<S: AsRef<str>>(
    text: &str,
    host: &str,
    suffixes: &[S],
    threshold: SimilarityThreshold,
) -> Result<ResultSet> {
    let raw = extract::extract(text, suffixes)?;
    let total = raw.len();
    let candidates: Vec<String> = raw
        .into_iter()
        .filter(|c| {
            let ok = classify(c).is_some();
            if !ok {
                debug!(candidate = %c, "rejected by classifier");
            }
            ok
        })
        .collect();

    if candidates.is_empty() {
        return Err(InduceError::NoCandidatesFound);
    }

    let blocks = cluster::cluster(candidates, threshold);
    info!(
        raw = total,
        blocks = blocks.len(),
        threshold = threshold.value(),
        "clustered candidates"
    );
    Ok(ResultSet {
        host: host.to_string(),
        blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold() -> SimilarityThreshold {
        SimilarityThreshold::new(0.6).unwrap()
    }

    fn set(blocks: &[&[&str]]) -> ResultSet {
        ResultSet {
            host: "https://a.com".into(),
            blocks: blocks
                .iter()
                .map(|b| Block::new(b.iter().map(|s| s.to_string()).collect()))
                .collect(),
        }
    }

    #[test]
    fn threshold_bounds() {
        assert!(SimilarityThreshold::new(0.0).is_ok());
        assert!(SimilarityThreshold::new(1.0).is_ok());
        assert_eq!(
            SimilarityThreshold::new(1.5),
            Err(InduceError::InvalidThreshold(1.5))
        );
        assert!(SimilarityThreshold::new(f64::NAN).is_err());
    }

    #[test]
    fn selection_rules() {
        let block = Block::new(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(block.select(None, None).unwrap(), ["a", "b", "c"]);
        assert_eq!(block.select(Some(1), None).unwrap(), ["b"]);
        assert_eq!(block.select(Some(0), Some(1)).unwrap(), ["a", "b"]);
        assert_eq!(block.select(Some(2), Some(2)).unwrap(), ["c"]);
    }

    #[test]
    fn lone_end_takes_whole_block() {
        let block = Block::new(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(block.select(None, Some(1)).unwrap(), ["a", "b", "c"]);
        assert_eq!(block.select(None, Some(9)).unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn selection_errors() {
        let block = Block::new(vec!["a".into(), "b".into()]);
        for (start, end) in [(Some(2), None), (Some(1), Some(0)), (Some(0), Some(2))] {
            assert_eq!(
                block.select(start, end),
                Err(InduceError::EmptySelection { start, end, len: 2 })
            );
        }
        assert!(Block::new(Vec::new()).select(None, None).is_err());
        assert!(Block::new(Vec::new()).select(None, Some(0)).is_err());
    }

    #[test]
    fn unknown_block() {
        let rs = set(&[&["https://a.com/x.html"]]);
        assert_eq!(
            rs.pattern(3, None, None),
            Err(InduceError::UnknownBlock { index: 3, count: 1 })
        );
    }

    #[test]
    fn display_resolves_tags() {
        let rs = set(&[]);
        assert_eq!(rs.display_form(r#"href="/a/b.html""#), "https://a.com/a/b.html");
        assert_eq!(rs.display_form("https://c.org/x.zip"), "https://c.org/x.zip");
    }

    #[test]
    fn nothing_found_is_distinct() {
        let err = analyze("<p>plain text</p>", "https://a.com", &["html"], threshold());
        assert_eq!(err, Err(InduceError::NoCandidatesFound));
    }

    #[test]
    fn classifier_filters_bad_matches() {
        // "://x.html" matches the URL template with an empty scheme.
        let err = analyze("see ://x.html", "https://a.com", &["html"], threshold());
        assert_eq!(err, Err(InduceError::NoCandidatesFound));
    }

    #[test]
    fn single_item_round_trip() {
        let rs = analyze(
            r#"<a href="https://a.com/issues/Index2.html">"#,
            "https://a.com",
            &["html"],
            threshold(),
        )
        .unwrap();
        assert_eq!(rs.blocks.len(), 1);
        let p = rs.pattern(0, None, None).unwrap();
        assert!(!p.regex.contains(synth::WILDCARD));
        assert!(p.regex.ends_with(r"\.html"));
        assert!(p.compile().unwrap().is_match("https://a.com/issues/Index2.html"));
    }

    #[test]
    fn fixture_page_round_trip() {
        let html = std::fs::read_to_string("tests/fixtures/issues.html").unwrap();
        let rs = analyze(&html, "https://a.com", &["html", "zip"], threshold()).unwrap();
        assert!(rs.blocks.len() >= 2);

        let mut synthesized = 0;
        for (i, block) in rs.blocks.iter().enumerate() {
            // Loose thresholds may mix kinds; those blocks are rejected, not mangled.
            match rs.pattern(i, None, None) {
                Ok(p) => {
                    let re = p.compile().unwrap();
                    for item in &block.items {
                        assert!(re.is_match(item), "{} vs {}", p.regex, item);
                    }
                    synthesized += 1;
                }
                Err(e) => assert!(matches!(e, InduceError::InhomogeneousBlock(_))),
            }
        }
        assert!(synthesized >= 2);
    }

    #[test]
    fn fixture_tag_block_finds_siblings() {
        let html = std::fs::read_to_string("tests/fixtures/issues.html").unwrap();
        let strict = SimilarityThreshold::new(0.8).unwrap();
        let rs = analyze(&html, "https://a.com", &["html"], strict).unwrap();
        let (index, _) = rs
            .blocks
            .iter()
            .enumerate()
            .find(|(_, b)| b.len() > 1 && b.items.iter().all(|s| s.starts_with("href=\"/issues/")))
            .unwrap();
        let p = rs.pattern(index, None, None).unwrap();
        assert_eq!(p.host.as_deref(), Some("https://a.com"));

        let next_page = std::fs::read_to_string("tests/fixtures/issues_page2.html").unwrap();
        let urls = p.find_urls(&next_page).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://a.com/issues/close.html".to_string(),
                "https://a.com/issues/label.html".to_string(),
            ]
        );
    }
}
