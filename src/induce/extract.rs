use regex::Regex;
use tracing::debug;

use super::candidate::HEADER_SHAPE;
use super::error::{InduceError, Result};

/// Build the two search templates for one resource suffix:
/// absolute URL first, then tag attribute.
pub fn templates(suffix: &str) -> Result<[Regex; 2]> {
    let suffix = regex::escape(suffix);
    let url = format!(r"(?:[a-z]{{0,5}})://\S+?\.{}", suffix);
    let tag = format!(r#"(?:{})/\S+\.{}\S*""#, HEADER_SHAPE, suffix);
    let build = |p: &str| Regex::new(p).map_err(|e| InduceError::InvalidPattern(e.to_string()));
    Ok([build(&url)?, build(&tag)?])
}

/// Find every raw candidate for the given suffixes, in template order.
/// An empty result is not an error here; the pipeline decides what it means.
pub fn extract<S: AsRef<str>>(text: &str, suffixes: &[S]) -> Result<Vec<String>> {
    let mut found = Vec::new();
    for suffix in suffixes {
        for re in templates(suffix.as_ref())? {
            let before = found.len();
            found.extend(re.find_iter(text).map(|m| m.as_str().to_string()));
            debug!(template = re.as_str(), matches = found.len() - before, "template scan");
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_urls() {
        let text = r#"<a href="https://a.com/issues/index.html">x</a> see https://a.com/b.html"#;
        let found = extract(text, &["html"]).unwrap();
        assert_eq!(found, vec!["https://a.com/issues/index.html", "https://a.com/b.html"]);
    }

    #[test]
    fn url_match_is_lazy() {
        let found = extract("http://a.com/x.html.html", &["html"]).unwrap();
        assert_eq!(found, vec!["http://a.com/x.html"]);
    }

    #[test]
    fn tag_attributes() {
        let text = r#"<a href="/issues/index.html">i</a><img src = "/img/a.html?v=2">"#;
        let found = extract(text, &["html"]).unwrap();
        assert_eq!(
            found,
            vec![r#"href="/issues/index.html""#, r#"src = "/img/a.html?v=2""#]
        );
    }

    #[test]
    fn relative_without_leading_slash_ignored() {
        let found = extract(r#"<a href="issues/index.html">"#, &["html"]).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn order_follows_suffixes_then_templates() {
        let text = r#"<a href="/a.zip"> http://h.org/b.zip <a href="/c.html"> http://h.org/d.html"#;
        let found = extract(text, &["html", "zip"]).unwrap();
        assert_eq!(
            found,
            vec![
                "http://h.org/d.html",
                r#"href="/c.html""#,
                "http://h.org/b.zip",
                r#"href="/a.zip""#,
            ]
        );
    }

    #[test]
    fn suffix_is_literal() {
        // A dot in the suffix must not act as a wildcard.
        let found = extract("http://a.com/x.tarXgz http://a.com/y.tar.gz", &["tar.gz"]).unwrap();
        assert_eq!(found, vec!["http://a.com/y.tar.gz"]);
    }

    #[test]
    fn nothing_found() {
        let found = extract("<p>no links here</p>", &["html", "zip"]).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn fixture_page() {
        let html = std::fs::read_to_string("tests/fixtures/issues.html").unwrap();
        let found = extract(&html, &["html"]).unwrap();
        assert!(found.iter().any(|c| c.starts_with("https://")));
        assert!(found.iter().any(|c| c.starts_with("href=\"/issues/")));
    }
}
