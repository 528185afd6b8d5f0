use std::time::Duration;

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::settings::Settings;

/// Tried in order; the first that decodes without errors wins.
pub const CHARSETS: &[&str] = &["utf-8", "gbk", "gb2312", "gb18030"];

const KNOWN_SCHEMES: &[&str] = &["http", "https", "ftp"];

#[derive(Debug, Error)]
#[error("page could not be decoded as any of {}", CHARSETS.join(", "))]
pub struct DecodeError;

pub fn decode(bytes: &[u8]) -> Result<String, DecodeError> {
    for label in CHARSETS {
        let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
            continue;
        };
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            debug!(charset = label, "decoded page");
            return Ok(text.into_owned());
        }
    }
    Err(DecodeError)
}

/// Add `http://` to scheme-less input and percent-encode non-ASCII text.
pub fn normalize_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    let with_scheme = match raw.split_once("://") {
        Some((scheme, _)) if KNOWN_SCHEMES.contains(&scheme) => raw.to_string(),
        _ => format!("http://{}", raw),
    };
    Url::parse(&with_scheme).with_context(|| format!("Invalid URL: {}", raw))
}

/// Scheme and authority, e.g. `https://a.com:8080`.
pub fn host_of(url: &Url) -> String {
    url[..url::Position::BeforePath].to_string()
}

pub fn client(settings: &Settings) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .user_agent(settings.user_agent.as_str())
        .danger_accept_invalid_certs(settings.accept_invalid_certs)
        .build()
        .context("Failed to build HTTP client")
}

/// GET a page and decode its body.
pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let bytes = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", url))?
        .error_for_status()?
        .bytes()
        .await
        .with_context(|| format!("Failed to read body of {}", url))?;
    debug!(url, bytes = bytes.len(), "fetched page");
    decode(&bytes).with_context(|| url.to_string())
}
