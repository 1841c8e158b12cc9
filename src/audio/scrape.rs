use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::ScrapeError;
use crate::http::{HttpClient, RequestOptions};

/// Tried in order; the first pattern with an acceptable match wins
static AUDIO_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)["'](https?://[^"']*\.(?:mp3|m4a|wav|ogg)[^"']*)["']"#,
        r#"(?i)audioUrl["']?\s*[:=]\s*["']([^"']+)["']"#,
        r#"(?i)<audio[^>]*src=["']([^"']+)["']"#,
        r#"(?i)<source[^>]*src=["']([^"']+)["']"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("audio pattern is valid"))
    .collect()
});

const AUDIO_HINTS: [&str; 6] = [".mp3", ".m4a", ".wav", ".ogg", "audio", "podcast"];

/// The loose patterns also hit tracking pixels; require an audio hint too
fn looks_like_audio(candidate: &str) -> bool {
    let lower = candidate.to_lowercase();
    AUDIO_HINTS.iter().any(|hint| lower.contains(hint))
}

/// Undo HTML entity and JSON slash escaping, then resolve against the page
fn normalize_candidate(raw: &str, page_url: Option<&Url>) -> String {
    let decoded = html_escape::decode_html_entities(raw).replace("\\/", "/");
    match page_url {
        Some(base) if Url::parse(&decoded).is_err() => base
            .join(&decoded)
            .map(String::from)
            .unwrap_or(decoded),
        _ => decoded,
    }
}

/// Find an audio URL in an episode webpage
pub fn scrape_audio_url(html: &str, page_url: &str) -> Option<String> {
    let base = Url::parse(page_url).ok();

    AUDIO_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures_iter(html)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .find(|candidate| looks_like_audio(candidate))
            .map(|candidate| normalize_candidate(candidate, base.as_ref()))
    })
}

/// Fetch an episode webpage and scrape it
pub async fn fetch_and_scrape<C: HttpClient + ?Sized>(
    client: &C,
    page_url: &str,
    options: RequestOptions,
) -> Result<Option<String>, ScrapeError> {
    let response = client
        .get(page_url, options)
        .await
        .map_err(|e| ScrapeError::FetchFailed {
            url: page_url.to_string(),
            source: e,
        })?;

    if !response.is_success() {
        return Err(ScrapeError::HttpStatus {
            url: page_url.to_string(),
            status: response.status,
        });
    }

    let html = String::from_utf8_lossy(&response.body);
    Ok(scrape_audio_url(&html, page_url))
}
