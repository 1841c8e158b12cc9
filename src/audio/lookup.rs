use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::LookupError;
use crate::http::{HttpClient, RequestOptions};

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResult {
    preview_url: Option<String>,
    episode_url: Option<String>,
}

/// `<endpoint>?id=<episode_id>`
pub fn lookup_url(endpoint: &str, episode_id: &str) -> Result<Url, LookupError> {
    let mut url = Url::parse(endpoint)?;
    url.query_pairs_mut().append_pair("id", episode_id);
    Ok(url)
}

/// Ask the platform metadata API for an episode's audio URL.
///
/// `Ok(None)` means the API answered but had nothing playable.
pub async fn lookup_preview_url<C: HttpClient + ?Sized>(
    client: &C,
    endpoint: &str,
    episode_id: &str,
    timeout: Duration,
) -> Result<Option<String>, LookupError> {
    let url = lookup_url(endpoint, episode_id)?;
    let url = url.as_str();

    let response = client
        .get(url, RequestOptions::strict(timeout))
        .await
        .map_err(|e| LookupError::RequestFailed {
            url: url.to_string(),
            source: e,
        })?;

    if !response.is_success() {
        return Err(LookupError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    let parsed: LookupResponse =
        serde_json::from_slice(&response.body).map_err(|e| LookupError::InvalidJson {
            url: url.to_string(),
            source: e,
        })?;

    let audio_url = parsed.results.into_iter().next().and_then(|result| {
        result
            .preview_url
            .filter(|u| !u.trim().is_empty())
            .or(result.episode_url.filter(|u| !u.trim().is_empty()))
    });

    debug!(%url, found = audio_url.is_some(), "platform lookup answered");
    Ok(audio_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockHttpClient;

    const ENDPOINT: &str = "https://itunes.apple.com/lookup";
    const LOOKUP: &str = "https://itunes.apple.com/lookup?id=998877";

    fn timeout() -> Duration {
        Duration::from_secs(10)
    }

    #[test]
    fn lookup_url_appends_id() {
        assert_eq!(lookup_url(ENDPOINT, "998877").unwrap().as_str(), LOOKUP);
    }

    #[test]
    fn lookup_url_rejects_bad_endpoint() {
        assert!(matches!(
            lookup_url("not a url", "1"),
            Err(LookupError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn returns_preview_url_of_first_result() {
        let client = MockHttpClient::new().with(
            LOOKUP,
            r#"{"resultCount":2,"results":[{"previewUrl":"https://cdn/ep.m4a"},{"previewUrl":"https://cdn/other.m4a"}]}"#,
        );

        let url = lookup_preview_url(&client, ENDPOINT, "998877", timeout())
            .await
            .unwrap();

        assert_eq!(url.as_deref(), Some("https://cdn/ep.m4a"));
        assert_eq!(
            client.options_for(LOOKUP),
            Some(RequestOptions::strict(timeout()))
        );
    }

    #[tokio::test]
    async fn falls_back_to_episode_url() {
        let client = MockHttpClient::new().with(
            LOOKUP,
            r#"{"results":[{"previewUrl":"","episodeUrl":"https://cdn/full.mp3"}]}"#,
        );

        let url = lookup_preview_url(&client, ENDPOINT, "998877", timeout())
            .await
            .unwrap();

        assert_eq!(url.as_deref(), Some("https://cdn/full.mp3"));
    }

    #[tokio::test]
    async fn empty_results_yield_none() {
        let client = MockHttpClient::new().with(LOOKUP, r#"{"resultCount":0,"results":[]}"#);

        let url = lookup_preview_url(&client, ENDPOINT, "998877", timeout())
            .await
            .unwrap();

        assert!(url.is_none());
    }

    #[tokio::test]
    async fn malformed_json_is_an_error() {
        let client = MockHttpClient::new().with(LOOKUP, "<html>");

        let err = lookup_preview_url(&client, ENDPOINT, "998877", timeout())
            .await
            .unwrap_err();

        assert!(matches!(err, LookupError::InvalidJson { .. }));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let client = MockHttpClient::new().with_status(LOOKUP, 403, "{}");

        let err = lookup_preview_url(&client, ENDPOINT, "998877", timeout())
            .await
            .unwrap_err();

        assert!(matches!(err, LookupError::HttpStatus { status: 403, .. }));
    }
}
