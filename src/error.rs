use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when fetching or parsing a single feed candidate
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for feed {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to parse feed from {url}: {source}")]
    ParseFailed {
        url: String,
        #[source]
        source: feed_rs::parser::ParseFeedError,
    },

    #[error("Feed {url} has no episodes")]
    NoEntries { url: String },
}

/// Errors from the platform metadata lookup API
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Invalid lookup endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("Lookup request to {url} failed: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} from lookup {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Malformed lookup response from {url}: {source}")]
    InvalidJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors while fetching an episode webpage for scraping
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Failed to fetch webpage {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for webpage {url}")]
    HttpStatus { url: String, status: u16 },
}

/// Errors that can occur during audio downloads
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {from} into place at {to}: {source}")]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download of {url} stalled: no data for {}s", .after.as_secs())]
    Stalled { url: String, after: Duration },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors raised by the whole-URL media extractor
#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("Failed to run {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} did not report a downloaded file for {url}")]
    MissingOutput { program: String, url: String },

    #[error("Failed to prepare staging directory in {path}: {source}")]
    StagingFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to store extracted file at {path}: {source}")]
    StoreFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the transcription collaborator
#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("Failed to read audio file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to compress {path} for upload: {reason}")]
    CompressionFailed { path: PathBuf, reason: String },

    #[error("Transcription request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Transcription API returned {status}: {body}")]
    ApiStatus { status: u16, body: String },

    #[error("Malformed transcription response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

/// Errors while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}")]
    Invalid { key: String, value: String },

    #[error("Invalid known feed entry '{0}', expected showId=feedUrl")]
    InvalidKnownFeed(String),
}

/// Caller-facing failure of a podcast resolution
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(
        "Could not resolve podcast link: {}",
        .last_error.as_deref().unwrap_or("no feed candidate produced any episodes")
    )]
    NoFeedAvailable { last_error: Option<String> },

    #[error(
        "No audio file found for '{title}'. The feed may not carry audio links; try another podcast source or a direct audio URL"
    )]
    NoAudioFound { title: String },

    #[error("Transcription is not configured; set TRANSCRIPTION_API_KEY")]
    TranscriptionUnavailable,

    #[error("Media extractor failed: {0}")]
    ExtractorFailure(#[from] ExtractorError),

    #[error("Audio download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Transcription failed: {0}")]
    Transcription(#[from] TranscriptionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_feed_available_carries_last_error() {
        let err = ResolveError::NoFeedAvailable {
            last_error: Some("HTTP error 500 for feed https://x/feed".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Could not resolve podcast link: HTTP error 500 for feed https://x/feed"
        );
    }

    #[test]
    fn no_feed_available_without_transport_error_mentions_entries() {
        let err = ResolveError::NoFeedAvailable { last_error: None };
        assert!(err.to_string().contains("no feed candidate produced any episodes"));
    }

    #[test]
    fn extractor_failure_wraps_source_message() {
        let err = ResolveError::from(ExtractorError::MissingOutput {
            program: "yt-dlp".to_string(),
            url: "https://x".to_string(),
        });
        assert!(matches!(err, ResolveError::ExtractorFailure(_)));
        assert!(err.to_string().contains("yt-dlp did not report"));
    }
}
