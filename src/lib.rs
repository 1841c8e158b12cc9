pub mod audio;
pub mod classify;
pub mod config;
pub mod episode;
pub mod error;
pub mod extractor;
pub mod feed;
pub mod http;
pub mod pipeline;
pub mod progress;
pub mod storage;
pub mod transcription;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use audio::{AudioSource, AudioStrategy, LocatorSettings, locate_audio};
pub use classify::{Classification, KnownFeeds, PodcastReference, classify_reference};
pub use config::{Config, LogFormat};
pub use episode::{Selection, select_episode};
pub use error::{
    ConfigError, DownloadError, ExtractorError, FeedError, LookupError, ResolveError, ScrapeError,
    TranscriptionError,
};
pub use extractor::{ExtractedMedia, MediaExtractor, YtDlpExtractor};
pub use feed::{Enclosure, EpisodeEntry, FeedDocument, ResolvedFeed, parse_feed, resolve_feed};
pub use http::{HttpClient, HttpResponse, ReqwestClient, RequestOptions};
pub use pipeline::{
    AudioLocation, PodcastResolution, PodcastResolver, ResolvedAudio, ResolverSettings,
};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use storage::{AudioStore, StoredAudioAsset, download_to_store, generate_filename};
pub use transcription::{
    Sentence, Transcriber, TranscriptionBackend, WhisperApiBackend, WhisperApiSettings,
};
