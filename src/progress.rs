use std::sync::Arc;

use crate::audio::AudioStrategy;

/// Events emitted while resolving a podcast reference
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// The reference was classified and feed candidates derived
    ClassifiedReference {
        reference: String,
        is_platform_page: bool,
        episode_id: Option<String>,
        candidate_count: usize,
    },

    /// A feed candidate is being fetched
    TryingFeed { url: String, attempt: usize },

    /// A feed candidate failed or produced no episodes
    FeedCandidateFailed { url: String, reason: String },

    /// A feed candidate produced at least one episode
    FeedResolved {
        url: String,
        feed_title: String,
        episode_count: usize,
    },

    /// An episode was chosen from the feed
    EpisodeSelected {
        episode_title: String,
        /// False when an episode id was requested but not found
        matched_id: bool,
    },

    /// One audio location strategy came up empty
    AudioStrategyFailed {
        strategy: AudioStrategy,
        reason: String,
    },

    /// A downloadable audio URL was found
    AudioLocated { strategy: AudioStrategy, url: String },

    /// Falling back to the whole-URL media extractor
    ExtractorStarted { url: String },

    /// A direct download is starting
    DownloadStarting {
        title: String,
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// The audio file is in the store
    DownloadCompleted { filename: String, bytes: u64 },

    /// Transcription has been requested
    Transcribing { path: String },

    /// Transcription returned
    TranscriptionCompleted { sentence_count: usize, duration: f64 },
}

/// Trait for reporting progress events during resolution.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
