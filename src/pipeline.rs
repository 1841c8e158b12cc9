// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::audio::{AudioSource, AudioStrategy, LocatorSettings, locate_audio};
use crate::classify::{KnownFeeds, PodcastReference, classify_reference};
use crate::config::Config;
use crate::error::ResolveError;
use crate::extractor::MediaExtractor;
use crate::feed::resolve_feed;
use crate::http::{HttpClient, RequestOptions};
use crate::progress::{NoopReporter, ProgressEvent, SharedProgressReporter};
use crate::storage::{AudioStore, StoredAudioAsset, download_to_store};
use crate::transcription::{Sentence, TranscriptionBackend, Transcriber, duration_of};

/// Where the audio for the chosen episode lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioLocation {
    /// Still to be downloaded
    Remote(String),
    /// Already on disk, produced by the extractor
    Local(PathBuf),
}

/// Audio located for an episode, before it is fetched into the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAudio {
    pub title: String,
    pub location: AudioLocation,
    pub strategy: AudioStrategy,
}

/// Everything the caller gets back for one reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodcastResolution {
    pub title: String,
    pub audio_url: String,
    pub audio_path: PathBuf,
    pub sentences: Vec<Sentence>,
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_guid: Option<String>,
    pub source: AudioStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

/// Request policies and lookups used by the resolver
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub feed_options: RequestOptions,
    pub download_options: RequestOptions,
    pub locator: LocatorSettings,
    pub known_feeds: KnownFeeds,
}

impl ResolverSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            feed_options: RequestOptions::new(Some(config.feed_timeout), config.insecure_tls),
            download_options: RequestOptions::download(config.download_read_timeout),
            locator: LocatorSettings {
                lookup_endpoint: config.lookup_endpoint.clone(),
                lookup_timeout: config.lookup_timeout,
                scrape_options: RequestOptions::new(
                    Some(config.scrape_timeout),
                    config.insecure_tls,
                ),
            },
            known_feeds: config.known_feeds.clone(),
        }
    }
}

/// Turns a podcast reference into a stored, transcribed audio file.
///
/// Stages run strictly in sequence: classify, resolve a feed, select an episode,
/// locate its audio, fetch it into the store, transcribe. Platform pages that
/// defeat the feed or every audio strategy are handed to the media extractor.
pub struct PodcastResolver<C: HttpClient> {
    client: C,
    extractor: Arc<dyn MediaExtractor>,
    transcriber: Transcriber,
    store: AudioStore,
    settings: ResolverSettings,
    reporter: SharedProgressReporter,
}

impl<C: HttpClient> PodcastResolver<C> {
    pub fn new(
        client: C,
        extractor: Arc<dyn MediaExtractor>,
        transcriber: Transcriber,
        store: AudioStore,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            client,
            extractor,
            transcriber,
            store,
            settings,
            reporter: NoopReporter::shared(),
        }
    }

    pub fn with_reporter(mut self, reporter: SharedProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn store(&self) -> &AudioStore {
        &self.store
    }

    /// Resolve, fetch and transcribe one podcast reference
    pub async fn resolve_podcast(&self, reference: &str) -> Result<PodcastResolution, ResolveError> {
        let reference = PodcastReference::new(reference);
        // Checked up front so an unconfigured backend never costs a download
        let backend = self.transcriber.backend()?;

        let classification = classify_reference(&reference, &self.settings.known_feeds);
        info!(
            %reference,
            platform_page = classification.is_platform_page,
            episode_id = ?classification.episode_id,
            candidates = classification.feed_candidates.len(),
            "resolving podcast"
        );
        self.reporter.report(ProgressEvent::ClassifiedReference {
            reference: reference.to_string(),
            is_platform_page: classification.is_platform_page,
            episode_id: classification.episode_id.clone(),
            candidate_count: classification.feed_candidates.len(),
        });

        let feed = match resolve_feed(
            &self.client,
            &classification.feed_candidates,
            self.settings.feed_options,
            &self.reporter,
        )
        .await
        {
            Ok(feed) => feed,
            Err(ResolveError::NoFeedAvailable { last_error }) if classification.is_platform_page => {
                warn!(?last_error, "no usable feed, handing platform page to extractor");
                let resolved = self.extract(&reference).await?;
                let asset = self.fetch(&resolved, None).await?;
                return self.transcribe(resolved, asset, None, backend).await;
            }
            Err(e) => return Err(e),
        };

        let selection = feed.select(classification.episode_id.as_deref());
        let entry = selection.entry;
        debug!(
            feed = %feed.source_url(),
            episode = %entry.title,
            matched_id = selection.matched_id,
            "episode selected"
        );
        if classification.episode_id.is_some() && !selection.matched_id {
            warn!(
                episode_id = ?classification.episode_id,
                fallback = %entry.title,
                "episode id not in feed, using newest episode"
            );
        }
        self.reporter.report(ProgressEvent::EpisodeSelected {
            episode_title: entry.title.clone(),
            matched_id: selection.matched_id,
        });

        let resolved = match locate_audio(
            &self.client,
            entry,
            &classification,
            &self.settings.locator,
            &self.reporter,
        )
        .await?
        {
            AudioSource::Remote { url, strategy } => ResolvedAudio {
                title: entry.title.clone(),
                location: AudioLocation::Remote(url),
                strategy,
            },
            AudioSource::Bypass => self.extract(&reference).await?,
        };

        let guid = match resolved.location {
            AudioLocation::Remote(_) => Some(entry.id().to_string()),
            AudioLocation::Local(_) => None,
        };
        let asset = self.fetch(&resolved, guid.as_deref()).await?;
        self.transcribe(resolved, asset, guid, backend).await
    }

    async fn extract(&self, reference: &PodcastReference) -> Result<ResolvedAudio, ResolveError> {
        let url = reference.as_str();
        self.reporter.report(ProgressEvent::ExtractorStarted {
            url: url.to_string(),
        });

        let media = self.extractor.download(url, self.store.root()).await?;

        let title = match media.title {
            Some(title) => title,
            None => self.extractor.probe(url).await.unwrap_or_else(|e| {
                warn!(%url, error = %e, "extractor probe failed");
                "Unknown".to_string()
            }),
        };

        Ok(ResolvedAudio {
            title,
            location: AudioLocation::Local(media.local_path),
            strategy: AudioStrategy::Extractor,
        })
    }

    /// Download remote audio into the store; local files are taken as they are
    async fn fetch(
        &self,
        resolved: &ResolvedAudio,
        guid: Option<&str>,
    ) -> Result<StoredAudioAsset, ResolveError> {
        match &resolved.location {
            AudioLocation::Remote(url) => {
                let id = guid.unwrap_or(url.as_str());
                let asset = download_to_store(
                    &self.client,
                    url,
                    &resolved.title,
                    id,
                    &self.store,
                    self.settings.download_options,
                    &self.reporter,
                )
                .await?;
                Ok(asset)
            }
            AudioLocation::Local(path) => Ok(self.store.asset_for_local(path.clone())),
        }
    }

    async fn transcribe(
        &self,
        resolved: ResolvedAudio,
        asset: StoredAudioAsset,
        episode_guid: Option<String>,
        backend: &dyn TranscriptionBackend,
    ) -> Result<PodcastResolution, ResolveError> {
        self.reporter.report(ProgressEvent::Transcribing {
            path: asset.path.display().to_string(),
        });

        let sentences = backend.transcribe(&asset.path).await?;
        let duration = duration_of(&sentences);

        info!(
            title = %resolved.title,
            sentences = sentences.len(),
            duration,
            "podcast resolved"
        );
        self.reporter.report(ProgressEvent::TranscriptionCompleted {
            sentence_count: sentences.len(),
            duration,
        });

        Ok(PodcastResolution {
            title: resolved.title,
            audio_url: asset.public_url,
            audio_path: asset.path,
            sentences,
            duration,
            episode_guid,
            source: resolved.strategy,
            content_hash: asset.content_hash,
        })
    }
}
