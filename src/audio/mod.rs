mod lookup;
mod scrape;

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classify::Classification;
use crate::error::ResolveError;
use crate::feed::EpisodeEntry;
use crate::http::{HttpClient, RequestOptions};
use crate::progress::{ProgressEvent, SharedProgressReporter};

pub use lookup::{lookup_preview_url, lookup_url};
pub use scrape::{fetch_and_scrape, scrape_audio_url};

/// Where a playable audio file came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioStrategy {
    Enclosure,
    LookupApi,
    Webpage,
    Extractor,
}

impl fmt::Display for AudioStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Enclosure => "feed enclosure",
            Self::LookupApi => "platform lookup API",
            Self::Webpage => "episode webpage",
            Self::Extractor => "media extractor",
        })
    }
}

/// Outcome of audio location for one episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// A directly downloadable URL
    Remote { url: String, strategy: AudioStrategy },
    /// Nothing found, but the reference can go to the whole-URL extractor
    Bypass,
}

/// Endpoints and request policies used while locating audio
#[derive(Debug, Clone)]
pub struct LocatorSettings {
    pub lookup_endpoint: String,
    pub lookup_timeout: Duration,
    pub scrape_options: RequestOptions,
}

/// Find a downloadable audio URL for `entry`.
///
/// Strategies run in priority order (enclosure, platform lookup, webpage) and the
/// first hit wins. When all of them miss, platform pages are handed back as
/// `AudioSource::Bypass`; anything else is `NoAudioFound`.
pub async fn locate_audio<C: HttpClient + ?Sized>(
    client: &C,
    entry: &EpisodeEntry,
    classification: &Classification,
    settings: &LocatorSettings,
    reporter: &SharedProgressReporter,
) -> Result<AudioSource, ResolveError> {
    let miss = |strategy: AudioStrategy, reason: String| {
        warn!(%strategy, %reason, "audio strategy came up empty");
        reporter.report(ProgressEvent::AudioStrategyFailed { strategy, reason });
    };
    let hit = |strategy: AudioStrategy, url: String| -> Result<AudioSource, ResolveError> {
        info!(%strategy, %url, "audio located");
        reporter.report(ProgressEvent::AudioLocated {
            strategy,
            url: url.clone(),
        });
        Ok(AudioSource::Remote { url, strategy })
    };

    if let Some(enclosure) = entry.enclosures.first() {
        return hit(AudioStrategy::Enclosure, enclosure.href.clone());
    }
    miss(
        AudioStrategy::Enclosure,
        "feed entry has no enclosure".to_string(),
    );

    let platform_episode = classification
        .episode_id
        .as_deref()
        .filter(|_| classification.is_platform_page);

    if let Some(episode_id) = platform_episode {
        match lookup_preview_url(
            client,
            &settings.lookup_endpoint,
            episode_id,
            settings.lookup_timeout,
        )
        .await
        {
            Ok(Some(url)) => return hit(AudioStrategy::LookupApi, url),
            Ok(None) => miss(
                AudioStrategy::LookupApi,
                format!("no audio URL for episode {episode_id}"),
            ),
            Err(e) => miss(AudioStrategy::LookupApi, e.to_string()),
        }
    } else {
        debug!("skipping platform lookup: not a platform page with an episode id");
    }

    match entry.link.as_deref() {
        Some(link) => match fetch_and_scrape(client, link, settings.scrape_options).await {
            Ok(Some(url)) => return hit(AudioStrategy::Webpage, url),
            Ok(None) => miss(
                AudioStrategy::Webpage,
                format!("no audio link on {link}"),
            ),
            Err(e) => miss(AudioStrategy::Webpage, e.to_string()),
        },
        None => miss(
            AudioStrategy::Webpage,
            "feed entry has no webpage link".to_string(),
        ),
    }

    if classification.is_platform_page {
        return Ok(AudioSource::Bypass);
    }

    Err(ResolveError::NoAudioFound {
        title: entry.title.clone(),
    })
}
