// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConfigError;

/// Host that serves podcast webpages with embedded show/episode identifiers
pub const PLATFORM_HOST: &str = "podcasts.apple.com";

const PODCAST_PATH_MARKER: &str = "/podcast/";

static EPISODE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]i=(\d+)").expect("episode id pattern is valid"));

static SHOW_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/id(\d+)").expect("show id pattern is valid"));

static FEED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]mt=2(?:[&#]|$)").expect("feed marker pattern is valid"));

/// The raw podcast link supplied by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodcastReference(String);

impl PodcastReference {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PodcastReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Official feeds to try after the platform-derived one, keyed by show id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownFeeds {
    by_show: HashMap<String, String>,
}

impl KnownFeeds {
    /// Parse `showId=feedUrl` pairs separated by commas
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let mut by_show = HashMap::new();

        for pair in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (show, url) = pair
                .split_once('=')
                .map(|(s, u)| (s.trim(), u.trim()))
                .filter(|(s, u)| {
                    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) && !u.is_empty()
                })
                .ok_or_else(|| ConfigError::InvalidKnownFeed(pair.to_string()))?;
            by_show.insert(show.to_string(), url.to_string());
        }

        Ok(Self { by_show })
    }

    pub fn get(&self, show_id: &str) -> Option<&str> {
        self.by_show.get(show_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_show.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_show.is_empty()
    }
}

/// What the classifier learned about a reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Reference points at a podcast page on the platform host
    pub is_platform_page: bool,
    /// Feed URLs to try, most likely first. Never empty.
    pub feed_candidates: Vec<String>,
    pub show_id: Option<String>,
    pub episode_id: Option<String>,
}

/// Numeric episode id from an `i=<digits>` query parameter
pub fn extract_episode_id(url: &str) -> Option<String> {
    EPISODE_ID.captures(url).map(|c| c[1].to_string())
}

/// Numeric show id from an `/id<digits>` path segment
pub fn extract_show_id(url: &str) -> Option<String> {
    SHOW_ID.captures(url).map(|c| c[1].to_string())
}

/// Feed-style platform URL for a show
pub fn platform_feed_url(show_id: &str) -> String {
    format!("https://{PLATFORM_HOST}/podcast/id{show_id}?mt=2")
}

pub fn is_platform_page(url: &str) -> bool {
    url.contains(PLATFORM_HOST) && url.contains(PODCAST_PATH_MARKER)
}

fn has_feed_marker(url: &str) -> bool {
    FEED_MARKER.is_match(url)
}

/// Classify a reference and derive its ordered feed candidates
pub fn classify_reference(reference: &PodcastReference, known_feeds: &KnownFeeds) -> Classification {
    let raw = reference.as_str();
    let episode_id = extract_episode_id(raw);
    let show_id = extract_show_id(raw);
    let is_platform_page = is_platform_page(raw);

    let feed_candidates = match show_id.as_deref() {
        Some(show) if is_platform_page && !has_feed_marker(raw) => {
            let mut candidates = vec![platform_feed_url(show)];
            if let Some(official) = known_feeds.get(show) {
                candidates.push(official.to_string());
            }
            candidates
        }
        _ => vec![raw.to_string()],
    };

    Classification {
        is_platform_page,
        feed_candidates,
        show_id,
        episode_id,
    }
}
