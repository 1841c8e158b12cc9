// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use tracing::{debug, info, warn};

use crate::error::{FeedError, ResolveError};
use crate::http::{HttpClient, RequestOptions};
use crate::progress::{ProgressEvent, SharedProgressReporter};

use super::fetch::fetch_feed;
use super::parse::{EpisodeEntry, FeedDocument};

/// A feed document known to contain at least one entry
#[derive(Debug, Clone)]
pub struct ResolvedFeed {
    source_url: String,
    document: FeedDocument,
}

impl ResolvedFeed {
    /// Wrap a document, refusing one without entries
    pub fn new(source_url: impl Into<String>, document: FeedDocument) -> Option<Self> {
        if document.entries.is_empty() {
            return None;
        }
        Some(Self {
            source_url: source_url.into(),
            document,
        })
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn document(&self) -> &FeedDocument {
        &self.document
    }

    pub fn entries(&self) -> &[EpisodeEntry] {
        &self.document.entries
    }

    /// First entry in document order
    pub fn newest(&self) -> &EpisodeEntry {
        // Non-empty by construction
        &self.document.entries[0]
    }
}

/// Try each candidate in order until one parses with at least one entry.
///
/// Failures of individual candidates are reported and remembered; only the
/// last transport or parse error is carried into `NoFeedAvailable`. A candidate
/// that parses cleanly but is empty does not overwrite it.
pub async fn resolve_feed<C: HttpClient + ?Sized>(
    client: &C,
    candidates: &[String],
    options: RequestOptions,
    reporter: &SharedProgressReporter,
) -> Result<ResolvedFeed, ResolveError> {
    let mut last_error: Option<FeedError> = None;

    for (index, url) in candidates.iter().enumerate() {
        reporter.report(ProgressEvent::TryingFeed {
            url: url.clone(),
            attempt: index + 1,
        });
        debug!(candidate = %url, attempt = index + 1, "fetching feed candidate");

        let reason = match fetch_feed(client, url, options).await {
            Ok(document) => match ResolvedFeed::new(url.clone(), document) {
                Some(resolved) => {
                    info!(
                        candidate = %url,
                        episodes = resolved.entries().len(),
                        "feed candidate usable"
                    );
                    reporter.report(ProgressEvent::FeedResolved {
                        url: url.clone(),
                        feed_title: resolved.document().title.clone(),
                        episode_count: resolved.entries().len(),
                    });
                    return Ok(resolved);
                }
                None => FeedError::NoEntries { url: url.clone() }.to_string(),
            },
            Err(e) => {
                let reason = e.to_string();
                last_error = Some(e);
                reason
            }
        };

        warn!(candidate = %url, %reason, "feed candidate failed");
        reporter.report(ProgressEvent::FeedCandidateFailed {
            url: url.clone(),
            reason,
        });
    }

    Err(ResolveError::NoFeedAvailable {
        last_error: last_error.map(|e| e.to_string()),
    })
}
