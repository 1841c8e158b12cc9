// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset};
use feed_rs::model::{Entry, Link};
use tracing::debug;

use crate::error::FeedError;

/// A parsed syndication feed; lives only for the duration of one resolution
#[derive(Debug, Clone)]
pub struct FeedDocument {
    pub title: String,
    pub link: Option<String>,
    /// Entries in document order (newest first by convention)
    pub entries: Vec<EpisodeEntry>,
}

/// One episode as described by the feed
#[derive(Debug, Clone, Default)]
pub struct EpisodeEntry {
    pub title: String,
    pub guid: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<FixedOffset>>,
    pub enclosures: Vec<Enclosure>,
}

/// A direct media link attached to an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub href: String,
    pub length: Option<u64>,
    pub mime_type: Option<String>,
}

impl EpisodeEntry {
    /// Stable identity of the entry: guid, then link, then title
    pub fn id(&self) -> &str {
        self.guid
            .as_deref()
            .or(self.link.as_deref())
            .unwrap_or(&self.title)
    }

    /// Fuzzy identifier match.
    ///
    /// Upstream ids are formatted inconsistently across hosts, so `episode_id` only
    /// needs to appear somewhere in the link or the guid.
    pub fn matches_id(&self, episode_id: &str) -> bool {
        [self.link.as_deref(), self.guid.as_deref()]
            .into_iter()
            .flatten()
            .any(|field| field.contains(episode_id))
    }
}

/// Parse feed bytes into a FeedDocument.
///
/// RSS 2.0 goes through the `rss` crate; anything it rejects (Atom, JSON Feed,
/// RSS 1.0) is handed to `feed-rs`.
pub fn parse_feed(xml_bytes: &[u8], source_url: &str) -> Result<FeedDocument, FeedError> {
    match rss::Channel::read_from(xml_bytes) {
        Ok(channel) => Ok(document_from_channel(&channel)),
        Err(rss_error) => {
            debug!(url = %source_url, error = %rss_error, "not RSS 2.0, trying other feed formats");
            let feed = feed_rs::parser::parse(xml_bytes).map_err(|e| FeedError::ParseFailed {
                url: source_url.to_string(),
                source: e,
            })?;
            Ok(document_from_syndication(feed))
        }
    }
}

fn document_from_channel(channel: &rss::Channel) -> FeedDocument {
    FeedDocument {
        title: channel.title().to_string(),
        link: Some(channel.link().to_string()).filter(|s| !s.is_empty()),
        entries: channel.items().iter().map(parse_entry).collect(),
    }
}

fn document_from_syndication(feed: feed_rs::model::Feed) -> FeedDocument {
    FeedDocument {
        title: feed.title.map(|t| t.content).unwrap_or_default(),
        link: page_link(&feed.links),
        entries: feed.entries.iter().map(parse_syndication_entry).collect(),
    }
}

fn is_enclosure_link(link: &Link) -> bool {
    link.rel.as_deref() == Some("enclosure")
}

/// `rel="alternate"` first, then any link that is not an enclosure
fn page_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
        .or_else(|| links.iter().find(|l| !is_enclosure_link(l)))
        .map(|l| l.href.trim().to_string())
        .filter(|href| !href.is_empty())
}

fn parse_syndication_entry(entry: &Entry) -> EpisodeEntry {
    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.trim())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .unwrap_or_else(|| "Untitled Episode".to_string());

    let mut enclosures: Vec<Enclosure> = entry
        .links
        .iter()
        .filter(|l| is_enclosure_link(l) && !l.href.trim().is_empty())
        .map(|l| Enclosure {
            href: l.href.trim().to_string(),
            length: l.length,
            mime_type: l.media_type.clone(),
        })
        .collect();

    // Media RSS content, skipping anything already listed as an enclosure link
    for content in entry.media.iter().flat_map(|m| &m.content) {
        let Some(url) = &content.url else { continue };
        let href = url.to_string();
        if enclosures.iter().any(|e| e.href == href) {
            continue;
        }
        enclosures.push(Enclosure {
            href,
            length: content.size,
            mime_type: content.content_type.as_ref().map(|m| m.to_string()),
        });
    }

    EpisodeEntry {
        title,
        guid: Some(entry.id.trim().to_string()).filter(|id| !id.is_empty()),
        link: page_link(&entry.links),
        published: entry.published.or(entry.updated).map(|dt| dt.fixed_offset()),
        enclosures,
    }
}

fn parse_entry(item: &rss::Item) -> EpisodeEntry {
    let title = item
        .title()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .unwrap_or_else(|| "Untitled Episode".to_string());

    let enclosures = item
        .enclosure()
        .filter(|enclosure| !enclosure.url().trim().is_empty())
        .map(|enclosure| Enclosure {
            href: enclosure.url().trim().to_string(),
            length: enclosure.length().parse().ok(),
            mime_type: Some(enclosure.mime_type().to_string()).filter(|s| !s.is_empty()),
        })
        .into_iter()
        .collect();

    EpisodeEntry {
        title,
        guid: item
            .guid()
            .map(|g| g.value().trim().to_string())
            .filter(|g| !g.is_empty()),
        link: item
            .link()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from),
        published: item.pub_date().and_then(parse_date),
        enclosures,
    }
}

/// RFC 2822 first, then the formats feeds commonly get wrong
fn parse_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let date_str = date_str.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(date_str) {
        return Some(dt);
    }

    const FORMATS: [&str; 3] = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(date_str, format).ok())
}
