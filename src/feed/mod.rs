mod fetch;
mod parse;
mod resolve;

pub use fetch::{fetch_feed, fetch_feed_bytes};
pub use parse::{Enclosure, EpisodeEntry, FeedDocument, parse_feed};
pub use resolve::{ResolvedFeed, resolve_feed};
