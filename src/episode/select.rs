use crate::feed::{EpisodeEntry, ResolvedFeed};

/// The chosen entry and whether it was found by id
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub entry: &'a EpisodeEntry,
    /// True only when an id was requested and an entry matched it
    pub matched_id: bool,
}

/// Pick the episode to resolve.
///
/// With an id, the first entry in document order whose link or guid contains it
/// wins. Without one, or when nothing matches, the first entry is used, relying on
/// feeds listing newest episodes first. Entries are never reordered.
pub fn select_episode<'a>(feed: &'a ResolvedFeed, episode_id: Option<&str>) -> Selection<'a> {
    let matched = episode_id.and_then(|id| feed.entries().iter().find(|e| e.matches_id(id)));

    match matched {
        Some(entry) => Selection {
            entry,
            matched_id: true,
        },
        None => Selection {
            entry: feed.newest(),
            matched_id: false,
        },
    }
}

impl ResolvedFeed {
    /// Shorthand for [`select_episode`]
    pub fn select(&self, episode_id: Option<&str>) -> Selection<'_> {
        select_episode(self, episode_id)
    }
}
