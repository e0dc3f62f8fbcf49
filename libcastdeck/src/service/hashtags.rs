//! Hashtag indexing, performance and suggestions

use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use crate::error::CastdeckError;
use crate::types::{now_secs, HashtagStats, ScheduledPost};
use crate::{Database, Result};

/// A `#` starts a tag only at the start of the text or after a character
/// that cannot end a word, path or entity (so `page#anchor`, `a#b` and
/// `&#39;` are not tags)
static HASHTAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w/&#])#(\w+)").expect("valid hashtag regex")
});

static KEYWORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid keyword regex"));

/// Keywords shorter than this never drive suggestions
const MIN_KEYWORD_LEN: usize = 3;

pub const MAX_SUGGESTIONS: u32 = 50;

#[derive(Clone)]
pub struct HashtagService {
    db: Arc<Database>,
}

impl HashtagService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Tags in `content`, lowercased, without `#`, first occurrence order
    pub fn extract(content: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        HASHTAG
            .captures_iter(content)
            .map(|c| c[1].to_lowercase())
            .filter(|tag| seen.insert(tag.clone()))
            .collect()
    }

    /// Record the tags of a scheduled post
    pub async fn index_post(&self, post: &ScheduledPost) -> Result<Vec<String>> {
        let tags = Self::extract(&post.content);
        self.db.link_hashtags(&post.id, &tags, now_secs()).await?;
        Ok(tags)
    }

    /// Post count and engagement totals for one tag
    ///
    /// Accepts the tag with or without a leading `#`, in any case.
    pub async fn performance(&self, tag: &str) -> Result<HashtagStats> {
        let normalized = normalize(tag);
        self.db
            .hashtag_stats(&normalized)
            .await?
            .ok_or_else(|| CastdeckError::not_found("Hashtag", &normalized))
    }

    /// Known tags related to the words of `content`, best performing first
    ///
    /// A tag is related when it contains a keyword of at least three
    /// characters or a keyword contains it. Tags already in the content are
    /// never suggested. `limit` is clamped to 1..=50.
    pub async fn suggestions(&self, content: &str, limit: u32) -> Result<Vec<HashtagStats>> {
        let limit = limit.clamp(1, MAX_SUGGESTIONS) as usize;

        let present: HashSet<String> = Self::extract(content).into_iter().collect();
        let keywords: Vec<String> = KEYWORD
            .find_iter(content)
            .map(|m| m.as_str().to_lowercase())
            .filter(|w| w.chars().count() >= MIN_KEYWORD_LEN)
            .collect();

        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        // Ranked already; filtering keeps the order
        let ranked = self.db.hashtag_stats_ranked(None).await?;
        let suggestions = ranked
            .into_iter()
            .filter(|stats| !present.contains(&stats.tag))
            .filter(|stats| {
                keywords
                    .iter()
                    .any(|k| stats.tag.contains(k.as_str()) || k.contains(stats.tag.as_str()))
            })
            .take(limit)
            .collect();

        Ok(suggestions)
    }

    /// Tags ranked by total engagement, clamped to 1..=50 entries
    pub async fn trending(&self, limit: u32) -> Result<Vec<HashtagStats>> {
        self.db
            .hashtag_stats_ranked(Some(limit.clamp(1, MAX_SUGGESTIONS)))
            .await
    }
}

fn normalize(tag: &str) -> String {
    tag.trim().trim_start_matches('#').to_lowercase()
}
