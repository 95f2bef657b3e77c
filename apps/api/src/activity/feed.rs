//! Merges remote commits and locally posted progress updates into one
//! reverse-chronological activity feed.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::connectors::github::Commit;
use crate::models::project::ProgressUpdateRow;

/// Author label shown on progress updates posted from the back-office.
pub const TEAM_AUTHOR: &str = "Agency Team";

/// Declaration order is the tie-break: on equal timestamps commits come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Commit,
    Update,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItem {
    pub id: String,
    pub kind: FeedKind,
    pub title: String,
    pub body: Option<String>,
    pub author: String,
    pub avatar: Option<String>,
    pub date: DateTime<Utc>,
    pub hash: Option<String>,
    pub url: Option<String>,
}

impl From<&Commit> for FeedItem {
    fn from(commit: &Commit) -> Self {
        FeedItem {
            id: format!("commit-{}", commit.sha),
            kind: FeedKind::Commit,
            title: commit.message.clone(),
            body: None,
            author: commit.author_name.clone(),
            avatar: commit.author_avatar.clone(),
            date: commit.date,
            hash: Some(commit.sha.clone()),
            url: Some(commit.url.clone()),
        }
    }
}

impl From<&ProgressUpdateRow> for FeedItem {
    fn from(update: &ProgressUpdateRow) -> Self {
        FeedItem {
            id: format!("update-{}", update.update_id),
            kind: FeedKind::Update,
            title: update.title.clone(),
            body: update.body.clone(),
            author: TEAM_AUTHOR.to_string(),
            avatar: None,
            date: update.created_at,
            hash: update.commit_hash.clone(),
            url: None,
        }
    }
}

/// Newest first, at most `window` items. Ties on `date` put commits before
/// updates; within one kind the input order is kept.
pub fn merge_feed(
    commits: &[Commit],
    updates: &[ProgressUpdateRow],
    window: usize,
) -> Vec<FeedItem> {
    let mut items: Vec<FeedItem> = commits
        .iter()
        .map(FeedItem::from)
        .chain(updates.iter().map(FeedItem::from))
        .collect();

    items.sort_by(|a, b| b.date.cmp(&a.date).then(a.kind.cmp(&b.kind)));
    items.truncate(window);
    items
}
