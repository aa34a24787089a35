//! Activity model definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of timeline entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Comment,
    StatusChanged,
    StageChanged,
    TaskCreated,
}

/// Immutable append-only timeline record for a deal. `author_id` is None
/// for system-generated events and set for user comments. Once created an
/// activity is never mutated or deleted (deal deletion cascades aside).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub author_id: Option<Uuid>,
    pub kind: ActivityKind,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    /// A user-authored comment.
    pub fn comment(deal_id: Uuid, author_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            deal_id,
            author_id: Some(author_id),
            kind: ActivityKind::Comment,
            payload: serde_json::json!({ "content": content.into() }),
            created_at: Utc::now(),
        }
    }

    /// A system-generated event with no human author.
    pub fn system(deal_id: Uuid, kind: ActivityKind, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            deal_id,
            author_id: None,
            kind,
            payload,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_carries_author_and_content() {
        let author = Uuid::new_v4();
        let activity = Activity::comment(Uuid::new_v4(), author, "Looks good");
        assert_eq!(activity.author_id, Some(author));
        assert_eq!(activity.kind, ActivityKind::Comment);
        assert_eq!(activity.payload["content"], "Looks good");
    }

    #[test]
    fn system_events_have_no_author() {
        let activity = Activity::system(
            Uuid::new_v4(),
            ActivityKind::TaskCreated,
            serde_json::json!({ "title": "Follow up" }),
        );
        assert!(activity.author_id.is_none());
    }
}
