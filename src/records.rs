// Typed entity records and their item conversions
// Records carry the attribute payload of a row; the key shape lives in
// keyspace.rs. Wire names are camelCase to match the event payloads.

use crate::error::AppResult;
use crate::infrastructure::store::StoreItem;
use crate::keyspace::EntityKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Current time in milliseconds since Unix epoch.
pub fn current_time_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// A typed record addressable in the key-value namespace.
pub trait Record: Serialize + DeserializeOwned {
    fn key(&self) -> EntityKey;

    fn to_item(&self) -> AppResult<StoreItem> {
        Ok(StoreItem::new(&self.key(), serde_json::to_value(self)?))
    }

    fn from_item(item: &StoreItem) -> AppResult<Self> {
        Ok(serde_json::from_value(item.payload.clone())?)
    }
}

/// Authoritative user profile, owned by the identity service. Follower
/// counters are denormalized here and maintained by the social graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub num_followers: u64,
    #[serde(default)]
    pub num_following: u64,
}

impl Record for UserRecord {
    fn key(&self) -> EntityKey {
        EntityKey::UserInfo {
            user_id: self.user_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub job_id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Record for JobRecord {
    fn key(&self) -> EntityKey {
        EntityKey::Job {
            user_id: self.user_id.clone(),
            job_id: self.job_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationRecord {
    pub education_id: String,
    pub user_id: String,
    pub institution: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub field_of_study: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Record for EducationRecord {
    fn key(&self) -> EntityKey {
        EntityKey::Education {
            user_id: self.user_id.clone(),
            education_id: self.education_id.clone(),
        }
    }
}

/// One side of a friendship. A friendship is one logical record stored as a
/// symmetric row pair: each user owns a row keyed by the other user, with
/// `incoming` recording the request direction. The pair is accepted only when
/// both rows carry `accepted = true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendshipRecord {
    pub user_id: String,
    pub other_id: String,
    pub incoming: bool,
    pub accepted: bool,
}

impl Record for FriendshipRecord {
    fn key(&self) -> EntityKey {
        EntityKey::Friendship {
            user_id: self.user_id.clone(),
            other_id: self.other_id.clone(),
        }
    }
}

/// A post. Like and comment counts are denormalized and maintained by
/// read-modify-write on this row; they are eventually consistent under
/// concurrent writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub post_id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub timestamp_ms: i64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub comment_count: u64,
}

impl Record for PostRecord {
    fn key(&self) -> EntityKey {
        EntityKey::Post {
            user_id: self.user_id.clone(),
            post_id: self.post_id.clone(),
        }
    }
}

/// A comment, stored under the post owner's partition; `author_id` is the
/// commenting user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    pub comment_id: String,
    pub post_id: String,
    pub post_owner_id: String,
    pub author_id: String,
    pub content: String,
    pub timestamp_ms: i64,
}

impl Record for CommentRecord {
    fn key(&self) -> EntityKey {
        EntityKey::Comment {
            user_id: self.post_owner_id.clone(),
            post_id: self.post_id.clone(),
            comment_id: self.comment_id.clone(),
        }
    }
}

/// The content service's denormalized copy of a user profile, kept current
/// by replication events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProjectionRecord {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
}

impl Record for UserProjectionRecord {
    fn key(&self) -> EntityKey {
        EntityKey::UserInfo {
            user_id: self.user_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_record_item_round_trip() {
        let user = UserRecord {
            user_id: "u1".into(),
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            profile_picture_url: None,
            birthday: Some("1815-12-10".into()),
            location: Some("London".into()),
            num_followers: 3,
            num_following: 1,
        };
        let item = user.to_item().unwrap();
        assert_eq!(item.pk, "USER#u1");
        assert_eq!(item.sk, "INFO");
        assert_eq!(UserRecord::from_item(&item).unwrap(), user);
    }

    #[test]
    fn test_payload_uses_camel_case_wire_names() {
        let record = FriendshipRecord {
            user_id: "u1".into(),
            other_id: "u2".into(),
            incoming: true,
            accepted: false,
        };
        let item = record.to_item().unwrap();
        assert!(item.payload.get("userId").is_some());
        assert!(item.payload.get("otherId").is_some());
        assert!(item.payload.get("user_id").is_none());
    }

    #[test]
    fn test_comment_is_stored_under_post_owner_partition() {
        let comment = CommentRecord {
            comment_id: "c1".into(),
            post_id: "p1".into(),
            post_owner_id: "owner".into(),
            author_id: "author".into(),
            content: "hi".into(),
            timestamp_ms: 42,
        };
        let item = comment.to_item().unwrap();
        assert_eq!(item.pk, "USER#owner#POST#p1#COMMENT");
        assert_eq!(item.sk, "COMMENT#c1");
    }
}
