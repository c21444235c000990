// Post board - daily posts, comments, likes, pins, timeline
// Counters on the post row are maintained by read-modify-write and are
// eventually consistent under concurrent writers; the like/comment existence
// rows are the source of truth.

use crate::error::{AppError, AppResult};
use crate::infrastructure::cache::Cache;
use crate::infrastructure::store::{KeyValueStore, StoreItem};
use crate::keyspace::{generate_id, partitions, EntityKey};
use crate::records::{current_time_millis, CommentRecord, PostRecord, Record};
use chrono::{Duration as ChronoDuration, NaiveTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const POST_KEY_CACHE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    #[serde(default)]
    pub post_id: Option<String>,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDraft {
    #[serde(default)]
    pub comment_id: Option<String>,
    pub content: String,
}

#[derive(Clone)]
pub struct PostBoard {
    store: Arc<dyn KeyValueStore>,
    /// Memoises the scan-backed post-id lookup: post id -> (pk, sk).
    post_keys: Arc<Mutex<Cache<String, (String, String)>>>,
    daily_ttl_minutes: bool,
}

impl PostBoard {
    pub fn new(store: Arc<dyn KeyValueStore>, daily_ttl_minutes: bool) -> Self {
        Self {
            store,
            post_keys: Arc::new(Mutex::new(Cache::new(POST_KEY_CACHE_CAPACITY))),
            daily_ttl_minutes,
        }
    }

    // =========================================================================
    // POSTS
    // =========================================================================

    /// Create the caller's one post for today.
    ///
    /// The marker read and the two writes are separate store operations, so
    /// two concurrent calls can both pass the check; the store contract has
    /// no conditional put to close that window. The conflict is still caught
    /// for every sequential retry, which is the consistency level this
    /// system promises.
    pub async fn create_daily_post(&self, user_id: &str, draft: PostDraft) -> AppResult<PostRecord> {
        let markers = self
            .store
            .query_partition(&partitions::daily_post(user_id))
            .await?;
        if !markers.is_empty() {
            return Err(AppError::DuplicateDailyPost(
                "you already have a post for today".into(),
            ));
        }

        let post = PostRecord {
            post_id: draft.post_id.unwrap_or_else(generate_id),
            user_id: user_id.to_string(),
            title: draft.title,
            content: draft.content,
            timestamp_ms: current_time_millis(),
            like_count: 0,
            comment_count: 0,
        };
        self.store.put(post.to_item()?).await?;

        let marker = EntityKey::DailyPostMarker {
            user_id: user_id.to_string(),
            post_id: post.post_id.clone(),
        };
        self.store
            .put(StoreItem::existence(&marker).with_expiry(self.daily_marker_expiry()))
            .await?;
        info!(user_id, post_id = %post.post_id, "daily post created");
        Ok(post)
    }

    /// When the marker expires the user may post again: end of the current
    /// posting day (13:00 UTC), or one minute in short-TTL mode.
    fn daily_marker_expiry(&self) -> i64 {
        let now = Utc::now();
        if self.daily_ttl_minutes {
            return (now + ChronoDuration::minutes(1)).timestamp();
        }
        let boundary = NaiveTime::from_hms_opt(13, 0, 0).unwrap_or_default();
        (now + ChronoDuration::days(1))
            .date_naive()
            .and_time(boundary)
            .and_utc()
            .timestamp()
    }

    pub async fn get_post(&self, post_id: &str) -> AppResult<PostRecord> {
        self.find_post(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))
    }

    /// Post lookup by id alone. The namespace has no index for this, so the
    /// miss path is a full scan; the key cache absorbs repeated lookups.
    pub async fn find_post(&self, post_id: &str) -> AppResult<Option<PostRecord>> {
        let cached = self.post_keys.lock().await.get(&post_id.to_string()).cloned();
        if let Some((pk, sk)) = cached {
            match self.store.get(&pk, &sk).await? {
                Some(item) => return Ok(Some(PostRecord::from_item(&item)?)),
                None => {
                    self.post_keys.lock().await.remove(&post_id.to_string());
                }
            }
        }

        for item in self.store.scan().await? {
            if let Some(EntityKey::Post {
                post_id: found_id, ..
            }) = item.key()
            {
                if found_id == post_id {
                    self.post_keys
                        .lock()
                        .await
                        .insert(post_id.to_string(), (item.pk.clone(), item.sk.clone()));
                    return Ok(Some(PostRecord::from_item(&item)?));
                }
            }
        }
        Ok(None)
    }

    pub async fn posts_for_user(&self, user_id: &str) -> AppResult<Vec<PostRecord>> {
        let items = self.store.query_partition(&partitions::posts(user_id)).await?;
        let mut posts = items
            .iter()
            .map(PostRecord::from_item)
            .collect::<AppResult<Vec<_>>>()?;
        posts.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        Ok(posts)
    }

    pub async fn daily_post_for_user(&self, user_id: &str) -> AppResult<Option<PostRecord>> {
        let markers = self
            .store
            .query_partition(&partitions::daily_post(user_id))
            .await?;
        let post_id = markers.first().and_then(|item| match item.key() {
            Some(EntityKey::DailyPostMarker { post_id, .. }) => Some(post_id),
            _ => None,
        });
        match post_id {
            Some(post_id) => self.find_post(&post_id).await,
            None => Ok(None),
        }
    }

    /// Owner-scoped edit; counters and the original timestamp survive.
    pub async fn update_post(
        &self,
        post_id: &str,
        user_id: &str,
        draft: PostDraft,
    ) -> AppResult<PostRecord> {
        let mut post = self.get_post(post_id).await?;
        if post.user_id != user_id {
            return Err(AppError::NotFound(format!("post {} not found", post_id)));
        }
        post.title = draft.title;
        post.content = draft.content;
        self.store.put(post.to_item()?).await?;
        Ok(post)
    }

    pub async fn delete_post(&self, post_id: &str, user_id: &str) -> AppResult<()> {
        let Some(post) = self.find_post(post_id).await? else {
            return Ok(());
        };
        if post.user_id != user_id {
            return Err(AppError::NotFound(format!("post {} not found", post_id)));
        }
        self.delete_post_cascade(&post).await
    }

    /// Remove a post and every row that hangs off it. Safe to re-run.
    async fn delete_post_cascade(&self, post: &PostRecord) -> AppResult<()> {
        self.delete_partition(&partitions::comments(&post.user_id, &post.post_id))
            .await?;
        self.delete_partition(&partitions::likes(&post.post_id)).await?;

        // Pins live under the pinning users' partitions; only a scan finds
        // them all.
        for item in self.store.scan().await? {
            if let Some(EntityKey::PinnedPost { post_id, .. }) = item.key() {
                if post_id == post.post_id {
                    self.store.delete(&item.pk, &item.sk).await?;
                }
            }
        }

        let (marker_pk, marker_sk) = EntityKey::DailyPostMarker {
            user_id: post.user_id.clone(),
            post_id: post.post_id.clone(),
        }
        .encode();
        self.store.delete(&marker_pk, &marker_sk).await?;

        let (pk, sk) = post.key().encode();
        self.store.delete(&pk, &sk).await?;
        self.post_keys.lock().await.remove(&post.post_id);
        info!(post_id = %post.post_id, user_id = %post.user_id, "post deleted");
        Ok(())
    }

    // =========================================================================
    // LIKES
    // =========================================================================

    /// Idempotent per (post, user): the existence row decides whether the
    /// counter moves, so redelivered or repeated likes cannot double-count.
    pub async fn like_post(&self, post_id: &str, user_id: &str) -> AppResult<()> {
        let post = self.get_post(post_id).await?;

        let like = EntityKey::Like {
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
        };
        let (like_pk, like_sk) = like.encode();
        if self.store.get(&like_pk, &like_sk).await?.is_some() {
            debug!(post_id, user_id, "like already present");
            return Ok(());
        }
        self.store.put(StoreItem::existence(&like)).await?;

        // The post can vanish between the like write and the counter update
        // (concurrent deletion). Back the like out and report it.
        if self.adjust_like_count(&post, 1).await? {
            Ok(())
        } else {
            self.store.delete(&like_pk, &like_sk).await?;
            Err(AppError::DanglingReference(format!(
                "post {} disappeared while liking",
                post_id
            )))
        }
    }

    pub async fn unlike_post(&self, post_id: &str, user_id: &str) -> AppResult<()> {
        let (like_pk, like_sk) = EntityKey::Like {
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
        }
        .encode();
        if !self.store.delete(&like_pk, &like_sk).await? {
            return Ok(());
        }
        let Some(post) = self.find_post(post_id).await? else {
            return Err(AppError::DanglingReference(format!(
                "post {} disappeared while unliking",
                post_id
            )));
        };
        self.adjust_like_count(&post, -1).await?;
        Ok(())
    }

    pub async fn likes_for_post(&self, post_id: &str) -> AppResult<Vec<String>> {
        let items = self.store.query_partition(&partitions::likes(post_id)).await?;
        Ok(items
            .iter()
            .filter_map(|item| match item.key() {
                Some(EntityKey::Like { user_id, .. }) => Some(user_id),
                _ => None,
            })
            .collect())
    }

    /// Returns false when the post row is gone.
    async fn adjust_like_count(&self, post: &PostRecord, delta: i64) -> AppResult<bool> {
        let (pk, sk) = post.key().encode();
        let Some(item) = self.store.get(&pk, &sk).await? else {
            return Ok(false);
        };
        let mut current = PostRecord::from_item(&item)?;
        current.like_count = if delta >= 0 {
            current.like_count.saturating_add(delta as u64)
        } else {
            current.like_count.saturating_sub(delta.unsigned_abs())
        };
        self.store.put(current.to_item()?).await?;
        Ok(true)
    }

    // =========================================================================
    // COMMENTS
    // =========================================================================

    pub async fn comment_post(
        &self,
        post_id: &str,
        author_id: &str,
        draft: CommentDraft,
    ) -> AppResult<CommentRecord> {
        let post = self.get_post(post_id).await?;
        let comment = CommentRecord {
            comment_id: draft.comment_id.unwrap_or_else(generate_id),
            post_id: post_id.to_string(),
            post_owner_id: post.user_id.clone(),
            author_id: author_id.to_string(),
            content: draft.content,
            timestamp_ms: current_time_millis(),
        };
        self.store.put(comment.to_item()?).await?;

        if self.adjust_comment_count(&post, 1).await? {
            Ok(comment)
        } else {
            let (pk, sk) = comment.key().encode();
            self.store.delete(&pk, &sk).await?;
            Err(AppError::DanglingReference(format!(
                "post {} disappeared while commenting",
                post_id
            )))
        }
    }

    /// Allowed for the comment author and the post owner.
    pub async fn delete_comment(
        &self,
        post_id: &str,
        comment_id: &str,
        caller_id: &str,
    ) -> AppResult<()> {
        let post = self.get_post(post_id).await?;
        let (pk, sk) = EntityKey::Comment {
            user_id: post.user_id.clone(),
            post_id: post_id.to_string(),
            comment_id: comment_id.to_string(),
        }
        .encode();
        let Some(item) = self.store.get(&pk, &sk).await? else {
            return Ok(());
        };
        let comment = CommentRecord::from_item(&item)?;
        if comment.author_id != caller_id && post.user_id != caller_id {
            return Err(AppError::Unauthorized(
                "only the author or the post owner may delete a comment".into(),
            ));
        }
        if self.store.delete(&pk, &sk).await? {
            self.adjust_comment_count(&post, -1).await?;
        }
        Ok(())
    }

    pub async fn comments_for_post(&self, post_id: &str) -> AppResult<Vec<CommentRecord>> {
        let post = self.get_post(post_id).await?;
        let items = self
            .store
            .query_partition(&partitions::comments(&post.user_id, post_id))
            .await?;
        let mut comments = items
            .iter()
            .map(CommentRecord::from_item)
            .collect::<AppResult<Vec<_>>>()?;
        comments.sort_by(|a, b| a.timestamp_ms.cmp(&b.timestamp_ms));
        Ok(comments)
    }

    async fn adjust_comment_count(&self, post: &PostRecord, delta: i64) -> AppResult<bool> {
        let (pk, sk) = post.key().encode();
        let Some(item) = self.store.get(&pk, &sk).await? else {
            return Ok(false);
        };
        let mut current = PostRecord::from_item(&item)?;
        current.comment_count = if delta >= 0 {
            current.comment_count.saturating_add(delta as u64)
        } else {
            current.comment_count.saturating_sub(delta.unsigned_abs())
        };
        self.store.put(current.to_item()?).await?;
        Ok(true)
    }

    // =========================================================================
    // PINS
    // =========================================================================

    pub async fn pin_post(&self, post_id: &str, user_id: &str) -> AppResult<PostRecord> {
        let post = self.get_post(post_id).await?;
        let pin = EntityKey::PinnedPost {
            user_id: user_id.to_string(),
            post_id: post_id.to_string(),
        };
        self.store.put(StoreItem::existence(&pin)).await?;
        Ok(post)
    }

    pub async fn unpin_post(&self, post_id: &str, user_id: &str) -> AppResult<()> {
        let (pk, sk) = EntityKey::PinnedPost {
            user_id: user_id.to_string(),
            post_id: post_id.to_string(),
        }
        .encode();
        self.store.delete(&pk, &sk).await?;
        Ok(())
    }

    pub async fn pinned_posts(&self, user_id: &str) -> AppResult<Vec<PostRecord>> {
        let items = self.store.query_partition(&partitions::pinned(user_id)).await?;
        let lookups = items.iter().filter_map(|item| match item.key() {
            Some(EntityKey::PinnedPost { post_id, .. }) => Some(post_id),
            _ => None,
        });
        let mut posts = Vec::new();
        for post_id in lookups {
            // A pin can outlive its post; skip the hole instead of failing
            // the whole listing.
            if let Some(post) = self.find_post(&post_id).await? {
                posts.push(post);
            }
        }
        Ok(posts)
    }

    // =========================================================================
    // TIMELINE
    // =========================================================================

    /// Assemble a timeline from the given friends' posts, newest first. The
    /// friend list comes from the local projection; nothing here crosses a
    /// service boundary.
    pub async fn timeline_for(&self, friend_ids: &[String]) -> AppResult<Vec<PostRecord>> {
        let fetches = friend_ids
            .iter()
            .map(|friend_id| self.posts_for_user(friend_id));
        let mut timeline: Vec<PostRecord> = join_all(fetches)
            .await
            .into_iter()
            .collect::<AppResult<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();
        timeline.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        Ok(timeline)
    }

    // =========================================================================
    // CASCADE SUPPORT
    // =========================================================================

    /// Content-scoped share of a user deletion: their posts (with comments,
    /// likes, pins, markers), their likes on other posts, their comments on
    /// other posts, their pin list. Every step is delete-if-exists, so the
    /// event consumer can re-run this on redelivery.
    pub async fn purge_user_content(&self, user_id: &str) -> AppResult<()> {
        for post in self.posts_for_user(user_id).await? {
            self.delete_post_cascade(&post).await?;
        }

        for item in self.store.scan().await? {
            match item.key() {
                Some(EntityKey::Like {
                    post_id,
                    user_id: liker,
                }) if liker == user_id => {
                    match self.unlike_post(&post_id, user_id).await {
                        Ok(()) => {}
                        Err(AppError::DanglingReference(_)) => {
                            // The liked post is already gone; the row itself
                            // was still removed.
                            warn!(post_id = %post_id, user_id, "dangling like removed during purge");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Some(EntityKey::Comment {
                    user_id: owner,
                    post_id,
                    comment_id,
                }) => {
                    let comment = CommentRecord::from_item(&item)?;
                    if comment.author_id == user_id && owner != user_id {
                        self.store.delete(&item.pk, &item.sk).await?;
                        if let Some(post) = self.find_post(&post_id).await? {
                            self.adjust_comment_count(&post, -1).await?;
                        }
                        debug!(post_id = %post_id, comment_id = %comment_id, "authored comment purged");
                    }
                }
                _ => {}
            }
        }

        self.delete_partition(&partitions::pinned(user_id)).await?;
        self.delete_partition(&partitions::daily_post(user_id)).await?;
        info!(user_id, "content purged for deleted user");
        Ok(())
    }

    async fn delete_partition(&self, pk: &str) -> AppResult<()> {
        for item in self.store.query_partition(pk).await? {
            self.store.delete(&item.pk, &item.sk).await?;
        }
        Ok(())
    }
}
