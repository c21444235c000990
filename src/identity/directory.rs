// User directory - authoritative profiles, jobs, education, cascade delete

use crate::error::{AppError, AppResult};
use crate::events::{IdentityEvent, UserEventPayload};
use crate::identity::graph::{adjust_follower_count, adjust_following_count};
use crate::identity::publisher::EventPublisher;
use crate::infrastructure::store::KeyValueStore;
use crate::keyspace::{generate_id, partitions, EntityKey};
use crate::records::{EducationRecord, JobRecord, Record, UserRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Profile fields supplied by the request boundary; the caller identity
/// arrives separately, already verified.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileDraft {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDraft {
    #[serde(default)]
    pub job_id: Option<String>,
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

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationDraft {
    #[serde(default)]
    pub education_id: Option<String>,
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

#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn KeyValueStore>,
    publisher: EventPublisher,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn KeyValueStore>, publisher: EventPublisher) -> Self {
        Self { store, publisher }
    }

    // =========================================================================
    // PROFILES
    // =========================================================================

    pub async fn create_user(&self, user_id: &str, draft: UserProfileDraft) -> AppResult<UserRecord> {
        // Re-creation keeps the denormalized counters; the INFO row stays the
        // single row per user either way.
        let existing = self.find_user(user_id).await?;
        let user = UserRecord {
            user_id: user_id.to_string(),
            email: draft.email,
            first_name: draft.first_name,
            last_name: draft.last_name,
            profile_picture_url: draft.profile_picture_url,
            birthday: draft.birthday,
            location: draft.location,
            num_followers: existing.as_ref().map(|u| u.num_followers).unwrap_or(0),
            num_following: existing.as_ref().map(|u| u.num_following).unwrap_or(0),
        };
        self.store.put(user.to_item()?).await?;
        info!(user_id, "user created");

        self.publisher
            .publish(IdentityEvent::UserCreated(profile_payload(&user)))
            .await?;
        Ok(user)
    }

    pub async fn update_user(&self, user_id: &str, draft: UserProfileDraft) -> AppResult<UserRecord> {
        let current = self.get_user(user_id).await?;
        let user = UserRecord {
            user_id: user_id.to_string(),
            email: draft.email,
            first_name: draft.first_name,
            last_name: draft.last_name,
            profile_picture_url: draft.profile_picture_url,
            birthday: draft.birthday,
            location: draft.location,
            num_followers: current.num_followers,
            num_following: current.num_following,
        };
        self.store.put(user.to_item()?).await?;
        info!(user_id, "user updated");

        self.publisher
            .publish(IdentityEvent::UserUpdated(profile_payload(&user)))
            .await?;
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str) -> AppResult<UserRecord> {
        self.find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {} not found", user_id)))
    }

    pub async fn find_user(&self, user_id: &str) -> AppResult<Option<UserRecord>> {
        let (pk, sk) = EntityKey::UserInfo {
            user_id: user_id.to_string(),
        }
        .encode();
        self.store
            .get(&pk, &sk)
            .await?
            .as_ref()
            .map(UserRecord::from_item)
            .transpose()
    }

    /// Scan-backed; the namespace has no index over all INFO rows.
    pub async fn list_users(&self) -> AppResult<Vec<UserRecord>> {
        let items = self.store.scan().await?;
        items
            .iter()
            .filter(|item| matches!(item.key(), Some(EntityKey::UserInfo { .. })))
            .map(UserRecord::from_item)
            .collect()
    }

    pub async fn search_users(&self, term: &str) -> AppResult<Vec<UserRecord>> {
        let term = term.to_lowercase();
        Ok(self
            .list_users()
            .await?
            .into_iter()
            .filter(|user| user.first_name.to_lowercase().starts_with(&term))
            .collect())
    }

    /// Cascade-delete a user and every row that references them. Each step is
    /// delete-if-exists and the INFO row goes last, so an interrupted cascade
    /// can be re-run wholesale.
    pub async fn delete_user(&self, user_id: &str) -> AppResult<()> {
        let user = self.get_user(user_id).await?;

        self.delete_partition(&partitions::jobs(user_id)).await?;
        self.delete_partition(&partitions::education(user_id)).await?;

        // Follower edges are symmetric pairs with denormalized counters on
        // the surviving side.
        for follower_id in self.edge_targets(&partitions::followers(user_id)).await? {
            self.delete_edge_pair(
                EntityKey::Follower {
                    user_id: user_id.to_string(),
                    follower_id: follower_id.clone(),
                },
                EntityKey::Following {
                    user_id: follower_id.clone(),
                    followee_id: user_id.to_string(),
                },
            )
            .await?;
            adjust_following_count(self.store.as_ref(), &follower_id, -1).await?;
        }
        for followee_id in self.edge_targets(&partitions::following(user_id)).await? {
            self.delete_edge_pair(
                EntityKey::Following {
                    user_id: user_id.to_string(),
                    followee_id: followee_id.clone(),
                },
                EntityKey::Follower {
                    user_id: followee_id.clone(),
                    follower_id: user_id.to_string(),
                },
            )
            .await?;
            adjust_follower_count(self.store.as_ref(), &followee_id, -1).await?;
        }

        // Friendship rows on both sides. The content service runs its own
        // cascade when it consumes the deletion event.
        for other_id in self.edge_targets(&partitions::friendships(user_id)).await? {
            self.delete_edge_pair(
                EntityKey::Friendship {
                    user_id: user_id.to_string(),
                    other_id: other_id.clone(),
                },
                EntityKey::Friendship {
                    user_id: other_id.clone(),
                    other_id: user_id.to_string(),
                },
            )
            .await?;
        }

        let (pk, sk) = EntityKey::UserInfo {
            user_id: user_id.to_string(),
        }
        .encode();
        self.store.delete(&pk, &sk).await?;
        info!(user_id, "user deleted");

        self.publisher
            .publish(IdentityEvent::UserDeleted(profile_payload(&user)))
            .await
    }

    // =========================================================================
    // JOBS AND EDUCATION
    // =========================================================================

    pub async fn add_job(&self, user_id: &str, draft: JobDraft) -> AppResult<JobRecord> {
        let job = JobRecord {
            job_id: draft.job_id.unwrap_or_else(generate_id),
            user_id: user_id.to_string(),
            title: draft.title,
            company: draft.company,
            location: draft.location,
            start_date: draft.start_date,
            end_date: draft.end_date,
            description: draft.description,
        };
        self.store.put(job.to_item()?).await?;
        Ok(job)
    }

    pub async fn update_job(&self, user_id: &str, job_id: &str, draft: JobDraft) -> AppResult<JobRecord> {
        let (pk, sk) = EntityKey::Job {
            user_id: user_id.to_string(),
            job_id: job_id.to_string(),
        }
        .encode();
        if self.store.get(&pk, &sk).await?.is_none() {
            return Err(AppError::NotFound(format!("job {} not found", job_id)));
        }
        let job = JobRecord {
            job_id: job_id.to_string(),
            user_id: user_id.to_string(),
            title: draft.title,
            company: draft.company,
            location: draft.location,
            start_date: draft.start_date,
            end_date: draft.end_date,
            description: draft.description,
        };
        self.store.put(job.to_item()?).await?;
        Ok(job)
    }

    pub async fn delete_job(&self, user_id: &str, job_id: &str) -> AppResult<()> {
        let (pk, sk) = EntityKey::Job {
            user_id: user_id.to_string(),
            job_id: job_id.to_string(),
        }
        .encode();
        self.store.delete(&pk, &sk).await?;
        Ok(())
    }

    pub async fn jobs_for_user(&self, user_id: &str) -> AppResult<Vec<JobRecord>> {
        let items = self.store.query_partition(&partitions::jobs(user_id)).await?;
        items.iter().map(JobRecord::from_item).collect()
    }

    pub async fn add_education(
        &self,
        user_id: &str,
        draft: EducationDraft,
    ) -> AppResult<EducationRecord> {
        let education = EducationRecord {
            education_id: draft.education_id.unwrap_or_else(generate_id),
            user_id: user_id.to_string(),
            institution: draft.institution,
            location: draft.location,
            degree: draft.degree,
            field_of_study: draft.field_of_study,
            start_date: draft.start_date,
            end_date: draft.end_date,
            description: draft.description,
        };
        self.store.put(education.to_item()?).await?;
        Ok(education)
    }

    pub async fn update_education(
        &self,
        user_id: &str,
        education_id: &str,
        draft: EducationDraft,
    ) -> AppResult<EducationRecord> {
        let (pk, sk) = EntityKey::Education {
            user_id: user_id.to_string(),
            education_id: education_id.to_string(),
        }
        .encode();
        if self.store.get(&pk, &sk).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "education {} not found",
                education_id
            )));
        }
        let education = EducationRecord {
            education_id: education_id.to_string(),
            user_id: user_id.to_string(),
            institution: draft.institution,
            location: draft.location,
            degree: draft.degree,
            field_of_study: draft.field_of_study,
            start_date: draft.start_date,
            end_date: draft.end_date,
            description: draft.description,
        };
        self.store.put(education.to_item()?).await?;
        Ok(education)
    }

    pub async fn delete_education(&self, user_id: &str, education_id: &str) -> AppResult<()> {
        let (pk, sk) = EntityKey::Education {
            user_id: user_id.to_string(),
            education_id: education_id.to_string(),
        }
        .encode();
        self.store.delete(&pk, &sk).await?;
        Ok(())
    }

    pub async fn education_for_user(&self, user_id: &str) -> AppResult<Vec<EducationRecord>> {
        let items = self
            .store
            .query_partition(&partitions::education(user_id))
            .await?;
        items.iter().map(EducationRecord::from_item).collect()
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    async fn delete_partition(&self, pk: &str) -> AppResult<()> {
        for item in self.store.query_partition(pk).await? {
            self.store.delete(&item.pk, &item.sk).await?;
        }
        Ok(())
    }

    /// The opposite user id of every edge row in a partition.
    async fn edge_targets(&self, pk: &str) -> AppResult<Vec<String>> {
        let items = self.store.query_partition(pk).await?;
        Ok(items
            .iter()
            .filter_map(|item| match item.key() {
                Some(EntityKey::Follower { follower_id, .. }) => Some(follower_id),
                Some(EntityKey::Following { followee_id, .. }) => Some(followee_id),
                Some(EntityKey::Friendship { other_id, .. }) => Some(other_id),
                other => {
                    warn!(pk = %item.pk, sk = %item.sk, key = ?other, "unexpected row in edge partition");
                    None
                }
            })
            .collect())
    }

    async fn delete_edge_pair(&self, near: EntityKey, far: EntityKey) -> AppResult<()> {
        let (near_pk, near_sk) = near.encode();
        let (far_pk, far_sk) = far.encode();
        self.store.delete(&near_pk, &near_sk).await?;
        self.store.delete(&far_pk, &far_sk).await?;
        Ok(())
    }
}

fn profile_payload(user: &UserRecord) -> UserEventPayload {
    UserEventPayload {
        user_id: user.user_id.clone(),
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        profile_picture_url: user.profile_picture_url.clone(),
    }
}
