// Key-space encoder - typed (partition key, sort key) construction
// Every entity kind gets exactly one constructor so key formatting stays
// centralized and collision-free.

use uuid::Uuid;

/// Typed address of an entity in the flat key-value namespace.
///
/// `encode` is injective per variant and stable; `decode` is its inverse and
/// returns `None` for keys that do not belong to any known kind. Identifiers
/// must not contain `#` (the segment separator) - the request boundary
/// validates this, the encoder only debug-asserts it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    UserInfo { user_id: String },
    Job { user_id: String, job_id: String },
    Education { user_id: String, education_id: String },
    Follower { user_id: String, follower_id: String },
    Following { user_id: String, followee_id: String },
    Friendship { user_id: String, other_id: String },
    Post { user_id: String, post_id: String },
    Comment { user_id: String, post_id: String, comment_id: String },
    Like { post_id: String, user_id: String },
    PinnedPost { user_id: String, post_id: String },
    DailyPostMarker { user_id: String, post_id: String },
}

impl EntityKey {
    /// Encode into the `(partition_key, sort_key)` pair.
    pub fn encode(&self) -> (String, String) {
        debug_assert!(self.ids().iter().all(|id| !id.contains('#')));
        match self {
            EntityKey::UserInfo { user_id } => (format!("USER#{}", user_id), "INFO".to_string()),
            EntityKey::Job { user_id, job_id } => {
                (format!("USER#{}#JOB", user_id), format!("JOB#{}", job_id))
            }
            EntityKey::Education {
                user_id,
                education_id,
            } => (
                format!("USER#{}#EDUCATION", user_id),
                format!("EDUCATION#{}", education_id),
            ),
            EntityKey::Follower {
                user_id,
                follower_id,
            } => (
                format!("USER#{}#FOLLOWER", user_id),
                format!("USER#{}", follower_id),
            ),
            EntityKey::Following {
                user_id,
                followee_id,
            } => (
                format!("USER#{}#FOLLOWING", user_id),
                format!("USER#{}", followee_id),
            ),
            EntityKey::Friendship { user_id, other_id } => (
                format!("USER#{}#FRIEND", user_id),
                format!("USER#{}", other_id),
            ),
            EntityKey::Post { user_id, post_id } => {
                (format!("USER#{}#POST", user_id), format!("POST#{}", post_id))
            }
            EntityKey::Comment {
                user_id,
                post_id,
                comment_id,
            } => (
                format!("USER#{}#POST#{}#COMMENT", user_id, post_id),
                format!("COMMENT#{}", comment_id),
            ),
            EntityKey::Like { post_id, user_id } => (
                format!("POST#{}#LIKE", post_id),
                format!("USER#{}", user_id),
            ),
            EntityKey::PinnedPost { user_id, post_id } => (
                format!("USER#{}#PINNED", user_id),
                format!("POST#{}", post_id),
            ),
            EntityKey::DailyPostMarker { user_id, post_id } => (
                format!("USER#{}#DAILYPOST", user_id),
                format!("POST#{}", post_id),
            ),
        }
    }

    /// Decode a `(partition_key, sort_key)` pair back into a typed key.
    ///
    /// Returns `None` when the pair does not match any entity kind. Callers
    /// reading rows they wrote themselves may treat `None` as a programmer
    /// error; scans over unknown data must tolerate it.
    pub fn decode(pk: &str, sk: &str) -> Option<EntityKey> {
        let pk_parts: Vec<&str> = pk.split('#').collect();
        let sk_parts: Vec<&str> = sk.split('#').collect();

        match (pk_parts.as_slice(), sk_parts.as_slice()) {
            (["USER", user_id], ["INFO"]) => Some(EntityKey::UserInfo {
                user_id: user_id.to_string(),
            }),
            (["USER", user_id, "JOB"], ["JOB", job_id]) => Some(EntityKey::Job {
                user_id: user_id.to_string(),
                job_id: job_id.to_string(),
            }),
            (["USER", user_id, "EDUCATION"], ["EDUCATION", education_id]) => {
                Some(EntityKey::Education {
                    user_id: user_id.to_string(),
                    education_id: education_id.to_string(),
                })
            }
            (["USER", user_id, "FOLLOWER"], ["USER", follower_id]) => Some(EntityKey::Follower {
                user_id: user_id.to_string(),
                follower_id: follower_id.to_string(),
            }),
            (["USER", user_id, "FOLLOWING"], ["USER", followee_id]) => Some(EntityKey::Following {
                user_id: user_id.to_string(),
                followee_id: followee_id.to_string(),
            }),
            (["USER", user_id, "FRIEND"], ["USER", other_id]) => Some(EntityKey::Friendship {
                user_id: user_id.to_string(),
                other_id: other_id.to_string(),
            }),
            (["USER", user_id, "POST"], ["POST", post_id]) => Some(EntityKey::Post {
                user_id: user_id.to_string(),
                post_id: post_id.to_string(),
            }),
            (["USER", user_id, "POST", post_id, "COMMENT"], ["COMMENT", comment_id]) => {
                Some(EntityKey::Comment {
                    user_id: user_id.to_string(),
                    post_id: post_id.to_string(),
                    comment_id: comment_id.to_string(),
                })
            }
            (["POST", post_id, "LIKE"], ["USER", user_id]) => Some(EntityKey::Like {
                post_id: post_id.to_string(),
                user_id: user_id.to_string(),
            }),
            (["USER", user_id, "PINNED"], ["POST", post_id]) => Some(EntityKey::PinnedPost {
                user_id: user_id.to_string(),
                post_id: post_id.to_string(),
            }),
            (["USER", user_id, "DAILYPOST"], ["POST", post_id]) => {
                Some(EntityKey::DailyPostMarker {
                    user_id: user_id.to_string(),
                    post_id: post_id.to_string(),
                })
            }
            _ => None,
        }
    }

    fn ids(&self) -> Vec<&str> {
        match self {
            EntityKey::UserInfo { user_id } => vec![user_id],
            EntityKey::Job { user_id, job_id } => vec![user_id, job_id],
            EntityKey::Education {
                user_id,
                education_id,
            } => vec![user_id, education_id],
            EntityKey::Follower {
                user_id,
                follower_id,
            } => vec![user_id, follower_id],
            EntityKey::Following {
                user_id,
                followee_id,
            } => vec![user_id, followee_id],
            EntityKey::Friendship { user_id, other_id } => vec![user_id, other_id],
            EntityKey::Post { user_id, post_id } => vec![user_id, post_id],
            EntityKey::Comment {
                user_id,
                post_id,
                comment_id,
            } => vec![user_id, post_id, comment_id],
            EntityKey::Like { post_id, user_id } => vec![post_id, user_id],
            EntityKey::PinnedPost { user_id, post_id } => vec![user_id, post_id],
            EntityKey::DailyPostMarker { user_id, post_id } => vec![user_id, post_id],
        }
    }
}

/// Partition-key constructors for range queries over a whole group.
pub mod partitions {
    pub fn jobs(user_id: &str) -> String {
        format!("USER#{}#JOB", user_id)
    }

    pub fn education(user_id: &str) -> String {
        format!("USER#{}#EDUCATION", user_id)
    }

    pub fn followers(user_id: &str) -> String {
        format!("USER#{}#FOLLOWER", user_id)
    }

    pub fn following(user_id: &str) -> String {
        format!("USER#{}#FOLLOWING", user_id)
    }

    pub fn friendships(user_id: &str) -> String {
        format!("USER#{}#FRIEND", user_id)
    }

    pub fn posts(user_id: &str) -> String {
        format!("USER#{}#POST", user_id)
    }

    pub fn comments(user_id: &str, post_id: &str) -> String {
        format!("USER#{}#POST#{}#COMMENT", user_id, post_id)
    }

    pub fn likes(post_id: &str) -> String {
        format!("POST#{}#LIKE", post_id)
    }

    pub fn pinned(user_id: &str) -> String {
        format!("USER#{}#PINNED", user_id)
    }

    pub fn daily_post(user_id: &str) -> String {
        format!("USER#{}#DAILYPOST", user_id)
    }
}

/// Generate a random identifier for entities created without one.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(key: EntityKey) {
        let (pk, sk) = key.encode();
        assert_eq!(EntityKey::decode(&pk, &sk), Some(key));
    }

    #[test]
    fn test_round_trip_all_kinds() {
        round_trip(EntityKey::UserInfo {
            user_id: "u1".into(),
        });
        round_trip(EntityKey::Job {
            user_id: "u1".into(),
            job_id: "j1".into(),
        });
        round_trip(EntityKey::Education {
            user_id: "u1".into(),
            education_id: "e1".into(),
        });
        round_trip(EntityKey::Follower {
            user_id: "u1".into(),
            follower_id: "u2".into(),
        });
        round_trip(EntityKey::Following {
            user_id: "u1".into(),
            followee_id: "u2".into(),
        });
        round_trip(EntityKey::Friendship {
            user_id: "u1".into(),
            other_id: "u2".into(),
        });
        round_trip(EntityKey::Post {
            user_id: "u1".into(),
            post_id: "p1".into(),
        });
        round_trip(EntityKey::Comment {
            user_id: "u1".into(),
            post_id: "p1".into(),
            comment_id: "c1".into(),
        });
        round_trip(EntityKey::Like {
            post_id: "p1".into(),
            user_id: "u1".into(),
        });
        round_trip(EntityKey::PinnedPost {
            user_id: "u1".into(),
            post_id: "p1".into(),
        });
        round_trip(EntityKey::DailyPostMarker {
            user_id: "u1".into(),
            post_id: "p1".into(),
        });
    }

    #[test]
    fn test_decode_rejects_unknown_shapes() {
        assert_eq!(EntityKey::decode("USER#u1", "BOGUS"), None);
        assert_eq!(EntityKey::decode("GROUP#g1", "INFO"), None);
        assert_eq!(EntityKey::decode("USER#u1#POST", "COMMENT#c1"), None);
        assert_eq!(EntityKey::decode("", ""), None);
    }

    #[test]
    fn test_follower_and_following_do_not_collide() {
        let follower = EntityKey::Follower {
            user_id: "u1".into(),
            follower_id: "u2".into(),
        };
        let following = EntityKey::Following {
            user_id: "u1".into(),
            followee_id: "u2".into(),
        };
        assert_ne!(follower.encode(), following.encode());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(generate_id(), generate_id());
    }
}
