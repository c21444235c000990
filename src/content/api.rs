// HTTP boundary for the content service. Reads hit only the local store and
// projection; nothing here calls across to the identity service.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};

use crate::content::board::{CommentDraft, PostDraft};
use crate::content::ContentState;
use crate::error::{AppError, AppResult};
use crate::records::{CommentRecord, PostRecord, UserProjectionRecord};

/// Caller identity as handed over by the authenticating proxy.
pub const CALLER_HEADER: &str = "x-user-id";

fn caller_id(headers: &HeaderMap) -> AppResult<String> {
    headers
        .get(CALLER_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", CALLER_HEADER)))
}

pub fn create_content_router(state: ContentState) -> Router {
    Router::new()
        .route("/posts", post(create_daily_post))
        .route("/posts/{post_id}", get(get_post).put(update_post).delete(delete_post))
        .route("/posts/{post_id}/likes", get(likes).post(like).delete(unlike))
        .route("/posts/{post_id}/comments", get(comments).post(comment))
        .route(
            "/posts/{post_id}/comments/{comment_id}",
            delete(delete_comment),
        )
        .route("/posts/{post_id}/pin", post(pin).delete(unpin))
        .route("/me/timeline", get(timeline))
        .route("/me/daily", get(my_daily_post))
        .route("/me/pinned", get(pinned))
        .route("/me/friends", get(friends))
        .route("/users/{user_id}", get(get_user))
        .route("/users/{user_id}/posts", get(user_posts))
        .route("/users/{user_id}/daily", get(user_daily_post))
        .with_state(state)
}

async fn create_daily_post(
    State(state): State<ContentState>,
    headers: HeaderMap,
    Json(draft): Json<PostDraft>,
) -> AppResult<Json<PostRecord>> {
    let caller = caller_id(&headers)?;
    Ok(Json(state.board.create_daily_post(&caller, draft).await?))
}

async fn get_post(
    State(state): State<ContentState>,
    Path(post_id): Path<String>,
) -> AppResult<Json<PostRecord>> {
    Ok(Json(state.board.get_post(&post_id).await?))
}

async fn update_post(
    State(state): State<ContentState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Json(draft): Json<PostDraft>,
) -> AppResult<Json<PostRecord>> {
    let caller = caller_id(&headers)?;
    Ok(Json(state.board.update_post(&post_id, &caller, draft).await?))
}

async fn delete_post(
    State(state): State<ContentState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> AppResult<Json<Value>> {
    let caller = caller_id(&headers)?;
    state.board.delete_post(&post_id, &caller).await?;
    Ok(Json(json!({"status": "deleted"})))
}

async fn like(
    State(state): State<ContentState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> AppResult<Json<Value>> {
    let caller = caller_id(&headers)?;
    state.board.like_post(&post_id, &caller).await?;
    Ok(Json(json!({"status": "liked"})))
}

async fn unlike(
    State(state): State<ContentState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> AppResult<Json<Value>> {
    let caller = caller_id(&headers)?;
    state.board.unlike_post(&post_id, &caller).await?;
    Ok(Json(json!({"status": "unliked"})))
}

async fn likes(
    State(state): State<ContentState>,
    Path(post_id): Path<String>,
) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.board.likes_for_post(&post_id).await?))
}

async fn comment(
    State(state): State<ContentState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Json(draft): Json<CommentDraft>,
) -> AppResult<Json<CommentRecord>> {
    let caller = caller_id(&headers)?;
    Ok(Json(state.board.comment_post(&post_id, &caller, draft).await?))
}

async fn comments(
    State(state): State<ContentState>,
    Path(post_id): Path<String>,
) -> AppResult<Json<Vec<CommentRecord>>> {
    Ok(Json(state.board.comments_for_post(&post_id).await?))
}

async fn delete_comment(
    State(state): State<ContentState>,
    headers: HeaderMap,
    Path((post_id, comment_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let caller = caller_id(&headers)?;
    state.board.delete_comment(&post_id, &comment_id, &caller).await?;
    Ok(Json(json!({"status": "deleted"})))
}

async fn pin(
    State(state): State<ContentState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> AppResult<Json<PostRecord>> {
    let caller = caller_id(&headers)?;
    Ok(Json(state.board.pin_post(&post_id, &caller).await?))
}

async fn unpin(
    State(state): State<ContentState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> AppResult<Json<Value>> {
    let caller = caller_id(&headers)?;
    state.board.unpin_post(&post_id, &caller).await?;
    Ok(Json(json!({"status": "unpinned"})))
}

async fn pinned(
    State(state): State<ContentState>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<PostRecord>>> {
    let caller = caller_id(&headers)?;
    Ok(Json(state.board.pinned_posts(&caller).await?))
}

async fn timeline(
    State(state): State<ContentState>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<PostRecord>>> {
    let caller = caller_id(&headers)?;
    let friend_ids = state.projection.friends_of(&caller).await?;
    Ok(Json(state.board.timeline_for(&friend_ids).await?))
}

async fn my_daily_post(
    State(state): State<ContentState>,
    headers: HeaderMap,
) -> AppResult<Json<Option<PostRecord>>> {
    let caller = caller_id(&headers)?;
    Ok(Json(state.board.daily_post_for_user(&caller).await?))
}

async fn friends(
    State(state): State<ContentState>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<String>>> {
    let caller = caller_id(&headers)?;
    Ok(Json(state.projection.friends_of(&caller).await?))
}

async fn get_user(
    State(state): State<ContentState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<UserProjectionRecord>> {
    Ok(Json(state.projection.get_user(&user_id).await?))
}

async fn user_posts(
    State(state): State<ContentState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<PostRecord>>> {
    Ok(Json(state.board.posts_for_user(&user_id).await?))
}

async fn user_daily_post(
    State(state): State<ContentState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Option<PostRecord>>> {
    Ok(Json(state.board.daily_post_for_user(&user_id).await?))
}
