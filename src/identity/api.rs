// HTTP boundary for the identity service. Thin by design: it extracts the
// verified caller identity and a validated payload, then delegates to the
// directory and graph. Authentication itself happens upstream.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::identity::directory::{EducationDraft, JobDraft, UserProfileDraft};
use crate::identity::IdentityState;
use crate::records::{EducationRecord, JobRecord, UserRecord};

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

pub fn create_identity_router(state: IdentityState) -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/search", get(search_users))
        .route("/users/me", put(update_user).delete(delete_user))
        .route("/users/me/jobs", get(list_jobs).post(add_job))
        .route("/users/me/jobs/{job_id}", put(update_job).delete(delete_job))
        .route(
            "/users/me/education",
            get(list_education).post(add_education),
        )
        .route(
            "/users/me/education/{education_id}",
            put(update_education).delete(delete_education),
        )
        .route("/users/{user_id}", get(get_user))
        .route("/users/{user_id}/follow", post(follow).delete(unfollow))
        .route("/users/{user_id}/followers", get(followers))
        .route("/users/{user_id}/following", get(following))
        .route("/friends", get(list_friends))
        .route("/friends/requests/incoming", get(incoming_requests))
        .route("/friends/requests/outgoing", get(outgoing_requests))
        .route(
            "/friends/requests/{user_id}",
            post(send_request).delete(cancel_request),
        )
        .route("/friends/requests/{user_id}/accept", post(accept_request))
        .route("/friends/requests/{user_id}/decline", post(decline_request))
        .route("/friends/{user_id}", delete(remove_friend))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: String,
}

async fn create_user(
    State(state): State<IdentityState>,
    headers: HeaderMap,
    Json(draft): Json<UserProfileDraft>,
) -> AppResult<Json<UserRecord>> {
    let caller = caller_id(&headers)?;
    Ok(Json(state.directory.create_user(&caller, draft).await?))
}

async fn update_user(
    State(state): State<IdentityState>,
    headers: HeaderMap,
    Json(draft): Json<UserProfileDraft>,
) -> AppResult<Json<UserRecord>> {
    let caller = caller_id(&headers)?;
    Ok(Json(state.directory.update_user(&caller, draft).await?))
}

async fn delete_user(
    State(state): State<IdentityState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let caller = caller_id(&headers)?;
    state.directory.delete_user(&caller).await?;
    Ok(Json(json!({"status": "deleted"})))
}

async fn get_user(
    State(state): State<IdentityState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<UserRecord>> {
    Ok(Json(state.directory.get_user(&user_id).await?))
}

async fn list_users(State(state): State<IdentityState>) -> AppResult<Json<Vec<UserRecord>>> {
    Ok(Json(state.directory.list_users().await?))
}

async fn search_users(
    State(state): State<IdentityState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<UserRecord>>> {
    Ok(Json(state.directory.search_users(&params.q).await?))
}

async fn add_job(
    State(state): State<IdentityState>,
    headers: HeaderMap,
    Json(draft): Json<JobDraft>,
) -> AppResult<Json<JobRecord>> {
    let caller = caller_id(&headers)?;
    Ok(Json(state.directory.add_job(&caller, draft).await?))
}

async fn update_job(
    State(state): State<IdentityState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
    Json(draft): Json<JobDraft>,
) -> AppResult<Json<JobRecord>> {
    let caller = caller_id(&headers)?;
    Ok(Json(state.directory.update_job(&caller, &job_id, draft).await?))
}

async fn delete_job(
    State(state): State<IdentityState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> AppResult<Json<Value>> {
    let caller = caller_id(&headers)?;
    state.directory.delete_job(&caller, &job_id).await?;
    Ok(Json(json!({"status": "deleted"})))
}

async fn list_jobs(
    State(state): State<IdentityState>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<JobRecord>>> {
    let caller = caller_id(&headers)?;
    Ok(Json(state.directory.jobs_for_user(&caller).await?))
}

async fn add_education(
    State(state): State<IdentityState>,
    headers: HeaderMap,
    Json(draft): Json<EducationDraft>,
) -> AppResult<Json<EducationRecord>> {
    let caller = caller_id(&headers)?;
    Ok(Json(state.directory.add_education(&caller, draft).await?))
}

async fn update_education(
    State(state): State<IdentityState>,
    headers: HeaderMap,
    Path(education_id): Path<String>,
    Json(draft): Json<EducationDraft>,
) -> AppResult<Json<EducationRecord>> {
    let caller = caller_id(&headers)?;
    Ok(Json(
        state
            .directory
            .update_education(&caller, &education_id, draft)
            .await?,
    ))
}

async fn delete_education(
    State(state): State<IdentityState>,
    headers: HeaderMap,
    Path(education_id): Path<String>,
) -> AppResult<Json<Value>> {
    let caller = caller_id(&headers)?;
    state.directory.delete_education(&caller, &education_id).await?;
    Ok(Json(json!({"status": "deleted"})))
}

async fn list_education(
    State(state): State<IdentityState>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<EducationRecord>>> {
    let caller = caller_id(&headers)?;
    Ok(Json(state.directory.education_for_user(&caller).await?))
}

async fn follow(
    State(state): State<IdentityState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> AppResult<Json<Value>> {
    let caller = caller_id(&headers)?;
    state.graph.follow(&caller, &user_id).await?;
    Ok(Json(json!({"status": "following"})))
}

async fn unfollow(
    State(state): State<IdentityState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> AppResult<Json<Value>> {
    let caller = caller_id(&headers)?;
    state.graph.unfollow(&caller, &user_id).await?;
    Ok(Json(json!({"status": "unfollowed"})))
}

async fn followers(
    State(state): State<IdentityState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.graph.followers_of(&user_id).await?))
}

async fn following(
    State(state): State<IdentityState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.graph.following_of(&user_id).await?))
}

async fn send_request(
    State(state): State<IdentityState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> AppResult<Json<Value>> {
    let caller = caller_id(&headers)?;
    state.graph.send_friend_request(&caller, &user_id).await?;
    Ok(Json(json!({"status": "pending"})))
}

async fn accept_request(
    State(state): State<IdentityState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> AppResult<Json<Value>> {
    let caller = caller_id(&headers)?;
    state.graph.accept_friend_request(&caller, &user_id).await?;
    Ok(Json(json!({"status": "accepted"})))
}

async fn decline_request(
    State(state): State<IdentityState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> AppResult<Json<Value>> {
    let caller = caller_id(&headers)?;
    state.graph.decline_friend_request(&caller, &user_id).await?;
    Ok(Json(json!({"status": "declined"})))
}

async fn cancel_request(
    State(state): State<IdentityState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> AppResult<Json<Value>> {
    let caller = caller_id(&headers)?;
    state.graph.cancel_friend_request(&caller, &user_id).await?;
    Ok(Json(json!({"status": "cancelled"})))
}

async fn remove_friend(
    State(state): State<IdentityState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> AppResult<Json<Value>> {
    let caller = caller_id(&headers)?;
    state.graph.remove_friend(&caller, &user_id).await?;
    Ok(Json(json!({"status": "removed"})))
}

async fn list_friends(
    State(state): State<IdentityState>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<String>>> {
    let caller = caller_id(&headers)?;
    Ok(Json(state.graph.friends_of(&caller).await?))
}

async fn incoming_requests(
    State(state): State<IdentityState>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<String>>> {
    let caller = caller_id(&headers)?;
    Ok(Json(state.graph.incoming_requests(&caller).await?))
}

async fn outgoing_requests(
    State(state): State<IdentityState>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<String>>> {
    let caller = caller_id(&headers)?;
    Ok(Json(state.graph.outgoing_requests(&caller).await?))
}
