use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use folio_db::StoreError;
use folio_db::relations::{Ensure, RelationKind, Toggle};
use folio_types::api::{Claims, FollowResponse, LikeResponse, SaveResponse};
use folio_types::models::{Project, UserSummary};

use crate::auth::AppState;
use crate::error::with_db;

// -- Follow --

/// POST /users/{username}/follow: follow if not following, unfollow otherwise.
pub async fn toggle_follow(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let follower = claims.user_id;

    let outcome = with_db(&state, move |db| {
        let target = db
            .get_user_id_by_username(&username)?
            .ok_or(StoreError::TargetNotFound)?;
        db.toggle(RelationKind::Follow, follower, target)
    })
    .await?;

    info!("{} follow toggle: {:?}", claims.username, outcome);

    Ok(Json(FollowResponse {
        following: outcome == Toggle::Created,
    }))
}

/// GET /users/{username}/follow/status
pub async fn follow_status(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let follower = claims.user_id;

    let following = with_db(&state, move |db| {
        let target = db
            .get_user_id_by_username(&username)?
            .ok_or(StoreError::NotFound)?;
        if target == follower {
            return Err(StoreError::InvalidRelation("cannot follow yourself"));
        }
        db.exists(RelationKind::Follow, follower, target)
    })
    .await?;

    Ok(Json(FollowResponse { following }))
}

/// GET /users/{username}/followers: newest follower first.
pub async fn list_followers(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let users = with_db(&state, move |db| {
        let id = db
            .get_user_id_by_username(&username)?
            .ok_or(StoreError::NotFound)?;
        db.followers(id)
    })
    .await?;

    let summaries: Vec<UserSummary> = users.iter().map(|u| u.summary()).collect();
    Ok(Json(summaries))
}

/// GET /users/{username}/following: most recent follow first.
pub async fn list_following(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let users = with_db(&state, move |db| {
        let id = db
            .get_user_id_by_username(&username)?
            .ok_or(StoreError::NotFound)?;
        db.following(id)
    })
    .await?;

    let summaries: Vec<UserSummary> = users.iter().map(|u| u.summary()).collect();
    Ok(Json(summaries))
}

// -- Save --

/// POST /projects/{id}/save: 201 when newly saved, 200 when already saved.
pub async fn save_project(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id = claims.user_id;
    let outcome = with_db(&state, move |db| {
        db.ensure(RelationKind::Save, user_id, project_id)
    })
    .await?;

    let (status, message) = match outcome {
        Ensure::Created => (StatusCode::CREATED, "Project saved successfully"),
        Ensure::AlreadyExists => (StatusCode::OK, "Project already saved"),
    };

    Ok((
        status,
        Json(SaveResponse {
            saved: true,
            message: message.to_string(),
        }),
    ))
}

/// DELETE /projects/{id}/save: 404 when the project was not saved.
pub async fn unsave_project(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id = claims.user_id;
    let removed = with_db(&state, move |db| {
        db.remove(RelationKind::Save, user_id, project_id)
    })
    .await?;

    if !removed {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(Json(SaveResponse {
        saved: false,
        message: "Project unsaved successfully".to_string(),
    }))
}

/// GET /projects/saved: most recently saved first.
pub async fn saved_projects(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id = claims.user_id;
    let rows = with_db(&state, move |db| db.saved_projects(user_id)).await?;

    let projects: Vec<Project> = rows.into_iter().map(|r| r.into_project()).collect();
    Ok(Json(projects))
}

// -- Like --

/// POST /projects/{id}/like: idempotent; likes are never removed.
pub async fn like_project(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id = claims.user_id;
    let likes_count = with_db(&state, move |db| {
        db.ensure(RelationKind::Like, user_id, project_id)?;
        db.count_sources(RelationKind::Like, project_id)
    })
    .await?;

    Ok(Json(LikeResponse {
        liked: true,
        likes_count,
    }))
}
