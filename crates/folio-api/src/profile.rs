use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, warn};

use folio_db::StoreError;
use folio_db::profile::{Attachment, ProfileField, ProfileInput, compute_change_set};
use folio_db::relations::RelationKind;
use folio_types::api::Claims;
use folio_types::models::DeveloperProfile;

use crate::auth::AppState;
use crate::error::with_db;

/// 10 MB cap on the whole multipart body (two images plus text fields).
pub const MAX_PROFILE_BODY: usize = 10 * 1024 * 1024;

/// PUT /profile/update: multipart form with any subset of the profile
/// fields. Absent or empty fields keep their stored value; unknown fields
/// are ignored. Responds with the user as stored afterwards.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, StatusCode> {
    let mut input = ProfileInput::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("Bad profile form: {}", e);
        StatusCode::BAD_REQUEST
    })? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match ProfileField::from_name(&name) {
            Some(f) if f.is_attachment() => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                input.set_attachment(
                    &name,
                    Attachment {
                        bytes: bytes.to_vec(),
                        content_type,
                    },
                );
            }
            Some(_) => {
                let value = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                if name == "email" && !value.is_empty() && !value.contains('@') {
                    return Err(StatusCode::BAD_REQUEST);
                }
                input.set_text(&name, value);
            }
            None => debug!("Ignoring unknown profile field '{}'", name),
        }
    }

    let user_id = claims.user_id;
    let row = with_db(&state, move |db| {
        let current = db.get_user_by_id(user_id)?.ok_or(StoreError::NotFound)?;
        let changes = compute_change_set(&current, &input);
        db.apply_change_set(user_id, &changes)
    })
    .await?;

    Ok(Json(row.into_user()))
}

/// GET /dev/{username}: public profile with relation counts and projects.
pub async fn developer_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let profile = with_db(&state, move |db| {
        let user = db
            .get_user_by_username(&username)?
            .ok_or(StoreError::NotFound)?;
        let followers = db.count_sources(RelationKind::Follow, user.id)?;
        let following = db.count_targets(RelationKind::Follow, user.id)?;
        let projects = db.list_projects_by_user(user.id)?;

        Ok(DeveloperProfile {
            user: user.into_user(),
            followers,
            following,
            projects: projects.into_iter().map(|p| p.into_project()).collect(),
        })
    })
    .await?;

    Ok(Json(profile))
}
