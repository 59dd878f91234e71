use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use folio_db::StoreError;
use folio_db::models::NewProject;
use folio_db::relations::RelationKind;
use folio_types::api::{Claims, CreateProjectRequest};
use folio_types::models::{Project, ProjectDetail};

use crate::auth::AppState;
use crate::error::with_db;
use crate::middleware::optional_claims;

/// A project carries at most nine screenshots.
const MAX_IMAGES: usize = 9;

/// POST /projects/create: owned by the caller.
pub async fn create_project(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.name.trim().is_empty() || req.images.len() > MAX_IMAGES {
        return Err(StatusCode::BAD_REQUEST);
    }

    let project = NewProject {
        user_id: claims.user_id,
        name: req.name.trim().to_string(),
        description: req.description,
        code: req.code,
        general_tags: req.general_tags,
        programming_tags: req.programming_tags,
        images: req.images,
        status: req.status,
    };

    let row = with_db(&state, move |db| db.create_project(&project)).await?;

    Ok((StatusCode::CREATED, Json(row.into_project())))
}

/// GET /projects: newest first.
pub async fn list_projects(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let rows = with_db(&state, |db| db.list_projects()).await?;

    let projects: Vec<Project> = rows.into_iter().map(|r| r.into_project()).collect();
    Ok(Json(projects))
}

/// GET /dev/{username}/projects: 404 for an unknown user, `[]` for one
/// without projects.
pub async fn user_projects(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let rows = with_db(&state, move |db| {
        let id = db
            .get_user_id_by_username(&username)?
            .ok_or(StoreError::NotFound)?;
        db.list_projects_by_user(id)
    })
    .await?;

    let projects: Vec<Project> = rows.into_iter().map(|r| r.into_project()).collect();
    Ok(Json(projects))
}

/// GET /dev/{username}/{project}: public, but a valid bearer token fills in
/// `saved_by_user` for the caller.
pub async fn project_detail(
    State(state): State<AppState>,
    Path((username, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    let viewer = optional_claims(&state, &headers).map(|c| c.user_id);

    let detail = with_db(&state, move |db| {
        let row = db
            .get_project_by_name(&username, &name)?
            .ok_or(StoreError::NotFound)?;
        let saved_by_user = match viewer {
            Some(user_id) => db.exists(RelationKind::Save, user_id, row.id)?,
            None => false,
        };
        Ok(ProjectDetail {
            project: row.into_project(),
            saved_by_user,
        })
    })
    .await?;

    Ok(Json(detail))
}
