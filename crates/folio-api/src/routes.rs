use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::profile::{self, MAX_PROFILE_BODY};
use crate::projects;
use crate::relations;

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/projects", get(projects::list_projects))
        .route("/users/{username}/followers", get(relations::list_followers))
        .route("/users/{username}/following", get(relations::list_following))
        .route("/dev/{username}", get(profile::developer_profile))
        .route("/dev/{username}/projects", get(projects::user_projects))
        .route("/dev/{username}/{project}", get(projects::project_detail))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/logout", post(auth::logout))
        .route("/validate", get(auth::validate))
        .route(
            "/profile/update",
            put(profile::update_profile).layer(DefaultBodyLimit::max(MAX_PROFILE_BODY)),
        )
        .route("/projects/create", post(projects::create_project))
        .route("/projects/saved", get(relations::saved_projects))
        .route(
            "/projects/{id}/save",
            post(relations::save_project).delete(relations::unsave_project),
        )
        .route("/projects/{id}/like", post(relations::like_project))
        .route("/users/{username}/follow", post(relations::toggle_follow))
        .route("/users/{username}/follow/status", get(relations::follow_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "Server is running!"
}
