use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{error, info};

use folio_crypto::password::{hash_password, verify_decoy, verify_password};
use folio_crypto::token::TokenCodec;
use folio_db::Database;
use folio_db::models::NewUser;
use folio_types::api::{AuthResponse, Claims, LoginRequest, MessageResponse, SignupRequest};

use crate::error::{crypto_status, with_db};

pub type AppState = Arc<AppStateInner>;

/// Process-wide state: the store handle and the read-only token codec.
pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenCodec,
}

const MIN_PASSWORD_LEN: usize = 6;

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Validate input
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if !req.email.contains('@') {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Hashing is CPU-bound; run it on the blocking pool.
    let password = req.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(crypto_status)?;

    let new_user = NewUser {
        username: req.username,
        email: req.email,
        password_hash,
        first_name: req.first_name,
        last_name: req.last_name,
        phone: req.phone,
        user_type: req.user_type,
        github_link: req.github_link,
        portfolio_link: req.portfolio_link,
        linkedin_link: req.linkedin_link,
        company_name: req.company_name,
    };

    // Conflict (taken username or email) maps to 409.
    let user = with_db(&state, move |db| db.create_user(&new_user)).await?;

    let token = state
        .tokens
        .issue(user.id, &user.username, &user.email)
        .map_err(crypto_status)?;

    info!("New user {} ({})", user.username, user.id);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into_user(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let email = req.email.clone();
    let user = with_db(&state, move |db| db.get_user_by_email(&email)).await?;

    // An unknown email still pays for one Argon2 verification.
    let password = req.password;
    let hash = user.as_ref().map(|u| u.password_hash.clone());
    let verified = tokio::task::spawn_blocking(move || match hash {
        Some(hash) => verify_password(&password, &hash),
        None => verify_decoy(&password),
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let user = match user {
        Some(user) if verified => user,
        _ => return Err(StatusCode::UNAUTHORIZED),
    };

    let token = state
        .tokens
        .issue(user.id, &user.username, &user.email)
        .map_err(crypto_status)?;

    Ok(Json(AuthResponse {
        token,
        user: user.into_user(),
    }))
}

/// Tokens are stateless; the client just forgets its copy.
pub async fn logout(Extension(_claims): Extension<Claims>) -> impl IntoResponse {
    Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    })
}

/// Reaching this handler means the middleware accepted the token.
pub async fn validate(Extension(claims): Extension<Claims>) -> impl IntoResponse {
    Json(claims)
}
