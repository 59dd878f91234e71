use axum::http::StatusCode;
use tracing::error;

use folio_crypto::CryptoError;
use folio_db::{Database, StoreError};

use crate::auth::AppState;

/// Map a classified store error onto an HTTP status.
pub fn store_status(e: StoreError) -> StatusCode {
    match e {
        StoreError::NotFound | StoreError::TargetNotFound => StatusCode::NOT_FOUND,
        StoreError::InvalidRelation(_) => StatusCode::BAD_REQUEST,
        StoreError::Conflict => StatusCode::CONFLICT,
        StoreError::Persist(msg) => {
            error!("Store failure: {}", msg);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub fn crypto_status(e: CryptoError) -> StatusCode {
    match e {
        CryptoError::AuthFailure => StatusCode::UNAUTHORIZED,
        CryptoError::HashingFailure | CryptoError::SigningFailure => {
            error!("Credential failure: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Run blocking store work off the async runtime.
///
/// If the request is dropped mid-flight the blocking task still runs to
/// completion; only its result is discarded.
pub async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&Database) -> folio_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(store_status)
}
