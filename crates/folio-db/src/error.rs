use rusqlite::ErrorCode;
use rusqlite::ffi;
use thiserror::Error;

/// Store failures, already classified. Nothing above the DB layer sees a raw
/// `rusqlite::Error`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("relation target not found")]
    TargetNotFound,

    #[error("invalid relation: {0}")]
    InvalidRelation(&'static str),

    #[error("record already exists")]
    Conflict,

    #[error("persist failure: {0}")]
    Persist(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        if matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            return StoreError::NotFound;
        }
        if is_unique_violation(&e) {
            return StoreError::Conflict;
        }
        if is_foreign_key_violation(&e) {
            return StoreError::NotFound;
        }
        StoreError::Persist(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Persist(e.to_string())
    }
}

/// True for UNIQUE / PRIMARY KEY constraint failures.
pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => {
            err.code == ErrorCode::ConstraintViolation
                && (err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

pub(crate) fn is_foreign_key_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => {
            err.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY
        }
        _ => false,
    }
}
