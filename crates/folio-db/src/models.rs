//! Database row types: these map directly to SQLite rows.
//! Distinct from folio-types API models to keep the DB layer independent.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use tracing::warn;

use folio_types::models::{Project, User, UserSummary};

pub(crate) const USER_COLUMNS: &str = "u.id, u.username, u.email, u.password_hash, u.first_name, \
     u.last_name, u.phone, u.user_type, u.github_link, u.portfolio_link, u.linkedin_link, \
     u.company_name, u.profile_picture, u.banner, u.bio, u.created_at, u.updated_at";

pub(crate) const PROJECT_COLUMNS: &str = "p.id, p.user_id, p.name, p.description, p.code, \
     p.general_tags, p.programming_tags, p.images, p.status, p.created_at, \
     (SELECT COUNT(*) FROM project_likes l WHERE l.project_id = p.id), \
     u.username, u.first_name, u.last_name, u.profile_picture";

#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub user_type: Option<String>,
    pub github_link: Option<String>,
    pub portfolio_link: Option<String>,
    pub linkedin_link: Option<String>,
    pub company_name: Option<String>,
    pub profile_picture: Option<String>,
    pub banner: Option<String>,
    pub bio: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            first_name: row.get(4)?,
            last_name: row.get(5)?,
            phone: row.get(6)?,
            user_type: row.get(7)?,
            github_link: row.get(8)?,
            portfolio_link: row.get(9)?,
            linkedin_link: row.get(10)?,
            company_name: row.get(11)?,
            profile_picture: row.get(12)?,
            banner: row.get(13)?,
            bio: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }

    pub fn into_user(self) -> User {
        User {
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            id: self.id,
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            user_type: self.user_type,
            github_link: self.github_link,
            portfolio_link: self.portfolio_link,
            linkedin_link: self.linkedin_link,
            company_name: self.company_name,
            profile_picture: self.profile_picture,
            banner: self.banner,
            bio: self.bio,
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            profile_picture: self.profile_picture.clone(),
        }
    }
}

/// Fields captured at signup. Profile columns left `None` stay NULL.
#[derive(Debug, Default, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub user_type: Option<String>,
    pub github_link: Option<String>,
    pub portfolio_link: Option<String>,
    pub linkedin_link: Option<String>,
    pub company_name: Option<String>,
}

/// New project owned by `user_id`.
#[derive(Debug, Default, Clone)]
pub struct NewProject {
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub code: String,
    pub general_tags: Vec<String>,
    pub programming_tags: Vec<String>,
    pub images: Vec<String>,
    pub status: String,
}

/// Project joined with its author and like count.
#[derive(Debug, Clone)]
pub struct ProjectRow {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub code: String,
    pub general_tags: String,
    pub programming_tags: String,
    pub images: String,
    pub status: String,
    pub created_at: String,
    pub likes_count: i64,
    pub author_username: String,
    pub author_first_name: Option<String>,
    pub author_last_name: Option<String>,
    pub author_profile_picture: Option<String>,
}

impl ProjectRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            code: row.get(4)?,
            general_tags: row.get(5)?,
            programming_tags: row.get(6)?,
            images: row.get(7)?,
            status: row.get(8)?,
            created_at: row.get(9)?,
            likes_count: row.get(10)?,
            author_username: row.get(11)?,
            author_first_name: row.get(12)?,
            author_last_name: row.get(13)?,
            author_profile_picture: row.get(14)?,
        })
    }

    pub fn into_project(self) -> Project {
        Project {
            created_at: parse_timestamp(&self.created_at),
            general_tags: decode_list(&self.general_tags),
            programming_tags: decode_list(&self.programming_tags),
            images: decode_list(&self.images),
            developer: UserSummary {
                id: self.user_id,
                username: self.author_username,
                first_name: self.author_first_name,
                last_name: self.author_last_name,
                profile_picture: self.author_profile_picture,
            },
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            description: self.description,
            code: self.code,
            status: self.status,
            likes_count: self.likes_count,
        }
    }
}

/// Lists are stored as JSON arrays; blank entries are dropped on the way in.
pub(crate) fn encode_list(items: &[String]) -> serde_json::Result<String> {
    let kept: Vec<&str> = items
        .iter()
        .map(String::as_str)
        .filter(|s| !s.trim().is_empty())
        .collect();
    serde_json::to_string(&kept)
}

pub(crate) fn decode_list(stored: &str) -> Vec<String> {
    if stored.is_empty() {
        return Vec::new();
    }
    serde_json::from_str(stored).unwrap_or_else(|e| {
        warn!("Corrupt list column '{}': {}", stored, e);
        Vec::new()
    })
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand may carry SQLite's default "YYYY-MM-DD HH:MM:SS".
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_keep_commas_inside_entries() {
        let items = vec![
            "data:image/png;base64,iVBORw0KGgo=".to_string(),
            " ".to_string(),
            "c, c++".to_string(),
        ];
        let stored = encode_list(&items).unwrap();
        assert_eq!(stored, r#"["data:image/png;base64,iVBORw0KGgo=","c, c++"]"#);
        assert_eq!(
            decode_list(&stored),
            vec!["data:image/png;base64,iVBORw0KGgo=", "c, c++"]
        );
        assert!(decode_list("").is_empty());
        assert!(decode_list("not json").is_empty());
    }

    #[test]
    fn timestamps_parse_both_formats() {
        let a = parse_timestamp("2026-10-19T12:30:00.250Z");
        assert_eq!(a.timestamp_millis() % 1000, 250);

        let b = parse_timestamp("2026-10-19 12:30:00");
        assert_eq!(a.timestamp(), b.timestamp());

        assert_eq!(parse_timestamp("garbage"), DateTime::<Utc>::default());
    }
}
