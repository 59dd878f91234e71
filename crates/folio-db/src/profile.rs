//! Sparse profile updates.
//!
//! A request names any subset of the recognized fields. [`compute_change_set`]
//! keeps only the fields that carry a new value and [`Database::apply_change_set`]
//! writes them, plus a fresh `updated_at`, in a single statement.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use rusqlite::{ToSql, TransactionBehavior};
use tracing::debug;

use crate::models::UserRow;
use crate::queries::query_user_by_id;
use crate::{Database, Result, StoreError};

/// Profile columns a client may change. Declaration order is the column order
/// of the generated UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProfileField {
    FirstName,
    LastName,
    Email,
    Phone,
    Bio,
    GithubLink,
    PortfolioLink,
    LinkedinLink,
    CompanyName,
    ProfilePicture,
    Banner,
}

impl ProfileField {
    pub const ALL: [ProfileField; 11] = [
        ProfileField::FirstName,
        ProfileField::LastName,
        ProfileField::Email,
        ProfileField::Phone,
        ProfileField::Bio,
        ProfileField::GithubLink,
        ProfileField::PortfolioLink,
        ProfileField::LinkedinLink,
        ProfileField::CompanyName,
        ProfileField::ProfilePicture,
        ProfileField::Banner,
    ];

    /// Column name, which is also the form field name.
    pub fn column(self) -> &'static str {
        match self {
            ProfileField::FirstName => "first_name",
            ProfileField::LastName => "last_name",
            ProfileField::Email => "email",
            ProfileField::Phone => "phone",
            ProfileField::Bio => "bio",
            ProfileField::GithubLink => "github_link",
            ProfileField::PortfolioLink => "portfolio_link",
            ProfileField::LinkedinLink => "linkedin_link",
            ProfileField::CompanyName => "company_name",
            ProfileField::ProfilePicture => "profile_picture",
            ProfileField::Banner => "banner",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column() == name)
    }

    pub fn is_attachment(self) -> bool {
        matches!(self, ProfileField::ProfilePicture | ProfileField::Banner)
    }

    fn current(self, row: &UserRow) -> Option<&str> {
        match self {
            ProfileField::FirstName => row.first_name.as_deref(),
            ProfileField::LastName => row.last_name.as_deref(),
            ProfileField::Email => Some(row.email.as_str()),
            ProfileField::Phone => row.phone.as_deref(),
            ProfileField::Bio => row.bio.as_deref(),
            ProfileField::GithubLink => row.github_link.as_deref(),
            ProfileField::PortfolioLink => row.portfolio_link.as_deref(),
            ProfileField::LinkedinLink => row.linkedin_link.as_deref(),
            ProfileField::CompanyName => row.company_name.as_deref(),
            ProfileField::ProfilePicture => row.profile_picture.as_deref(),
            ProfileField::Banner => row.banner.as_deref(),
        }
    }
}

/// Uploaded image, stored inline as a data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl Attachment {
    pub fn to_data_uri(&self) -> String {
        let content_type = if self.content_type.is_empty() {
            "application/octet-stream"
        } else {
            self.content_type.as_str()
        };
        format!("data:{};base64,{}", content_type, B64.encode(&self.bytes))
    }
}

/// Raw sparse input as received from a client.
#[derive(Debug, Default, Clone)]
pub struct ProfileInput {
    text: BTreeMap<ProfileField, String>,
    attachments: BTreeMap<ProfileField, Attachment>,
}

impl ProfileInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a text value. Unknown names are ignored so older clients that
    /// send extra fields keep working. Returns whether the name was accepted.
    pub fn set_text(&mut self, name: &str, value: impl Into<String>) -> bool {
        match ProfileField::from_name(name) {
            Some(field) if !field.is_attachment() => {
                self.text.insert(field, value.into());
                true
            }
            _ => false,
        }
    }

    pub fn set_attachment(&mut self, name: &str, attachment: Attachment) -> bool {
        match ProfileField::from_name(name) {
            Some(field) if field.is_attachment() => {
                self.attachments.insert(field, attachment);
                true
            }
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.attachments.is_empty()
    }
}

/// Columns to write, in [`ProfileField`] order, each at most once.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<(ProfileField, String)>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn get(&self, field: ProfileField) -> Option<&str> {
        self.changes
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = ProfileField> + '_ {
        self.changes.iter().map(|(f, _)| *f)
    }

    /// `UPDATE users SET a = ?1, b = ?2, updated_at = <now> WHERE id = ?3`.
    /// Placeholders are numbered from each column's position in the change
    /// set; the id always binds last.
    fn update_sql(&self) -> String {
        let mut assignments: Vec<String> = self
            .changes
            .iter()
            .enumerate()
            .map(|(i, (field, _))| format!("{} = ?{}", field.column(), i + 1))
            .collect();
        assignments.push("updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')".to_string());

        format!(
            "UPDATE users SET {} WHERE id = ?{}",
            assignments.join(", "),
            self.changes.len() + 1
        )
    }
}

/// Keep each field whose input is present, non-empty and different from the
/// stored value. Attachments count only when a payload was uploaded.
pub fn compute_change_set(current: &UserRow, input: &ProfileInput) -> ChangeSet {
    let mut changes = Vec::new();

    for field in ProfileField::ALL {
        let value = if field.is_attachment() {
            input
                .attachments
                .get(&field)
                .filter(|a| !a.bytes.is_empty())
                .map(Attachment::to_data_uri)
        } else {
            input
                .text
                .get(&field)
                .filter(|v| !v.is_empty())
                .cloned()
        };

        if let Some(value) = value {
            if field.current(current) != Some(value.as_str()) {
                changes.push((field, value));
            }
        }
    }

    ChangeSet { changes }
}

impl Database {
    /// Write a change set and return the row as stored afterwards. An empty
    /// change set still refreshes `updated_at`.
    pub fn apply_change_set(&self, user_id: i64, change_set: &ChangeSet) -> Result<UserRow> {
        let sql = change_set.update_sql();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let mut params: Vec<&dyn ToSql> = change_set
                .changes
                .iter()
                .map(|(_, value)| value as &dyn ToSql)
                .collect();
            params.push(&user_id);

            let updated = tx.execute(&sql, params.as_slice())?;
            if updated == 0 {
                return Err(StoreError::NotFound);
            }

            let row = query_user_by_id(&tx, user_id)?.ok_or(StoreError::NotFound)?;
            tx.commit()?;

            debug!(
                "Profile {} updated ({} field(s))",
                user_id,
                change_set.len()
            );
            Ok(row)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::tests::new_user;

    fn user_with_stale_timestamp(db: &Database, name: &str) -> UserRow {
        let row = db.create_user(&new_user(name)).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET updated_at = '2020-01-01T00:00:00.000Z' WHERE id = ?1",
                [row.id],
            )?;
            Ok(())
        })
        .unwrap();
        db.get_user_by_id(row.id).unwrap().unwrap()
    }

    #[test]
    fn empty_input_yields_empty_change_set() {
        let db = Database::open_in_memory().unwrap();
        let ana = db.create_user(&new_user("ana")).unwrap();

        let changes = compute_change_set(&ana, &ProfileInput::new());
        assert!(changes.is_empty());
    }

    #[test]
    fn empty_and_unknown_fields_are_dropped() {
        let db = Database::open_in_memory().unwrap();
        let ana = db.create_user(&new_user("ana")).unwrap();

        let mut input = ProfileInput::new();
        assert!(input.set_text("bio", "builds things"));
        assert!(input.set_text("first_name", ""));
        assert!(!input.set_text("favourite_colour", "teal"));
        assert!(!input.set_text("username", "mallory"));
        assert!(!input.set_text("banner", "not bytes"));

        let changes = compute_change_set(&ana, &input);
        assert_eq!(changes.fields().collect::<Vec<_>>(), vec![ProfileField::Bio]);
        assert_eq!(changes.get(ProfileField::Bio), Some("builds things"));
    }

    #[test]
    fn text_is_stored_verbatim() {
        let db = Database::open_in_memory().unwrap();
        let ana = db.create_user(&new_user("ana")).unwrap();

        let bio = "  - item one\n  - item two\n";
        let mut input = ProfileInput::new();
        input.set_text("bio", bio);
        input.set_text("last_name", "   ");

        let changes = compute_change_set(&ana, &input);
        assert_eq!(changes.len(), 2);
        let row = db.apply_change_set(ana.id, &changes).unwrap();
        assert_eq!(row.bio.as_deref(), Some(bio));
        assert_eq!(row.last_name.as_deref(), Some("   "));

        // A whitespace-only difference is still a change.
        let mut input = ProfileInput::new();
        input.set_text("bio", "  - item one\n  - item two");
        let changes = compute_change_set(&row, &input);
        assert_eq!(changes.get(ProfileField::Bio), Some("  - item one\n  - item two"));
    }

    #[test]
    fn unchanged_values_are_dropped() {
        let db = Database::open_in_memory().unwrap();
        let ana = db.create_user(&new_user("ana")).unwrap();

        let mut input = ProfileInput::new();
        input.set_text("email", "ana@example.com");
        assert!(compute_change_set(&ana, &input).is_empty());
    }

    #[test]
    fn attachments_become_data_uris() {
        let db = Database::open_in_memory().unwrap();
        let ana = db.create_user(&new_user("ana")).unwrap();

        let mut input = ProfileInput::new();
        assert!(input.set_attachment(
            "profile_picture",
            Attachment {
                bytes: b"png".to_vec(),
                content_type: "image/png".to_string(),
            },
        ));
        input.set_attachment(
            "banner",
            Attachment {
                bytes: Vec::new(),
                content_type: "image/png".to_string(),
            },
        );

        let changes = compute_change_set(&ana, &input);
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes.get(ProfileField::ProfilePicture),
            Some("data:image/png;base64,cG5n")
        );
    }

    #[test]
    fn empty_change_set_only_touches_timestamp() {
        let db = Database::open_in_memory().unwrap();
        let before = user_with_stale_timestamp(&db, "ana");

        let after = db.apply_change_set(before.id, &ChangeSet::default()).unwrap();

        assert_ne!(after.updated_at, before.updated_at);
        assert_eq!(
            UserRow {
                updated_at: before.updated_at.clone(),
                ..after
            },
            before
        );
    }

    #[test]
    fn applies_every_field_in_one_statement() {
        let db = Database::open_in_memory().unwrap();
        let before = user_with_stale_timestamp(&db, "ana");

        let mut input = ProfileInput::new();
        for field in ProfileField::ALL.iter().filter(|f| !f.is_attachment()) {
            input.set_text(field.column(), format!("new {}", field.column()));
        }
        input.set_text("email", "ana@folio.dev");
        input.set_attachment(
            "profile_picture",
            Attachment {
                bytes: vec![1, 2, 3],
                content_type: "image/jpeg".to_string(),
            },
        );
        input.set_attachment(
            "banner",
            Attachment {
                bytes: vec![4, 5, 6],
                content_type: "".to_string(),
            },
        );

        let changes = compute_change_set(&before, &input);
        assert_eq!(changes.len(), 11);

        let after = db.apply_change_set(before.id, &changes).unwrap();
        assert_eq!(after.first_name.as_deref(), Some("new first_name"));
        assert_eq!(after.company_name.as_deref(), Some("new company_name"));
        assert_eq!(after.email, "ana@folio.dev");
        assert_eq!(after.profile_picture.as_deref(), Some("data:image/jpeg;base64,AQID"));
        assert_eq!(
            after.banner.as_deref(),
            Some("data:application/octet-stream;base64,BAUG")
        );
        assert_eq!(after.username, "ana");
        assert_eq!(after.password_hash, before.password_hash);
        assert_ne!(after.updated_at, before.updated_at);
    }

    #[test]
    fn absent_fields_keep_their_values() {
        let db = Database::open_in_memory().unwrap();
        let ana = db.create_user(&new_user("ana")).unwrap();

        let mut first = ProfileInput::new();
        first.set_text("bio", "hello");
        first.set_text("phone", "555-0100");
        let ana = db
            .apply_change_set(ana.id, &compute_change_set(&ana, &first))
            .unwrap();

        let mut second = ProfileInput::new();
        second.set_text("bio", "updated");
        second.set_text("phone", "");
        let ana = db
            .apply_change_set(ana.id, &compute_change_set(&ana, &second))
            .unwrap();

        assert_eq!(ana.bio.as_deref(), Some("updated"));
        assert_eq!(ana.phone.as_deref(), Some("555-0100"));
    }

    #[test]
    fn missing_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.apply_change_set(404, &ChangeSet::default()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn taken_email_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("bob")).unwrap();
        let ana = db.create_user(&new_user("ana")).unwrap();

        let mut input = ProfileInput::new();
        input.set_text("email", "bob@example.com");
        assert!(matches!(
            db.apply_change_set(ana.id, &compute_change_set(&ana, &input)),
            Err(StoreError::Conflict)
        ));
    }

    #[test]
    fn update_sql_binds_id_last() {
        let mut input = ProfileInput::new();
        input.set_text("bio", "x");
        input.set_text("first_name", "y");
        let row = UserRow {
            id: 1,
            username: "ana".into(),
            email: "ana@example.com".into(),
            password_hash: String::new(),
            first_name: None,
            last_name: None,
            phone: None,
            user_type: None,
            github_link: None,
            portfolio_link: None,
            linkedin_link: None,
            company_name: None,
            profile_picture: None,
            banner: None,
            bio: None,
            created_at: String::new(),
            updated_at: String::new(),
        };

        let sql = compute_change_set(&row, &input).update_sql();
        assert_eq!(
            sql,
            "UPDATE users SET first_name = ?1, bio = ?2, \
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?3"
        );
    }
}
