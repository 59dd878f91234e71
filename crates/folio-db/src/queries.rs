use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{
    NewProject, NewUser, PROJECT_COLUMNS, ProjectRow, USER_COLUMNS, UserRow, encode_list,
};
use crate::{Database, Result, StoreError};

impl Database {
    // -- Users --

    /// Insert a user and return the stored row. A taken username or email
    /// surfaces as `StoreError::Conflict`.
    pub fn create_user(&self, user: &NewUser) -> Result<UserRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password_hash, first_name, last_name, phone,
                    user_type, github_link, portfolio_link, linkedin_link, company_name)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    user.username,
                    user.email,
                    user.password_hash,
                    non_empty(&user.first_name),
                    non_empty(&user.last_name),
                    non_empty(&user.phone),
                    non_empty(&user.user_type),
                    non_empty(&user.github_link),
                    non_empty(&user.portfolio_link),
                    non_empty(&user.linkedin_link),
                    non_empty(&user.company_name),
                ],
            )?;

            let id = conn.last_insert_rowid();
            query_user_by_id(conn, id)?.ok_or(StoreError::NotFound)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.email = ?1", email))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.username = ?1", username))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_id_by_username(&self, username: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let id = conn
                .query_row("SELECT id FROM users WHERE username = ?1", [username], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(id)
        })
    }

    // -- Projects --

    pub fn create_project(&self, project: &NewProject) -> Result<ProjectRow> {
        let general_tags = encode_list(&project.general_tags)?;
        let programming_tags = encode_list(&project.programming_tags)?;
        let images = encode_list(&project.images)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO projects (user_id, name, description, code, general_tags,
                    programming_tags, images, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    project.user_id,
                    project.name,
                    project.description,
                    project.code,
                    general_tags,
                    programming_tags,
                    images,
                    project.status,
                ],
            )?;

            let id = conn.last_insert_rowid();
            query_project_by_id(conn, id)?.ok_or(StoreError::NotFound)
        })
    }

    /// Project names are unique per owner, so `(username, name)` is a key.
    pub fn get_project_by_name(&self, username: &str, name: &str) -> Result<Option<ProjectRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {PROJECT_COLUMNS}
                 FROM projects p
                 JOIN users u ON p.user_id = u.id
                 WHERE u.username = ?1 AND p.name = ?2"
            );
            let row = conn
                .query_row(&sql, params![username, name], ProjectRow::from_row)
                .optional()?;
            Ok(row)
        })
    }

    /// All projects, newest first.
    pub fn list_projects(&self) -> Result<Vec<ProjectRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {PROJECT_COLUMNS}
                 FROM projects p
                 JOIN users u ON p.user_id = u.id
                 ORDER BY p.created_at DESC, p.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], ProjectRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_projects_by_user(&self, user_id: i64) -> Result<Vec<ProjectRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {PROJECT_COLUMNS}
                 FROM projects p
                 JOIN users u ON p.user_id = u.id
                 WHERE p.user_id = ?1
                 ORDER BY p.created_at DESC, p.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], ProjectRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// Signup forms send "" for fields the user skipped; store those as NULL.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

pub(crate) fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    query_user(conn, "u.id = ?1", id)
}

fn query_user<P: rusqlite::ToSql>(
    conn: &Connection,
    predicate: &str,
    value: P,
) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE {predicate}");
    let row = conn
        .query_row(&sql, [value], UserRow::from_row)
        .optional()?;
    Ok(row)
}

pub(crate) fn query_project_by_id(conn: &Connection, id: i64) -> Result<Option<ProjectRow>> {
    let sql = format!(
        "SELECT {PROJECT_COLUMNS}
         FROM projects p
         JOIN users u ON p.user_id = u.id
         WHERE p.id = ?1"
    );
    let row = conn
        .query_row(&sql, [id], ProjectRow::from_row)
        .optional()?;
    Ok(row)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password_hash: "$argon2id$placeholder".to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn new_project(user_id: i64, name: &str) -> NewProject {
        NewProject {
            user_id,
            name: name.to_string(),
            description: "demo".to_string(),
            general_tags: vec!["web".to_string()],
            status: "published".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn create_and_fetch_user() {
        let db = Database::open_in_memory().unwrap();
        let mut input = new_user("ana");
        input.first_name = Some("Ana".to_string());
        input.phone = Some("".to_string());
        input.company_name = Some(" Acme ".to_string());

        let row = db.create_user(&input).unwrap();
        assert_eq!(row.username, "ana");
        assert_eq!(row.first_name.as_deref(), Some("Ana"));
        assert_eq!(row.phone, None);
        assert_eq!(row.company_name.as_deref(), Some(" Acme "));

        let by_email = db.get_user_by_email("ana@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, row.id);
        assert_eq!(db.get_user_id_by_username("ana").unwrap(), Some(row.id));
        assert!(db.get_user_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("ana")).unwrap();

        let mut dup = new_user("ana");
        dup.email = "other@example.com".to_string();
        assert!(matches!(db.create_user(&dup), Err(StoreError::Conflict)));
    }

    #[test]
    fn duplicate_email_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("ana")).unwrap();

        let mut dup = new_user("bob");
        dup.email = "ana@example.com".to_string();
        assert!(matches!(db.create_user(&dup), Err(StoreError::Conflict)));
    }

    #[test]
    fn projects_list_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let ana = db.create_user(&new_user("ana")).unwrap();

        let first = db.create_project(&new_project(ana.id, "first")).unwrap();
        let second = db.create_project(&new_project(ana.id, "second")).unwrap();
        assert_eq!(first.author_username, "ana");
        assert_eq!(first.general_tags, r#"["web"]"#);

        let ids: Vec<i64> = db.list_projects().unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        assert_eq!(db.list_projects_by_user(ana.id).unwrap().len(), 2);
        let by_name = db.get_project_by_name("ana", "second").unwrap().unwrap();
        assert_eq!(by_name.id, second.id);
        assert!(db.get_project_by_name("ana", "third").unwrap().is_none());
        assert!(db.get_project_by_name("bob", "first").unwrap().is_none());
    }

    #[test]
    fn project_lists_survive_commas() {
        let db = Database::open_in_memory().unwrap();
        let ana = db.create_user(&new_user("ana")).unwrap();

        let mut input = new_project(ana.id, "screenshots");
        input.images = vec![
            "data:image/png;base64,iVBORw0KGgo=".to_string(),
            "data:image/jpeg;base64,/9j/4AAQ".to_string(),
        ];
        input.general_tags = vec!["c, c++".to_string()];

        let project = db.create_project(&input).unwrap().into_project();
        assert_eq!(project.images, input.images);
        assert_eq!(project.general_tags, vec!["c, c++"]);
        assert!(project.programming_tags.is_empty());

        let fetched = db
            .get_project_by_name("ana", "screenshots")
            .unwrap()
            .unwrap()
            .into_project();
        assert_eq!(fetched.images.len(), 2);
    }

    #[test]
    fn project_for_missing_owner_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.create_project(&new_project(404, "orphan")),
            Err(StoreError::NotFound)
        ));
    }
}
