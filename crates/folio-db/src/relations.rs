//! Generic relation engine.
//!
//! Follow, save and like are all directed edges `(source, target)` in a
//! table with a `UNIQUE(source, target)` constraint. One implementation
//! serves all three; [`RelationKind`] supplies the table and column names.

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::{debug, warn};

use crate::error::is_unique_violation;
use crate::models::{PROJECT_COLUMNS, ProjectRow, USER_COLUMNS, UserRow, parse_timestamp};
use crate::{Database, Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// user -> user
    Follow,
    /// user -> project
    Save,
    /// user -> project, insert-only
    Like,
}

impl RelationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationKind::Follow => "follow",
            RelationKind::Save => "save",
            RelationKind::Like => "like",
        }
    }

    fn table(self) -> &'static str {
        match self {
            RelationKind::Follow => "followers",
            RelationKind::Save => "project_saves",
            RelationKind::Like => "project_likes",
        }
    }

    fn source_column(self) -> &'static str {
        match self {
            RelationKind::Follow => "follower_id",
            RelationKind::Save | RelationKind::Like => "user_id",
        }
    }

    fn target_column(self) -> &'static str {
        match self {
            RelationKind::Follow => "following_id",
            RelationKind::Save | RelationKind::Like => "project_id",
        }
    }

    /// Table holding the entities edges point at.
    fn target_table(self) -> &'static str {
        match self {
            RelationKind::Follow => "users",
            RelationKind::Save | RelationKind::Like => "projects",
        }
    }

    pub fn allows_self_reference(self) -> bool {
        !matches!(self, RelationKind::Follow)
    }

    /// Likes are permanent: there is no unlike path.
    pub fn is_reversible(self) -> bool {
        !matches!(self, RelationKind::Like)
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Created,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensure {
    Created,
    AlreadyExists,
}

/// One stored edge as seen from either end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub source_id: i64,
    pub target_id: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Database {
    /// Flip the edge: insert it if absent, delete it if present.
    ///
    /// The existence check and the write run in one IMMEDIATE transaction,
    /// so two toggles on the same key are serialized by the store.
    pub fn toggle(&self, kind: RelationKind, source: i64, target: i64) -> Result<Toggle> {
        if !kind.is_reversible() {
            return Err(StoreError::InvalidRelation("relation cannot be toggled off"));
        }
        check_self_reference(kind, source, target)?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if !target_exists(&tx, kind, target)? {
                return Err(StoreError::TargetNotFound);
            }

            let outcome = if edge_exists(&tx, kind, source, target)? {
                let sql = format!(
                    "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
                    kind.table(),
                    kind.source_column(),
                    kind.target_column()
                );
                tx.execute(&sql, params![source, target])?;
                Toggle::Removed
            } else {
                insert_or_absorb(&tx, kind, source, target)?;
                Toggle::Created
            };

            tx.commit()?;
            debug!("{} {} -> {}: {:?}", kind, source, target, outcome);
            Ok(outcome)
        })
    }

    /// One-way idempotent insert. Concurrent callers leave exactly one edge.
    pub fn ensure(&self, kind: RelationKind, source: i64, target: i64) -> Result<Ensure> {
        check_self_reference(kind, source, target)?;

        self.with_conn(|conn| {
            if !target_exists(conn, kind, target)? {
                return Err(StoreError::TargetNotFound);
            }

            let sql = format!(
                "INSERT INTO {} ({}, {}) VALUES (?1, ?2)
                 ON CONFLICT ({}, {}) DO NOTHING",
                kind.table(),
                kind.source_column(),
                kind.target_column(),
                kind.source_column(),
                kind.target_column()
            );
            let inserted = conn.execute(&sql, params![source, target])?;

            Ok(if inserted == 1 {
                Ensure::Created
            } else {
                Ensure::AlreadyExists
            })
        })
    }

    /// Delete the edge if present. Returns whether anything was removed.
    pub fn remove(&self, kind: RelationKind, source: i64, target: i64) -> Result<bool> {
        if !kind.is_reversible() {
            return Err(StoreError::InvalidRelation("relation cannot be removed"));
        }

        self.with_conn(|conn| {
            let sql = format!(
                "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
                kind.table(),
                kind.source_column(),
                kind.target_column()
            );
            let removed = conn.execute(&sql, params![source, target])?;
            Ok(removed > 0)
        })
    }

    pub fn exists(&self, kind: RelationKind, source: i64, target: i64) -> Result<bool> {
        self.with_conn(|conn| edge_exists(conn, kind, source, target))
    }

    /// Edges leaving `source`, newest first.
    pub fn list_targets(&self, kind: RelationKind, source: i64) -> Result<Vec<Edge>> {
        self.with_conn(|conn| list_edges(conn, kind, kind.source_column(), source))
    }

    /// Edges arriving at `target`, newest first.
    pub fn list_sources(&self, kind: RelationKind, target: i64) -> Result<Vec<Edge>> {
        self.with_conn(|conn| list_edges(conn, kind, kind.target_column(), target))
    }

    pub fn count_targets(&self, kind: RelationKind, source: i64) -> Result<i64> {
        self.with_conn(|conn| count_edges(conn, kind, kind.source_column(), source))
    }

    pub fn count_sources(&self, kind: RelationKind, target: i64) -> Result<i64> {
        self.with_conn(|conn| count_edges(conn, kind, kind.target_column(), target))
    }

    // -- Entity listings --

    /// Projects saved by `user_id`, most recently saved first.
    pub fn saved_projects(&self, user_id: i64) -> Result<Vec<ProjectRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {PROJECT_COLUMNS}
                 FROM project_saves s
                 JOIN projects p ON s.project_id = p.id
                 JOIN users u ON p.user_id = u.id
                 WHERE s.user_id = ?1
                 ORDER BY s.created_at DESC, s.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], ProjectRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Users `user_id` follows, most recent follow first.
    pub fn following(&self, user_id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS}
                 FROM followers f
                 JOIN users u ON f.following_id = u.id
                 WHERE f.follower_id = ?1
                 ORDER BY f.created_at DESC, f.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], UserRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Users following `user_id`, most recent follower first.
    pub fn followers(&self, user_id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS}
                 FROM followers f
                 JOIN users u ON f.follower_id = u.id
                 WHERE f.following_id = ?1
                 ORDER BY f.created_at DESC, f.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], UserRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn check_self_reference(kind: RelationKind, source: i64, target: i64) -> Result<()> {
    if source == target && !kind.allows_self_reference() {
        return Err(StoreError::InvalidRelation("source and target are the same"));
    }
    Ok(())
}

fn target_exists(conn: &Connection, kind: RelationKind, target: i64) -> Result<bool> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)",
        kind.target_table()
    );
    let exists = conn.query_row(&sql, [target], |row| row.get(0))?;
    Ok(exists)
}

fn edge_exists(conn: &Connection, kind: RelationKind, source: i64, target: i64) -> Result<bool> {
    let sql = format!(
        "SELECT 1 FROM {} WHERE {} = ?1 AND {} = ?2",
        kind.table(),
        kind.source_column(),
        kind.target_column()
    );
    let found: Option<i64> = conn
        .query_row(&sql, params![source, target], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn insert_edge(
    conn: &Connection,
    kind: RelationKind,
    source: i64,
    target: i64,
) -> rusqlite::Result<()> {
    let sql = format!(
        "INSERT INTO {} ({}, {}) VALUES (?1, ?2)",
        kind.table(),
        kind.source_column(),
        kind.target_column()
    );
    conn.execute(&sql, params![source, target])?;
    Ok(())
}

/// Insert an edge that the caller just saw as absent. Inside this process
/// the connection mutex makes a duplicate impossible; another process writing
/// the same database file can still win the race, and then the edge exists,
/// which is what the caller wanted.
fn insert_or_absorb(conn: &Connection, kind: RelationKind, source: i64, target: i64) -> Result<()> {
    match insert_edge(conn, kind, source, target) {
        Ok(()) => Ok(()),
        Err(e) if is_unique_violation(&e) => {
            warn!("Duplicate {} edge {} -> {} absorbed", kind, source, target);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn list_edges(conn: &Connection, kind: RelationKind, key_column: &str, key: i64) -> Result<Vec<Edge>> {
    let sql = format!(
        "SELECT {}, {}, created_at FROM {} WHERE {} = ?1 ORDER BY created_at DESC, rowid DESC",
        kind.source_column(),
        kind.target_column(),
        kind.table(),
        key_column
    );
    let mut stmt = conn.prepare(&sql)?;
    let edges = stmt
        .query_map([key], |row| {
            Ok(Edge {
                source_id: row.get(0)?,
                target_id: row.get(1)?,
                created_at: parse_timestamp(&row.get::<_, String>(2)?),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(edges)
}

fn count_edges(conn: &Connection, kind: RelationKind, key_column: &str, key: i64) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", kind.table(), key_column);
    let count = conn.query_row(&sql, [key], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use super::*;
    use crate::queries::tests::{new_project, new_user};

    fn seeded() -> (Database, i64, i64, i64) {
        let db = Database::open_in_memory().unwrap();
        let ana = db.create_user(&new_user("ana")).unwrap().id;
        let bob = db.create_user(&new_user("bob")).unwrap().id;
        let project = db.create_project(&new_project(bob, "site")).unwrap().id;
        (db, ana, bob, project)
    }

    #[test]
    fn toggle_creates_then_removes() {
        let (db, ana, bob, _) = seeded();

        assert_eq!(db.toggle(RelationKind::Follow, ana, bob).unwrap(), Toggle::Created);
        assert!(db.exists(RelationKind::Follow, ana, bob).unwrap());
        assert!(!db.exists(RelationKind::Follow, bob, ana).unwrap());

        assert_eq!(db.toggle(RelationKind::Follow, ana, bob).unwrap(), Toggle::Removed);
        assert!(!db.exists(RelationKind::Follow, ana, bob).unwrap());
    }

    #[test]
    fn follow_self_is_invalid() {
        let (db, ana, _, _) = seeded();
        assert!(matches!(
            db.toggle(RelationKind::Follow, ana, ana),
            Err(StoreError::InvalidRelation(_))
        ));
        assert!(matches!(
            db.toggle(RelationKind::Follow, 5, 5),
            Err(StoreError::InvalidRelation(_))
        ));
    }

    #[test]
    fn missing_target_is_reported() {
        let (db, ana, _, _) = seeded();
        assert!(matches!(
            db.toggle(RelationKind::Follow, ana, 9999),
            Err(StoreError::TargetNotFound)
        ));
        assert!(matches!(
            db.toggle(RelationKind::Save, ana, 9999),
            Err(StoreError::TargetNotFound)
        ));
        assert!(matches!(
            db.ensure(RelationKind::Like, ana, 9999),
            Err(StoreError::TargetNotFound)
        ));
    }

    #[test]
    fn save_toggles_against_projects() {
        let (db, ana, _, project) = seeded();
        assert_eq!(db.toggle(RelationKind::Save, ana, project).unwrap(), Toggle::Created);
        assert_eq!(db.saved_projects(ana).unwrap()[0].id, project);
        assert_eq!(db.toggle(RelationKind::Save, ana, project).unwrap(), Toggle::Removed);
        assert!(db.saved_projects(ana).unwrap().is_empty());
    }

    #[test]
    fn ensure_is_idempotent() {
        let (db, ana, _, project) = seeded();

        assert_eq!(db.ensure(RelationKind::Like, ana, project).unwrap(), Ensure::Created);
        assert_eq!(
            db.ensure(RelationKind::Like, ana, project).unwrap(),
            Ensure::AlreadyExists
        );
        assert_eq!(db.count_sources(RelationKind::Like, project).unwrap(), 1);
    }

    #[test]
    fn like_is_one_way() {
        let (db, ana, _, project) = seeded();
        db.ensure(RelationKind::Like, ana, project).unwrap();

        assert!(matches!(
            db.toggle(RelationKind::Like, ana, project),
            Err(StoreError::InvalidRelation(_))
        ));
        assert!(matches!(
            db.remove(RelationKind::Like, ana, project),
            Err(StoreError::InvalidRelation(_))
        ));
        assert!(db.exists(RelationKind::Like, ana, project).unwrap());
    }

    #[test]
    fn remove_reports_whether_edge_existed() {
        let (db, ana, _, project) = seeded();
        assert!(!db.remove(RelationKind::Save, ana, project).unwrap());
        db.ensure(RelationKind::Save, ana, project).unwrap();
        assert!(db.remove(RelationKind::Save, ana, project).unwrap());
    }

    #[test]
    fn listings_are_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let ana = db.create_user(&new_user("ana")).unwrap().id;
        let bob = db.create_user(&new_user("bob")).unwrap().id;
        let cat = db.create_user(&new_user("cat")).unwrap().id;

        db.toggle(RelationKind::Follow, ana, bob).unwrap();
        db.toggle(RelationKind::Follow, ana, cat).unwrap();
        db.toggle(RelationKind::Follow, cat, bob).unwrap();

        let targets: Vec<i64> = db
            .list_targets(RelationKind::Follow, ana)
            .unwrap()
            .iter()
            .map(|e| e.target_id)
            .collect();
        assert_eq!(targets, vec![cat, bob]);

        let following: Vec<String> = db.following(ana).unwrap().into_iter().map(|u| u.username).collect();
        assert_eq!(following, vec!["cat", "bob"]);

        let followers: Vec<String> = db.followers(bob).unwrap().into_iter().map(|u| u.username).collect();
        assert_eq!(followers, vec!["cat", "ana"]);

        let sources: Vec<i64> = db
            .list_sources(RelationKind::Follow, bob)
            .unwrap()
            .iter()
            .map(|e| e.source_id)
            .collect();
        assert_eq!(sources, vec![cat, ana]);

        assert_eq!(db.count_targets(RelationKind::Follow, ana).unwrap(), 2);
        assert_eq!(db.count_sources(RelationKind::Follow, bob).unwrap(), 2);

        // A second pass starts over.
        assert_eq!(db.list_targets(RelationKind::Follow, ana).unwrap().len(), 2);
    }

    #[test]
    fn duplicate_insert_is_absorbed() {
        let (db, ana, bob, _) = seeded();

        db.with_conn(|conn| {
            insert_edge(conn, RelationKind::Follow, ana, bob)?;
            // Edge already present, as if another writer got there first.
            insert_or_absorb(conn, RelationKind::Follow, ana, bob)
        })
        .unwrap();

        assert_eq!(db.count_targets(RelationKind::Follow, ana).unwrap(), 1);
    }

    #[test]
    fn concurrent_likes_leave_one_edge() {
        let (db, ana, _, project) = seeded();
        let db = Arc::new(db);
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let db = db.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    db.ensure(RelationKind::Like, ana, project).unwrap()
                })
            })
            .collect();

        let mut outcomes: Vec<Ensure> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        outcomes.sort_by_key(|o| *o == Ensure::AlreadyExists);

        assert_eq!(outcomes, vec![Ensure::Created, Ensure::AlreadyExists]);
        assert_eq!(db.count_sources(RelationKind::Like, project).unwrap(), 1);
    }

    #[test]
    fn concurrent_toggles_never_duplicate() {
        let (db, ana, bob, _) = seeded();
        let db = Arc::new(db);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                thread::spawn(move || db.toggle(RelationKind::Follow, ana, bob).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // Eight flips from "absent" land back on "absent".
        assert_eq!(db.count_targets(RelationKind::Follow, ana).unwrap(), 0);
    }
}
