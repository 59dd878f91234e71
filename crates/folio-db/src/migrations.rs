use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, projects, relation edges)");
        // Timestamps are RFC 3339 UTC with millisecond precision.
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL UNIQUE,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                first_name      TEXT,
                last_name       TEXT,
                phone           TEXT,
                user_type       TEXT,
                github_link     TEXT,
                portfolio_link  TEXT,
                linkedin_link   TEXT,
                company_name    TEXT,
                profile_picture TEXT,
                banner          TEXT,
                bio             TEXT,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE projects (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id           INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name              TEXT NOT NULL,
                description       TEXT NOT NULL DEFAULT '',
                code              TEXT NOT NULL DEFAULT '',
                general_tags      TEXT NOT NULL DEFAULT '[]',
                programming_tags  TEXT NOT NULL DEFAULT '[]',
                images            TEXT NOT NULL DEFAULT '[]',
                status            TEXT NOT NULL DEFAULT 'published',
                created_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(user_id, name)
            );

            CREATE INDEX idx_projects_user ON projects(user_id, created_at);

            CREATE TABLE followers (
                follower_id   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                following_id  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(follower_id, following_id)
            );

            CREATE INDEX idx_followers_following ON followers(following_id);

            CREATE TABLE project_saves (
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                project_id  INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(user_id, project_id)
            );

            CREATE TABLE project_likes (
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                project_id  INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(user_id, project_id)
            );

            CREATE INDEX idx_project_likes_project ON project_likes(project_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
