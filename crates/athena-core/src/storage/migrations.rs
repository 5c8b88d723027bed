//! SQLite schema migrations
//!
//! Applied in order against `schema_version`. Every memory layer shares
//! the same shape: an opaque `body` JSON blob, an optional `embedding`
//! BLOB (little-endian f32s) for vector search, and `lexical_text` mirrored
//! into an FTS5 shadow table for lexical search.

pub const MIGRATIONS: &[&str] = &[
    // v1: schema_version bookkeeping
    r#"
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    );
    "#,
    // v2: the unified records table, one row per (namespace, project_id, id)
    r#"
    CREATE TABLE IF NOT EXISTS records (
        namespace     TEXT NOT NULL,
        project_id    TEXT NOT NULL,
        id            TEXT NOT NULL,
        body          TEXT NOT NULL,
        embedding     BLOB,
        lexical_text  TEXT,
        tag           TEXT,
        updated_at    TEXT NOT NULL,
        PRIMARY KEY (namespace, project_id, id)
    );
    CREATE INDEX IF NOT EXISTS idx_records_scan
        ON records (namespace, project_id, updated_at DESC);
    CREATE INDEX IF NOT EXISTS idx_records_tag
        ON records (namespace, project_id, tag);
    "#,
    // v3: FTS5 shadow index for lexical search
    r#"
    CREATE VIRTUAL TABLE IF NOT EXISTS records_fts USING fts5(
        lexical_text,
        content='records',
        content_rowid='rowid'
    );
    CREATE TRIGGER IF NOT EXISTS records_ai AFTER INSERT ON records BEGIN
        INSERT INTO records_fts(rowid, lexical_text) VALUES (new.rowid, new.lexical_text);
    END;
    CREATE TRIGGER IF NOT EXISTS records_ad AFTER DELETE ON records BEGIN
        INSERT INTO records_fts(records_fts, rowid, lexical_text) VALUES ('delete', old.rowid, old.lexical_text);
    END;
    CREATE TRIGGER IF NOT EXISTS records_au AFTER UPDATE ON records BEGIN
        INSERT INTO records_fts(records_fts, rowid, lexical_text) VALUES ('delete', old.rowid, old.lexical_text);
        INSERT INTO records_fts(rowid, lexical_text) VALUES (new.rowid, new.lexical_text);
    END;
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn migrations_apply_cleanly_to_a_fresh_connection() {
        let conn = Connection::open_in_memory().unwrap();
        for stmt in MIGRATIONS {
            conn.execute_batch(stmt).unwrap();
        }
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='records'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
