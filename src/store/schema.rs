use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            path TEXT PRIMARY KEY,
            collection TEXT NOT NULL,
            doc_id TEXT NOT NULL,
            fields TEXT NOT NULL,
            written_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS documents_by_collection
            ON documents (collection, written_at);
        "#,
    )
    .context("applying schema migrations")?;
    Ok(())
}
