use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{
    schema, select, CollectionPath, DocPath, Document, DocumentStore, FieldValue, Fields, Filter,
    OrderBy,
};
use crate::clock::SharedClock;
use crate::config::StorageOptions;
use crate::error::StoreError;

/// Local stand-in for the remote document store, backed by one SQLite file.
///
/// Every call opens its own connection, so the handle is cheap to clone and
/// safe to share between concurrently polled fetches.
#[derive(Clone)]
pub struct SqliteStore {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
    clock: SharedClock,
}

impl SqliteStore {
    pub fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&*self.db_path)?;
        prepare_connection(&conn, &self.options)
            .map_err(|err| StoreError::Unavailable(format!("{err:#}")))?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    fn resolve_server_values(&self, fields: Fields) -> Fields {
        let now = self.clock.now();
        fields
            .into_iter()
            .map(|(key, value)| match value {
                FieldValue::ServerTimestamp => (key, FieldValue::Timestamp(now)),
                other => (key, other),
            })
            .collect()
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn add_document(
        &self,
        collection: &CollectionPath,
        fields: Fields,
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        let path = collection.doc(id.clone());
        let fields = self.resolve_server_values(fields);
        let encoded = serde_json::to_string(&fields).map_err(|err| StoreError::Corrupt {
            path: path.to_string(),
            reason: err.to_string(),
        })?;
        let written_at = self.clock.now().unix_timestamp();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO documents (path, collection, doc_id, fields, written_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    path.to_string(),
                    collection.to_string(),
                    id,
                    encoded,
                    written_at
                ],
            )?;
            Ok(())
        })?;
        tracing::debug!(%path, "document added");
        Ok(id)
    }

    async fn query_collection(
        &self,
        collection: &CollectionPath,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Document>, StoreError> {
        let rows = self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT doc_id, fields FROM documents
                 WHERE collection = ?1
                 ORDER BY written_at, rowid",
            )?;
            let rows = stmt
                .query_map(params![collection.to_string()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        let mut docs = Vec::with_capacity(rows.len());
        for (doc_id, raw) in rows {
            let path = collection.doc(doc_id);
            let fields: Fields =
                serde_json::from_str(&raw).map_err(|err| StoreError::Corrupt {
                    path: path.to_string(),
                    reason: err.to_string(),
                })?;
            docs.push(Document { path, fields });
        }
        Ok(select(docs, filters, order_by))
    }

    async fn delete_document(&self, path: &DocPath) -> Result<(), StoreError> {
        let removed = self.with_connection(|conn| {
            let removed = conn.execute(
                "DELETE FROM documents WHERE path = ?1",
                params![path.to_string()],
            )?;
            Ok(removed)
        })?;
        if removed == 0 {
            return Err(StoreError::NotFound(path.to_string()));
        }
        tracing::debug!(%path, "document deleted");
        Ok(())
    }
}

pub fn init(storage: &StorageOptions, clock: SharedClock) -> Result<SqliteStore> {
    let db_path = &storage.database_path;
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    Ok(SqliteStore {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
        clock,
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::SortDirection;
    use crate::store::paths;
    use assert_matches::assert_matches;
    use tempfile::TempDir;
    use time::macros::datetime;
    use time::Duration;

    fn init_store() -> anyhow::Result<(TempDir, Arc<ManualClock>, SqliteStore)> {
        let temp = TempDir::new()?;
        let clock = Arc::new(ManualClock::new(datetime!(2024-03-15 12:00 UTC)));
        let mut options = StorageOptions::default();
        options.database_path = temp.path().join("data/careline.db");
        let store = init(&options, clock.clone())?;
        Ok((temp, clock, store))
    }

    fn event_fields(title: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("title".into(), FieldValue::text(title));
        fields.insert("timestamp".into(), FieldValue::ServerTimestamp);
        fields
    }

    #[tokio::test]
    async fn server_timestamp_is_resolved_from_store_clock() -> anyhow::Result<()> {
        let (_temp, clock, store) = init_store()?;
        let timeline = paths::timeline("u", "p");
        store.add_document(&timeline, event_fields("water")).await?;
        clock.advance(Duration::minutes(5));
        store.add_document(&timeline, event_fields("meal")).await?;

        let docs = store.query_collection(&timeline, &[], None).await?;
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text("title"), Some("water"));
        assert_eq!(
            docs[0].timestamp("timestamp"),
            Some(datetime!(2024-03-15 12:00 UTC))
        );
        assert_eq!(
            docs[1].timestamp("timestamp"),
            Some(datetime!(2024-03-15 12:05 UTC))
        );
        Ok(())
    }

    #[tokio::test]
    async fn collections_are_isolated_and_ordered() -> anyhow::Result<()> {
        let (_temp, clock, store) = init_store()?;
        let first = paths::timeline("u", "p1");
        let second = paths::timeline("u", "p2");
        store.add_document(&first, event_fields("a")).await?;
        clock.advance(Duration::seconds(1));
        store.add_document(&second, event_fields("b")).await?;
        clock.advance(Duration::seconds(1));
        store.add_document(&first, event_fields("c")).await?;

        let order = OrderBy::new("timestamp", SortDirection::Descending);
        let docs = store.query_collection(&first, &[], Some(&order)).await?;
        let titles: Vec<_> = docs.iter().filter_map(|doc| doc.text("title")).collect();
        assert_eq!(titles, vec!["c", "a"]);
        Ok(())
    }

    #[tokio::test]
    async fn delete_reports_missing_documents() -> anyhow::Result<()> {
        let (_temp, _clock, store) = init_store()?;
        let buttons = paths::buttons("u", "p");
        let mut fields = Fields::new();
        fields.insert("label".into(), FieldValue::text("water"));
        let id = store.add_document(&buttons, fields).await?;

        store.delete_document(&buttons.doc(id.clone())).await?;
        assert!(store.query_collection(&buttons, &[], None).await?.is_empty());
        assert_matches!(
            store.delete_document(&buttons.doc(id)).await,
            Err(StoreError::NotFound(_))
        );
        Ok(())
    }
}
