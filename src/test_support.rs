//! Shared fixtures for unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use time::macros::datetime;
use time::OffsetDateTime;

use crate::clock::{Clock, ManualClock};
use crate::config::StorageOptions;
use crate::error::StoreError;
use crate::model::Profile;
use crate::store::{
    self, paths, CollectionPath, DocPath, Document, DocumentStore, FieldValue, Fields, Filter,
    OrderBy, SqliteStore, StoreHandle,
};
use crate::timeline::{TIMESTAMP_FIELD, TITLE_FIELD};

pub const START: OffsetDateTime = datetime!(2024-03-15 12:00 UTC);

pub struct Harness {
    _temp: TempDir,
    pub clock: Arc<ManualClock>,
    pub sqlite: SqliteStore,
    pub user: String,
}

impl Harness {
    pub fn new() -> anyhow::Result<Self> {
        let temp = TempDir::new()?;
        let clock = Arc::new(ManualClock::new(START));
        let mut options = StorageOptions::default();
        options.database_path = temp.path().join("data/careline.db");
        let sqlite = store::init(&options, clock.clone())?;
        Ok(Self {
            _temp: temp,
            clock,
            sqlite,
            user: "family@example.com".to_string(),
        })
    }

    pub fn store(&self) -> StoreHandle {
        Arc::new(self.sqlite.clone())
    }

    pub fn clock_now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Writes a profile document directly, bypassing registry validation.
    pub async fn profile(&self, name: &str) -> anyhow::Result<Profile> {
        let mut fields = Fields::new();
        fields.insert("name".into(), FieldValue::text(name));
        let id = self
            .sqlite
            .add_document(&paths::profiles(&self.user), fields)
            .await?;
        Ok(Profile {
            id,
            owner_id: self.user.clone(),
            name: name.to_string(),
        })
    }

    pub async fn log_event(&self, profile: &Profile, title: &str) -> anyhow::Result<String> {
        let mut fields = Fields::new();
        fields.insert(TITLE_FIELD.into(), FieldValue::text(title));
        fields.insert(TIMESTAMP_FIELD.into(), FieldValue::ServerTimestamp);
        let id = self
            .sqlite
            .add_document(&paths::timeline(&self.user, &profile.id), fields)
            .await?;
        Ok(id)
    }

    pub async fn log_untimed_entry(&self, profile: &Profile, title: &str) -> anyhow::Result<()> {
        let mut fields = Fields::new();
        fields.insert(TITLE_FIELD.into(), FieldValue::text(title));
        self.sqlite
            .add_document(&paths::timeline(&self.user, &profile.id), fields)
            .await?;
        Ok(())
    }
}

/// Delegates to `inner` but fails every call touching `poisoned` in its path.
pub struct FailingStore {
    inner: StoreHandle,
    poisoned: String,
}

impl FailingStore {
    pub fn new(inner: StoreHandle, poisoned: &str) -> Self {
        Self {
            inner,
            poisoned: format!("/{poisoned}"),
        }
    }

    fn check(&self, path: &str) -> Result<(), StoreError> {
        if path.contains(&self.poisoned) {
            return Err(StoreError::Unavailable(format!("injected failure for {path}")));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn add_document(
        &self,
        collection: &CollectionPath,
        fields: Fields,
    ) -> Result<String, StoreError> {
        self.check(&collection.to_string())?;
        self.inner.add_document(collection, fields).await
    }

    async fn query_collection(
        &self,
        collection: &CollectionPath,
        filters: &[Filter],
        order_by: Option<&OrderBy>,
    ) -> Result<Vec<Document>, StoreError> {
        self.check(&collection.to_string())?;
        self.inner
            .query_collection(collection, filters, order_by)
            .await
    }

    async fn delete_document(&self, path: &DocPath) -> Result<(), StoreError> {
        self.check(&path.to_string())?;
        self.inner.delete_document(path).await
    }
}
