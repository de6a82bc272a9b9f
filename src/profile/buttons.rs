use crate::error::{CoreError, CoreResult};
use crate::model::{MessageButton, Profile};
use crate::store::{paths, CollectionPath, Document, FieldValue, Fields, Filter, StoreHandle};

const LABEL_FIELD: &str = "label";

/// Quick-action buttons of one profile.
pub struct ButtonBoard {
    store: StoreHandle,
    profile_id: String,
    collection: CollectionPath,
}

impl ButtonBoard {
    pub fn new(store: StoreHandle, user_id: &str, profile: &Profile) -> Self {
        Self {
            store,
            profile_id: profile.id.clone(),
            collection: paths::buttons(user_id, &profile.id),
        }
    }

    pub async fn list(&self) -> CoreResult<Vec<MessageButton>> {
        let docs = self.store.query_collection(&self.collection, &[], None).await?;
        Ok(self.decode_all(docs))
    }

    /// Finds a button by id, falling back to the first one with that label.
    pub async fn find(&self, key: &str) -> CoreResult<Option<MessageButton>> {
        let key = key.trim();
        let buttons = self.list().await?;
        let by_id = buttons.iter().position(|button| button.id == key);
        let index = by_id.or_else(|| buttons.iter().position(|button| button.label == key));
        Ok(index.map(|idx| buttons[idx].clone()))
    }

    pub async fn add(&self, label: &str) -> CoreResult<MessageButton> {
        let label = label.trim();
        if label.is_empty() {
            return Err(CoreError::validation("button label cannot be empty"));
        }
        let mut fields = Fields::new();
        fields.insert(LABEL_FIELD.into(), FieldValue::text(label));
        let id = self
            .store
            .add_document(&self.collection, fields)
            .await
            .map_err(|err| {
                tracing::warn!(label, error = %err, "failed to add button");
                err
            })?;
        tracing::info!(label, %id, "button added");
        Ok(MessageButton {
            id,
            profile_id: self.profile_id.clone(),
            label: label.to_string(),
        })
    }

    pub async fn delete(&self, button_id: &str) -> CoreResult<()> {
        self.store
            .delete_document(&self.collection.doc(button_id))
            .await
            .map_err(|err| {
                tracing::warn!(button_id, error = %err, "failed to delete button");
                err
            })?;
        tracing::info!(button_id, "button deleted");
        Ok(())
    }

    /// Deletes every button carrying exactly `label` and returns how many
    /// went away.
    pub async fn delete_all_with_label(&self, label: &str) -> CoreResult<usize> {
        let label = label.trim();
        let filter = Filter::eq(LABEL_FIELD, FieldValue::text(label));
        let matching = self
            .store
            .query_collection(&self.collection, &[filter], None)
            .await?;
        let mut removed = 0;
        for doc in &matching {
            self.store.delete_document(&doc.path).await?;
            removed += 1;
        }
        tracing::info!(label, removed, "buttons deleted by label");
        Ok(removed)
    }

    fn decode_all(&self, docs: Vec<Document>) -> Vec<MessageButton> {
        docs.into_iter()
            .filter_map(|doc| {
                let Some(label) = doc.text(LABEL_FIELD) else {
                    tracing::warn!(path = %doc.path, "skipping button without a label");
                    return None;
                };
                Some(MessageButton {
                    id: doc.id().to_string(),
                    profile_id: self.profile_id.clone(),
                    label: label.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Harness;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn delete_by_id_leaves_same_label_siblings() -> anyhow::Result<()> {
        let harness = Harness::new()?;
        let dad = harness.profile("Dad").await?;
        let board = ButtonBoard::new(harness.store(), &harness.user, &dad);

        let first = board.add("water").await?;
        let second = board.add(" water ").await?;
        board.add("meal").await?;
        assert_eq!(second.label, "water");

        board.delete(&first.id).await?;
        let left: Vec<_> = board.list().await?.into_iter().map(|b| b.id).collect();
        assert_eq!(left.len(), 2);
        assert!(left.contains(&second.id));
        assert!(!left.contains(&first.id));
        Ok(())
    }

    #[tokio::test]
    async fn label_bulk_delete_is_explicit() -> anyhow::Result<()> {
        let harness = Harness::new()?;
        let dad = harness.profile("Dad").await?;
        let board = ButtonBoard::new(harness.store(), &harness.user, &dad);
        board.add("water").await?;
        board.add("water").await?;
        board.add("meal").await?;

        assert_eq!(board.delete_all_with_label("water").await?, 2);
        let labels: Vec<_> = board.list().await?.into_iter().map(|b| b.label).collect();
        assert_eq!(labels, vec!["meal"]);
        assert_eq!(board.delete_all_with_label("water").await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn find_prefers_id_then_label() -> anyhow::Result<()> {
        let harness = Harness::new()?;
        let dad = harness.profile("Dad").await?;
        let board = ButtonBoard::new(harness.store(), &harness.user, &dad);
        let water = board.add("water").await?;

        assert_eq!(board.find(&water.id).await?, Some(water.clone()));
        assert_eq!(board.find("water").await?, Some(water));
        assert_eq!(board.find("juice").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn boards_are_scoped_to_their_profile() -> anyhow::Result<()> {
        let harness = Harness::new()?;
        let dad = harness.profile("Dad").await?;
        let mom = harness.profile("Mom").await?;
        ButtonBoard::new(harness.store(), &harness.user, &dad)
            .add("water")
            .await?;

        let moms = ButtonBoard::new(harness.store(), &harness.user, &mom);
        assert!(moms.list().await?.is_empty());
        assert_matches!(moms.add("").await, Err(CoreError::Validation(_)));
        Ok(())
    }
}
