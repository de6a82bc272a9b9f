use crate::error::{CoreError, CoreResult};
use crate::model::Profile;
use crate::store::{paths, Document, FieldValue, Fields, StoreHandle};

mod buttons;
mod contacts;

pub use buttons::ButtonBoard;
pub use contacts::ContactBook;

const NAME_FIELD: &str = "name";

/// The current user's profiles, loaded once and kept in sync with local
/// creates and deletes.
///
/// Name uniqueness is checked against this snapshot only. Another session
/// creating the same name concurrently can still produce a duplicate.
pub struct ProfileRegistry {
    store: StoreHandle,
    user_id: String,
    profiles: Vec<Profile>,
}

impl ProfileRegistry {
    pub async fn load(store: StoreHandle, user_id: impl Into<String>) -> CoreResult<Self> {
        let user_id = user_id.into();
        let profiles = Self::list(&store, &user_id).await?;
        tracing::debug!(user = %user_id, count = profiles.len(), "profiles loaded");
        Ok(Self {
            store,
            user_id,
            profiles,
        })
    }

    pub async fn list(store: &StoreHandle, user_id: &str) -> CoreResult<Vec<Profile>> {
        let docs = store
            .query_collection(&paths::profiles(user_id), &[], None)
            .await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| decode_profile(user_id, doc))
            .collect())
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Looks a profile up by id, then by exact (trimmed) name.
    pub fn find(&self, key: &str) -> Option<&Profile> {
        let key = key.trim();
        self.profiles
            .iter()
            .find(|profile| profile.id == key)
            .or_else(|| self.profiles.iter().find(|profile| profile.name == key))
    }

    pub async fn create(&mut self, name: &str) -> CoreResult<Profile> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(CoreError::validation("profile name cannot be empty"));
        }
        if self.profiles.iter().any(|profile| profile.name == trimmed) {
            return Err(CoreError::DuplicateName(trimmed.to_string()));
        }

        let mut fields = Fields::new();
        fields.insert(NAME_FIELD.into(), FieldValue::text(trimmed));
        let id = self
            .store
            .add_document(&paths::profiles(&self.user_id), fields)
            .await
            .map_err(|err| {
                tracing::warn!(name = trimmed, error = %err, "failed to create profile");
                err
            })?;

        let profile = Profile {
            id,
            owner_id: self.user_id.clone(),
            name: trimmed.to_string(),
        };
        tracing::info!(profile = %profile.name, id = %profile.id, "profile created");
        self.profiles.push(profile.clone());
        Ok(profile)
    }

    /// Removes the profile document. Buttons, contacts and events stored
    /// beneath it are left in place.
    pub async fn delete(&mut self, profile_id: &str) -> CoreResult<()> {
        self.store
            .delete_document(&paths::profile(&self.user_id, profile_id))
            .await
            .map_err(|err| {
                tracing::warn!(profile_id, error = %err, "failed to delete profile");
                err
            })?;
        self.profiles.retain(|profile| profile.id != profile_id);
        tracing::info!(profile_id, "profile deleted");
        Ok(())
    }
}

fn decode_profile(user_id: &str, doc: Document) -> Option<Profile> {
    let Some(name) = doc.text(NAME_FIELD) else {
        tracing::warn!(path = %doc.path, "skipping profile without a name");
        return None;
    };
    Some(Profile {
        id: doc.id().to_string(),
        owner_id: user_id.to_string(),
        name: name.to_string(),
    })
}
