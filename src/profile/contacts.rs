use crate::error::{CoreError, CoreResult};
use crate::model::{is_complete_phone, normalize_phone, EmergencyContact, Profile};
use crate::store::{paths, CollectionPath, FieldValue, Fields, StoreHandle};

const NAME_FIELD: &str = "name";
const PHONE_FIELD: &str = "phone";

/// Emergency contacts of one profile.
pub struct ContactBook {
    store: StoreHandle,
    profile_id: String,
    collection: CollectionPath,
}

impl ContactBook {
    pub fn new(store: StoreHandle, user_id: &str, profile: &Profile) -> Self {
        Self {
            store,
            profile_id: profile.id.clone(),
            collection: paths::contacts(user_id, &profile.id),
        }
    }

    pub async fn list(&self) -> CoreResult<Vec<EmergencyContact>> {
        let docs = self
            .store
            .query_collection(&self.collection, &[], None)
            .await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| {
                let (Some(name), Some(phone)) = (doc.text(NAME_FIELD), doc.text(PHONE_FIELD))
                else {
                    tracing::warn!(path = %doc.path, "skipping incomplete contact");
                    return None;
                };
                Some(EmergencyContact {
                    id: doc.id().to_string(),
                    profile_id: self.profile_id.clone(),
                    name: name.to_string(),
                    phone: phone.to_string(),
                })
            })
            .collect())
    }

    pub async fn add(&self, name: &str, phone: &str) -> CoreResult<EmergencyContact> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("contact name cannot be empty"));
        }
        let phone = normalize_phone(phone);
        if !is_complete_phone(&phone) {
            return Err(CoreError::validation(format!(
                "phone number '{phone}' must have the form NNN-NNNN-NNNN"
            )));
        }

        let mut fields = Fields::new();
        fields.insert(NAME_FIELD.into(), FieldValue::text(name));
        fields.insert(PHONE_FIELD.into(), FieldValue::text(phone.clone()));
        let id = self
            .store
            .add_document(&self.collection, fields)
            .await
            .map_err(|err| {
                tracing::warn!(name, error = %err, "failed to add contact");
                err
            })?;
        tracing::info!(name, %id, "contact added");
        Ok(EmergencyContact {
            id,
            profile_id: self.profile_id.clone(),
            name: name.to_string(),
            phone,
        })
    }

    pub async fn delete(&self, contact_id: &str) -> CoreResult<()> {
        self.store
            .delete_document(&self.collection.doc(contact_id))
            .await
            .map_err(|err| {
                tracing::warn!(contact_id, error = %err, "failed to delete contact");
                err
            })?;
        tracing::info!(contact_id, "contact deleted");
        Ok(())
    }
}
