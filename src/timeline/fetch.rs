use futures::future::join_all;
use indexmap::IndexMap;

use crate::config::SortDirection;
use crate::error::StoreError;
use crate::model::{Profile, ProfileId, TimelineEvent};
use crate::store::{paths, Document, OrderBy, StoreHandle};

pub const TITLE_FIELD: &str = "title";
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Result of one multi-profile refresh. Profiles whose fetch failed are
/// present in `events` with no entries and listed in `failed`.
#[derive(Debug, Clone, Default)]
pub struct FetchBatch {
    pub events: IndexMap<ProfileId, Vec<TimelineEvent>>,
    pub failed: Vec<ProfileId>,
}

impl FetchBatch {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct TimelineFetcher {
    store: StoreHandle,
}

impl TimelineFetcher {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    pub async fn fetch_events(
        &self,
        user_id: &str,
        profile_id: &str,
        order: SortDirection,
    ) -> Result<Vec<TimelineEvent>, StoreError> {
        let collection = paths::timeline(user_id, profile_id);
        let order_by = OrderBy::new(TIMESTAMP_FIELD, order);
        let docs = self
            .store
            .query_collection(&collection, &[], Some(&order_by))
            .await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| decode_event(profile_id, doc))
            .collect())
    }

    /// Fetches every profile's events at once. A failing profile is logged and
    /// contributes nothing; the others are unaffected.
    pub async fn fetch_all(
        &self,
        user_id: &str,
        profiles: &[Profile],
        order: SortDirection,
    ) -> FetchBatch {
        let fetches = profiles.iter().map(|profile| async move {
            let result = self.fetch_events(user_id, &profile.id, order).await;
            (profile, result)
        });

        let mut batch = FetchBatch::default();
        for (profile, result) in join_all(fetches).await {
            let events = match result {
                Ok(events) => events,
                Err(err) => {
                    tracing::warn!(
                        profile = %profile.name,
                        profile_id = %profile.id,
                        error = %err,
                        "timeline fetch failed, showing no events for profile"
                    );
                    batch.failed.push(profile.id.clone());
                    Vec::new()
                }
            };
            batch.events.insert(profile.id.clone(), events);
        }
        tracing::debug!(
            profiles = profiles.len(),
            failed = batch.failed.len(),
            "timeline batch fetched"
        );
        batch
    }
}

fn decode_event(profile_id: &str, doc: Document) -> Option<TimelineEvent> {
    let Some(timestamp) = doc.timestamp(TIMESTAMP_FIELD) else {
        tracing::warn!(path = %doc.path, "skipping timeline entry without a server timestamp");
        return None;
    };
    let title = doc.text(TITLE_FIELD).unwrap_or_default().to_string();
    Some(TimelineEvent {
        id: doc.id().to_string(),
        profile_id: profile_id.to_string(),
        title,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FailingStore, Harness};
    use crate::timeline::{aggregate, Period};
    use std::sync::Arc;
    use time::Duration;

    #[tokio::test]
    async fn events_come_back_in_requested_order() -> anyhow::Result<()> {
        let harness = Harness::new()?;
        let profile = harness.profile("Dad").await?;
        harness.log_event(&profile, "water").await?;
        harness.clock.advance(Duration::minutes(1));
        harness.log_event(&profile, "meal").await?;

        let fetcher = TimelineFetcher::new(harness.store());
        let ascending = fetcher
            .fetch_events(&harness.user, &profile.id, SortDirection::Ascending)
            .await?;
        let descending = fetcher
            .fetch_events(&harness.user, &profile.id, SortDirection::Descending)
            .await?;

        let titles = |events: &[TimelineEvent]| {
            events
                .iter()
                .map(|event| event.title.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(titles(&ascending), vec!["water", "meal"]);
        assert_eq!(titles(&descending), vec!["meal", "water"]);
        assert!(ascending.iter().all(|event| event.profile_id == profile.id));
        Ok(())
    }

    #[tokio::test]
    async fn one_failing_profile_does_not_hide_the_others() -> anyhow::Result<()> {
        let harness = Harness::new()?;
        let a = harness.profile("A").await?;
        let b = harness.profile("B").await?;
        let c = harness.profile("C").await?;
        for profile in [&a, &b, &c] {
            harness.log_event(profile, &format!("{} pressed", profile.name)).await?;
            harness.clock.advance(Duration::seconds(90));
        }

        let store = Arc::new(FailingStore::new(harness.store(), &b.id));
        let fetcher = TimelineFetcher::new(store);
        let profiles = vec![a.clone(), b.clone(), c.clone()];
        let batch = fetcher
            .fetch_all(&harness.user, &profiles, SortDirection::Ascending)
            .await;

        assert!(batch.is_partial());
        assert_eq!(batch.failed, vec![b.id.clone()]);
        assert_eq!(batch.events.len(), 3);
        assert!(batch.events[&b.id].is_empty());

        let merged = aggregate(&batch.events, Period::All, harness.clock_now());
        let titles: Vec<_> = merged.iter().map(|event| event.title.as_str()).collect();
        assert_eq!(titles, vec!["A pressed", "C pressed"]);
        Ok(())
    }

    #[tokio::test]
    async fn entries_without_timestamp_are_skipped() -> anyhow::Result<()> {
        let harness = Harness::new()?;
        let profile = harness.profile("Dad").await?;
        harness.log_event(&profile, "water").await?;
        harness.log_untimed_entry(&profile, "pending").await?;

        let events = TimelineFetcher::new(harness.store())
            .fetch_events(&harness.user, &profile.id, SortDirection::Ascending)
            .await?;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "water");
        Ok(())
    }
}
