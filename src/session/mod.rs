use time::Duration;

use crate::clock::SharedClock;
use crate::config::{AppConfig, Locale, SortDirection};
use crate::error::{CoreError, CoreResult};
use crate::model::{EventId, MessageButton, Profile, ProfileId};
use crate::store::{paths, FieldValue, Fields, OrderBy, StoreHandle};
use crate::timeline::{TIMESTAMP_FIELD, TITLE_FIELD};

mod cooldown;

pub use cooldown::{CooldownDecision, CooldownGate, DEFAULT_WINDOW};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PressOutcome {
    Logged { event_id: EventId, title: String },
    CoolingDown { seconds_remaining: u64, notice: String },
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub cooldown_window: Duration,
    pub locale: Locale,
}

impl SessionOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cooldown_window: config.cooldown.window(),
            locale: config.locale,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            cooldown_window: DEFAULT_WINDOW,
            locale: Locale::En,
        }
    }
}

/// Controller for one open profile. Lives as long as the profile view does
/// and owns the cooldown gate, keyed by profile id, so every press made while
/// the profile is open shares one timer.
pub struct ProfileSession {
    user_id: String,
    profile: Profile,
    store: StoreHandle,
    clock: SharedClock,
    locale: Locale,
    gate: CooldownGate<ProfileId>,
}

impl ProfileSession {
    pub fn open(
        user_id: impl Into<String>,
        profile: Profile,
        store: StoreHandle,
        clock: SharedClock,
        options: SessionOptions,
    ) -> Self {
        tracing::debug!(profile = %profile.name, "profile session opened");
        Self {
            user_id: user_id.into(),
            profile,
            store,
            clock,
            locale: options.locale,
            gate: CooldownGate::new(options.cooldown_window),
        }
    }

    /// Opens a session whose gate starts from the newest event already logged
    /// for the profile, so reopening a profile never clears its cooldown.
    pub async fn resume(
        user_id: impl Into<String>,
        profile: Profile,
        store: StoreHandle,
        clock: SharedClock,
        options: SessionOptions,
    ) -> CoreResult<Self> {
        let mut session = Self::open(user_id, profile, store, clock, options);
        let collection = paths::timeline(&session.user_id, &session.profile.id);
        let newest_first = OrderBy::new(TIMESTAMP_FIELD, SortDirection::Descending);
        let newest = session
            .store
            .query_collection(&collection, &[], Some(&newest_first))
            .await?
            .into_iter()
            .find_map(|doc| doc.timestamp(TIMESTAMP_FIELD));
        if let Some(at) = newest {
            tracing::debug!(profile = %session.profile.name, last_press = %at, "cooldown restored");
            session.gate.record(session.profile.id.clone(), at);
        }
        Ok(session)
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn gate(&self) -> &CooldownGate<ProfileId> {
        &self.gate
    }

    pub async fn press(&mut self, button: &MessageButton) -> CoreResult<PressOutcome> {
        if button.profile_id != self.profile.id {
            return Err(CoreError::validation(format!(
                "button '{}' does not belong to profile '{}'",
                button.label, self.profile.name
            )));
        }
        self.log_press(&button.label).await
    }

    /// Logs a press titled `title`. The cooldown is only consumed once the
    /// store has accepted the event, so a failed write can be retried at once.
    pub async fn log_press(&mut self, title: &str) -> CoreResult<PressOutcome> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CoreError::validation("event title cannot be empty"));
        }

        let now = self.clock.now();
        if let CooldownDecision::Rejected { seconds_remaining } =
            self.gate.check(&self.profile.id, now)
        {
            tracing::info!(
                profile = %self.profile.name,
                seconds_remaining,
                "press rejected by cooldown"
            );
            return Ok(PressOutcome::CoolingDown {
                seconds_remaining,
                notice: self.locale.cooldown_notice(seconds_remaining),
            });
        }

        let mut fields = Fields::new();
        fields.insert(TITLE_FIELD.into(), FieldValue::text(title));
        fields.insert(TIMESTAMP_FIELD.into(), FieldValue::ServerTimestamp);
        let collection = paths::timeline(&self.user_id, &self.profile.id);
        let event_id = match self.store.add_document(&collection, fields).await {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(
                    profile = %self.profile.name,
                    error = %err,
                    "failed to log press"
                );
                return Err(err.into());
            }
        };

        self.gate.record(self.profile.id.clone(), now);
        tracing::info!(profile = %self.profile.name, %title, %event_id, "press logged");
        Ok(PressOutcome::Logged {
            event_id,
            title: title.to_string(),
        })
    }
}
