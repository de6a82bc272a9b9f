use indexmap::IndexMap;
use time::OffsetDateTime;

use super::{aggregate, FetchBatch, Period, TimelineFetcher};
use crate::config::SortDirection;
use crate::model::{Profile, ProfileId, TimelineEvent};

/// Identifies one refresh request. Later tickets supersede earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(u64);

#[derive(Debug)]
struct CachedAggregate {
    period: Period,
    version: u64,
    floor: Option<OffsetDateTime>,
    events: Vec<TimelineEvent>,
}

/// The merged timeline as currently displayed: the latest per-profile fetch
/// results, the selected period, and a memo of the last aggregate.
#[derive(Debug, Default)]
pub struct TimelineView {
    period: Period,
    issued: u64,
    per_profile: IndexMap<ProfileId, Vec<TimelineEvent>>,
    failed: Vec<ProfileId>,
    version: u64,
    cache: Option<CachedAggregate>,
}

impl TimelineView {
    pub fn new(period: Period) -> Self {
        Self {
            period,
            ..Self::default()
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn select_period(&mut self, period: Period) {
        if self.period != period {
            tracing::debug!(from = %self.period, to = %period, "timeline period changed");
            self.period = period;
        }
    }

    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.issued += 1;
        RefreshTicket(self.issued)
    }

    /// Installs `batch` if `ticket` is still the newest request. Results of
    /// superseded requests are dropped and `false` is returned.
    pub fn apply(&mut self, ticket: RefreshTicket, batch: FetchBatch) -> bool {
        if ticket.0 != self.issued {
            tracing::debug!(
                ticket = ticket.0,
                latest = self.issued,
                "dropping stale timeline batch"
            );
            return false;
        }
        self.per_profile = batch.events;
        self.failed = batch.failed;
        self.version += 1;
        self.cache = None;
        true
    }

    pub async fn refresh(
        &mut self,
        fetcher: &TimelineFetcher,
        user_id: &str,
        profiles: &[Profile],
        order: SortDirection,
    ) -> bool {
        let ticket = self.begin_refresh();
        let batch = fetcher.fetch_all(user_id, profiles, order).await;
        self.apply(ticket, batch)
    }

    /// Profiles whose events could not be loaded in the last applied refresh.
    pub fn failed_profiles(&self) -> &[ProfileId] {
        &self.failed
    }

    pub fn timeline(&mut self, now: OffsetDateTime) -> &[TimelineEvent] {
        let floor = self.period.floor(now);
        let fresh = matches!(
            &self.cache,
            Some(cached)
                if cached.period == self.period
                    && cached.version == self.version
                    && cached.floor == floor
        );
        if !fresh {
            self.cache = Some(CachedAggregate {
                period: self.period,
                version: self.version,
                floor,
                events: aggregate(&self.per_profile, self.period, now),
            });
        }
        self.cache
            .as_ref()
            .map(|cached| cached.events.as_slice())
            .unwrap_or(&[])
    }
}
