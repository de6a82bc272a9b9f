use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use time::{Date, Duration, Month, OffsetDateTime};

use crate::model::{ProfileId, TimelineEvent};

mod fetch;
mod format;
mod view;

pub use fetch::{FetchBatch, TimelineFetcher, TIMESTAMP_FIELD, TITLE_FIELD};
pub use format::TimestampFormatter;
pub use view::{RefreshTicket, TimelineView};

/// Time window the merged timeline is narrowed to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Period {
    All,
    Day,
    Week,
    Month,
}

impl Default for Period {
    fn default() -> Self {
        Period::All
    }
}

impl Period {
    /// Earliest timestamp still inside the window ending at `now`. `None`
    /// means the window is unbounded.
    pub fn floor(self, now: OffsetDateTime) -> Option<OffsetDateTime> {
        match self {
            Period::All => None,
            Period::Day => Some(now - Duration::hours(24)),
            Period::Week => Some(now - Duration::hours(7 * 24)),
            Period::Month => one_month_before(now),
        }
    }
}

/// Same wall time and day-of-month one calendar month earlier, clamped to the
/// last day of the shorter month. The calendar is the one of `now`'s offset.
fn one_month_before(now: OffsetDateTime) -> Option<OffsetDateTime> {
    let date = now.date();
    let (year, month) = match date.month() {
        Month::January => (date.year() - 1, Month::December),
        other => (date.year(), other.previous()),
    };
    let day = date.day().min(month.length(year));
    Date::from_calendar_date(year, month, day)
        .ok()
        .map(|target| now.replace_date(target))
}

/// Merges every profile's events, keeps those inside `period` as seen from
/// `now`, and orders them oldest first. Equal timestamps keep input order.
pub fn aggregate(
    per_profile: &IndexMap<ProfileId, Vec<TimelineEvent>>,
    period: Period,
    now: OffsetDateTime,
) -> Vec<TimelineEvent> {
    let floor = period.floor(now);
    let mut merged: Vec<TimelineEvent> = per_profile
        .values()
        .flatten()
        .filter(|event| floor.map_or(true, |bound| event.timestamp >= bound))
        .cloned()
        .collect();
    merged.sort_by_key(|event| event.timestamp);
    merged
}
