use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use super::Period;
use crate::config::{AppConfig, Locale};

/// Renders timeline timestamps. Under [`Period::Day`] only the time of day is
/// shown; every other period prefixes the calendar date.
#[derive(Debug, Clone, Copy)]
pub struct TimestampFormatter {
    locale: Locale,
    offset: UtcOffset,
}

impl TimestampFormatter {
    pub fn new(locale: Locale, offset: UtcOffset) -> Self {
        Self { locale, offset }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.locale, config.utc_offset())
    }

    pub fn format(&self, timestamp: OffsetDateTime, period: Period) -> String {
        let local = timestamp.to_offset(self.offset);
        let clock = self.time_of_day(local);
        match period {
            Period::Day => clock,
            Period::All | Period::Week | Period::Month => {
                format!("{} {clock}", self.locale.date_label(local.date()))
            }
        }
    }

    fn time_of_day(&self, local: OffsetDateTime) -> String {
        let clock = local
            .format(&format_description!("[hour repr:12 padding:none]:[minute]"))
            .unwrap_or_else(|_| local.time().to_string());
        format!("{} {clock}", self.locale.meridiem(local.hour()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    #[test]
    fn day_period_shows_time_only() {
        let formatter = TimestampFormatter::new(Locale::En, UtcOffset::UTC);
        let at = datetime!(2024-03-15 15:05:00 UTC);
        insta::assert_snapshot!(formatter.format(at, Period::Day), @"PM 3:05");
        insta::assert_snapshot!(formatter.format(at, Period::Week), @"2024-03-15 PM 3:05");
    }

    #[test]
    fn korean_locale_uses_native_markers() {
        let formatter = TimestampFormatter::new(Locale::Ko, UtcOffset::UTC);
        let at = datetime!(2024-03-15 15:05:00 UTC);
        assert_eq!(formatter.format(at, Period::Day), "오후 3:05");
        assert_eq!(formatter.format(at, Period::Month), "2024. 3. 15. 오후 3:05");
    }

    #[test]
    fn midnight_and_noon_render_as_twelve() {
        let formatter = TimestampFormatter::new(Locale::En, UtcOffset::UTC);
        assert_eq!(
            formatter.format(datetime!(2024-03-15 00:07 UTC), Period::Day),
            "AM 12:07"
        );
        assert_eq!(
            formatter.format(datetime!(2024-03-15 12:00 UTC), Period::Day),
            "PM 12:00"
        );
    }

    #[test]
    fn minutes_keep_leading_zero_and_hours_do_not() {
        let formatter = TimestampFormatter::new(Locale::En, UtcOffset::UTC);
        insta::assert_snapshot!(
            formatter.format(datetime!(2024-01-02 09:04 UTC), Period::Month),
            @"2024-01-02 AM 9:04"
        );
        insta::assert_snapshot!(
            formatter.format(datetime!(2024-01-02 23:59 UTC), Period::Day),
            @"PM 11:59"
        );
    }

    #[test]
    fn configured_offset_shifts_the_calendar_day() {
        let formatter = TimestampFormatter::new(Locale::Ko, offset!(+9));
        let at = datetime!(2024-03-15 16:30 UTC);
        assert_eq!(formatter.format(at, Period::All), "2024. 3. 16. 오전 1:30");
    }
}
