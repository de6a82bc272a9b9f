use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::Date;

/// Language used for rendered timestamps and user-facing notices.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Locale {
    En,
    Ko,
}

impl Default for Locale {
    fn default() -> Self {
        Locale::En
    }
}

impl Locale {
    /// AM/PM marker for a 24-hour `hour`.
    pub fn meridiem(self, hour: u8) -> &'static str {
        let afternoon = hour >= 12;
        match (self, afternoon) {
            (Locale::En, false) => "AM",
            (Locale::En, true) => "PM",
            (Locale::Ko, false) => "오전",
            (Locale::Ko, true) => "오후",
        }
    }

    pub fn date_label(self, date: Date) -> String {
        let formatted = match self {
            Locale::En => date.format(&format_description!("[year]-[month]-[day]")),
            Locale::Ko => date.format(&format_description!(
                "[year]. [month padding:none]. [day padding:none]."
            )),
        };
        formatted.unwrap_or_else(|_| date.to_string())
    }

    pub fn cooldown_notice(self, seconds_remaining: u64) -> String {
        match self {
            Locale::En => format!(
                "Buttons cannot be pressed repeatedly within a minute; try again in {seconds_remaining}s."
            ),
            Locale::Ko => format!(
                "1분 이내에 연속해서 버튼을 클릭할 수 없습니다. {seconds_remaining}초 후에 다시 시도하세요."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn meridiem_switches_at_noon() {
        assert_eq!(Locale::En.meridiem(0), "AM");
        assert_eq!(Locale::En.meridiem(11), "AM");
        assert_eq!(Locale::En.meridiem(12), "PM");
        assert_eq!(Locale::Ko.meridiem(15), "오후");
        assert_eq!(Locale::Ko.meridiem(9), "오전");
    }

    #[test]
    fn date_labels_follow_locale() {
        let day = date!(2024 - 03 - 05);
        assert_eq!(Locale::En.date_label(day), "2024-03-05");
        assert_eq!(Locale::Ko.date_label(day), "2024. 3. 5.");
    }
}
