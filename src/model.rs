use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub type UserId = String;
pub type ProfileId = String;
pub type ButtonId = String;
pub type ContactId = String;
pub type EventId = String;

const PHONE_DIGITS: usize = 11;
const PHONE_GROUP_BREAKS: [usize; 2] = [3, 7];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub owner_id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageButton {
    pub id: ButtonId,
    pub profile_id: ProfileId,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub id: ContactId,
    pub profile_id: ProfileId,
    pub name: String,
    pub phone: String,
}

/// A logged button press. `timestamp` is always the store-assigned time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: EventId,
    pub profile_id: ProfileId,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Reduces `input` to digits and re-inserts hyphens in the `NNN-NNNN-NNNN`
/// layout as far as the digits reach. Extra digits are dropped.
pub fn normalize_phone(input: &str) -> String {
    let mut out = String::with_capacity(PHONE_DIGITS + PHONE_GROUP_BREAKS.len());
    for (idx, digit) in input
        .chars()
        .filter(|ch| ch.is_ascii_digit())
        .take(PHONE_DIGITS)
        .enumerate()
    {
        if PHONE_GROUP_BREAKS.contains(&idx) {
            out.push('-');
        }
        out.push(digit);
    }
    out
}

pub fn is_complete_phone(normalized: &str) -> bool {
    normalized.chars().filter(|ch| ch.is_ascii_digit()).count() == PHONE_DIGITS
        && normalized.len() == PHONE_DIGITS + PHONE_GROUP_BREAKS.len()
}
