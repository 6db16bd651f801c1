use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage and wire format of a calendar day key.
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

pub const DEFAULT_CYCLE_LENGTH: u32 = 28;
pub const DEFAULT_PERIOD_LENGTH: u32 = 5;
pub const CYCLE_LENGTH_RANGE: RangeInclusive<u32> = 20..=45;
pub const PERIOD_LENGTH_RANGE: RangeInclusive<u32> = 1..=10;
pub const MAX_CRAMP_INTENSITY: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("invalid date `{0}`, use YYYY-MM-DD")]
    InvalidDate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("cycle length must be between 20 and 45 days, got {0}")]
    CycleLength(u32),
    #[error("period length must be between 1 and 10 days, got {0}")]
    PeriodLength(u32),
}

/// Parse a `YYYY-MM-DD` key. Shorter forms such as `2024-1-5` are rejected.
pub fn parse_date_key(key: &str) -> Result<NaiveDate, InputError> {
    let bytes = key.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return Err(InputError::InvalidDate(key.to_string()));
    }
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT)
        .map_err(|_| InputError::InvalidDate(key.to_string()))
}

pub fn format_date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

/// Free-form details logged for a day. None of these feed the predictor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayDetails {
    #[serde(default)]
    pub symptoms: BTreeSet<String>,
    #[serde(default)]
    pub cramp_intensity: u8, // 0-10
    #[serde(default)]
    pub mood: BTreeSet<String>,
    #[serde(default)]
    pub activities: BTreeSet<String>,
    #[serde(default)]
    pub sex_activity: BTreeSet<String>,
    #[serde(default)]
    pub notes: String,
}

/// Writable part of a [`PeriodDay`], used as the upsert payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayEntry {
    pub is_period: bool,
    #[serde(flatten)]
    pub details: DayDetails,
}

impl DayEntry {
    pub fn period() -> Self {
        Self {
            is_period: true,
            details: DayDetails::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeriodDay {
    pub id: Uuid,
    pub date: NaiveDate,
    pub is_period: bool,
    #[serde(flatten)]
    pub details: DayDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PeriodDay {
    pub fn new(date: NaiveDate, entry: DayEntry, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            is_period: entry.is_period,
            details: entry.details,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, entry: DayEntry, now: DateTime<Utc>) {
        self.is_period = entry.is_period;
        self.details = entry.details;
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CycleSettings {
    pub cycle_length: u32,
    pub period_length: u32,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            cycle_length: DEFAULT_CYCLE_LENGTH,
            period_length: DEFAULT_PERIOD_LENGTH,
        }
    }
}

impl CycleSettings {
    pub fn new(cycle_length: u32, period_length: u32) -> Result<Self, SettingsError> {
        let settings = Self {
            cycle_length,
            period_length,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !CYCLE_LENGTH_RANGE.contains(&self.cycle_length) {
            return Err(SettingsError::CycleLength(self.cycle_length));
        }
        if !PERIOD_LENGTH_RANGE.contains(&self.period_length) {
            return Err(SettingsError::PeriodLength(self.period_length));
        }
        Ok(())
    }
}

/// Distinct calendar dates marked as period days, iterated in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PeriodDaySet(BTreeSet<NaiveDate>);

impl PeriodDaySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the dates of records with `is_period` set.
    pub fn from_period_days<'a>(days: impl IntoIterator<Item = &'a PeriodDay>) -> Self {
        days.into_iter()
            .filter(|d| d.is_period)
            .map(|d| d.date)
            .collect()
    }

    /// Build from raw date keys, failing on the first malformed one.
    pub fn from_keys<I, S>(keys: I) -> Result<Self, InputError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        keys.into_iter()
            .map(|k| parse_date_key(k.as_ref()))
            .collect()
    }

    pub fn insert(&mut self, date: NaiveDate) -> bool {
        self.0.insert(date)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.0.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<NaiveDate> for PeriodDaySet {
    fn from_iter<T: IntoIterator<Item = NaiveDate>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A run of logged period days, each within the gap tolerance of the previous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: Vec<NaiveDate>,
}

impl Period {
    /// `None` for an empty run. `days` must already be ascending.
    pub fn from_run(days: Vec<NaiveDate>) -> Option<Self> {
        let start = *days.first()?;
        let end = *days.last()?;
        Some(Self { start, end, days })
    }
}

/// Everything derived from one (period days, settings, today) triple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleSnapshot {
    pub has_period_data: bool,
    pub most_recent_period_start: Option<NaiveDate>,
    pub most_recent_period_end: Option<NaiveDate>,
    pub average_cycle_length: Option<u32>,
    pub next_period_date: Option<NaiveDate>,
    pub days_until_next_period: Option<i64>,
    pub current_cycle_day: Option<i64>,
    pub fertile_window_start: Option<NaiveDate>,
    pub fertile_window_end: Option<NaiveDate>,
    pub days_until_ovulation: Option<i64>,
    pub predicted_period_dates: BTreeSet<NaiveDate>,
    pub predicted_fertility_dates: BTreeSet<NaiveDate>,
}

/// Whose data a computation ran on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataOwner {
    Own,
    Partner,
}

impl DataOwner {
    pub fn is_partner(self) -> bool {
        matches!(self, DataOwner::Partner)
    }
}

/// Read-only copy of one user's cycle data, handed to their partner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartnerShare {
    pub period_days: Vec<PeriodDay>,
    #[serde(default)]
    pub cycle_settings: CycleSettings,
    pub shared_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    #[serde(default)]
    pub period_days: Vec<PeriodDay>,
    #[serde(default)]
    pub cycle_settings: Option<CycleSettings>,
    #[serde(default)]
    pub partner: Option<PartnerShare>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(key: &str) -> NaiveDate {
        parse_date_key(key).unwrap()
    }

    #[test]
    fn date_keys_must_be_zero_padded() {
        assert_eq!(
            date("2024-03-01"),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert!(parse_date_key("2024-3-1").is_err());
        assert!(parse_date_key("2024/03/01").is_err());
        assert!(parse_date_key("2024-02-30").is_err());
        assert_eq!(format_date_key(date("2024-03-01")), "2024-03-01");
    }

    #[test]
    fn settings_bounds() {
        assert!(CycleSettings::new(20, 1).is_ok());
        assert!(CycleSettings::new(45, 10).is_ok());
        assert_eq!(
            CycleSettings::new(19, 5),
            Err(SettingsError::CycleLength(19))
        );
        assert_eq!(
            CycleSettings::new(28, 11),
            Err(SettingsError::PeriodLength(11))
        );
        assert_eq!(CycleSettings::default(), CycleSettings::new(28, 5).unwrap());
    }

    #[test]
    fn day_set_keeps_only_period_days() {
        let now = Utc::now();
        let days = vec![
            PeriodDay::new(date("2024-01-02"), DayEntry::period(), now),
            PeriodDay::new(date("2024-01-01"), DayEntry::period(), now),
            PeriodDay::new(date("2024-01-03"), DayEntry::default(), now),
        ];
        let set = PeriodDaySet::from_period_days(&days);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![date("2024-01-01"), date("2024-01-02")]
        );
    }

    #[test]
    fn day_set_rejects_bad_keys() {
        let set = PeriodDaySet::from_keys(["2024-01-01", "2024-01-01", "2024-01-02"]).unwrap();
        assert_eq!(set.len(), 2);

        let err = PeriodDaySet::from_keys(["2024-01-01", "yesterday"]).unwrap_err();
        assert_eq!(err, InputError::InvalidDate("yesterday".into()));
    }

    #[test]
    fn period_day_uses_camel_case_json() {
        let mut entry = DayEntry::period();
        entry.details.sex_activity.insert("protected".into());
        entry.details.cramp_intensity = 4;
        let day = PeriodDay::new(date("2024-01-01"), entry, Utc::now());

        let json = serde_json::to_value(&day).unwrap();
        assert_eq!(json["date"], "2024-01-01");
        assert_eq!(json["isPeriod"], true);
        assert_eq!(json["crampIntensity"], 4);
        assert_eq!(json["sexActivity"][0], "protected");
        assert!(json.get("details").is_none());

        let back: PeriodDay = serde_json::from_value(json).unwrap();
        assert_eq!(back, day);
    }
}
