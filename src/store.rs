//! Period-day and cycle-settings operations over the in-memory [`AppData`].

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{
    format_date_key, AppData, CycleSettings, DayDetails, DayEntry, PartnerShare, PeriodDay,
    PeriodDaySet, SettingsError, MAX_CRAMP_INTENSITY,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("period day {0} not found")]
    NotFound(String),
    #[error("cramp intensity must be between 0 and 10, got {0}")]
    CrampIntensity(u8),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// What a toggle did to the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggled {
    Marked,
    Removed,
}

impl AppData {
    /// Own period days, ascending by date.
    pub fn list(&self) -> Vec<&PeriodDay> {
        let mut days: Vec<&PeriodDay> = self.period_days.iter().collect();
        days.sort_by_key(|d| d.date);
        days
    }

    pub fn get(&self, date: NaiveDate) -> Option<&PeriodDay> {
        self.period_days.iter().find(|d| d.date == date)
    }

    pub fn upsert(
        &mut self,
        date: NaiveDate,
        entry: DayEntry,
        now: DateTime<Utc>,
    ) -> Result<&PeriodDay, StoreError> {
        if entry.details.cramp_intensity > MAX_CRAMP_INTENSITY {
            return Err(StoreError::CrampIntensity(entry.details.cramp_intensity));
        }

        let index = match self.period_days.iter().position(|d| d.date == date) {
            Some(index) => {
                self.period_days[index].apply(entry, now);
                index
            }
            None => {
                self.period_days.push(PeriodDay::new(date, entry, now));
                self.period_days.len() - 1
            }
        };
        tracing::info!(date = %date, "period day saved");

        Ok(&self.period_days[index])
    }

    pub fn delete(&mut self, date: NaiveDate) -> Result<PeriodDay, StoreError> {
        let index = self
            .period_days
            .iter()
            .position(|d| d.date == date)
            .ok_or_else(|| StoreError::NotFound(format_date_key(date)))?;
        tracing::info!(date = %date, "period day deleted");
        Ok(self.period_days.remove(index))
    }

    /// Flip the period flag of a day. A period day is removed outright; any
    /// other day becomes a period day, keeping what was logged for it.
    pub fn toggle_period(
        &mut self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Toggled, StoreError> {
        let existing = self.get(date).map(|d| (d.is_period, d.details.clone()));
        match existing {
            Some((true, _)) => {
                self.delete(date)?;
                Ok(Toggled::Removed)
            }
            Some((false, details)) => {
                let entry = DayEntry {
                    is_period: true,
                    details,
                };
                self.upsert(date, entry, now)?;
                Ok(Toggled::Marked)
            }
            None => {
                self.upsert(date, DayEntry::period(), now)?;
                Ok(Toggled::Marked)
            }
        }
    }

    /// Replace the logged details of a day without touching its period flag.
    pub fn update_details(
        &mut self,
        date: NaiveDate,
        details: DayDetails,
        now: DateTime<Utc>,
    ) -> Result<&PeriodDay, StoreError> {
        let is_period = self.get(date).is_some_and(|d| d.is_period);
        self.upsert(date, DayEntry { is_period, details }, now)
    }

    /// Stored settings, or the defaults if none were ever saved.
    pub fn settings(&self) -> CycleSettings {
        self.cycle_settings.unwrap_or_default()
    }

    pub fn update_settings(
        &mut self,
        cycle_length: u32,
        period_length: u32,
    ) -> Result<CycleSettings, StoreError> {
        let settings = CycleSettings::new(cycle_length, period_length)?;
        self.cycle_settings = Some(settings);
        tracing::info!(cycle_length, period_length, "cycle settings updated");
        Ok(settings)
    }

    pub fn period_day_set(&self) -> PeriodDaySet {
        PeriodDaySet::from_period_days(&self.period_days)
    }

    /// Read-only copy of own data for the partner.
    pub fn share(&self, now: DateTime<Utc>) -> PartnerShare {
        PartnerShare {
            period_days: self.list().into_iter().cloned().collect(),
            cycle_settings: self.settings(),
            shared_at: now,
        }
    }

    pub fn import_partner(&mut self, share: PartnerShare) {
        tracing::info!(
            days = share.period_days.len(),
            shared_at = %share.shared_at,
            "partner data imported"
        );
        self.partner = Some(share);
    }

    pub fn partner(&self) -> Option<&PartnerShare> {
        self.partner.as_ref()
    }
}
