use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use zeroize::Zeroize;

use crate::clock::Clock;
use crate::crypto::CryptoError;
use crate::insights::CycleReport;
use crate::models::{
    format_date_key, parse_date_key, AppData, CycleSettings, CycleSnapshot, DataOwner, DayDetails,
    DayEntry, InputError, PartnerShare, PeriodDay, PeriodDaySet,
};
use crate::prediction;
use crate::storage::{StorageError, Vault};
use crate::store::{StoreError, Toggled};

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("tracker is locked")]
    Locked,
    #[error("already set up, vault exists at {0}")]
    AlreadySetUp(String),
    #[error("not set up yet, no vault found")]
    NotSetUp,
    #[error("no partner data has been imported")]
    NoPartner,
    #[error("internal state lock poisoned")]
    Poisoned,
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Period days, settings and today's log for one owner.
struct CycleInputs<'a> {
    days: PeriodDaySet,
    settings: CycleSettings,
    today_log: Option<&'a DayDetails>,
}

/// Holds the decrypted data and passphrase while unlocked, and persists every
/// change back to the vault.
pub struct Tracker {
    vault: Vault,
    clock: Box<dyn Clock>,
    passphrase: Mutex<Option<String>>,
    data: Mutex<Option<AppData>>,
}

impl Tracker {
    pub fn new(vault: Vault, clock: impl Clock + 'static) -> Self {
        Self {
            vault,
            clock: Box::new(clock),
            passphrase: Mutex::new(None),
            data: Mutex::new(None),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn is_setup(&self) -> bool {
        self.vault.exists()
    }

    /// Create an empty vault and leave the tracker unlocked.
    pub fn setup(&self, passphrase: &str) -> Result<(), TrackerError> {
        if self.vault.exists() {
            return Err(TrackerError::AlreadySetUp(
                self.vault.path().display().to_string(),
            ));
        }
        let data = AppData::default();
        self.vault.save(passphrase, &data)?;
        self.install(passphrase, data)?;
        tracing::info!(path = %self.vault.path().display(), "vault created");
        Ok(())
    }

    /// Returns `false` when the passphrase does not open the vault.
    pub fn unlock(&self, passphrase: &str) -> Result<bool, TrackerError> {
        if !self.vault.exists() {
            return Err(TrackerError::NotSetUp);
        }
        match self.vault.load(passphrase) {
            Ok(data) => {
                self.install(passphrase, data)?;
                Ok(true)
            }
            Err(StorageError::Crypto(CryptoError::Decryption)) => {
                tracing::warn!("unlock rejected");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Zeroize the passphrase and drop the data from memory.
    pub fn lock(&self) {
        if let Ok(mut pass) = self.passphrase.lock() {
            if let Some(ref mut p) = *pass {
                p.zeroize();
            }
            *pass = None;
        }
        if let Ok(mut data) = self.data.lock() {
            *data = None;
        }
    }

    pub fn list_days(&self) -> Result<Vec<PeriodDay>, TrackerError> {
        self.read(|data| Ok(data.list().into_iter().cloned().collect()))
    }

    pub fn get_day(&self, date: &str) -> Result<Option<PeriodDay>, TrackerError> {
        let date = parse_date_key(date)?;
        self.read(|data| Ok(data.get(date).cloned()))
    }

    pub fn log_day(&self, date: &str, entry: DayEntry) -> Result<PeriodDay, TrackerError> {
        let date = parse_date_key(date)?;
        self.write(|data, now| Ok(data.upsert(date, entry, now)?.clone()))
    }

    pub fn update_details(
        &self,
        date: &str,
        details: DayDetails,
    ) -> Result<PeriodDay, TrackerError> {
        let date = parse_date_key(date)?;
        self.write(|data, now| Ok(data.update_details(date, details, now)?.clone()))
    }

    pub fn toggle_period_day(&self, date: &str) -> Result<Toggled, TrackerError> {
        let date = parse_date_key(date)?;
        self.write(|data, now| Ok(data.toggle_period(date, now)?))
    }

    pub fn remove_day(&self, date: &str) -> Result<PeriodDay, TrackerError> {
        let date = parse_date_key(date)?;
        self.write(|data, _| Ok(data.delete(date)?))
    }

    pub fn settings(&self) -> Result<CycleSettings, TrackerError> {
        self.read(|data| Ok(data.settings()))
    }

    pub fn update_settings(
        &self,
        cycle_length: u32,
        period_length: u32,
    ) -> Result<CycleSettings, TrackerError> {
        self.write(|data, _| Ok(data.update_settings(cycle_length, period_length)?))
    }

    pub fn snapshot(&self, owner: DataOwner) -> Result<CycleSnapshot, TrackerError> {
        let today = self.today();
        self.read(|data| {
            let inputs = cycle_inputs(data, owner, today)?;
            Ok(prediction::compute_snapshot(
                &inputs.days,
                &inputs.settings,
                today,
            ))
        })
    }

    pub fn report(&self, owner: DataOwner) -> Result<CycleReport, TrackerError> {
        let today = self.today();
        self.read(|data| {
            let inputs = cycle_inputs(data, owner, today)?;
            tracing::debug!(?owner, days = inputs.days.len(), %today, "computing cycle report");
            Ok(CycleReport::build(
                owner,
                &inputs.days,
                &inputs.settings,
                inputs.today_log,
                today,
            ))
        })
    }

    /// Own data, packaged for the partner to import.
    pub fn share(&self) -> Result<PartnerShare, TrackerError> {
        self.read(|data| Ok(data.share(Utc::now())))
    }

    pub fn import_partner(&self, json: &str) -> Result<(), TrackerError> {
        let share: PartnerShare = serde_json::from_str(json)?;
        for day in &share.period_days {
            parse_date_key(&format_date_key(day.date))?;
        }
        share
            .cycle_settings
            .validate()
            .map_err(StoreError::from)?;
        self.write(|data, _| {
            data.import_partner(share);
            Ok(())
        })
    }

    pub fn export_data(&self) -> Result<String, TrackerError> {
        self.read(|data| Ok(serde_json::to_string_pretty(data)?))
    }

    pub fn wipe_all_data(&self) -> Result<(), TrackerError> {
        self.lock();
        Ok(self.vault.wipe()?)
    }

    fn install(&self, passphrase: &str, data: AppData) -> Result<(), TrackerError> {
        *lock(&self.passphrase)? = Some(passphrase.to_string());
        *lock(&self.data)? = Some(data);
        Ok(())
    }

    fn read<T>(
        &self,
        f: impl FnOnce(&AppData) -> Result<T, TrackerError>,
    ) -> Result<T, TrackerError> {
        let data = lock(&self.data)?;
        f(data.as_ref().ok_or(TrackerError::Locked)?)
    }

    /// Apply `f` to a copy of the data and persist it. The in-memory data is
    /// replaced only once the vault is saved.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut AppData, DateTime<Utc>) -> Result<T, TrackerError>,
    ) -> Result<T, TrackerError> {
        let pass = lock(&self.passphrase)?;
        let mut data = lock(&self.data)?;
        let (Some(p), Some(current)) = (pass.as_ref(), data.as_ref()) else {
            return Err(TrackerError::Locked);
        };

        let mut next = current.clone();
        let out = f(&mut next, Utc::now())?;
        self.vault.save(p, &next)?;
        *data = Some(next);
        Ok(out)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, TrackerError> {
    mutex.lock().map_err(|_| TrackerError::Poisoned)
}

fn cycle_inputs(
    data: &AppData,
    owner: DataOwner,
    today: NaiveDate,
) -> Result<CycleInputs<'_>, TrackerError> {
    let (days, settings) = match owner {
        DataOwner::Own => (data.period_days.as_slice(), data.settings()),
        DataOwner::Partner => {
            let share = data.partner().ok_or(TrackerError::NoPartner)?;
            (share.period_days.as_slice(), share.cycle_settings)
        }
    };
    Ok(CycleInputs {
        days: PeriodDaySet::from_period_days(days),
        settings,
        today_log: days.iter().find(|d| d.date == today).map(|d| &d.details),
    })
}
