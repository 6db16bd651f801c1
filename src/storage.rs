use std::fs;
use std::path::{Path, PathBuf};

use crate::crypto::{self, KdfCost};
use crate::models::AppData;

const VAULT_FILE: &str = "calple.vault";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Passphrase-sealed [`AppData`] file inside a data directory.
#[derive(Debug, Clone)]
pub struct Vault {
    path: PathBuf,
    cost: KdfCost,
}

impl Vault {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(VAULT_FILE),
            cost: KdfCost::default(),
        }
    }

    pub fn with_cost(mut self, cost: KdfCost) -> Self {
        self.cost = cost;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save(&self, passphrase: &str, data: &AppData) -> Result<(), StorageError> {
        let json = serde_json::to_vec(data)?;
        let sealed = crypto::seal(passphrase, &json, self.cost)?;
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, sealed)?;
        tracing::debug!(path = %self.path.display(), days = data.period_days.len(), "vault saved");
        Ok(())
    }

    pub fn load(&self, passphrase: &str) -> Result<AppData, StorageError> {
        let sealed = fs::read(&self.path)?;
        let json = crypto::open(passphrase, &sealed)?;
        let data: AppData = serde_json::from_slice(&json)?;
        tracing::debug!(path = %self.path.display(), days = data.period_days.len(), "vault loaded");
        Ok(data)
    }

    /// Delete the vault file, if there is one.
    pub fn wipe(&self) -> Result<(), StorageError> {
        if self.exists() {
            fs::remove_file(&self.path)?;
            tracing::info!(path = %self.path.display(), "vault wiped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{parse_date_key, DayEntry};
    use chrono::Utc;

    fn vault(dir: &Path) -> Vault {
        Vault::in_dir(dir.join("nested")).with_cost(KdfCost::insecure_minimum())
    }

    #[test]
    fn save_creates_directory_and_loads_back() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = vault(tmp.path());
        assert!(!vault.exists());

        let mut data = AppData::default();
        data.upsert(
            parse_date_key("2024-01-01").unwrap(),
            DayEntry::period(),
            Utc::now(),
        )
        .unwrap();
        data.update_settings(30, 4).unwrap();

        vault.save("pass", &data).unwrap();
        assert!(vault.exists());
        assert_eq!(vault.load("pass").unwrap(), data);
    }

    #[test]
    fn load_with_wrong_passphrase_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = vault(tmp.path());
        vault.save("right", &AppData::default()).unwrap();

        assert!(matches!(
            vault.load("wrong"),
            Err(StorageError::Crypto(crypto::CryptoError::Decryption))
        ));
    }

    #[test]
    fn wipe_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = vault(tmp.path());
        vault.save("pass", &AppData::default()).unwrap();

        vault.wipe().unwrap();
        assert!(!vault.exists());
        vault.wipe().unwrap();
    }
}
