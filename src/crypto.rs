use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use zeroize::Zeroizing;

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const COST_LEN: usize = 12;
const HEADER_LEN: usize = COST_LEN + SALT_LEN + NONCE_LEN;
/// Prefixed to the plaintext; finding it after decryption proves the passphrase.
const MAGIC: &[u8] = b"CALPLE_V1";

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("key derivation failed")]
    KeyDerivation,
    #[error("encryption failed")]
    Encryption,
    #[error("wrong passphrase or corrupted vault")]
    Decryption,
    #[error("vault is truncated or not a calple vault")]
    InvalidFormat,
}

/// Argon2id cost parameters. Written into every sealed blob, so a vault
/// always opens with the cost it was sealed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfCost {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 1,
        }
    }
}

impl KdfCost {
    /// Smallest cost Argon2 accepts. Only for tests.
    pub const fn insecure_minimum() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn to_bytes(self) -> [u8; COST_LEN] {
        let mut out = [0u8; COST_LEN];
        out[..4].copy_from_slice(&self.memory_kib.to_le_bytes());
        out[4..8].copy_from_slice(&self.iterations.to_le_bytes());
        out[8..].copy_from_slice(&self.parallelism.to_le_bytes());
        out
    }

    /// Header costs are untrusted: no field may exceed [`KdfCost::default`].
    fn is_within_ceiling(self) -> bool {
        let max = Self::default();
        self.memory_kib <= max.memory_kib
            && self.iterations <= max.iterations
            && self.parallelism <= max.parallelism
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let word = |i: usize| -> Result<u32, CryptoError> {
            bytes
                .get(i * 4..i * 4 + 4)
                .and_then(|b| b.try_into().ok())
                .map(u32::from_le_bytes)
                .ok_or(CryptoError::InvalidFormat)
        };
        let cost = Self {
            memory_kib: word(0)?,
            iterations: word(1)?,
            parallelism: word(2)?,
        };
        if !cost.is_within_ceiling() {
            return Err(CryptoError::InvalidFormat);
        }
        Ok(cost)
    }

    fn derive_key(
        self,
        passphrase: &str,
        salt: &[u8],
    ) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|_| CryptoError::KeyDerivation)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, &mut key[..])
            .map_err(|_| CryptoError::KeyDerivation)?;
        Ok(key)
    }
}

/// Encrypt `plaintext` under `passphrase`.
///
/// Layout: cost (12) || salt (32) || nonce (12) || ciphertext
pub fn seal(passphrase: &str, plaintext: &[u8], cost: KdfCost) -> Result<Vec<u8>, CryptoError> {
    if !cost.is_within_ceiling() {
        return Err(CryptoError::KeyDerivation);
    }
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    let mut rng = rand::thread_rng();
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut nonce);

    let key = cost.derive_key(passphrase, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..]).map_err(|_| CryptoError::Encryption)?;

    let mut payload = Zeroizing::new(Vec::with_capacity(MAGIC.len() + plaintext.len()));
    payload.extend_from_slice(MAGIC);
    payload.extend_from_slice(plaintext);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), payload.as_slice())
        .map_err(|_| CryptoError::Encryption)?;

    let mut sealed = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    sealed.extend_from_slice(&cost.to_bytes());
    sealed.extend_from_slice(&salt);
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt a blob produced by [`seal`].
pub fn open(passphrase: &str, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < HEADER_LEN + MAGIC.len() {
        return Err(CryptoError::InvalidFormat);
    }
    let (cost, rest) = sealed.split_at(COST_LEN);
    let (salt, rest) = rest.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let key = KdfCost::from_bytes(cost)?.derive_key(passphrase, salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..]).map_err(|_| CryptoError::Decryption)?;

    let decrypted = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decryption)?,
    );

    match decrypted.strip_prefix(MAGIC) {
        Some(plaintext) => Ok(plaintext.to_vec()),
        None => Err(CryptoError::Decryption),
    }
}
