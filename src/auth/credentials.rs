use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()-_=+[]{}<>?";

const MIN_COST: u32 = 4;
const MAX_COST: u32 = 31;

const API_KEY_BYTES: usize = 32;
const API_KEY_PREFIX: &str = "pk_";

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("invalid bcrypt cost {0}: expected 4..=31")]
    InvalidCost(u32),

    #[error("hashing failed: {0}")]
    Hashing(String),

    #[error("platform random number generator is unavailable: {0}")]
    InsufficientEntropySource(String),

    #[error("password policy is too weak: {0}")]
    WeakPolicy(String),
}

/// Character classes and minimum strength for generated passwords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub length: usize,
    pub lowercase: bool,
    pub uppercase: bool,
    pub digits: bool,
    pub symbols: bool,
    pub min_entropy_bits: u32,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            length: 16,
            lowercase: true,
            uppercase: true,
            digits: true,
            symbols: true,
            min_entropy_bits: 80,
        }
    }
}

impl PasswordPolicy {
    fn classes(&self) -> Vec<&'static [u8]> {
        let mut classes = Vec::new();
        if self.lowercase {
            classes.push(LOWERCASE);
        }
        if self.uppercase {
            classes.push(UPPERCASE);
        }
        if self.digits {
            classes.push(DIGITS);
        }
        if self.symbols {
            classes.push(SYMBOLS);
        }
        classes
    }

    /// Entropy of a uniformly random password drawn from the full alphabet.
    pub fn entropy_bits(&self) -> f64 {
        let alphabet: usize = self.classes().iter().map(|c| c.len()).sum();
        if alphabet == 0 {
            return 0.0;
        }
        self.length as f64 * (alphabet as f64).log2()
    }

    fn validate(&self) -> Result<(), CredentialError> {
        let classes = self.classes().len();
        if classes == 0 {
            return Err(CredentialError::WeakPolicy("no character classes enabled".to_string()));
        }
        if self.length < classes {
            return Err(CredentialError::WeakPolicy(format!(
                "length {} cannot hold one character from each of {} classes",
                self.length, classes
            )));
        }
        let bits = self.entropy_bits();
        if bits < f64::from(self.min_entropy_bits) {
            return Err(CredentialError::WeakPolicy(format!(
                "{:.1} bits of entropy is below the required {}",
                bits, self.min_entropy_bits
            )));
        }
        Ok(())
    }
}

/// One-way secret hashing (bcrypt) with a bounded blocking pool for the
/// async entry points.
#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    cost: u32,
    permits: Arc<Semaphore>,
}

impl CredentialVerifier {
    /// Pool sized to the available cores.
    pub fn new(cost: u32) -> Result<Self, CredentialError> {
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self::with_pool_size(cost, cores)
    }

    pub fn with_pool_size(cost: u32, pool_size: usize) -> Result<Self, CredentialError> {
        if !(MIN_COST..=MAX_COST).contains(&cost) {
            return Err(CredentialError::InvalidCost(cost));
        }
        Ok(Self {
            cost,
            permits: Arc::new(Semaphore::new(pool_size.max(1))),
        })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Salted hash; the salt is random per call so equal inputs give
    /// different digests.
    pub fn hash(&self, secret: &str) -> Result<String, CredentialError> {
        bcrypt::hash(secret, self.cost).map_err(|e| CredentialError::Hashing(e.to_string()))
    }

    /// Constant-time comparison against the salt embedded in `digest`.
    /// Any failure, including an unparseable digest, is just `false`.
    pub fn verify(&self, secret: &str, digest: &str) -> bool {
        match bcrypt::verify(secret, digest) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::debug!("credential digest could not be checked: {}", e);
                false
            }
        }
    }

    /// [`hash`](Self::hash) on the blocking pool. Callers queue on the
    /// semaphore when every worker is busy.
    pub async fn hash_async(&self, secret: impl Into<String>) -> Result<String, CredentialError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| CredentialError::Hashing(e.to_string()))?;
        let secret = secret.into();
        let cost = self.cost;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            bcrypt::hash(secret, cost).map_err(|e| CredentialError::Hashing(e.to_string()))
        })
        .await
        .map_err(|e| CredentialError::Hashing(e.to_string()))?
    }

    /// [`verify`](Self::verify) on the blocking pool.
    pub async fn verify_async(&self, secret: impl Into<String>, digest: impl Into<String>) -> bool {
        let permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::error!("credential pool closed: {}", e);
                return false;
            }
        };
        let verifier = self.clone();
        let secret = secret.into();
        let digest = digest.into();

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            verifier.verify(&secret, &digest)
        })
        .await
        .unwrap_or_else(|e| {
            tracing::error!("credential verification task failed: {}", e);
            false
        })
    }
}

fn fill_random(buf: &mut [u8]) -> Result<(), CredentialError> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CredentialError::InsufficientEntropySource(e.to_string()))
}

/// Uniform index in `0..bound` by rejection sampling.
fn random_below(bound: usize) -> Result<usize, CredentialError> {
    let bound = bound as u32;
    let zone = u32::MAX - (u32::MAX % bound);
    loop {
        let mut bytes = [0u8; 4];
        fill_random(&mut bytes)?;
        let value = u32::from_le_bytes(bytes);
        if value < zone {
            return Ok((value % bound) as usize);
        }
    }
}

/// 256-bit random API key, URL-safe.
pub fn generate_api_key() -> Result<String, CredentialError> {
    let mut bytes = [0u8; API_KEY_BYTES];
    fill_random(&mut bytes)?;
    Ok(format!("{}{}", API_KEY_PREFIX, URL_SAFE_NO_PAD.encode(bytes)))
}

/// Random password meeting `policy`; every enabled class appears at least once.
pub fn generate_password(policy: &PasswordPolicy) -> Result<String, CredentialError> {
    policy.validate()?;

    let classes = policy.classes();
    let alphabet: Vec<u8> = classes.iter().flat_map(|c| c.iter().copied()).collect();

    let mut password = Vec::with_capacity(policy.length);
    for class in &classes {
        password.push(class[random_below(class.len())?]);
    }
    while password.len() < policy.length {
        password.push(alphabet[random_below(alphabet.len())?]);
    }

    // Fisher-Yates so the guaranteed characters are not always up front
    for i in (1..password.len()).rev() {
        let j = random_below(i + 1)?;
        password.swap(i, j);
    }

    String::from_utf8(password).map_err(|e| CredentialError::Hashing(e.to_string()))
}
