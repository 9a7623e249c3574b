//! Password hashing and generation.
//!
//! Hashes are bcrypt in the `$2a$` form, so accounts carried over from
//! earlier deployments verify unchanged.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use bcrypt::Version;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use thiserror::Error;

/// Length in bytes of reset tokens before encoding.
pub const DEFAULT_TOKEN_LENGTH: usize = 32;

/// bcrypt work factor used unless configured otherwise.
pub const DEFAULT_HASH_COST: u32 = 10;

/// Lowest work factor bcrypt accepts.
pub const MIN_HASH_COST: u32 = 4;

/// Highest work factor bcrypt accepts.
pub const MAX_HASH_COST: u32 = 31;

/// A password could not be hashed or a stored hash could not be read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    /// The stored value is not a bcrypt hash.
    #[error("unreadable password hash: {0}")]
    Malformed(String),

    /// Hashing failed, usually an out-of-range cost.
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Hashes `plain` at [`DEFAULT_HASH_COST`].
///
/// # Errors
///
/// Returns [`PasswordError::Hashing`] if bcrypt rejects the input.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    hash_password_with_cost(plain, DEFAULT_HASH_COST)
}

/// Hashes `plain` at `cost` with a fresh salt.
///
/// # Errors
///
/// Returns [`PasswordError::Hashing`] for a cost outside
/// [`MIN_HASH_COST`]..=[`MAX_HASH_COST`].
pub fn hash_password_with_cost(plain: &str, cost: u32) -> Result<String, PasswordError> {
    bcrypt::hash_with_result(plain, cost)
        .map(|parts| parts.format_for_version(Version::TwoA))
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

/// Checks `plain` against a stored bcrypt hash of any version.
///
/// # Errors
///
/// Returns [`PasswordError::Malformed`] if `stored` is not a bcrypt hash.
pub fn verify_password(plain: &str, stored: &str) -> Result<bool, PasswordError> {
    bcrypt::verify(plain, stored).map_err(|e| PasswordError::Malformed(e.to_string()))
}

/// Returns `len` random bytes encoded as unpadded URL-safe base64.
#[must_use]
pub fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// A freshly generated password and its hash.
#[derive(Clone)]
pub struct GeneratedPassword {
    /// Plain text, to be sent to the user once.
    pub plain: String,
    /// Hash to store.
    pub hash: String,
}

impl std::fmt::Debug for GeneratedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedPassword")
            .field("plain", &"[REDACTED]")
            .field("hash", &self.hash)
            .finish()
    }
}

/// Source of temporary passwords, and the hasher for passwords users pick.
pub trait PasswordGenerator: Send + Sync {
    /// Generates a new password.
    ///
    /// # Errors
    ///
    /// Returns [`PasswordError::Hashing`] if the password cannot be hashed.
    fn generate(&self) -> Result<GeneratedPassword, PasswordError>;

    /// Hashes a user-chosen password at this generator's cost.
    ///
    /// # Errors
    ///
    /// Returns [`PasswordError::Hashing`] if bcrypt rejects the input.
    fn hash(&self, plain: &str) -> Result<String, PasswordError>;
}

/// Always yields the same password. Development only.
#[derive(Debug, Clone)]
pub struct ConstantPassword {
    password: String,
    cost: u32,
}

impl ConstantPassword {
    /// Yields `password` every time.
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            cost: DEFAULT_HASH_COST,
        }
    }

    /// Sets the bcrypt work factor.
    #[must_use]
    pub const fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }
}

impl Default for ConstantPassword {
    fn default() -> Self {
        Self::new("test")
    }
}

impl PasswordGenerator for ConstantPassword {
    fn generate(&self) -> Result<GeneratedPassword, PasswordError> {
        Ok(GeneratedPassword {
            plain: self.password.clone(),
            hash: self.hash(&self.password)?,
        })
    }

    fn hash(&self, plain: &str) -> Result<String, PasswordError> {
        hash_password_with_cost(plain, self.cost)
    }
}

const WORDS: &[&str] = &[
    "amber", "basin", "cedar", "delta", "ember", "fjord", "grove", "harbor", "inlet", "juniper",
    "kettle", "lantern", "meadow", "nectar", "orchard", "pebble", "quartz", "river", "summit",
    "timber", "umber", "valley", "willow", "yarrow", "zephyr",
];

/// Readable passwords: capitalised words joined by `-`, then two digits.
#[derive(Debug, Clone)]
pub struct Passphrase {
    words: usize,
    cost: u32,
}

impl Passphrase {
    /// Passphrase with `words` words (at least one).
    #[must_use]
    pub fn new(words: usize) -> Self {
        Self {
            words: words.max(1),
            cost: DEFAULT_HASH_COST,
        }
    }

    /// Sets the bcrypt work factor.
    #[must_use]
    pub const fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }
}

impl Default for Passphrase {
    fn default() -> Self {
        Self::new(3)
    }
}

impl PasswordGenerator for Passphrase {
    fn generate(&self) -> Result<GeneratedPassword, PasswordError> {
        let plain = {
            let mut rng = rand::thread_rng();
            let mut parts: Vec<String> = Vec::with_capacity(self.words);
            for _ in 0..self.words {
                let word = WORDS.choose(&mut rng).copied().unwrap_or("utility");
                parts.push(capitalise(word));
            }
            format!("{}-{:02}", parts.join("-"), rng.gen_range(0..100))
        };
        Ok(GeneratedPassword {
            hash: self.hash(&plain)?,
            plain,
        })
    }

    fn hash(&self, plain: &str) -> Result<String, PasswordError> {
        hash_password_with_cost(plain, self.cost)
    }
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
