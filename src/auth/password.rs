//! Password strength rules and bcrypt hashing.

use thiserror::Error;

/// bcrypt only reads the first 72 bytes of its input.
pub const BCRYPT_MAX_BYTES: usize = 72;
pub const DEFAULT_MIN_LENGTH: usize = 8;
/// Work factor bounds bcrypt accepts.
pub const MIN_HASH_COST: u32 = 4;
pub const MAX_HASH_COST: u32 = 31;

/// The first rule a candidate password breaks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("Password must be at least {0} characters long")]
    TooShort(usize),
    #[error("Password must not exceed {0} characters (bcrypt limitation)")]
    TooLong(usize),
    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,
    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,
    #[error("Password must contain at least one number")]
    MissingNumber,
    #[error("Password must contain at least one special character")]
    MissingSymbol,
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password cannot be empty")]
    EmptyInput,
    #[error("password does not match")]
    Mismatch,
    #[error("password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error("password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordPolicy {
    min_length: usize,
    max_length: usize,
    require_uppercase: bool,
    require_lowercase: bool,
    require_number: bool,
    require_symbol: bool,
    hash_cost: u32,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            max_length: BCRYPT_MAX_BYTES,
            require_uppercase: true,
            require_lowercase: true,
            require_number: true,
            require_symbol: true,
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl PasswordPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length.min(BCRYPT_MAX_BYTES);
        self
    }

    /// Values above the bcrypt input limit are clamped to it.
    #[must_use]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length.min(BCRYPT_MAX_BYTES);
        self
    }

    #[must_use]
    pub fn with_require_uppercase(mut self, required: bool) -> Self {
        self.require_uppercase = required;
        self
    }

    #[must_use]
    pub fn with_require_lowercase(mut self, required: bool) -> Self {
        self.require_lowercase = required;
        self
    }

    #[must_use]
    pub fn with_require_number(mut self, required: bool) -> Self {
        self.require_number = required;
        self
    }

    #[must_use]
    pub fn with_require_symbol(mut self, required: bool) -> Self {
        self.require_symbol = required;
        self
    }

    #[must_use]
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost.clamp(MIN_HASH_COST, MAX_HASH_COST);
        self
    }

    #[must_use]
    pub fn min_length(&self) -> usize {
        self.min_length
    }

    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Check `password` against every enabled rule, in a fixed order.
    ///
    /// Lengths are measured in bytes because that is what bcrypt consumes.
    ///
    /// # Errors
    /// Returns the first [`PolicyViolation`] encountered.
    pub fn validate_strength(&self, password: &str) -> Result<(), PolicyViolation> {
        if password.len() < self.min_length {
            return Err(PolicyViolation::TooShort(self.min_length));
        }
        if password.len() > self.max_length {
            return Err(PolicyViolation::TooLong(self.max_length));
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(PolicyViolation::MissingUppercase);
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(PolicyViolation::MissingLowercase);
        }
        if self.require_number && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PolicyViolation::MissingNumber);
        }
        if self.require_symbol && password.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PolicyViolation::MissingSymbol);
        }
        Ok(())
    }

    /// Produce a salted bcrypt hash. The work runs on the blocking pool.
    ///
    /// # Errors
    /// [`PasswordError::EmptyInput`] for an empty password, [`PasswordError::Hashing`] if bcrypt fails.
    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        if password.is_empty() {
            return Err(PasswordError::EmptyInput);
        }
        let password = password.to_owned();
        let cost = self.hash_cost;
        Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
    }

    /// Compare a password against a stored hash using bcrypt's own verifier, off the async
    /// workers.
    ///
    /// # Errors
    /// [`PasswordError::Mismatch`] when the password is wrong, [`PasswordError::Hashing`] if the
    /// stored hash cannot be parsed.
    pub async fn verify(&self, hash: &str, password: &str) -> Result<(), PasswordError> {
        if password.is_empty() || hash.is_empty() {
            return Err(PasswordError::EmptyInput);
        }
        let (hash, password) = (hash.to_owned(), password.to_owned());
        if tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await?? {
            Ok(())
        } else {
            Err(PasswordError::Mismatch)
        }
    }
}
