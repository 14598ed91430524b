//! Tracking-number format and collision-checked generation.

use rand::Rng;
use serde::{Deserialize, Serialize};

use parceltrace_core::{DomainError, DomainResult, ValueObject};

/// Default retry budget for collision-checked generation.
pub const DEFAULT_GENERATOR_ATTEMPTS: u32 = 8;

const PREFIX_LEN: usize = 3;
const DIGIT_LEN: usize = 9;

/// Public shipment identifier: 3-letter country prefix + 9 digits
/// (e.g. `IND123456789`). Immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackingNumber(String);

impl TrackingNumber {
    /// Parse and normalize a candidate tracking number.
    ///
    /// The alphabetic prefix is case-insensitive on input and stored
    /// uppercased.
    pub fn parse(input: &str) -> DomainResult<Self> {
        let candidate = input.trim().to_uppercase();

        if candidate.len() != PREFIX_LEN + DIGIT_LEN {
            return Err(DomainError::validation(format!(
                "tracking number must be {} characters, got {}",
                PREFIX_LEN + DIGIT_LEN,
                candidate.len()
            )));
        }

        let (prefix, digits) = candidate.split_at(PREFIX_LEN);
        if !prefix.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(DomainError::validation(
                "tracking number must start with 3 letters",
            ));
        }
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::validation(
                "tracking number must end with 9 digits",
            ));
        }

        Ok(Self(candidate))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn prefix(&self) -> &str {
        &self.0[..PREFIX_LEN]
    }
}

impl ValueObject for TrackingNumber {}

impl core::fmt::Display for TrackingNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TrackingNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TrackingNumber> for String {
    fn from(value: TrackingNumber) -> Self {
        value.0
    }
}

/// Collision-checked tracking-number generator.
///
/// Draws a uniform 9-digit numeral (no leading zero), prefixes the configured
/// country code, and pre-checks existence against the ledger via the supplied
/// closure. The retry budget is bounded; the storage layer's unique index
/// remains the authoritative guard.
#[derive(Debug, Clone)]
pub struct TrackingNumberGenerator {
    prefix: String,
    max_attempts: u32,
}

impl TrackingNumberGenerator {
    pub fn new(prefix: &str) -> DomainResult<Self> {
        let prefix = prefix.trim().to_uppercase();
        if prefix.len() != PREFIX_LEN || !prefix.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(DomainError::validation(
                "tracking-number prefix must be exactly 3 letters",
            ));
        }
        Ok(Self {
            prefix,
            max_attempts: DEFAULT_GENERATOR_ATTEMPTS,
        })
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Generate a tracking number not currently known to the ledger.
    ///
    /// `exists` answers "is this number already taken?". Returns
    /// [`DomainError::ResourceExhausted`] once the retry budget runs out.
    pub fn generate<F>(&self, exists: F) -> DomainResult<TrackingNumber>
    where
        F: FnMut(&TrackingNumber) -> bool,
    {
        self.generate_with(&mut rand::thread_rng(), exists)
    }

    /// Same as [`generate`](Self::generate), with an injected RNG for
    /// deterministic tests.
    pub fn generate_with<R, F>(&self, rng: &mut R, mut exists: F) -> DomainResult<TrackingNumber>
    where
        R: Rng + ?Sized,
        F: FnMut(&TrackingNumber) -> bool,
    {
        for _ in 0..self.max_attempts {
            // 100000000..=999999999 avoids leading-zero ambiguity.
            let digits: u32 = rng.gen_range(100_000_000..=999_999_999);
            let candidate = TrackingNumber(format!("{}{digits}", self.prefix));
            if !exists(&candidate) {
                return Ok(candidate);
            }
        }

        Err(DomainError::resource_exhausted(format!(
            "no unused tracking number found for prefix {} after {} attempts",
            self.prefix, self.max_attempts
        )))
    }
}
