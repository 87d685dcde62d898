//! Input validation for account identities
//!
//! [`Identity`] keeps its field private so every identity that reaches the
//! store went through `new()`.

use std::fmt;

use crate::error::LedgerError;

pub const IDENTITY_MAX_LEN: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid length for {field}: expected {min}-{max}, got {actual}")]
    InvalidLength {
        field: &'static str,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("Invalid format for {field}: '{value}' (expected: {expected})")]
    InvalidFormat {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl From<ValidationError> for LedgerError {
    fn from(e: ValidationError) -> Self {
        LedgerError::InvalidIdentity(e.to_string())
    }
}

/// Validated account identity (username)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    /// # Validation Rules
    /// - Surrounding whitespace is rejected, not trimmed (identities are immutable)
    /// - Length: 1-64 bytes
    /// - No whitespace or control characters
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        if name.is_empty() || name.len() > IDENTITY_MAX_LEN {
            return Err(ValidationError::InvalidLength {
                field: "identity",
                min: 1,
                max: IDENTITY_MAX_LEN,
                actual: name.len(),
            });
        }

        if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ValidationError::InvalidFormat {
                field: "identity",
                value: name.escape_debug().to_string(),
                expected: "no whitespace or control characters",
            });
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
