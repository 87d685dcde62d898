//! Token signing secret
//!
//! The HS256 key is a process-wide resource: `init_signing_secret` installs it
//! once at startup from configuration, `signing_secret` hands it out afterwards.
//! There is no compiled-in fallback key.

use std::fmt;

use jsonwebtoken::{DecodingKey, EncodingKey};
use once_cell::sync::OnceCell;

use crate::error::LedgerError;

/// HS256 keys shorter than the hash output are rejected
pub const MIN_SECRET_LEN: usize = 32;

static SIGNING_SECRET: OnceCell<SigningSecret> = OnceCell::new();

/// Symmetric key pair for issuing and verifying bearer tokens
#[derive(Clone)]
pub struct SigningSecret {
    raw: Vec<u8>,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningSecret {
    pub fn new(secret: &[u8]) -> Result<Self, LedgerError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(LedgerError::Internal(format!(
                "signing secret must be at least {} bytes, got {}",
                MIN_SECRET_LEN,
                secret.len()
            )));
        }
        Ok(Self {
            raw: secret.to_vec(),
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        })
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

/// Install the process-wide signing secret.
///
/// Re-initializing with the same key is a no-op; a different key is an error,
/// so tokens already handed out never silently stop verifying.
pub fn init_signing_secret(secret: &str) -> Result<&'static SigningSecret, LedgerError> {
    let candidate = SigningSecret::new(secret.as_bytes())?;
    let installed = SIGNING_SECRET.get_or_init(|| candidate.clone());
    if installed.raw != candidate.raw {
        return Err(LedgerError::Internal(
            "signing secret already initialized with a different key".into(),
        ));
    }
    tracing::info!("Token signing secret initialized");
    Ok(installed)
}

/// The installed secret, or `Internal` before `init_signing_secret` ran
pub fn signing_secret() -> Result<&'static SigningSecret, LedgerError> {
    SIGNING_SECRET
        .get()
        .ok_or_else(|| LedgerError::Internal("signing secret not initialized".into()))
}
