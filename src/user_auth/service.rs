use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use validator::Validate;

use super::secret::{SigningSecret, signing_secret};
use crate::account::{AccountStore, Identity};
use crate::config::AuthConfig;
use crate::error::LedgerError;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: String, // Subject (account identity)
    pub exp: usize,  // Expiration time (as UTC timestamp)
    pub iat: usize,  // Issued at
}

/// Login request. Doubles as sign-up for unseen usernames.
#[derive(Clone, Deserialize, Validate)]
pub struct Credentials {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Auth Response (JWT)
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
}

/// Token lifetime and the grant new accounts start with
#[derive(Debug, Clone, Copy)]
pub struct TokenPolicy {
    pub token_ttl: Duration,
    pub starting_balance: i64,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            token_ttl: Duration::hours(72),
            starting_balance: 1000,
        }
    }
}

impl From<&AuthConfig> for TokenPolicy {
    fn from(cfg: &AuthConfig) -> Self {
        Self {
            token_ttl: Duration::hours(cfg.token_ttl_hours as i64),
            starting_balance: cfg.starting_balance,
        }
    }
}

pub struct IdentityService {
    store: Arc<dyn AccountStore>,
    secret: SigningSecret,
    policy: TokenPolicy,
}

impl IdentityService {
    pub fn new(store: Arc<dyn AccountStore>, secret: SigningSecret, policy: TokenPolicy) -> Self {
        Self {
            store,
            secret,
            policy,
        }
    }

    /// Build against the process-wide secret; fails until it is initialized
    pub fn from_global(
        store: Arc<dyn AccountStore>,
        policy: TokenPolicy,
    ) -> Result<Self, LedgerError> {
        Ok(Self::new(store, signing_secret()?.clone(), policy))
    }

    pub fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    /// Log in, registering the identity on first sight.
    ///
    /// Anyone who picks an unused username gets that account. This is the
    /// product's sign-up flow, not an oversight.
    pub async fn authenticate(&self, creds: Credentials) -> Result<AuthResponse, LedgerError> {
        creds
            .validate()
            .map_err(|e| LedgerError::InvalidCredentials(e.to_string()))?;
        let identity = Identity::new(&creds.username)?;

        let result = self.authenticate_inner(&identity, creds.password).await;
        if let Err(e) = &result
            && e.is_internal()
        {
            error!(op = "authenticate", identity = %identity, error = %e, "Authentication failed");
        }
        result
    }

    async fn authenticate_inner(
        &self,
        identity: &Identity,
        password: String,
    ) -> Result<AuthResponse, LedgerError> {
        if !self.store.account_exists(identity.as_str()).await? {
            let password_hash = hash_password(password.clone()).await?;
            match self
                .store
                .create_account(identity.as_str(), &password_hash, self.policy.starting_balance)
                .await
            {
                Ok(account) => {
                    info!(identity = %account.identity, balance = account.balance, "Account registered on first login");
                    return self.issue_token(identity.as_str());
                }
                // Lost a race against a concurrent first login: treat as a normal login
                Err(LedgerError::Conflict(_)) => {
                    debug!(identity = %identity, "Concurrent registration, verifying stored credentials");
                }
                Err(e) => return Err(e),
            }
        }

        let stored_hash = self.store.credential_hash(identity.as_str()).await?;
        if let Err(e) = verify_password(password, stored_hash).await {
            if e == LedgerError::Unauthorized {
                info!(identity = %identity, "Login rejected: wrong password");
            }
            return Err(e);
        }

        debug!(identity = %identity, "Login successful");
        self.issue_token(identity.as_str())
    }

    /// Issue a bearer token for an identity
    pub fn issue_token(&self, identity: &str) -> Result<AuthResponse, LedgerError> {
        self.issue_token_at(identity, Utc::now())
    }

    pub(crate) fn issue_token_at(
        &self,
        identity: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<AuthResponse, LedgerError> {
        let expiration = issued_at
            .checked_add_signed(self.policy.token_ttl)
            .ok_or_else(|| LedgerError::Internal("token expiry out of range".into()))?;

        let claims = Claims {
            sub: identity.to_string(),
            exp: expiration.timestamp() as usize,
            iat: issued_at.timestamp() as usize,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            self.secret.encoding_key(),
        )
        .map_err(|e| LedgerError::Internal(format!("Failed to generate token: {}", e)))?;

        Ok(AuthResponse { token })
    }

    /// Verify JWT token: HS256 signature, structure, and `exp` with no leeway
    pub fn verify_token(&self, token: &str) -> Result<Claims, LedgerError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, self.secret.decoding_key(), &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Token rejected");
                LedgerError::InvalidToken
            })?;

        // jsonwebtoken still accepts exp == now; a token is only valid strictly before exp
        if claims.exp as i64 <= Utc::now().timestamp() {
            debug!(sub = %claims.sub, exp = claims.exp, "Token rejected: expired");
            return Err(LedgerError::InvalidToken);
        }
        Ok(claims)
    }

    /// Resolve a token to the identity it was issued for
    pub fn verify(&self, token: &str) -> Result<String, LedgerError> {
        self.verify_token(token).map(|claims| claims.sub)
    }
}

/// Salted argon2id hash, computed off the async workers
async fn hash_password(password: String) -> Result<String, LedgerError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| LedgerError::Internal(format!("Hashing failed: {}", e)))
    })
    .await?
}

/// Constant-time comparison against the stored PHC string
async fn verify_password(password: String, stored_hash: String) -> Result<(), LedgerError> {
    tokio::task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&stored_hash)
            .map_err(|e| LedgerError::Internal(format!("Invalid hash format: {}", e)))?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|e| match e {
                argon2::password_hash::Error::Password => LedgerError::Unauthorized,
                other => LedgerError::Internal(format!("Password verification failed: {}", other)),
            })
    })
    .await?
}
