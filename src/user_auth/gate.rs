//! Authorization gate
//!
//! Every ledger operation except `authenticate` runs behind the gate. A request
//! is either rejected with a reason or admitted carrying the caller's identity,
//! and only an admitted caller can reach the ledger engine.

use std::fmt;
use std::sync::Arc;

use super::service::IdentityService;
use crate::error::LedgerError;

/// Identity resolved from a verified bearer token.
///
/// Not constructible outside the crate: holding one proves the gate let the
/// request through.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    pub(crate) fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingHeader,
    MalformedHeader,
    InvalidToken,
}

impl RejectReason {
    pub fn message(self) -> &'static str {
        match self {
            RejectReason::MissingHeader => "Missing Authorization header",
            RejectReason::MalformedHeader => "Invalid token format",
            RejectReason::InvalidToken => "Invalid or expired token",
        }
    }

    pub fn into_error(self) -> LedgerError {
        match self {
            RejectReason::InvalidToken => LedgerError::InvalidToken,
            RejectReason::MissingHeader | RejectReason::MalformedHeader => {
                LedgerError::Unauthorized
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Unauthenticated(RejectReason),
    Authenticated(CallerIdentity),
}

impl GateState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, GateState::Authenticated(_))
    }

    /// Admitted caller, or the error the rejection maps to
    pub fn require(self) -> Result<CallerIdentity, LedgerError> {
        match self {
            GateState::Authenticated(caller) => Ok(caller),
            GateState::Unauthenticated(reason) => Err(reason.into_error()),
        }
    }
}

pub struct AuthGate {
    identity: Arc<IdentityService>,
}

impl AuthGate {
    pub fn new(identity: Arc<IdentityService>) -> Self {
        Self { identity }
    }

    /// Decide on a raw `Authorization` header value
    pub fn admit(&self, authorization: Option<&str>) -> GateState {
        let Some(header) = authorization else {
            return GateState::Unauthenticated(RejectReason::MissingHeader);
        };
        let Some(token) = parse_bearer(header) else {
            return GateState::Unauthenticated(RejectReason::MalformedHeader);
        };

        match self.identity.verify(token) {
            Ok(identity) => GateState::Authenticated(CallerIdentity::new(identity)),
            Err(_) => GateState::Unauthenticated(RejectReason::InvalidToken),
        }
    }
}

/// Extract the token from `Bearer <token>`.
///
/// Exactly two space-separated parts; the scheme is case-insensitive.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() =>
        {
            Some(token)
        }
        _ => None,
    }
}
