//! Identity and authorization
//!
//! Credentials in, bearer token out; bearer token in, `CallerIdentity` out.

pub mod gate;
pub mod middleware;
pub mod secret;
pub mod service;

pub use gate::{AuthGate, CallerIdentity, GateState, RejectReason, parse_bearer};
pub use middleware::require_bearer;
pub use secret::{MIN_SECRET_LEN, SigningSecret, init_signing_secret, signing_secret};
pub use service::{AuthResponse, Claims, Credentials, IdentityService, TokenPolicy};
