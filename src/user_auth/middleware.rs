use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::gate::{AuthGate, GateState};
use crate::error::LedgerError;

/// Admit the request through the gate and inject the `CallerIdentity`
/// extension for downstream handlers.
pub async fn require_bearer(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, LedgerError> {
    // A header that is not valid ASCII is as good as absent
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match gate.admit(auth_header) {
        GateState::Authenticated(caller) => {
            request.extensions_mut().insert(caller);
            Ok(next.run(request).await)
        }
        GateState::Unauthenticated(reason) => {
            tracing::debug!(reason = reason.message(), "Request rejected by auth gate");
            Err(reason.into_error())
        }
    }
}
