use std::sync::Arc;

use crate::account::AccountStore;
use crate::catalog::Catalog;
use crate::error::LedgerError;
use crate::ledger::LedgerEngine;
use crate::user_auth::{AuthGate, IdentityService, SigningSecret, TokenPolicy};

/// Shared service handles for the transport layer
#[derive(Clone)]
pub struct AppState {
    /// Login / token issuance
    pub identity: Arc<IdentityService>,
    /// Bearer token check, mounted via `require_bearer`
    pub gate: Arc<AuthGate>,
    /// Transfer, purchase, summary
    pub ledger: Arc<LedgerEngine>,
}

impl AppState {
    /// Wire services against the process-wide signing secret
    pub fn new(
        store: Arc<dyn AccountStore>,
        catalog: Arc<dyn Catalog>,
        policy: TokenPolicy,
    ) -> Result<Self, LedgerError> {
        let identity = IdentityService::from_global(store.clone(), policy)?;
        Ok(Self::assemble(identity, store, catalog))
    }

    /// Wire services against an explicit secret
    pub fn with_secret(
        store: Arc<dyn AccountStore>,
        catalog: Arc<dyn Catalog>,
        secret: SigningSecret,
        policy: TokenPolicy,
    ) -> Self {
        let identity = IdentityService::new(store.clone(), secret, policy);
        Self::assemble(identity, store, catalog)
    }

    fn assemble(
        identity: IdentityService,
        store: Arc<dyn AccountStore>,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        let identity = Arc::new(identity);
        Self {
            gate: Arc::new(AuthGate::new(identity.clone())),
            ledger: Arc::new(LedgerEngine::new(store, catalog)),
            identity,
        }
    }
}
