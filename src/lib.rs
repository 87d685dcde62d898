//! coin_shop - Coin point-of-sale ledger
//!
//! Users hold a coin balance, send coins to each other and spend them on merch.
//!
//! # Modules
//!
//! - [`account`] - Account store: balances, credentials, inventory, ledger lines
//! - [`catalog`] - Merch catalog (item existence and price)
//! - [`ledger`] - Transfer / purchase / summary engine
//! - [`user_auth`] - Login, bearer tokens, authorization gate
//! - [`error`] - `LedgerError` and its error-kind taxonomy
//! - [`config`] - YAML configuration with environment overrides
//! - [`db`] - PostgreSQL pool and migrations
//! - [`logging`] - tracing subscriber setup
//! - [`state`] - Shared service handles

pub mod account;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod state;
pub mod user_auth;

// Convenient re-exports at crate root
pub use account::{
    AccountStore, Identity, MemoryAccountStore, PgAccountStore, TransactionKind,
    TransactionRecord, UserSummary,
};
pub use catalog::{Catalog, PgCatalog, StaticCatalog};
pub use error::{ErrorKind, LedgerError};
pub use ledger::LedgerEngine;
pub use state::AppState;
pub use user_auth::{AuthGate, CallerIdentity, Credentials, GateState, IdentityService};
