//! Ledger engine
//!
//! Transfer, purchase and summary over an [`AccountStore`](crate::account::AccountStore)
//! and a [`Catalog`](crate::catalog::Catalog).

pub mod engine;

pub use engine::LedgerEngine;
