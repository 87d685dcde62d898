//! Account store
//!
//! Identity -> balance, credential hash, inventory and transaction log.
//! Only this module writes those tables.

pub mod memory;
pub mod models;
pub mod repository;
pub mod store;
pub mod validation;

pub use memory::MemoryAccountStore;
pub use models::{
    Account, CatalogItem, CoinHistory, InventoryEntry, ReceivedCoins, SentCoins, TransactionKind,
    TransactionRecord, UserSummary,
};
pub use repository::PgAccountStore;
pub use store::AccountStore;
pub use validation::{Identity, ValidationError};

// Re-export Database from top-level db module
pub use crate::db::Database;
