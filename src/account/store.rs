//! Account store capability
//!
//! The ledger engine and the identity service only ever talk to this trait.
//! [`super::PgAccountStore`] is the production implementation,
//! [`super::MemoryAccountStore`] the in-process double used by tests.

use async_trait::async_trait;

use super::models::{Account, InventoryEntry, TransactionRecord, UserSummary};
use crate::error::LedgerError;

/// Persistent identity -> balance / credential hash / inventory / ledger mapping.
///
/// `transfer` and `purchase` are each a single atomic unit: either every write
/// commits or none does. `summary` reads from one snapshot.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Store name for logging
    fn name(&self) -> &'static str;

    async fn account_exists(&self, identity: &str) -> Result<bool, LedgerError>;

    /// Insert a new account. `Conflict` if the identity is taken.
    async fn create_account(
        &self,
        identity: &str,
        credential_hash: &str,
        starting_balance: i64,
    ) -> Result<Account, LedgerError>;

    /// `AccountNotFound` if the identity is unknown
    async fn credential_hash(&self, identity: &str) -> Result<String, LedgerError>;

    async fn balance(&self, identity: &str) -> Result<i64, LedgerError>;

    /// Inventory ordered by item name
    async fn inventory(&self, identity: &str) -> Result<Vec<InventoryEntry>, LedgerError>;

    /// Every ledger line where the account is source or destination, oldest first
    async fn transaction_history(
        &self,
        identity: &str,
    ) -> Result<Vec<TransactionRecord>, LedgerError>;

    async fn summary(&self, identity: &str) -> Result<UserSummary, LedgerError>;

    /// Move `amount` coins between two accounts and append one ledger line.
    ///
    /// Both rows are locked in ascending identity order regardless of direction.
    async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: i64,
    ) -> Result<TransactionRecord, LedgerError>;

    /// Debit the item price, bump inventory by one, append one ledger line.
    async fn purchase(&self, identity: &str, item: &str) -> Result<TransactionRecord, LedgerError>;
}

/// Argument checks every store repeats before opening a transaction
pub(crate) fn check_transfer_args(from: &str, to: &str, amount: i64) -> Result<(), LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount);
    }
    if from == to {
        return Err(LedgerError::SelfTransfer);
    }
    Ok(())
}

/// Deterministic lock order for a pair of accounts: `(first, second)`.
pub(crate) fn lock_order<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_transfer_args() {
        assert!(check_transfer_args("a", "b", 1).is_ok());
        assert_eq!(
            check_transfer_args("a", "b", 0),
            Err(LedgerError::InvalidAmount)
        );
        assert_eq!(
            check_transfer_args("a", "b", -5),
            Err(LedgerError::InvalidAmount)
        );
        assert_eq!(
            check_transfer_args("a", "a", 10),
            Err(LedgerError::SelfTransfer)
        );
    }

    #[test]
    fn test_lock_order_is_direction_independent() {
        assert_eq!(lock_order("alice", "bob"), ("alice", "bob"));
        assert_eq!(lock_order("bob", "alice"), ("alice", "bob"));
        assert_eq!(lock_order("B", "a"), ("B", "a")); // byte order, not collation
    }
}
