use std::sync::Arc;

use tracing::{debug, error, info};

use crate::account::store::check_transfer_args;
use crate::account::{AccountStore, Identity, TransactionRecord, UserSummary};
use crate::catalog::Catalog;
use crate::error::LedgerError;
use crate::user_auth::CallerIdentity;

/// Entry points for moving coins.
///
/// Every operation takes the `CallerIdentity` the auth gate produced; the
/// caller is always the source of funds.
pub struct LedgerEngine {
    store: Arc<dyn AccountStore>,
    catalog: Arc<dyn Catalog>,
}

impl LedgerEngine {
    pub fn new(store: Arc<dyn AccountStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self { store, catalog }
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    /// Send `amount` coins from the caller to `to`
    pub async fn transfer(
        &self,
        caller: &CallerIdentity,
        to: &str,
        amount: i64,
    ) -> Result<TransactionRecord, LedgerError> {
        let from = caller.as_str();
        let result = self.transfer_inner(from, to, amount).await;

        match &result {
            Ok(record) => {
                info!(tx_id = record.tx_id, from, to, amount, "Transfer committed")
            }
            Err(e) if e.is_internal() => error!(
                op = "transfer",
                store = self.store.name(),
                from,
                to,
                amount,
                retryable = e.is_retryable(),
                error = %e,
                "Transfer failed"
            ),
            Err(e) => debug!(from, to, amount, code = e.code(), "Transfer rejected"),
        }
        result
    }

    async fn transfer_inner(
        &self,
        from: &str,
        to: &str,
        amount: i64,
    ) -> Result<TransactionRecord, LedgerError> {
        check_transfer_args(from, to, amount)?;
        // A name that fails validation can never have been registered
        let to = Identity::new(to).map_err(|_| LedgerError::RecipientNotFound(to.to_string()))?;

        if !self.store.account_exists(to.as_str()).await? {
            return Err(LedgerError::RecipientNotFound(to.into_string()));
        }

        self.store.transfer(from, to.as_str(), amount).await
    }

    /// Buy one unit of `item` for the caller at the catalog price
    pub async fn purchase(
        &self,
        caller: &CallerIdentity,
        item: &str,
    ) -> Result<TransactionRecord, LedgerError> {
        let identity = caller.as_str();
        let result = self.purchase_inner(identity, item).await;

        match &result {
            Ok(record) => info!(
                tx_id = record.tx_id,
                identity,
                item,
                price = record.amount,
                "Purchase committed"
            ),
            Err(e) if e.is_internal() => error!(
                op = "purchase",
                store = self.store.name(),
                identity,
                item,
                retryable = e.is_retryable(),
                error = %e,
                "Purchase failed"
            ),
            Err(e) => debug!(identity, item, code = e.code(), "Purchase rejected"),
        }
        result
    }

    async fn purchase_inner(
        &self,
        identity: &str,
        item: &str,
    ) -> Result<TransactionRecord, LedgerError> {
        if item.is_empty() || !self.catalog.item_exists(item).await? {
            return Err(LedgerError::ItemNotFound(item.to_string()));
        }
        // The store re-reads the price under its own transaction
        self.store.purchase(identity, item).await
    }

    /// Balance, inventory and coin history as of one instant
    pub async fn user_summary(&self, caller: &CallerIdentity) -> Result<UserSummary, LedgerError> {
        let identity = caller.as_str();
        let result = self.store.summary(identity).await;
        if let Err(e) = &result
            && e.is_internal()
        {
            error!(op = "summary", store = self.store.name(), identity, error = %e, "Summary read failed");
        }
        result
    }

    /// Raw ledger lines touching the caller, oldest first
    pub async fn history(
        &self,
        caller: &CallerIdentity,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let identity = caller.as_str();
        let result = self.store.transaction_history(identity).await;
        if let Err(e) = &result
            && e.is_internal()
        {
            error!(op = "history", store = self.store.name(), identity, error = %e, "History read failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::MemoryAccountStore;
    use crate::catalog::StaticCatalog;

    async fn engine_with(accounts: &[(&str, i64)]) -> (LedgerEngine, Arc<MemoryAccountStore>) {
        let store = Arc::new(MemoryAccountStore::with_default_catalog());
        for (identity, balance) in accounts {
            store
                .create_account(identity, "$argon2id$test", *balance)
                .await
                .unwrap();
        }
        let engine = LedgerEngine::new(store.clone(), Arc::new(StaticCatalog::merch()));
        (engine, store)
    }

    fn caller(identity: &str) -> CallerIdentity {
        CallerIdentity::new(identity)
    }

    #[tokio::test]
    async fn test_transfer_updates_both_sides() {
        let (engine, store) = engine_with(&[("alice", 1000), ("bob", 1000)]).await;

        let record = engine.transfer(&caller("alice"), "bob", 10).await.unwrap();
        assert_eq!(record.from, "alice");
        assert_eq!(record.recipient(), Some("bob"));
        assert_eq!(record.amount, 10);

        assert_eq!(store.balance("alice").await.unwrap(), 990);
        assert_eq!(store.balance("bob").await.unwrap(), 1010);
    }

    #[tokio::test]
    async fn test_transfer_validation() {
        let (engine, store) = engine_with(&[("alice", 1000), ("bob", 1000)]).await;
        let alice = caller("alice");

        assert_eq!(
            engine.transfer(&alice, "bob", 0).await,
            Err(LedgerError::InvalidAmount)
        );
        assert_eq!(
            engine.transfer(&alice, "bob", -1).await,
            Err(LedgerError::InvalidAmount)
        );
        assert_eq!(
            engine.transfer(&alice, "alice", 5).await,
            Err(LedgerError::SelfTransfer)
        );
        assert_eq!(
            engine.transfer(&alice, "carol", 5).await,
            Err(LedgerError::RecipientNotFound("carol".into()))
        );
        assert_eq!(
            engine.transfer(&alice, "", 5).await,
            Err(LedgerError::RecipientNotFound(String::new()))
        );
        assert_eq!(
            engine.transfer(&alice, "bad name", 5).await,
            Err(LedgerError::RecipientNotFound("bad name".into()))
        );

        assert_eq!(store.balance("alice").await.unwrap(), 1000);
        assert_eq!(store.transaction_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_transfer_insufficient_balance() {
        let (engine, store) = engine_with(&[("alice", 5), ("bob", 0)]).await;

        assert_eq!(
            engine.transfer(&caller("alice"), "bob", 6).await,
            Err(LedgerError::InsufficientBalance)
        );
        // Exact balance is fine
        assert!(engine.transfer(&caller("alice"), "bob", 5).await.is_ok());
        assert_eq!(store.balance("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purchase_and_summary() {
        let (engine, _) = engine_with(&[("alice", 1000)]).await;
        let alice = caller("alice");

        engine.purchase(&alice, "cup").await.unwrap();
        engine.purchase(&alice, "cup").await.unwrap();
        engine.purchase(&alice, "book").await.unwrap();

        let summary = engine.user_summary(&alice).await.unwrap();
        assert_eq!(summary.coins, 1000 - 20 - 20 - 50);
        let inventory: Vec<(&str, i64)> = summary
            .inventory
            .iter()
            .map(|e| (e.item.as_str(), e.quantity))
            .collect();
        assert_eq!(inventory, vec![("book", 1), ("cup", 2)]);
        assert!(summary.coin_history.sent.is_empty());

        // Purchases are ledger lines of their own
        assert_eq!(engine.history(&alice).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_purchase_unknown_item() {
        let (engine, store) = engine_with(&[("alice", 1000)]).await;

        assert_eq!(
            engine.purchase(&caller("alice"), "spaceship").await,
            Err(LedgerError::ItemNotFound("spaceship".into()))
        );
        assert_eq!(
            engine.purchase(&caller("alice"), "").await,
            Err(LedgerError::ItemNotFound(String::new()))
        );
        assert_eq!(store.balance("alice").await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_purchase_insufficient_balance() {
        let (engine, store) = engine_with(&[("alice", 100)]).await;

        assert_eq!(
            engine.purchase(&caller("alice"), "pink-hoody").await,
            Err(LedgerError::InsufficientBalance)
        );
        assert_eq!(store.balance("alice").await.unwrap(), 100);
        assert!(store.inventory("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_append_surfaces_internal() {
        let (engine, store) = engine_with(&[("alice", 1000), ("bob", 1000)]).await;
        store.set_fail_append(true);

        let err = engine.transfer(&caller("alice"), "bob", 10).await.unwrap_err();
        assert!(err.is_internal());
        assert_eq!(store.total_balance().unwrap(), 2000);
        assert_eq!(store.balance("alice").await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_history_read_failure_surfaces_internal() {
        let (engine, store) = engine_with(&[("alice", 1000), ("bob", 1000)]).await;
        engine.transfer(&caller("alice"), "bob", 10).await.unwrap();
        assert_eq!(engine.history(&caller("alice")).await.unwrap().len(), 1);

        store.set_fail_history(true);
        let err = engine.history(&caller("alice")).await.unwrap_err();
        assert!(err.is_internal());
        assert_eq!(err.code(), "DATABASE_ERROR");
    }

    #[tokio::test]
    async fn test_summary_unknown_caller() {
        let (engine, _) = engine_with(&[]).await;
        assert_eq!(
            engine.user_summary(&caller("ghost")).await,
            Err(LedgerError::AccountNotFound("ghost".into()))
        );
    }
}
