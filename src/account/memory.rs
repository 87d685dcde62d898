//! In-memory account store
//!
//! Test double for [`AccountStore`]. Each operation runs against a scratch copy
//! of the state and only swaps it in once every step succeeded, which mirrors
//! commit/rollback of the PostgreSQL store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use super::models::{
    Account, CoinHistory, InventoryEntry, TransactionKind, TransactionRecord, UserSummary,
};
use super::store::{AccountStore, check_transfer_args};
use crate::catalog::DEFAULT_MERCH;
use crate::error::LedgerError;

#[derive(Debug, Clone)]
struct StoredAccount {
    account: Account,
    credential_hash: String,
}

#[derive(Debug, Clone, Default)]
struct MemoryLedger {
    accounts: HashMap<String, StoredAccount>,
    /// (identity, item) -> quantity
    inventory: BTreeMap<(String, String), i64>,
    transactions: Vec<TransactionRecord>,
    next_account_id: i64,
    next_tx_id: i64,
}

impl MemoryLedger {
    fn account_mut(&mut self, identity: &str) -> Option<&mut Account> {
        self.accounts.get_mut(identity).map(|s| &mut s.account)
    }

    fn append(&mut self, from: &str, kind: TransactionKind, amount: i64) -> TransactionRecord {
        self.next_tx_id += 1;
        let record = TransactionRecord {
            tx_id: self.next_tx_id,
            from: from.to_string(),
            kind,
            amount,
            created_at: Utc::now(),
        };
        self.transactions.push(record.clone());
        record
    }

    fn history(&self, identity: &str) -> Vec<TransactionRecord> {
        self.transactions
            .iter()
            .filter(|r| r.from == identity || r.recipient() == Some(identity))
            .cloned()
            .collect()
    }

    fn inventory(&self, identity: &str) -> Vec<InventoryEntry> {
        self.inventory
            .iter()
            .filter(|((owner, _), _)| owner == identity)
            .map(|((_, item), quantity)| InventoryEntry {
                item: item.clone(),
                quantity: *quantity,
            })
            .collect()
    }
}

/// Mutex-guarded [`AccountStore`] for tests and local tooling
pub struct MemoryAccountStore {
    state: Mutex<MemoryLedger>,
    catalog: HashMap<String, i64>,
    /// Fail the ledger append step (after debit/credit were staged)
    fail_append: AtomicBool,
    /// Fail history reads, as a dropped connection would
    fail_history: AtomicBool,
}

impl MemoryAccountStore {
    pub fn new<I, S>(catalog: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        Self {
            state: Mutex::new(MemoryLedger::default()),
            catalog: catalog.into_iter().map(|(n, p)| (n.into(), p)).collect(),
            fail_append: AtomicBool::new(false),
            fail_history: AtomicBool::new(false),
        }
    }

    /// Store with the standard merch catalog
    pub fn with_default_catalog() -> Self {
        Self::new(DEFAULT_MERCH.iter().copied())
    }

    /// Make every subsequent ledger append fail, to exercise rollback
    pub fn set_fail_append(&self, fail: bool) {
        self.fail_append.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent history read fail
    pub fn set_fail_history(&self, fail: bool) {
        self.fail_history.store(fail, Ordering::SeqCst);
    }

    /// Sum of all balances
    pub fn total_balance(&self) -> Result<i64, LedgerError> {
        let state = self.lock()?;
        Ok(state.accounts.values().map(|s| s.account.balance).sum())
    }

    /// Number of ledger lines across all accounts
    pub fn transaction_count(&self) -> Result<usize, LedgerError> {
        Ok(self.lock()?.transactions.len())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryLedger>, LedgerError> {
        self.state
            .lock()
            .map_err(|_| LedgerError::Internal("memory store mutex poisoned".into()))
    }

    /// Run `op` against a scratch copy; commit it only on success.
    fn atomically<T>(
        &self,
        op: impl FnOnce(&mut MemoryLedger) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut state = self.lock()?;
        let mut scratch = state.clone();
        let out = op(&mut scratch)?;
        *state = scratch;
        Ok(out)
    }

    fn check_append(&self) -> Result<(), LedgerError> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(LedgerError::Database("injected ledger append failure".into()));
        }
        Ok(())
    }
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::with_default_catalog()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn account_exists(&self, identity: &str) -> Result<bool, LedgerError> {
        Ok(self.lock()?.accounts.contains_key(identity))
    }

    async fn create_account(
        &self,
        identity: &str,
        credential_hash: &str,
        starting_balance: i64,
    ) -> Result<Account, LedgerError> {
        if starting_balance < 0 {
            return Err(LedgerError::Database(
                "balance check constraint violated".into(),
            ));
        }
        self.atomically(|state| {
            if state.accounts.contains_key(identity) {
                return Err(LedgerError::Conflict(identity.to_string()));
            }
            state.next_account_id += 1;
            let account = Account {
                account_id: state.next_account_id,
                identity: identity.to_string(),
                balance: starting_balance,
                created_at: Utc::now(),
            };
            state.accounts.insert(
                identity.to_string(),
                StoredAccount {
                    account: account.clone(),
                    credential_hash: credential_hash.to_string(),
                },
            );
            Ok(account)
        })
    }

    async fn credential_hash(&self, identity: &str) -> Result<String, LedgerError> {
        self.lock()?
            .accounts
            .get(identity)
            .map(|s| s.credential_hash.clone())
            .ok_or_else(|| LedgerError::AccountNotFound(identity.to_string()))
    }

    async fn balance(&self, identity: &str) -> Result<i64, LedgerError> {
        self.lock()?
            .accounts
            .get(identity)
            .map(|s| s.account.balance)
            .ok_or_else(|| LedgerError::AccountNotFound(identity.to_string()))
    }

    async fn inventory(&self, identity: &str) -> Result<Vec<InventoryEntry>, LedgerError> {
        let state = self.lock()?;
        if !state.accounts.contains_key(identity) {
            return Err(LedgerError::AccountNotFound(identity.to_string()));
        }
        Ok(state.inventory(identity))
    }

    async fn transaction_history(
        &self,
        identity: &str,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(LedgerError::Database("injected history read failure".into()));
        }
        let state = self.lock()?;
        if !state.accounts.contains_key(identity) {
            return Err(LedgerError::AccountNotFound(identity.to_string()));
        }
        Ok(state.history(identity))
    }

    async fn summary(&self, identity: &str) -> Result<UserSummary, LedgerError> {
        // One guard for the whole read is the snapshot
        let state = self.lock()?;
        let coins = state
            .accounts
            .get(identity)
            .map(|s| s.account.balance)
            .ok_or_else(|| LedgerError::AccountNotFound(identity.to_string()))?;

        Ok(UserSummary {
            coins,
            inventory: state.inventory(identity),
            coin_history: CoinHistory::from_records(identity, &state.history(identity)),
        })
    }

    async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: i64,
    ) -> Result<TransactionRecord, LedgerError> {
        check_transfer_args(from, to, amount)?;

        self.atomically(|state| {
            let source = state
                .account_mut(from)
                .ok_or_else(|| LedgerError::AccountNotFound(from.to_string()))?;
            if source.balance < amount {
                return Err(LedgerError::InsufficientBalance);
            }
            source.balance -= amount;

            let destination = state
                .account_mut(to)
                .ok_or_else(|| LedgerError::RecipientNotFound(to.to_string()))?;
            destination.balance = destination
                .balance
                .checked_add(amount)
                .ok_or_else(|| LedgerError::Internal("balance overflow".into()))?;

            self.check_append()?;
            Ok(state.append(from, TransactionKind::Transfer { to: to.to_string() }, amount))
        })
    }

    async fn purchase(&self, identity: &str, item: &str) -> Result<TransactionRecord, LedgerError> {
        let price = *self
            .catalog
            .get(item)
            .ok_or_else(|| LedgerError::ItemNotFound(item.to_string()))?;

        self.atomically(|state| {
            let account = state
                .account_mut(identity)
                .ok_or_else(|| LedgerError::AccountNotFound(identity.to_string()))?;
            if account.balance < price {
                return Err(LedgerError::InsufficientBalance);
            }
            account.balance -= price;

            *state
                .inventory
                .entry((identity.to_string(), item.to_string()))
                .or_insert(0) += 1;

            self.check_append()?;
            Ok(state.append(
                identity,
                TransactionKind::Purchase {
                    item: item.to_string(),
                },
                price,
            ))
        })
    }
}
