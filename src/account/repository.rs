//! PostgreSQL account store
//!
//! Mutations run inside one transaction with explicit `FOR UPDATE` row locks
//! (read committed + row locks). Summaries run inside a repeatable-read,
//! read-only transaction so every part of the answer comes from one snapshot.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Row};
use tracing::debug;

use super::models::{
    Account, CoinHistory, InventoryEntry, ReceivedCoins, SentCoins, TransactionKind,
    TransactionRecord, UserSummary,
};
use super::store::{AccountStore, check_transfer_args, lock_order};
use crate::error::LedgerError;

/// Row locked for the duration of a ledger transaction
struct LockedAccount {
    account_id: i64,
    balance: i64,
}

/// PostgreSQL-backed [`AccountStore`]
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn lock_account(
    conn: &mut PgConnection,
    identity: &str,
) -> Result<Option<LockedAccount>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT account_id, balance FROM accounts_tb
           WHERE identity = $1
           FOR UPDATE"#,
    )
    .bind(identity)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|r| LockedAccount {
        account_id: r.get("account_id"),
        balance: r.get("balance"),
    }))
}

async fn find_account(
    conn: &mut PgConnection,
    identity: &str,
) -> Result<(i64, i64), LedgerError> {
    let row = sqlx::query("SELECT account_id, balance FROM accounts_tb WHERE identity = $1")
        .bind(identity)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| LedgerError::AccountNotFound(identity.to_string()))?;

    Ok((row.get("account_id"), row.get("balance")))
}

async fn fetch_inventory(
    conn: &mut PgConnection,
    account_id: i64,
) -> Result<Vec<InventoryEntry>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT c.name, i.quantity
           FROM inventory_tb i
           JOIN catalog_items_tb c ON c.item_id = i.item_id
           WHERE i.account_id = $1
           ORDER BY c.name"#,
    )
    .bind(account_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(|r| InventoryEntry {
            item: r.get("name"),
            quantity: r.get("quantity"),
        })
        .collect())
}

async fn fetch_coin_history(
    conn: &mut PgConnection,
    account_id: i64,
) -> Result<CoinHistory, sqlx::Error> {
    let sent = sqlx::query(
        r#"SELECT r.identity AS counterparty, t.amount
           FROM transactions_tb t
           JOIN accounts_tb r ON r.account_id = t.to_account_id
           WHERE t.from_account_id = $1
           ORDER BY t.tx_id"#,
    )
    .bind(account_id)
    .fetch_all(&mut *conn)
    .await?;

    let received = sqlx::query(
        r#"SELECT f.identity AS counterparty, t.amount
           FROM transactions_tb t
           JOIN accounts_tb f ON f.account_id = t.from_account_id
           WHERE t.to_account_id = $1
           ORDER BY t.tx_id"#,
    )
    .bind(account_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(CoinHistory {
        sent: sent
            .iter()
            .map(|r| SentCoins {
                to_user: r.get("counterparty"),
                amount: r.get("amount"),
            })
            .collect(),
        received: received
            .iter()
            .map(|r| ReceivedCoins {
                from_user: r.get("counterparty"),
                amount: r.get("amount"),
            })
            .collect(),
    })
}

#[async_trait]
impl AccountStore for PgAccountStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn account_exists(&self, identity: &str) -> Result<bool, LedgerError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM accounts_tb WHERE identity = $1)",
        )
        .bind(identity)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn create_account(
        &self,
        identity: &str,
        credential_hash: &str,
        starting_balance: i64,
    ) -> Result<Account, LedgerError> {
        let row = sqlx::query(
            r#"INSERT INTO accounts_tb (identity, credential_hash, balance)
               VALUES ($1, $2, $3)
               RETURNING account_id, identity, balance, created_at"#,
        )
        .bind(identity)
        .bind(credential_hash)
        .bind(starting_balance)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                LedgerError::Conflict(identity.to_string())
            }
            other => other.into(),
        })?;

        Ok(Account {
            account_id: row.get("account_id"),
            identity: row.get("identity"),
            balance: row.get("balance"),
            created_at: row.get("created_at"),
        })
    }

    async fn credential_hash(&self, identity: &str) -> Result<String, LedgerError> {
        sqlx::query_scalar::<_, String>(
            "SELECT credential_hash FROM accounts_tb WHERE identity = $1",
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::AccountNotFound(identity.to_string()))
    }

    async fn balance(&self, identity: &str) -> Result<i64, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let (_, balance) = find_account(&mut conn, identity).await?;
        Ok(balance)
    }

    async fn inventory(&self, identity: &str) -> Result<Vec<InventoryEntry>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let (account_id, _) = find_account(&mut conn, identity).await?;
        Ok(fetch_inventory(&mut conn, account_id).await?)
    }

    async fn transaction_history(
        &self,
        identity: &str,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let (account_id, _) = find_account(&mut conn, identity).await?;

        let rows = sqlx::query(
            r#"SELECT t.tx_id, f.identity AS from_identity, r.identity AS to_identity,
                      c.name AS item, t.amount, t.created_at
               FROM transactions_tb t
               JOIN accounts_tb f ON f.account_id = t.from_account_id
               LEFT JOIN accounts_tb r ON r.account_id = t.to_account_id
               LEFT JOIN catalog_items_tb c ON c.item_id = t.item_id
               WHERE t.from_account_id = $1 OR t.to_account_id = $1
               ORDER BY t.tx_id"#,
        )
        .bind(account_id)
        .fetch_all(&mut *conn)
        .await?;

        rows.iter()
            .map(|r| {
                let tx_id: i64 = r.get("tx_id");
                let to: Option<String> = r.get("to_identity");
                let item: Option<String> = r.get("item");
                let kind = match (to, item) {
                    (Some(to), None) => TransactionKind::Transfer { to },
                    (None, Some(item)) => TransactionKind::Purchase { item },
                    _ => {
                        return Err(LedgerError::Database(format!(
                            "ledger line {} has neither a recipient nor an item",
                            tx_id
                        )));
                    }
                };
                Ok(TransactionRecord {
                    tx_id,
                    from: r.get("from_identity"),
                    kind,
                    amount: r.get("amount"),
                    created_at: r.get("created_at"),
                })
            })
            .collect()
    }

    async fn summary(&self, identity: &str) -> Result<UserSummary, LedgerError> {
        let mut tx = self.pool.begin().await?;

        // Must be the first statement of the transaction
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let (account_id, coins) = find_account(&mut tx, identity).await?;
        let inventory = fetch_inventory(&mut tx, account_id).await?;
        let coin_history = fetch_coin_history(&mut tx, account_id).await?;

        tx.commit().await?;

        Ok(UserSummary {
            coins,
            inventory,
            coin_history,
        })
    }

    async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: i64,
    ) -> Result<TransactionRecord, LedgerError> {
        check_transfer_args(from, to, amount)?;

        let mut tx = self.pool.begin().await?;

        // Ascending identity order regardless of direction
        let (first, second) = lock_order(from, to);
        let first_row = lock_account(&mut tx, first).await?;
        let second_row = lock_account(&mut tx, second).await?;
        let (source, destination) = if first == from {
            (first_row, second_row)
        } else {
            (second_row, first_row)
        };

        let Some(source) = source else {
            let _ = tx.rollback().await;
            return Err(LedgerError::AccountNotFound(from.to_string()));
        };
        let Some(destination) = destination else {
            let _ = tx.rollback().await;
            return Err(LedgerError::RecipientNotFound(to.to_string()));
        };

        // Single balance check, after the lock
        if source.balance < amount {
            let _ = tx.rollback().await;
            debug!(from = %from, balance = source.balance, amount, "Transfer rejected: insufficient balance");
            return Err(LedgerError::InsufficientBalance);
        }

        sqlx::query("UPDATE accounts_tb SET balance = balance - $1 WHERE account_id = $2")
            .bind(amount)
            .bind(source.account_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE accounts_tb SET balance = balance + $1 WHERE account_id = $2")
            .bind(amount)
            .bind(destination.account_id)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(
            r#"INSERT INTO transactions_tb (from_account_id, to_account_id, amount)
               VALUES ($1, $2, $3)
               RETURNING tx_id, created_at"#,
        )
        .bind(source.account_id)
        .bind(destination.account_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(TransactionRecord {
            tx_id: row.get("tx_id"),
            from: from.to_string(),
            kind: TransactionKind::Transfer { to: to.to_string() },
            amount,
            created_at: row.get("created_at"),
        })
    }

    async fn purchase(&self, identity: &str, item: &str) -> Result<TransactionRecord, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let Some(account) = lock_account(&mut tx, identity).await? else {
            let _ = tx.rollback().await;
            return Err(LedgerError::AccountNotFound(identity.to_string()));
        };

        // FOR SHARE: the price cannot change under us until commit
        let Some(item_row) = sqlx::query(
            "SELECT item_id, price FROM catalog_items_tb WHERE name = $1 FOR SHARE",
        )
        .bind(item)
        .fetch_optional(&mut *tx)
        .await?
        else {
            let _ = tx.rollback().await;
            return Err(LedgerError::ItemNotFound(item.to_string()));
        };
        let item_id: i32 = item_row.get("item_id");
        let price: i64 = item_row.get("price");

        if account.balance < price {
            let _ = tx.rollback().await;
            debug!(identity = %identity, item = %item, balance = account.balance, price, "Purchase rejected: insufficient balance");
            return Err(LedgerError::InsufficientBalance);
        }

        sqlx::query("UPDATE accounts_tb SET balance = balance - $1 WHERE account_id = $2")
            .bind(price)
            .bind(account.account_id)
            .execute(&mut *tx)
            .await?;

        // Single-statement upsert: no read-then-write window
        sqlx::query(
            r#"INSERT INTO inventory_tb (account_id, item_id, quantity)
               VALUES ($1, $2, 1)
               ON CONFLICT (account_id, item_id)
               DO UPDATE SET quantity = inventory_tb.quantity + EXCLUDED.quantity"#,
        )
        .bind(account.account_id)
        .bind(item_id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            r#"INSERT INTO transactions_tb (from_account_id, item_id, amount)
               VALUES ($1, $2, $3)
               RETURNING tx_id, created_at"#,
        )
        .bind(account.account_id)
        .bind(item_id)
        .bind(price)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(TransactionRecord {
            tx_id: row.get("tx_id"),
            from: identity.to_string(),
            kind: TransactionKind::Purchase {
                item: item.to_string(),
            },
            amount: price,
            created_at: row.get("created_at"),
        })
    }
}
