//! Data models for accounts, inventory and the coin ledger

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Account row (credential hash deliberately not carried here)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub account_id: i64,
    pub identity: String,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

/// Catalog item owned by the catalog collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogItem {
    pub name: String,
    pub price: i64,
}

/// One (account, item) inventory line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    #[serde(rename = "type")]
    pub item: String,
    pub quantity: i64,
}

/// What a ledger line moved coins into
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionKind {
    /// Coins credited to another account
    Transfer { to: String },
    /// Coins spent on one unit of a catalog item
    Purchase { item: String },
}

/// Immutable, append-only ledger line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub tx_id: i64,
    pub from: String,
    #[serde(flatten)]
    pub kind: TransactionKind,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Destination account, if this line is a transfer
    pub fn recipient(&self) -> Option<&str> {
        match &self.kind {
            TransactionKind::Transfer { to } => Some(to),
            TransactionKind::Purchase { .. } => None,
        }
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self.kind, TransactionKind::Transfer { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedCoins {
    pub from_user: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentCoins {
    pub to_user: String,
    pub amount: i64,
}

/// Transfers split by direction, each in order of occurrence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoinHistory {
    pub received: Vec<ReceivedCoins>,
    pub sent: Vec<SentCoins>,
}

/// Balance, inventory and coin history read from one snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub coins: i64,
    pub inventory: Vec<InventoryEntry>,
    pub coin_history: CoinHistory,
}

impl CoinHistory {
    /// Split a per-account ledger (oldest first) into sent/received transfers.
    /// Purchases are not coin history.
    pub fn from_records(identity: &str, records: &[TransactionRecord]) -> Self {
        let mut history = CoinHistory::default();
        for record in records {
            let Some(to) = record.recipient() else {
                continue;
            };
            if record.from == identity {
                history.sent.push(SentCoins {
                    to_user: to.to_string(),
                    amount: record.amount,
                });
            } else if to == identity {
                history.received.push(ReceivedCoins {
                    from_user: record.from.clone(),
                    amount: record.amount,
                });
            }
        }
        history
    }
}
