//! Merch catalog
//!
//! External collaborator from the ledger's point of view: it answers
//! "does this item exist" and "what does it cost". Prices are positive coins.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::account::CatalogItem;
use crate::db::SafeRow;
use crate::error::LedgerError;

/// Standard merch list, also seeded by the initial migration
pub const DEFAULT_MERCH: &[(&str, i64)] = &[
    ("t-shirt", 80),
    ("cup", 20),
    ("book", 50),
    ("pen", 10),
    ("powerbank", 200),
    ("hoody", 300),
    ("umbrella", 200),
    ("socks", 10),
    ("wallet", 50),
    ("pink-hoody", 500),
];

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn item_exists(&self, name: &str) -> Result<bool, LedgerError>;

    async fn item_price(&self, name: &str) -> Result<Option<i64>, LedgerError>;

    /// All items ordered by name
    async fn items(&self) -> Result<Vec<CatalogItem>, LedgerError>;
}

/// Catalog backed by `catalog_items_tb`
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn item_exists(&self, name: &str) -> Result<bool, LedgerError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM catalog_items_tb WHERE name = $1)",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn item_price(&self, name: &str) -> Result<Option<i64>, LedgerError> {
        let price =
            sqlx::query_scalar::<_, i64>("SELECT price FROM catalog_items_tb WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(price)
    }

    async fn items(&self) -> Result<Vec<CatalogItem>, LedgerError> {
        let rows = sqlx::query("SELECT name, price FROM catalog_items_tb ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        // Skip (and log) malformed rows rather than failing the whole listing
        let items = rows
            .iter()
            .filter_map(|row| {
                Some(CatalogItem {
                    name: row.try_get_log("name")?,
                    price: row.try_get_log("price")?,
                })
            })
            .collect();
        Ok(items)
    }
}

/// Fixed in-process catalog
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    prices: HashMap<String, i64>,
}

impl StaticCatalog {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        Self {
            prices: items.into_iter().map(|(n, p)| (n.into(), p)).collect(),
        }
    }

    pub fn merch() -> Self {
        Self::new(DEFAULT_MERCH.iter().copied())
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn item_exists(&self, name: &str) -> Result<bool, LedgerError> {
        Ok(self.prices.contains_key(name))
    }

    async fn item_price(&self, name: &str) -> Result<Option<i64>, LedgerError> {
        Ok(self.prices.get(name).copied())
    }

    async fn items(&self) -> Result<Vec<CatalogItem>, LedgerError> {
        let mut items: Vec<CatalogItem> = self
            .prices
            .iter()
            .map(|(name, price)| CatalogItem {
                name: name.clone(),
                price: *price,
            })
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }
}
