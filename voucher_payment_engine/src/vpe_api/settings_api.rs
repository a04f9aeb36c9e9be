use std::fmt::Debug;

use vpg_common::Cedi;

use crate::{
    db_types::VoucherType,
    traits::{AllocationDatabase, AllocationError},
};

/// Stock alerts fire when available vouchers of a type drop to or below this count.
pub const LOW_STOCK_THRESHOLD_KEY: &str = "low_stock_threshold";
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Reads the operator's low stock threshold, falling back to the default when unset or unparseable. Shared by
/// [`SettingsApi`] and the allocation engine's post-fulfilment stock check.
pub(crate) async fn low_stock_threshold<B: AllocationDatabase>(db: &B) -> Result<i64, AllocationError> {
    let value = db.fetch_setting(LOW_STOCK_THRESHOLD_KEY).await?;
    Ok(value.and_then(|v| v.parse::<i64>().ok()).unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD))
}

/// A small typed layer over the operator settings table. Prices are stored per voucher type under `price_<TYPE>`
/// keys, in cedis (e.g. "25.00").
pub struct SettingsApi<B> {
    db: B,
}

impl<B> Debug for SettingsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettingsApi")
    }
}

impl<B> SettingsApi<B>
where B: AllocationDatabase
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, AllocationError> {
        self.db.fetch_setting(key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), AllocationError> {
        self.db.set_setting(key, value).await
    }

    pub async fn all(&self) -> Result<Vec<(String, String)>, AllocationError> {
        self.db.fetch_all_settings().await
    }

    /// The unit price for a voucher type, if the operator has configured one.
    pub async fn price_for(&self, voucher_type: VoucherType) -> Result<Option<Cedi>, AllocationError> {
        let key = format!("price_{voucher_type}");
        let value = self.db.fetch_setting(&key).await?;
        match value {
            Some(v) => {
                let price = v
                    .parse::<Cedi>()
                    .map_err(|e| AllocationError::Validation(format!("Stored price for {voucher_type} is invalid: {e}")))?;
                Ok(Some(price))
            },
            None => Ok(None),
        }
    }

    pub async fn set_price(&self, voucher_type: VoucherType, price: Cedi) -> Result<(), AllocationError> {
        let key = format!("price_{voucher_type}");
        self.db.set_setting(&key, &price.to_decimal_string()).await
    }

    pub async fn low_stock_threshold(&self) -> Result<i64, AllocationError> {
        low_stock_threshold(&self.db).await
    }
}
