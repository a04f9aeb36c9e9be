use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewVoucher, Voucher, VoucherStatus, VoucherType},
    order_objects::VoucherQueryFilter,
    traits::{AllocationDatabase, AllocationError, StockLevel, UploadSummary, VoucherCounts},
};

/// Voucher stock management: uploads, counts and admin overrides.
pub struct StockApi<B> {
    db: B,
}

impl<B> Debug for StockApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StockApi")
    }
}

impl<B> StockApi<B>
where B: AllocationDatabase
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Insert a batch of new vouchers. Serials that already exist are skipped and counted, so re-uploading a file
    /// after a partial failure is safe.
    pub async fn upload(&self, batch: &[NewVoucher]) -> Result<UploadSummary, AllocationError> {
        if batch.is_empty() {
            return Err(AllocationError::Validation("Stock upload batch is empty".to_string()));
        }
        for voucher in batch {
            if voucher.serial.trim().is_empty() || voucher.pin.trim().is_empty() {
                return Err(AllocationError::Validation(
                    "Every stock line needs a non-empty serial and PIN".to_string(),
                ));
            }
        }
        let summary = self.db.upload_vouchers(batch).await?;
        info!("🗃️ Uploaded {} voucher(s), skipped {} duplicate(s)", summary.inserted, summary.skipped);
        Ok(summary)
    }

    pub async fn available(&self, voucher_type: VoucherType) -> Result<i64, AllocationError> {
        self.db.count_available(voucher_type).await
    }

    /// Available counts for every voucher type, for the public stock endpoint.
    pub async fn stock_levels(&self) -> Result<Vec<StockLevel>, AllocationError> {
        let mut levels = Vec::with_capacity(VoucherType::ALL.len());
        for voucher_type in VoucherType::ALL {
            let available = self.db.count_available(voucher_type).await?;
            levels.push(StockLevel { voucher_type, available });
        }
        Ok(levels)
    }

    /// Full per-type status breakdown for the admin dashboard.
    pub async fn voucher_counts(&self) -> Result<Vec<VoucherCounts>, AllocationError> {
        self.db.voucher_counts().await
    }

    /// Vouchers previously sold to a phone number, most recent first. Backs the lost-voucher retrieval flow.
    pub async fn vouchers_for_phone(&self, phone: &str, limit: i64) -> Result<Vec<Voucher>, AllocationError> {
        self.db.fetch_vouchers_for_phone(phone, limit).await
    }

    /// Voucher listing for the admin dashboard, most recent first.
    pub async fn search(&self, filter: VoucherQueryFilter) -> Result<Vec<Voucher>, AllocationError> {
        self.db.search_vouchers(filter).await
    }

    pub async fn set_status(&self, serials: &[String], status: VoucherStatus) -> Result<usize, AllocationError> {
        let updated = self.db.set_voucher_status(serials, status).await?;
        info!("🗃️ Set {updated} voucher(s) to status {status}");
        Ok(updated)
    }

    pub async fn delete(&self, serial: &str) -> Result<bool, AllocationError> {
        let deleted = self.db.delete_voucher(serial).await?;
        if deleted {
            info!("🗃️ Deleted voucher {serial}");
        }
        Ok(deleted)
    }
}
