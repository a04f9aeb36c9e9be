//! The behaviour contracts that a storage backend must implement to power the voucher payment engine.
//!
//! Backends (currently SQLite only) implement these traits; everything above them — the public API in
//! [`crate::vpe_api`] and the HTTP server — is backend-agnostic.
mod allocation_database;
mod data_objects;

pub use allocation_database::{AllocationDatabase, AllocationError};
pub use data_objects::{AllocationOutcome, DrainSummary, StockLevel, UploadSummary, VoucherCounts};
