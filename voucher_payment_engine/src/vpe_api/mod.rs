//! # Voucher payment engine public API
//!
//! The `vpe_api` module exposes the programmatic API for the voucher payment engine. The API is modular, so that
//! clients can pick and choose the functionality they need, or run different parts on different machines.
//!
//! * [`allocation_api`] is the primary API. It turns a confirmed payment into exactly one fulfilment, and drains the
//!   backlog after a restock.
//! * [`order_api`] provides read and bookkeeping access to the order ledger.
//! * [`stock_api`] handles voucher stock uploads, counts and admin overrides.
//! * [`session_api`] stores USSD session state between gateway callbacks.
//! * [`settings_api`] is a small typed layer over the operator settings table.
//!
//! # API usage
//!
//! The pattern for all the APIs is the same. An API instance is created by supplying a database backend that
//! implements [`crate::traits::AllocationDatabase`].
//!
//! ```rust,ignore
//! use voucher_payment_engine::{AllocationApi, SqliteDatabase};
//! let db = SqliteDatabase::new(25).await?;
//! let api = AllocationApi::new(db, producers);
//! let outcome = api.allocate(new_order).await?;
//! ```

pub mod allocation_api;
pub mod order_api;
pub mod order_objects;
pub mod session_api;
pub mod settings_api;
pub mod stock_api;
