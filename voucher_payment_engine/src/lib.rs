//! Voucher Payment Engine
//!
//! The engine turns confirmed mobile-money payments into exactly-once voucher fulfilments. This library contains
//! the core allocation logic and is provider-agnostic.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You should never need to
//!    access the database directly. Instead, use the public API provided by the engine. The exception is the data
//!    types used in the database, which are defined in the `db_types` module and are public.
//! 2. The engine public API ([`mod@vpe_api`]). This provides the public-facing functionality: allocation, the order
//!    ledger, stock management, USSD sessions and operator settings. Backends implement the traits in the `traits`
//!    module to serve these APIs.
//!
//! The engine also provides a set of events that can be subscribed to. These fire on order fulfilment, on entry
//! into the backlog, and when stock runs low, so that SMS delivery and operator alerts stay out of the allocation
//! transaction.
#[cfg(feature = "sqlite")]
mod sqlite;

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;
mod vpe_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use vpe_api::{
    allocation_api::AllocationApi,
    order_api::OrderApi,
    order_objects,
    session_api::SessionApi,
    settings_api::SettingsApi,
    stock_api::StockApi,
};
