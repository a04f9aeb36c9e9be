//! Voucher Payment Server
//!
//! The HTTP surface of the voucher shop: payment initiation and reconciliation (browser, webhook and USSD), public
//! stock and retrieval endpoints, and the operator API. All fulfilment decisions are delegated to
//! `voucher_payment_engine`; this crate only adapts providers and transports onto it.
pub mod admin_routes;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod moolre_routes;
pub mod reconcile;
pub mod routes;
pub mod server;
pub mod ussd_routes;

#[cfg(test)]
mod endpoint_tests;
