//! Transfer Service - accounts, ledger entries and atomic double-entry transfers.

pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
pub mod store;
