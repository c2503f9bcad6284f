//! SQL query modules for the PostgreSQL store.
//!
//! Queries are grouped by the records they touch. Each module maps raw row
//! tuples into the domain types from `bistro-storage`.

pub mod catalog;
pub mod floor;
pub mod orders;
pub mod settings;
