//! Loan service
//!
//! Accepts loan applications over HTTP, stores them in PostgreSQL and
//! publishes a `LoanCreatedEvent` for each stored loan.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod repository;
