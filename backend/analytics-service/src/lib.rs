//! Analytics service
//!
//! Consumes loan-created events from Kafka and projects them into the
//! `analytics_loans` table. Each event is persisted at most once, retried with
//! exponential backoff, and routed to the dead-letter topic once the retry
//! budget is spent. Offsets are committed only after one of those terminal
//! outcomes.

pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod services;
