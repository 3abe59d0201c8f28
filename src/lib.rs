//! Caching stock quote service.
//!
//! Quotes are fetched lazily from the market-data provider, kept in memory,
//! refreshed periodically in the background and evicted once nobody has asked
//! for them within the idle TTL.

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
