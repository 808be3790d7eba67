//! Analytic-store schema and client.

pub mod client;
pub mod schema;

pub use client::{insert_with_retry, ClickHouseStore, SpotStore};
pub use schema::{NoiseRecord, SpotRecord};
