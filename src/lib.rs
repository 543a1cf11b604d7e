//! Sales Rollup - minute/hour/date sales aggregation engine
//!
//! Folds individual sale records into per-minute, per-hour and per-date
//! rollup documents. Every write is idempotent per sale, so backfills can
//! be re-run at any time without double counting.
//!
//! # Architecture
//! - `aggregation`: Time-key derivation, rollup writer, backfill, ledger and reader
//! - `models`: Sale records and rollup documents
//! - `storage`: Document store abstraction (SeaORM and in-memory backends)
//! - `config`: Configuration management
//! - `runtime`: Application lifecycle and execution modes
//! - `system`: Logging

pub mod aggregation;
pub mod cli;
pub mod config;
pub mod errors;
pub mod models;
pub mod runtime;
pub mod storage;
pub mod system;
