//! Ingestion pipeline for Newsdesk.
//!
//! This crate ties the publisher adapters and the content store together:
//! dedup against persisted ids, bounded-concurrency fetching, text
//! normalization, optional summarization, and the per-source orchestrator
//! that sequences them (`Orchestrator::run`).

pub mod dedup;
pub mod enrichment;
pub mod fetch_pool;
pub mod normalize;
pub mod pipeline;
