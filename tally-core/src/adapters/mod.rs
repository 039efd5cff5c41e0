//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - JSON files under file locks for the DocumentStore port
//! - DuckDB for the RemoteStore port
//! - In-memory store and recording dispatcher for tests and dry runs

pub mod duckdb;
pub mod file_store;
pub mod memory;
