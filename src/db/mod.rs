//! SQLite persistence for holdings and transaction records.
//!
//! This module provides:
//! - Database initialization and schema application
//! - SQLite pragma configuration
//! - The repository layer over the pool

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
