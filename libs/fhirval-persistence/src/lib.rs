//! SS 4.8 / SS 6: durable storage for validation results and the fingerprint
//! cache the pipeline reads through. A Postgres-backed store is the
//! production path (mirroring the teacher's `db::store` repository pattern);
//! an in-memory store backs tests and zero-configuration runs.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{PersistenceError, Result};
pub use memory::InMemoryResultStore;
pub use postgres::PostgresResultStore;
pub use store::{FingerprintCacheAdapter, ResultStore};
