//! The multi-tier code-validation stack (§2 component 2-5, §4.1-4.5): local
//! core-code tables, a TTL+LRU cache, version-aware server routing, a direct
//! HTTP terminology client, and a batch validator tying them together with
//! deduplication, bounded parallelism, and in-flight request sharing.

pub mod batch;
pub mod cache;
pub mod client;
pub mod core_tables;
pub mod external;
pub mod router;

pub use batch::{BatchCodeValidator, BatchValidationResult, CodeValidationOutcome};
pub use cache::{CacheResult, CacheStats, TerminologyCache};
pub use client::{ServerHealth, TerminologyClient, ValidateCodeParams, ValidationResponse};
pub use router::{route, Endpoint};
