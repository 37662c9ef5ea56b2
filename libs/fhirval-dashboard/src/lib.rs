//! §4.13 Dashboard Aggregator: TTL-cached, server-wide validation coverage
//! and success-rate statistics, rebuilt from paged counts against the FHIR
//! server and the latest stored result per resource.

pub mod aggregator;
pub mod cache;

pub use aggregator::{
    ActiveSettingsProvider, CoverageStats, DashboardAggregator, DashboardConfig, DashboardSnapshot, ResourceTypeCount,
};
