//! service-core: Shared infrastructure for propstack services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
