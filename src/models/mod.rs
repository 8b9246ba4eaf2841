//! Database models and DTOs for all domain entities.

pub mod finding;
pub mod job;
pub mod pagination;
pub mod scan;
pub mod snapshot;
