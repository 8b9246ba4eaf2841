//! Business logic services.

pub mod admin;
pub mod monitor;
pub mod queue;
pub mod scan;
pub mod scoring;
pub mod validation;
pub mod worker;
