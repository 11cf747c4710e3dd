//! Domain models for the Kapok control plane.
//!
//! These are the core types shared across all crates.

pub mod audit;
pub mod migration;
pub mod quota;
pub mod tenant;
pub mod usage;
