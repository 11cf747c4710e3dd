//! Kapok Core: domain models, repository traits and errors shared by
//! every control-plane crate.

pub mod clock;
pub mod error;
pub mod models;
pub mod repository;

pub use clock::{Clock, SystemClock};
pub use error::{ErrorKind, KapokError, KapokResult};
