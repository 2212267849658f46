//! Wire types and local validation shared by the pantry client crates.

pub mod domain;
pub mod error;
pub mod protocol;
