//! Utility enums and traits shared across the crate.
pub mod enums;
