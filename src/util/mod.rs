//! Filesystem helpers.

pub mod atomic;
pub mod sources;
