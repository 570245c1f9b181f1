//! Shared utilities.
//!
//! Content hashing for fingerprints and request keys, plus test helpers.

pub mod hash;

#[cfg(test)]
pub mod testutil;
