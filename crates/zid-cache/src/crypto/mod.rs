//! Cryptographic primitives for the ZID cache.
//!
//! Only identity generation lives here; the key-agreement protocol that
//! produces retained secrets is outside this crate.

pub mod random;
