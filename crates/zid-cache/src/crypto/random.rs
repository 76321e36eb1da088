//! Secure random number generation.
//!
//! Uses the operating system's cryptographic random source via `rand`.

use rand::RngCore;

use crate::record::{Zid, ZID_LEN};

/// Fill a buffer with cryptographically secure random bytes.
pub fn fill_random(buf: &mut [u8]) {
    rand::thread_rng().fill_bytes(buf);
}

/// Generate a fresh random identifier for a newly created cache.
pub fn random_zid() -> Zid {
    let mut buf = [0u8; ZID_LEN];
    fill_random(&mut buf);
    Zid::from_bytes(buf)
}
