//! ZID — the 12-byte identifier naming a party in the key agreement.

use std::fmt;
use std::str::FromStr;

use crate::error::CacheError;

/// Length of a ZID in bytes.
pub const ZID_LEN: usize = 12;

/// Opaque identifier of the cache owner or of a peer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Zid([u8; ZID_LEN]);

impl Zid {
    /// Wrap raw identifier bytes.
    pub const fn from_bytes(bytes: [u8; ZID_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random identifier.
    pub fn random() -> Self {
        crate::crypto::random::random_zid()
    }

    /// Return the raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; ZID_LEN] {
        &self.0
    }

    /// True if every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl From<[u8; ZID_LEN]> for Zid {
    fn from(bytes: [u8; ZID_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Zid {
    type Error = CacheError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; ZID_LEN] = bytes.try_into().map_err(|_| {
            CacheError::InvalidZid(format!("expected {ZID_LEN} bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }
}

impl FromStr for Zid {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| CacheError::InvalidZid(format!("invalid hex '{s}': {e}")))?;
        Self::try_from(bytes.as_slice())
    }
}

impl fmt::Display for Zid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Zid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Zid({self})")
    }
}
