//! Current (version 2) record format.
//!
//! Every record is a fixed 128-byte block:
//!
//! ```text
//! [version u8 = 2][flags u8][filler 2]
//! [identifier 12]
//! [rs1 valid-thru i64 LE][rs1 data 32]
//! [rs2 valid-thru i64 LE][rs2 data 32]
//! [trusted MitM key 32]
//! ```
//!
//! A valid-thru of `-1` means the secret never expires, `0` means it has
//! already expired, anything else is an absolute Unix time in seconds.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::legacy::LegacyRecord;
use super::zid::{Zid, ZID_LEN};
use crate::error::{CacheError, Result};

// ── Layout constants ──────────────────────────────────────────────────────────

/// Length of a retained secret (and of the MitM key) in bytes.
pub const RS_LEN: usize = 32;

/// Length of one current-format record in bytes.
pub const RECORD_LEN: usize = 128;

/// Format marker stored in the first byte of every current-format record.
pub const CURRENT_VERSION: u8 = 2;

const VERSION_OFFSET: usize = 0;
const FLAGS_OFFSET: usize = 1;
const ZID_OFFSET: usize = 4;
const RS1_THRU_OFFSET: usize = ZID_OFFSET + ZID_LEN;
const RS1_OFFSET: usize = RS1_THRU_OFFSET + 8;
const RS2_THRU_OFFSET: usize = RS1_OFFSET + RS_LEN;
const RS2_OFFSET: usize = RS2_THRU_OFFSET + 8;
const MITM_OFFSET: usize = RS2_OFFSET + RS_LEN;

// ── Flag bits ─────────────────────────────────────────────────────────────────

/// Record holds usable data.
pub const FLAG_VALID: u8 = 0x01;
/// Peer's SAS was confirmed out-of-band.
pub const FLAG_SAS_VERIFIED: u8 = 0x02;
/// RS1 slot holds a retained secret.
pub const FLAG_RS1_VALID: u8 = 0x04;
/// RS2 slot holds a retained secret.
pub const FLAG_RS2_VALID: u8 = 0x08;
/// The trusted MitM key slot is populated.
pub const FLAG_MITM_KEY: u8 = 0x10;
/// Record is the cache's own-identity header.
pub const FLAG_OWN_ZID: u8 = 0x20;

/// Valid-thru marker for a secret that never expires.
pub const VALID_FOREVER: i64 = -1;
/// Valid-thru marker for a secret that has already expired.
pub const VALID_EXPIRED: i64 = 0;

/// How long a newly retained secret stays usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Never expires.
    Forever,
    /// Stored but already expired.
    Expired,
    /// Expires this many seconds from now.
    Seconds(u32),
}

impl Retention {
    /// Resolve to the absolute valid-thru value stored on disk.
    pub fn valid_thru(self, now: i64) -> i64 {
        match self {
            Retention::Forever => VALID_FOREVER,
            Retention::Expired => VALID_EXPIRED,
            Retention::Seconds(0) => VALID_EXPIRED,
            Retention::Seconds(n) => now + i64::from(n),
        }
    }
}

fn not_expired_at(valid_thru: i64, now: i64) -> bool {
    match valid_thru {
        VALID_FOREVER => true,
        VALID_EXPIRED => false,
        t => now <= t,
    }
}

// ── ZidRecord ─────────────────────────────────────────────────────────────────

/// In-memory form of one current-format record.
///
/// Secret slots are zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ZidRecord {
    flags: u8,
    #[zeroize(skip)]
    zid: Zid,
    rs1_valid_thru: i64,
    rs1: [u8; RS_LEN],
    rs2_valid_thru: i64,
    rs2: [u8; RS_LEN],
    mitm_key: [u8; RS_LEN],
}

impl Default for ZidRecord {
    fn default() -> Self {
        Self::empty(0, Zid::default())
    }
}

impl ZidRecord {
    fn empty(flags: u8, zid: Zid) -> Self {
        Self {
            flags,
            zid,
            rs1_valid_thru: VALID_EXPIRED,
            rs1: [0; RS_LEN],
            rs2_valid_thru: VALID_EXPIRED,
            rs2: [0; RS_LEN],
            mitm_key: [0; RS_LEN],
        }
    }

    /// Header record naming the cache's own identity.
    pub fn own(zid: Zid) -> Self {
        Self::empty(FLAG_OWN_ZID, zid)
    }

    /// Freshly allocated peer record: valid, empty secrets.
    pub fn peer(zid: Zid) -> Self {
        Self::empty(FLAG_VALID, zid)
    }

    /// Map a legacy own record to the current header shape.
    pub fn header_from_legacy(legacy: &LegacyRecord) -> Self {
        Self::own(legacy.zid())
    }

    /// Map a legacy peer record to the current format.
    ///
    /// RS1 and RS2 keep their slots; each is marked valid only if the legacy
    /// record flagged it, and carried secrets never expire.
    pub fn peer_from_legacy(legacy: &LegacyRecord) -> Self {
        let mut rec = Self::peer(legacy.zid());
        if legacy.is_sas_verified() {
            rec.set_sas_verified();
        }
        rec.rs1 = *legacy.rs1();
        rec.rs2 = *legacy.rs2();
        if legacy.is_rs1_valid() {
            rec.flags |= FLAG_RS1_VALID;
            rec.rs1_valid_thru = VALID_FOREVER;
        }
        if legacy.is_rs2_valid() {
            rec.flags |= FLAG_RS2_VALID;
            rec.rs2_valid_thru = VALID_FOREVER;
        }
        rec
    }

    // ── Codec ─────────────────────────────────────────────────────────────────

    /// Interpret a record-sized block. No validation beyond length; callers
    /// check [`is_valid`](Self::is_valid) and [`is_own_zid`](Self::is_own_zid).
    pub fn decode(bytes: &[u8; RECORD_LEN]) -> Self {
        let mut zid = [0u8; ZID_LEN];
        zid.copy_from_slice(&bytes[ZID_OFFSET..ZID_OFFSET + ZID_LEN]);

        let mut rec = Self::empty(bytes[FLAGS_OFFSET], Zid::from_bytes(zid));
        rec.rs1_valid_thru = LittleEndian::read_i64(&bytes[RS1_THRU_OFFSET..RS1_OFFSET]);
        rec.rs2_valid_thru = LittleEndian::read_i64(&bytes[RS2_THRU_OFFSET..RS2_OFFSET]);
        rec.rs1.copy_from_slice(&bytes[RS1_OFFSET..RS1_OFFSET + RS_LEN]);
        rec.rs2.copy_from_slice(&bytes[RS2_OFFSET..RS2_OFFSET + RS_LEN]);
        rec.mitm_key
            .copy_from_slice(&bytes[MITM_OFFSET..MITM_OFFSET + RS_LEN]);
        rec
    }

    /// Length-checked variant of [`decode`](Self::decode).
    ///
    /// # Errors
    ///
    /// Returns `CacheError::InvalidRecordLength` unless `bytes` is exactly
    /// [`RECORD_LEN`] long.
    pub fn try_decode(bytes: &[u8]) -> Result<Self> {
        let block: &[u8; RECORD_LEN] =
            bytes.try_into().map_err(|_| CacheError::InvalidRecordLength {
                expected: RECORD_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self::decode(block))
    }

    /// Produce the canonical on-disk block.
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[VERSION_OFFSET] = CURRENT_VERSION;
        buf[FLAGS_OFFSET] = self.flags;
        buf[ZID_OFFSET..ZID_OFFSET + ZID_LEN].copy_from_slice(self.zid.as_bytes());
        LittleEndian::write_i64(&mut buf[RS1_THRU_OFFSET..RS1_OFFSET], self.rs1_valid_thru);
        buf[RS1_OFFSET..RS1_OFFSET + RS_LEN].copy_from_slice(&self.rs1);
        LittleEndian::write_i64(&mut buf[RS2_THRU_OFFSET..RS2_OFFSET], self.rs2_valid_thru);
        buf[RS2_OFFSET..RS2_OFFSET + RS_LEN].copy_from_slice(&self.rs2);
        buf[MITM_OFFSET..MITM_OFFSET + RS_LEN].copy_from_slice(&self.mitm_key);
        buf
    }

    // ── Identifier and flags ──────────────────────────────────────────────────

    pub fn zid(&self) -> Zid {
        self.zid
    }

    pub fn set_zid(&mut self, zid: Zid) {
        self.zid = zid;
    }

    /// Raw flag byte, including bits this version does not interpret.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn is_own_zid(&self) -> bool {
        self.flags & FLAG_OWN_ZID != 0
    }

    pub fn is_valid(&self) -> bool {
        self.flags & FLAG_VALID != 0
    }

    pub fn set_valid(&mut self) {
        self.flags |= FLAG_VALID;
    }

    pub fn is_sas_verified(&self) -> bool {
        self.flags & FLAG_SAS_VERIFIED != 0
    }

    pub fn set_sas_verified(&mut self) {
        self.flags |= FLAG_SAS_VERIFIED;
    }

    pub fn reset_sas_verified(&mut self) {
        self.flags &= !FLAG_SAS_VERIFIED;
    }

    // ── Retained secrets ──────────────────────────────────────────────────────

    pub fn rs1(&self) -> &[u8; RS_LEN] {
        &self.rs1
    }

    pub fn rs2(&self) -> &[u8; RS_LEN] {
        &self.rs2
    }

    /// Overwrite the RS1 slot. Does not change any flag.
    pub fn set_rs1(&mut self, secret: &[u8; RS_LEN]) {
        self.rs1 = *secret;
    }

    /// Overwrite the RS2 slot. Does not change any flag.
    pub fn set_rs2(&mut self, secret: &[u8; RS_LEN]) {
        self.rs2 = *secret;
    }

    pub fn is_rs1_valid(&self) -> bool {
        self.flags & FLAG_RS1_VALID != 0
    }

    pub fn is_rs2_valid(&self) -> bool {
        self.flags & FLAG_RS2_VALID != 0
    }

    pub fn rs1_valid_thru(&self) -> i64 {
        self.rs1_valid_thru
    }

    pub fn rs2_valid_thru(&self) -> i64 {
        self.rs2_valid_thru
    }

    /// Retain a new secret: RS1 (with its validity and expiry) moves to RS2,
    /// then `secret` becomes the valid RS1.
    pub fn set_new_rs1(&mut self, secret: &[u8; RS_LEN], retention: Retention) {
        self.rs2 = self.rs1;
        self.rs2_valid_thru = self.rs1_valid_thru;
        if self.is_rs1_valid() {
            self.flags |= FLAG_RS2_VALID;
        } else {
            self.flags &= !FLAG_RS2_VALID;
        }

        self.rs1 = *secret;
        self.rs1_valid_thru = retention.valid_thru(crate::time::now_secs());
        self.flags |= FLAG_RS1_VALID;
    }

    pub fn is_rs1_not_expired(&self) -> bool {
        self.rs1_not_expired_at(crate::time::now_secs())
    }

    pub fn is_rs2_not_expired(&self) -> bool {
        self.rs2_not_expired_at(crate::time::now_secs())
    }

    /// Expiry check of RS1 against an explicit clock reading.
    pub fn rs1_not_expired_at(&self, now: i64) -> bool {
        not_expired_at(self.rs1_valid_thru, now)
    }

    /// Expiry check of RS2 against an explicit clock reading.
    pub fn rs2_not_expired_at(&self, now: i64) -> bool {
        not_expired_at(self.rs2_valid_thru, now)
    }

    // ── Trusted MitM key ──────────────────────────────────────────────────────

    pub fn set_mitm_key(&mut self, key: &[u8; RS_LEN]) {
        self.mitm_key = *key;
        self.flags |= FLAG_MITM_KEY;
    }

    pub fn mitm_key(&self) -> Option<&[u8; RS_LEN]> {
        if self.flags & FLAG_MITM_KEY != 0 {
            Some(&self.mitm_key)
        } else {
            None
        }
    }
}

impl fmt::Debug for ZidRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZidRecord")
            .field("zid", &self.zid)
            .field("flags", &format_args!("{:#04x}", self.flags))
            .field("rs1_valid_thru", &self.rs1_valid_thru)
            .field("rs2_valid_thru", &self.rs2_valid_thru)
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
