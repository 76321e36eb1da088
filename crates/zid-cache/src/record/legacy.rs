//! Legacy (version 1) record format, decoded only to drive migration.
//!
//! Each record is a fixed 80-byte block:
//!
//! ```text
//! [rec_valid u8][own_zid u8][rs1_valid u8][rs2_valid u8]
//! [identifier 12]
//! [rs1 data 32][rs2 data 32]
//! ```
//!
//! The legacy own record carries `rec_valid = 0`, so a legacy file always
//! starts with a zero byte. The SAS-verified bit lives in `rs1_valid`.

use zeroize::{Zeroize, ZeroizeOnDrop};

use super::current::RS_LEN;
use super::zid::{Zid, ZID_LEN};

/// Length of one legacy record in bytes.
pub const LEGACY_RECORD_LEN: usize = 80;

const LEGACY_RS_VALID: u8 = 0x01;
const LEGACY_SAS_VERIFIED: u8 = 0x02;

const ZID_OFFSET: usize = 4;
const RS1_OFFSET: usize = ZID_OFFSET + ZID_LEN;
const RS2_OFFSET: usize = RS1_OFFSET + RS_LEN;

/// Read-only view of one legacy record.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct LegacyRecord {
    rec_valid: u8,
    own_zid: u8,
    rs1_valid: u8,
    rs2_valid: u8,
    #[zeroize(skip)]
    zid: Zid,
    rs1: [u8; RS_LEN],
    rs2: [u8; RS_LEN],
}

impl LegacyRecord {
    pub(crate) fn decode(bytes: &[u8; LEGACY_RECORD_LEN]) -> Self {
        let mut zid = [0u8; ZID_LEN];
        zid.copy_from_slice(&bytes[ZID_OFFSET..RS1_OFFSET]);
        let mut rec = Self {
            rec_valid: bytes[0],
            own_zid: bytes[1],
            rs1_valid: bytes[2],
            rs2_valid: bytes[3],
            zid: Zid::from_bytes(zid),
            rs1: [0; RS_LEN],
            rs2: [0; RS_LEN],
        };
        rec.rs1.copy_from_slice(&bytes[RS1_OFFSET..RS2_OFFSET]);
        rec.rs2.copy_from_slice(&bytes[RS2_OFFSET..LEGACY_RECORD_LEN]);
        rec
    }

    pub fn zid(&self) -> Zid {
        self.zid
    }

    /// True for the header record holding the store's own identity.
    pub fn is_own_zid(&self) -> bool {
        self.own_zid == 1
    }

    pub fn is_valid(&self) -> bool {
        self.rec_valid != 0
    }

    pub fn is_sas_verified(&self) -> bool {
        self.rs1_valid & LEGACY_SAS_VERIFIED != 0
    }

    pub fn is_rs1_valid(&self) -> bool {
        self.rs1_valid & LEGACY_RS_VALID != 0
    }

    pub fn is_rs2_valid(&self) -> bool {
        self.rs2_valid & LEGACY_RS_VALID != 0
    }

    pub fn rs1(&self) -> &[u8; RS_LEN] {
        &self.rs1
    }

    pub fn rs2(&self) -> &[u8; RS_LEN] {
        &self.rs2
    }
}

impl std::fmt::Debug for LegacyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyRecord")
            .field("zid", &self.zid)
            .field("rec_valid", &self.rec_valid)
            .field("own_zid", &self.own_zid)
            .finish_non_exhaustive()
    }
}
