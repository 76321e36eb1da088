//! File-format detection and the shared record dispatcher.
//!
//! A cache file is either all legacy records or all current records; the
//! first byte of the file decides which.

use std::io::{self, Read};

use super::current::{ZidRecord, RECORD_LEN};
use super::legacy::{LegacyRecord, LEGACY_RECORD_LEN};

/// On-disk layout of a whole cache file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Version 1, 80-byte records.
    Legacy,
    /// Version 2, 128-byte records.
    Current,
}

impl FileFormat {
    /// Classify a file by its first two bytes.
    ///
    /// A zero leading byte is the legacy own record's `rec_valid`; the
    /// current format always starts with its non-zero version marker.
    pub fn detect(lead: &[u8; 2]) -> Self {
        if lead[0] == 0 {
            FileFormat::Legacy
        } else {
            FileFormat::Current
        }
    }

    /// Size of one record in this format.
    pub fn record_len(self) -> usize {
        match self {
            FileFormat::Legacy => LEGACY_RECORD_LEN,
            FileFormat::Current => RECORD_LEN,
        }
    }
}

/// One decoded record of either format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRecord {
    Current(ZidRecord),
    Legacy(LegacyRecord),
}

impl RawRecord {
    /// Decode a block of exactly `format.record_len()` bytes.
    ///
    /// Returns `None` if `block` has the wrong length.
    pub fn decode(format: FileFormat, block: &[u8]) -> Option<Self> {
        match format {
            FileFormat::Current => {
                let block: &[u8; RECORD_LEN] = block.try_into().ok()?;
                Some(RawRecord::Current(ZidRecord::decode(block)))
            }
            FileFormat::Legacy => {
                let block: &[u8; LEGACY_RECORD_LEN] = block.try_into().ok()?;
                Some(RawRecord::Legacy(LegacyRecord::decode(block)))
            }
        }
    }

    /// Read the next record from `reader`.
    ///
    /// Returns `Ok(None)` at end of file. A trailing partial record is also
    /// treated as end of file.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error other than end of file.
    pub fn read_from<R: Read>(reader: &mut R, format: FileFormat) -> io::Result<Option<Self>> {
        let mut buf = [0u8; RECORD_LEN];
        let block = &mut buf[..format.record_len()];
        let n = read_block(reader, block)?;
        if n == 0 {
            return Ok(None);
        }
        if n < block.len() {
            log::warn!(
                "ignoring truncated {:?} record: {} of {} bytes",
                format,
                n,
                block.len()
            );
            return Ok(None);
        }
        Ok(Self::decode(format, block))
    }
}

/// Fill `buf` from `reader`, stopping early only at end of file.
///
/// Returns the number of bytes read.
pub(crate) fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
