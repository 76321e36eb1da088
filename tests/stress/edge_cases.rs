//! Edge case tests: corrupt headers, truncated tails, stray own records,
//! unknown versions.

use std::fs::{self, OpenOptions};
use std::io::Write;

use zid_cache::{CacheError, Zid, ZidCache, ZidCacheFile, ZidRecord, RECORD_LEN, ZID_LEN};

fn peer(b: u8) -> Zid {
    Zid::from_bytes([b; ZID_LEN])
}

#[test]
fn edge_truncated_header_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zid.cache");
    let header = ZidRecord::own(peer(1)).encode();
    fs::write(&path, &header[..RECORD_LEN / 2]).unwrap();

    let mut cache = ZidCacheFile::new();
    assert!(matches!(
        cache.open(&path),
        Err(CacheError::InvalidHeader(_))
    ));
    assert!(!cache.is_open());
}

#[test]
fn edge_unknown_version_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zid.cache");
    let mut header = ZidRecord::own(peer(1)).encode();
    header[0] = 9;
    fs::write(&path, header).unwrap();

    let mut cache = ZidCacheFile::new();
    assert!(matches!(
        cache.open(&path),
        Err(CacheError::InvalidHeader(_))
    ));
}

#[test]
fn edge_invalid_header_is_not_auto_healed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zid.cache");
    let bogus = ZidRecord::peer(peer(1)).encode();
    fs::write(&path, bogus).unwrap();

    let mut cache = ZidCacheFile::new();
    assert!(cache.open(&path).is_err());
    assert_eq!(fs::read(&path).unwrap(), bogus.to_vec(), "file untouched");

    // Caller-driven recovery: delete and reopen.
    fs::remove_file(&path).unwrap();
    assert!(cache.open(&path).is_ok());
}

#[test]
fn edge_truncated_tail_is_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zid.cache");

    let mut cache = ZidCacheFile::new();
    cache.open(&path).unwrap();
    cache.lookup_or_create(&peer(1)).unwrap();
    cache.close();

    // Simulate a torn append.
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[2u8; 50]).unwrap();
    drop(file);

    cache.open(&path).unwrap();
    let rec = cache.lookup_or_create(&peer(2)).unwrap();
    assert_eq!(rec.offset(), 2 * RECORD_LEN as u64, "append stays aligned");
    assert_eq!(
        fs::metadata(&path).unwrap().len(),
        3 * RECORD_LEN as u64
    );

    let again = cache.lookup_or_create(&peer(2)).unwrap();
    assert_eq!(again.offset(), rec.offset());
    assert_eq!(cache.peers().unwrap().len(), 2);
}

#[test]
fn edge_stray_own_record_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zid.cache");

    let mut raw = Vec::new();
    raw.extend_from_slice(&ZidRecord::own(peer(1)).encode());
    raw.extend_from_slice(&ZidRecord::own(peer(2)).encode());
    fs::write(&path, raw).unwrap();

    let mut cache = ZidCacheFile::new();
    assert_eq!(cache.open(&path).unwrap(), peer(1));

    // A stray own record never satisfies a peer lookup.
    let rec = cache.lookup_or_create(&peer(2)).unwrap();
    assert!(!rec.is_own_zid());
    assert_eq!(rec.offset(), 2 * RECORD_LEN as u64);
}

#[test]
fn edge_open_failure_leaves_cache_reusable() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("bad.cache");
    fs::write(&bad, ZidRecord::peer(peer(1)).encode()).unwrap();

    let mut cache = ZidCacheFile::new();
    assert!(cache.open(&bad).is_err());

    let good = dir.path().join("good.cache");
    assert!(cache.open(&good).is_ok(), "failed open must not leave it open");
}
