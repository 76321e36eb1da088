//! Integration tests: full cache lifecycle as seen by the protocol layer.
//!
//! Open → lookup/create → retain secrets → verify → save → reopen.

use std::path::Path;

use zid_cache::{
    CacheError, Retention, Zid, ZidCache, ZidCacheFile, ZidRecord, RECORD_LEN, RS_LEN, ZID_LEN,
};

fn peer(b: u8) -> Zid {
    Zid::from_bytes([b; ZID_LEN])
}

fn record_count(path: &Path) -> u64 {
    std::fs::metadata(path).unwrap().len() / RECORD_LEN as u64
}

#[test]
fn workflow_fresh_store_has_random_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zid.cache");

    let mut cache = ZidCacheFile::new();
    let own = cache.open(&path).expect("open should create the cache");

    assert!(!own.is_zero(), "own ZID must not be all zero");
    assert_eq!(cache.own_zid().unwrap(), own);

    let raw = std::fs::read(&path).unwrap();
    assert_eq!(raw.len(), RECORD_LEN);
    let header = ZidRecord::try_decode(&raw).unwrap();
    assert!(header.is_own_zid());
    assert_eq!(header.zid(), own);
}

#[test]
fn workflow_two_caches_get_different_identities() {
    let dir = tempfile::tempdir().unwrap();

    let mut a = ZidCacheFile::new();
    let mut b = ZidCacheFile::new();
    let zid_a = a.open(&dir.path().join("a.cache")).unwrap();
    let zid_b = b.open(&dir.path().join("b.cache")).unwrap();

    assert_ne!(zid_a, zid_b);
}

#[test]
fn workflow_reopen_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zid.cache");

    let first = {
        let mut cache = ZidCacheFile::new();
        cache.open(&path).unwrap()
    };
    let mut cache = ZidCacheFile::new();
    let second = cache.open(&path).unwrap();

    assert_eq!(first, second, "identity must survive a restart");
}

#[test]
fn workflow_session_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("zid.cache");

    // Session 1: first contact with the peer.
    let mut cache = ZidCacheFile::new();
    cache.open(&path).unwrap();
    let mut rec = cache.lookup_or_create(&peer(0x42)).unwrap();
    assert!(rec.is_valid());
    assert!(!rec.is_rs1_valid(), "new peer has no retained secret");
    rec.set_new_rs1(&[0x01; RS_LEN], Retention::Forever);
    cache.save(&rec).unwrap();
    cache.close();

    // Session 2: the peer is known; user confirms the SAS.
    cache.open(&path).unwrap();
    let mut rec = cache.lookup_or_create(&peer(0x42)).unwrap();
    assert!(rec.is_rs1_valid());
    assert!(rec.is_rs1_not_expired());
    assert_eq!(rec.rs1(), &[0x01; RS_LEN]);
    rec.set_sas_verified();
    rec.set_new_rs1(&[0x02; RS_LEN], Retention::Seconds(3600));
    cache.save(&rec).unwrap();
    cache.close();

    // Session 3: both secrets and the verification survive.
    cache.open(&path).unwrap();
    let rec = cache.lookup_or_create(&peer(0x42)).unwrap();
    assert!(rec.is_sas_verified());
    assert_eq!(rec.rs1(), &[0x02; RS_LEN]);
    assert_eq!(rec.rs2(), &[0x01; RS_LEN]);
    assert!(rec.is_rs2_valid());

    assert_eq!(record_count(&path), 2, "one header plus one peer");
}

#[test]
fn workflow_create_on_miss_appends_exactly_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zid.cache");

    let mut cache = ZidCacheFile::new();
    cache.open(&path).unwrap();

    for i in 1..=5u8 {
        let rec = cache.lookup_or_create(&peer(i)).unwrap();
        assert_eq!(rec.zid(), peer(i));
        assert_eq!(record_count(&path), 1 + u64::from(i));
    }
    for i in 1..=5u8 {
        cache.lookup_or_create(&peer(i)).unwrap();
    }
    assert_eq!(record_count(&path), 6, "repeat lookups must not append");
}

#[test]
fn workflow_handles_are_bound_to_their_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zid.cache");

    let mut cache = ZidCacheFile::new();
    cache.open(&path).unwrap();
    let stale = cache.lookup_or_create(&peer(1)).unwrap();
    cache.close();

    assert!(matches!(cache.save(&stale), Err(CacheError::NotOpen)));
    cache.open(&path).unwrap();
    assert!(matches!(cache.save(&stale), Err(CacheError::ForeignRecord)));

    let fresh = cache.lookup_or_create(&peer(1)).unwrap();
    assert_eq!(fresh.offset(), stale.offset());
    cache.save(&fresh).unwrap();
}

#[test]
fn workflow_trait_object_usage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zid.cache");

    let mut cache: Box<dyn ZidCache> = Box::new(ZidCacheFile::new());
    let own = cache.open(&path).unwrap();
    assert!(cache.is_open());
    assert_eq!(cache.own_zid().unwrap(), own);

    cache.put_peer_name(&peer(7), "bob").unwrap();
    assert!(cache.peer_name(&peer(7)).is_none());

    cache.close();
    assert!(!cache.is_open());
}
