//! Scale test: many peers in one cache, lookups stay stable.

use std::collections::HashSet;

use zid_cache::{CacheConfig, Retention, Zid, ZidCache, ZidCacheFile, RECORD_LEN, RS_LEN};

fn peer(i: u32) -> Zid {
    let mut bytes = [0u8; 12];
    bytes[..4].copy_from_slice(&i.to_be_bytes());
    bytes[11] = 0x5a;
    Zid::from_bytes(bytes)
}

fn unsynced() -> ZidCacheFile {
    ZidCacheFile::with_config(CacheConfig {
        sync: false,
        ..CacheConfig::default()
    })
}

#[test]
fn stress_500_peers_unique_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zid.cache");

    let mut cache = unsynced();
    cache.open(&path).unwrap();

    let mut offsets = HashSet::new();
    for i in 0..500 {
        let rec = cache.lookup_or_create(&peer(i)).unwrap();
        assert_eq!(rec.offset(), u64::from(i + 1) * RECORD_LEN as u64);
        assert!(offsets.insert(rec.offset()), "duplicate offset for peer {i}");
    }

    // Second pass finds every record where it was created.
    for i in (0..500).rev() {
        let rec = cache.lookup_or_create(&peer(i)).unwrap();
        assert_eq!(rec.offset(), u64::from(i + 1) * RECORD_LEN as u64);
    }
    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        501 * RECORD_LEN as u64
    );
}

#[test]
fn stress_500_peers_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zid.cache");

    let mut cache = unsynced();
    cache.open(&path).unwrap();
    for i in 0..500u32 {
        let mut rec = cache.lookup_or_create(&peer(i)).unwrap();
        rec.set_new_rs1(&[(i % 251) as u8; RS_LEN], Retention::Forever);
        if i % 7 == 0 {
            rec.set_sas_verified();
        }
        cache.save(&rec).unwrap();
    }
    cache.close();

    cache.open(&path).unwrap();
    let peers = cache.peers().unwrap();
    assert_eq!(peers.len(), 500);
    for (i, rec) in peers.iter().enumerate() {
        let i = i as u32;
        assert_eq!(rec.zid(), peer(i));
        assert_eq!(rec.rs1(), &[(i % 251) as u8; RS_LEN]);
        assert_eq!(rec.is_sas_verified(), i % 7 == 0);
    }
}
