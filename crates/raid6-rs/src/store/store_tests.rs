use super::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

const BLOCK_SIZE: usize = 64;
const DATA_LEN: usize = BLOCK_SIZE - HEADER_LEN;

fn mem_store(disks: usize, blocks: usize, max_files: usize) -> FileStore {
    let config = StoreConfig {
        disk_size: (blocks * BLOCK_SIZE) as u64,
        block_size: BLOCK_SIZE,
        max_files: Some(max_files),
        devices: (0..disks).map(|_| DeviceSpec::Mem).collect(),
    };
    let mut store = FileStore::open(config).expect("open");
    store.format().expect("format");
    store
}

fn bytes_of(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random()).collect()
}

/// Walks a file's chain through raw block reads, returning the visited
/// addresses and parsed headers.
fn walk_chain(store: &mut FileStore, name: &str) -> Vec<(BlockAddr, BlockHeader)> {
    let entry = store
        .table
        .lookup(&mut store.volume, name)
        .expect("lookup")
        .expect("file present");
    let mut visited = Vec::new();
    if entry.size == 0 {
        return visited;
    }
    let mut at = entry.head;
    loop {
        let block = store.volume.array().read_block(at.disk, at.block).expect("read");
        let header = BlockHeader::parse(&block);
        visited.push((at, header));
        if header.is_free() || header.terminates_at(at) {
            break;
        }
        at = header.next;
    }
    visited
}

/// Every stripe with stored data must carry the codec's P and Q.
fn assert_parity_invariant(store: &FileStore) {
    let geom = store.geometry();
    for stripe in 0..geom.blocks {
        let placement = store.volume.placement(stripe);
        let mut data = Vec::new();
        for d in 0..geom.disks {
            if placement.is_data(d) {
                data.push(store.volume.array().read_block(d, stripe).expect("read"));
            }
        }
        let p = store.volume.array().read_block(placement.p(), stripe).expect("read");
        let q = store.volume.array().read_block(placement.q(), stripe).expect("read");
        for i in 0..geom.block_size {
            let symbols: Vec<u8> = data.iter().map(|block| block[i]).collect();
            let (pi, qi) = crate::codec::syndrome::encode(&symbols);
            assert_eq!(p[i], pi, "P at stripe {stripe} offset {i}");
            assert_eq!(q[i], qi, "Q at stripe {stripe} offset {i}");
        }
    }
}

fn sha(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

#[test]
fn add_then_read_round_trips() {
    let mut store = mem_store(6, 16, 8);
    let data = bytes_of(3 * DATA_LEN + 7, 1);
    store.add_file("a.bin", &data).expect("add");
    assert_eq!(store.read_file("a.bin").expect("read"), Some(data));
    assert_parity_invariant(&store);
}

#[test]
fn chain_shape_matches_block_accounting() {
    let mut store = mem_store(6, 16, 8);
    let data = bytes_of(3 * DATA_LEN + 7, 2);
    store.add_file("a.bin", &data).expect("add");

    let chain = walk_chain(&mut store, "a.bin");
    assert_eq!(chain.len(), 4, "3 full blocks plus a 7-byte tail");
    for (at, header) in &chain[..3] {
        assert_eq!(header.payload_len as usize, DATA_LEN);
        assert_ne!(header.next, *at, "intermediate blocks link forward");
    }
    let (tail_addr, tail) = chain[3];
    assert_eq!(tail.payload_len, 7);
    assert!(tail.terminates_at(tail_addr), "tail points to itself");
}

#[test]
fn chains_start_after_the_table_and_stay_on_data_disks() {
    let mut store = mem_store(6, 16, 8);
    for (i, name) in ["a", "b", "c"].iter().enumerate() {
        store.add_file(name, &bytes_of(2 * DATA_LEN + 5, 10 + i as u64)).expect("add");
    }

    let marker = store.table.last_block();
    let mut seen = std::collections::HashSet::new();
    for name in ["a", "b", "c"] {
        for (at, _) in walk_chain(&mut store, name) {
            assert!(seen.insert(at), "chains must not share {at:?}");
            let placement = store.volume.placement(at.block);
            assert!(placement.is_data(at.disk), "chains stay off P/Q members");
            assert!(
                at.block > marker.block || (at.block == marker.block && at.disk > marker.disk),
                "chains live after the table marker"
            );
        }
    }
}

#[test]
fn empty_files_take_no_blocks() {
    let mut store = mem_store(6, 16, 8);
    store.add_file("empty", &[]).expect("add");
    assert_eq!(store.read_file("empty").expect("read"), Some(Vec::new()));

    // The head the empty file points at is still free for the next add.
    let data = bytes_of(5, 3);
    store.add_file("tiny", &data).expect("add");
    assert_eq!(store.read_file("tiny").expect("read"), Some(data));
    assert_eq!(store.read_file("empty").expect("read"), Some(Vec::new()));

    store.del_file("empty").expect("del");
    assert_eq!(store.read_file("empty").expect("read"), None);
    assert_eq!(store.read_file("tiny").expect("read").map(|d| d.len()), Some(5));
}

#[test]
fn duplicate_and_invalid_names_are_rejected() {
    let mut store = mem_store(6, 16, 8);
    store.add_file("dup", &bytes_of(10, 4)).expect("add");
    assert_eq!(store.add_file("dup", &bytes_of(10, 5)), Err(RaidError::NameExists));
    assert_eq!(
        store.add_file("this-name-is-far-too-long", &[]),
        Err(RaidError::InvalidArgument)
    );
}

#[test]
fn missing_files_read_as_none() {
    let mut store = mem_store(6, 16, 8);
    assert_eq!(store.read_file("ghost").expect("read"), None);
    store.del_file("ghost").expect("deleting a ghost is a no-op");
}

#[test]
fn delete_zeroes_the_chain_and_frees_the_name() {
    let mut store = mem_store(6, 16, 8);
    let data = bytes_of(2 * DATA_LEN + 9, 6);
    store.add_file("doomed", &data).expect("add");
    let chain: Vec<BlockAddr> = walk_chain(&mut store, "doomed").iter().map(|&(at, _)| at).collect();

    store.del_file("doomed").expect("del");
    assert_eq!(store.read_file("doomed").expect("read"), None);
    for at in chain {
        let block = store.volume.array().read_block(at.disk, at.block).expect("read");
        assert!(block.iter().all(|&b| b == 0), "freed block {at:?} must be zeroed");
    }
    assert_parity_invariant(&store);

    store.add_file("doomed", &bytes_of(3, 7)).expect("name is reusable");
}

#[test]
fn modify_in_place_patches_without_moving() {
    let mut store = mem_store(6, 16, 8);
    let mut oracle = bytes_of(3 * DATA_LEN, 8);
    store.add_file("patchme", &oracle).expect("add");
    let head_before = walk_chain(&mut store, "patchme")[0].0;

    // Replace a range spanning the first two blocks, same length.
    let begin = DATA_LEN - 10;
    let end = DATA_LEN + 20;
    let patch = bytes_of(end - begin, 9);
    store.modify_file("patchme", begin, end, &patch).expect("modify");
    oracle[begin..end].copy_from_slice(&patch);

    assert_eq!(store.read_file("patchme").expect("read"), Some(oracle));
    assert_eq!(walk_chain(&mut store, "patchme")[0].0, head_before, "chain did not move");
    assert_parity_invariant(&store);
}

#[test]
fn modify_resize_splices_the_file() {
    let mut store = mem_store(6, 16, 8);
    let original = bytes_of(2 * DATA_LEN + 4, 10);
    store.add_file("resize", &original).expect("add");

    let begin = 5;
    let end = DATA_LEN + 3;
    let replacement = bytes_of(11, 11);
    store.modify_file("resize", begin, end, &replacement).expect("modify");

    let mut oracle = Vec::new();
    oracle.extend_from_slice(&original[..begin]);
    oracle.extend_from_slice(&replacement);
    oracle.extend_from_slice(&original[end..]);
    assert_eq!(store.read_file("resize").expect("read"), Some(oracle));
    assert_parity_invariant(&store);
}

#[test]
fn modify_validates_its_range() {
    let mut store = mem_store(6, 16, 8);
    store.add_file("ranged", &bytes_of(40, 12)).expect("add");
    assert_eq!(store.modify_file("ranged", 10, 5, &[]), Err(RaidError::InvalidArgument));
    assert_eq!(store.modify_file("ranged", 0, 41, &bytes_of(41, 13)), Err(RaidError::InvalidArgument));
    assert_eq!(store.modify_file("ghost", 0, 0, &[]), Err(RaidError::NameNotFound));
    store.modify_file("ranged", 7, 7, &[]).expect("empty range is a no-op");
}

#[test]
fn out_of_space_unwinds_cleanly() {
    // 4 disks x 4 blocks: 8 data positions, 1 table block, 7 for chains.
    let mut store = mem_store(4, 4, 2);
    assert_eq!(store.max_data_blocks(), 7);

    // Passes the whole-block precheck but runs out mid-chain.
    let too_big = bytes_of(7 * DATA_LEN + 1, 14);
    assert_eq!(store.add_file("big", &too_big), Err(RaidError::OutOfSpace));
    assert_eq!(store.read_file("big").expect("read"), None);
    assert!(store.list_files().expect("ls").is_empty());
    assert_parity_invariant(&store);

    // The unwind left the space usable.
    let fits = bytes_of(6 * DATA_LEN, 15);
    store.add_file("ok", &fits).expect("add");
    assert_eq!(store.read_file("ok").expect("read"), Some(fits));
}

#[test]
fn oversized_files_are_rejected_up_front() {
    let mut store = mem_store(4, 4, 2);
    let huge = bytes_of(8 * BLOCK_SIZE, 16);
    assert_eq!(store.add_file("huge", &huge), Err(RaidError::OutOfSpace));
    assert!(store.list_files().expect("ls").is_empty());
}

#[test]
fn two_disk_failure_reads_back_and_restores() {
    let mut store = mem_store(6, 16, 8);
    let data = bytes_of(3 * DATA_LEN + 7, 17);
    store.add_file("a.bin", &data).expect("add");

    store.fail_disk(0).expect("fail");
    store.fail_disk(3).expect("fail");
    assert_eq!(store.read_file("a.bin").expect("read"), Some(data));
    assert_eq!(store.check_disk(0), Ok(()), "disk 0 restored");
    assert_eq!(store.check_disk(3), Ok(()), "disk 3 restored");
    assert!(store.take_recovery_duration().is_some());
    assert!(store.take_recovery_duration().is_none(), "cleared on read");
    assert_parity_invariant(&store);
}

#[test]
fn writes_succeed_after_implicit_recovery() {
    let mut store = mem_store(6, 16, 8);
    store.add_file("a", &bytes_of(100, 18)).expect("add");
    store.fail_disk(1).expect("fail");

    store.add_file("b", &bytes_of(80, 19)).expect("add recovers then writes");
    assert_eq!(store.check_disk(1), Ok(()));
    assert_eq!(store.read_file("a").expect("read"), Some(bytes_of(100, 18)));
    assert_eq!(store.read_file("b").expect("read"), Some(bytes_of(80, 19)));
    assert_parity_invariant(&store);
}

#[test]
fn corruption_scrub_restores_file_bytes() {
    let mut store = mem_store(6, 16, 8);
    let data = bytes_of(4 * DATA_LEN, 20);
    store.add_file("a.bin", &data).expect("add");

    let (victim, _) = walk_chain(&mut store, "a.bin")[1];
    let mut bad = store.volume.array().read_block(victim.disk, victim.block).expect("read");
    bad[HEADER_LEN + 4] ^= 0x55;
    bad[HEADER_LEN + 30] ^= 0x0f;
    store
        .volume
        .array_mut()
        .write_block(victim.disk, victim.block, &bad, false)
        .expect("inject");

    store.check_and_recover_corruption(victim.block).expect("scrub");
    assert_eq!(store.read_file("a.bin").expect("read"), Some(data));
    assert_parity_invariant(&store);
}

#[test]
fn directory_backed_store_persists_across_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = StoreConfig {
        disk_size: (16 * BLOCK_SIZE) as u64,
        block_size: BLOCK_SIZE,
        max_files: Some(8),
        devices: (0..6)
            .map(|i| DeviceSpec::Dir(dir.path().join(format!("disk_{i}"))))
            .collect(),
    };

    let data = bytes_of(2 * DATA_LEN + 1, 21);
    {
        let mut store = FileStore::open(config.clone()).expect("open");
        store.format().expect("format");
        store.add_file("persist.bin", &data).expect("add");
    }

    let mut store = FileStore::open(config).expect("reopen");
    assert_eq!(store.read_file("persist.bin").expect("read"), Some(data.clone()));

    store.fail_disk(2).expect("fail");
    assert_eq!(store.read_file("persist.bin").expect("read"), Some(data));
    assert_eq!(store.check_disk(2), Ok(()), "disk image rebuilt on disk");
    assert_parity_invariant(&store);
}

#[test]
fn randomized_operations_match_an_oracle() {
    let mut store = mem_store(5, 64, 16);
    let mut oracle: HashMap<String, Vec<u8>> = HashMap::new();
    let mut rng = StdRng::seed_from_u64(0xbadc0de);
    let names: Vec<String> = (0..6).map(|i| format!("file_{i}")).collect();

    for round in 0..120 {
        let name = names[rng.random_range(0..names.len())].clone();
        match rng.random_range(0..10u32) {
            // add
            0..=3 => {
                let data = bytes_of(rng.random_range(0..300), rng.random());
                if oracle.contains_key(&name) {
                    assert_eq!(store.add_file(&name, &data), Err(RaidError::NameExists), "round {round}");
                } else {
                    store.add_file(&name, &data).expect("add");
                    oracle.insert(name, data);
                }
            }
            // delete
            4..=5 => {
                store.del_file(&name).expect("del");
                oracle.remove(&name);
            }
            // modify
            6..=7 => {
                if let Some(content) = oracle.get_mut(&name) {
                    let size = content.len();
                    let begin = rng.random_range(0..=size);
                    let end = rng.random_range(begin..=size);
                    let same_len = rng.random_bool(0.5);
                    let new_len = if same_len { end - begin } else { rng.random_range(0..80) };
                    let patch = bytes_of(new_len, rng.random());
                    store.modify_file(&name, begin, end, &patch).expect("modify");
                    content.splice(begin..end, patch.iter().copied());
                }
            }
            // disk failure, recovered by the next read
            8 => {
                let first = rng.random_range(0..5);
                store.fail_disk(first).expect("fail");
                if rng.random_bool(0.4) {
                    let second = (first + 1 + rng.random_range(0..4)) % 5;
                    store.fail_disk(second).expect("fail");
                }
                store.list_files().expect("recovery");
                assert!(store.take_recovery_duration().is_some(), "round {round}");
            }
            // corruption + scrub
            _ => {
                let geom = store.geometry();
                let disk = rng.random_range(0..geom.disks);
                let block = rng.random_range(0..geom.blocks);
                store.corrupt_block(disk, block).expect("corrupt");
                store.check_and_recover_corruption(block).expect("scrub");
            }
        }

        let mut listed: Vec<String> =
            store.list_files().expect("ls").into_iter().map(|e| e.name).collect();
        listed.sort();
        let mut expected: Vec<String> = oracle.keys().cloned().collect();
        expected.sort();
        assert_eq!(listed, expected, "round {round}");

        let probe = &names[rng.random_range(0..names.len())];
        match (store.read_file(probe).expect("read"), oracle.get(probe)) {
            (Some(stored), Some(expected)) => {
                assert_eq!(sha(&stored), sha(expected), "round {round}: {probe} content");
            }
            (None, None) => {}
            (stored, expected) => {
                panic!("round {round}: {probe} presence mismatch: {:?} vs {:?}", stored.map(|s| s.len()), expected.map(Vec::len));
            }
        }
    }

    assert_parity_invariant(&store);
}
