// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.


use std::collections::BTreeSet;

use googletest::assert_that;
use googletest::prelude::contains_substring;
use probsketch::error::ErrorKind;
use probsketch::iblt::CellHasher;
use probsketch::iblt::DecodeStatus;
use probsketch::iblt::InvertibleBloomTable;
use probsketch::iblt::Murmur3CellHasher;

fn elements(prefix: &str, count: usize) -> BTreeSet<Vec<u8>> {
    (0..count)
        .map(|i| format!("{prefix}-{i}").into_bytes())
        .collect()
}

fn table_with(num_cells: usize, items: &BTreeSet<Vec<u8>>) -> InvertibleBloomTable {
    let mut table = InvertibleBloomTable::builder()
        .with_size(num_cells, 3)
        .build()
        .unwrap();
    for item in items {
        table.insert(item);
    }
    table
}

#[test]
fn test_self_difference_is_empty() {
    let items = elements("element", 200);
    let table = table_with(30, &items);

    let diff = table.subtract(&table).unwrap();
    assert!(diff.is_empty());

    let result = diff.decode();
    assert_eq!(result.status(), DecodeStatus::Succeeded);
    assert!(result.additional.is_empty());
    assert!(result.missing.is_empty());
    assert!(result.residual.is_empty());
}

#[test]
fn test_decode_within_capacity() {
    let shared = elements("element", 950);
    let extra = elements("extra", 50);

    let local = table_with(75, &shared);
    let mut remote = table_with(75, &shared);
    for item in &extra {
        remote.insert(item);
    }

    let result = local.subtract(&remote).unwrap().decode();
    assert!(result.is_success());
    assert!(result.additional.is_empty());
    assert_eq!(result.missing, extra);

    // swapping the operands swaps the sides
    let result = remote.subtract(&local).unwrap().decode();
    assert!(result.is_success());
    assert_eq!(result.additional, extra);
    assert!(result.missing.is_empty());
}

#[test]
fn test_decode_both_sides() {
    let shared = elements("shared", 500);
    let left = elements("left", 15);
    let right = elements("right", 15);

    let build = |only: &BTreeSet<Vec<u8>>| {
        let mut table = InvertibleBloomTable::builder()
            .with_capacity(40)
            .build()
            .unwrap();
        for item in shared.iter().chain(only) {
            table.insert(item);
        }
        table
    };
    let a = build(&left);
    let b = build(&right);
    assert_eq!(a.num_cells(), 60);

    let result = a.subtract(&b).unwrap().decode();
    assert!(result.is_success());
    assert_eq!(result.additional, left);
    assert_eq!(result.missing, right);
}

#[test]
fn test_decode_over_capacity_fails() {
    let shared = elements("element", 950);
    let extra = elements("extra", 50);

    let local = table_with(9, &shared);
    let mut remote = table_with(9, &shared);
    for item in &extra {
        remote.insert(item);
    }

    let result = local.subtract(&remote).unwrap().decode();
    assert_eq!(result.status(), DecodeStatus::Failed);
    assert!(!result.is_success());
    assert!(!result.residual.is_empty());
    assert!(result.residual.iter().all(|&index| index < 9));
    // whatever was recovered is genuine
    assert!(result.additional.is_empty());
    assert!(result.missing.is_subset(&extra));
}

#[test]
fn test_list_entries() {
    let items: BTreeSet<Vec<u8>> = ["a", "b", "c"]
        .iter()
        .map(|s| s.as_bytes().to_vec())
        .collect();
    let listed = table_with(30, &items).list_entries();
    assert!(listed.is_success());
    assert_eq!(listed.entries, items);
    assert!(listed.removed.is_empty());

    let items = elements("key", 40);
    let mut table = InvertibleBloomTable::builder()
        .with_capacity(40)
        .build()
        .unwrap();
    for item in &items {
        table.insert(item);
    }
    let listed = table.list_entries();
    assert!(listed.is_success());
    assert_eq!(listed.entries, items);
}

#[test]
fn test_list_entries_reports_removed() {
    let mut table = InvertibleBloomTable::builder()
        .with_size(30, 3)
        .build()
        .unwrap();
    table.insert("a");
    table.insert("b");
    table.remove("ghost");

    let listed = table.list_entries();
    assert!(!listed.is_success());
    assert!(listed.residual.is_empty());
    assert_eq!(listed.entries.len(), 2);
    assert!(listed.removed.contains(&b"ghost".to_vec()));
}

#[test]
fn test_list_entries_overloaded() {
    let listed = table_with(9, &elements("element", 100)).list_entries();
    assert!(!listed.is_success());
    assert!(!listed.residual.is_empty());
}

#[test]
fn test_decode_empty_table() {
    let table = InvertibleBloomTable::builder()
        .with_size(3, 3)
        .build()
        .unwrap();
    let result = table.decode();
    assert!(result.is_success());
    assert!(result.additional.is_empty());
}

#[test]
fn test_subtract_incompatible() {
    let a = InvertibleBloomTable::builder()
        .with_size(30, 3)
        .build()
        .unwrap();

    let b = InvertibleBloomTable::builder()
        .with_size(33, 3)
        .build()
        .unwrap();
    let err = a.subtract(&b).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompatibleTables);
    assert_that!(format!("{err}").as_str(), contains_substring("30 vs 33"));

    let b = InvertibleBloomTable::builder()
        .with_size(30, 5)
        .build()
        .unwrap();
    assert_eq!(a.subtract(&b).unwrap_err().kind(), ErrorKind::IncompatibleTables);

    let b = InvertibleBloomTable::builder()
        .with_size(30, 3)
        .seed(1)
        .build()
        .unwrap();
    assert_eq!(a.subtract(&b).unwrap_err().kind(), ErrorKind::IncompatibleTables);
}

/// Routes `x`, `y`, `z` and `w` to overlapping pairs of cells, forming the
/// chain 0-1-2-3-4.
#[derive(Debug, Clone)]
struct ChainHasher;

impl CellHasher for ChainHasher {
    fn hash(&self, bytes: &[u8], seed: u64) -> u64 {
        Murmur3CellHasher.hash(bytes, seed)
    }

    fn indices(&self, bytes: &[u8], seed: u64, num_hashes: u16, num_cells: usize) -> Vec<usize> {
        match bytes {
            b"x" => vec![0, 1],
            b"y" => vec![1, 2],
            b"z" => vec![2, 3],
            b"w" => vec![3, 4],
            _ => Murmur3CellHasher.indices(bytes, seed, num_hashes, num_cells),
        }
    }
}

#[test]
fn test_decode_chain_of_opposite_signs() {
    let build = || {
        InvertibleBloomTable::builder()
            .with_size(5, 2)
            .hasher(ChainHasher)
            .build()
            .unwrap()
    };
    let mut a = build();
    let mut b = build();
    a.insert("x");
    a.insert("z");
    b.insert("y");
    b.insert("w");

    let diff = a.subtract(&b).unwrap();
    // inner cells cancel to a zero count; only the two ends start out pure
    let counts: Vec<i64> = diff.cells().iter().map(|cell| cell.count()).collect();
    assert_eq!(counts, vec![1, 0, 0, 0, -1]);

    let result = diff.decode();
    assert!(result.is_success(), "residual {:?}", result.residual);
    let expected = |items: [&str; 2]| -> BTreeSet<Vec<u8>> {
        items.iter().map(|s| s.as_bytes().to_vec()).collect()
    };
    assert_eq!(result.additional, expected(["x", "z"]));
    assert_eq!(result.missing, expected(["y", "w"]));
}
