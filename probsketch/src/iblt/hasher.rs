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

use std::fmt;

use crate::hash::MurmurHash3X64128;

/// The seeded hash family used by an [`InvertibleBloomTable`](super::InvertibleBloomTable).
///
/// Implementations must be pure: the same `(bytes, seed)` always yields the
/// same checksum and the same cover set, in every process. Decoding replays
/// [`indices`](Self::indices) to find the cells a recovered element touches, so
/// two tables can only be compared when they were built with equivalent hashers.
pub trait CellHasher: Clone + fmt::Debug {
    /// Returns the checksum accumulated in a cell's hash sum.
    fn hash(&self, bytes: &[u8], seed: u64) -> u64;

    /// Returns the `num_hashes` distinct cell positions in `[0, num_cells)` that
    /// `bytes` is routed to.
    fn indices(&self, bytes: &[u8], seed: u64, num_hashes: u16, num_cells: usize) -> Vec<usize>;
}

/// The default [`CellHasher`], built on MurmurHash3 x64/128.
///
/// The checksum and the cover set are drawn from two different seeds so the
/// purity check stays independent of cell placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Murmur3CellHasher;

impl CellHasher for Murmur3CellHasher {
    fn hash(&self, bytes: &[u8], seed: u64) -> u64 {
        MurmurHash3X64128::hash(bytes, seed).0
    }

    fn indices(&self, bytes: &[u8], seed: u64, num_hashes: u16, num_cells: usize) -> Vec<usize> {
        let (h1, h2) = MurmurHash3X64128::hash(bytes, seed.wrapping_add(1));
        distinct_indices(h1, h2, num_hashes, num_cells)
    }
}

/// Kirsch-Mitzenmacher double hashing, `(h1 + i * h2) mod m`, with linear
/// probing past positions already taken so that no cell is visited twice.
pub(super) fn distinct_indices(h1: u64, h2: u64, num_hashes: u16, num_cells: usize) -> Vec<usize> {
    let k = usize::from(num_hashes).min(num_cells);
    let mut out = Vec::with_capacity(k);
    for i in 0..k {
        let hash = h1.wrapping_add((i as u64).wrapping_mul(h2));
        let mut index = (hash % num_cells as u64) as usize;
        while out.contains(&index) {
            index = (index + 1) % num_cells;
        }
        out.push(index);
    }
    out
}
