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

use crate::iblt::CellHasher;

/// Appended to every element before it is folded into an id sum, so that
/// trailing zero bytes of the element survive zero-extended XOR.
const ID_TERMINATOR: u8 = 0x01;

/// One slot of an [`InvertibleBloomTable`](super::InvertibleBloomTable).
///
/// A cell accumulates, by XOR, the encoded ids and the checksums of every
/// element routed to it, together with a signed count. The id sum is kept in
/// canonical form (no trailing zero byte), which makes cell XOR an exact group
/// operation: `Cell::xor(&c, &c)` is always the empty cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Cell {
    id_sum: Vec<u8>,
    hash_sum: u64,
    count: i64,
}

impl Cell {
    /// Returns the empty cell, the identity of [`Cell::xor`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a cell from raw parts.
    ///
    /// Returns `None` when `id_sum` is not canonical, i.e. ends with a zero byte.
    pub fn from_parts(id_sum: Vec<u8>, hash_sum: u64, count: i64) -> Option<Self> {
        if id_sum.last() == Some(&0) {
            return None;
        }
        Some(Self {
            id_sum,
            hash_sum,
            count,
        })
    }

    /// The contribution of a single element with the given multiplicity.
    pub(super) fn for_element(element: &[u8], hash: u64, count: i64) -> Self {
        let mut id_sum = Vec::with_capacity(element.len() + 1);
        id_sum.extend_from_slice(element);
        id_sum.push(ID_TERMINATOR);
        Self {
            id_sum,
            hash_sum: hash,
            count,
        }
    }

    /// Folds `element` into this cell and increments the count.
    pub fn add(&mut self, element: &[u8], hash: u64) {
        self.toggle(element, hash);
        self.count += 1;
    }

    /// Folds `element` out of this cell and decrements the count.
    pub fn remove(&mut self, element: &[u8], hash: u64) {
        self.toggle(element, hash);
        self.count -= 1;
    }

    /// Cell-wise difference: ids and checksums are XORed, counts subtracted.
    ///
    /// After a subtraction a positive count means a surplus on the `a` side
    /// and a negative count a surplus on the `b` side.
    pub fn xor(a: &Cell, b: &Cell) -> Cell {
        let mut out = a.clone();
        out.xor_assign(b);
        out
    }

    pub(super) fn xor_assign(&mut self, other: &Cell) {
        xor_bytes(&mut self.id_sum, &other.id_sum);
        self.hash_sum ^= other.hash_sum;
        self.count -= other.count;
    }

    /// Returns true if this cell is the identity element.
    pub fn is_empty(&self) -> bool {
        self.id_sum.is_empty() && self.hash_sum == 0 && self.count == 0
    }

    /// Returns true if this cell verifiably holds exactly one element.
    pub fn is_pure<H: CellHasher>(&self, hasher: &H, seed: u64) -> bool {
        self.pure_element(hasher, seed).is_some()
    }

    /// Returns the single element held by this cell, if it is pure.
    pub(super) fn pure_element<H: CellHasher>(&self, hasher: &H, seed: u64) -> Option<&[u8]> {
        if self.count != 1 && self.count != -1 {
            return None;
        }
        let element = self.encoded_element()?;
        (hasher.hash(element, seed) == self.hash_sum).then_some(element)
    }

    /// Returns true if this cell's id sum is exactly `element`.
    pub(super) fn holds_id(&self, element: &[u8]) -> bool {
        self.encoded_element() == Some(element)
    }

    /// The accumulated ids, in canonical encoded form.
    pub fn id_sum(&self) -> &[u8] {
        &self.id_sum
    }

    /// The accumulated checksums.
    pub fn hash_sum(&self) -> u64 {
        self.hash_sum
    }

    /// The net number of elements routed to this cell.
    pub fn count(&self) -> i64 {
        self.count
    }

    fn encoded_element(&self) -> Option<&[u8]> {
        match self.id_sum.split_last() {
            Some((&ID_TERMINATOR, element)) => Some(element),
            _ => None,
        }
    }

    fn toggle(&mut self, element: &[u8], hash: u64) {
        let needed = element.len() + 1;
        if self.id_sum.len() < needed {
            self.id_sum.resize(needed, 0);
        }
        for (acc, b) in self.id_sum.iter_mut().zip(element) {
            *acc ^= b;
        }
        self.id_sum[element.len()] ^= ID_TERMINATOR;
        trim_trailing_zeros(&mut self.id_sum);
        self.hash_sum ^= hash;
    }
}

/// XOR of two byte strings, the shorter one zero-extended.
fn xor_bytes(acc: &mut Vec<u8>, other: &[u8]) {
    if acc.len() < other.len() {
        acc.resize(other.len(), 0);
    }
    for (a, b) in acc.iter_mut().zip(other) {
        *a ^= b;
    }
    trim_trailing_zeros(acc);
}

fn trim_trailing_zeros(bytes: &mut Vec<u8>) {
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
}
