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
use std::collections::VecDeque;

use crate::iblt::Cell;
use crate::iblt::CellHasher;

/// Whether peeling emptied the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeStatus {
    /// Every cell was emptied; the recovered sets are exact.
    Succeeded,
    /// Peeling stalled with non-empty cells left: either more differences than
    /// the table can hold, or a group of colliding elements without a pure cell.
    Failed,
}

/// The outcome of [`InvertibleBloomTable::decode`](super::InvertibleBloomTable::decode).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeResult {
    /// Elements only present in the left-hand table of the subtraction.
    pub additional: BTreeSet<Vec<u8>>,
    /// Elements only present in the right-hand table of the subtraction.
    pub missing: BTreeSet<Vec<u8>>,
    /// Indices of the cells still non-empty when peeling stopped.
    pub residual: Vec<usize>,
}

impl DecodeResult {
    /// Returns whether decoding emptied the table.
    pub fn status(&self) -> DecodeStatus {
        if self.residual.is_empty() {
            DecodeStatus::Succeeded
        } else {
            DecodeStatus::Failed
        }
    }

    /// Returns true if the recovered sets are the complete difference.
    pub fn is_success(&self) -> bool {
        self.status() == DecodeStatus::Succeeded
    }
}

/// The outcome of [`InvertibleBloomTable::list_entries`](super::InvertibleBloomTable::list_entries).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListResult {
    /// Elements recovered from the table.
    pub entries: BTreeSet<Vec<u8>>,
    /// Elements with a net negative count, removed without being inserted.
    pub removed: BTreeSet<Vec<u8>>,
    /// Indices of the cells still non-empty when peeling stopped.
    pub residual: Vec<usize>,
}

impl ListResult {
    /// Returns true if `entries` is exactly the content of the table.
    pub fn is_success(&self) -> bool {
        self.residual.is_empty() && self.removed.is_empty()
    }
}

pub(super) struct PeelOutcome {
    pub(super) positive: BTreeSet<Vec<u8>>,
    pub(super) negative: BTreeSet<Vec<u8>>,
    pub(super) residual: Vec<usize>,
}

/// Peels pure cells off a cell array until none is left.
///
/// Every pure cell identifies one element; removing that element from all the
/// cells of its cover set may in turn make other cells pure. The queue is
/// invalidated lazily: an index is re-checked when popped, not when the cell
/// it points to changes. The final result does not depend on the order in
/// which pure cells are processed.
///
/// Peeling stops after as many peels as there are cells.
pub(super) struct Peeler<'a, H> {
    cells: &'a mut [Cell],
    hasher: &'a H,
    seed: u64,
    num_hashes: u16,
}

impl<'a, H: CellHasher> Peeler<'a, H> {
    pub(super) fn new(cells: &'a mut [Cell], hasher: &'a H, seed: u64, num_hashes: u16) -> Self {
        Self {
            cells,
            hasher,
            seed,
            num_hashes,
        }
    }

    /// Scans every cell once and queues the pure ones.
    pub(super) fn pure_indices(&self) -> VecDeque<usize> {
        (0..self.cells.len())
            .filter(|&index| self.resolve(index).is_some())
            .collect()
    }

    pub(super) fn run(self) -> PeelOutcome {
        let queue = self.pure_indices();
        self.run_from(queue)
    }

    pub(super) fn run_from(mut self, mut queue: VecDeque<usize>) -> PeelOutcome {
        let mut positive = BTreeSet::new();
        let mut negative = BTreeSet::new();

        // Every genuine peel leaves the peeled cell empty for good, so a
        // consistent table never needs more peels than it has cells. Corrupted
        // cells can re-create each other forever; the cap stops them.
        let max_peels = self.cells.len();
        let mut peels = 0;

        while let Some(index) = queue.pop_front() {
            let Some((element, cover)) = self.resolve(index) else {
                continue;
            };
            if peels == max_peels {
                tracing::debug!(index, max_peels, "peel limit reached, giving up");
                break;
            }
            peels += 1;

            let count = self.cells[index].count();
            let hash = self.hasher.hash(&element, self.seed);
            let contribution = Cell::for_element(&element, hash, count);
            for &other in &cover {
                self.cells[other].xor_assign(&contribution);
                if self.resolve(other).is_some() {
                    queue.push_back(other);
                }
            }
            tracing::trace!(index, count, len = element.len(), "peeled cell");

            if count > 0 {
                positive.insert(element);
            } else {
                negative.insert(element);
            }
        }

        let residual = self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(index, _)| index)
            .collect();

        PeelOutcome {
            positive,
            negative,
            residual,
        }
    }

    /// Returns the element held by a pure cell together with its cover set.
    ///
    /// Besides the checksum, the element's cover set must include the cell.
    fn resolve(&self, index: usize) -> Option<(Vec<u8>, Vec<usize>)> {
        let element = self.cells[index].pure_element(self.hasher, self.seed)?;
        let cover = self
            .hasher
            .indices(element, self.seed, self.num_hashes, self.cells.len());
        cover
            .contains(&index)
            .then(|| (element.to_vec(), cover))
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;

    use std::collections::BTreeSet;

    use super::Peeler;
    use crate::iblt::Cell;
    use crate::iblt::CellHasher;
    use crate::iblt::InvertibleBloomTable;
    use crate::iblt::Murmur3CellHasher;

    fn random_difference(
        rng: &mut StdRng,
        shared: usize,
        diff: usize,
        num_cells: usize,
    ) -> InvertibleBloomTable {
        let build = || {
            InvertibleBloomTable::builder()
                .with_size(num_cells, 3)
                .build()
                .unwrap()
        };
        let mut a = build();
        let mut b = build();
        for _ in 0..shared {
            let element = rng.random::<u64>().to_le_bytes();
            a.insert(element);
            b.insert(element);
        }
        for i in 0..diff {
            let element = rng.random::<u64>().to_be_bytes();
            if i % 2 == 0 {
                a.insert(element);
            } else {
                b.insert(element);
            }
        }
        a.subtract(&b).unwrap()
    }

    /// Peels by rescanning the whole table after every step, with no queue and
    /// no cap on the number of peels.
    fn peel_by_rescanning(
        table: &InvertibleBloomTable,
    ) -> (BTreeSet<Vec<u8>>, BTreeSet<Vec<u8>>, Vec<usize>) {
        let mut cells = table.cells().to_vec();
        let hasher = table.hasher();
        let (seed, k, m) = (table.seed(), table.num_hashes(), cells.len());
        let mut positive = BTreeSet::new();
        let mut negative = BTreeSet::new();

        loop {
            let pure = (0..m).find_map(|index| {
                let element = cells[index].pure_element(hasher, seed)?.to_vec();
                let cover = hasher.indices(&element, seed, k, m);
                cover.contains(&index).then_some((index, element, cover))
            });
            let Some((index, element, cover)) = pure else {
                break;
            };
            let count = cells[index].count();
            let contribution = Cell::for_element(&element, hasher.hash(&element, seed), count);
            for other in cover {
                cells[other].xor_assign(&contribution);
            }
            if count > 0 {
                positive.insert(element);
            } else {
                negative.insert(element);
            }
        }

        let residual = (0..m).filter(|&index| !cells[index].is_empty()).collect();
        (positive, negative, residual)
    }

    fn assert_order_independent(table: InvertibleBloomTable, rng: &mut StdRng) {
        let mut reference = table.clone();
        let expected = reference.peeler().run();

        for _ in 0..10 {
            let mut shuffled = table.clone();
            let peeler = shuffled.peeler();
            let mut queue = peeler.pure_indices();
            queue.make_contiguous().shuffle(rng);
            let outcome = peeler.run_from(queue);
            assert_eq!(outcome.positive, expected.positive);
            assert_eq!(outcome.negative, expected.negative);
            assert_eq!(outcome.residual, expected.residual);
        }
    }

    #[test]
    fn test_peeling_order_does_not_matter_when_decodable() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let table = random_difference(&mut rng, 300, 40, 120);
        assert_order_independent(table, &mut rng);
    }

    #[test]
    fn test_peeling_order_does_not_matter_when_overloaded() {
        let mut rng = StdRng::seed_from_u64(42);
        let table = random_difference(&mut rng, 300, 60, 45);
        assert_order_independent(table, &mut rng);
    }

    #[test]
    fn test_reversed_queue_matches_forward_queue() {
        let mut rng = StdRng::seed_from_u64(7);
        let table = random_difference(&mut rng, 100, 20, 60);

        let mut forward = table.clone();
        let expected = forward.peeler().run();

        let mut backward = table;
        let peeler = backward.peeler();
        let queue = peeler.pure_indices().into_iter().rev().collect();
        let outcome = peeler.run_from(queue);

        assert_eq!(outcome.positive, expected.positive);
        assert_eq!(outcome.negative, expected.negative);
        assert_eq!(outcome.residual, expected.residual);
    }

    #[test]
    fn test_stray_copy_of_pure_cell_is_not_peeled() {
        let mut table = InvertibleBloomTable::builder()
            .with_size(12, 3)
            .build()
            .unwrap();
        table.insert("alpha");

        // a pure-looking cell outside the element's cover set is rejected
        let cover = table.cover("alpha");
        let stray = (0..12).find(|i| !cover.contains(i)).unwrap();
        let mut cells = table.cells().to_vec();
        cells[stray] = cells[cover[0]].clone();

        let peeler = Peeler::new(&mut cells, table.hasher(), table.seed(), table.num_hashes());
        let outcome = peeler.run();
        assert!(outcome.positive.contains(&b"alpha".to_vec()));
        assert!(outcome.negative.is_empty());
        assert_eq!(outcome.residual, vec![stray]);
    }

    #[test]
    fn test_matches_rescanning_reference_on_mixed_differences() {
        let mut rng = StdRng::seed_from_u64(0x1b17);
        let mut successes = 0;
        for _ in 0..300 {
            let mut table = random_difference(&mut rng, 50, 20, 30);
            let expected = peel_by_rescanning(&table);
            let outcome = table.peeler().run();

            assert_eq!(outcome.positive, expected.0);
            assert_eq!(outcome.negative, expected.1);
            assert_eq!(outcome.residual, expected.2);
            if outcome.residual.is_empty() {
                successes += 1;
            }
        }
        // 20 differences in 30 cells decode most of the time
        assert!(successes > 150, "only {successes} of 300 decoded");
    }

    #[test]
    fn test_corrupted_cells_stop_after_num_cells_peels() {
        // an element present in only one cell of its cover: peeling it pushes
        // its negation into the other cells, whose peel brings it back
        let hasher = Murmur3CellHasher;
        let seed = 9001;
        let cover = hasher.indices(b"loop", seed, 3, 12);
        let mut cells = vec![Cell::empty(); 12];
        cells[cover[0]] = Cell::for_element(b"loop", hasher.hash(b"loop", seed), 1);

        let outcome = Peeler::new(&mut cells, &hasher, seed, 3).run();
        assert!(outcome.positive.contains(&b"loop".to_vec()));
        assert!(outcome.negative.contains(&b"loop".to_vec()));
        assert!(!outcome.residual.is_empty());
    }
}
