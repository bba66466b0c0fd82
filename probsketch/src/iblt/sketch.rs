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

use crate::error::Error;
use crate::error::ErrorKind;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::iblt::Cell;
use crate::iblt::CellHasher;
use crate::iblt::DecodeResult;
use crate::iblt::ListResult;
use crate::iblt::Murmur3CellHasher;
use crate::iblt::decode::Peeler;

const DEFAULT_NUM_HASHES: u16 = 3;
const DEFAULT_ALPHA: f64 = 1.5;

pub(super) const MAX_NUM_CELLS: usize = 1 << 28;

/// The outcome of a membership query against an [`InvertibleBloomTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Membership {
    /// Some covering cell is empty: the element was never net-added.
    Absent,
    /// Exactly one covering cell holds this element and nothing else.
    Present,
    /// No single covering cell settles the question.
    Inconclusive,
}

/// An Invertible Bloom Lookup Table.
///
/// A fixed array of XOR-accumulator [`Cell`]s. Unlike a Bloom filter, its
/// content can be listed back, and two tables built independently over similar
/// sets can be [subtracted](Self::subtract) and [decoded](Self::decode) to
/// recover their symmetric difference, as long as the difference is small
/// relative to the number of cells.
///
/// Decoding is destructive, so [`decode`](Self::decode) and
/// [`list_entries`](Self::list_entries) take the table by value; clone it first
/// to keep the original.
///
/// # Examples
///
/// ```
/// use probsketch::iblt::InvertibleBloomTable;
///
/// let mut alice = InvertibleBloomTable::builder().with_capacity(10).build().unwrap();
/// let mut bob = InvertibleBloomTable::builder().with_capacity(10).build().unwrap();
///
/// for item in ["a", "b", "c", "d"] {
///     alice.insert(item);
///     bob.insert(item);
/// }
/// alice.insert("only-alice");
/// bob.insert("only-bob");
///
/// let result = alice.subtract(&bob).unwrap().decode();
/// assert!(result.is_success());
/// assert!(result.additional.contains(&b"only-alice".to_vec()));
/// assert!(result.missing.contains(&b"only-bob".to_vec()));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InvertibleBloomTable<H = Murmur3CellHasher> {
    /// Hash seed for the checksum and cover set of every element
    seed: u64,
    /// Number of cells each element is routed to (k)
    num_hashes: u16,
    /// Flat cell arena, its length is the table size (m)
    cells: Vec<Cell>,
    hasher: H,
}

impl InvertibleBloomTable {
    /// Returns a builder for creating a table with the default hasher.
    ///
    /// # Examples
    ///
    /// ```
    /// use probsketch::iblt::InvertibleBloomTable;
    ///
    /// // By expected number of differences (recommended)
    /// let table = InvertibleBloomTable::builder().with_capacity(100).build().unwrap();
    /// assert_eq!(table.num_cells(), 150);
    ///
    /// // By size (manual)
    /// let table = InvertibleBloomTable::builder().with_size(64, 4).build().unwrap();
    /// assert_eq!(table.num_hashes(), 4);
    /// ```
    pub fn builder() -> InvertibleBloomTableBuilder {
        InvertibleBloomTableBuilder::default()
    }
}

impl<H: CellHasher> InvertibleBloomTable<H> {
    pub(super) fn from_raw_parts(seed: u64, num_hashes: u16, cells: Vec<Cell>, hasher: H) -> Self {
        Self {
            seed,
            num_hashes,
            cells,
            hasher,
        }
    }

    // ========================================================================
    // Update Operations
    // ========================================================================

    /// Inserts an element into every cell of its cover set.
    ///
    /// # Examples
    ///
    /// ```
    /// # use probsketch::iblt::InvertibleBloomTable;
    /// let mut table = InvertibleBloomTable::builder().with_capacity(10).build().unwrap();
    /// table.insert("apple");
    /// table.insert(b"raw bytes");
    /// table.insert(vec![0u8, 1, 2]);
    /// assert_eq!(table.len(), 3);
    /// ```
    pub fn insert(&mut self, element: impl AsRef<[u8]>) {
        let element = element.as_ref();
        let hash = self.hasher.hash(element, self.seed);
        for index in self.cover(element) {
            self.cells[index].add(element, hash);
        }
    }

    /// Removes an element previously inserted.
    ///
    /// Removing an element that was never inserted is not detected; it leaves
    /// a negative contribution behind that later shows up while decoding.
    ///
    /// # Examples
    ///
    /// ```
    /// # use probsketch::iblt::InvertibleBloomTable;
    /// let mut table = InvertibleBloomTable::builder().with_capacity(10).build().unwrap();
    /// table.insert("apple");
    /// table.remove("apple");
    /// assert!(table.is_empty());
    /// ```
    pub fn remove(&mut self, element: impl AsRef<[u8]>) {
        let element = element.as_ref();
        let hash = self.hasher.hash(element, self.seed);
        for index in self.cover(element) {
            self.cells[index].remove(element, hash);
        }
    }

    /// Resets every cell while preserving size, hash count and seed.
    pub fn reset(&mut self) {
        self.cells.fill(Cell::empty());
    }

    // ========================================================================
    // Query Operations
    // ========================================================================

    /// Tests whether an element is in the table.
    ///
    /// Returns:
    /// - [`Membership::Absent`] if any covering cell is empty; there are no
    ///   false negatives.
    /// - [`Membership::Present`] if exactly one covering cell holds this
    ///   element and nothing else.
    /// - [`Membership::Inconclusive`] otherwise, including when the element
    ///   sits alone in several of its cells.
    ///
    /// # Examples
    ///
    /// ```
    /// # use probsketch::iblt::{InvertibleBloomTable, Membership};
    /// let mut table = InvertibleBloomTable::builder().with_size(12, 3).build().unwrap();
    /// for fruit in ["apple", "banana", "cherry", "date", "elderberry", "fig"] {
    ///     table.insert(fruit);
    /// }
    ///
    /// assert_eq!(table.contains("banana"), Membership::Present);
    /// assert_eq!(table.contains("elderberry"), Membership::Inconclusive);
    /// assert_eq!(table.contains("kiwi"), Membership::Absent);
    /// ```
    pub fn contains(&self, element: impl AsRef<[u8]>) -> Membership {
        let element = element.as_ref();
        let cover = self.cover(element);
        if cover.iter().any(|&index| self.cells[index].count() == 0) {
            return Membership::Absent;
        }
        let holding = cover
            .iter()
            .filter(|&&index| {
                let cell = &self.cells[index];
                cell.count().abs() == 1 && cell.holds_id(element)
            })
            .count();
        if holding == 1 {
            Membership::Present
        } else {
            Membership::Inconclusive
        }
    }

    /// Returns the net number of elements in the table.
    ///
    /// Computed from the cell counts in O(m); negative when more elements were
    /// removed than inserted.
    pub fn len(&self) -> i64 {
        let total: i64 = self.cells.iter().map(Cell::count).sum();
        total / i64::from(self.num_hashes)
    }

    /// Returns whether every cell is empty.
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Cell::is_empty)
    }

    /// Returns the number of cells (m).
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Returns the number of cells each element is routed to (k).
    pub fn num_hashes(&self) -> u16 {
        self.num_hashes
    }

    /// Returns the hash seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the hasher.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Returns the cells in index order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Returns the cover set of an element: the cells it is routed to.
    pub fn cover(&self, element: impl AsRef<[u8]>) -> Vec<usize> {
        self.hasher.indices(
            element.as_ref(),
            self.seed,
            self.num_hashes,
            self.cells.len(),
        )
    }

    /// Checks if two tables can be subtracted.
    ///
    /// Tables are compatible if they have the same:
    /// - Number of cells
    /// - Number of hash functions
    /// - Seed
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.cells.len() == other.cells.len()
            && self.num_hashes == other.num_hashes
            && self.seed == other.seed
    }

    // ========================================================================
    // Set Operations
    // ========================================================================

    /// Computes the cell-wise difference `self - other`.
    ///
    /// Elements shared by both tables cancel out; decoding the result yields
    /// the elements only in `self` as `additional` and the elements only in
    /// `other` as `missing`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::IncompatibleTables`] if the tables differ in size,
    /// hash count or seed. Neither table is modified.
    pub fn subtract(&self, other: &Self) -> Result<Self, Error> {
        if !self.is_compatible(other) {
            return Err(Error::new(
                ErrorKind::IncompatibleTables,
                "tables must share size, hash count and seed",
            )
            .with_context("num_cells", format!("{} vs {}", self.num_cells(), other.num_cells()))
            .with_context("num_hashes", format!("{} vs {}", self.num_hashes, other.num_hashes))
            .with_context("seed", format!("{} vs {}", self.seed, other.seed)));
        }

        let cells = self
            .cells
            .iter()
            .zip(&other.cells)
            .map(|(a, b)| Cell::xor(a, b))
            .collect();

        Ok(Self {
            seed: self.seed,
            num_hashes: self.num_hashes,
            cells,
            hasher: self.hasher.clone(),
        })
    }

    /// Decodes a differenced table by peeling pure cells.
    ///
    /// Consumes the table. On failure the elements recovered before peeling
    /// stalled are still returned, along with the cells left non-empty.
    ///
    /// # Examples
    ///
    /// ```
    /// # use probsketch::iblt::InvertibleBloomTable;
    /// let mut table = InvertibleBloomTable::builder().with_capacity(10).build().unwrap();
    /// table.insert("x");
    ///
    /// let result = table.subtract(&table).unwrap().decode();
    /// assert!(result.is_success());
    /// assert!(result.additional.is_empty() && result.missing.is_empty());
    /// ```
    pub fn decode(mut self) -> DecodeResult {
        let outcome = self.peeler().run();
        let result = DecodeResult {
            additional: outcome.positive,
            missing: outcome.negative,
            residual: outcome.residual,
        };
        tracing::debug!(
            additional = result.additional.len(),
            missing = result.missing.len(),
            residual = result.residual.len(),
            status = ?result.status(),
            "decoded table"
        );
        result
    }

    /// Lists the content of a plain (not differenced) table.
    ///
    /// Consumes the table.
    ///
    /// # Examples
    ///
    /// ```
    /// # use probsketch::iblt::InvertibleBloomTable;
    /// let mut table = InvertibleBloomTable::builder().with_size(30, 3).build().unwrap();
    /// table.insert("a");
    /// table.insert("b");
    ///
    /// let listed = table.list_entries();
    /// assert!(listed.is_success());
    /// assert_eq!(listed.entries.len(), 2);
    /// ```
    pub fn list_entries(mut self) -> ListResult {
        let outcome = self.peeler().run();
        let result = ListResult {
            entries: outcome.positive,
            removed: outcome.negative,
            residual: outcome.residual,
        };
        tracing::debug!(
            entries = result.entries.len(),
            removed = result.removed.len(),
            residual = result.residual.len(),
            "listed table"
        );
        result
    }

    pub(super) fn peeler(&mut self) -> Peeler<'_, H> {
        Peeler::new(&mut self.cells, &self.hasher, self.seed, self.num_hashes)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for creating [`InvertibleBloomTable`] instances.
///
/// Provides two construction modes:
/// - [`with_capacity()`](Self::with_capacity): size the table for an expected
///   number of differences (recommended)
/// - [`with_size()`](Self::with_size): specify the exact cell and hash counts
#[derive(Debug, Clone)]
pub struct InvertibleBloomTableBuilder<H = Murmur3CellHasher> {
    num_cells: Option<usize>,
    num_differences: Option<usize>,
    alpha: f64,
    num_hashes: u16,
    seed: u64,
    hasher: H,
}

impl Default for InvertibleBloomTableBuilder {
    fn default() -> Self {
        InvertibleBloomTableBuilder {
            num_cells: None,
            num_differences: None,
            alpha: DEFAULT_ALPHA,
            num_hashes: DEFAULT_NUM_HASHES,
            seed: DEFAULT_UPDATE_SEED,
            hasher: Murmur3CellHasher,
        }
    }
}

impl<H: CellHasher> InvertibleBloomTableBuilder<H> {
    /// Sizes the table to decode up to `num_differences` differences with high
    /// probability.
    ///
    /// The cell count is `alpha * num_differences` rounded up to a multiple of
    /// the hash count (see [`suggest_num_cells`](InvertibleBloomTableBuilder::suggest_num_cells)).
    pub fn with_capacity(mut self, num_differences: usize) -> Self {
        self.num_cells = None;
        self.num_differences = Some(num_differences);
        self
    }

    /// Uses an exact number of cells and hash functions.
    pub fn with_size(mut self, num_cells: usize, num_hashes: u16) -> Self {
        self.num_cells = Some(num_cells);
        self.num_differences = None;
        self.num_hashes = num_hashes;
        self
    }

    /// Sets the overhead factor used by [`with_capacity`](Self::with_capacity)
    /// (default: 1.5).
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the number of cells each element is routed to (default: 3).
    pub fn num_hashes(mut self, num_hashes: u16) -> Self {
        self.num_hashes = num_hashes;
        self
    }

    /// Sets a custom hash seed (default: 9001).
    ///
    /// **Important**: Tables with different seeds cannot be subtracted.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replaces the hash family.
    pub fn hasher<H2: CellHasher>(self, hasher: H2) -> InvertibleBloomTableBuilder<H2> {
        InvertibleBloomTableBuilder {
            num_cells: self.num_cells,
            num_differences: self.num_differences,
            alpha: self.alpha,
            num_hashes: self.num_hashes,
            seed: self.seed,
            hasher,
        }
    }

    /// Builds the table.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`] if no size was given, if the hash
    /// count is zero, if the table has no cells, more than 2^28 cells or fewer
    /// cells than hash functions, or if `alpha` is not a positive finite number.
    pub fn build(self) -> Result<InvertibleBloomTable<H>, Error> {
        let num_cells = match (self.num_cells, self.num_differences) {
            (Some(num_cells), _) => num_cells,
            (None, Some(num_differences)) => {
                if !(self.alpha.is_finite() && self.alpha > 0.0) {
                    return Err(Error::config_invalid("alpha must be a positive finite number")
                        .with_context("alpha", self.alpha));
                }
                suggest_num_cells(num_differences, self.alpha, self.num_hashes)
            }
            (None, None) => {
                return Err(Error::config_invalid(
                    "must call with_capacity() or with_size() before build()",
                ));
            }
        };

        validate_params(num_cells, self.num_hashes)?;

        Ok(InvertibleBloomTable {
            seed: self.seed,
            num_hashes: self.num_hashes,
            cells: vec![Cell::empty(); num_cells],
            hasher: self.hasher,
        })
    }
}

impl InvertibleBloomTableBuilder {
    /// Suggests a cell count able to decode `num_differences` differences.
    ///
    /// Formula: `m = ceil(alpha * d)`, at least `k`, rounded up to a multiple of `k`.
    /// Results beyond 2^28 cells saturate just above that limit.
    ///
    /// # Examples
    ///
    /// ```
    /// # use probsketch::iblt::InvertibleBloomTableBuilder;
    /// assert_eq!(InvertibleBloomTableBuilder::suggest_num_cells(50, 1.5, 3), 75);
    /// assert_eq!(InvertibleBloomTableBuilder::suggest_num_cells(10, 1.5, 4), 16);
    /// ```
    pub fn suggest_num_cells(num_differences: usize, alpha: f64, num_hashes: u16) -> usize {
        suggest_num_cells(num_differences, alpha, num_hashes)
    }
}

fn suggest_num_cells(num_differences: usize, alpha: f64, num_hashes: u16) -> usize {
    let k = usize::from(num_hashes.max(1));
    let cells = (num_differences as f64 * alpha).ceil();
    // past the largest table, any answer is rejected by `build`
    if cells.is_nan() || cells > MAX_NUM_CELLS as f64 {
        return MAX_NUM_CELLS + 1;
    }
    (cells as usize).max(k).div_ceil(k) * k
}

/// Validates table parameters.
pub(super) fn validate_params(num_cells: usize, num_hashes: u16) -> Result<(), Error> {
    if num_hashes < 1 {
        return Err(Error::config_invalid("num_hashes must be at least 1"));
    }
    if num_cells == 0 {
        return Err(Error::config_invalid("num_cells must be positive"));
    }
    if num_cells > MAX_NUM_CELLS {
        return Err(
            Error::config_invalid(format!("num_cells must not exceed {MAX_NUM_CELLS}"))
                .with_context("num_cells", num_cells),
        );
    }
    if num_cells < usize::from(num_hashes) {
        return Err(
            Error::config_invalid("num_cells must not be smaller than num_hashes")
                .with_context("num_cells", num_cells)
                .with_context("num_hashes", num_hashes),
        );
    }
    Ok(())
}
