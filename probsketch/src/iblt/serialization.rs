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

use std::io;

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::assert::ensure_serial_version_is;
use crate::codec::family::Family;
use crate::error::Error;
use crate::iblt::Cell;
use crate::iblt::CellHasher;
use crate::iblt::InvertibleBloomTable;
use crate::iblt::Murmur3CellHasher;
use crate::iblt::sketch::validate_params;

const PREAMBLE_LONGS: u8 = 3;
const SERIAL_VERSION: u8 = 1;
const EMPTY_FLAG_MASK: u8 = 1 << 2;

// count + hash_sum + id_sum length
const MIN_CELL_BYTES: usize = 8 + 8 + 8;

impl InvertibleBloomTable {
    /// Deserializes a table built with the default hasher.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The data is truncated or corrupted
    /// - The family ID doesn't match (not an IBLT)
    /// - The serial version is unsupported
    /// - The stored size or hash count is invalid
    ///
    /// # Examples
    ///
    /// ```
    /// # use probsketch::iblt::InvertibleBloomTable;
    /// let mut table = InvertibleBloomTable::builder().with_capacity(20).build().unwrap();
    /// table.insert("test");
    ///
    /// let bytes = table.serialize();
    /// let restored = InvertibleBloomTable::deserialize(&bytes).unwrap();
    /// assert_eq!(table, restored);
    /// ```
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_hasher(bytes, Murmur3CellHasher)
    }
}

impl<H: CellHasher> InvertibleBloomTable<H> {
    /// Serializes the table to a byte vector.
    ///
    /// The hasher itself is not stored; the receiving side must use an
    /// equivalent one.
    pub fn serialize(&self) -> Vec<u8> {
        let is_empty = self.is_empty();

        let capacity = 8 * PREAMBLE_LONGS as usize
            + if is_empty {
                0
            } else {
                self.cells()
                    .iter()
                    .map(|cell| MIN_CELL_BYTES + cell.id_sum().len())
                    .sum()
            };
        let mut bytes = SketchBytes::with_capacity(capacity);

        // Preamble
        bytes.write_u8(PREAMBLE_LONGS);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(Family::IBLT.id);
        bytes.write_u8(if is_empty { EMPTY_FLAG_MASK } else { 0 });
        bytes.write_u16_le(self.num_hashes());
        bytes.write_u16_le(0); // reserved

        bytes.write_u64_le(self.seed());
        bytes.write_u64_le(self.num_cells() as u64);

        if !is_empty {
            for cell in self.cells() {
                bytes.write_i64_le(cell.count());
                bytes.write_u64_le(cell.hash_sum());
                bytes.write_u64_le(cell.id_sum().len() as u64);
                bytes.write(cell.id_sum());
            }
        }

        bytes.into_bytes()
    }

    /// Deserializes a table, routing elements with the given hasher.
    ///
    /// # Errors
    ///
    /// See [`InvertibleBloomTable::deserialize`].
    pub fn deserialize_with_hasher(bytes: &[u8], hasher: H) -> Result<Self, Error> {
        fn make_error(tag: &'static str) -> impl FnOnce(io::Error) -> Error {
            move |err| Error::insufficient_data(tag).set_source(err)
        }

        let mut cursor = SketchSlice::new(bytes);
        let preamble_longs = cursor.read_u8().map_err(make_error("preamble_longs"))?;
        let serial_version = cursor.read_u8().map_err(make_error("serial_version"))?;
        let family_id = cursor.read_u8().map_err(make_error("family_id"))?;
        let flags = cursor.read_u8().map_err(make_error("flags"))?;
        let num_hashes = cursor.read_u16_le().map_err(make_error("num_hashes"))?;
        cursor.read_u16_le().map_err(make_error("reserved"))?;
        let seed = cursor.read_u64_le().map_err(make_error("seed"))?;
        let num_cells = cursor.read_u64_le().map_err(make_error("num_cells"))?;

        Family::IBLT.validate_id(family_id)?;
        ensure_serial_version_is(SERIAL_VERSION, serial_version)?;
        Family::IBLT.validate_pre_longs(preamble_longs)?;

        let num_cells = usize::try_from(num_cells)
            .map_err(|_| Error::deserial("num_cells does not fit in usize"))?;
        validate_params(num_cells, num_hashes).map_err(|err| {
            Error::deserial(format!("invalid table parameters: {}", err.message()))
                .with_context("num_cells", num_cells)
                .with_context("num_hashes", num_hashes)
        })?;

        let is_empty = (flags & EMPTY_FLAG_MASK) != 0;
        if is_empty {
            return Ok(Self::from_raw_parts(
                seed,
                num_hashes,
                vec![Cell::empty(); num_cells],
                hasher,
            ));
        }

        if cursor.remaining() / MIN_CELL_BYTES < num_cells {
            return Err(Error::insufficient_data("cells").with_context("num_cells", num_cells));
        }

        let mut cells = Vec::with_capacity(num_cells);
        for index in 0..num_cells {
            let count = cursor.read_i64_le().map_err(make_error("count"))?;
            let hash_sum = cursor.read_u64_le().map_err(make_error("hash_sum"))?;
            let id_len = cursor.read_u64_le().map_err(make_error("id_sum_len"))?;
            if id_len > cursor.remaining() as u64 {
                return Err(Error::insufficient_data("id_sum").with_context("cell", index));
            }
            let mut id_sum = vec![0u8; id_len as usize];
            cursor.read_exact(&mut id_sum).map_err(make_error("id_sum"))?;

            let cell = Cell::from_parts(id_sum, hash_sum, count).ok_or_else(|| {
                Error::deserial("id sum has a trailing zero byte").with_context("cell", index)
            })?;
            cells.push(cell);
        }

        Ok(Self::from_raw_parts(seed, num_hashes, cells, hasher))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sample() -> InvertibleBloomTable {
        let mut table = InvertibleBloomTable::builder()
            .with_size(24, 3)
            .seed(77)
            .build()
            .unwrap();
        for element in ["apple", "banana", "cherry"] {
            table.insert(element);
        }
        table.remove("durian");
        table
    }

    #[test]
    fn test_empty_table_omits_cells() {
        let table = InvertibleBloomTable::builder().with_size(24, 3).build().unwrap();
        let bytes = table.serialize();
        assert_eq!(bytes.len(), 24);
        assert_eq!(bytes[0], PREAMBLE_LONGS);
        assert_eq!(bytes[1], SERIAL_VERSION);
        assert_eq!(bytes[2], Family::IBLT.id);
        assert_eq!(bytes[3], EMPTY_FLAG_MASK);

        let restored = InvertibleBloomTable::deserialize(&bytes).unwrap();
        assert_eq!(restored, table);
    }

    #[test]
    fn test_round_trip_keeps_every_cell() {
        let table = sample();
        let restored = InvertibleBloomTable::deserialize(&table.serialize()).unwrap();
        assert_eq!(restored.seed(), 77);
        assert_eq!(restored.cells(), table.cells());
    }

    #[test]
    fn test_truncated_input() {
        let bytes = sample().serialize();
        for len in [0, 3, 10, 23, 30, bytes.len() - 1] {
            let err = InvertibleBloomTable::deserialize(&bytes[..len]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData, "len {len}");
        }
    }

    #[test]
    fn test_wrong_family() {
        let mut bytes = sample().serialize();
        bytes[2] = 21;
        let err = InvertibleBloomTable::deserialize(&bytes).unwrap_err();
        assert!(err.message().contains("invalid family"));
    }

    #[test]
    fn test_wrong_serial_version() {
        let mut bytes = sample().serialize();
        bytes[1] = 9;
        let err = InvertibleBloomTable::deserialize(&bytes).unwrap_err();
        assert!(err.message().contains("unsupported serial version"));
    }

    #[test]
    fn test_zero_hashes_rejected() {
        let mut bytes = sample().serialize();
        bytes[4] = 0;
        bytes[5] = 0;
        let err = InvertibleBloomTable::deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
        assert!(err.message().contains("num_hashes must be at least 1"));
    }

    #[test]
    fn test_non_canonical_id_sum_rejected() {
        let mut table = InvertibleBloomTable::builder().with_size(3, 3).build().unwrap();
        table.insert("x");
        let mut bytes = table.serialize();
        // first cell: count, hash_sum, len = 2, then "x\x01"; zero the terminator
        let terminator = 24 + 8 + 8 + 8 + 1;
        assert_eq!(bytes[terminator], 1);
        bytes[terminator] = 0;
        let err = InvertibleBloomTable::deserialize(&bytes).unwrap_err();
        assert!(err.message().contains("trailing zero"));
    }
}
