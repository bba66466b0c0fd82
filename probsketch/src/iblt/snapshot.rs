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

//! Portable snapshot of a table, for exchanging state between two parties.

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::iblt::Cell;
use crate::iblt::CellHasher;
use crate::iblt::InvertibleBloomTable;
use crate::iblt::Murmur3CellHasher;
use crate::iblt::sketch::validate_params;

/// A self-describing copy of a table's configuration and cells.
///
/// Serializes to JSON as
/// `{"seed": .., "size": .., "hashCount": .., "cells": [{"idSum": .., "hashSum": .., "count": ..}]}`
/// with `idSum` encoded as URL-safe base64 without padding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IbltSnapshot {
    /// Hash seed.
    pub seed: u64,
    /// Number of cells; must equal `cells.len()`.
    pub size: u64,
    /// Number of cells each element is routed to.
    pub hash_count: u16,
    /// Cells in index order.
    pub cells: Vec<CellSnapshot>,
}

/// One cell of an [`IbltSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSnapshot {
    /// Accumulated ids in canonical encoded form.
    #[serde(with = "serde_bytes_base64")]
    pub id_sum: Vec<u8>,
    /// Accumulated checksums.
    pub hash_sum: u64,
    /// Net number of elements routed to the cell.
    pub count: i64,
}

impl IbltSnapshot {
    /// Renders the snapshot as JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|err| {
            Error::malformed_snapshot("failed to render snapshot as JSON").set_source(err)
        })
    }

    /// Parses a snapshot from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MalformedSnapshot`](crate::error::ErrorKind::MalformedSnapshot)
    /// if a field is missing or ill-typed, or `idSum` is not valid base64.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json)
            .map_err(|err| Error::malformed_snapshot("failed to parse snapshot").set_source(err))
    }
}

impl From<&Cell> for CellSnapshot {
    fn from(cell: &Cell) -> Self {
        CellSnapshot {
            id_sum: cell.id_sum().to_vec(),
            hash_sum: cell.hash_sum(),
            count: cell.count(),
        }
    }
}

impl InvertibleBloomTable {
    /// Rebuilds a table with the default hasher from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MalformedSnapshot`](crate::error::ErrorKind::MalformedSnapshot)
    /// if the cell count differs from `size`, the configuration is invalid, or
    /// an id sum is not canonical. No partially built table is ever returned.
    ///
    /// # Examples
    ///
    /// ```
    /// # use probsketch::iblt::{IbltSnapshot, InvertibleBloomTable};
    /// let mut table = InvertibleBloomTable::builder().with_capacity(10).build().unwrap();
    /// table.insert("apple");
    ///
    /// let json = table.to_snapshot().to_json().unwrap();
    /// let restored = InvertibleBloomTable::from_snapshot(IbltSnapshot::from_json(&json).unwrap()).unwrap();
    /// assert_eq!(table, restored);
    /// ```
    pub fn from_snapshot(snapshot: IbltSnapshot) -> Result<Self, Error> {
        Self::from_snapshot_with_hasher(snapshot, Murmur3CellHasher)
    }
}

impl<H: CellHasher> InvertibleBloomTable<H> {
    /// Exports the table as a snapshot.
    pub fn to_snapshot(&self) -> IbltSnapshot {
        IbltSnapshot {
            seed: self.seed(),
            size: self.num_cells() as u64,
            hash_count: self.num_hashes(),
            cells: self.cells().iter().map(CellSnapshot::from).collect(),
        }
    }

    /// Rebuilds a table from a snapshot, routing elements with the given hasher.
    ///
    /// # Errors
    ///
    /// See [`InvertibleBloomTable::from_snapshot`].
    pub fn from_snapshot_with_hasher(snapshot: IbltSnapshot, hasher: H) -> Result<Self, Error> {
        let IbltSnapshot {
            seed,
            size,
            hash_count,
            cells,
        } = snapshot;

        if size != cells.len() as u64 {
            return Err(
                Error::malformed_snapshot("cell count does not match size")
                    .with_context("size", size)
                    .with_context("cells", cells.len()),
            );
        }
        let num_cells = cells.len();
        validate_params(num_cells, hash_count).map_err(|err| {
            Error::malformed_snapshot(format!("invalid table parameters: {}", err.message()))
                .with_context("size", size)
                .with_context("hash_count", hash_count)
        })?;

        let cells = cells
            .into_iter()
            .enumerate()
            .map(|(index, cell)| {
                Cell::from_parts(cell.id_sum, cell.hash_sum, cell.count).ok_or_else(|| {
                    Error::malformed_snapshot("id sum has a trailing zero byte")
                        .with_context("cell", index)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_raw_parts(seed, hash_count, cells, hasher))
    }
}

mod serde_bytes_base64 {
    use base64::prelude::*;

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&BASE64_URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = serde::Deserialize::deserialize(deserializer)?;
        BASE64_URL_SAFE_NO_PAD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}
