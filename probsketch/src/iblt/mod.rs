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

//! Invertible Bloom Lookup Table (IBLT) for set reconciliation.
//!
//! An IBLT is a fixed array of cells, each accumulating by XOR the ids and
//! checksums of the elements routed to it, plus a signed count. Two parties
//! holding similar sets each build a table with the same size, hash count and
//! seed; one side ships its table to the other, which subtracts the two tables
//! cell by cell and peels the result to recover the exact symmetric difference.
//!
//! Peeling succeeds with high probability while the number of differences `d`
//! stays below `m / alpha`, where `m` is the number of cells and `alpha` an
//! overhead factor around 1.5 for three hash functions.
//!
//! # Usage
//!
//! ```rust
//! use probsketch::iblt::InvertibleBloomTable;
//!
//! let mut local = InvertibleBloomTable::builder().with_capacity(20).build().unwrap();
//! let mut remote = InvertibleBloomTable::builder().with_capacity(20).build().unwrap();
//!
//! for i in 0..1_000 {
//!     local.insert(format!("item-{i}"));
//!     remote.insert(format!("item-{i}"));
//! }
//! remote.insert("new-on-remote");
//!
//! // the remote table travels as bytes
//! let received = InvertibleBloomTable::deserialize(&remote.serialize()).unwrap();
//!
//! let diff = local.subtract(&received).unwrap().decode();
//! assert!(diff.is_success());
//! assert!(diff.additional.is_empty());
//! assert!(diff.missing.contains(&b"new-on-remote".to_vec()));
//! ```
//!
//! # Notes
//!
//! - Elements are opaque byte strings; anything implementing `AsRef<[u8]>` can
//!   be inserted.
//! - Removing an element that was never inserted is not detected.
//! - Decoding consumes the table. Clone it first to keep the original.
//! - Tables are not synchronized; share them across threads behind a lock or
//!   exchange serialized snapshots instead.

mod cell;
mod decode;
mod hasher;
mod serialization;
mod sketch;
mod snapshot;

pub use self::cell::Cell;
pub use self::decode::DecodeResult;
pub use self::decode::DecodeStatus;
pub use self::decode::ListResult;
pub use self::hasher::CellHasher;
pub use self::hasher::Murmur3CellHasher;
pub use self::sketch::InvertibleBloomTable;
pub use self::sketch::InvertibleBloomTableBuilder;
pub use self::sketch::Membership;
pub use self::snapshot::CellSnapshot;
pub use self::snapshot::IbltSnapshot;
