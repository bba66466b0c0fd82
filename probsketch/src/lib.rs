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

//! # Probsketch
//!
//! Probabilistic data structures for approximate and reconcilable set
//! representations.
//!
//! The [`iblt`] module provides an Invertible Bloom Lookup Table: a compact
//! summary of a set that can be subtracted from the summary of another set and
//! decoded to list their exact symmetric difference. It is the building block
//! of set reconciliation and anti-entropy protocols, where two peers exchange a
//! single table instead of their full contents.

#![deny(missing_docs)]

pub mod error;
pub mod iblt;

mod codec;
mod hash;
