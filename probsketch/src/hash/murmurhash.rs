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

use std::hash::Hasher;

const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;

/// MurmurHash3 x64 128-bit variant with a full 64-bit seed.
///
/// For seeds that fit in 32 bits the output matches the reference
/// `MurmurHash3_x64_128`.
#[derive(Debug, Clone)]
pub(crate) struct MurmurHash3X64128 {
    h1: u64,
    h2: u64,
    total_len: u64,
    buffer: [u8; 16],
    buffer_len: usize,
}

impl MurmurHash3X64128 {
    pub fn with_seed(seed: u64) -> Self {
        MurmurHash3X64128 {
            h1: seed,
            h2: seed,
            total_len: 0,
            buffer: [0; 16],
            buffer_len: 0,
        }
    }

    /// Hashes a byte slice in one shot.
    pub fn hash(bytes: &[u8], seed: u64) -> (u64, u64) {
        let mut hasher = Self::with_seed(seed);
        hasher.write(bytes);
        hasher.finish128()
    }

    pub fn finish128(&self) -> (u64, u64) {
        let mut h1 = self.h1;
        let mut h2 = self.h2;

        let tail = &self.buffer[..self.buffer_len];
        if tail.len() > 8 {
            let mut k2 = 0u64;
            for (i, &b) in tail[8..].iter().enumerate() {
                k2 ^= u64::from(b) << (i * 8);
            }
            h2 ^= mix_k2(k2);
        }
        if !tail.is_empty() {
            let mut k1 = 0u64;
            for (i, &b) in tail[..tail.len().min(8)].iter().enumerate() {
                k1 ^= u64::from(b) << (i * 8);
            }
            h1 ^= mix_k1(k1);
        }

        h1 ^= self.total_len;
        h2 ^= self.total_len;
        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);
        h1 = fmix64(h1);
        h2 = fmix64(h2);
        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);
        (h1, h2)
    }

    #[inline]
    fn update(&mut self, block: &[u8]) {
        let k1 = super::read_u64_le(&block[0..8]);
        let k2 = super::read_u64_le(&block[8..16]);

        self.h1 ^= mix_k1(k1);
        self.h1 = self
            .h1
            .rotate_left(27)
            .wrapping_add(self.h2)
            .wrapping_mul(5)
            .wrapping_add(0x52dc_e729);

        self.h2 ^= mix_k2(k2);
        self.h2 = self
            .h2
            .rotate_left(31)
            .wrapping_add(self.h1)
            .wrapping_mul(5)
            .wrapping_add(0x3849_5ab5);
    }
}

impl Hasher for MurmurHash3X64128 {
    fn finish(&self) -> u64 {
        self.finish128().0
    }

    fn write(&mut self, bytes: &[u8]) {
        self.total_len = self.total_len.wrapping_add(bytes.len() as u64);

        if self.buffer_len + bytes.len() < 16 {
            self.buffer[self.buffer_len..self.buffer_len + bytes.len()].copy_from_slice(bytes);
            self.buffer_len += bytes.len();
            return;
        }

        let mut bytes = bytes;

        if self.buffer_len != 0 {
            let needed = 16 - self.buffer_len;
            self.buffer[self.buffer_len..].copy_from_slice(&bytes[..needed]);
            let block = self.buffer;
            self.update(&block);
            self.buffer_len = 0;
            bytes = &bytes[needed..];
        }

        let mut blocks = bytes.chunks_exact(16);
        for block in &mut blocks {
            self.update(block);
        }

        let remainder = blocks.remainder();
        if !remainder.is_empty() {
            self.buffer[..remainder.len()].copy_from_slice(remainder);
            self.buffer_len = remainder.len();
        }
    }
}

#[inline]
fn mix_k1(k1: u64) -> u64 {
    k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2)
}

#[inline]
fn mix_k2(k2: u64) -> u64 {
    k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1)
}

#[inline]
fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^ (k >> 33)
}
