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
use std::io::Cursor;
use std::io::Read;

use byteorder::LittleEndian;
use byteorder::ReadBytesExt;

/// A read cursor over serialized sketch bytes.
pub(crate) struct SketchSlice<'a> {
    slice: Cursor<&'a [u8]>,
}

impl<'a> SketchSlice<'a> {
    pub fn new(slice: &'a [u8]) -> Self {
        SketchSlice {
            slice: Cursor::new(slice),
        }
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        let len = self.slice.get_ref().len() as u64;
        len.saturating_sub(self.slice.position()) as usize
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.slice.read_exact(buf)
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.slice.read_u8()
    }

    pub fn read_u16_le(&mut self) -> io::Result<u16> {
        self.slice.read_u16::<LittleEndian>()
    }

    pub fn read_u64_le(&mut self) -> io::Result<u64> {
        self.slice.read_u64::<LittleEndian>()
    }

    pub fn read_i64_le(&mut self) -> io::Result<i64> {
        self.slice.read_i64::<LittleEndian>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SketchBytes;

    #[test]
    fn test_read_back_written_values() {
        let mut bytes = SketchBytes::with_capacity(32);
        bytes.write_u8(7);
        bytes.write_u16_le(0xbeef);
        bytes.write_u64_le(u64::MAX - 1);
        bytes.write_i64_le(-3);
        let bytes = bytes.into_bytes();
        assert_eq!(bytes.len(), 1 + 2 + 8 + 8);

        let mut cursor = SketchSlice::new(&bytes);
        assert_eq!(cursor.read_u8().unwrap(), 7);
        assert_eq!(cursor.read_u16_le().unwrap(), 0xbeef);
        assert_eq!(cursor.remaining(), 16);
        assert_eq!(cursor.read_u64_le().unwrap(), u64::MAX - 1);
        assert_eq!(cursor.read_i64_le().unwrap(), -3);
        assert_eq!(cursor.remaining(), 0);
        assert!(cursor.read_u8().is_err());
    }

    #[test]
    fn test_read_exact_short_buffer() {
        let mut cursor = SketchSlice::new(&[1, 2, 3]);
        let mut buf = [0u8; 4];
        assert!(cursor.read_exact(&mut buf).is_err());
    }
}
