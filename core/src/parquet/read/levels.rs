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

use std::{cmp::min, mem};

use arrow::buffer::Buffer;
use parquet::basic::Encoding;

use super::rle::RleHybridDecoder;
use crate::{
    common::bit::{self, BitReader},
    errors::DecodeResult,
};

enum Mode {
    RLE(RleHybridDecoder),
    /// Deprecated BIT_PACKED level encoding: levels packed back to back, no run headers.
    BitPacked(BitReader),
}

/// A decoder for Parquet definition & repetition levels.
pub struct LevelDecoder {
    /// Maximum level of the column. Any decoded level above it is a protocol error.
    max_level: i16,
    /// Number of bits used to represent the levels.
    bit_width: usize,
    /// Number of levels of the current page not yet decoded.
    num_values_left: usize,
    mode: Option<Mode>,
}

impl LevelDecoder {
    pub fn new(max_level: i16) -> Self {
        Self {
            max_level,
            bit_width: bit::log2(max_level as u64 + 1) as usize,
            num_values_left: 0,
            mode: None,
        }
    }

    #[inline]
    pub fn max_level(&self) -> i16 {
        self.max_level
    }

    /// Sets data for this level decoder from the front of a data page v1 payload, and returns
    /// total number of bytes consumed.
    ///
    /// RLE levels are prefixed by their byte length as a little-endian u32. BIT_PACKED levels
    /// take exactly `ceil(page_value_count * bit_width / 8)` bytes.
    pub fn set_data(
        &mut self,
        encoding: Encoding,
        page_value_count: usize,
        page_data: &Buffer,
    ) -> DecodeResult<usize> {
        self.num_values_left = page_value_count;
        match encoding {
            Encoding::RLE => {
                let u32_size = mem::size_of::<u32>();
                if page_data.len() < u32_size {
                    return Err(protocol_err!(
                        "Page of {} bytes too small for the level length prefix",
                        page_data.len()
                    ));
                }
                let data_size = bit::read_num_bytes_u64(u32_size, page_data.as_slice()) as usize;
                if u32_size + data_size > page_data.len() {
                    return Err(protocol_err!(
                        "Levels of {} bytes exceed the page size of {} bytes",
                        data_size,
                        page_data.len()
                    ));
                }
                self.set_rle(page_data.slice_with_length(u32_size, data_size))?;
                Ok(u32_size + data_size)
            }
            #[allow(deprecated)]
            Encoding::BIT_PACKED => {
                let data_size = (page_value_count * self.bit_width).div_ceil(8);
                if data_size > page_data.len() {
                    return Err(protocol_err!(
                        "Levels of {} bytes exceed the page size of {} bytes",
                        data_size,
                        page_data.len()
                    ));
                }
                let data = page_data.slice_with_length(0, data_size);
                self.mode = Some(Mode::BitPacked(BitReader::new_all(data)));
                Ok(data_size)
            }
            other => Err(protocol_err!("Invalid level encoding {}", other)),
        }
    }

    /// Sets data for this level decoder from the level section of a data page v2. These are
    /// always RLE and carry no length prefix.
    pub fn set_data_v2(&mut self, page_value_count: usize, data: Buffer) -> DecodeResult<()> {
        self.num_values_left = page_value_count;
        self.set_rle(data)
    }

    fn set_rle(&mut self, data: Buffer) -> DecodeResult<()> {
        match self.mode.as_mut() {
            Some(Mode::RLE(decoder)) => decoder.reset(data, self.bit_width),
            _ => {
                let mut decoder = RleHybridDecoder::new();
                decoder.reset(data, self.bit_width)?;
                self.mode = Some(Mode::RLE(decoder));
                Ok(())
            }
        }
    }

    /// Decodes up to `buffer.len()` levels of the current page into `buffer`, and returns how
    /// many were decoded.
    pub fn read_batch(&mut self, buffer: &mut [i16]) -> DecodeResult<usize> {
        let n = min(buffer.len(), self.num_values_left);
        let buffer = &mut buffer[..n];
        let num_read = match self.mode.as_mut() {
            Some(Mode::RLE(decoder)) => decoder.get_batch(buffer),
            Some(Mode::BitPacked(reader)) => reader.get_batch(buffer, self.bit_width),
            None => 0,
        };

        if let Some(level) = buffer[..num_read]
            .iter()
            .find(|l| **l < 0 || **l > self.max_level)
        {
            return Err(protocol_err!(
                "Level {} is outside [0, {}]",
                level,
                self.max_level
            ));
        }

        self.num_values_left -= num_read;
        Ok(num_read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::bit::BitWriter, errors::DecodeError,
        parquet::util::test_common::page_util::RleEncoder,
    };

    fn v1_rle_levels(levels: &[i16], max_level: i16) -> Vec<u8> {
        let mut encoder = RleEncoder::new(bit::log2(max_level as u64 + 1) as usize);
        encoder.put_all(&levels.iter().map(|l| *l as u64).collect::<Vec<_>>());
        let encoded = encoder.consume();
        let mut data = (encoded.len() as u32).to_le_bytes().to_vec();
        data.extend_from_slice(&encoded);
        data
    }

    #[test]
    fn test_rle_levels_v1() {
        let levels = vec![2, 2, 1, 2, 0, 2, 2, 2, 2, 2, 2, 2, 2, 2, 0, 0];
        let mut data = v1_rle_levels(&levels, 2);
        let level_bytes = data.len();
        // value bytes following the levels must not be consumed
        data.extend_from_slice(&[0xAB; 7]);

        let mut decoder = LevelDecoder::new(2);
        let consumed = decoder
            .set_data(Encoding::RLE, levels.len(), &Buffer::from_vec(data))
            .unwrap();
        assert_eq!(consumed, level_bytes);

        let mut buffer = vec![0i16; 32];
        assert_eq!(decoder.read_batch(&mut buffer[..5]).unwrap(), 5);
        assert_eq!(decoder.read_batch(&mut buffer[5..]).unwrap(), levels.len() - 5);
        assert_eq!(&buffer[..levels.len()], levels.as_slice());
        assert_eq!(decoder.read_batch(&mut buffer).unwrap(), 0);
    }

    #[test]
    #[allow(deprecated)]
    fn test_bit_packed_levels() {
        // 5 levels of 2 bits: 1 2 0 2 3 -> 10 bits
        let levels = [1i16, 2, 0, 2, 3];
        let mut writer = BitWriter::new(2);
        for l in levels {
            writer.put_value(l as u64, 2);
        }
        let mut data = writer.consume();
        assert_eq!(data.len(), 2);
        data.push(0xFF);

        let mut decoder = LevelDecoder::new(3);
        let consumed = decoder
            .set_data(Encoding::BIT_PACKED, levels.len(), &Buffer::from_vec(data))
            .unwrap();
        assert_eq!(consumed, 2);

        let mut buffer = vec![0i16; 8];
        assert_eq!(decoder.read_batch(&mut buffer).unwrap(), 5);
        assert_eq!(&buffer[..5], &levels);
    }

    #[test]
    fn test_level_above_max() {
        let data = v1_rle_levels(&[1, 1, 3, 1], 3);
        let mut decoder = LevelDecoder::new(2);
        // both max levels share a bit width of 2
        decoder
            .set_data(Encoding::RLE, 4, &Buffer::from_vec(data))
            .unwrap();
        let mut buffer = vec![0i16; 4];
        assert!(matches!(
            decoder.read_batch(&mut buffer),
            Err(DecodeError::Protocol(_))
        ));
    }

    #[test]
    fn test_wide_repeated_level_above_max() {
        // max level 300 takes 9 bits, so a repeated value is stored in 2 bytes. Bits above
        // the bit width are dropped, leaving 511.
        let data: Vec<u8> = vec![4 << 1, 0xFF, 0xFF];
        let mut decoder = LevelDecoder::new(300);
        decoder.set_data_v2(4, Buffer::from_vec(data)).unwrap();
        let mut buffer = vec![0i16; 4];
        match decoder.read_batch(&mut buffer) {
            Err(DecodeError::Protocol(msg)) => assert!(msg.contains("511")),
            other => panic!("Unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_truncated_length_prefix() {
        let mut decoder = LevelDecoder::new(1);
        let result = decoder.set_data(Encoding::RLE, 4, &Buffer::from_vec(vec![1u8, 0]));
        assert!(matches!(result, Err(DecodeError::Protocol(_))));

        let data = vec![100u8, 0, 0, 0, 1, 2, 3];
        let result = decoder.set_data(Encoding::RLE, 4, &Buffer::from_vec(data));
        assert!(matches!(result, Err(DecodeError::Protocol(_))));

        let result = decoder.set_data(Encoding::PLAIN, 4, &Buffer::from_vec(vec![0u8; 8]));
        assert!(matches!(result, Err(DecodeError::Protocol(_))));
    }

    #[test]
    fn test_rle_levels_v2() {
        let levels = vec![0i16, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0];
        let mut encoder = RleEncoder::new(1);
        encoder.put_all(&levels.iter().map(|l| *l as u64).collect::<Vec<_>>());

        let mut decoder = LevelDecoder::new(1);
        decoder
            .set_data_v2(levels.len(), Buffer::from_vec(encoder.consume()))
            .unwrap();
        let mut buffer = vec![0i16; levels.len()];
        assert_eq!(decoder.read_batch(&mut buffer).unwrap(), levels.len());
        assert_eq!(buffer, levels);
    }

    #[test]
    fn test_reads_bounded_by_page_value_count() {
        // the encoder pads literal runs to a multiple of 8
        let levels = vec![1i16, 0, 1];
        let data = v1_rle_levels(&levels, 1);
        let mut decoder = LevelDecoder::new(1);
        decoder
            .set_data(Encoding::RLE, levels.len(), &Buffer::from_vec(data))
            .unwrap();
        let mut buffer = vec![0i16; 8];
        assert_eq!(decoder.read_batch(&mut buffer).unwrap(), 3);
        assert_eq!(&buffer[..3], levels.as_slice());
    }
}
