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

//! Decoder for the Parquet RLE / bit-packing hybrid encoding.
//!
//! The stream is a sequence of runs, each starting with a VLQ header. If the low bit of the
//! header is 1 the run is a literal run of `(header >> 1) * 8` values, bit-packed with the
//! configured bit width. Otherwise it is a repeated run of `header >> 1` copies of a single
//! value stored in the following `ceil(bit_width / 8)` bytes, little-endian.
//!
//! A stream simply ends when no further header can be read. That is how page boundaries look
//! to this decoder, so it is reported through short counts rather than errors.

use std::cmp::min;

use arrow::buffer::Buffer;

use crate::{
    common::bit::{self, BitReader, FromBytes},
    errors::DecodeResult,
};

/// Number of dictionary indices unpacked at once from a literal run.
const INDEX_BUFFER_SIZE: usize = 1024;

pub struct RleHybridDecoder {
    /// Number of bits used to encode each value. Must be between `[0, 64]`.
    bit_width: usize,

    bit_reader: Option<BitReader>,

    /// Value of the active repeated run
    current_value: u64,

    /// Number of values left in the active repeated run
    repeat_count: usize,

    /// Number of values left in the active literal (bit-packed) run
    literal_count: usize,

    /// Scratch space for literal dictionary indices
    index_buf: Vec<u64>,
}

impl RleHybridDecoder {
    /// Creates a decoder with no data. `reset` must be called before any value is read.
    pub fn new() -> Self {
        Self {
            bit_width: 0,
            bit_reader: None,
            current_value: 0,
            repeat_count: 0,
            literal_count: 0,
            index_buf: Vec::new(),
        }
    }

    /// Rearms the decoder over `data`, with values of `bit_width` bits.
    pub fn reset(&mut self, data: Buffer, bit_width: usize) -> DecodeResult<()> {
        if bit_width > 64 {
            return Err(protocol_err!(
                "Invalid RLE bit width {}, must be at most 64",
                bit_width
            ));
        }
        self.bit_width = bit_width;
        self.current_value = 0;
        self.repeat_count = 0;
        self.literal_count = 0;
        match self.bit_reader.as_mut() {
            Some(reader) => reader.reset(data),
            None => self.bit_reader = Some(BitReader::new_all(data)),
        }
        Ok(())
    }

    #[inline]
    pub fn bit_width(&self) -> usize {
        self.bit_width
    }

    /// Reads a single value, or `None` at the end of the stream.
    pub fn get<T: FromBytes>(&mut self) -> Option<T> {
        if !self.ensure_run() {
            return None;
        }
        if self.repeat_count > 0 {
            self.repeat_count -= 1;
            Some(T::from(self.current_value))
        } else {
            self.literal_count -= 1;
            self.bit_reader
                .as_mut()
                .and_then(|reader| reader.get_value::<T>(self.bit_width))
        }
    }

    /// Fills `buffer` with decoded values. Returns how many were produced, which is less than
    /// `buffer.len()` only when the stream is exhausted.
    pub fn get_batch<T: FromBytes>(&mut self, buffer: &mut [T]) -> usize {
        let mut values_read = 0;
        while values_read < buffer.len() {
            if self.repeat_count > 0 {
                let n = min(buffer.len() - values_read, self.repeat_count);
                for v in buffer[values_read..values_read + n].iter_mut() {
                    *v = T::from(self.current_value);
                }
                self.repeat_count -= n;
                values_read += n;
            } else if self.literal_count > 0 {
                let n = min(buffer.len() - values_read, self.literal_count);
                let reader = match self.bit_reader.as_mut() {
                    Some(reader) => reader,
                    None => break,
                };
                let num_values =
                    reader.get_batch(&mut buffer[values_read..values_read + n], self.bit_width);
                if num_values == 0 {
                    // truncated literal run: nothing more can be read from this stream
                    self.literal_count = 0;
                    break;
                }
                self.literal_count -= num_values;
                values_read += num_values;
            } else if !self.reload() {
                break;
            }
        }
        values_read
    }

    /// Fills `buffer` with `dict[index]` for each decoded index.
    ///
    /// Returns how many values were produced, short only at the end of the stream. An index
    /// outside the dictionary is a protocol error.
    pub fn get_batch_with_dict<T: Copy>(
        &mut self,
        dict: &[T],
        buffer: &mut [T],
    ) -> DecodeResult<usize> {
        let mut values_read = 0;
        while values_read < buffer.len() {
            if self.repeat_count > 0 {
                let n = min(buffer.len() - values_read, self.repeat_count);
                let value = lookup(dict, self.current_value as usize)?;
                buffer[values_read..values_read + n].fill(value);
                self.repeat_count -= n;
                values_read += n;
            } else if self.literal_count > 0 {
                let n = min(
                    min(buffer.len() - values_read, self.literal_count),
                    INDEX_BUFFER_SIZE,
                );
                if self.index_buf.len() < n {
                    self.index_buf.resize(INDEX_BUFFER_SIZE, 0);
                }
                let reader = match self.bit_reader.as_mut() {
                    Some(reader) => reader,
                    None => break,
                };
                let num_values = reader.get_batch(&mut self.index_buf[..n], self.bit_width);
                if num_values == 0 {
                    self.literal_count = 0;
                    break;
                }
                for (out, idx) in buffer[values_read..values_read + num_values]
                    .iter_mut()
                    .zip(&self.index_buf[..num_values])
                {
                    *out = lookup(dict, *idx as usize)?;
                }
                self.literal_count -= num_values;
                values_read += num_values;
            } else if !self.reload() {
                break;
            }
        }
        Ok(values_read)
    }

    /// Like [`Self::get_batch_with_dict`], but only writes positions whose bit is set in
    /// `valid_bits` (starting at bit `valid_bits_offset`). Null positions are left untouched
    /// and consume no index from the stream.
    ///
    /// Returns the number of positions covered, valid or null. It is `buffer.len()` unless the
    /// stream ended before all `buffer.len() - null_count` valid positions were filled.
    pub fn get_batch_with_dict_spaced<T: Copy>(
        &mut self,
        dict: &[T],
        buffer: &mut [T],
        null_count: usize,
        valid_bits: &[u8],
        valid_bits_offset: usize,
    ) -> DecodeResult<usize> {
        debug_assert!(null_count <= buffer.len());
        let mut values_to_read = buffer.len() - null_count;
        let mut pos = 0;

        while pos < buffer.len() {
            if !bit::get_bit(valid_bits, valid_bits_offset + pos) {
                pos += 1;
                continue;
            }
            if values_to_read == 0 || !self.ensure_run() {
                // fewer valid positions than the null count implies, or the stream is done
                break;
            }

            if self.repeat_count > 0 {
                let value = lookup(dict, self.current_value as usize)?;
                // spread the run over the following positions, skipping nulls
                while pos < buffer.len() && self.repeat_count > 0 {
                    if bit::get_bit(valid_bits, valid_bits_offset + pos) {
                        buffer[pos] = value;
                        self.repeat_count -= 1;
                        values_to_read = values_to_read.saturating_sub(1);
                    }
                    pos += 1;
                }
            } else {
                let reader = match self.bit_reader.as_mut() {
                    Some(reader) => reader,
                    None => break,
                };
                while pos < buffer.len() && self.literal_count > 0 {
                    if bit::get_bit(valid_bits, valid_bits_offset + pos) {
                        match reader.get_value::<u64>(self.bit_width) {
                            Some(idx) => buffer[pos] = lookup(dict, idx as usize)?,
                            None => {
                                self.literal_count = 0;
                                return Ok(pos);
                            }
                        }
                        self.literal_count -= 1;
                        values_to_read = values_to_read.saturating_sub(1);
                    }
                    pos += 1;
                }
            }
        }

        // trailing nulls are covered even when the stream ended exactly on the last value
        while pos < buffer.len() && !bit::get_bit(valid_bits, valid_bits_offset + pos) {
            pos += 1;
        }
        Ok(pos)
    }

    /// Makes sure a run with values left is active, reading headers as needed. Returns false
    /// at the end of the stream.
    #[inline]
    fn ensure_run(&mut self) -> bool {
        while self.repeat_count == 0 && self.literal_count == 0 {
            if !self.reload() {
                return false;
            }
        }
        true
    }

    /// Reads the header of the next RLE/BitPacked run, and updates the internal state such as
    /// the number of values for the next run, as well as the current value in case it's RLE.
    ///
    /// Returns false if no further run can be read.
    fn reload(&mut self) -> bool {
        let reader = match self.bit_reader.as_mut() {
            Some(reader) => reader,
            None => return false,
        };
        match reader.get_vlq_int() {
            // some writers pad the end of a stream with zero bytes
            Some(0) | None => false,
            Some(indicator_value) => {
                let indicator_value = indicator_value as u64;
                if indicator_value & 1 == 1 {
                    self.literal_count = ((indicator_value >> 1) * 8) as usize;
                } else {
                    self.repeat_count = (indicator_value >> 1) as usize;
                    let value_width = self.bit_width.div_ceil(8);
                    match reader.get_aligned::<u64>(value_width) {
                        Some(value) => {
                            self.current_value = bit::trailing_bits(value, self.bit_width)
                        }
                        None => {
                            self.repeat_count = 0;
                            return false;
                        }
                    }
                }
                true
            }
        }
    }
}

impl Default for RleHybridDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn lookup<T: Copy>(dict: &[T], idx: usize) -> DecodeResult<T> {
    dict.get(idx).copied().ok_or_else(|| {
        protocol_err!(
            "Dictionary index {} out of range, dictionary has {} values",
            idx,
            dict.len()
        )
    })
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;
    use crate::{
        common::bit::{set_bit, trailing_bits, BitWriter},
        errors::DecodeError,
        parquet::util::test_common::{page_util::RleEncoder, random_bools, random_numbers},
    };

    fn new_decoder(data: Vec<u8>, bit_width: usize) -> RleHybridDecoder {
        let mut decoder = RleHybridDecoder::new();
        decoder.reset(Buffer::from_vec(data), bit_width).unwrap();
        decoder
    }

    #[test]
    fn test_invalid_bit_width() {
        let mut decoder = RleHybridDecoder::new();
        let result = decoder.reset(Buffer::from_vec(vec![0u8; 4]), 65);
        assert!(matches!(result, Err(DecodeError::Protocol(_))));
        assert!(decoder.reset(Buffer::from_vec(vec![0u8; 4]), 64).is_ok());
    }

    #[test]
    fn test_repeated_value_masked_to_bit_width() {
        // a repeated run of 4 values, its single value byte has bits above the bit width set
        let mut decoder = new_decoder(vec![4 << 1, 0xFF], 3);
        let mut buffer = vec![0i16; 4];
        assert_eq!(decoder.get_batch(&mut buffer), 4);
        assert_eq!(buffer, vec![7; 4]);
    }

    #[test]
    fn test_rle_decode_int32() {
        // Test data: 0-7 with bit width 3
        // 00000011 10001000 11000110 11111010
        let data = vec![0x03, 0x88, 0xC6, 0xFA];
        let mut decoder = new_decoder(data, 3);
        let mut buffer = vec![0; 8];
        let expected = vec![0, 1, 2, 3, 4, 5, 6, 7];
        let result = decoder.get_batch::<i32>(&mut buffer);
        assert_eq!(result, 8);
        assert_eq!(buffer, expected);
    }

    #[test]
    fn test_rle_decode_bool() {
        // RLE test data: 50 1s followed by 50 0s
        // 01100100 00000001 01100100 00000000
        let data1 = vec![0x64, 0x01, 0x64, 0x00];

        // Bit-packing test data: alternating 1s and 0s, 100 total
        // 100 / 8 = 13 groups
        // 00011011 10101010 ... 00001010
        let data2: Vec<u8> = vec![
            0x1B, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0x0A,
        ];

        let mut decoder = new_decoder(data1, 1);
        let mut buffer = vec![false; 100];
        let mut expected = vec![];
        for i in 0..100 {
            expected.push(i < 50);
        }
        let result = decoder.get_batch::<bool>(&mut buffer);
        assert_eq!(result, 100);
        assert_eq!(buffer, expected);

        decoder.reset(Buffer::from_vec(data2), 1).unwrap();
        let mut buffer = vec![false; 100];
        let mut expected = vec![];
        for i in 0..100 {
            expected.push(i % 2 != 0);
        }
        let result = decoder.get_batch::<bool>(&mut buffer);
        assert_eq!(result, 100);
        assert_eq!(buffer, expected);
    }

    #[test]
    fn test_rle_decode_with_dict_int32() {
        // Test RLE encoding: 3 0s followed by 4 1s followed by 5 2s
        // 00000110 00000000 00001000 00000001 00001010 00000010
        let dict = vec![10, 20, 30];
        let data = vec![0x06, 0x00, 0x08, 0x01, 0x0A, 0x02];
        let mut decoder = new_decoder(data, 3);
        let mut buffer = vec![0; 12];
        let expected = vec![10, 10, 10, 20, 20, 20, 20, 30, 30, 30, 30, 30];
        let result = decoder.get_batch_with_dict::<i32>(&dict, &mut buffer).unwrap();
        assert_eq!(result, 12);
        assert_eq!(buffer, expected);

        // Test bit-pack encoding: 345345345455 (2 groups: 8 and 4)
        // 011 100 101 011 100 101 011 100 101 100 101 101
        // 00000011 01100011 11000111 10001110 00000011 01100101 00001011
        let dict = vec!["aaa", "bbb", "ccc", "ddd", "eee", "fff"];
        let data = vec![0x03, 0x63, 0xC7, 0x8E, 0x03, 0x65, 0x0B];
        let mut decoder = new_decoder(data, 3);
        let mut buffer = vec![""; 12];
        let expected = vec![
            "ddd", "eee", "fff", "ddd", "eee", "fff", "ddd", "eee", "fff", "eee", "fff", "fff",
        ];
        let result = decoder.get_batch_with_dict(&dict, &mut buffer).unwrap();
        assert_eq!(result, 12);
        assert_eq!(buffer, expected);
    }

    #[test]
    fn test_rle_dict_index_out_of_range() {
        // repeated run of 4 copies of index 3
        let data = vec![0x08, 0x03];
        let mut decoder = new_decoder(data, 2);
        let mut buffer = vec![0i32; 4];
        let result = decoder.get_batch_with_dict(&[1, 2, 3], &mut buffer);
        assert!(matches!(result, Err(DecodeError::Protocol(_))));
    }

    #[test]
    fn test_rle_end_of_stream_is_short_count() {
        // a repeated run of 5 followed by nothing
        let mut decoder = new_decoder(vec![0x0A, 0x07], 3);
        let mut buffer = vec![0u8; 8];
        assert_eq!(decoder.get_batch(&mut buffer), 5);
        assert_eq!(&buffer[..5], &[7, 7, 7, 7, 7]);
        assert_eq!(decoder.get_batch(&mut buffer), 0);
        assert_eq!(decoder.get::<u8>(), None);

        // empty stream
        let mut decoder = new_decoder(vec![], 3);
        assert_eq!(decoder.get_batch(&mut buffer), 0);

        // zero padding after the last run
        let mut decoder = decoder_with_padding();
        assert_eq!(decoder.get_batch(&mut buffer), 2);
    }

    fn decoder_with_padding() -> RleHybridDecoder {
        new_decoder(vec![0x04, 0x01, 0x00, 0x00, 0x00], 1)
    }

    #[test]
    fn test_rle_truncated_repeated_value() {
        // header says 4 repeated values of 2 bytes, only 1 byte follows
        let mut decoder = new_decoder(vec![0x08, 0x01], 16);
        let mut buffer = vec![0u16; 4];
        assert_eq!(decoder.get_batch(&mut buffer), 0);
    }

    #[test]
    fn test_rle_get() {
        let data = vec![0x06, 0x00, 0x03, 0x63, 0xC7, 0x8E];
        let mut decoder = new_decoder(data, 3);
        let expected = [0u8, 0, 0, 3, 4, 5, 3, 4, 5, 3, 4];
        for e in expected {
            assert_eq!(decoder.get::<u8>(), Some(e));
        }
    }

    #[test]
    fn test_rle_zero_bit_width() {
        // repeated run of 10 zeros, no value bytes
        let mut decoder = new_decoder(vec![0x14], 0);
        let mut buffer = vec![1i16; 12];
        assert_eq!(decoder.get_batch(&mut buffer), 10);
        assert!(buffer[..10].iter().all(|v| *v == 0));
    }

    #[test]
    fn test_rle_64_bit_values() {
        let values = vec![u64::MAX, u64::MAX, u64::MAX, 1 << 63, 5, 5, 5, 5, 5, 5, 5, 5, 5];
        let mut encoder = RleEncoder::new(64);
        encoder.put_all(&values);
        let mut decoder = new_decoder(encoder.consume(), 64);
        let mut buffer = vec![0u64; values.len()];
        assert_eq!(decoder.get_batch(&mut buffer), values.len());
        assert_eq!(buffer, values);
    }

    #[test]
    fn test_rle_decode_split_batches() {
        let values: Vec<u32> = (0..500).map(|i| if i % 50 < 30 { 9 } else { i % 7 }).collect();
        let mut encoder = RleEncoder::new(4);
        encoder.put_all(&values.iter().map(|v| *v as u64).collect::<Vec<_>>());
        let mut decoder = new_decoder(encoder.consume(), 4);

        let mut decoded = vec![];
        let mut rng = rand::rng();
        // the last literal run is padded to 8 values, so stop at the encoded count
        while decoded.len() < values.len() {
            let len = rng.random_range(1..40).min(values.len() - decoded.len());
            let mut buffer = vec![0u32; len];
            assert_eq!(decoder.get_batch(&mut buffer), len);
            decoded.extend_from_slice(&buffer);
        }
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_rle_roundtrip_random() {
        let mut rng = rand::rng();
        for bit_width in [1, 2, 3, 7, 8, 9, 15, 16, 17, 31, 32, 33, 48, 63, 64] {
            for _ in 0..5 {
                let num_runs = rng.random_range(0..20);
                let mut values = vec![];
                for _ in 0..num_runs {
                    let run_len = rng.random_range(1..100);
                    if rng.random::<bool>() {
                        let v = trailing_bits(rng.random::<u64>(), bit_width);
                        values.extend(std::iter::repeat_n(v, run_len));
                    } else {
                        values.extend(
                            random_numbers::<u64>(run_len)
                                .into_iter()
                                .map(|v| trailing_bits(v, bit_width)),
                        );
                    }
                }

                let mut encoder = RleEncoder::new(bit_width);
                encoder.put_all(&values);
                let data = encoder.consume();

                let mut decoder = new_decoder(data.clone(), bit_width);
                let mut buffer = vec![0u64; values.len()];
                assert_eq!(decoder.get_batch(&mut buffer), values.len());
                assert_eq!(buffer, values, "bit width {bit_width}");

                // decoding again after a reset gives the same output
                decoder.reset(Buffer::from_vec(data), bit_width).unwrap();
                let mut again = vec![0u64; values.len()];
                assert_eq!(decoder.get_batch(&mut again), values.len());
                assert_eq!(again, buffer);
            }
        }
    }

    #[test]
    fn test_rle_dict_all_bit_widths() {
        let mut rng = rand::rng();
        for bit_width in 1..=32usize {
            // dictionaries larger than 2^12 entries are capped to keep the test fast
            let max_dict_len = 1usize << min(bit_width, 12);
            let dict_len = rng.random_range(1..=max_dict_len);
            let dict: Vec<i64> = random_numbers(dict_len);

            let indices: Vec<u64> = (0..300)
                .map(|i| {
                    if i % 40 < 15 {
                        (dict_len - 1) as u64
                    } else {
                        rng.random_range(0..dict_len) as u64
                    }
                })
                .collect();
            let mut encoder = RleEncoder::new(bit_width);
            encoder.put_all(&indices);
            let mut decoder = new_decoder(encoder.consume(), bit_width);

            let mut buffer = vec![0i64; indices.len()];
            let n = decoder.get_batch_with_dict(&dict, &mut buffer).unwrap();
            assert_eq!(n, indices.len());
            for (i, idx) in indices.iter().enumerate() {
                assert_eq!(buffer[i], dict[*idx as usize], "bit width {bit_width}, index {i}");
            }
        }
    }

    #[test]
    fn test_rle_dict_spaced() {
        let dict = vec![100, 200, 300, 400];
        let num_rows = 200;
        let validity = random_bools(num_rows);
        let mut valid_bits = vec![0u8; num_rows.div_ceil(8) + 1];
        // start at a bit offset to exercise unaligned bitmaps
        let offset = 5;
        for (i, v) in validity.iter().enumerate() {
            if *v {
                set_bit(&mut valid_bits, offset + i);
            }
        }
        let num_valid = validity.iter().filter(|v| **v).count();
        let indices: Vec<u64> = (0..num_valid)
            .map(|i| if i % 30 < 12 { 2 } else { (i % 4) as u64 })
            .collect();

        let mut encoder = RleEncoder::new(2);
        encoder.put_all(&indices);
        let mut decoder = new_decoder(encoder.consume(), 2);

        let sentinel = -1;
        let mut buffer = vec![sentinel; num_rows];
        let covered = decoder
            .get_batch_with_dict_spaced(
                &dict,
                &mut buffer,
                num_rows - num_valid,
                &valid_bits,
                offset,
            )
            .unwrap();
        assert_eq!(covered, num_rows);

        let mut next = indices.iter();
        for (i, v) in validity.iter().enumerate() {
            if *v {
                let idx = *next.next().unwrap() as usize;
                assert_eq!(buffer[i], dict[idx], "row {i}");
            } else {
                assert_eq!(buffer[i], sentinel, "row {i} must stay untouched");
            }
        }
        assert!(next.next().is_none());
    }

    #[test]
    fn test_rle_dict_spaced_matches_dense() {
        let dict: Vec<i32> = (0..16).map(|i| i * 11).collect();
        let mut writer = BitWriter::new(64);
        // literal run of 16 values with bit width 4, then a repeated run of 6 copies of 9
        writer.put_vlq_int(((2 << 1) | 1) as u64);
        for i in 0..16u64 {
            writer.put_value(15 - i, 4);
        }
        writer.put_vlq_int(6 << 1);
        writer.put_aligned(9, 1);
        let data = writer.consume();

        let mut dense = vec![0; 22];
        let n = new_decoder(data.clone(), 4)
            .get_batch_with_dict(&dict, &mut dense)
            .unwrap();
        assert_eq!(n, 22);

        // every third row is null
        let num_rows = 33;
        let mut valid_bits = vec![0u8; 5];
        for i in 0..num_rows {
            if i % 3 != 2 {
                set_bit(&mut valid_bits, i);
            }
        }
        let mut spaced = vec![0; num_rows];
        let covered = new_decoder(data, 4)
            .get_batch_with_dict_spaced(&dict, &mut spaced, 11, &valid_bits, 0)
            .unwrap();
        assert_eq!(covered, num_rows);
        let compacted: Vec<i32> = spaced
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 3 != 2)
            .map(|(_, v)| *v)
            .collect();
        assert_eq!(compacted, dense);
    }

    #[test]
    fn test_rle_dict_spaced_short_stream() {
        // only 2 indices available but 4 valid positions requested
        let mut decoder = new_decoder(vec![0x04, 0x01], 1);
        let mut buffer = vec![0; 5];
        let valid_bits = [0b11101];
        let covered = decoder
            .get_batch_with_dict_spaced(&[7, 8], &mut buffer, 1, &valid_bits, 0)
            .unwrap();
        assert_eq!(covered, 3);
        assert_eq!(&buffer[..3], &[8, 0, 8]);
    }
}
