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

//! Encoders and page builders producing the inputs of the column readers.

use std::sync::Arc;

use arrow::buffer::Buffer;
use parquet::{
    basic::{Encoding, Repetition, Type as PhysicalType},
    schema::types::{ColumnDescPtr, ColumnDescriptor, ColumnPath, Type as SchemaType},
};

use crate::{
    common::bit::{self, BitWriter, MAX_VLQ_BYTE_LEN},
    parquet::{data_type::NativeValue, page::Page},
};

/// Minimum length of a run of equal values encoded as a repeated run.
const MIN_REPEAT_RUN: usize = 8;

/// Encoder for the RLE / bit-packing hybrid encoding.
///
/// Runs of at least 8 equal values starting on a literal group boundary become repeated runs,
/// everything else is bit-packed in groups of 8. Only the last group is padded with zeros.
pub struct RleEncoder {
    bit_width: usize,
    values: Vec<u64>,
}

impl RleEncoder {
    pub fn new(bit_width: usize) -> Self {
        assert!(bit_width <= 64);
        Self {
            bit_width,
            values: Vec::new(),
        }
    }

    pub fn put(&mut self, value: u64) {
        self.values.push(value);
    }

    pub fn put_all(&mut self, values: &[u64]) {
        self.values.extend_from_slice(values);
    }

    pub fn consume(self) -> Vec<u8> {
        let n = self.values.len();
        let max_bytes = n * 8 + (n / MIN_REPEAT_RUN + 2) * (2 * MAX_VLQ_BYTE_LEN + 8);
        let mut writer = BitWriter::new(max_bytes);
        let value_width = self.bit_width.div_ceil(8);

        let mut literal: Vec<u64> = Vec::new();
        let mut i = 0;
        while i < n {
            let value = self.values[i];
            let run = self.values[i..].iter().take_while(|v| **v == value).count();
            if run >= MIN_REPEAT_RUN {
                Self::flush_literal(&mut writer, &mut literal, self.bit_width);
                assert!(writer.put_vlq_int((run as u64) << 1));
                assert!(writer.put_aligned(value, value_width));
                i += run;
            } else {
                let end = (i + MIN_REPEAT_RUN).min(n);
                literal.extend_from_slice(&self.values[i..end]);
                i = end;
            }
        }
        Self::flush_literal(&mut writer, &mut literal, self.bit_width);
        writer.consume()
    }

    fn flush_literal(writer: &mut BitWriter, literal: &mut Vec<u64>, bit_width: usize) {
        if literal.is_empty() {
            return;
        }
        let num_groups = literal.len().div_ceil(8);
        literal.resize(num_groups * 8, 0);
        assert!(writer.put_vlq_int(((num_groups as u64) << 1) | 1));
        for v in literal.iter() {
            assert!(writer.put_value(*v, bit_width));
        }
        writer.flush();
        literal.clear();
    }
}

/// Bit width of the levels of a column whose maximum level is `max_level`.
pub fn level_bit_width(max_level: i16) -> usize {
    bit::log2(max_level as u64 + 1) as usize
}

/// RLE encoded levels without length prefix, as stored in a data page v2.
pub fn encode_levels_v2(max_level: i16, levels: &[i16]) -> Vec<u8> {
    let mut encoder = RleEncoder::new(level_bit_width(max_level));
    for level in levels {
        encoder.put(*level as u64);
    }
    encoder.consume()
}

/// RLE encoded levels with their u32 length prefix, as stored in a data page v1.
pub fn encode_levels_v1(max_level: i16, levels: &[i16]) -> Vec<u8> {
    let encoded = encode_levels_v2(max_level, levels);
    let mut result = (encoded.len() as u32).to_le_bytes().to_vec();
    result.extend_from_slice(&encoded);
    result
}

/// Levels in the legacy BIT_PACKED encoding.
pub fn encode_levels_bit_packed(max_level: i16, levels: &[i16]) -> Vec<u8> {
    let bit_width = level_bit_width(max_level);
    let mut writer = BitWriter::new((levels.len() * bit_width).div_ceil(8) + 8);
    for level in levels {
        assert!(writer.put_value(*level as u64, bit_width));
    }
    writer.consume()
}

/// PLAIN encoding of fixed-width values.
pub fn plain_values<N: NativeValue>(values: &[N]) -> Vec<u8> {
    let mut result = Vec::with_capacity(std::mem::size_of_val(values));
    for v in values {
        v.put_le(&mut result);
    }
    result
}

/// PLAIN encoding of booleans, one bit per value.
pub fn plain_bools(values: &[bool]) -> Vec<u8> {
    let mut result = vec![0u8; values.len().div_ceil(8)];
    for (i, v) in values.iter().enumerate() {
        if *v {
            bit::set_bit(&mut result, i);
        }
    }
    result
}

/// A dictionary page holding `values` in PLAIN encoding.
pub fn dictionary_page<N: NativeValue>(values: &[N]) -> Page {
    Page::Dictionary {
        buf: Buffer::from_vec(plain_values(values)),
        num_values: values.len(),
        encoding: Encoding::PLAIN,
    }
}

/// Descriptor of a leaf column `c` with the given levels.
pub fn column_descriptor(
    physical_type: PhysicalType,
    repetition: Repetition,
    max_def_level: i16,
    max_rep_level: i16,
) -> ColumnDescPtr {
    let ty = SchemaType::primitive_type_builder("c", physical_type)
        .with_repetition(repetition)
        .build()
        .unwrap();
    Arc::new(ColumnDescriptor::new(
        Arc::new(ty),
        max_def_level,
        max_rep_level,
        ColumnPath::from("c"),
    ))
}

/// Builds a data page section by section: repetition levels, definition levels, then values.
pub struct DataPageBuilder {
    num_values: usize,
    datapage_v2: bool,
    buffer: Vec<u8>,
    encoding: Option<Encoding>,
    rep_level_encoding: Encoding,
    def_level_encoding: Encoding,
    rep_levels_byte_len: usize,
    def_levels_byte_len: usize,
}

impl DataPageBuilder {
    /// `num_values` is the number of levels of the page, nulls included.
    pub fn new(num_values: usize, datapage_v2: bool) -> Self {
        Self {
            num_values,
            datapage_v2,
            buffer: Vec::new(),
            encoding: None,
            rep_level_encoding: Encoding::RLE,
            def_level_encoding: Encoding::RLE,
            rep_levels_byte_len: 0,
            def_levels_byte_len: 0,
        }
    }

    fn add_levels(&mut self, max_level: i16, levels: &[i16]) -> usize {
        let encoded = if self.datapage_v2 {
            encode_levels_v2(max_level, levels)
        } else {
            encode_levels_v1(max_level, levels)
        };
        self.buffer.extend_from_slice(&encoded);
        encoded.len()
    }

    pub fn add_rep_levels(&mut self, max_level: i16, levels: &[i16]) -> &mut Self {
        self.rep_levels_byte_len = self.add_levels(max_level, levels);
        self
    }

    pub fn add_def_levels(&mut self, max_level: i16, levels: &[i16]) -> &mut Self {
        self.def_levels_byte_len = self.add_levels(max_level, levels);
        self
    }

    /// Adds definition levels in the legacy BIT_PACKED encoding. Data page v1 only.
    #[allow(deprecated)]
    pub fn add_bit_packed_def_levels(&mut self, max_level: i16, levels: &[i16]) -> &mut Self {
        assert!(!self.datapage_v2);
        let encoded = encode_levels_bit_packed(max_level, levels);
        self.buffer.extend_from_slice(&encoded);
        self.def_levels_byte_len = encoded.len();
        self.def_level_encoding = Encoding::BIT_PACKED;
        self
    }

    /// Adds raw bytes to the page, such as hand crafted levels.
    pub fn add_raw(&mut self, data: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(data);
        self
    }

    pub fn add_values<N: NativeValue>(&mut self, values: &[N]) -> &mut Self {
        self.buffer.extend_from_slice(&plain_values(values));
        self.encoding = Some(Encoding::PLAIN);
        self
    }

    pub fn add_bools(&mut self, values: &[bool]) -> &mut Self {
        self.buffer.extend_from_slice(&plain_bools(values));
        self.encoding = Some(Encoding::PLAIN);
        self
    }

    /// Adds dictionary indices: the bit width byte followed by the RLE encoded indices.
    pub fn add_indices(&mut self, bit_width: u8, indices: &[u64]) -> &mut Self {
        let mut encoder = RleEncoder::new(bit_width as usize);
        encoder.put_all(indices);
        self.buffer.push(bit_width);
        self.buffer.extend_from_slice(&encoder.consume());
        self.encoding = Some(Encoding::RLE_DICTIONARY);
        self
    }

    /// Overrides the value encoding of the page.
    pub fn with_encoding(&mut self, encoding: Encoding) -> &mut Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn consume(&mut self) -> Page {
        let buf = Buffer::from_vec(std::mem::take(&mut self.buffer));
        let encoding = self.encoding.unwrap_or(Encoding::PLAIN);
        if self.datapage_v2 {
            Page::DataV2 {
                buf,
                num_values: self.num_values,
                encoding,
                rep_levels_byte_len: self.rep_levels_byte_len,
                def_levels_byte_len: self.def_levels_byte_len,
            }
        } else {
            Page::DataV1 {
                buf,
                num_values: self.num_values,
                encoding,
                def_level_encoding: self.def_level_encoding,
                rep_level_encoding: self.rep_level_encoding,
            }
        }
    }
}
