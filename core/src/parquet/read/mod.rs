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

pub mod bitmap;
pub mod column;
pub mod levels;
pub mod rle;
pub mod values;

use std::{collections::HashMap, mem::size_of};

use arrow::buffer::Buffer;

pub use bitmap::{def_levels_to_bitmap, scatter_in_place, valid_positions, BitmapStats};
pub use column::{ColumnReader, SpacedBatch, TypedColumnReader};
pub use values::{DictDecoder, Decoder, DecoderKey, PlainDecoder};

use super::data_type::NativeValue;
use crate::{
    common::bit::BitReader,
    errors::{DecodeError, DecodeResult},
};

/// Property key for [`ReadOptions::batch_size`].
pub const BATCH_SIZE_KEY: &str = "gdf.parquet.batch_size";

pub const DEFAULT_BATCH_SIZE: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadOptions {
    /// Maximum number of levels decoded per `read_batch` call while assembling a column.
    pub batch_size: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ReadOptions {
    /// Builds options from string properties. Unknown keys are ignored.
    pub fn from_properties(props: &HashMap<String, String>) -> DecodeResult<Self> {
        let mut options = Self::default();
        if let Some(value) = props.get(BATCH_SIZE_KEY) {
            let batch_size = value.trim().parse::<usize>().map_err(|err| {
                DecodeError::Config(format!("Invalid {BATCH_SIZE_KEY} '{value}': {err}"))
            })?;
            if batch_size == 0 {
                return Err(DecodeError::Config(format!(
                    "{BATCH_SIZE_KEY} must be positive"
                )));
            }
            options.batch_size = batch_size;
        }
        Ok(options)
    }
}

/// Internal states for PLAIN decoder. Used in combination of `PlainDecoding`.
pub struct PlainDecoderInner {
    /// The input buffer containing values to be decoded
    data: Buffer,

    /// The current offset in `data`, in bytes.
    offset: usize,

    /// Reads `data` bit by bit, used if `T` is [`BoolType`](super::data_type::BoolType).
    bit_reader: BitReader,
}

impl PlainDecoderInner {
    pub(crate) fn new(data: Buffer) -> Self {
        let len = data.len();
        Self {
            bit_reader: BitReader::new(data.clone(), len),
            data,
            offset: 0,
        }
    }

    /// Bytes of `data` not yet consumed by a byte-aligned decoder.
    #[inline]
    fn remaining_bytes(&self) -> &[u8] {
        &self.data.as_slice()[self.offset..]
    }
}

/// A trait for [`super::DataType`] to implement how PLAIN encoded data is to be decoded into
/// its native element type.
///
/// The actual implementations of this trait is in `read/values.rs`.
pub trait PlainDecoding {
    /// Element type of the decoded buffer.
    type Native: NativeValue;

    /// Decodes `dst.len()` items from `src` into `dst`.
    ///
    /// Note: this assumes the `src` has data for at least `dst.len()` elements. The condition
    /// MUST be guaranteed from the caller side, through [`Self::num_available`].
    fn decode(src: &mut PlainDecoderInner, dst: &mut [Self::Native]);

    /// Number of whole values left in `src`.
    fn num_available(src: &PlainDecoderInner) -> usize {
        (src.data.len() - src.offset) / size_of::<Self::Native>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_read_options_from_properties() {
        let options = ReadOptions::from_properties(&HashMap::new()).unwrap();
        assert_eq!(options, ReadOptions::default());
        assert_eq!(options.batch_size, DEFAULT_BATCH_SIZE);

        let options =
            ReadOptions::from_properties(&props(&[(BATCH_SIZE_KEY, "128"), ("other", "x")]))
                .unwrap();
        assert_eq!(options.batch_size, 128);

        for bad in ["0", "-1", "lots"] {
            let result = ReadOptions::from_properties(&props(&[(BATCH_SIZE_KEY, bad)]));
            assert!(matches!(result, Err(DecodeError::Config(_))), "{bad}");
        }
    }
}
