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

use std::{cmp::min, marker::PhantomData, mem::size_of};

use arrow::buffer::Buffer;
use log::debug;
use parquet::basic::Encoding;

use super::{bitmap, rle::RleHybridDecoder, PlainDecoderInner, PlainDecoding};
use crate::{
    common::bit,
    errors::{DecodeError, DecodeResult},
    parquet::data_type::*,
};

/// Largest bit width of dictionary indices in a data page.
const MAX_DICT_INDEX_BIT_WIDTH: usize = 32;

/// Identifies a cached value decoder of a column reader. Both dictionary encodings share the
/// same decoder, since they only differ in how the dictionary page is labelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecoderKey {
    Plain,
    Dictionary,
}

impl DecoderKey {
    pub fn from_encoding(encoding: Encoding) -> DecodeResult<Self> {
        match encoding {
            Encoding::PLAIN => Ok(DecoderKey::Plain),
            Encoding::PLAIN_DICTIONARY | Encoding::RLE_DICTIONARY => Ok(DecoderKey::Dictionary),
            other => Err(nyi_err!("Unsupported encoding: {}", other)),
        }
    }
}

/// A Parquet decoder for values within a Parquet data page.
pub trait Decoder<T: DataType>: Send {
    /// Binds the value section of a data page, holding at most `num_values` values.
    fn set_data(&mut self, num_values: usize, data: Buffer) -> DecodeResult<()>;

    /// Decodes up to `out.len()` values into `out`, and returns how many were decoded. A short
    /// count means the bound data is exhausted.
    fn decode(&mut self, out: &mut [T::Native]) -> DecodeResult<usize>;

    /// Decodes `out.len() - null_count` values, placing them at the positions of `out` whose
    /// bit is set in `valid_bits` (starting at bit `valid_bits_offset`). Null positions hold
    /// unspecified values.
    ///
    /// Returns the number of positions of `out` covered, valid or null.
    fn decode_spaced(
        &mut self,
        out: &mut [T::Native],
        null_count: usize,
        valid_bits: &[u8],
        valid_bits_offset: usize,
    ) -> DecodeResult<usize> {
        if null_count > out.len() {
            return Err(DecodeError::Internal(format!(
                "Null count {} exceeds the batch size {}",
                null_count,
                out.len()
            )));
        }
        let num_values = out.len() - null_count;
        let values_read = self.decode(&mut out[..num_values])?;
        let covered = if values_read == num_values {
            out.len()
        } else {
            // stop right before the first valid position that has no value
            bitmap::valid_positions(valid_bits, valid_bits_offset, out.len())
                .get(values_read)
                .copied()
                .unwrap_or(out.len())
        };
        bitmap::scatter_in_place(&mut out[..covered], values_read, valid_bits, valid_bits_offset)?;
        Ok(covered)
    }

    /// Returns the encoding for this decoder.
    fn encoding(&self) -> Encoding;
}

macro_rules! make_plain_default_impl {
    ($($ty: ident => $native: ty), *) => {
        $(
            impl PlainDecoding for $ty {
                type Native = $native;

                fn decode(src: &mut PlainDecoderInner, dst: &mut [$native]) {
                    let mut buf = src.remaining_bytes();
                    for v in dst.iter_mut() {
                        *v = <$native>::get_le(&mut buf);
                    }
                    src.offset += dst.len() * size_of::<$native>();
                }
            }
        )*
    };
}

make_plain_default_impl! { Int32Type => i32, Int64Type => i64, FloatType => f32, DoubleType => f64 }

impl PlainDecoding for BoolType {
    /// Booleans are bit packed in Parquet, and widened to one byte per value.
    type Native = i8;

    #[inline]
    fn decode(src: &mut PlainDecoderInner, dst: &mut [i8]) {
        src.bit_reader.get_batch(dst, 1);
    }

    #[inline]
    fn num_available(src: &PlainDecoderInner) -> usize {
        src.bit_reader.remaining_bits()
    }
}

pub struct PlainDecoder<T: DataType> {
    /// Internal states for this decoder. `None` until data is bound.
    inner: Option<PlainDecoderInner>,

    /// Number of values of the bound data not yet decoded.
    num_values: usize,

    /// Marker to allow `T` in the generic parameter of the struct.
    _phantom: PhantomData<T>,
}

impl<T: DataType> PlainDecoder<T> {
    pub fn new() -> Self {
        Self {
            inner: None,
            num_values: 0,
            _phantom: PhantomData,
        }
    }
}

impl<T: DataType> Default for PlainDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DataType> Decoder<T> for PlainDecoder<T> {
    fn set_data(&mut self, num_values: usize, data: Buffer) -> DecodeResult<()> {
        self.inner = Some(PlainDecoderInner::new(data));
        self.num_values = num_values;
        Ok(())
    }

    #[inline]
    fn decode(&mut self, out: &mut [T::Native]) -> DecodeResult<usize> {
        let inner = match self.inner.as_mut() {
            Some(inner) => inner,
            None => return Ok(0),
        };
        let n = min(min(out.len(), self.num_values), T::num_available(inner));
        T::decode(inner, &mut out[..n]);
        self.num_values -= n;
        Ok(n)
    }

    #[inline]
    fn encoding(&self) -> Encoding {
        Encoding::PLAIN
    }
}

/// A decoder for dictionary encoded data pages. The dictionary values come from the column's
/// dictionary page; the data page holds a bit width byte followed by RLE/BitPacked indices.
pub struct DictDecoder<T: DataType> {
    dictionary: Vec<T::Native>,

    /// Decoder of the dictionary indices
    rle: RleHybridDecoder,

    /// Number of values of the bound data page not yet decoded.
    num_values: usize,
}

impl<T: DataType> DictDecoder<T> {
    pub fn new() -> Self {
        Self {
            dictionary: Vec::new(),
            rle: RleHybridDecoder::new(),
            num_values: 0,
        }
    }

    /// Materializes the `num_values` values of a dictionary page, bound to `decoder`.
    pub fn set_dict(&mut self, decoder: &mut PlainDecoder<T>, num_values: usize) -> DecodeResult<()> {
        let mut dictionary = Vec::new();
        dictionary.try_reserve_exact(num_values)?;
        dictionary.resize(num_values, T::Native::default());

        let values_read = decoder.decode(&mut dictionary)?;
        if values_read < num_values {
            return Err(protocol_err!(
                "Dictionary page truncated: expected {} values, found {}",
                num_values,
                values_read
            ));
        }
        debug!("Loaded dictionary of {} values", num_values);
        self.dictionary = dictionary;
        Ok(())
    }

    #[inline]
    pub fn dictionary(&self) -> &[T::Native] {
        &self.dictionary
    }
}

impl<T: DataType> Default for DictDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DataType> Decoder<T> for DictDecoder<T> {
    fn set_data(&mut self, num_values: usize, data: Buffer) -> DecodeResult<()> {
        // a page of nulls only may carry no index data at all
        let (bit_width, indices) = match data.as_slice().first() {
            Some(bit_width) => (*bit_width as usize, data.slice(1)),
            None => (0, data),
        };
        if bit_width > MAX_DICT_INDEX_BIT_WIDTH {
            return Err(protocol_err!(
                "Invalid dictionary index bit width {}, must be at most {}",
                bit_width,
                MAX_DICT_INDEX_BIT_WIDTH
            ));
        }
        self.rle.reset(indices, bit_width)?;
        self.num_values = num_values;
        Ok(())
    }

    fn decode(&mut self, out: &mut [T::Native]) -> DecodeResult<usize> {
        let n = min(out.len(), self.num_values);
        let values_read = self
            .rle
            .get_batch_with_dict(&self.dictionary, &mut out[..n])?;
        self.num_values -= values_read;
        Ok(values_read)
    }

    fn decode_spaced(
        &mut self,
        out: &mut [T::Native],
        null_count: usize,
        valid_bits: &[u8],
        valid_bits_offset: usize,
    ) -> DecodeResult<usize> {
        if null_count > out.len() {
            return Err(DecodeError::Internal(format!(
                "Null count {} exceeds the batch size {}",
                null_count,
                out.len()
            )));
        }
        let covered = self.rle.get_batch_with_dict_spaced(
            &self.dictionary,
            out,
            null_count,
            valid_bits,
            valid_bits_offset,
        )?;
        let values_read = bit::count_set_bits(valid_bits, valid_bits_offset, covered);
        self.num_values = self.num_values.saturating_sub(values_read);
        Ok(covered)
    }

    fn encoding(&self) -> Encoding {
        Encoding::RLE_DICTIONARY
    }
}
