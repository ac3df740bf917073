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

use std::{cmp::min, mem::size_of};

use arrow::buffer::Buffer;

use crate::errors::DecodeResult as Result;

pub trait FromBytes: Sized {
    type Buffer: AsMut<[u8]> + Default;
    fn from_le_bytes(bs: Self::Buffer) -> Self;
    fn from(v: u64) -> Self;
}

macro_rules! from_le_bytes {
    ($($ty: ty),*) => {
        $(
        impl FromBytes for $ty {
            type Buffer = [u8; size_of::<Self>()];
            fn from_le_bytes(bs: Self::Buffer) -> Self {
                <$ty>::from_le_bytes(bs)
            }
            fn from(v: u64) -> Self {
                v as $ty
            }
        }
        )*
    };
}

impl FromBytes for bool {
    type Buffer = [u8; 1];
    fn from_le_bytes(bs: Self::Buffer) -> Self {
        bs[0] != 0
    }
    fn from(v: u64) -> Self {
        (v & 1) == 1
    }
}

from_le_bytes! { u8, u16, u32, u64, i8, i16, i32, i64 }

/// Reads `$size` of bytes from `$src`, and reinterprets them as type `$ty`, in
/// little-endian order. `$ty` must implement the `FromBytes` trait.
macro_rules! read_num_bytes {
    ($ty:ty, $size:expr, $src:expr) => {{
        debug_assert!($size <= $src.len());
        let mut buffer = <$ty as $crate::common::bit::FromBytes>::Buffer::default();
        buffer.as_mut()[..$size].copy_from_slice(&$src[..$size]);
        <$ty as $crate::common::bit::FromBytes>::from_le_bytes(buffer)
    }};
}

/// u64 specific version of read_num_bytes!
#[inline]
pub fn read_num_bytes_u64(size: usize, src: &[u8]) -> u64 {
    debug_assert!(size <= 8 && size <= src.len());
    let mut buffer = [0u8; 8];
    buffer[..size].copy_from_slice(&src[..size]);
    u64::from_le_bytes(buffer)
}

/// Reads the first 8 bytes of `src` as a little-endian `u64`.
#[inline]
pub fn read_u64(src: &[u8]) -> u64 {
    let mut buffer = [0u8; 8];
    buffer.copy_from_slice(&src[..8]);
    u64::from_le_bytes(buffer)
}

/// Returns ceil(log2(x))
#[inline]
pub fn log2(mut x: u64) -> u32 {
    if x <= 1 {
        return 0;
    }
    x -= 1;
    64u32 - x.leading_zeros()
}

/// Returns the `num_bits` least-significant bits of `v`
#[inline]
pub fn trailing_bits(v: u64, num_bits: usize) -> u64 {
    if num_bits == 0 {
        return 0;
    }
    if num_bits >= 64 {
        return v;
    }
    v & ((1 << num_bits) - 1)
}

#[inline]
pub fn set_bit(bits: &mut [u8], i: usize) {
    bits[i / 8] |= 1 << (i % 8);
}

#[inline]
pub fn unset_bit(bits: &mut [u8], i: usize) {
    bits[i / 8] &= !(1 << (i % 8));
}

/// Sets `length` bits of `bits` to 1, starting at bit `offset`.
#[inline]
pub fn set_bits(bits: &mut [u8], offset: usize, length: usize) {
    if length == 0 {
        return;
    }
    let mut byte_i = offset / 8;
    let offset_r = offset % 8;
    let end = offset + length;
    let end_byte_i = end / 8;
    let end_r = end % 8;

    // if the offset starts in the middle of a byte, update the byte first
    if offset_r != 0 {
        let num_bits = min(length, 8 - offset_r);
        bits[byte_i] |= (((1u16 << num_bits) - 1) as u8) << offset_r;
        byte_i += 1;
    }

    if byte_i < end_byte_i {
        bits[byte_i..end_byte_i].fill(0xFF);
        byte_i = end_byte_i;
    }

    // take care of the last byte
    if end_r > 0 && byte_i == end_byte_i {
        bits[byte_i] |= (1u8 << end_r) - 1;
    }
}

static BIT_MASK: [u8; 8] = [1, 2, 4, 8, 16, 32, 64, 128];

/// Returns whether bit at position `i` in `data` is set or not
#[inline]
pub fn get_bit(data: &[u8], i: usize) -> bool {
    (data[i >> 3] & BIT_MASK[i & 7]) != 0
}

/// Counts the set bits of `data` in the range `[offset, offset + length)`.
pub fn count_set_bits(data: &[u8], offset: usize, length: usize) -> usize {
    (offset..offset + length).filter(|i| get_bit(data, *i)).count()
}

/// Utility class for writing bit/byte streams. This class can write data in either
/// bit packed or byte aligned fashion.
pub struct BitWriter {
    buffer: Vec<u8>,
    max_bytes: usize,
    buffered_values: u64,
    byte_offset: usize,
    bit_offset: usize,
}

impl BitWriter {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buffer: vec![0; max_bytes],
            max_bytes,
            buffered_values: 0,
            byte_offset: 0,
            bit_offset: 0,
        }
    }

    /// Consumes and returns the current buffer.
    #[inline]
    pub fn consume(mut self) -> Vec<u8> {
        self.flush();
        self.buffer.truncate(self.byte_offset);
        self.buffer
    }

    /// Flushes the internal buffered bits and the align the buffer to the next byte.
    #[inline]
    pub fn flush(&mut self) {
        let num_bytes = self.bit_offset.div_ceil(8);
        debug_assert!(self.byte_offset + num_bytes <= self.max_bytes);
        self.buffer[self.byte_offset..self.byte_offset + num_bytes]
            .copy_from_slice(&self.buffered_values.to_le_bytes()[..num_bytes]);
        self.buffered_values = 0;
        self.bit_offset = 0;
        self.byte_offset += num_bytes;
    }

    /// Advances the current offset by skipping `num_bytes`, flushing the internal bit
    /// buffer first.
    ///
    /// Returns error if `num_bytes` is beyond the boundary of the internal buffer.
    /// Otherwise, returns the old offset.
    #[inline]
    pub fn skip(&mut self, num_bytes: usize) -> Result<usize> {
        self.flush();
        if self.byte_offset + num_bytes > self.max_bytes {
            return Err(crate::errors::DecodeError::Internal(format!(
                "Not enough bytes left in BitWriter. Need {} but only have {}",
                self.byte_offset + num_bytes,
                self.max_bytes
            )));
        }
        let result = self.byte_offset;
        self.byte_offset += num_bytes;
        Ok(result)
    }

    #[inline]
    pub fn bytes_written(&self) -> usize {
        self.byte_offset + self.bit_offset.div_ceil(8)
    }

    #[inline]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Writes the `num_bits` LSB of value `v` to the internal buffer of this writer.
    /// The `num_bits` must not be greater than 64. This is bit packed.
    ///
    /// Returns false if there's not enough room left. True otherwise.
    #[inline]
    pub fn put_value(&mut self, v: u64, num_bits: usize) -> bool {
        debug_assert!(num_bits <= 64);
        debug_assert_eq!(v.checked_shr(num_bits as u32).unwrap_or(0), 0);

        if self.byte_offset * 8 + self.bit_offset + num_bits > self.max_bytes * 8 {
            return false;
        }

        self.buffered_values |= v.checked_shl(self.bit_offset as u32).unwrap_or(0);
        self.bit_offset += num_bits;
        if self.bit_offset >= 64 {
            self.buffer[self.byte_offset..self.byte_offset + 8]
                .copy_from_slice(&self.buffered_values.to_le_bytes());
            self.byte_offset += 8;
            self.bit_offset -= 64;
            // the bits of `v` that did not fit into the flushed word
            self.buffered_values = v
                .checked_shr((num_bits - self.bit_offset) as u32)
                .unwrap_or(0);
        }
        debug_assert!(self.bit_offset < 64);
        true
    }

    /// Writes the `num_bytes` low-order bytes of `val`, little-endian, at the next aligned
    /// byte.
    ///
    /// Returns false if there's not enough room left. True otherwise.
    #[inline]
    pub fn put_aligned(&mut self, val: u64, num_bytes: usize) -> bool {
        debug_assert!(num_bytes <= 8);
        match self.skip(num_bytes) {
            Ok(offset) => {
                self.buffer[offset..offset + num_bytes]
                    .copy_from_slice(&val.to_le_bytes()[..num_bytes]);
                true
            }
            Err(_) => false,
        }
    }

    /// Writes `num_bytes` of `val` at the designated `offset`, overwriting what is there.
    #[inline]
    pub fn put_aligned_offset(&mut self, val: u64, num_bytes: usize, offset: usize) -> bool {
        if num_bytes + offset > self.max_bytes {
            return false;
        }
        self.buffer[offset..offset + num_bytes].copy_from_slice(&val.to_le_bytes()[..num_bytes]);
        true
    }

    /// Writes a VLQ encoded integer `v` to this buffer. The value is byte aligned.
    ///
    /// Returns false if there's not enough room left. True otherwise.
    #[inline]
    pub fn put_vlq_int(&mut self, mut v: u64) -> bool {
        let mut result = true;
        while v & 0xFFFFFFFFFFFFFF80 != 0 {
            result &= self.put_aligned((v & 0x7F) | 0x80, 1);
            v >>= 7;
        }
        result &= self.put_aligned(v & 0x7F, 1);
        result
    }
}

/// Maximum byte length for a VLQ encoded integer
/// MAX_VLQ_BYTE_LEN = 5 for i32, and MAX_VLQ_BYTE_LEN = 10 for i64
pub const MAX_VLQ_BYTE_LEN: usize = 10;

pub struct BitReader {
    /// The byte buffer to read from, passed in by client
    buffer: Buffer,

    /// Up to 8 bytes of `buffer` starting at `byte_offset`, little-endian. Values are read
    /// from this word rather than byte by byte from `buffer`.
    buffered_values: u64,

    ///
    /// End                                         Start
    /// |............|B|B|B|B|B|B|B|B|..............|
    ///                   ^          ^
    ///                 bit_offset   byte_offset
    ///
    /// Current byte offset in `buffer`
    byte_offset: usize,

    /// Current bit offset in `buffered_values`, always < 64
    bit_offset: usize,

    /// Total number of bytes in `buffer`
    total_bytes: usize,
}

/// Utility class to read bit/byte stream. This class can read bits or bytes that are
/// either byte aligned or not.
impl BitReader {
    pub fn new(buf: Buffer, len: usize) -> Self {
        debug_assert!(len <= buf.len());
        let buffered_values = read_num_bytes_u64(min(len, 8), buf.as_slice());
        BitReader {
            buffer: buf,
            buffered_values,
            byte_offset: 0,
            bit_offset: 0,
            total_bytes: len,
        }
    }

    pub fn new_all(buf: Buffer) -> Self {
        let len = buf.len();
        Self::new(buf, len)
    }

    pub fn reset(&mut self, buf: Buffer) {
        self.buffer = buf;
        self.total_bytes = self.buffer.len();
        self.byte_offset = 0;
        self.bit_offset = 0;
        self.reload_buffer_values();
    }

    /// Gets the current byte offset
    #[inline]
    pub fn get_byte_offset(&self) -> usize {
        self.byte_offset + self.bit_offset.div_ceil(8)
    }

    /// Number of bits not yet consumed.
    #[inline]
    pub fn remaining_bits(&self) -> usize {
        (self.total_bytes - self.byte_offset) * 8 - self.bit_offset
    }

    /// Reads a value of type `T` and of size `num_bits`.
    ///
    /// Returns `None` if there's not enough data available. `Some` otherwise.
    pub fn get_value<T: FromBytes>(&mut self, num_bits: usize) -> Option<T> {
        debug_assert!(num_bits <= 64);
        debug_assert!(num_bits <= size_of::<T>() * 8);

        if num_bits > self.remaining_bits() {
            return None;
        }

        let v = self.get_u64_value(num_bits);
        Some(T::from(v))
    }

    #[inline(always)]
    fn get_u64_value(&mut self, num_bits: usize) -> u64 {
        if num_bits == 0 {
            return 0;
        }
        let v = self.buffered_values >> self.bit_offset;
        let mask = u64::MAX >> (64 - num_bits);
        self.bit_offset += num_bits;
        if self.bit_offset < 64 {
            v & mask
        } else {
            self.byte_offset += 8;
            self.bit_offset -= 64;
            self.reload_buffer_values();
            if self.bit_offset == 0 {
                v & mask
            } else {
                ((self.buffered_values << (num_bits - self.bit_offset)) | v) & mask
            }
        }
    }

    /// Reads up to `batch.len()` values of `num_bits` each into `batch`.
    ///
    /// Returns the number of values read, which is less than `batch.len()` only when the
    /// reader runs out of bits.
    pub fn get_batch<T: FromBytes>(&mut self, batch: &mut [T], num_bits: usize) -> usize {
        debug_assert!(num_bits <= 64);
        debug_assert!(num_bits <= size_of::<T>() * 8);

        let values_to_read = if num_bits == 0 {
            batch.len()
        } else {
            min(batch.len(), self.remaining_bits() / num_bits)
        };

        for v in batch[..values_to_read].iter_mut() {
            *v = T::from(self.get_u64_value(num_bits));
        }
        values_to_read
    }

    /// Reads a `num_bytes`-sized value from this buffer and return it.
    /// `T` needs to be a little-endian native type. The value is assumed to be byte
    /// aligned so the bit reader will be advanced to the start of the next byte before
    /// reading the value.
    /// Returns `Some` if there's enough bytes left to form a value of `T`.
    /// Otherwise `None`.
    pub fn get_aligned<T: FromBytes>(&mut self, num_bytes: usize) -> Option<T> {
        debug_assert!(num_bytes <= 8);

        let bytes_read = self.bit_offset.div_ceil(8);
        if self.byte_offset + bytes_read + num_bytes > self.total_bytes {
            return None;
        }

        if bytes_read + num_bytes >= 8 {
            // Advance byte_offset to next unread byte and reload the window from there
            self.byte_offset += bytes_read;
            self.reload_buffer_values();
            self.bit_offset = 0
        } else {
            // Advance bit_offset to next unread byte
            self.bit_offset = bytes_read * 8;
        }

        let v = T::from(trailing_bits(
            self.buffered_values >> self.bit_offset,
            num_bytes * 8,
        ));
        self.bit_offset += num_bytes * 8;

        if self.bit_offset == 64 {
            self.byte_offset += 8;
            self.bit_offset = 0;
            self.reload_buffer_values();
        }

        Some(v)
    }

    /// Reads a VLQ encoded (in little endian order) int from the stream.
    /// The encoded int must start at the beginning of a byte.
    ///
    /// Returns `None` if there's not enough bytes in the stream, or the integer is longer
    /// than `MAX_VLQ_BYTE_LEN` bytes. `Some` otherwise.
    pub fn get_vlq_int(&mut self) -> Option<i64> {
        let mut shift = 0;
        let mut v: i64 = 0;
        while let Some(byte) = self.get_aligned::<u8>(1) {
            v |= ((byte & 0x7F) as i64) << shift;
            if byte & 0x80 == 0 {
                return Some(v);
            }
            shift += 7;
            if shift >= MAX_VLQ_BYTE_LEN * 7 {
                return None;
            }
        }
        None
    }

    fn reload_buffer_values(&mut self) {
        let bytes_to_read = self.total_bytes.saturating_sub(self.byte_offset);
        self.buffered_values = if bytes_to_read >= 8 {
            read_u64(&self.buffer.as_slice()[self.byte_offset..])
        } else if bytes_to_read > 0 {
            read_num_bytes_u64(bytes_to_read, &self.buffer.as_slice()[self.byte_offset..])
        } else {
            0
        };
    }
}

impl From<Vec<u8>> for BitReader {
    #[inline]
    fn from(vec: Vec<u8>) -> Self {
        let len = vec.len();
        BitReader::new(Buffer::from_vec(vec), len)
    }
}
