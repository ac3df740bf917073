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

use arrow::{
    array::ArrayData,
    buffer::Buffer,
    datatypes::{ArrowNativeType, DataType as ArrowDataType},
};
use parquet::{
    basic::{ConvertedType, LogicalType, Type as PhysicalType},
    schema::types::ColumnDescriptor,
};

use super::data_type::NativeValue;
use crate::{
    common::bit,
    errors::{DecodeError, DecodeResult},
};

/// Element type of a decoded column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GdfDType {
    /// Placeholder for Parquet BOOLEAN, one byte holding 0 or 1
    Int8,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl GdfDType {
    /// Maps a Parquet leaf column to the type of its decoded buffer.
    ///
    /// Returns `NotImplemented` for physical types without a fixed-width mapping and for
    /// logical annotations whose values would be silently misread as plain numbers.
    pub fn from_descriptor(desc: &ColumnDescriptor) -> DecodeResult<Self> {
        if let Some(logical_type) = desc.logical_type() {
            match logical_type {
                LogicalType::Integer { .. }
                | LogicalType::Date
                | LogicalType::Time { .. }
                | LogicalType::Timestamp { .. } => {}
                other => {
                    return Err(nyi_err!(
                        "Unsupported logical type {:?} for column {}",
                        other,
                        desc.path()
                    ))
                }
            }
        } else {
            // files written before logical types only carry the converted type
            match desc.converted_type() {
                ConvertedType::NONE
                | ConvertedType::INT_8
                | ConvertedType::INT_16
                | ConvertedType::INT_32
                | ConvertedType::INT_64
                | ConvertedType::UINT_8
                | ConvertedType::UINT_16
                | ConvertedType::UINT_32
                | ConvertedType::UINT_64
                | ConvertedType::DATE
                | ConvertedType::TIME_MILLIS
                | ConvertedType::TIME_MICROS
                | ConvertedType::TIMESTAMP_MILLIS
                | ConvertedType::TIMESTAMP_MICROS => {}
                other => {
                    return Err(nyi_err!(
                        "Unsupported converted type {:?} for column {}",
                        other,
                        desc.path()
                    ))
                }
            }
        }

        match desc.physical_type() {
            PhysicalType::BOOLEAN => Ok(GdfDType::Int8),
            PhysicalType::INT32 => Ok(GdfDType::Int32),
            PhysicalType::INT64 => Ok(GdfDType::Int64),
            PhysicalType::FLOAT => Ok(GdfDType::Float32),
            PhysicalType::DOUBLE => Ok(GdfDType::Float64),
            other => Err(nyi_err!(
                "Unsupported physical type {} for column {}",
                other,
                desc.path()
            )),
        }
    }

    pub fn byte_width(&self) -> usize {
        match self {
            GdfDType::Int8 => 1,
            GdfDType::Int32 | GdfDType::Float32 => 4,
            GdfDType::Int64 | GdfDType::Float64 => 8,
        }
    }

    pub fn arrow_type(&self) -> ArrowDataType {
        match self {
            GdfDType::Int8 => ArrowDataType::Int8,
            GdfDType::Int32 => ArrowDataType::Int32,
            GdfDType::Int64 => ArrowDataType::Int64,
            GdfDType::Float32 => ArrowDataType::Float32,
            GdfDType::Float64 => ArrowDataType::Float64,
        }
    }
}

/// Typed value storage of a [`GdfColumn`].
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int8(Vec<i8>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl ColumnData {
    pub fn dtype(&self) -> GdfDType {
        match self {
            ColumnData::Int8(_) => GdfDType::Int8,
            ColumnData::Int32(_) => GdfDType::Int32,
            ColumnData::Int64(_) => GdfDType::Int64,
            ColumnData::Float32(_) => GdfDType::Float32,
            ColumnData::Float64(_) => GdfDType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int8(v) => v.len(),
            ColumnData::Int32(v) => v.len(),
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float32(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Allocates a zeroed vector of `len` elements, reporting allocation failure instead of
/// aborting.
fn try_zeroed<T: Copy + Default>(len: usize) -> DecodeResult<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)?;
    v.resize(len, T::default());
    Ok(v)
}

/// A decoded column: a typed value buffer, a validity bitmap with one bit per row (set for
/// valid rows), the number of rows written and how many of them are null.
///
/// The buffers are sized for the whole column up front, then filled one row group at a time
/// by [`ColumnReader::to_gdf_column`](super::read::ColumnReader::to_gdf_column).
#[derive(Debug, Clone, PartialEq)]
pub struct GdfColumn {
    data: ColumnData,

    /// Bit `i` set means row `i` is valid. `ceil(capacity / 8)` bytes.
    valid: Vec<u8>,

    /// Number of rows written so far.
    size: usize,

    null_count: usize,
}

impl GdfColumn {
    /// Creates a column with room for `capacity` rows. Fails with `Allocation` if the buffers
    /// cannot be acquired.
    pub fn try_new(dtype: GdfDType, capacity: usize) -> DecodeResult<Self> {
        let data = match dtype {
            GdfDType::Int8 => ColumnData::Int8(try_zeroed(capacity)?),
            GdfDType::Int32 => ColumnData::Int32(try_zeroed(capacity)?),
            GdfDType::Int64 => ColumnData::Int64(try_zeroed(capacity)?),
            GdfDType::Float32 => ColumnData::Float32(try_zeroed(capacity)?),
            GdfDType::Float64 => ColumnData::Float64(try_zeroed(capacity)?),
        };
        let valid = try_zeroed(capacity.div_ceil(8))?;
        Ok(Self {
            data,
            valid,
            size: 0,
            null_count: 0,
        })
    }

    #[inline]
    pub fn dtype(&self) -> GdfDType {
        self.data.dtype()
    }

    /// Maximum number of rows this column can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of rows written.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn null_count(&self) -> usize {
        self.null_count
    }

    #[inline]
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// The validity bitmap covering the `size` rows written so far.
    #[inline]
    pub fn valid_bits(&self) -> &[u8] {
        &self.valid[..self.size.div_ceil(8)]
    }

    #[inline]
    pub fn is_valid(&self, idx: usize) -> bool {
        idx < self.size && bit::get_bit(&self.valid, idx)
    }

    /// Returns the written values as `N`, or `None` if `N` is not this column's element type.
    pub fn values<N: NativeValue>(&self) -> Option<&[N]> {
        N::column_values(&self.data).map(|v| &v[..self.size])
    }

    /// Splits the column into its full value buffer (typed as `N`) and validity bitmap, for
    /// decoders that write rows in place.
    pub(crate) fn buffers_mut<N: NativeValue>(&mut self) -> DecodeResult<(&mut [N], &mut [u8])> {
        let dtype = self.data.dtype();
        match N::column_values_mut(&mut self.data) {
            Some(values) => Ok((values, &mut self.valid)),
            None => Err(DecodeError::Internal(format!(
                "Column of type {dtype:?} cannot hold values of type {:?}",
                N::DTYPE
            ))),
        }
    }

    /// Records that rows `[offset, offset + rows)` were written, `nulls` of which are null.
    pub(crate) fn commit_rows(&mut self, offset: usize, rows: usize, nulls: usize) {
        self.size = self.size.max(offset + rows);
        self.null_count += nulls;
    }

    /// Converts the written rows into an Arrow [`ArrayData`]. The buffers are copied, so the
    /// result does not borrow from this column.
    pub fn to_array_data(&self) -> DecodeResult<ArrayData> {
        let value_buffer = match &self.data {
            ColumnData::Int8(v) => to_buffer(&v[..self.size]),
            ColumnData::Int32(v) => to_buffer(&v[..self.size]),
            ColumnData::Int64(v) => to_buffer(&v[..self.size]),
            ColumnData::Float32(v) => to_buffer(&v[..self.size]),
            ColumnData::Float64(v) => to_buffer(&v[..self.size]),
        };
        let data = ArrayData::builder(self.dtype().arrow_type())
            .len(self.size)
            .add_buffer(value_buffer)
            .null_bit_buffer(Some(Buffer::from(self.valid_bits())))
            .null_count(self.null_count)
            .build()?;
        Ok(data)
    }
}

fn to_buffer<T: ArrowNativeType>(values: &[T]) -> Buffer {
    Buffer::from_slice_ref(values)
}
