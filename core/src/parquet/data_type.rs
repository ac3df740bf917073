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

use arrow::datatypes::ArrowNativeType;
use bytes::{Buf, BufMut};
use parquet::basic::Type as PhysicalType;

use super::{
    gdf_column::{ColumnData, GdfDType},
    read::PlainDecoding,
};

/// A Parquet physical type this crate can decode. The decoded element type is
/// `<Self as PlainDecoding>::Native`.
pub trait DataType: PlainDecoding + Send + 'static {
    const PHYSICAL_TYPE: PhysicalType;
}

macro_rules! make_type {
    ($name:ident, $physical_ty:ident) => {
        pub struct $name {}
        impl DataType for $name {
            const PHYSICAL_TYPE: PhysicalType = PhysicalType::$physical_ty;
        }
    };
}

make_type!(BoolType, BOOLEAN);
make_type!(Int32Type, INT32);
make_type!(Int64Type, INT64);
make_type!(FloatType, FLOAT);
make_type!(DoubleType, DOUBLE);

/// A fixed-width element of a decoded column buffer.
pub trait NativeValue: ArrowNativeType + PartialEq {
    const DTYPE: GdfDType;

    /// Reads one little-endian value from the front of `buf` and advances it.
    fn get_le(buf: &mut &[u8]) -> Self;

    /// Appends the little-endian PLAIN encoding of this value to `buf`.
    fn put_le(&self, buf: &mut Vec<u8>);

    fn column_values(data: &ColumnData) -> Option<&[Self]>;

    fn column_values_mut(data: &mut ColumnData) -> Option<&mut [Self]>;
}

macro_rules! make_native_value {
    ($ty:ty, $variant:ident, $get:ident, $put:ident) => {
        impl NativeValue for $ty {
            const DTYPE: GdfDType = GdfDType::$variant;

            #[inline]
            fn get_le(buf: &mut &[u8]) -> Self {
                buf.$get()
            }

            #[inline]
            fn put_le(&self, buf: &mut Vec<u8>) {
                buf.$put(*self)
            }

            fn column_values(data: &ColumnData) -> Option<&[Self]> {
                match data {
                    ColumnData::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }

            fn column_values_mut(data: &mut ColumnData) -> Option<&mut [Self]> {
                match data {
                    ColumnData::$variant(v) => Some(v.as_mut_slice()),
                    _ => None,
                }
            }
        }
    };
}

make_native_value!(i8, Int8, get_i8, put_i8);
make_native_value!(i32, Int32, get_i32_le, put_i32_le);
make_native_value!(i64, Int64, get_i64_le, put_i64_le);
make_native_value!(f32, Float32, get_f32_le, put_f32_le);
make_native_value!(f64, Float64, get_f64_le, put_f64_le);
