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

use std::{
    cmp::{max, min},
    collections::{hash_map::Entry, HashMap},
};

use arrow::buffer::Buffer;
use log::{debug, trace, warn};
use parquet::{
    basic::{Encoding, Repetition},
    schema::types::{ColumnDescPtr, ColumnDescriptor},
};

use super::{
    bitmap::{def_levels_to_bitmap, scatter_in_place},
    levels::LevelDecoder,
    values::{Decoder, DecoderKey, DictDecoder, PlainDecoder},
    ReadOptions,
};
use crate::{
    common::bit,
    errors::{DecodeError, DecodeResult},
    parquet::{
        data_type::*,
        gdf_column::{GdfColumn, GdfDType},
        page::{Page, PageSource},
    },
};

/// Outcome of [`TypedColumnReader::read_batch_spaced`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpacedBatch {
    /// Number of levels consumed from the page.
    pub levels_read: usize,
    /// Number of rows (validity bits and value slots) produced.
    pub rows: usize,
    /// Number of non-null values decoded.
    pub values_read: usize,
    pub null_count: usize,
}

pub enum ColumnReader {
    BoolColumnReader(TypedColumnReader<BoolType>),
    Int32ColumnReader(TypedColumnReader<Int32Type>),
    Int64ColumnReader(TypedColumnReader<Int64Type>),
    FloatColumnReader(TypedColumnReader<FloatType>),
    DoubleColumnReader(TypedColumnReader<DoubleType>),
}

impl ColumnReader {
    /// Creates a reader for the column chunk described by `desc`, whose pages come from
    /// `page_source`.
    ///
    /// Fails with `NotImplemented` if the column's physical or logical type has no decoded
    /// representation.
    pub fn try_new(
        desc: ColumnDescPtr,
        page_source: Box<dyn PageSource>,
        read_options: ReadOptions,
    ) -> DecodeResult<Self> {
        let dtype = GdfDType::from_descriptor(&desc)?;
        debug!(
            "Creating {:?} reader for column {} (max def level {}, max rep level {})",
            dtype,
            desc.path(),
            desc.max_def_level(),
            desc.max_rep_level()
        );

        macro_rules! typed_reader {
            ($reader_ty:ident, $dt:ty) => {
                Self::$reader_ty(TypedColumnReader::<$dt>::new(desc, page_source, read_options))
            };
        }

        Ok(match dtype {
            GdfDType::Int8 => typed_reader!(BoolColumnReader, BoolType),
            GdfDType::Int32 => typed_reader!(Int32ColumnReader, Int32Type),
            GdfDType::Int64 => typed_reader!(Int64ColumnReader, Int64Type),
            GdfDType::Float32 => typed_reader!(FloatColumnReader, FloatType),
            GdfDType::Float64 => typed_reader!(DoubleColumnReader, DoubleType),
        })
    }
}

macro_rules! make_func {
    ($self:ident, $func:ident $(,$args:ident)*) => ({
        match *$self {
            Self::BoolColumnReader(ref typed) => typed.$func($($args),*),
            Self::Int32ColumnReader(ref typed) => typed.$func($($args),*),
            Self::Int64ColumnReader(ref typed) => typed.$func($($args),*),
            Self::FloatColumnReader(ref typed) => typed.$func($($args),*),
            Self::DoubleColumnReader(ref typed) => typed.$func($($args),*),
        }
    });
}

macro_rules! make_func_mut {
    ($self:ident, $func:ident $(,$args:ident)*) => ({
        match *$self {
            Self::BoolColumnReader(ref mut typed) => typed.$func($($args),*),
            Self::Int32ColumnReader(ref mut typed) => typed.$func($($args),*),
            Self::Int64ColumnReader(ref mut typed) => typed.$func($($args),*),
            Self::FloatColumnReader(ref mut typed) => typed.$func($($args),*),
            Self::DoubleColumnReader(ref mut typed) => typed.$func($($args),*),
        }
    });
}

impl ColumnReader {
    #[inline]
    pub fn get_descriptor(&self) -> &ColumnDescriptor {
        make_func!(self, get_descriptor)
    }

    /// Element type of the column this reader produces.
    pub fn dtype(&self) -> GdfDType {
        match self {
            Self::BoolColumnReader(_) => GdfDType::Int8,
            Self::Int32ColumnReader(_) => GdfDType::Int32,
            Self::Int64ColumnReader(_) => GdfDType::Int64,
            Self::FloatColumnReader(_) => GdfDType::Float32,
            Self::DoubleColumnReader(_) => GdfDType::Float64,
        }
    }

    #[inline]
    pub fn has_next(&mut self) -> DecodeResult<bool> {
        make_func_mut!(self, has_next)
    }

    #[inline]
    pub fn to_gdf_column(&mut self, column: &mut GdfColumn, offset: usize) -> DecodeResult<usize> {
        make_func_mut!(self, to_gdf_column, column, offset)
    }
}

/// A batched reader for a primitive Parquet column chunk.
pub struct TypedColumnReader<T: DataType> {
    desc: ColumnDescPtr,
    page_source: Box<dyn PageSource>,
    read_options: ReadOptions,

    rep_level_decoder: LevelDecoder,
    def_level_decoder: LevelDecoder,

    /// Value decoders created so far, at most one per key. The dictionary decoder is only
    /// created by a dictionary page.
    decoders: HashMap<DecoderKey, Box<dyn Decoder<T>>>,
    /// Key of the decoder bound to the current data page.
    current_decoder: Option<DecoderKey>,

    /// Number of levels in the current data page
    num_buffered_values: usize,
    /// Number of levels of the current data page consumed so far
    num_decoded_values: usize,

    /// Scratch space for levels the caller did not ask for.
    def_levels: Vec<i16>,
    rep_levels: Vec<i16>,
}

impl<T: DataType> TypedColumnReader<T> {
    pub fn new(
        desc: ColumnDescPtr,
        page_source: Box<dyn PageSource>,
        read_options: ReadOptions,
    ) -> Self {
        let rep_level_decoder = LevelDecoder::new(desc.max_rep_level());
        let def_level_decoder = LevelDecoder::new(desc.max_def_level());
        Self {
            desc,
            page_source,
            read_options,
            rep_level_decoder,
            def_level_decoder,
            decoders: HashMap::new(),
            current_decoder: None,
            num_buffered_values: 0,
            num_decoded_values: 0,
            def_levels: Vec::new(),
            rep_levels: Vec::new(),
        }
    }

    #[inline]
    pub fn get_descriptor(&self) -> &ColumnDescriptor {
        &self.desc
    }

    /// Returns true if there are values left to read, loading the next data page when the
    /// current one is drained. Returns false at the end of the column chunk.
    pub fn has_next(&mut self) -> DecodeResult<bool> {
        if self.num_decoded_values < self.num_buffered_values {
            return Ok(true);
        }
        self.read_new_page()
    }

    /// Pulls pages from the page source until a non-empty data page is found and bound.
    /// Dictionary pages met on the way configure the dictionary decoder; other pages are
    /// skipped.
    ///
    /// Returns false when the page source is exhausted.
    pub fn read_new_page(&mut self) -> DecodeResult<bool> {
        loop {
            let page = match self.page_source.next_page()? {
                Some(page) => page,
                None => return Ok(false),
            };

            match page {
                Page::Dictionary {
                    buf,
                    num_values,
                    encoding,
                } => self.configure_dictionary(buf, num_values, encoding)?,
                Page::DataV1 {
                    buf,
                    num_values,
                    encoding,
                    def_level_encoding,
                    rep_level_encoding,
                } => {
                    if num_values == 0 {
                        debug!("Skipping empty data page of column {}", self.desc.path());
                        continue;
                    }
                    let mut offset = 0;
                    if self.desc.max_rep_level() > 0 {
                        offset += self.rep_level_decoder.set_data(
                            rep_level_encoding,
                            num_values,
                            &buf,
                        )?;
                    }
                    if self.desc.max_def_level() > 0 {
                        offset += self.def_level_decoder.set_data(
                            def_level_encoding,
                            num_values,
                            &buf.slice(offset),
                        )?;
                    }
                    self.set_data_page(encoding, num_values, buf.slice(offset))?;
                    return Ok(true);
                }
                Page::DataV2 {
                    buf,
                    num_values,
                    encoding,
                    rep_levels_byte_len,
                    def_levels_byte_len,
                } => {
                    if num_values == 0 {
                        debug!("Skipping empty data page of column {}", self.desc.path());
                        continue;
                    }
                    let levels_byte_len = rep_levels_byte_len + def_levels_byte_len;
                    if levels_byte_len > buf.len() {
                        return Err(protocol_err!(
                            "Levels of {} bytes exceed the page size of {} bytes",
                            levels_byte_len,
                            buf.len()
                        ));
                    }
                    if self.desc.max_rep_level() > 0 {
                        self.rep_level_decoder
                            .set_data_v2(num_values, buf.slice_with_length(0, rep_levels_byte_len))?;
                    }
                    if self.desc.max_def_level() > 0 {
                        self.def_level_decoder.set_data_v2(
                            num_values,
                            buf.slice_with_length(rep_levels_byte_len, def_levels_byte_len),
                        )?;
                    }
                    self.set_data_page(encoding, num_values, buf.slice(levels_byte_len))?;
                    return Ok(true);
                }
                Page::Other { page_type } => {
                    warn!(
                        "Skipping page of type {:?} in column {}",
                        page_type,
                        self.desc.path()
                    );
                }
            }
        }
    }

    /// Reads a dictionary page into a new dictionary decoder.
    fn configure_dictionary(
        &mut self,
        buf: Buffer,
        num_values: usize,
        encoding: Encoding,
    ) -> DecodeResult<()> {
        if self.decoders.contains_key(&DecoderKey::Dictionary) {
            return Err(protocol_err!("Column cannot have more than one dictionary"));
        }

        // v1 files label dictionary pages PLAIN_DICTIONARY, v2 files PLAIN
        match encoding {
            Encoding::PLAIN | Encoding::PLAIN_DICTIONARY => {}
            other => {
                return Err(nyi_err!(
                    "Only plain dictionary pages are supported, found {}",
                    other
                ))
            }
        }

        let mut dictionary = PlainDecoder::<T>::new();
        dictionary.set_data(num_values, buf)?;
        let mut decoder = DictDecoder::<T>::new();
        decoder.set_dict(&mut dictionary, num_values)?;
        self.decoders
            .insert(DecoderKey::Dictionary, Box::new(decoder));

        debug!(
            "Configured dictionary of {} values for column {}",
            num_values,
            self.desc.path()
        );
        Ok(())
    }

    /// Binds the value section of a data page to the decoder of its encoding.
    fn set_data_page(
        &mut self,
        encoding: Encoding,
        num_values: usize,
        value_data: Buffer,
    ) -> DecodeResult<()> {
        let key = DecoderKey::from_encoding(encoding)?;
        let decoder = match self.decoders.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => match key {
                DecoderKey::Plain => entry.insert(Box::new(PlainDecoder::<T>::new())),
                DecoderKey::Dictionary => {
                    return Err(protocol_err!("Dictionary page must be before data page"))
                }
            },
        };
        decoder.set_data(num_values, value_data)?;

        self.current_decoder = Some(key);
        self.num_buffered_values = num_values;
        self.num_decoded_values = 0;
        debug!(
            "Loaded {} data page of {} values for column {}",
            encoding,
            num_values,
            self.desc.path()
        );
        Ok(())
    }

    /// Reads up to `batch_size` levels and the values they define from the current page,
    /// loading a new page first if needed.
    ///
    /// Definition levels are written to `def_levels` and repetition levels to `rep_levels` when
    /// given. Non-null values are written densely to the front of `values`.
    ///
    /// Returns `(levels_read, values_read)`. For a column without definition levels both are
    /// the number of values read. `(0, 0)` means the column chunk is exhausted.
    pub fn read_batch(
        &mut self,
        batch_size: usize,
        def_levels: Option<&mut [i16]>,
        rep_levels: Option<&mut [i16]>,
        values: &mut [T::Native],
    ) -> DecodeResult<(usize, usize)> {
        if !self.has_next()? {
            return Ok((0, 0));
        }
        let max_def_level = self.desc.max_def_level();
        let batch_size = self.clamp_batch_size(
            batch_size,
            def_levels.as_deref(),
            rep_levels.as_deref(),
            values.len(),
        );

        let mut num_def_levels = 0;
        let mut values_to_read = batch_size;
        if max_def_level > 0 {
            let levels = self.read_def_levels(batch_size, def_levels)?;
            num_def_levels = levels.len();
            values_to_read = levels.iter().filter(|l| **l == max_def_level).count();
        }
        self.read_rep_levels(batch_size, rep_levels)?;

        let values_read = self.read_values(&mut values[..values_to_read])?;
        let total = max(num_def_levels, values_read);
        self.num_decoded_values += total;
        trace!(
            "Read {} levels and {} values of column {}",
            total,
            values_read,
            self.desc.path()
        );
        Ok((total, values_read))
    }

    /// Like [`Self::read_batch`], but places values at their row position: bit
    /// `valid_bits_offset + i` of `valid_bits` is set iff row `i` holds a value in
    /// `values[i]`. Null rows hold unspecified values.
    ///
    /// For columns whose nulls are not represented as rows (required leaves, or repeated
    /// paths with a required leaf) this is the dense read with every value marked valid.
    pub fn read_batch_spaced(
        &mut self,
        batch_size: usize,
        def_levels: Option<&mut [i16]>,
        rep_levels: Option<&mut [i16]>,
        values: &mut [T::Native],
        valid_bits: &mut [u8],
        valid_bits_offset: usize,
    ) -> DecodeResult<SpacedBatch> {
        if !self.has_next()? {
            return Ok(SpacedBatch::default());
        }

        if !self.has_spaced_nulls() {
            let (levels_read, values_read) =
                self.read_batch(batch_size, def_levels, rep_levels, values)?;
            check_bitmap_capacity(valid_bits, valid_bits_offset, values_read)?;
            bit::set_bits(valid_bits, valid_bits_offset, values_read);
            return Ok(SpacedBatch {
                levels_read,
                rows: values_read,
                values_read,
                null_count: 0,
            });
        }

        let max_def_level = self.desc.max_def_level();
        let max_rep_level = self.desc.max_rep_level();
        let batch_size = self.clamp_batch_size(
            batch_size,
            def_levels.as_deref(),
            rep_levels.as_deref(),
            values.len(),
        );

        let levels = self.read_def_levels(batch_size, def_levels)?;
        let stats = def_levels_to_bitmap(
            levels,
            max_def_level,
            max_rep_level,
            valid_bits,
            valid_bits_offset,
        )?;
        self.read_rep_levels(batch_size, rep_levels)?;

        let decoder = current_decoder(&mut self.decoders, self.current_decoder)?;
        let covered = decoder.decode_spaced(
            &mut values[..stats.rows],
            stats.null_count,
            valid_bits,
            valid_bits_offset,
        )?;
        let values_read = stats.rows - stats.null_count;
        if covered < stats.rows {
            return Err(protocol_err!(
                "Expected {} values in column {}, the page ended early",
                values_read,
                self.desc.path()
            ));
        }

        self.num_decoded_values += batch_size;
        trace!(
            "Read {} levels into {} rows ({} nulls) of column {}",
            batch_size,
            stats.rows,
            stats.null_count,
            self.desc.path()
        );
        Ok(SpacedBatch {
            levels_read: batch_size,
            rows: stats.rows,
            values_read,
            null_count: stats.null_count,
        })
    }

    /// Decodes the remaining pages of this column chunk into `column`, starting at row
    /// `offset`, and returns the number of rows written.
    ///
    /// Rows of successive column chunks (row groups) are concatenated by passing the running
    /// row count as `offset`.
    pub fn to_gdf_column(&mut self, column: &mut GdfColumn, offset: usize) -> DecodeResult<usize> {
        if self.desc.max_rep_level() > 0 {
            return Err(nyi_err!(
                "Nested column {} cannot be read into a flat column",
                self.desc.path()
            ));
        }
        let max_def_level = self.desc.max_def_level();
        let batch_size = self.read_options.batch_size;

        let (values, valid_bits) = column.buffers_mut::<T::Native>()?;
        let capacity = values.len();
        if offset > capacity {
            return Err(DecodeError::Internal(format!(
                "Row offset {} is beyond the column capacity {}",
                offset, capacity
            )));
        }

        let mut rows = 0;
        let mut null_count = 0;
        while self.has_next()? {
            let start = offset + rows;
            let batch_size = min(batch_size, capacity - start);
            if batch_size == 0 {
                return Err(DecodeError::Internal(format!(
                    "Column {} has more rows than the column capacity {}",
                    self.desc.path(),
                    capacity
                )));
            }

            let out = &mut values[start..start + batch_size];
            let (levels_read, values_read) = self.read_batch(batch_size, None, None, out)?;
            if max_def_level == 0 {
                bit::set_bits(valid_bits, start, values_read);
                rows += values_read;
                continue;
            }

            let stats = def_levels_to_bitmap(
                &self.def_levels[..levels_read],
                max_def_level,
                0,
                valid_bits,
                start,
            )?;
            if values_read < stats.rows {
                scatter_in_place(&mut out[..stats.rows], values_read, valid_bits, start)?;
            }
            rows += stats.rows;
            null_count += stats.null_count;
        }

        column.commit_rows(offset, rows, null_count);
        debug!(
            "Decoded {} rows ({} nulls) of column {} at row {}",
            rows,
            null_count,
            self.desc.path(),
            offset
        );
        Ok(rows)
    }

    /// Whether nulls of this column occupy a row of their own.
    fn has_spaced_nulls(&self) -> bool {
        if self.desc.max_rep_level() > 0 {
            let info = self.desc.self_type().get_basic_info();
            info.has_repetition() && info.repetition() == Repetition::OPTIONAL
        } else {
            self.desc.max_def_level() > 0
        }
    }

    /// Bounds `batch_size` by the levels left in the current page, and by the lengths of the
    /// output slices that will be written.
    fn clamp_batch_size(
        &self,
        batch_size: usize,
        def_levels: Option<&[i16]>,
        rep_levels: Option<&[i16]>,
        num_values: usize,
    ) -> usize {
        let mut batch_size = min(
            min(batch_size, num_values),
            self.num_buffered_values - self.num_decoded_values,
        );
        if self.desc.max_def_level() > 0 {
            if let Some(levels) = def_levels {
                batch_size = min(batch_size, levels.len());
            }
        }
        if self.desc.max_rep_level() > 0 {
            if let Some(levels) = rep_levels {
                batch_size = min(batch_size, levels.len());
            }
        }
        batch_size
    }

    /// Decodes exactly `batch_size` definition levels into `def_levels`, or into the scratch
    /// buffer if `None`.
    fn read_def_levels<'a>(
        &'a mut self,
        batch_size: usize,
        def_levels: Option<&'a mut [i16]>,
    ) -> DecodeResult<&'a [i16]> {
        let levels = match def_levels {
            Some(levels) => &mut levels[..batch_size],
            None => {
                if self.def_levels.len() < batch_size {
                    self.def_levels.resize(batch_size, 0);
                }
                &mut self.def_levels[..batch_size]
            }
        };
        let num_levels = self.def_level_decoder.read_batch(levels)?;
        if num_levels < batch_size {
            return Err(protocol_err!(
                "Expected {} definition levels in column {}, decoded {}",
                batch_size,
                self.desc.path(),
                num_levels
            ));
        }
        Ok(&*levels)
    }

    /// Decodes `batch_size` repetition levels, into `rep_levels` if given. Repetition levels
    /// are always consumed so they stay in step with the definition levels.
    fn read_rep_levels(
        &mut self,
        batch_size: usize,
        rep_levels: Option<&mut [i16]>,
    ) -> DecodeResult<()> {
        if self.desc.max_rep_level() == 0 {
            return Ok(());
        }
        let levels = match rep_levels {
            Some(levels) => &mut levels[..batch_size],
            None => {
                if self.rep_levels.len() < batch_size {
                    self.rep_levels.resize(batch_size, 0);
                }
                &mut self.rep_levels[..batch_size]
            }
        };
        let num_levels = self.rep_level_decoder.read_batch(levels)?;
        if num_levels != batch_size {
            return Err(protocol_err!(
                "Number of decoded rep / def levels did not match in column {}: {} vs {}",
                self.desc.path(),
                num_levels,
                batch_size
            ));
        }
        Ok(())
    }

    /// Decodes exactly `values.len()` values with the current decoder.
    fn read_values(&mut self, values: &mut [T::Native]) -> DecodeResult<usize> {
        let decoder = current_decoder(&mut self.decoders, self.current_decoder)?;
        let values_read = decoder.decode(values)?;
        if values_read < values.len() {
            return Err(protocol_err!(
                "Expected {} values in column {}, decoded {}",
                values.len(),
                self.desc.path(),
                values_read
            ));
        }
        Ok(values_read)
    }
}

#[inline]
fn current_decoder<T: DataType>(
    decoders: &mut HashMap<DecoderKey, Box<dyn Decoder<T>>>,
    key: Option<DecoderKey>,
) -> DecodeResult<&mut Box<dyn Decoder<T>>> {
    key.and_then(|key| decoders.get_mut(&key))
        .ok_or_else(|| DecodeError::Internal("No data page has been loaded".to_owned()))
}

fn check_bitmap_capacity(valid_bits: &[u8], offset: usize, rows: usize) -> DecodeResult<()> {
    if valid_bits.len() * 8 < offset + rows {
        return Err(DecodeError::Internal(format!(
            "Validity bitmap of {} bytes cannot hold {} rows at offset {}",
            valid_bits.len(),
            rows,
            offset
        )));
    }
    Ok(())
}
