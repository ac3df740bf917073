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

use std::collections::VecDeque;

use arrow::buffer::Buffer;
use parquet::{
    basic::{Encoding, PageType},
    column::page::{Page as ParquetPage, PageReader},
};

use crate::errors::DecodeResult;

/// A decompressed page of a column chunk.
#[derive(Debug, Clone)]
pub enum Page {
    Dictionary {
        buf: Buffer,
        num_values: usize,
        encoding: Encoding,
    },
    /// Data page v1: optional repetition levels, optional definition levels, then values.
    /// `num_values` counts levels, so it includes nulls.
    DataV1 {
        buf: Buffer,
        num_values: usize,
        encoding: Encoding,
        def_level_encoding: Encoding,
        rep_level_encoding: Encoding,
    },
    /// Data page v2: RLE levels of the declared byte lengths, without length prefix, then
    /// values.
    DataV2 {
        buf: Buffer,
        num_values: usize,
        encoding: Encoding,
        rep_levels_byte_len: usize,
        def_levels_byte_len: usize,
    },
    /// Any page this crate does not decode, such as index pages.
    Other { page_type: PageType },
}

impl Page {
    pub fn page_type(&self) -> PageType {
        match self {
            Page::Dictionary { .. } => PageType::DICTIONARY_PAGE,
            Page::DataV1 { .. } => PageType::DATA_PAGE,
            Page::DataV2 { .. } => PageType::DATA_PAGE_V2,
            Page::Other { page_type } => *page_type,
        }
    }

    /// Number of values (levels for data pages) in this page.
    pub fn num_values(&self) -> usize {
        match self {
            Page::Dictionary { num_values, .. }
            | Page::DataV1 { num_values, .. }
            | Page::DataV2 { num_values, .. } => *num_values,
            Page::Other { .. } => 0,
        }
    }
}

impl From<ParquetPage> for Page {
    #[allow(unreachable_patterns)]
    fn from(page: ParquetPage) -> Self {
        match page {
            ParquetPage::DictionaryPage {
                buf,
                num_values,
                encoding,
                ..
            } => Page::Dictionary {
                buf: Buffer::from(buf),
                num_values: num_values as usize,
                encoding,
            },
            ParquetPage::DataPage {
                buf,
                num_values,
                encoding,
                def_level_encoding,
                rep_level_encoding,
                ..
            } => Page::DataV1 {
                buf: Buffer::from(buf),
                num_values: num_values as usize,
                encoding,
                def_level_encoding,
                rep_level_encoding,
            },
            ParquetPage::DataPageV2 {
                buf,
                num_values,
                encoding,
                def_levels_byte_len,
                rep_levels_byte_len,
                ..
            } => Page::DataV2 {
                buf: Buffer::from(buf),
                num_values: num_values as usize,
                encoding,
                rep_levels_byte_len: rep_levels_byte_len as usize,
                def_levels_byte_len: def_levels_byte_len as usize,
            },
            other => Page::Other {
                page_type: other.page_type(),
            },
        }
    }
}

/// Supplies the pages of one column chunk, in file order.
pub trait PageSource: Send {
    /// Returns the next page, or `None` at the end of the column chunk.
    fn next_page(&mut self) -> DecodeResult<Option<Page>>;
}

/// Pages held in memory, mostly for tests and benchmarks.
#[derive(Debug, Default)]
pub struct InMemoryPageSource {
    pages: VecDeque<Page>,
}

impl InMemoryPageSource {
    pub fn new(pages: impl IntoIterator<Item = Page>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl PageSource for InMemoryPageSource {
    fn next_page(&mut self) -> DecodeResult<Option<Page>> {
        Ok(self.pages.pop_front())
    }
}

/// Adapts a `parquet` crate [`PageReader`], which takes care of page headers and
/// decompression.
pub struct ParquetPageSource {
    reader: Box<dyn PageReader>,
}

impl ParquetPageSource {
    pub fn new(reader: Box<dyn PageReader>) -> Self {
        Self { reader }
    }
}

impl PageSource for ParquetPageSource {
    fn next_page(&mut self) -> DecodeResult<Option<Page>> {
        Ok(self.reader.get_next_page()?.map(Page::from))
    }
}
