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

//! Page decoding for Parquet column chunks.
//!
//! A [`read::ColumnReader`] pulls decompressed [`page::Page`]s from a [`page::PageSource`],
//! decodes their levels and values and writes the rows into a [`gdf_column::GdfColumn`].

pub mod data_type;
pub mod gdf_column;
pub mod page;
pub mod read;
pub mod util;

pub use gdf_column::{ColumnData, GdfColumn, GdfDType};
pub use page::{InMemoryPageSource, Page, PageSource, ParquetPageSource};
pub use read::{ColumnReader, ReadOptions, TypedColumnReader};
