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

use std::{sync::Arc, time::Duration};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use gdf_parquet::parquet::{
    util::test_common::{page_util::*, random_def_levels, random_numbers_range},
    ColumnReader, GdfColumn, GdfDType, InMemoryPageSource, Page, ReadOptions,
};
use parquet::basic::{Repetition, Type as PhysicalType};

const NUM_PAGES: usize = 16;
const VALUES_PER_PAGE: usize = 16 * 1024;
const DICT_SIZE: u64 = 1000;

/// Benchmark to measure decoding whole column chunks into a column.
/// To run this benchmark:
/// `cd core && cargo bench --features test_common --bench parquet_decode`
fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("parquet_decode");
    let num_rows = NUM_PAGES * VALUES_PER_PAGE;

    for null_density in [0.0, 0.1, 0.5] {
        let (max_def_level, repetition) = if null_density == 0.0 {
            (0, Repetition::REQUIRED)
        } else {
            (1, Repetition::OPTIONAL)
        };
        let desc = column_descriptor(PhysicalType::INT32, repetition, max_def_level, 0);

        let pages = build_pages(max_def_level, null_density, false);
        group.bench_with_input(
            BenchmarkId::new("INT32/PLAIN", format!("null_density_{null_density}")),
            &pages,
            |b, pages| {
                b.iter(|| decode(&desc, pages, num_rows));
            },
        );

        let pages = build_pages(max_def_level, null_density, true);
        group.bench_with_input(
            BenchmarkId::new("INT32/RLE_DICTIONARY", format!("null_density_{null_density}")),
            &pages,
            |b, pages| {
                b.iter(|| decode(&desc, pages, num_rows));
            },
        );
    }

    group.finish();
}

fn build_pages(max_def_level: i16, null_density: f64, dictionary: bool) -> Vec<Page> {
    let mut pages = Vec::with_capacity(NUM_PAGES + 1);
    if dictionary {
        let dict: Vec<i32> = (0..DICT_SIZE as i32).collect();
        pages.push(dictionary_page(&dict));
    }
    for _ in 0..NUM_PAGES {
        let def_levels = random_def_levels(VALUES_PER_PAGE, max_def_level, null_density);
        let num_values = def_levels.iter().filter(|l| **l == max_def_level).count();

        let mut builder = DataPageBuilder::new(VALUES_PER_PAGE, false);
        if max_def_level > 0 {
            builder.add_def_levels(max_def_level, &def_levels);
        }
        if dictionary {
            let mut indices = Vec::with_capacity(num_values);
            random_numbers_range(num_values, 0, DICT_SIZE, &mut indices);
            builder.add_indices(10, &indices);
        } else {
            let mut values = Vec::with_capacity(num_values);
            random_numbers_range(num_values, i32::MIN, i32::MAX, &mut values);
            builder.add_values(&values);
        }
        pages.push(builder.consume());
    }
    pages
}

fn decode(desc: &parquet::schema::types::ColumnDescPtr, pages: &[Page], num_rows: usize) {
    let mut column = GdfColumn::try_new(GdfDType::Int32, num_rows).unwrap();
    let mut reader = ColumnReader::try_new(
        Arc::clone(desc),
        Box::new(InMemoryPageSource::new(pages.to_vec())),
        ReadOptions::default(),
    )
    .unwrap();
    let rows = reader.to_gdf_column(&mut column, 0).unwrap();
    assert_eq!(rows, num_rows);
}

fn config() -> Criterion {
    Criterion::default()
        .measurement_time(Duration::from_secs(2))
        .sample_size(20)
}

criterion_group! {
    name = benches;
    config = config();
    targets = criterion_benchmark
}
criterion_main!(benches);
