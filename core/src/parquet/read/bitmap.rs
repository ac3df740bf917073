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

//! Validity bitmaps from definition levels, and the compaction of densely decoded values
//! into their row slots.

use crate::{
    common::bit,
    errors::{DecodeError, DecodeResult},
};

/// Outcome of [`def_levels_to_bitmap`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitmapStats {
    /// Number of rows (bits) written.
    pub rows: usize,
    pub null_count: usize,
}

/// Writes one validity bit per row described by `def_levels` into `valid_bits`, starting at
/// bit `valid_bits_offset`.
///
/// A row is valid iff its level equals `max_def_level`. When the column is repeated
/// (`max_rep_level > 0`) only `max_def_level - 1` denotes a null leaf; lower levels mark an
/// empty or null ancestor and produce no row. Bits before `valid_bits_offset` are left alone.
pub fn def_levels_to_bitmap(
    def_levels: &[i16],
    max_def_level: i16,
    max_rep_level: i16,
    valid_bits: &mut [u8],
    valid_bits_offset: usize,
) -> DecodeResult<BitmapStats> {
    if valid_bits.len() * 8 < valid_bits_offset + def_levels.len() {
        return Err(DecodeError::Internal(format!(
            "Validity bitmap of {} bytes cannot hold {} rows at offset {}",
            valid_bits.len(),
            def_levels.len(),
            valid_bits_offset
        )));
    }

    let mut stats = BitmapStats::default();
    for &level in def_levels {
        if level > max_def_level {
            return Err(protocol_err!(
                "Definition level {} exceeds the maximum level {}",
                level,
                max_def_level
            ));
        }
        if level == max_def_level {
            bit::set_bit(valid_bits, valid_bits_offset + stats.rows);
            stats.rows += 1;
        } else if max_rep_level == 0 || level == max_def_level - 1 {
            bit::unset_bit(valid_bits, valid_bits_offset + stats.rows);
            stats.rows += 1;
            stats.null_count += 1;
        }
    }
    Ok(stats)
}

/// Returns the positions, relative to `valid_bits_offset`, of the set bits among the next
/// `rows` bits of `valid_bits`.
pub fn valid_positions(valid_bits: &[u8], valid_bits_offset: usize, rows: usize) -> Vec<usize> {
    (0..rows)
        .filter(|row| bit::get_bit(valid_bits, valid_bits_offset + row))
        .collect()
}

/// Moves the `num_dense` values at the front of `values` to the valid row positions of
/// `values`, as given by `valid_bits` from `valid_bits_offset`. Null slots keep whatever they
/// held.
///
/// The number of valid rows must equal `num_dense`.
pub fn scatter_in_place<T: Copy>(
    values: &mut [T],
    num_dense: usize,
    valid_bits: &[u8],
    valid_bits_offset: usize,
) -> DecodeResult<()> {
    let positions = valid_positions(valid_bits, valid_bits_offset, values.len());
    if positions.len() != num_dense {
        return Err(protocol_err!(
            "Expected {} valid rows for {} decoded values",
            positions.len(),
            num_dense
        ));
    }
    // A value only moves towards the back, so going back to front never overwrites a value
    // that has yet to move.
    for (dense, &row) in positions.iter().enumerate().rev() {
        values[row] = values[dense];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(valid_bits: &[u8], offset: usize, rows: usize) -> Vec<u8> {
        (0..rows)
            .map(|i| bit::get_bit(valid_bits, offset + i) as u8)
            .collect()
    }

    #[test]
    fn test_flat_bitmap() {
        let mut valid_bits = vec![0u8; 1];
        let stats = def_levels_to_bitmap(&[2, 2, 1, 2, 0, 2], 2, 0, &mut valid_bits, 0).unwrap();
        assert_eq!(
            stats,
            BitmapStats {
                rows: 6,
                null_count: 2
            }
        );
        assert_eq!(bits(&valid_bits, 0, 6), vec![1, 1, 0, 1, 0, 1]);
        assert_eq!(valid_bits[0], 0b0010_1011);
    }

    #[test]
    fn test_all_valid() {
        let levels = vec![3i16; 21];
        let mut valid_bits = vec![0u8; 3];
        let stats = def_levels_to_bitmap(&levels, 3, 0, &mut valid_bits, 0).unwrap();
        assert_eq!(stats.rows, 21);
        assert_eq!(stats.null_count, 0);
        assert_eq!(bit::count_set_bits(&valid_bits, 0, 21), 21);
    }

    #[test]
    fn test_repeated_bitmap() {
        // max_def 3: 2 is a null element, 1 and 0 are an empty or null list
        let mut valid_bits = vec![0u8; 2];
        let stats = def_levels_to_bitmap(&[3, 2, 1, 3, 0, 3, 2], 3, 1, &mut valid_bits, 0).unwrap();
        assert_eq!(
            stats,
            BitmapStats {
                rows: 5,
                null_count: 2
            }
        );
        assert_eq!(bits(&valid_bits, 0, 5), vec![1, 0, 1, 1, 0]);
    }

    #[test]
    fn test_offset_preserves_earlier_bits_and_clears_nulls() {
        let mut valid_bits = vec![0xFFu8, 0xFF];
        let stats = def_levels_to_bitmap(&[1, 0, 1, 0], 1, 0, &mut valid_bits, 5).unwrap();
        assert_eq!(stats.rows, 4);
        assert_eq!(stats.null_count, 2);
        assert_eq!(bits(&valid_bits, 0, 5), vec![1; 5]);
        assert_eq!(bits(&valid_bits, 5, 4), vec![1, 0, 1, 0]);
        assert!(bit::get_bit(&valid_bits, 9));
    }

    #[test]
    fn test_level_above_max() {
        let mut valid_bits = vec![0u8; 1];
        let result = def_levels_to_bitmap(&[1, 2], 1, 0, &mut valid_bits, 0);
        assert!(matches!(result, Err(DecodeError::Protocol(_))));
    }

    #[test]
    fn test_bitmap_too_small() {
        let mut valid_bits = vec![0u8; 1];
        let result = def_levels_to_bitmap(&[1; 9], 1, 0, &mut valid_bits, 0);
        assert!(matches!(result, Err(DecodeError::Internal(_))));
    }

    #[test]
    fn test_scatter_in_place() {
        assert_eq!(valid_positions(&[0b0000_0101], 0, 3), vec![0, 2]);
        assert_eq!(valid_positions(&[0b0010_1000], 3, 3), vec![0, 2]);

        let mut values = [5, 7, 0];
        scatter_in_place(&mut values, 2, &[0b0000_0101], 0).unwrap();
        assert_eq!(values[0], 5);
        assert_eq!(values[2], 7);

        let mut values = [1, 2, 3, 0, 0, 0, 0];
        // rows: null, 1, null, null, 2, 3, null
        scatter_in_place(&mut values, 3, &[0b0011_0010], 0).unwrap();
        assert_eq!(values[1], 1);
        assert_eq!(values[4], 2);
        assert_eq!(values[5], 3);

        let mut values = [1, 2, 0];
        let result = scatter_in_place(&mut values, 2, &[0b0000_0001], 0);
        assert!(matches!(result, Err(DecodeError::Protocol(_))));
    }
}
