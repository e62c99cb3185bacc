//! Redundant line row elimination.
//!
//! A single greedy pass over the decoded rows that keeps only statement
//! boundaries mapping to a distinct address or source location.

use crate::program::LineRow;

/// Removes redundant rows in place.
///
/// - `end_sequence` rows are kept verbatim. The first row of each sequence is
///   always kept.
/// - Every kept row other than an `end_sequence` row is marked `is_stmt`,
///   including the first row of a sequence.
/// - A row at the same address as the last kept row replaces it.
/// - When the last two kept rows of a sequence share `(line, file)`, the newer
///   one is dropped together with every following row on that same
///   `(line, file)`.
pub fn optimize(rows: &mut Vec<LineRow>) {
    let mut kept: Vec<LineRow> = Vec::with_capacity(rows.len());
    let mut pos = 0;

    while pos < rows.len() {
        let mut row = rows[pos];
        // Applies to sequence-opening rows as well; only end rows keep the
        // decoded flag.
        if !row.end_sequence {
            row.is_stmt = true;
        }

        let n = kept.len();
        if n == 0 || row.end_sequence || kept[n - 1].end_sequence {
            kept.push(row);
            pos += 1;
        } else if kept[n - 1].address == row.address {
            kept[n - 1] = row;
            pos += 1;
        } else if n >= 2 && same_location(&kept[n - 2], &kept[n - 1]) {
            let before = kept[n - 2];
            kept.pop();
            // The current row is looked at again against the shortened list.
            while pos < rows.len() && same_location(&before, &rows[pos]) {
                pos += 1;
            }
        } else {
            kept.push(row);
            pos += 1;
        }
    }

    *rows = kept;
}

/// Whether two rows of one sequence map to the same `(line, file)`.
fn same_location(earlier: &LineRow, later: &LineRow) -> bool {
    !earlier.end_sequence
        && !later.end_sequence
        && earlier.line == later.line
        && earlier.file == later.file
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn row(address: u32, line: i32) -> LineRow {
        LineRow {
            address,
            line,
            file: 1,
            column: 0,
            discriminator: 0,
            is_stmt: false,
            end_sequence: false,
        }
    }

    fn end(address: u32) -> LineRow {
        LineRow {
            end_sequence: true,
            ..row(address, 1)
        }
    }

    fn addr_lines(rows: &[LineRow]) -> Vec<(u32, i32, bool)> {
        rows.iter()
            .map(|r| (r.address, r.line, r.end_sequence))
            .collect()
    }

    #[test]
    fn empty_input() {
        let mut rows = Vec::new();
        optimize(&mut rows);
        assert!(rows.is_empty());
    }

    #[test]
    fn same_address_last_writer_wins() {
        let mut rows = vec![row(0x10, 1), row(0x14, 2), row(0x14, 3), end(0x20)];
        optimize(&mut rows);
        assert_eq!(
            addr_lines(&rows),
            [(0x10, 1, false), (0x14, 3, false), (0x20, 1, true)]
        );
    }

    #[test]
    fn repeated_line_is_collapsed() {
        let mut rows = vec![
            row(0x10, 5),
            row(0x14, 5),
            row(0x18, 5),
            row(0x1c, 5),
            row(0x20, 6),
            end(0x24),
        ];
        optimize(&mut rows);
        assert_eq!(
            addr_lines(&rows),
            [(0x10, 5, false), (0x20, 6, false), (0x24, 1, true)]
        );
    }

    #[test]
    fn distinct_files_are_not_collapsed() {
        let mut rows = vec![row(0x10, 5), row(0x14, 5), row(0x18, 7), end(0x20)];
        rows[1].file = 2;
        optimize(&mut rows);
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn sequence_boundaries_are_kept() {
        let mut rows = vec![
            row(0x10, 3),
            end(0x20),
            row(0x10, 3),
            row(0x14, 3),
            row(0x18, 4),
            end(0x30),
        ];
        optimize(&mut rows);
        assert_eq!(
            addr_lines(&rows),
            [
                (0x10, 3, false),
                (0x20, 1, true),
                (0x10, 3, false),
                (0x18, 4, false),
                (0x30, 1, true),
            ]
        );
    }

    #[test]
    fn sequence_start_is_not_collapsed_into_end_row() {
        // The end row and the next sequence's first row share (line, file).
        let mut rows = vec![row(0x10, 1), end(0x20), row(0x40, 1), row(0x44, 2), end(0x50)];
        optimize(&mut rows);
        assert_eq!(rows.len(), 5);
    }

    #[test]
    fn is_stmt_forced_except_on_end_rows() {
        let mut rows = vec![row(0x10, 1), row(0x14, 2), end(0x20)];
        optimize(&mut rows);
        assert!(rows[0].is_stmt);
        assert!(rows[1].is_stmt);
        assert!(!rows[2].is_stmt);
    }

    fn arb_rows() -> impl Strategy<Value = Vec<LineRow>> {
        prop::collection::vec(
            (0u32..8, 1i32..4, 1u32..3, any::<bool>(), prop::bool::weighted(0.15)),
            0..40,
        )
        .prop_map(|items| {
            items
                .into_iter()
                .map(|(address, line, file, is_stmt, end_sequence)| LineRow {
                    address: address * 4,
                    line,
                    file,
                    column: 0,
                    discriminator: 0,
                    is_stmt,
                    end_sequence,
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn optimize_is_idempotent(rows in arb_rows()) {
            let mut once = rows;
            optimize(&mut once);
            let mut twice = once.clone();
            optimize(&mut twice);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn end_rows_survive(rows in arb_rows()) {
            let ends = rows.iter().filter(|r| r.end_sequence).count();
            let mut out = rows;
            optimize(&mut out);
            prop_assert_eq!(out.iter().filter(|r| r.end_sequence).count(), ends);
        }
    }
}
