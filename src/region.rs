//! Region location policies.
//!
//! Each policy looks at an [`Alignment`] and answers with the half-open
//! [`ColumnRange`] worth keeping, or a [`PolicyFailure`] saying why no such
//! range exists:
//!
//! - **Edges**: first and last column without any gap.
//! - **Running average**: sliding-window average of a per-column
//!   conservation bit, thresholded.
//! - **Running average, probe excluded**: same, ignoring the probe row.
//! - **Static**: a fixed number of columns either side of the alignment
//!   midpoint or of the probe location.

use thiserror::Error;

use crate::config::SymbolConfig;
use crate::model::{Alignment, ColumnRange};

/// Reasons a policy cannot produce a region. The alignment is dropped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyFailure {
    #[error("alignment has no records or no columns")]
    EmptyAlignment,

    #[error("records have different lengths")]
    RaggedAlignment,

    #[error("every column contains a gap")]
    NoGapFreeColumn,

    #[error("window size must be at least 1")]
    InvalidWindow,

    #[error("window size {window_size} is not smaller than the {columns} alignment columns")]
    WindowTooLarge { window_size: usize, columns: usize },

    #[error("no window of {window_size} columns reaches conservation {threshold}")]
    NoConservedWindow { window_size: usize, threshold: f64 },

    #[error("no probe record with residues found")]
    MissingProbe,

    #[error("static trimming needs a positive number of bases")]
    MissingBases,

    #[error("{bases} bases exceed the available flank ({left} left, {right} right)")]
    BasesOutOfBounds {
        bases: usize,
        left: usize,
        right: usize,
    },

    #[error("trimmed region is empty")]
    EmptyRegion,
}

/// Ensures the alignment has records, columns, and a single length.
pub fn check_trimmable(alignment: &Alignment) -> Result<usize, PolicyFailure> {
    if !alignment.is_valid_alignment {
        return Err(PolicyFailure::RaggedAlignment);
    }
    let columns = alignment.alignment_length();
    if alignment.is_empty() || columns == 0 {
        return Err(PolicyFailure::EmptyAlignment);
    }
    Ok(columns)
}

/// Finds the first and last column (both inclusive) without any gap.
///
/// Each side stops at the first gap-free column it meets; this is not a
/// search for the widest gap-free block.
pub fn find_edges(alignment: &Alignment, symbols: &SymbolConfig) -> Option<(usize, usize)> {
    let columns = alignment.alignment_length();
    let gap_free = |col: &usize| {
        alignment
            .iter()
            .all(|s| s.symbol_at(*col).is_some_and(|b| !symbols.is_gap(b)))
    };
    let start = (0..columns).find(gap_free)?;
    let end = (0..columns).rev().find(gap_free)?;
    Some((start, end))
}

/// Edges policy: keeps everything between the outermost gap-free columns.
pub fn edges_region(
    alignment: &Alignment,
    symbols: &SymbolConfig,
) -> Result<ColumnRange, PolicyFailure> {
    check_trimmable(alignment)?;
    let (start, end) = find_edges(alignment, symbols).ok_or(PolicyFailure::NoGapFreeColumn)?;
    Ok(ColumnRange::new(start, end + 1))
}

/// Number of gaps a column may hold and still have them ignored.
pub fn gap_allowance(proportion: f64, members: usize) -> usize {
    // f64::round rounds half away from zero
    (proportion * members as f64).round().max(0.0) as usize
}

/// Whether one column counts as conserved.
///
/// If the column holds no more than `allowance` gaps they are ignored,
/// otherwise they count as a symbol. Conserved means exactly one distinct
/// symbol is left.
pub fn column_is_conserved(column: &[u8], allowance: usize, gap: u8) -> bool {
    let gaps = column.iter().filter(|&&b| b == gap).count();
    let strip_gaps = gaps <= allowance;
    let mut seen: Option<u8> = None;
    for &symbol in column {
        if strip_gaps && symbol == gap {
            continue;
        }
        match seen {
            None => seen = Some(symbol),
            Some(first) if first == symbol => {}
            Some(_) => return false,
        }
    }
    seen.is_some()
}

/// One conservation bit per column.
///
/// `exclude` names a record (the probe) left out of every column.
pub fn conservation_indicator(
    alignment: &Alignment,
    proportion: f64,
    symbols: &SymbolConfig,
    exclude: Option<usize>,
) -> Vec<u8> {
    let members = alignment.sequence_count() - usize::from(exclude.is_some());
    let allowance = gap_allowance(proportion, members);
    let mut column = Vec::with_capacity(members);

    (0..alignment.alignment_length())
        .map(|col| {
            column.clear();
            column.extend(
                alignment
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| Some(*idx) != exclude)
                    .filter_map(|(_, s)| s.symbol_at(col)),
            );
            u8::from(column_is_conserved(&column, allowance, symbols.gap))
        })
        .collect()
}

/// Valid (non-padded) moving average with a uniform kernel.
///
/// Output length is `indicator.len() - window_size + 1`; empty when the
/// window is zero or longer than the input.
pub fn running_average(indicator: &[u8], window_size: usize) -> Vec<f64> {
    if window_size == 0 || window_size > indicator.len() {
        return Vec::new();
    }
    let width = window_size as f64;
    let mut sum: usize = indicator[..window_size].iter().map(|&b| b as usize).sum();
    let mut averages = Vec::with_capacity(indicator.len() - window_size + 1);
    averages.push(sum as f64 / width);
    for i in window_size..indicator.len() {
        sum += indicator[i] as usize;
        sum -= indicator[i - window_size] as usize;
        averages.push(sum as f64 / width);
    }
    averages
}

/// Turns window averages into a column range.
///
/// Starts at the first window reaching `threshold` and ends after the last
/// one, including that window's full extent.
pub fn select_windows(averages: &[f64], window_size: usize, threshold: f64) -> Option<ColumnRange> {
    let first = averages.iter().position(|&avg| avg >= threshold)?;
    let last = averages.iter().rposition(|&avg| avg >= threshold)?;
    Some(ColumnRange::new(first, last + window_size))
}

fn check_window(window_size: usize, columns: usize) -> Result<(), PolicyFailure> {
    if window_size == 0 {
        return Err(PolicyFailure::InvalidWindow);
    }
    if window_size >= columns {
        return Err(PolicyFailure::WindowTooLarge {
            window_size,
            columns,
        });
    }
    Ok(())
}

fn conserved_region(
    alignment: &Alignment,
    window_size: usize,
    threshold: f64,
    proportion: f64,
    symbols: &SymbolConfig,
    exclude: Option<usize>,
) -> Result<ColumnRange, PolicyFailure> {
    let columns = check_trimmable(alignment)?;
    check_window(window_size, columns)?;
    let indicator = conservation_indicator(alignment, proportion, symbols, exclude);
    let averages = running_average(&indicator, window_size);
    select_windows(&averages, window_size, threshold).ok_or(PolicyFailure::NoConservedWindow {
        window_size,
        threshold,
    })
}

/// Running-average policy over all records.
pub fn running_region(
    alignment: &Alignment,
    window_size: usize,
    threshold: f64,
    proportion: f64,
    symbols: &SymbolConfig,
) -> Result<ColumnRange, PolicyFailure> {
    conserved_region(alignment, window_size, threshold, proportion, symbols, None)
}

/// Running-average policy that ignores the probe row, so the probe cannot
/// break conservation by itself.
pub fn running_probe_region(
    alignment: &Alignment,
    window_size: usize,
    threshold: f64,
    proportion: f64,
    symbols: &SymbolConfig,
) -> Result<ColumnRange, PolicyFailure> {
    let probe = alignment
        .probe_index(symbols)
        .ok_or(PolicyFailure::MissingProbe)?;
    conserved_region(
        alignment,
        window_size,
        threshold,
        proportion,
        symbols,
        Some(probe),
    )
}

/// Bounds check for static trimming: `bases` must fit left of the anchor
/// start and right of the anchor end.
pub fn check_bases(bases: usize, columns: usize, anchor: ColumnRange) -> Result<(), PolicyFailure> {
    let left = anchor.start;
    let right = columns.saturating_sub(anchor.end);
    if bases > left || bases > right {
        return Err(PolicyFailure::BasesOutOfBounds { bases, left, right });
    }
    Ok(())
}

fn require_bases(bases: Option<usize>) -> Result<usize, PolicyFailure> {
    match bases {
        Some(bases) if bases > 0 => Ok(bases),
        _ => Err(PolicyFailure::MissingBases),
    }
}

/// Static policy anchored at the alignment midpoint: `bases` columns each side.
pub fn static_midpoint_region(
    alignment: &Alignment,
    bases: Option<usize>,
) -> Result<ColumnRange, PolicyFailure> {
    let columns = check_trimmable(alignment)?;
    let bases = require_bases(bases)?;
    let mid = columns / 2;
    check_bases(bases, columns, ColumnRange::new(mid, mid))?;
    Ok(ColumnRange::new(mid - bases, mid + bases))
}

/// Static policy anchored at the probe: the probe span plus `bases` columns
/// on each side.
pub fn static_probe_region(
    alignment: &Alignment,
    bases: Option<usize>,
    symbols: &SymbolConfig,
) -> Result<ColumnRange, PolicyFailure> {
    let columns = check_trimmable(alignment)?;
    let bases = require_bases(bases)?;
    let probe = alignment
        .probe_location(symbols)
        .ok_or(PolicyFailure::MissingProbe)?;
    check_bases(bases, columns, probe)?;
    Ok(ColumnRange::new(probe.start - bases, probe.end + bases))
}

/// The `bases` columns immediately left and right of the probe, with the
/// probe itself left out.
pub fn probe_flanks(
    alignment: &Alignment,
    bases: Option<usize>,
    symbols: &SymbolConfig,
) -> Result<[ColumnRange; 2], PolicyFailure> {
    let columns = check_trimmable(alignment)?;
    let bases = require_bases(bases)?;
    let probe = alignment
        .probe_location(symbols)
        .ok_or(PolicyFailure::MissingProbe)?;
    check_bases(bases, columns, probe)?;
    Ok([
        ColumnRange::new(probe.start - bases, probe.start),
        ColumnRange::new(probe.end, probe.end + bases),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::fasta::parse_fasta_str;
    use crate::model::Sequence;

    fn alignment(rows: &[&str]) -> Alignment {
        Alignment::new(
            rows.iter()
                .enumerate()
                .map(|(i, row)| Sequence::new(format!("seq{}", i + 1), *row))
                .collect(),
        )
    }

    #[test]
    fn test_edges_without_gaps() {
        let aln = alignment(&["ACGTACGT", "ACGTACGA", "TCGTACGT"]);
        let symbols = SymbolConfig::default();
        assert_eq!(find_edges(&aln, &symbols), Some((0, 7)));
        assert_eq!(edges_region(&aln, &symbols), Ok(ColumnRange::new(0, 8)));
    }

    #[test]
    fn test_edges_all_columns_gapped() {
        let aln = alignment(&["-C-T", "A-G-"]);
        let symbols = SymbolConfig::default();
        assert_eq!(find_edges(&aln, &symbols), None);
        assert_eq!(
            edges_region(&aln, &symbols),
            Err(PolicyFailure::NoGapFreeColumn)
        );
    }

    #[test]
    fn test_edges_first_transition_wins() {
        // Column 5 is gapped, yet both sides stop at their first clean column
        let aln = alignment(&["--ACG-TAC--", "-AACGTTACG-"]);
        let symbols = SymbolConfig::default();
        assert_eq!(find_edges(&aln, &symbols), Some((2, 8)));
    }

    #[test]
    fn test_gap_allowance_rounds_half_away_from_zero() {
        assert_eq!(gap_allowance(0.3, 4), 1);
        assert_eq!(gap_allowance(0.3, 5), 2);
        assert_eq!(gap_allowance(0.5, 1), 1);
        assert_eq!(gap_allowance(0.0, 10), 0);
    }

    #[test]
    fn test_gap_stripped_within_allowance() {
        // 4 records, column 5 gapped in record 2 only: allowance round(0.3*4)=1
        let aln = alignment(&["ACGTAGACGT", "ACGTA-ACGT", "ACGTAGACGT", "ACGTAGACGT"]);
        let indicator = conservation_indicator(&aln, 0.3, &SymbolConfig::default(), None);
        assert_eq!(indicator[5], 1);
        assert!(indicator.iter().all(|&b| b == 1));
    }

    #[test]
    fn test_gaps_beyond_allowance_break_conservation() {
        let aln = alignment(&["ACG", "A-G", "A-G", "ACG"]);
        let indicator = conservation_indicator(&aln, 0.3, &SymbolConfig::default(), None);
        assert_eq!(indicator, vec![1, 0, 1]);
    }

    #[test]
    fn test_column_all_gaps_stripped_is_not_conserved() {
        assert!(!column_is_conserved(b"--", 2, b'-'));
        assert!(column_is_conserved(b"--", 1, b'-'));
    }

    #[test]
    fn test_running_average_valid_convolution() {
        let averages = running_average(&[1, 1, 0, 1, 1], 2);
        assert_eq!(averages, vec![1.0, 0.5, 0.5, 1.0]);
        assert_eq!(running_average(&[1, 0, 1], 1), vec![1.0, 0.0, 1.0]);
        assert!(running_average(&[1, 0], 3).is_empty());
        assert!(running_average(&[1, 0], 0).is_empty());
    }

    #[test]
    fn test_running_region_adds_window_to_end() {
        // conserved columns 2..8 of 10
        let aln = alignment(&["ACGTACGTAC", "TTGTACGTGG", "GAGTACGTCA"]);
        let symbols = SymbolConfig::default();
        let region = running_region(&aln, 3, 1.0, 0.3, &symbols).unwrap();
        assert_eq!(region, ColumnRange::new(2, 8));
    }

    #[test]
    fn test_running_region_window_too_large() {
        let aln = alignment(&["ACGT", "ACGT"]);
        let symbols = SymbolConfig::default();
        assert_eq!(
            running_region(&aln, 4, 0.5, 0.3, &symbols),
            Err(PolicyFailure::WindowTooLarge {
                window_size: 4,
                columns: 4
            })
        );
        assert!(running_region(&aln, 10, 0.5, 0.3, &symbols).is_err());
        assert_eq!(
            running_region(&aln, 0, 0.5, 0.3, &symbols),
            Err(PolicyFailure::InvalidWindow)
        );
    }

    #[test]
    fn test_running_region_nothing_conserved() {
        let aln = alignment(&["ACGTAC", "CATGCA"]);
        let result = running_region(&aln, 2, 0.5, 0.3, &SymbolConfig::default());
        assert!(matches!(
            result,
            Err(PolicyFailure::NoConservedWindow { .. })
        ));
    }

    #[test]
    fn test_running_region_monotonic_in_threshold() {
        let aln = alignment(&[
            "ACGTTAGCATGCAAGTCCAT",
            "ACCTTAGCTTGCAAGACCTT",
            "AGGTTAGCATGCTAGTCCAA",
        ]);
        let symbols = SymbolConfig::default();
        let mut previous = usize::MAX;
        for step in 0..=10 {
            let threshold = step as f64 / 10.0;
            let width = running_region(&aln, 4, threshold, 0.3, &symbols)
                .map(|r| r.len())
                .unwrap_or(0);
            assert!(width <= previous, "width grew at threshold {threshold}");
            previous = width;
        }
    }

    #[test]
    fn test_running_probe_ignores_probe_row() {
        let content = ">seq1\nACGTACGT\n>seq2\nACGTACGT\n>probe\nTTTTTTTT\n";
        let aln = parse_fasta_str(content).unwrap();
        let symbols = SymbolConfig::default();
        assert!(running_region(&aln, 2, 1.0, 0.3, &symbols).is_err());
        assert_eq!(
            running_probe_region(&aln, 2, 1.0, 0.3, &symbols),
            Ok(ColumnRange::new(0, 8))
        );
    }

    #[test]
    fn test_excluded_row_not_counted_in_gap_allowance() {
        let aln = parse_fasta_str(">seq1\nA\n>seq2\n-\n>seq3\n-\n>target\nA\n").unwrap();
        let symbols = SymbolConfig {
            probe_id: "target".to_string(),
            ..SymbolConfig::default()
        };
        let target = aln.probe_index(&symbols);
        assert_eq!(target, Some(3));

        // 3 members allow round(1.2) = 1 gap, so both gaps count as a symbol
        assert_eq!(gap_allowance(0.4, 3), 1);
        assert_eq!(conservation_indicator(&aln, 0.4, &symbols, target), vec![0]);

        // 4 members allow round(1.6) = 2 gaps, which are then ignored
        assert_eq!(gap_allowance(0.4, 4), 2);
        assert_eq!(conservation_indicator(&aln, 0.4, &symbols, None), vec![1]);
    }

    #[test]
    fn test_running_probe_requires_probe() {
        let aln = alignment(&["ACGTACGT", "ACGTACGT"]);
        assert_eq!(
            running_probe_region(&aln, 2, 1.0, 0.3, &SymbolConfig::default()),
            Err(PolicyFailure::MissingProbe)
        );
    }

    #[test]
    fn test_static_midpoint() {
        let aln = alignment(&["AACCGGTTAA", "AACCGGTTAA"]);
        assert_eq!(
            static_midpoint_region(&aln, Some(3)),
            Ok(ColumnRange::new(2, 8))
        );
        assert_eq!(
            static_midpoint_region(&aln, Some(5)),
            Ok(ColumnRange::new(0, 10))
        );
    }

    #[test]
    fn test_static_midpoint_out_of_bounds() {
        let aln = alignment(&["AACCGGTTAA", "AACCGGTTAA"]);
        assert_eq!(
            static_midpoint_region(&aln, Some(6)),
            Err(PolicyFailure::BasesOutOfBounds {
                bases: 6,
                left: 5,
                right: 5
            })
        );
        assert_eq!(
            static_midpoint_region(&aln, None),
            Err(PolicyFailure::MissingBases)
        );
        assert_eq!(
            static_midpoint_region(&aln, Some(0)),
            Err(PolicyFailure::MissingBases)
        );
    }

    #[test]
    fn test_static_probe_and_flanks() {
        let content = ">seq1\nAACCGGTTAACC\n>probe\n----GGTT----\n";
        let aln = parse_fasta_str(content).unwrap();
        let symbols = SymbolConfig::default();
        assert_eq!(
            static_probe_region(&aln, Some(2), &symbols),
            Ok(ColumnRange::new(2, 10))
        );
        assert_eq!(
            probe_flanks(&aln, Some(2), &symbols),
            Ok([ColumnRange::new(2, 4), ColumnRange::new(8, 10)])
        );
        assert!(matches!(
            probe_flanks(&aln, Some(5), &symbols),
            Err(PolicyFailure::BasesOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_empty_and_ragged_alignments_fail() {
        let symbols = SymbolConfig::default();
        let empty = Alignment::default();
        assert_eq!(
            edges_region(&empty, &symbols),
            Err(PolicyFailure::EmptyAlignment)
        );
        assert_eq!(
            running_region(&empty, 2, 0.5, 0.3, &symbols),
            Err(PolicyFailure::EmptyAlignment)
        );

        let ragged = alignment(&["ACGT", "AC"]);
        assert_eq!(
            static_midpoint_region(&ragged, Some(1)),
            Err(PolicyFailure::RaggedAlignment)
        );
    }
}
