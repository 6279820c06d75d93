//! Majority-vote consensus.

use std::collections::BTreeMap;

use crate::config::{SymbolConfig, DEFAULT_GAP};
use crate::model::Alignment;

/// Column statistics gathered while building a consensus.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConsensusSummary {
    pub consensus: String,
    pub record_count: usize,
    pub column_count: usize,
    /// Counted symbols per column (gaps and `.` left out)
    pub column_counts: Vec<BTreeMap<u8, usize>>,
    pub gap_count: usize,
}

impl ConsensusSummary {
    /// Share of cells holding a gap, 0.0 for an empty alignment.
    pub fn gap_fraction(&self) -> f64 {
        let cells = self.record_count * self.column_count;
        if cells == 0 {
            0.0
        } else {
            self.gap_count as f64 / cells as f64
        }
    }
}

/// Computes a summary and consensus string for an alignment.
pub trait Summarizer {
    fn summarize(&self, alignment: &Alignment) -> (ConsensusSummary, String);
}

/// Simple majority rule: a column's most frequent symbol is emitted when it
/// is the only one at that count and its share reaches `threshold`.
#[derive(Debug, Clone, PartialEq)]
pub struct DumbConsensus {
    pub threshold: f64,
    /// Emitted for columns without a clear winner
    pub ambiguous: u8,
    /// Treat columns with a single counted symbol as ambiguous
    pub require_multiple: bool,
    pub gap: u8,
}

impl Default for DumbConsensus {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            ambiguous: b'X',
            require_multiple: false,
            gap: DEFAULT_GAP,
        }
    }
}

impl DumbConsensus {
    /// Default rule, counting `symbols.gap` as the gap.
    pub fn for_symbols(symbols: &SymbolConfig) -> Self {
        Self {
            gap: symbols.gap,
            ..Self::default()
        }
    }

    fn column_symbol(&self, counts: &BTreeMap<u8, usize>) -> u8 {
        let total: usize = counts.values().sum();
        if total == 0 || (self.require_multiple && total == 1) {
            return self.ambiguous;
        }
        let max = counts.values().copied().max().unwrap_or(0);
        let mut leaders = counts.iter().filter(|(_, n)| **n == max);
        match (leaders.next(), leaders.next()) {
            (Some((&symbol, &n)), None) if n as f64 / total as f64 >= self.threshold => symbol,
            _ => self.ambiguous,
        }
    }
}

impl Summarizer for DumbConsensus {
    fn summarize(&self, alignment: &Alignment) -> (ConsensusSummary, String) {
        let column_count = alignment.alignment_length();
        let mut summary = ConsensusSummary {
            record_count: alignment.sequence_count(),
            column_count,
            ..ConsensusSummary::default()
        };

        let mut consensus = Vec::with_capacity(column_count);
        for col in 0..column_count {
            let mut counts = BTreeMap::new();
            for symbol in alignment.column(col) {
                if symbol == self.gap {
                    summary.gap_count += 1;
                } else if symbol != b'.' {
                    *counts.entry(symbol).or_insert(0) += 1;
                }
            }
            consensus.push(self.column_symbol(&counts));
            summary.column_counts.push(counts);
        }

        let consensus = String::from_utf8_lossy(&consensus).into_owned();
        summary.consensus = consensus.clone();
        (summary, consensus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::fasta::parse_fasta_str;

    #[test]
    fn test_majority_consensus() {
        let aln = parse_fasta_str(">a\nACGT\n>b\nACGA\n>c\nACTA\n>d\nAC-A\n").unwrap();
        let (summary, consensus) = DumbConsensus::default().summarize(&aln);
        // col 2: G,G,T of 3 counted = 0.67 < 0.7; col 3: A,A,A,T = 0.75
        assert_eq!(consensus, "ACXA");
        assert_eq!(summary.consensus, consensus);
        assert_eq!(summary.record_count, 4);
        assert_eq!(summary.column_count, 4);
        assert_eq!(summary.gap_count, 1);
        assert_eq!(summary.column_counts[2].get(&b'G'), Some(&2));
        assert!((summary.gap_fraction() - 1.0 / 16.0).abs() < 1e-12);
    }

    #[test]
    fn test_tied_column_is_ambiguous() {
        let aln = parse_fasta_str(">a\nA\n>b\nC\n").unwrap();
        let consensus = DumbConsensus {
            threshold: 0.5,
            ..DumbConsensus::default()
        };
        assert_eq!(consensus.summarize(&aln).1, "X");
    }

    #[test]
    fn test_gap_only_column_is_ambiguous() {
        let aln = parse_fasta_str(">a\nA-\n>b\nA.\n").unwrap();
        assert_eq!(DumbConsensus::default().summarize(&aln).1, "AX");
    }

    #[test]
    fn test_configured_gap_symbol() {
        let aln = parse_fasta_str(">a\nA~\n>b\nA~\n>c\nAC\n").unwrap();
        let symbols = SymbolConfig {
            gap: b'~',
            ..SymbolConfig::default()
        };
        let (summary, consensus) = DumbConsensus::for_symbols(&symbols).summarize(&aln);
        assert_eq!(summary.gap_count, 2);
        assert_eq!(consensus, "AC");

        // With the default gap '~' is a residue outvoting C below the threshold
        let (summary, consensus) = DumbConsensus::default().summarize(&aln);
        assert_eq!(summary.gap_count, 0);
        assert_eq!(consensus, "AX");
    }

    #[test]
    fn test_require_multiple() {
        let aln = parse_fasta_str(">a\nAC\n>b\nA-\n").unwrap();
        let consensus = DumbConsensus {
            require_multiple: true,
            ..DumbConsensus::default()
        };
        assert_eq!(consensus.summarize(&aln).1, "AX");
        assert_eq!(DumbConsensus::default().summarize(&aln).1, "AC");
    }

    #[test]
    fn test_empty_alignment() {
        let (summary, consensus) = DumbConsensus::default().summarize(&Alignment::default());
        assert!(consensus.is_empty());
        assert_eq!(summary.gap_fraction(), 0.0);
    }
}
