//! Data model for alignments.
//!
//! This module contains the data structures shared by every trimming stage:
//! - Sequence records (identifier, name, description, symbols)
//! - Alignments (equal-length records in one column coordinate system)
//! - Column ranges, used both for trim regions and the probe location
//!
//! Alignments are never trimmed in place: every column operation builds a new
//! [`Alignment`] and leaves the source untouched.

use std::borrow::Cow;

use crate::config::SymbolConfig;

/// A half-open column interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnRange {
    pub start: usize,
    pub end: usize,
}

impl ColumnRange {
    /// Creates a new range. `end` is exclusive.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of columns covered (0 if empty).
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the range covers no column.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl std::fmt::Display for ColumnRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Where the probe record's residues lie within the alignment.
pub type ProbeLocation = ColumnRange;

/// Represents a single sequence record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    /// The sequence identifier (first word of the FASTA header)
    pub id: String,
    /// Display name, the identifier unless the source format says otherwise
    pub name: String,
    /// Full header text (FASTA) or the identifier (NEXUS/PHYLIP)
    pub description: String,
    /// The aligned symbols
    data: Vec<u8>,
}

impl Sequence {
    /// Creates a new sequence from text.
    pub fn new(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self::from_bytes(id, data.into().into_bytes())
    }

    /// Creates a new sequence from raw symbol bytes.
    pub fn from_bytes(id: impl Into<String>, data: Vec<u8>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            description: id.clone(),
            id,
            data,
        }
    }

    /// Replaces the description, keeping everything else.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The raw symbols.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The symbols as text.
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// Gets the symbol at a specific column.
    pub fn symbol_at(&self, pos: usize) -> Option<u8> {
        self.data.get(pos).copied()
    }

    /// Builds a new record holding only the given columns. Metadata is kept.
    pub fn slice_columns(&self, range: ColumnRange) -> Sequence {
        self.splice_columns(&[range])
    }

    /// Builds a new record from several column ranges, concatenated in order.
    /// Metadata is kept. Ranges are clamped to the record length.
    pub fn splice_columns(&self, ranges: &[ColumnRange]) -> Sequence {
        let len = self.data.len();
        let mut data = Vec::with_capacity(ranges.iter().map(ColumnRange::len).sum());
        for range in ranges {
            let start = range.start.min(len);
            let end = range.end.min(len);
            if start < end {
                data.extend_from_slice(&self.data[start..end]);
            }
        }
        Sequence {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            data,
        }
    }

    /// Span between the first and last non-gap symbol, `None` for an all-gap row.
    pub fn residue_span(&self, gap: u8) -> Option<ColumnRange> {
        let start = self.data.iter().position(|&b| b != gap)?;
        let end = self.data.iter().rposition(|&b| b != gap)? + 1;
        Some(ColumnRange::new(start, end))
    }
}

/// Records sharing one column coordinate system.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    sequences: Vec<Sequence>,
    /// Column count, `None` without records
    alignment_length: Option<usize>,
    /// False when records differ in length
    pub is_valid_alignment: bool,
    /// Describes the length mismatch, if any
    pub warning: Option<String>,
}

impl Default for Alignment {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Alignment {
    /// Builds an alignment, checking record lengths.
    pub fn new(sequences: Vec<Sequence>) -> Self {
        let (is_valid, alignment_length, warning) = Self::validate_alignment(&sequences);
        Self {
            sequences,
            alignment_length,
            is_valid_alignment: is_valid,
            warning,
        }
    }

    /// Checks that every record has one length. Returns the validity flag,
    /// the column count (the longest record when ragged) and a warning.
    fn validate_alignment(sequences: &[Sequence]) -> (bool, Option<usize>, Option<String>) {
        let mut lengths = sequences.iter().map(Sequence::len);
        let Some(first) = lengths.next() else {
            return (true, None, None);
        };
        let (shortest, longest) = lengths.fold((first, first), |(lo, hi), len| {
            (lo.min(len), hi.max(len))
        });
        if shortest == longest {
            return (true, Some(longest), None);
        }
        let warning = format!(
            "Records differ in length ({shortest} to {longest} symbols); not an alignment"
        );
        (false, Some(longest), Some(warning))
    }

    /// Appends a record and revalidates the alignment shape.
    pub fn push(&mut self, sequence: Sequence) {
        self.sequences.push(sequence);
        let (is_valid, alignment_length, warning) = Self::validate_alignment(&self.sequences);
        self.is_valid_alignment = is_valid;
        self.alignment_length = alignment_length;
        self.warning = warning;
    }

    /// Number of records.
    pub fn sequence_count(&self) -> usize {
        self.sequences.len()
    }

    /// Number of columns (the longest record when ragged).
    pub fn alignment_length(&self) -> usize {
        self.alignment_length.unwrap_or(0)
    }

    pub fn get(&self, index: usize) -> Option<&Sequence> {
        self.sequences.get(index)
    }

    /// All records, in input order.
    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    /// Iterates over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, Sequence> {
        self.sequences.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// The symbols at one column, one per record. Records too short to reach
    /// the column are skipped.
    pub fn column(&self, col: usize) -> Vec<u8> {
        self.sequences
            .iter()
            .filter_map(|s| s.symbol_at(col))
            .collect()
    }

    /// Index of the probe record. The last matching record wins.
    pub fn probe_index(&self, symbols: &SymbolConfig) -> Option<usize> {
        self.sequences
            .iter()
            .rposition(|s| s.id == symbols.probe_id)
    }

    /// Locates the probe record's residues: leading gaps up to trailing gaps.
    ///
    /// Returns `None` when there is no probe record or it holds only gaps.
    pub fn probe_location(&self, symbols: &SymbolConfig) -> Option<ProbeLocation> {
        let probe = &self.sequences[self.probe_index(symbols)?];
        probe.residue_span(symbols.gap)
    }

    /// Human-readable name of the alignment, used when reporting drops.
    ///
    /// Taken from the second `|`-separated field of the first record's
    /// description, falling back to the first record's identifier.
    pub fn label(&self) -> String {
        let Some(first) = self.sequences.first() else {
            return String::from("<empty>");
        };
        first
            .description
            .split('|')
            .nth(1)
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .unwrap_or(&first.id)
            .to_string()
    }

    /// Builds a new alignment restricted to one column range.
    pub fn slice_columns(&self, range: ColumnRange) -> Alignment {
        self.splice_columns(&[range])
    }

    /// Builds a new alignment whose records are the given column ranges,
    /// concatenated in order.
    pub fn splice_columns(&self, ranges: &[ColumnRange]) -> Alignment {
        Alignment::new(
            self.sequences
                .iter()
                .map(|s| s.splice_columns(ranges))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Alignment {
    type Item = &'a Sequence;
    type IntoIter = std::slice::Iter<'a, Sequence>;

    fn into_iter(self) -> Self::IntoIter {
        self.sequences.iter()
    }
}
