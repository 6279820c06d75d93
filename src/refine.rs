//! Ambiguity refinement.
//!
//! Narrows a trimmed alignment to its longest run of columns in which no
//! record carries the ambiguity symbol.

use log::debug;
use thiserror::Error;

use crate::config::SymbolConfig;
use crate::model::{Alignment, ColumnRange};

/// Errors raised while refining.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefineError {
    #[error("no column run free of ambiguity symbols")]
    NoBestBlock,
}

/// Columns where at least one record holds the ambiguity symbol, ascending.
pub fn ambiguous_columns(alignment: &Alignment, symbols: &SymbolConfig) -> Vec<usize> {
    (0..alignment.alignment_length())
        .filter(|&col| {
            alignment
                .iter()
                .any(|s| s.symbol_at(col).is_some_and(|b| symbols.is_ambiguous(b)))
        })
        .collect()
}

/// Longest run of columns between ambiguous columns.
///
/// The runs are `[0, k1)`, `(k1, k2)`, ..., `(kn, columns)`; the leftmost
/// wins a tie. `None` when every run is empty.
pub fn longest_clean_run(ambiguous: &[usize], columns: usize) -> Option<ColumnRange> {
    let mut best: Option<ColumnRange> = None;
    let mut start = 0;
    for end in ambiguous.iter().copied().chain(std::iter::once(columns)) {
        let run = ColumnRange::new(start, end);
        if run.len() > best.map_or(0, |b| b.len()) {
            best = Some(run);
        }
        start = end + 1;
    }
    best
}

/// Refines one alignment. Without ambiguous columns the input comes back as is.
pub fn refine_alignment(
    alignment: &Alignment,
    symbols: &SymbolConfig,
) -> Result<Alignment, RefineError> {
    let ambiguous = ambiguous_columns(alignment, symbols);
    if ambiguous.is_empty() {
        return Ok(alignment.clone());
    }
    let run = longest_clean_run(&ambiguous, alignment.alignment_length())
        .ok_or(RefineError::NoBestBlock)?;
    debug!(
        "{}: {} ambiguous columns, keeping {}",
        alignment.label(),
        ambiguous.len(),
        run
    );
    Ok(alignment.slice_columns(run))
}

/// Refines an optional alignment; a dropped alignment stays dropped.
pub fn refine(
    trimmed: Option<&Alignment>,
    symbols: &SymbolConfig,
) -> Result<Option<Alignment>, RefineError> {
    trimmed
        .map(|alignment| refine_alignment(alignment, symbols))
        .transpose()
}
