//! Alignment trimming.
//!
//! [`trim`] resolves a region with one of the [`region`](crate::region)
//! policies, or excises the probe, and builds a new [`Alignment`] from it.
//! When no region can be resolved the alignment is dropped: the outcome says
//! which alignment and why, and a warning is logged.

use log::{debug, warn};

use crate::config::SymbolConfig;
use crate::model::{Alignment, ColumnRange};
use crate::region;

pub use crate::region::PolicyFailure;

/// Trim policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrimMethod {
    /// First and last gap-free columns
    #[default]
    Edges,
    /// Sliding-window conservation
    Running,
    /// Sliding-window conservation, probe row ignored
    RunningProbe,
    /// Fixed number of bases around the alignment midpoint
    Static,
    /// Fixed number of bases around the probe
    StaticProbe,
    /// Keep the alignment as it is
    NoTrim,
}

impl std::fmt::Display for TrimMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TrimMethod::Edges => "edges",
            TrimMethod::Running => "running",
            TrimMethod::RunningProbe => "running-probe",
            TrimMethod::Static => "static",
            TrimMethod::StaticProbe => "static-probe",
            TrimMethod::NoTrim => "notrim",
        };
        write!(f, "{name}")
    }
}

/// Parameters of one trimming call.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimOptions {
    pub method: TrimMethod,
    /// Cut the probe's columns out of the result
    pub remove_probe: bool,
    /// Half-width for the static policies
    pub bases: Option<usize>,
    pub window_size: usize,
    /// Minimum windowed conservation, 0.0 to 1.0
    pub threshold: f64,
    /// Share of gapped records a column may hold and still have gaps ignored
    pub proportion: f64,
}

impl Default for TrimOptions {
    fn default() -> Self {
        Self {
            method: TrimMethod::Edges,
            remove_probe: false,
            bases: None,
            window_size: 20,
            threshold: 0.5,
            proportion: 0.3,
        }
    }
}

impl TrimOptions {
    /// Default options for one method.
    pub fn new(method: TrimMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }
}

/// Result of trimming one alignment.
#[derive(Debug, Clone, PartialEq)]
pub enum TrimOutcome {
    Trimmed(Alignment),
    Dropped { label: String, reason: PolicyFailure },
}

impl TrimOutcome {
    /// The trimmed alignment, if any.
    pub fn alignment(&self) -> Option<&Alignment> {
        match self {
            TrimOutcome::Trimmed(alignment) => Some(alignment),
            TrimOutcome::Dropped { .. } => None,
        }
    }

    pub fn into_alignment(self) -> Option<Alignment> {
        match self {
            TrimOutcome::Trimmed(alignment) => Some(alignment),
            TrimOutcome::Dropped { .. } => None,
        }
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, TrimOutcome::Dropped { .. })
    }
}

/// Trims an alignment, reporting a drop instead of failing.
pub fn trim(alignment: &Alignment, options: &TrimOptions, symbols: &SymbolConfig) -> TrimOutcome {
    match trim_columns(alignment, options, symbols) {
        Ok(trimmed) => TrimOutcome::Trimmed(trimmed),
        Err(reason) => {
            let label = alignment.label();
            warn!("Alignment {label} dropped due to trimming: {reason}");
            TrimOutcome::Dropped { label, reason }
        }
    }
}

/// Trims an alignment, returning the policy failure on error.
///
/// `notrim` passes the alignment through whatever the other options say.
/// With `remove_probe`, the static policies keep `bases` columns on each
/// side of the probe; every other policy keeps everything but the probe.
pub fn trim_columns(
    alignment: &Alignment,
    options: &TrimOptions,
    symbols: &SymbolConfig,
) -> Result<Alignment, PolicyFailure> {
    if options.method == TrimMethod::NoTrim {
        return Ok(alignment.clone());
    }

    let keep: Vec<ColumnRange> = if options.remove_probe {
        match options.method {
            TrimMethod::Static | TrimMethod::StaticProbe => {
                region::probe_flanks(alignment, options.bases, symbols)?.to_vec()
            }
            _ => excise_probe(alignment, symbols)?.to_vec(),
        }
    } else {
        vec![locate(alignment, options, symbols)?]
    };
    debug!(
        "Trimming {} ({}) to {:?}",
        alignment.label(),
        options.method,
        keep
    );

    let trimmed = alignment.splice_columns(&keep);
    if trimmed.alignment_length() == 0 {
        return Err(PolicyFailure::EmptyRegion);
    }
    Ok(trimmed)
}

/// Resolves the region for a column-range policy.
pub fn locate(
    alignment: &Alignment,
    options: &TrimOptions,
    symbols: &SymbolConfig,
) -> Result<ColumnRange, PolicyFailure> {
    let TrimOptions {
        window_size,
        threshold,
        proportion,
        bases,
        ..
    } = *options;

    let range = match options.method {
        TrimMethod::Edges => region::edges_region(alignment, symbols)?,
        TrimMethod::Running => {
            region::running_region(alignment, window_size, threshold, proportion, symbols)?
        }
        TrimMethod::RunningProbe => {
            region::running_probe_region(alignment, window_size, threshold, proportion, symbols)?
        }
        TrimMethod::Static => region::static_midpoint_region(alignment, bases)?,
        TrimMethod::StaticProbe => region::static_probe_region(alignment, bases, symbols)?,
        TrimMethod::NoTrim => ColumnRange::new(0, region::check_trimmable(alignment)?),
    };
    if range.is_empty() {
        return Err(PolicyFailure::EmptyRegion);
    }
    Ok(range)
}

/// Everything left and right of the probe.
fn excise_probe(
    alignment: &Alignment,
    symbols: &SymbolConfig,
) -> Result<[ColumnRange; 2], PolicyFailure> {
    let columns = region::check_trimmable(alignment)?;
    let probe = alignment
        .probe_location(symbols)
        .ok_or(PolicyFailure::MissingProbe)?;
    Ok([
        ColumnRange::new(0, probe.start),
        ColumnRange::new(probe.end, columns),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::fasta::parse_fasta_str;

    fn symbols() -> SymbolConfig {
        SymbolConfig::default()
    }

    #[test]
    fn test_notrim_passes_through() {
        let aln = parse_fasta_str(">seq1\n--AC\n>seq2\nAC--\n").unwrap();
        let mut options = TrimOptions::new(TrimMethod::NoTrim);
        options.remove_probe = true;
        assert_eq!(trim(&aln, &options, &symbols()), TrimOutcome::Trimmed(aln.clone()));
    }

    #[test]
    fn test_edges_trim_keeps_metadata() {
        let content = ">seq1 locus|chr1\n--ACGTA-\n>seq2 other\n-TACGTAC\n";
        let aln = parse_fasta_str(content).unwrap();
        let outcome = trim(&aln, &TrimOptions::new(TrimMethod::Edges), &symbols());
        let trimmed = outcome.alignment().unwrap();
        assert_eq!(trimmed.get(0).unwrap().as_str(), "ACGTA");
        assert_eq!(trimmed.get(1).unwrap().as_str(), "ACGTA");
        assert_eq!(trimmed.get(0).unwrap().description, "seq1 locus|chr1");
        assert_eq!(trimmed.get(1).unwrap().id, "seq2");
    }

    #[test]
    fn test_edges_all_gapped_is_dropped() {
        let content = ">seq1 x|locus_7\n-ACG\n>seq2\nA-CG\n>seq3\nAC--\n";
        let aln = parse_fasta_str(content).unwrap();
        let outcome = trim(&aln, &TrimOptions::new(TrimMethod::Edges), &symbols());
        assert_eq!(
            outcome,
            TrimOutcome::Dropped {
                label: "locus_7".to_string(),
                reason: PolicyFailure::NoGapFreeColumn
            }
        );
    }

    #[test]
    fn test_running_trim() {
        let content = ">a\nACGTACGTAC\n>b\nTTGTACGTGG\n>c\nGAGTACGTCA\n";
        let aln = parse_fasta_str(content).unwrap();
        let options = TrimOptions {
            method: TrimMethod::Running,
            window_size: 3,
            threshold: 1.0,
            ..TrimOptions::default()
        };
        let trimmed = trim_columns(&aln, &options, &symbols()).unwrap();
        assert_eq!(trimmed.get(0).unwrap().as_str(), "GTACGT");
    }

    #[test]
    fn test_running_window_too_large_is_dropped() {
        let aln = parse_fasta_str(">a\nACGT\n>b\nACGT\n").unwrap();
        let outcome = trim(&aln, &TrimOptions::new(TrimMethod::Running), &symbols());
        assert!(matches!(
            outcome,
            TrimOutcome::Dropped {
                reason: PolicyFailure::WindowTooLarge { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_static_bases_out_of_bounds_is_dropped() {
        let aln = parse_fasta_str(">a\nACGTACGT\n>b\nACGTACGT\n").unwrap();
        let options = TrimOptions {
            method: TrimMethod::Static,
            bases: Some(5),
            ..TrimOptions::default()
        };
        let outcome = trim(&aln, &options, &symbols());
        assert!(outcome.is_dropped());

        let options = TrimOptions {
            bases: Some(2),
            ..options
        };
        let trimmed = trim_columns(&aln, &options, &symbols()).unwrap();
        assert_eq!(trimmed.get(0).unwrap().as_str(), "GTAC");
    }

    #[test]
    fn test_remove_probe_excises_probe_span() {
        let content = ">seq1\nAACCGGTTAA\n>probe\n---CGG----\n>seq2\nTACCGGTTAT\n";
        let aln = parse_fasta_str(content).unwrap();
        let options = TrimOptions {
            method: TrimMethod::Edges,
            remove_probe: true,
            ..TrimOptions::default()
        };
        let trimmed = trim_columns(&aln, &options, &symbols()).unwrap();
        assert_eq!(trimmed.alignment_length(), 7);
        assert_eq!(trimmed.get(0).unwrap().as_str(), "AACTTAA");
        assert_eq!(trimmed.get(1).unwrap().as_str(), "-------");
        assert_eq!(trimmed.get(2).unwrap().as_str(), "TACTTAT");
    }

    #[test]
    fn test_remove_probe_without_probe_is_dropped() {
        let aln = parse_fasta_str(">seq1\nACGT\n>seq2\nACGT\n").unwrap();
        let options = TrimOptions {
            remove_probe: true,
            ..TrimOptions::default()
        };
        assert_eq!(
            trim_columns(&aln, &options, &symbols()),
            Err(PolicyFailure::MissingProbe)
        );
    }

    #[test]
    fn test_static_with_remove_probe_keeps_flanks() {
        let content = ">seq1\nAACCGGTTAACC\n>probe\n----GGTT----\n";
        let aln = parse_fasta_str(content).unwrap();
        let options = TrimOptions {
            method: TrimMethod::Static,
            remove_probe: true,
            bases: Some(3),
            ..TrimOptions::default()
        };
        let trimmed = trim_columns(&aln, &options, &symbols()).unwrap();
        assert_eq!(trimmed.get(0).unwrap().as_str(), "ACCAAC");
        assert_eq!(trimmed.get(1).unwrap().as_str(), "------");
    }

    #[test]
    fn test_static_probe_extends_outward() {
        let content = ">seq1\nAACCGGTTAACC\n>probe\n----GGTT----\n";
        let aln = parse_fasta_str(content).unwrap();
        let options = TrimOptions {
            method: TrimMethod::StaticProbe,
            bases: Some(1),
            ..TrimOptions::default()
        };
        let trimmed = trim_columns(&aln, &options, &symbols()).unwrap();
        assert_eq!(trimmed.get(0).unwrap().as_str(), "CGGTTA");
    }

    #[test]
    fn test_probe_covering_everything_leaves_empty_region() {
        let aln = parse_fasta_str(">seq1\nACGT\n>probe\nACGT\n").unwrap();
        let options = TrimOptions {
            remove_probe: true,
            ..TrimOptions::default()
        };
        assert_eq!(
            trim_columns(&aln, &options, &symbols()),
            Err(PolicyFailure::EmptyRegion)
        );
    }

    #[test]
    fn test_trim_never_mutates_source() {
        let aln = parse_fasta_str(">a\n-ACGT-\n>b\nAACGTT\n").unwrap();
        let before = aln.clone();
        let _ = trim(&aln, &TrimOptions::new(TrimMethod::Edges), &symbols());
        assert_eq!(aln, before);
    }
}
