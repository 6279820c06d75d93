//! Per-locus processing state.
//!
//! A [`Locus`] owns one raw alignment and the results derived from it:
//! trimmed, then refined, each with an optional consensus summary.

use std::path::Path;

use log::{info, warn};

use crate::aligner::{Aligner, AlignerResult};
use crate::config::SymbolConfig;
use crate::consensus::{ConsensusSummary, Summarizer};
use crate::formats::{self, FileFormat, ParseResult};
use crate::model::{Alignment, ProbeLocation, Sequence};
use crate::refine::{self, RefineError};
use crate::trim::{self, PolicyFailure, TrimOptions, TrimOutcome};

/// One alignment moving through trim and refine.
#[derive(Debug, Clone)]
pub struct Locus {
    symbols: SymbolConfig,
    alignment: Alignment,
    summary: Option<ConsensusSummary>,
    trimmed: Option<Alignment>,
    trimmed_summary: Option<ConsensusSummary>,
    refined: Option<Alignment>,
    refined_summary: Option<ConsensusSummary>,
}

impl Locus {
    pub fn from_alignment(alignment: Alignment, symbols: SymbolConfig) -> Self {
        Self {
            symbols,
            alignment,
            summary: None,
            trimmed: None,
            trimmed_summary: None,
            refined: None,
            refined_summary: None,
        }
    }

    /// Loads an already aligned file.
    pub fn read<P: AsRef<Path>>(
        path: P,
        format: Option<FileFormat>,
        symbols: SymbolConfig,
    ) -> ParseResult<Self> {
        let alignment = formats::parse_file_with_options(path, format)?;
        Ok(Self::from_alignment(alignment, symbols))
    }

    /// Aligns unaligned records with an external aligner.
    pub fn align(
        records: &[Sequence],
        aligner: &dyn Aligner,
        symbols: SymbolConfig,
    ) -> AlignerResult<Self> {
        let alignment = aligner.align_sequences(records)?;
        Ok(Self::from_alignment(alignment, symbols))
    }

    /// Computes the summary of the raw alignment.
    pub fn summarize(&mut self, consensus: &dyn Summarizer) {
        self.summary = Some(consensus.summarize(&self.alignment).0);
    }

    /// Trims the raw alignment. Any earlier trim or refine result is discarded.
    pub fn trim(
        &mut self,
        options: &TrimOptions,
        consensus: Option<&dyn Summarizer>,
    ) -> Result<(), PolicyFailure> {
        self.trimmed = None;
        self.trimmed_summary = None;
        self.refined = None;
        self.refined_summary = None;

        match trim::trim(&self.alignment, options, &self.symbols) {
            TrimOutcome::Trimmed(trimmed) => {
                self.trimmed_summary = consensus.map(|c| c.summarize(&trimmed).0);
                info!(
                    "{}: trimmed {} -> {} columns ({})",
                    self.label(),
                    self.alignment.alignment_length(),
                    trimmed.alignment_length(),
                    options.method
                );
                self.trimmed = Some(trimmed);
                Ok(())
            }
            TrimOutcome::Dropped { reason, .. } => Err(reason),
        }
    }

    /// Narrows the trimmed alignment to its longest ambiguity-free run.
    ///
    /// Without a trimmed alignment there is nothing to refine and the refined
    /// slot stays empty.
    pub fn refine(&mut self, consensus: Option<&dyn Summarizer>) -> Result<(), RefineError> {
        self.refined = None;
        self.refined_summary = None;

        match refine::refine(self.trimmed.as_ref(), &self.symbols) {
            Ok(refined) => {
                self.refined_summary = refined
                    .as_ref()
                    .and_then(|r| consensus.map(|c| c.summarize(r).0));
                self.refined = refined;
                Ok(())
            }
            Err(e) => {
                warn!("Alignment {} not refined: {}", self.label(), e);
                Err(e)
            }
        }
    }

    pub fn symbols(&self) -> &SymbolConfig {
        &self.symbols
    }

    pub fn alignment(&self) -> &Alignment {
        &self.alignment
    }

    pub fn trimmed(&self) -> Option<&Alignment> {
        self.trimmed.as_ref()
    }

    pub fn refined(&self) -> Option<&Alignment> {
        self.refined.as_ref()
    }

    /// The furthest processed alignment: refined, else trimmed.
    pub fn result(&self) -> Option<&Alignment> {
        self.refined().or(self.trimmed())
    }

    pub fn summary(&self) -> Option<&ConsensusSummary> {
        self.summary.as_ref()
    }

    pub fn trimmed_summary(&self) -> Option<&ConsensusSummary> {
        self.trimmed_summary.as_ref()
    }

    pub fn refined_summary(&self) -> Option<&ConsensusSummary> {
        self.refined_summary.as_ref()
    }

    /// Probe location in the raw alignment.
    pub fn probe_location(&self) -> Option<ProbeLocation> {
        self.alignment.probe_location(&self.symbols)
    }

    pub fn label(&self) -> String {
        self.alignment.label()
    }
}
