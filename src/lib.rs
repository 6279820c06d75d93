//! # seqtrim - Alignment Trimmer
//!
//! Trims multiple sequence alignments down to the region worth keeping for
//! downstream analysis, then narrows it to the longest run of columns free of
//! ambiguous bases.
//!
//! ## Architecture
//!
//! Processing flows Loader → Region Locator → Trimmer → Ambiguity Refiner:
//! - `model`: Sequences, alignments and column ranges
//! - `config`: Symbol alphabet (gap, ambiguity, probe identifier)
//! - `formats`: FASTA and NEXUS reading and writing
//! - `aligner`: External aligner (MUSCLE) invocation
//! - `region`: Region location policies (edges, running average, static)
//! - `trim`: Builds the trimmed alignment or reports why it was dropped
//! - `refine`: Longest ambiguity-free column run
//! - `consensus`: Majority-rule consensus and column statistics
//! - `pipeline`: Per-locus state tying the stages together

pub mod aligner;
pub mod config;
pub mod consensus;
pub mod formats;
pub mod model;
pub mod pipeline;
pub mod refine;
pub mod region;
pub mod trim;
