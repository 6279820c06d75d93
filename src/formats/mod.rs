//! Alignment file reading and writing.
//!
//! Two formats are understood, FASTA (.fasta, .fa, .fna, .fas, .align) and
//! NEXUS (.nex, .nexus, .nxs). A format given with `-f` is used as is;
//! otherwise the extension is tried first and the content decides.

pub mod fasta;
pub mod nexus;

use std::ffi::OsStr;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use thiserror::Error;

use crate::config::SymbolConfig;
use crate::model::Alignment;

/// Alignment file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Fasta,
    Nexus,
}

impl FileFormat {
    /// File extension used when writing this format.
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Fasta => "fasta",
            FileFormat::Nexus => "nex",
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileFormat::Fasta => write!(f, "FASTA"),
            FileFormat::Nexus => write!(f, "NEXUS"),
        }
    }
}

/// Errors raised while reading an alignment file.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Cannot read alignment file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Alignment file is empty")]
    EmptyFile,

    #[error("Could not determine file format.\n\
             Hint: Use -f/--format to specify the format explicitly:\n  \
             seqtrim -f fasta <file>   # FASTA format\n  \
             seqtrim -f nexus <file>   # NEXUS format")]
    UnknownFormat,

    #[error("FASTA error: {0}")]
    FastaError(#[from] fasta::FastaError),

    #[error("NEXUS error: {0}")]
    NexusError(#[from] nexus::NexusError),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Detects format from file extension.
pub fn detect_format_from_extension<P: AsRef<Path>>(path: P) -> Option<FileFormat> {
    let ext = path.as_ref().extension().and_then(OsStr::to_str)?;
    match ext.to_lowercase().as_str() {
        "fa" | "fas" | "fasta" | "fna" | "ffn" | "align" => Some(FileFormat::Fasta),
        "nex" | "nexus" | "nxs" => Some(FileFormat::Nexus),
        _ => None,
    }
}

/// Detects the file format by examining the first non-empty line.
pub fn detect_format_from_content(content: &str) -> Option<FileFormat> {
    let first = content.lines().map(str::trim).find(|l| !l.is_empty())?;
    if first.to_uppercase().starts_with("#NEXUS") {
        Some(FileFormat::Nexus)
    } else if first.starts_with('>') {
        Some(FileFormat::Fasta)
    } else {
        None
    }
}

/// Parses content with a specific format.
pub fn parse_content(content: &str, format: FileFormat) -> ParseResult<Alignment> {
    match format {
        FileFormat::Fasta => fasta::parse_fasta_str(content).map_err(ParseError::FastaError),
        FileFormat::Nexus => nexus::parse_nexus_str(content).map_err(ParseError::NexusError),
    }
}

/// Reads an alignment file, in `forced_format` when given.
pub fn parse_file_with_options<P: AsRef<Path>>(
    path: P,
    forced_format: Option<FileFormat>,
) -> ParseResult<Alignment> {
    let content = fs::read_to_string(&path)?;
    if content.trim().is_empty() {
        return Err(ParseError::EmptyFile);
    }

    if let Some(format) = forced_format {
        return parse_content(&content, format);
    }

    // An extension that fails to parse still gets a content-based attempt
    if let Some(format) = detect_format_from_extension(&path) {
        if let Ok(alignment) = parse_content(&content, format) {
            return Ok(alignment);
        }
    }

    match detect_format_from_content(&content) {
        Some(format) => parse_content(&content, format),
        None => Err(ParseError::UnknownFormat),
    }
}

/// Reads an alignment file, automatically detecting the format.
pub fn parse_file<P: AsRef<Path>>(path: P) -> ParseResult<Alignment> {
    parse_file_with_options(path, None)
}

/// Writes an alignment in the requested format.
pub fn write_alignment<W: Write>(
    writer: W,
    alignment: &Alignment,
    format: FileFormat,
    symbols: &SymbolConfig,
) -> io::Result<()> {
    match format {
        FileFormat::Fasta => fasta::write_fasta(writer, alignment),
        FileFormat::Nexus => nexus::write_nexus(writer, alignment, symbols),
    }
}
