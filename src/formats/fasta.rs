//! FASTA reader and writer.
//!
//! Handles single-line and multi-line records. The first word of a header
//! becomes the record identifier; the whole header is kept as its
//! description.
//!
//! ```text
//! >ind1 uce|chr2_1184|ind1
//! AC-GTTA
//! >probe uce|chr2_1184|probe
//! --GGTT-
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use thiserror::Error;

use crate::model::{Alignment, Sequence};

/// Errors that can occur during FASTA parsing.
#[derive(Error, Debug)]
pub enum FastaError {
    #[error("Cannot read FASTA input: {0}")]
    IoError(#[from] std::io::Error),

    #[error("No FASTA record found")]
    EmptyFile,

    #[error("Invalid FASTA format: {0}")]
    InvalidFormat(String),

    #[error("Sequence without header at line {0}")]
    SequenceWithoutHeader(usize),
}

/// Result type for FASTA operations.
pub type FastaResult<T> = Result<T, FastaError>;

/// Reads a FASTA file, typically the aligner's output.
pub fn parse_fasta_file<P: AsRef<Path>>(path: P) -> FastaResult<Alignment> {
    parse_fasta_str(&fs::read_to_string(path)?)
}

/// Parses FASTA content from a string.
pub fn parse_fasta_str(content: &str) -> FastaResult<Alignment> {
    let mut alignment = Alignment::default();
    let mut current: Option<(&str, &str)> = None;
    let mut current_seq: Vec<u8> = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line_number = idx + 1;
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('>') {
            if let Some((id, description)) = current.take() {
                push_record(&mut alignment, id, description, std::mem::take(&mut current_seq));
            }

            let header = header.trim();
            let id = header.split_whitespace().next().unwrap_or(header);
            if id.is_empty() {
                return Err(FastaError::InvalidFormat(format!(
                    "Empty sequence identifier at line {}",
                    line_number
                )));
            }
            current = Some((id, header));
        } else {
            if current.is_none() {
                return Err(FastaError::SequenceWithoutHeader(line_number));
            }
            current_seq.extend(line.bytes().filter(|b| !b.is_ascii_whitespace()));
        }
    }

    if let Some((id, description)) = current {
        push_record(&mut alignment, id, description, current_seq);
    }

    if alignment.is_empty() {
        return Err(FastaError::EmptyFile);
    }
    Ok(alignment)
}

fn push_record(alignment: &mut Alignment, id: &str, description: &str, data: Vec<u8>) {
    // Records without residues carry nothing to align
    if !data.is_empty() {
        alignment.push(Sequence::from_bytes(id, data).with_description(description));
    }
}

/// Header line for a record: the description when it already starts with
/// the identifier, the bare identifier otherwise.
fn header(sequence: &Sequence) -> &str {
    if sequence.description.starts_with(sequence.id.as_str()) {
        &sequence.description
    } else {
        &sequence.id
    }
}

/// Writes an alignment as FASTA, one line per record.
pub fn write_fasta<W: Write>(mut writer: W, alignment: &Alignment) -> io::Result<()> {
    for sequence in alignment {
        writeln!(writer, ">{}", header(sequence))?;
        writer.write_all(sequence.as_bytes())?;
        writeln!(writer)?;
    }
    writer.flush()
}
