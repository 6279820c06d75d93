//! NEXUS reader and writer.
//!
//! Reads the DATA and CHARACTERS blocks commonly used for sequence alignments
//! and writes a single DATA block.
//!
//! ## NEXUS Format
//!
//! ```text
//! #NEXUS
//! BEGIN DATA;
//!   DIMENSIONS NTAX=3 NCHAR=8;
//!   FORMAT DATATYPE=DNA GAP=- MISSING=?;
//!   MATRIX
//!     ind1   AACCGGTT
//!     ind2   AACNGGTA
//!     probe  --CCGG--
//!   ;
//! END;
//! ```
//!
//! ## Supported Features
//!
//! - DIMENSIONS (NTAX, NCHAR), checked against the matrix when present
//! - FORMAT (INTERLEAVE, MATCHCHAR)
//! - Sequential matrices, one record per line or split over lines when NCHAR is known
//! - Interleaved matrices
//! - Bracketed comments and quoted taxon names
//!
//! Commands and keywords are case-insensitive.

use std::collections::HashMap;
use std::io::{self, Write};

use thiserror::Error;

use crate::config::SymbolConfig;
use crate::model::{Alignment, Sequence};

/// Errors that can occur during NEXUS parsing.
#[derive(Error, Debug)]
pub enum NexusError {
    #[error("Not a NEXUS file (must start with #NEXUS)")]
    NotNexus,

    #[error("Empty NEXUS file")]
    EmptyFile,

    #[error("No DATA or CHARACTERS block found")]
    NoDataBlock,

    #[error("Missing MATRIX command in {block} block")]
    MissingMatrix { block: String },

    #[error("Expected {expected} sequences (NTAX), found {found}")]
    SequenceCountMismatch { expected: usize, found: usize },

    #[error("Sequence '{name}' has length {found}, expected {expected} (NCHAR)")]
    SequenceLengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
}

/// Result type for NEXUS operations.
pub type NexusResult<T> = Result<T, NexusError>;

/// Settings collected from the DIMENSIONS and FORMAT commands.
#[derive(Debug, Default)]
struct MatrixLayout {
    ntax: Option<usize>,
    nchar: Option<usize>,
    interleave: bool,
    matchchar: Option<u8>,
}

/// Parses NEXUS content from a string.
pub fn parse_nexus_str(content: &str) -> NexusResult<Alignment> {
    let first = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or(NexusError::EmptyFile)?;
    if !first.to_uppercase().starts_with("#NEXUS") {
        return Err(NexusError::NotNexus);
    }

    let body = remove_comments(content);
    let mut layout = MatrixLayout::default();
    let mut block: Option<String> = None;
    let mut matrix: Option<&str> = None;

    for command in split_commands(&body) {
        let command = command.trim();
        let upper = command.to_uppercase();
        let keyword = upper.split_whitespace().next().unwrap_or("");

        match keyword {
            "BEGIN" => {
                let name = upper.split_whitespace().nth(1).unwrap_or("");
                if block.is_none() && (name == "DATA" || name == "CHARACTERS") {
                    block = Some(name.to_string());
                }
            }
            "END" | "ENDBLOCK" if block.is_some() => break,
            _ if block.is_none() => {}
            "DIMENSIONS" => {
                layout.ntax = extract_param(&upper, "NTAX").and_then(|v| v.parse().ok());
                layout.nchar = extract_param(&upper, "NCHAR").and_then(|v| v.parse().ok());
            }
            "FORMAT" => {
                layout.interleave = upper
                    .split_whitespace()
                    .any(|word| word == "INTERLEAVE" || word == "INTERLEAVE=YES");
                layout.matchchar = extract_param(&upper, "MATCHCHAR")
                    .and_then(|v| v.bytes().next());
            }
            "MATRIX" => matrix = Some(&command[keyword.len()..]),
            _ => {}
        }
    }

    let block = block.ok_or(NexusError::NoDataBlock)?;
    let matrix = matrix.ok_or(NexusError::MissingMatrix { block })?;

    let mut records = match (layout.interleave, layout.nchar) {
        (false, Some(nchar)) => parse_sequential(matrix, nchar),
        _ => parse_by_line(matrix),
    };
    if records.is_empty() {
        return Err(NexusError::NoDataBlock);
    }
    if let Some(mc) = layout.matchchar {
        apply_matchchar(&mut records, mc);
    }
    check_dimensions(&records, &layout)?;

    Ok(Alignment::new(
        records
            .into_iter()
            .map(|(name, data)| Sequence::from_bytes(name, data))
            .collect(),
    ))
}

/// Removes bracketed comments, leaving quoted text alone.
fn remove_comments(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut depth = 0usize;
    let mut in_quote = false;

    for c in content.chars() {
        match c {
            '\'' if depth == 0 => {
                in_quote = !in_quote;
                result.push(c);
            }
            '[' if !in_quote => depth += 1,
            ']' if !in_quote && depth > 0 => depth -= 1,
            _ if depth == 0 => result.push(c),
            _ => {}
        }
    }
    result
}

/// Splits text into `;`-terminated commands, ignoring `;` inside quotes.
fn split_commands(body: &str) -> Vec<&str> {
    let mut commands = Vec::new();
    let mut start = 0;
    let mut in_quote = false;
    for (idx, c) in body.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            ';' if !in_quote => {
                commands.push(&body[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if !body[start..].trim().is_empty() {
        commands.push(&body[start..]);
    }
    commands
}

/// Extracts a parameter value (`KEY=value`) from an upper-cased command.
fn extract_param<'a>(command: &'a str, param: &str) -> Option<&'a str> {
    command.split_whitespace().find_map(|word| {
        let (key, value) = word.split_once('=')?;
        (key == param && !value.is_empty()).then_some(value)
    })
}

/// Splits a matrix line into tokens. Quoted names stay one token with the
/// quotes removed; `''` inside quotes is a literal quote.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quote = false;

    while let Some(c) = chars.next() {
        match c {
            '\'' if in_quote && chars.peek() == Some(&'\'') => {
                chars.next();
                current.push('\'');
            }
            '\'' => in_quote = !in_quote,
            c if c.is_whitespace() && !in_quote => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// One `name data...` entry per line. Repeated names append, which covers
/// interleaved matrices.
fn parse_by_line(matrix: &str) -> Vec<(String, Vec<u8>)> {
    let mut records: Vec<(String, Vec<u8>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for line in matrix.lines() {
        let mut tokens = tokenize(line).into_iter();
        let Some(name) = tokens.next() else {
            continue;
        };
        let data: Vec<u8> = tokens.flat_map(String::into_bytes).collect();
        match index.get(&name) {
            Some(&idx) => records[idx].1.extend(data),
            None => {
                index.insert(name.clone(), records.len());
                records.push((name, data));
            }
        }
    }
    records
}

/// Sequential matrix with known NCHAR: a name, then data tokens until the
/// record reaches NCHAR symbols, across line breaks.
fn parse_sequential(matrix: &str, nchar: usize) -> Vec<(String, Vec<u8>)> {
    let mut records = Vec::new();
    let mut tokens = matrix.lines().flat_map(tokenize);

    while let Some(name) = tokens.next() {
        let mut data = Vec::with_capacity(nchar);
        while data.len() < nchar {
            match tokens.next() {
                Some(token) => data.extend(token.into_bytes()),
                None => break,
            }
        }
        records.push((name, data));
    }
    records
}

/// Replaces MATCHCHAR with the first record's symbol at the same column.
fn apply_matchchar(records: &mut [(String, Vec<u8>)], matchchar: u8) {
    let Some(((_, reference), rest)) = records.split_first_mut() else {
        return;
    };
    for (_, data) in rest {
        for (byte, &reference_byte) in data.iter_mut().zip(reference.iter()) {
            if *byte == matchchar {
                *byte = reference_byte;
            }
        }
    }
}

fn check_dimensions(records: &[(String, Vec<u8>)], layout: &MatrixLayout) -> NexusResult<()> {
    if let Some(expected) = layout.ntax {
        if records.len() != expected {
            return Err(NexusError::SequenceCountMismatch {
                expected,
                found: records.len(),
            });
        }
    }
    if let Some(expected) = layout.nchar {
        if let Some((name, data)) = records.iter().find(|(_, data)| data.len() != expected) {
            return Err(NexusError::SequenceLengthMismatch {
                name: name.clone(),
                expected,
                found: data.len(),
            });
        }
    }
    Ok(())
}

/// Quotes a taxon name when NEXUS punctuation or whitespace requires it.
fn quote_name(name: &str) -> String {
    let needs_quotes = name
        .chars()
        .any(|c| c.is_whitespace() || "()[]{}/\\,;:=*'\"`<>".contains(c));
    if needs_quotes {
        format!("'{}'", name.replace('\'', "''"))
    } else {
        name.to_string()
    }
}

/// Writes an alignment as a NEXUS DATA block.
pub fn write_nexus<W: Write>(
    mut writer: W,
    alignment: &Alignment,
    symbols: &SymbolConfig,
) -> io::Result<()> {
    let names: Vec<String> = alignment.iter().map(|s| quote_name(&s.id)).collect();
    let width = names.iter().map(String::len).max().unwrap_or(0) + 2;

    writeln!(writer, "#NEXUS")?;
    writeln!(writer, "BEGIN DATA;")?;
    writeln!(
        writer,
        "  DIMENSIONS NTAX={} NCHAR={};",
        alignment.sequence_count(),
        alignment.alignment_length()
    )?;
    writeln!(
        writer,
        "  FORMAT DATATYPE=DNA MISSING=? GAP={};",
        symbols.gap as char
    )?;
    writeln!(writer, "  MATRIX")?;
    for (name, sequence) in names.iter().zip(alignment) {
        write!(writer, "    {:<width$}", name, width = width)?;
        writer.write_all(sequence.as_bytes())?;
        writeln!(writer)?;
    }
    writeln!(writer, "  ;")?;
    writeln!(writer, "END;")?;
    writer.flush()
}
