//! External aligner invocation.
//!
//! The [`Aligner`] trait hides how an alignment is computed. [`Muscle`] runs
//! the MUSCLE command line (`muscle -in <input> -out <output>`) on temporary
//! files and reads back the aligned FASTA.

use std::io::{self, ErrorKind, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::config::SymbolConfig;
use crate::formats::fasta::{self, FastaError};
use crate::model::{Alignment, Sequence};

/// Environment variable overriding the MUSCLE executable.
pub const MUSCLE_ENV_BIN: &str = "SEQTRIM_MUSCLE";

/// Executable looked up on `PATH` when nothing else is configured.
pub const DEFAULT_MUSCLE_BIN: &str = "muscle";

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Errors raised while running the aligner.
#[derive(Error, Debug)]
pub enum AlignerError {
    #[error("aligner executable '{executable}' not found (install it or set {MUSCLE_ENV_BIN})")]
    ToolNotFound { executable: String },

    #[error("aligner '{executable}' failed ({status}): {}", .stderr.trim())]
    ToolFailed {
        executable: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("aligner '{executable}' did not finish within {timeout:?}")]
    Timeout {
        executable: String,
        timeout: Duration,
    },

    #[error("aligned record '{id}' contains '{symbol}', which is not gapped DNA")]
    InvalidOutput { id: String, symbol: char },

    #[error("aligner I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("could not read aligner output: {0}")]
    Parse(#[from] FastaError),
}

/// Result type for aligner operations.
pub type AlignerResult<T> = Result<T, AlignerError>;

/// Something that turns unaligned records into an alignment.
pub trait Aligner {
    /// Aligns the records of a FASTA file. The file is left untouched.
    fn align_file(&self, input: &Path) -> AlignerResult<Alignment>;

    /// Aligns in-memory records through a temporary FASTA file.
    fn align_sequences(&self, records: &[Sequence]) -> AlignerResult<Alignment> {
        let mut input = tempfile::Builder::new()
            .prefix("seqtrim-")
            .suffix(".fasta")
            .tempfile()?;
        fasta::write_fasta(&mut input, &Alignment::new(records.to_vec()))?;

        let aligned = self.align_file(input.path());
        remove_temp(input);
        aligned
    }
}

/// MUSCLE settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MuscleConfig {
    pub executable: String,
    /// Passed before `-in`/`-out`
    pub extra_args: Vec<String>,
    /// Kill the aligner after this long; `None` waits forever
    pub timeout: Option<Duration>,
    /// Alphabet the aligned records are checked against
    pub symbols: SymbolConfig,
}

impl Default for MuscleConfig {
    fn default() -> Self {
        Self {
            executable: muscle_executable(),
            extra_args: Vec::new(),
            timeout: None,
            symbols: SymbolConfig::default(),
        }
    }
}

fn muscle_executable() -> String {
    std::env::var(MUSCLE_ENV_BIN)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_MUSCLE_BIN.to_string())
}

/// MUSCLE 3 command-line aligner.
#[derive(Debug, Clone, Default)]
pub struct Muscle {
    config: MuscleConfig,
}

impl Muscle {
    pub fn new(config: MuscleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MuscleConfig {
        &self.config
    }

    fn spawn(&self, input: &Path, output: &Path) -> AlignerResult<Child> {
        let executable = &self.config.executable;
        Command::new(executable)
            .args(&self.config.extra_args)
            .arg("-in")
            .arg(input)
            .arg("-out")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    AlignerError::ToolNotFound {
                        executable: executable.clone(),
                    }
                } else {
                    AlignerError::Io(e)
                }
            })
    }

    fn run(&self, input: &Path, output: &Path) -> AlignerResult<()> {
        let executable = &self.config.executable;
        debug!(
            "Running {} {:?} -in {} -out {}",
            executable,
            self.config.extra_args,
            input.display(),
            output.display()
        );

        let mut child = self.spawn(input, output)?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let Some(status) = wait(&mut child, self.config.timeout)? else {
            // Reader threads finish on their own once the pipes close
            return Err(AlignerError::Timeout {
                executable: executable.clone(),
                timeout: self.config.timeout.unwrap_or_default(),
            });
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = String::from_utf8_lossy(&stderr.join().unwrap_or_default()).into_owned();
        if !status.success() {
            return Err(AlignerError::ToolFailed {
                executable: executable.clone(),
                status,
                stderr,
            });
        }
        if !stdout.is_empty() {
            debug!("{executable} stdout: {}", String::from_utf8_lossy(&stdout).trim());
        }
        if !stderr.trim().is_empty() {
            debug!("{executable} stderr: {}", stderr.trim());
        }
        Ok(())
    }
}

impl Aligner for Muscle {
    fn align_file(&self, input: &Path) -> AlignerResult<Alignment> {
        let output = tempfile::Builder::new()
            .prefix("seqtrim-")
            .suffix(".aln.fasta")
            .tempfile()?;

        let aligned = self
            .run(input, output.path())
            .and_then(|()| fasta::parse_fasta_file(output.path()).map_err(AlignerError::from))
            .and_then(|alignment| {
                check_alphabet(&alignment, &self.config.symbols)?;
                Ok(alignment)
            });
        remove_temp(output);

        let aligned = aligned?;
        info!(
            "Aligned {} records over {} columns",
            aligned.sequence_count(),
            aligned.alignment_length()
        );
        Ok(aligned)
    }
}

/// Rejects records with symbols outside gapped IUPAC DNA.
pub fn check_alphabet(alignment: &Alignment, symbols: &SymbolConfig) -> AlignerResult<()> {
    for sequence in alignment {
        if let Some(&symbol) = sequence
            .as_bytes()
            .iter()
            .find(|&&b| !symbols.is_gapped_dna(b))
        {
            return Err(AlignerError::InvalidOutput {
                id: sequence.id.clone(),
                symbol: symbol as char,
            });
        }
    }
    Ok(())
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf) {
                debug!("Could not read aligner pipe: {e}");
            }
        }
        buf
    })
}

/// Waits for the child; `None` means it was killed after `timeout`.
fn wait(child: &mut Child, timeout: Option<Duration>) -> io::Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {}
            Err(e) => {
                stop(child);
                return Err(e);
            }
        }
        if started.elapsed() >= timeout {
            stop(child);
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kills and reaps the child so it no longer touches its files.
fn stop(child: &mut Child) {
    // The child may exit between try_wait and kill
    if let Err(e) = child.kill() {
        debug!("Could not kill aligner: {e}");
    }
    if let Err(e) = child.wait() {
        warn!("Could not reap aligner: {e}");
    }
}

fn remove_temp(file: NamedTempFile) {
    let path = file.path().to_path_buf();
    if let Err(e) = file.close() {
        warn!("Could not remove temporary file {}: {}", path.display(), e);
    }
}
