//! seqtrim - Alignment trimmer
//!
//! Trims multiple sequence alignments to the region worth keeping, then
//! optionally narrows it to the longest run free of ambiguous bases.
//!
//! ## Usage
//!
//! ```bash
//! seqtrim locus1.fasta locus2.fasta              # edges trimming, FASTA on stdout
//! seqtrim -m running -w 20 -t 0.5 -o out/ *.fasta
//! seqtrim -m static -b 100 --remove-probe --refine -o out/ *.nex
//! seqtrim --align -o out/ unaligned/*.fasta      # run MUSCLE first
//! ```
//!
//! ## Supported Formats
//!
//! - FASTA (.fasta, .fa, .fna, .fas, .align)
//! - NEXUS (.nex, .nexus, .nxs)

// Use jemalloc for better memory management (returns memory to OS)
#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::{error, info, warn, LevelFilter};
use simplelog::{ColorChoice, TermLogger, TerminalMode};

use seqtrim::aligner::{Muscle, MuscleConfig};
use seqtrim::config::{SymbolConfig, DEFAULT_PROBE_ID};
use seqtrim::consensus::{DumbConsensus, Summarizer};
use seqtrim::formats::{parse_file_with_options, write_alignment, FileFormat};
use seqtrim::model::Alignment;
use seqtrim::pipeline::Locus;
use seqtrim::trim::{TrimMethod, TrimOptions};

/// File format specification for command line
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    /// FASTA format
    Fasta,
    /// NEXUS format
    Nexus,
    /// Auto-detect from extension and content
    Auto,
}

impl From<FormatArg> for Option<FileFormat> {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Fasta => Some(FileFormat::Fasta),
            FormatArg::Nexus => Some(FileFormat::Nexus),
            FormatArg::Auto => None,
        }
    }
}

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormatArg {
    Fasta,
    Nexus,
}

impl From<OutputFormatArg> for FileFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Fasta => FileFormat::Fasta,
            OutputFormatArg::Nexus => FileFormat::Nexus,
        }
    }
}

/// Trimming method
#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodArg {
    /// Between the first and last gap-free columns
    Edges,
    /// Sliding-window conservation
    Running,
    /// Sliding-window conservation ignoring the probe
    RunningProbe,
    /// Fixed number of bases around the alignment midpoint
    Static,
    /// Fixed number of bases around the probe
    StaticProbe,
    /// No trimming
    Notrim,
}

impl From<MethodArg> for TrimMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Edges => TrimMethod::Edges,
            MethodArg::Running => TrimMethod::Running,
            MethodArg::RunningProbe => TrimMethod::RunningProbe,
            MethodArg::Static => TrimMethod::Static,
            MethodArg::StaticProbe => TrimMethod::StaticProbe,
            MethodArg::Notrim => TrimMethod::NoTrim,
        }
    }
}

/// seqtrim - Trim multiple sequence alignments
///
/// Each input file holds one locus. Files are processed independently: a
/// locus that cannot be trimmed is reported and skipped.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Alignment files (FASTA or NEXUS); unaligned FASTA with --align
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Force a specific input format (overrides auto-detection)
    #[arg(short = 'f', long = "format", value_enum, default_value = "auto")]
    format: FormatArg,

    /// Trimming method
    #[arg(short = 'm', long = "method", value_enum, default_value = "edges")]
    method: MethodArg,

    /// Cut the probe out of the trimmed alignment
    #[arg(long = "remove-probe")]
    remove_probe: bool,

    /// Bases kept on each side of the anchor (static methods)
    #[arg(short = 'b', long = "bases")]
    bases: Option<usize>,

    /// Sliding window size (running methods)
    #[arg(short = 'w', long = "window-size", default_value_t = 20)]
    window_size: usize,

    /// Minimum windowed conservation, 0.0-1.0 (running methods)
    #[arg(short = 't', long = "threshold", default_value_t = 0.5)]
    threshold: f64,

    /// Share of gapped records below which gaps are ignored (running methods)
    #[arg(short = 'p', long = "proportion", default_value_t = 0.3)]
    proportion: f64,

    /// Keep only the longest run of columns without ambiguous bases
    #[arg(long = "refine")]
    refine: bool,

    /// Log the majority-rule consensus of each result
    #[arg(long = "consensus")]
    consensus: bool,

    /// Align the input records with MUSCLE before trimming
    #[arg(long = "align")]
    align: bool,

    /// MUSCLE executable (defaults to $SEQTRIM_MUSCLE, then "muscle")
    #[arg(long = "muscle")]
    muscle: Option<String>,

    /// Kill the aligner after this many seconds
    #[arg(long = "aligner-timeout")]
    aligner_timeout: Option<u64>,

    /// Identifier of the probe record
    #[arg(long = "probe-id", default_value = DEFAULT_PROBE_ID)]
    probe_id: String,

    /// Symbol marking an ambiguous base
    #[arg(long = "ambiguity-symbol", default_value_t = 'N')]
    ambiguity_symbol: char,

    /// Output directory, or "-" for stdout
    #[arg(short = 'o', long = "output", default_value = "-")]
    output: String,

    /// Output format
    #[arg(long = "output-format", value_enum, default_value = "fasta")]
    output_format: OutputFormatArg,

    #[arg(short = 'l', long = "log-level", default_value = "info")]
    log_level: LevelFilter,
}

/// Where results go.
enum Sink {
    Stdout,
    Directory(PathBuf),
}

/// What happened to one locus.
enum Status {
    Kept,
    Dropped,
    Unrefined,
}

#[derive(Default)]
struct Tally {
    kept: usize,
    dropped: usize,
    unrefined: usize,
    failed: usize,
}

/// Everything shared by the per-file runs.
struct Run<'a> {
    format: Option<FileFormat>,
    output_format: FileFormat,
    symbols: SymbolConfig,
    options: TrimOptions,
    refine: bool,
    consensus: Option<&'a dyn Summarizer>,
    aligner: Option<Muscle>,
    sink: Sink,
}

impl Run<'_> {
    fn load(&self, path: &Path) -> Result<Locus> {
        let Some(aligner) = &self.aligner else {
            return Locus::read(path, self.format, self.symbols.clone())
                .with_context(|| format!("Failed to read {}", path.display()));
        };
        let records = parse_file_with_options(path, self.format)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Locus::align(records.sequences(), aligner, self.symbols.clone())
            .with_context(|| format!("Failed to align {}", path.display()))
    }

    fn process(&self, path: &Path) -> Result<Status> {
        let mut locus = self.load(path)?;
        if let Some(warning) = &locus.alignment().warning {
            warn!("{}: {}", path.display(), warning);
        }
        if let Some(consensus) = self.consensus {
            locus.summarize(consensus);
        }

        // Drops are logged by the trimmer
        if locus.trim(&self.options, self.consensus).is_err() {
            return Ok(Status::Dropped);
        }

        let mut status = Status::Kept;
        if self.refine && locus.refine(self.consensus).is_err() {
            status = Status::Unrefined;
        }

        let (result, summary) = match locus.refined() {
            Some(refined) => (refined, locus.refined_summary()),
            None => match locus.trimmed() {
                Some(trimmed) => (trimmed, locus.trimmed_summary()),
                None => return Ok(Status::Dropped),
            },
        };
        if let Some(summary) = summary {
            info!(
                "{} consensus ({:.1}% gaps): {}",
                locus.label(),
                summary.gap_fraction() * 100.0,
                summary.consensus
            );
        }
        self.write(path, result)?;
        Ok(status)
    }

    fn write(&self, path: &Path, alignment: &Alignment) -> Result<()> {
        match &self.sink {
            Sink::Stdout => {
                let stdout = io::stdout();
                write_alignment(stdout.lock(), alignment, self.output_format, &self.symbols)?;
            }
            Sink::Directory(dir) => {
                let target = dir.join(output_name(path, self.output_format));
                let file = File::create(&target)
                    .with_context(|| format!("Failed to create {}", target.display()))?;
                write_alignment(
                    BufWriter::new(file),
                    alignment,
                    self.output_format,
                    &self.symbols,
                )?;
                info!(
                    "Wrote {} sequences to {}",
                    alignment.sequence_count(),
                    target.display()
                );
            }
        }
        Ok(())
    }
}

/// `<stem>.trimmed.<ext>` for an input file.
fn output_name(path: &Path, format: FileFormat) -> String {
    let stem = path
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("alignment");
    format!("{stem}.trimmed.{}", format.extension())
}

/// First pair of inputs that would write the same output file.
fn output_clash(files: &[PathBuf], format: FileFormat) -> Option<(&Path, &Path)> {
    let mut seen: HashMap<String, &Path> = HashMap::new();
    for path in files {
        if let Some(first) = seen.insert(output_name(path, format), path.as_path()) {
            return Some((first, path.as_path()));
        }
    }
    None
}

fn symbol_byte(symbol: char, what: &str) -> Result<u8> {
    if !symbol.is_ascii() {
        bail!("{what} must be an ASCII character (got '{symbol}')");
    }
    Ok(symbol as u8)
}

fn main() -> Result<()> {
    let args = Args::parse();

    TermLogger::init(
        args.log_level,
        Default::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialise logging")?;

    if !(0.0..=1.0).contains(&args.threshold) {
        bail!("Threshold must be between 0 and 1 (got {})", args.threshold);
    }
    if !(0.0..=1.0).contains(&args.proportion) {
        bail!("Proportion must be between 0 and 1 (got {})", args.proportion);
    }

    let symbols = SymbolConfig {
        ambiguity: symbol_byte(args.ambiguity_symbol, "Ambiguity symbol")?,
        probe_id: args.probe_id.clone(),
        ..SymbolConfig::default()
    };

    let aligner = args.align.then(|| {
        let mut config = MuscleConfig::default();
        if let Some(executable) = &args.muscle {
            config.executable = executable.clone();
        }
        config.timeout = args.aligner_timeout.map(Duration::from_secs);
        config.symbols = symbols.clone();
        Muscle::new(config)
    });

    let sink = if args.output == "-" {
        Sink::Stdout
    } else {
        let dir = PathBuf::from(&args.output);
        if let Some((first, second)) = output_clash(&args.files, args.output_format.into()) {
            bail!(
                "{} and {} would both be written to {}",
                first.display(),
                second.display(),
                dir.join(output_name(second, args.output_format.into())).display()
            );
        }
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        Sink::Directory(dir)
    };

    let consensus = DumbConsensus::for_symbols(&symbols);
    let run = Run {
        format: args.format.into(),
        output_format: args.output_format.into(),
        symbols,
        options: TrimOptions {
            method: args.method.into(),
            remove_probe: args.remove_probe,
            bases: args.bases,
            window_size: args.window_size,
            threshold: args.threshold,
            proportion: args.proportion,
        },
        refine: args.refine,
        consensus: args.consensus.then_some(&consensus as &dyn Summarizer),
        aligner,
        sink,
    };

    let mut tally = Tally::default();
    for path in &args.files {
        match run.process(path) {
            Ok(Status::Kept) => tally.kept += 1,
            Ok(Status::Dropped) => tally.dropped += 1,
            Ok(Status::Unrefined) => {
                tally.kept += 1;
                tally.unrefined += 1;
            }
            Err(e) => {
                error!("{e:#}");
                tally.failed += 1;
            }
        }
    }

    info!(
        "Processed {} files: {} kept, {} dropped, {} unrefined, {} failed",
        args.files.len(),
        tally.kept,
        tally.dropped,
        tally.unrefined,
        tally.failed
    );
    if tally.failed > 0 {
        bail!("{} of {} files could not be processed", tally.failed, args.files.len());
    }
    Ok(())
}
