//! End-to-end runs over alignment files on disk.

use std::fs;

use seqtrim::config::SymbolConfig;
use seqtrim::consensus::DumbConsensus;
use seqtrim::formats::{parse_file, write_alignment, FileFormat};
use seqtrim::model::ColumnRange;
use seqtrim::pipeline::Locus;
use seqtrim::trim::{PolicyFailure, TrimMethod, TrimOptions};

const LOCUS: &str = "\
>ind1 uce|chr1_5000
--AACCGTNACGTTGCA---
>ind2 uce|chr1_5000
-GAACCGTAACGTTGCAT--
>probe uce|chr1_5000|probe
-----CGTAACGT-------
>ind3 uce|chr1_5000
TGAACCGTAACGTTGCATTA
";

#[test]
fn test_fasta_file_through_trim_and_refine() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("chr1_5000.fasta");
    fs::write(&input, LOCUS).unwrap();

    let mut locus = Locus::read(&input, None, SymbolConfig::default()).unwrap();
    assert_eq!(locus.label(), "chr1_5000");
    assert_eq!(locus.probe_location(), Some(ColumnRange::new(5, 13)));

    let consensus = DumbConsensus::default();
    let options = TrimOptions {
        method: TrimMethod::StaticProbe,
        bases: Some(3),
        ..TrimOptions::default()
    };
    locus.trim(&options, Some(&consensus)).unwrap();
    let trimmed = locus.trimmed().unwrap();
    assert_eq!(trimmed.alignment_length(), 14);
    assert_eq!(trimmed.get(0).unwrap().as_str(), "AACCGTNACGTTGC");

    locus.refine(Some(&consensus)).unwrap();
    let refined = locus.refined().unwrap();
    assert_eq!(refined.get(3).unwrap().as_str(), "ACGTTGC");
    assert_eq!(locus.refined_summary().unwrap().consensus, "ACGTTGC");

    // Written results read back unchanged, whatever the format
    for format in [FileFormat::Fasta, FileFormat::Nexus] {
        let output = dir.path().join(format!("chr1_5000.trimmed.{}", format.extension()));
        let file = fs::File::create(&output).unwrap();
        write_alignment(file, refined, format, locus.symbols()).unwrap();

        let reread = parse_file(&output).unwrap();
        assert_eq!(reread.sequence_count(), 4);
        for (a, b) in reread.iter().zip(refined.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.as_str(), b.as_str());
        }
    }
}

#[test]
fn test_probe_removal_on_nexus_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("locus.nex");
    fs::write(
        &input,
        "#NEXUS\n\
         BEGIN DATA;\n\
         DIMENSIONS NTAX=3 NCHAR=10;\n\
         FORMAT DATATYPE=DNA GAP=- MISSING=?;\n\
         MATRIX\n\
         ind1  AACGGTTCAA\n\
         probe ---GGTT---\n\
         ind2  TACGGTTCAT\n\
         ;\n\
         END;\n",
    )
    .unwrap();

    let mut locus = Locus::read(&input, None, SymbolConfig::default()).unwrap();
    let options = TrimOptions {
        method: TrimMethod::Edges,
        remove_probe: true,
        ..TrimOptions::default()
    };
    locus.trim(&options, None).unwrap();
    let trimmed = locus.trimmed().unwrap();
    assert_eq!(trimmed.get(0).unwrap().as_str(), "AACCAA");
    assert_eq!(trimmed.get(2).unwrap().as_str(), "TACCAT");
}

#[test]
fn test_loci_fail_independently() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.fasta");
    let gapped = dir.path().join("gapped.fasta");
    fs::write(&good, ">a\nACGT\n>b\nACGA\n").unwrap();
    fs::write(&gapped, ">a x|gapped_locus\n-ACG\n>b\nA-CG\n>c\nAC--\n").unwrap();

    let options = TrimOptions::default();
    let mut results = Vec::new();
    for path in [&gapped, &good] {
        let mut locus = Locus::read(path, None, SymbolConfig::default()).unwrap();
        results.push((locus.label(), locus.trim(&options, None)));
    }
    assert_eq!(
        results,
        vec![
            ("gapped_locus".to_string(), Err(PolicyFailure::NoGapFreeColumn)),
            ("a".to_string(), Ok(())),
        ]
    );
}
