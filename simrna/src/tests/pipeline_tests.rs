/**
 * file: pipeline_tests.rs
 * desc: Working file passes and full pipeline runs.
 */
use std::fs;
use std::path::PathBuf;

use super::*;
use crate::files::WorkingFileReader;
use crate::fragment::Fragment;
use crate::genome::Transcript;
use crate::library::LibraryConfig;
use crate::stages::UniformBreakage;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("simrna-pipeline-{}-{}", std::process::id(), name))
}

fn library(length: usize, molecules: usize) -> TranscriptLibrary {
    let bases: Vec<u8> = b"ACGGTCA".iter().cycle().take(length).cloned().collect();

    TranscriptLibrary::from_transcripts(
        "test.fa",
        vec![
            Transcript::new("tx1", &bases, 0, 500, molecules),
            Transcript::new("tx2", &bases[..length / 2], 0, 500, 0),
        ],
    )
}

fn generator() -> LibraryGenerator {
    LibraryGenerator::new(
        LibraryConfig {
            tss_mean: None,
            poly_a_shape: None,
            poly_a_scale: 300.0,
        },
        Some(1),
    )
    .unwrap()
}

fn read_working(path: &PathBuf) -> Vec<Fragment> {
    WorkingFileReader::open(path)
        .unwrap()
        .filter_map(|r| r.ok())
        .collect()
}

fn config(working: &PathBuf) -> PipelineConfig {
    PipelineConfig {
        working_file: working.clone(),
        seed: Some(42),
        breakage: None,
        reverse_transcription: None,
        size_selection: None,
        amplification: None,
    }
}

#[test]
fn test_initial_library() {
    let working = temp_path("initial.tsv");
    let (stats, max_length) =
        write_initial_library(&mut generator(), &library(1000, 25), &working).unwrap();

    let molecules = read_working(&working);

    assert!(molecules.len() == 25);
    assert!(molecules.iter().all(|m| *m == Fragment::new("tx1", 0, 999)));
    assert!(max_length == 1000);
    assert!(stats.records_out == 25);

    fs::remove_file(&working).ok();
}

#[test]
fn test_stage_pass_skips_malformed_records() {
    let working = temp_path("malformed.tsv");
    fs::write(
        &working,
        "0\t99\ttx1\nbad\trow\there\n5\t50\tmissing\n10\t5\ttx1\n0\t39\ttx2\n",
    )
    .unwrap();

    let mut stage = UniformBreakage::pass_through();
    let stats = run_stage(&mut stage, &library(1000, 1), &working).unwrap();

    assert!(stats.records_in == 2);
    assert!(stats.records_out == 2);
    assert!(stats.malformed == 3);
    assert!(read_working(&working) == vec![Fragment::new("tx1", 0, 99), Fragment::new("tx2", 0, 39)]);

    // Only the working file is left behind, no temporary files
    let leftovers = fs::read_dir(std::env::temp_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with(&format!("simrna-pipeline-{}-malformed.tsv.", std::process::id()))
        })
        .count();

    assert!(leftovers == 0);

    fs::remove_file(&working).ok();
}

#[test]
fn test_reverse_transcription_run() {
    let working = temp_path("rt.tsv");
    let mut c = config(&working);
    c.reverse_transcription = Some(RtSettings {
        config: RtConfig {
            min_ext: 50,
            max_ext: 150,
            gc_low: None,
            lossless: false,
            poly_a_aware: false,
        },
        motif: None,
    });

    let stats = run(c, &mut generator(), &library(1000, 200)).unwrap();
    let fragments = read_working(&working);

    assert!(stats.len() == 2);
    assert!(stats[1].records_in == 200);
    assert!(!fragments.is_empty());
    assert!(fragments.iter().all(|f| f.end == 999));
    assert!(fragments.iter().all(|f| f.length() >= 40 && f.length() <= 160));

    fs::remove_file(&working).ok();
}

#[test]
fn test_full_run_preserves_ids() {
    let working = temp_path("full.tsv");
    let mut c = config(&working);
    c.breakage = Some(BreakageConfig::Nebulization(NebulizationConfig {
        lambda: 300.0,
        m: 2.0,
        threshold: 100,
    }));
    c.reverse_transcription = Some(RtSettings {
        config: RtConfig {
            min_ext: 100,
            max_ext: 300,
            gc_low: None,
            lossless: true,
            poly_a_aware: false,
        },
        motif: None,
    });
    c.size_selection = Some(SizeSelectionSettings {
        mode: SelectionMode::Rejection,
        source: TargetSource::Mixture("N(150,40)".to_string()),
    });
    c.amplification = Some(AmplificationConfig {
        rounds: 2,
        mean: 0.5,
        sigma: 0.2,
    });

    let stats = run(c, &mut generator(), &library(2000, 100)).unwrap();
    let fragments = read_working(&working);

    assert!(stats.len() == 5);
    assert!(stats.iter().all(|s| s.malformed == 0));
    assert!(fragments.iter().all(|f| f.id == "tx1" && f.length() > 0));
    // Amplification only ever adds copies
    assert!(stats[4].records_out >= stats[4].records_in);

    fs::remove_file(&working).ok();
}

#[test]
fn test_prefetch_target() {
    let handle = prefetch_target(TargetSource::File(PathBuf::from("src/tests/data/lengths.txt")));
    let target = join_target(handle).unwrap();

    assert!(target.max_length() == 300);

    let missing = prefetch_target(TargetSource::File(PathBuf::from("src/tests/data/none.txt")));

    assert!(join_target(missing).is_err());
}
