mod alignment;
mod cli;
mod log;
mod training;

use noodles::sam;
use noodles::sam::record::data::field::tag;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{error, info, warn};

use shared::encoding;
use shared::util;
use shared::SimError;

use crate::alignment::TrainingRead;
use crate::training::{Diagnostics, TrainerConfig, TrainingTables};

/**
 * Parse every SAM file and hand each usable record to the sink as a training read. Skipped
 * records are counted in the diagnostics.
 */
fn ingest_alignments(
    args: &cli::GenerateCommand,
    diagnostics: &mut Diagnostics,
    sink: &mut dyn FnMut(TrainingRead) -> Result<(), SimError>,
) -> Result<(), SimError> {
    let mut seen = 0;

    for sam_file in args.sam_file.iter() {
        let mut sam_reader = File::open(sam_file)
            .map(BufReader::new)
            .map(sam::Reader::new)
            .map_err(|e| SimError::io(e, sam_file))?;

        let sam_header = sam_reader
            .read_header()
            .map_err(|e| SimError::parse(sam_file.clone(), format!("bad header: {}", e)))?;

        info!("Parsing {}", sam_file);

        for res in sam_reader.records(&sam_header) {
            // Stop collecting alignments if necessary
            if args.max_alignments.map_or(false, |m| seen >= m) {
                return Ok(());
            }

            seen += 1;

            let record = match res {
                Ok(r) => r,
                Err(e) => {
                    warn!("{}: skipping record {}: {}", sam_file, seen, e);
                    diagnostics.malformed += 1;
                    continue;
                }
            };

            // Get the read's sequence from the alignment record
            let seq = record.sequence().to_string().as_bytes().to_vec();

            // If a sequence isn't provided, skip. Probably a secondary alignment
            if seq.is_empty() {
                diagnostics.missing_sequence += 1;
                continue;
            }

            let qualities: Vec<u8> = record
                .quality_scores()
                .as_ref()
                .iter()
                .map(|score| u8::from(*score))
                .collect();

            let mapq = record.mapping_quality();

            // Unmapped and poorly mapped reads are only used for the quality model
            let alignment = if record.flags().is_unmapped() {
                diagnostics.unmapped += 1;
                None
            } else if mapq.map_or(false, |q| q.get() < args.mapq_threshold) {
                diagnostics.low_mapq += 1;
                None
            } else {
                match record
                    .data()
                    .get(&tag::MISMATCHED_POSITIONS)
                    .and_then(|t| t.as_str())
                {
                    None => {
                        warn!(
                            "Read ({}) alignment is missing the MD tag",
                            record
                                .read_name()
                                .map(|n| util::bytes_to_string(n.as_ref()))
                                .unwrap_or_default()
                        );
                        diagnostics.missing_md += 1;
                        None
                    }
                    Some(md) => {
                        // Regenerate the raw CIGAR string from the alignment record
                        let cigar: Vec<u8> = record
                            .cigar()
                            .iter()
                            .flat_map(|op| {
                                format!("{}{}", op.len(), char::from(op.kind()))
                                    .into_bytes()
                            })
                            .collect();

                        Some((cigar, md.as_bytes().to_vec()))
                    }
                }
            };

            let read = TrainingRead::from_sam_fields(
                &seq,
                &qualities,
                record.flags().is_reverse_complemented(),
                alignment
                    .as_ref()
                    .map(|(cigar, md)| (cigar.as_slice(), md.as_slice())),
            );

            match read {
                Ok(r) => sink(r)?,
                Err(e) => {
                    warn!("{}: skipping record {}: {}", sam_file, seen, e);
                    diagnostics.malformed += 1;
                }
            }
        }
    }

    Ok(())
}

/**
 * Ingest and train keeping every read in memory.
 */
fn train_in_memory(
    args: &cli::GenerateCommand,
    config: &TrainerConfig,
    diagnostics: &mut Diagnostics,
) -> Result<TrainingTables, SimError> {
    let mut reads = Vec::new();

    ingest_alignments(args, diagnostics, &mut |r| {
        reads.push(r);
        Ok(())
    })?;

    info!("Training on {} reads", reads.len());

    training::train(reads.into_par_iter().map(Ok), config)
}

/**
 * Ingest while spilling reads to a temporary file, then train by streaming that file back.
 */
fn train_from_disk(
    args: &cli::GenerateCommand,
    config: &TrainerConfig,
    diagnostics: &mut Diagnostics,
) -> Result<TrainingTables, SimError> {
    let spill_path =
        Path::new(&args.temp_directory).join(format!("simrnad-{}.reads", std::process::id()));

    info!(
        "Writing training reads to temporary location, {}",
        spill_path.display()
    );

    let mut spill = File::create(&spill_path)
        .map(BufWriter::new)
        .map_err(|e| SimError::io(e, &spill_path))?;

    ingest_alignments(args, diagnostics, &mut |r| {
        let line = alignment::serialize_to_hex_string(&r)?;

        writeln!(spill, "{}", line).map_err(|e| SimError::io(e, &spill_path))
    })?;

    spill.flush().map_err(|e| SimError::io(e, &spill_path))?;
    drop(spill);

    info!("Training on spilled reads");

    let file = File::open(&spill_path).map_err(|e| SimError::io(e, &spill_path))?;
    let tables = training::train(
        io::BufReader::new(file)
            .lines()
            .par_bridge()
            .map(|line| {
                line.map_err(|e| SimError::io(e, &spill_path))
                    .and_then(|l| alignment::deserialize_from_hex_string(&l))
            }),
        config,
    );

    // Clean up the temp file, even if training failed
    if let Err(e) = fs::remove_file(&spill_path) {
        warn!("Failed to remove {}: {}", spill_path.display(), e);
    }

    tables
}

/*
 * Train and store the error model.
 */
fn generate_error_model(args: &cli::GenerateCommand) -> Result<(), SimError> {
    let config = TrainerConfig {
        read_length: args.read_length,
        num_states: args.num_states,
        crosstalk_state: cli::determine_crosstalk_state(args),
    };
    let mut diagnostics = Diagnostics::new(config.read_length, config.num_states);

    let mut tables = if args.in_memory {
        train_in_memory(args, &config, &mut diagnostics)?
    } else {
        train_from_disk(args, &config, &mut diagnostics)?
    };

    tables.diagnostics.merge(&diagnostics);

    if tables.diagnostics.skipped() > 0 {
        warn!("Skipped {} records", tables.diagnostics.skipped());
    }

    if !tables.qualities.is_trained() {
        warn!("No quality scores were observed, simulated qualities will be uniform");
    }

    for line in tables.diagnostics.to_string().lines() {
        info!("  {}", line);
    }

    if let Some(prefix) = &args.save_intermediates {
        info!("Saving training diagnostics to {}.*.tsv", prefix);

        tables.diagnostics.write_tsv(prefix)?;
    }

    let model = encoding::ErrorModelParams {
        technology: args.technology.clone(),
        read_length: config.read_length,
        qualities: tables.qualities,
        crosstalk: tables.crosstalk,
    };

    // Fatal if the model can't be read back
    encoding::save_and_verify_model(Path::new(&args.output), &model)?;

    info!("Wrote sequence error model to {}", args.output);

    Ok(())
}

fn view_error_model(args: &cli::ViewCommand) -> Result<(), SimError> {
    let model = encoding::deserialize_model_from_path(Path::new(&args.model))?;

    print!("{}", model);

    Ok(())
}

fn run_main() -> Result<(), SimError> {
    let args = cli::parse_cli_args();

    match &args.command {
        cli::Command::Generate(generate) => {
            // Setup stderr logging
            log::setup_logging(generate.verbose);

            // Setup threads
            rayon::ThreadPoolBuilder::new()
                .num_threads(generate.threads)
                .build_global()
                .map_err(|e| SimError::Config(format!("failed to set up threads: {}", e)))?;

            generate_error_model(generate)
        }
        cli::Command::View(view) => {
            log::setup_logging(false);

            view_error_model(view)
        }
    }
}

fn main() {
    if let Err(e) = run_main() {
        error!("{}", e);
        std::process::exit(1);
    }
}
