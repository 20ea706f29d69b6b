/**
 * file: main.rs
 * desc: it's the main
 */
mod cli;
mod error_profiles;
mod fastq;
mod files;
mod fragment;
mod genome;
mod library;
mod log;
mod pipeline;
mod pwm;
mod rng;
mod simulate;
mod stages;
mod util;

use std::path::Path;
use tracing::{error, info, warn};

use shared::SimError;

use crate::genome::TranscriptLibrary;
use crate::library::LibraryGenerator;

fn run_main() -> Result<(), SimError> {
    let args = cli::parse_cli_args();

    // Set up logging
    log::setup_logging(args.verbose);

    // Validate every stage before anything gets written
    let pipeline_config = cli::determine_pipeline_config(&args)?;
    let eprofile = cli::determine_error_profile(&args)?;
    let mut generator = LibraryGenerator::new(cli::determine_library_config(&args), args.seed)?;

    info!("Loading expression profile {}", args.profile);

    let profile = files::parse_profile(Path::new(&args.profile))?;

    info!("Loading transcripts");

    let library = TranscriptLibrary::from_fasta(
        &args.transcripts,
        &profile,
        generator.flank(),
        generator.tail(),
    )?;

    info!("{}", library);

    if library.total_molecules() == 0 {
        warn!("No transcript has any molecules, the output will be empty");
    }

    let working = pipeline_config.working_file.clone();

    pipeline::run(pipeline_config, &mut generator, &library)?;

    info!("Writing simulated reads to {}", args.output);

    let (stats, counts) = simulate::sequence_library(
        &working,
        &library,
        &eprofile,
        args.read_length,
        Path::new(&args.output),
        args.seed,
    )?;

    info!("{}", stats);

    let counts_path = format!("{}.tsv", args.output);

    info!("Writing simulation counts to {}", counts_path);

    files::write_counts(&counts, Path::new(&counts_path))?;

    if args.keep_working_file {
        info!("Final working file kept at {}", working.display());
    } else {
        std::fs::remove_file(&working).map_err(|e| SimError::io(e, &working))?;
    }

    Ok(())
}

fn main() {
    if let Err(e) = run_main() {
        error!("{}", e);
        std::process::exit(1);
    }
}
