/**
 * file: pipeline.rs
 * desc: Drives the library preparation. The initial library is written to the working file
 *       and every enabled stage then streams the working file, replacing it with its output.
 */
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, info, warn};

use shared::SimError;

use crate::files::{WorkingFileReader, WorkingFileWriter};
use crate::fragment::StageStats;
use crate::genome::{SequenceProvider, TranscriptLibrary};
use crate::library::LibraryGenerator;
use crate::pwm::Pwm;
use crate::stages::size_selection::load_target;
use crate::stages::{
    Amplification, AmplificationConfig, Breakage, Enzymatic, FragmentStage, Nebulization,
    NebulizationConfig, ReverseTranscription, RtConfig, SelectionMode, SizeSelection,
    TargetDistribution, TargetSource, UniformBreakage,
};

/**
 * STRUCTS
 */

/**
 * Which breakage stage to run. Nebulization is only built once the longest molecule of the
 * initial library is known.
 */
#[derive(Debug, Clone)]
pub enum BreakageConfig {
    Nebulization(NebulizationConfig),
    Enzymatic(Pwm),
    Uniform(f64),
}

#[derive(Debug, Clone)]
pub struct RtSettings {
    pub config: RtConfig,
    pub motif: Option<Pwm>,
}

#[derive(Debug, Clone)]
pub struct SizeSelectionSettings {
    pub mode: SelectionMode,
    pub source: TargetSource,
}

/**
 * Everything the pipeline runs, already validated. A None stage is skipped.
 */
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub working_file: PathBuf,
    pub seed: Option<u64>,
    pub breakage: Option<BreakageConfig>,
    pub reverse_transcription: Option<RtSettings>,
    pub size_selection: Option<SizeSelectionSettings>,
    pub amplification: Option<AmplificationConfig>,
}

/**
 * FUNCTIONS
 */

/**
 * Write every molecule of the initial library to the working file.
 *
 * returns
 *  the pass statistics and the length of the longest molecule written
 */
pub fn write_initial_library(
    generator: &mut LibraryGenerator,
    library: &TranscriptLibrary,
    working: &Path,
) -> Result<(StageStats, usize), SimError> {
    let name = generator.name();
    let mut stats = StageStats::new(&name);
    let mut writer = WorkingFileWriter::create(working)?;
    let mut max_length = 0;

    for transcript in library.transcripts.iter().filter(|t| t.molecules > 0) {
        debug!("{} molecules of {}", transcript.molecules, transcript.id);

        for molecule in generator.molecules_for(transcript) {
            max_length = max_length.max(molecule.length().max(0) as usize);

            writer
                .write(&molecule)
                .map_err(|e| SimError::stage(name.clone(), e.to_string()))?;
            stats.record(std::slice::from_ref(&molecule));
        }
    }

    writer
        .commit()
        .map_err(|e| SimError::stage(name.clone(), e.to_string()))?;

    Ok((stats, max_length))
}

/**
 * Stream the working file through a stage and replace it with the stage's output. Records
 * that can't be parsed, have no length or reference an unknown transcript are skipped.
 */
pub fn run_stage<S: FragmentStage + ?Sized, P: SequenceProvider>(
    stage: &mut S,
    provider: &P,
    working: &Path,
) -> Result<StageStats, SimError> {
    let name = stage.name();
    let mut stats = StageStats::new(&name);
    let reader = WorkingFileReader::open(working)?;
    let mut writer = WorkingFileWriter::create(working)?;

    for (i, rec) in reader.enumerate() {
        let fragment = match rec {
            Ok(f) => f,
            Err(e) => {
                warn!("{}: skipping record {}: {}", name, i + 1, e);
                stats.malformed += 1;
                continue;
            }
        };

        let transcript = match provider.sequence_of(&fragment.id) {
            Some(t) if fragment.length() > 0 => t,
            Some(_) => {
                warn!("{}: skipping empty record {} ({})", name, i + 1, fragment);
                stats.malformed += 1;
                continue;
            }
            None => {
                warn!(
                    "{}: skipping record {}, unknown transcript {}",
                    name,
                    i + 1,
                    fragment.id
                );
                stats.malformed += 1;
                continue;
            }
        };

        let emitted = stage.process(&fragment, transcript);

        for f in emitted.iter() {
            writer
                .write(f)
                .map_err(|e| SimError::stage(name.clone(), e.to_string()))?;
        }

        stats.record(&emitted);
    }

    writer
        .commit()
        .map_err(|e| SimError::stage(name.clone(), e.to_string()))?;

    Ok(stats)
}

/**
 * Run a stage and log what it did.
 */
fn run_logged<S: FragmentStage + ?Sized>(
    stage: &mut S,
    library: &TranscriptLibrary,
    working: &Path,
) -> Result<StageStats, SimError> {
    info!("Running {}", stage.name());

    let stats = run_stage(stage, library, working)?;

    info!("{}", stats);
    info!("{}", stage.status());

    Ok(stats)
}

/**
 * Load the size selection target on a background thread.
 */
pub fn prefetch_target(
    source: TargetSource,
) -> thread::JoinHandle<Result<TargetDistribution, SimError>> {
    thread::spawn(move || load_target(&source))
}

/**
 * Wait for a prefetched target distribution.
 */
pub fn join_target(
    handle: thread::JoinHandle<Result<TargetDistribution, SimError>>,
) -> Result<TargetDistribution, SimError> {
    handle
        .join()
        .map_err(|_| SimError::stage("size selection", "target distribution loader panicked"))?
}

/**
 * Run the initial library generation and every configured stage in order.
 *
 * returns
 *  statistics of every pass, in the order they ran
 */
pub fn run(
    config: PipelineConfig,
    generator: &mut LibraryGenerator,
    library: &TranscriptLibrary,
) -> Result<Vec<StageStats>, SimError> {
    let working = config.working_file.as_path();
    let seed = config.seed;

    // Runs alongside the initial library pass
    let target = config
        .size_selection
        .as_ref()
        .map(|s| prefetch_target(s.source.clone()));

    info!("Writing the initial library to {}", working.display());

    let (initial, max_length) = write_initial_library(generator, library, working)?;

    info!("{}", initial);

    let mut all_stats = vec![initial];

    if let Some(breakage) = config.breakage {
        let mut stage = match breakage {
            BreakageConfig::Nebulization(c) => {
                Breakage::Nebulization(Nebulization::new(c, max_length, seed)?)
            }
            BreakageConfig::Enzymatic(pwm) => Breakage::Enzymatic(Enzymatic::new(pwm, seed)),
            BreakageConfig::Uniform(cuts_per_kb) => {
                Breakage::Uniform(UniformBreakage::new(cuts_per_kb, seed)?)
            }
        };

        all_stats.push(run_logged(&mut stage, library, working)?);
    }

    if let Some(rt) = config.reverse_transcription {
        let mut stage = ReverseTranscription::new(rt.config, rt.motif, seed)?;

        all_stats.push(run_logged(&mut stage, library, working)?);

        if stage.config.gc_low.is_some() {
            info!("GC filter outcomes:\n{}", stage.histogram);
        }
    }

    if let (Some(settings), Some(handle)) = (config.size_selection, target) {
        let target = join_target(handle)?;

        info!("Loaded size selection target {}", target);

        let mut stage = SizeSelection::new(settings.mode, target, seed);

        all_stats.push(run_logged(&mut stage, library, working)?);
    }

    if let Some(amplification) = config.amplification {
        let mut stage = Amplification::new(amplification)?;

        all_stats.push(run_logged(&mut stage, library, working)?);
    }

    Ok(all_stats)
}

#[cfg(test)]
#[path = "tests/pipeline_tests.rs"]
mod pipeline_tests;
