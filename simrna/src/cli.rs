/**
 * file: cli.rs
 * desc: CLI parsing and conversion of the arguments into validated stage configurations.
 */
use clap::{ArgEnum, Parser};
use std::path;
use uuid::Uuid;

use shared::encoding;
use shared::SimError;

use crate::error_profiles;
use crate::library::LibraryConfig;
use crate::pipeline::{BreakageConfig, PipelineConfig, RtSettings, SizeSelectionSettings};
use crate::pwm::Pwm;
use crate::stages::size_selection::{self, SelectionMode, TargetSource};
use crate::stages::{AmplificationConfig, NebulizationConfig, RtConfig};

/**
 * HELP DESCRIPTIONS
 */

static BREAKAGE_HELP: &'static str = "
Fragmentation method applied to the initial library

<none>          keep full length molecules
<nebulization>  random physical shearing, controlled by --neb-lambda, --neb-m
                and --neb-threshold
<enzymatic>     motif directed cleavage, requires --enzymatic-motif
<uniform>       uniformly placed cuts, --cuts-per-kb per 1000 nt
";

static SIZE_SELECTION_HELP: &'static str = "
How fragments are kept or dropped according to the target length distribution

<rejection>            keep with the target density relative to its peak
<acceptance>           keep with the two-sided tail mass of the target CDF
<metropolis-hastings>  rejection, corrected for lengths that are already over
                       or under represented among the kept fragments
";

static SIZE_DISTRIBUTION_HELP: &'static str = "
Target fragment length distribution, a mixture of normal distributions, e.g.

    0.7*N(250,25)+0.3*N(400,40)

Weights are optional and default to 1. Ignored if --size-distribution-file is set.
";

static MOTIF_HELP: &'static str = "
Position weight matrix file. One row per motif position with four whitespace
separated columns (A C G T), counts or frequencies. Lines starting with '#' are
comments, '# center=<k>' sets the scored position (default: the middle).
";

/**
 * STRUCTS
 */

/**
 * Fragmentation method.
 */
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ArgEnum)]
pub enum BreakageMode {
    None,
    Nebulization,
    Enzymatic,
    Uniform,
}

/**
 * Size selection acceptance rule.
 */
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ArgEnum)]
pub enum SizeSelectionMode {
    Rejection,
    Acceptance,
    MetropolisHastings,
}

#[derive(Debug, Parser)]
#[clap(version, about, long_about = None)]
pub struct CliArgs {
    // Transcript sequences
    #[clap(long, value_parser, help = "FASTA file of transcript sequences")]
    pub transcripts: String,

    // Expression profile
    #[clap(
        long,
        value_parser,
        help = "TSV expression profile with id and molecules columns"
    )]
    pub profile: String,

    // FASTQ output
    #[clap(long, value_parser, help = "FASTQ output containing simulated reads")]
    pub output: String,

    #[clap(
        long,
        default_value = ".",
        value_parser,
        help = "Directory holding the working file while the pipeline runs"
    )]
    pub working_dir: String,

    #[clap(long, value_parser, help = "Keep the final working file")]
    pub keep_working_file: bool,

    #[clap(long, value_parser, help = "Random seed")]
    pub seed: Option<u64>,

    // Initial library
    #[clap(
        long,
        value_parser,
        help = "Mean transcription start shift (nt), enables TSS variation"
    )]
    pub tss_mean: Option<f64>,

    #[clap(
        long,
        value_parser,
        help = "Weibull shape of the poly-A tail length, enables poly-A variation"
    )]
    pub poly_a_shape: Option<f64>,

    #[clap(
        long,
        default_value_t = 300.0,
        value_parser,
        help = "Weibull scale of the poly-A tail length"
    )]
    pub poly_a_scale: f64,

    // Breakage
    #[clap(
        long,
        arg_enum,
        default_value_t = BreakageMode::Nebulization,
        value_parser,
        help = BREAKAGE_HELP
    )]
    pub breakage: BreakageMode,

    #[clap(
        long,
        default_value_t = 900.0,
        value_parser,
        help = "Nebulization characteristic length"
    )]
    pub neb_lambda: f64,

    #[clap(
        long,
        default_value_t = 3.0,
        value_parser,
        help = "Nebulization breakage sharpness"
    )]
    pub neb_m: f64,

    #[clap(
        long,
        default_value_t = 200,
        value_parser,
        help = "Fragments of this length or shorter are never nebulized"
    )]
    pub neb_threshold: i64,

    #[clap(long, value_parser, help = MOTIF_HELP)]
    pub enzymatic_motif: Option<String>,

    #[clap(
        long,
        default_value_t = 0.0,
        value_parser,
        help = "Cuts per 1000 nt for uniform breakage"
    )]
    pub cuts_per_kb: f64,

    // Reverse transcription
    #[clap(long, value_parser, help = "Skip reverse transcription")]
    pub skip_rt: bool,

    #[clap(
        long,
        default_value_t = 200,
        value_parser,
        help = "Shortest first strand extension (nt)"
    )]
    pub rt_min_ext: i64,

    #[clap(
        long,
        default_value_t = 500,
        value_parser,
        help = "Longest first strand extension (nt)"
    )]
    pub rt_max_ext: i64,

    #[clap(
        long,
        value_parser,
        help = "GC fraction below which first strand products start being rejected"
    )]
    pub rt_gc_low: Option<f64>,

    #[clap(long, value_parser, help = "Priming motif, primes at the fragment end if unset")]
    pub rt_motif: Option<String>,

    #[clap(
        long,
        value_parser,
        help = "Fragments too short for a priming event still get one"
    )]
    pub rt_lossless: bool,

    #[clap(
        long,
        value_parser,
        help = "Priming inside the poly-A tail may slip upstream"
    )]
    pub rt_poly_a_aware: bool,

    // Size selection
    #[clap(long, value_parser, help = "Skip size selection")]
    pub skip_size_selection: bool,

    #[clap(
        long,
        arg_enum,
        default_value_t = SizeSelectionMode::Rejection,
        value_parser,
        help = SIZE_SELECTION_HELP
    )]
    pub size_selection_mode: SizeSelectionMode,

    #[clap(
        long,
        default_value = "N(300,50)",
        value_parser,
        help = SIZE_DISTRIBUTION_HELP
    )]
    pub size_distribution: String,

    #[clap(
        long,
        value_parser,
        help = "File of observed fragment lengths, one per line, used as the target distribution"
    )]
    pub size_distribution_file: Option<String>,

    // Amplification
    #[clap(long, value_parser, help = "Number of PCR rounds, enables amplification")]
    pub pcr_rounds: Option<u32>,

    #[clap(
        long,
        default_value_t = 0.5,
        value_parser,
        help = "GC fraction amplified most efficiently"
    )]
    pub pcr_gc_mean: f64,

    #[clap(
        long,
        default_value_t = 0.1,
        value_parser,
        help = "Spread of the PCR GC preference"
    )]
    pub pcr_gc_sigma: f64,

    // Sequencing
    #[clap(
        long,
        default_value_t = 100,
        value_parser,
        help = "Read length (nt), shorter fragments give shorter reads"
    )]
    pub read_length: usize,

    #[clap(
        long,
        value_parser,
        help = "Error model trained by simrnad, perfect reads are simulated if unset"
    )]
    pub error_model: Option<String>,

    #[clap(short, long, value_parser, help = "Log per-transcript and per-stage details")]
    pub verbose: bool,
}

/**
 * FUNCTIONS
 */

/**
 * Load a motif file, a missing file is a configuration error.
 */
fn load_motif(filepath: &str, option: &str) -> Result<Pwm, SimError> {
    let path = path::Path::new(filepath);

    if !path.exists() {
        return Err(SimError::Config(format!(
            "{} {} does not exist",
            option, filepath
        )));
    }

    Pwm::from_file(path)
}

pub fn determine_library_config(args: &CliArgs) -> LibraryConfig {
    LibraryConfig {
        tss_mean: args.tss_mean,
        poly_a_shape: args.poly_a_shape,
        poly_a_scale: args.poly_a_scale,
    }
}

/**
 * Fill out the breakage stage. Enzymatic breakage without a motif is an error.
 */
pub fn determine_breakage(args: &CliArgs) -> Result<Option<BreakageConfig>, SimError> {
    match args.breakage {
        BreakageMode::None => Ok(None),
        BreakageMode::Nebulization => Ok(Some(BreakageConfig::Nebulization(NebulizationConfig {
            lambda: args.neb_lambda,
            m: args.neb_m,
            threshold: args.neb_threshold,
        }))),
        BreakageMode::Enzymatic => match &args.enzymatic_motif {
            Some(motif) => Ok(Some(BreakageConfig::Enzymatic(load_motif(
                motif,
                "--enzymatic-motif",
            )?))),
            None => Err(SimError::Config(
                "enzymatic breakage requires --enzymatic-motif".to_string(),
            )),
        },
        BreakageMode::Uniform => Ok(Some(BreakageConfig::Uniform(args.cuts_per_kb))),
    }
}

pub fn determine_reverse_transcription(args: &CliArgs) -> Result<Option<RtSettings>, SimError> {
    if args.skip_rt {
        return Ok(None);
    }

    let motif = match &args.rt_motif {
        Some(m) => Some(load_motif(m, "--rt-motif")?),
        None => None,
    };

    Ok(Some(RtSettings {
        config: RtConfig {
            min_ext: args.rt_min_ext,
            max_ext: args.rt_max_ext,
            gc_low: args.rt_gc_low,
            lossless: args.rt_lossless,
            poly_a_aware: args.rt_poly_a_aware,
        },
        motif,
    }))
}

/**
 * Fill out size selection. The target itself is loaded later, in the background, but a bad
 * expression or a missing file is reported right away.
 */
pub fn determine_size_selection(
    args: &CliArgs,
) -> Result<Option<SizeSelectionSettings>, SimError> {
    if args.skip_size_selection {
        return Ok(None);
    }

    let mode = match args.size_selection_mode {
        SizeSelectionMode::Rejection => SelectionMode::Rejection,
        SizeSelectionMode::Acceptance => SelectionMode::Acceptance,
        SizeSelectionMode::MetropolisHastings => SelectionMode::MetropolisHastings,
    };

    let source = match &args.size_distribution_file {
        Some(f) => {
            if !path::Path::new(f).exists() {
                return Err(SimError::Config(format!(
                    "--size-distribution-file {} does not exist",
                    f
                )));
            }

            TargetSource::File(path::PathBuf::from(f))
        }
        None => {
            size_selection::parse_mixture(&args.size_distribution)?;

            TargetSource::Mixture(args.size_distribution.clone())
        }
    };

    Ok(Some(SizeSelectionSettings { mode, source }))
}

pub fn determine_amplification(args: &CliArgs) -> Option<AmplificationConfig> {
    args.pcr_rounds.map(|rounds| AmplificationConfig {
        rounds,
        mean: args.pcr_gc_mean,
        sigma: args.pcr_gc_sigma,
    })
}

/**
 * Fill out the whole pipeline. The working file gets a unique name inside the working
 * directory.
 */
pub fn determine_pipeline_config(args: &CliArgs) -> Result<PipelineConfig, SimError> {
    let working_dir = path::Path::new(&args.working_dir);

    if !working_dir.is_dir() {
        return Err(SimError::Config(format!(
            "working directory {} does not exist",
            args.working_dir
        )));
    }

    Ok(PipelineConfig {
        working_file: working_dir.join(format!("simrna-{}.working.tsv", Uuid::new_v4())),
        seed: args.seed,
        breakage: determine_breakage(args)?,
        reverse_transcription: determine_reverse_transcription(args)?,
        size_selection: determine_size_selection(args)?,
        amplification: determine_amplification(args),
    })
}

/**
 * Fill out and return an ErrorProfile implementation using the user provided arguments.
 */
pub fn determine_error_profile(
    args: &CliArgs,
) -> Result<Box<dyn error_profiles::ErrorProfile>, SimError> {
    match &args.error_model {
        Some(filepath) => {
            let path = path::Path::new(filepath);

            if !path.exists() {
                return Err(SimError::Config(format!(
                    "--error-model {} does not exist",
                    filepath
                )));
            }

            let model_params = encoding::deserialize_model_from_path(path)?;

            Ok(Box::new(error_profiles::MarkovErrorProfile::new(
                model_params,
            )))
        }
        None => Ok(Box::new(error_profiles::PerfectErrorProfile {})),
    }
}

pub fn parse_cli_args() -> CliArgs {
    CliArgs::parse()
}
