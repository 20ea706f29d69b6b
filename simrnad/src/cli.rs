/**
 * file: cli.rs
 * desc: CLI parsing.
 */
use clap::{ArgEnum, Parser, Subcommand};

use shared::model::CrossTalkState;

/**
 * CONSTANTS
 */

// Phred+33 can't encode anything above 93
const MAX_QUALITY_STATES: usize = 94;

static CROSSTALK_HELP: &'static str = "
What base substitutions are conditioned on

<quality>   the quality value of the miscalled base
<position>  the position of the miscalled base in the read
";

/**
 * STRUCTS
 */

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ArgEnum)]
pub enum CrossTalkMode {
    Quality,
    Position,
}

#[derive(Debug, Parser)]
pub struct GenerateCommand {
    #[clap(long, value_parser, required = true, help = "SAM file(s) of aligned reads")]
    pub sam_file: Vec<String>,

    #[clap(long, value_parser, help = "Output file for the trained error model")]
    pub output: String,

    #[clap(
        long,
        value_parser,
        default_value = "illumina",
        help = "Sequencing technology tag stored with the model"
    )]
    pub technology: String,

    #[clap(
        long,
        value_parser,
        default_value_t = 150,
        help = "Read length to train, longer reads are truncated"
    )]
    pub read_length: usize,

    #[clap(
        long,
        value_parser = valid_num_states,
        default_value_t = 42,
        help = "Number of quality values, higher qualities are lumped into the top one"
    )]
    pub num_states: usize,

    #[clap(
        long,
        arg_enum,
        value_parser,
        default_value_t = CrossTalkMode::Quality,
        help = CROSSTALK_HELP
    )]
    pub crosstalk_state: CrossTalkMode,

    #[clap(
        long,
        value_parser,
        default_value_t = 1,
        help = "MAPQ threshold, alignments below it only contribute quality scores"
    )]
    pub mapq_threshold: u8,

    #[clap(
        long,
        value_parser,
        help = "Use a maximum of N alignments for training"
    )]
    pub max_alignments: Option<usize>,

    #[clap(
        long,
        value_parser,
        default_value = "/tmp",
        help = "Temporary directory for intermediate files"
    )]
    pub temp_directory: String,

    #[clap(
        long,
        value_parser,
        default_value_t = false,
        help = "Do all work in memory, faster but uses more memory"
    )]
    pub in_memory: bool,

    #[clap(
        long,
        value_parser,
        default_value_t = 1,
        help = "Number of threads to use, a value of 0 uses all available threads"
    )]
    pub threads: usize,

    #[clap(
        long,
        value_parser,
        help = "Save per-position mismatch counts, mean qualities and the quality histogram as TSVs with this prefix"
    )]
    pub save_intermediates: Option<String>,

    #[clap(short, long, value_parser, help = "Report every skipped record")]
    pub verbose: bool,
}

#[derive(Debug, Parser)]
pub struct ViewCommand {
    #[clap(long, value_parser, help = "Trained error model")]
    pub model: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Train an error model from aligned reads
    Generate(GenerateCommand),
    /// Show a summary of a trained error model
    View(ViewCommand),
}

#[derive(Debug, Parser)]
#[clap(version, about, long_about = None)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub command: Command,
}

/**
 * FUNCTIONS
 */

pub fn parse_cli_args() -> CliArgs {
    CliArgs::parse()
}

pub fn determine_crosstalk_state(args: &GenerateCommand) -> CrossTalkState {
    match args.crosstalk_state {
        CrossTalkMode::Quality => CrossTalkState::Quality,
        CrossTalkMode::Position => CrossTalkState::Position,
    }
}

fn valid_num_states(s: &str) -> Result<usize, String> {
    let num_states: usize = s
        .parse()
        .map_err(|_| format!("`{}` isn't a valid integer", s))?;

    if num_states >= 2 && num_states <= MAX_QUALITY_STATES {
        Ok(num_states)
    } else {
        Err(format!(
            "Number of quality states must be between {}-{}",
            2, MAX_QUALITY_STATES
        ))
    }
}
