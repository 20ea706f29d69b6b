/**
 * file: simulate.rs
 * desc: Sequence the final library. Every fragment becomes a single read covering its 5' end,
 *       quality scores and substitutions come from the error profile.
 */
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

use shared::SimError;

use crate::error_profiles::ErrorProfile;
use crate::fastq::FastqWriter;
use crate::files::{CountRecord, WorkingFileReader};
use crate::fragment::{Fragment, StageStats};
use crate::genome::{SequenceProvider, Transcript, TranscriptLibrary};
use crate::rng::{self, Stream};

/**
 * STRUCTS
 */

/**
 * A single simulated read and where it came from.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedRead {
    pub id: u64,
    pub transcript_id: String,
    pub start: i64,
    pub end: i64,
    pub sequence: Vec<u8>,
    pub quality: Vec<u8>,
}

/**
 * FUNCTIONS
 */

/**
 * Simulate the read for a single fragment.
 *
 * args
 *  read_id:       unique read number
 *  fragment:      the sequenced fragment
 *  transcript:    transcript the fragment derives from
 *  read_length:   maximum read length, shorter fragments give shorter reads
 *  error_profile: error profile to use when simulating sequencing errors
 *  rng:           sequencing random stream
 */
pub fn simulate_read<T: ErrorProfile + ?Sized>(
    read_id: u64,
    fragment: &Fragment,
    transcript: &Transcript,
    read_length: usize,
    error_profile: &T,
    rng: &mut StdRng,
) -> SimulatedRead {
    let window = transcript.window(fragment.start, fragment.end);
    let bases = &window[..window.len().min(read_length)];

    let quality = error_profile.simulate_phred_scores(bases.len(), rng);
    let sequence = error_profile.simulate_point_mutations(bases, &quality, rng);

    SimulatedRead {
        id: read_id,
        transcript_id: fragment.id.clone(),
        start: fragment.start,
        end: fragment.end,
        sequence,
        quality,
    }
}

/**
 * Turn every fragment of the working file into a read and write them to the output FASTQ.
 *
 * returns
 *  the sequencing pass statistics and per-transcript molecule/fragment counts
 */
pub fn sequence_library<T: ErrorProfile + ?Sized>(
    working: &Path,
    library: &TranscriptLibrary,
    error_profile: &T,
    read_length: usize,
    output: &Path,
    seed: Option<u64>,
) -> Result<(StageStats, Vec<CountRecord>), SimError> {
    let mut rng = rng::stream(seed, Stream::Sequencing);
    let mut stats = StageStats::new(&format!("Sequencing ({})", error_profile.name()));
    let mut fragments: HashMap<String, u64> = HashMap::new();
    let mut writer = FastqWriter::create(output)?;

    for (i, rec) in WorkingFileReader::open(working)?.enumerate() {
        let fragment = match rec {
            Ok(f) => f,
            Err(e) => {
                warn!("Skipping record {}: {}", i + 1, e);
                stats.malformed += 1;
                continue;
            }
        };

        let transcript = match library.sequence_of(&fragment.id) {
            Some(t) => t,
            None => {
                warn!("Skipping record {}: unknown transcript {}", i + 1, fragment.id);
                stats.malformed += 1;
                continue;
            }
        };

        let read = simulate_read(
            stats.records_out,
            &fragment,
            transcript,
            read_length,
            error_profile,
            &mut rng,
        );

        writer.write_read(&read)?;
        stats.record(&[fragment.span(read.start, read.start + read.sequence.len() as i64 - 1)]);
        *fragments.entry(fragment.id).or_insert(0) += 1;
    }

    writer.finish()?;

    let counts = library
        .transcripts
        .iter()
        .filter(|t| t.molecules > 0 || fragments.contains_key(&t.id))
        .map(|t| CountRecord {
            id: t.id.clone(),
            molecules: t.molecules,
            fragments: fragments.get(&t.id).copied().unwrap_or(0),
        })
        .collect();

    Ok((stats, counts))
}
