/**
 * file: training.rs
 * desc: Builds the quality transition and cross-talk tables from training reads. Each rayon
 *       worker fills its own tables and these are merged by addition.
 */
use itertools::{izip, Itertools};
use rayon::prelude::*;
use std::path::Path;
use tracing::warn;

use shared::model::{CrossTalkModel, CrossTalkState, QualityTransitionModel};
use shared::util;
use shared::SimError;

use crate::alignment::TrainingRead;

/**
 * STRUCTS
 */

/**
 * Shape of the tables being trained.
 *
 * fields
 *  read_length:     positions with their own transition matrix, longer reads are truncated
 *  num_states:      number of quality values
 *  crosstalk_state: what substitutions are conditioned on
 */
#[derive(Clone, Copy, Debug)]
pub struct TrainerConfig {
    pub read_length: usize,
    pub num_states: usize,
    pub crosstalk_state: CrossTalkState,
}

/**
 * Counters collected alongside the tables, for reporting only.
 *
 * fields
 *  reads:                  reads that were trained on
 *  mismatches_by_position: mismatches seen at each read position
 *  quality_sums:           sum of the qualities seen at each read position
 *  bases_by_position:      number of qualities seen at each read position
 *  quality_histogram:      how often each quality value was seen, clamped to the top state
 *  missing_sequence:       records without a sequence
 *  unmapped:               unmapped reads, qualities only
 *  low_mapq:               alignments below the MAPQ threshold, qualities only
 *  missing_md:             mapped reads without an MD tag, qualities only
 *  malformed:              records that couldn't be parsed
 */
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostics {
    pub reads: u64,
    pub mismatches_by_position: Vec<u64>,
    pub quality_sums: Vec<u64>,
    pub bases_by_position: Vec<u64>,
    pub quality_histogram: Vec<u64>,
    pub missing_sequence: u64,
    pub unmapped: u64,
    pub low_mapq: u64,
    pub missing_md: u64,
    pub malformed: u64,
}

/**
 * A set of tables being trained, either the final ones or those of a single worker.
 */
#[derive(Clone, Debug)]
pub struct TrainingTables {
    pub qualities: QualityTransitionModel,
    pub crosstalk: CrossTalkModel,
    pub diagnostics: Diagnostics,
}

/**
 * FUNCTIONS
 */

impl Diagnostics {
    pub fn new(read_length: usize, num_states: usize) -> Self {
        Diagnostics {
            reads: 0,
            mismatches_by_position: vec![0; read_length],
            quality_sums: vec![0; read_length],
            bases_by_position: vec![0; read_length],
            quality_histogram: vec![0; num_states],
            missing_sequence: 0,
            unmapped: 0,
            low_mapq: 0,
            missing_md: 0,
            malformed: 0,
        }
    }

    pub fn merge(&mut self, other: &Diagnostics) {
        self.reads += other.reads;

        for (a, b) in izip!(
            self.mismatches_by_position
                .iter_mut()
                .chain(self.quality_sums.iter_mut())
                .chain(self.bases_by_position.iter_mut())
                .chain(self.quality_histogram.iter_mut()),
            other
                .mismatches_by_position
                .iter()
                .chain(other.quality_sums.iter())
                .chain(other.bases_by_position.iter())
                .chain(other.quality_histogram.iter())
        ) {
            *a += b;
        }

        self.missing_sequence += other.missing_sequence;
        self.unmapped += other.unmapped;
        self.low_mapq += other.low_mapq;
        self.missing_md += other.missing_md;
        self.malformed += other.malformed;
    }

    /**
     * Mean quality at each position, zero where nothing was seen.
     */
    pub fn mean_quality_by_position(&self) -> Vec<f64> {
        self.quality_sums
            .iter()
            .zip(self.bases_by_position.iter())
            .map(|(s, n)| if *n == 0 { 0.0 } else { *s as f64 / *n as f64 })
            .collect()
    }

    pub fn skipped(&self) -> u64 {
        self.missing_sequence + self.malformed
    }

    /**
     * Write the per-position and quality histogram tables as <prefix>.positions.tsv and
     * <prefix>.qualities.tsv.
     */
    pub fn write_tsv(&self, prefix: &str) -> Result<(), SimError> {
        let positions_path = format!("{}.positions.tsv", prefix);
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(&positions_path)
            .map_err(|e| SimError::parse(positions_path.clone(), format!("{}", e)))?;

        writer
            .write_record(&["position", "bases", "mismatches", "mean_quality"])
            .map_err(|e| SimError::parse(positions_path.clone(), format!("{}", e)))?;

        for (pos, bases, mismatches, mean) in izip!(
            0..,
            self.bases_by_position.iter(),
            self.mismatches_by_position.iter(),
            self.mean_quality_by_position()
        ) {
            writer
                .write_record(&[
                    pos.to_string(),
                    bases.to_string(),
                    mismatches.to_string(),
                    format!("{:.3}", mean),
                ])
                .map_err(|e| SimError::parse(positions_path.clone(), format!("{}", e)))?;
        }

        writer
            .flush()
            .map_err(|e| SimError::io(e, Path::new(&positions_path)))?;

        let qualities_path = format!("{}.qualities.tsv", prefix);
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(&qualities_path)
            .map_err(|e| SimError::parse(qualities_path.clone(), format!("{}", e)))?;

        writer
            .write_record(&["quality", "count"])
            .map_err(|e| SimError::parse(qualities_path.clone(), format!("{}", e)))?;

        for (quality, count) in self.quality_histogram.iter().enumerate() {
            writer
                .write_record(&[quality.to_string(), count.to_string()])
                .map_err(|e| SimError::parse(qualities_path.clone(), format!("{}", e)))?;
        }

        writer
            .flush()
            .map_err(|e| SimError::io(e, Path::new(&qualities_path)))
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let means = self.mean_quality_by_position();
        let observed = means
            .iter()
            .zip(self.bases_by_position.iter())
            .filter(|(_, n)| **n > 0)
            .map(|(m, _)| *m)
            .collect::<Vec<f64>>();
        let mismatches: u64 = self.mismatches_by_position.iter().sum();
        let bases: u64 = self.bases_by_position.iter().sum();

        writeln!(f, "reads trained: {}", self.reads)?;
        writeln!(
            f,
            "skipped: {} missing sequence, {} malformed",
            self.missing_sequence, self.malformed
        )?;
        writeln!(
            f,
            "qualities only: {} unmapped, {} below MAPQ threshold, {} without MD tag",
            self.unmapped, self.low_mapq, self.missing_md
        )?;
        writeln!(
            f,
            "mismatch rate: {:.5}",
            if bases == 0 {
                0.0
            } else {
                mismatches as f64 / bases as f64
            }
        )?;
        writeln!(
            f,
            "mean quality over positions: {:.2} (sd {:.2})",
            util::mean(&observed),
            util::std_deviation(&observed)
        )?;
        // Only the first few positions, the TSV has all of them
        write!(
            f,
            "mean quality at positions 0-9: {}",
            means.iter().take(10).map(|m| format!("{:.1}", m)).join(" ")
        )
    }
}

impl TrainingTables {
    pub fn new(config: &TrainerConfig) -> Self {
        let crosstalk_states = match config.crosstalk_state {
            CrossTalkState::Quality => config.num_states,
            CrossTalkState::Position => config.read_length.max(1),
        };

        TrainingTables {
            qualities: QualityTransitionModel::new(config.num_states, config.read_length),
            crosstalk: CrossTalkModel::new(config.crosstalk_state, crosstalk_states),
            diagnostics: Diagnostics::new(config.read_length, config.num_states),
        }
    }

    /**
     * Add a single read. Positions past the trained read length are ignored, mismatches
     * without a quality value can't be placed in a quality indexed table and are dropped.
     */
    pub fn record(&mut self, read: &TrainingRead) {
        let read_length = self.qualities.read_length;
        let qualities = &read.qualities[..read.qualities.len().min(read_length)];

        self.diagnostics.reads += 1;
        self.qualities.record_read(qualities);

        for (pos, q) in qualities.iter().enumerate() {
            let state = self.qualities.clamp_state(*q);

            self.diagnostics.quality_histogram[state] += 1;
            self.diagnostics.quality_sums[pos] += *q as u64;
            self.diagnostics.bases_by_position[pos] += 1;
        }

        for m in read.mappings.iter().flat_map(|m| m.mismatches.iter()) {
            if m.position >= read_length {
                continue;
            }

            let state = match self.crosstalk.state {
                CrossTalkState::Position => m.position,
                CrossTalkState::Quality => match qualities.get(m.position) {
                    Some(q) => self.qualities.clamp_state(*q),
                    None => continue,
                },
            };

            self.crosstalk.record(state, m.genomic, m.read);
            self.diagnostics.mismatches_by_position[m.position] += 1;
        }
    }

    pub fn merge(&mut self, other: &TrainingTables) -> Result<(), SimError> {
        self.qualities.merge(&other.qualities)?;
        self.crosstalk.merge(&other.crosstalk)?;
        self.diagnostics.merge(&other.diagnostics);

        Ok(())
    }
}

/**
 * Train on every read of a parallel iterator. Reads that failed to parse are logged, counted
 * and skipped.
 */
pub fn train<I>(reads: I, config: &TrainerConfig) -> Result<TrainingTables, SimError>
where
    I: ParallelIterator<Item = Result<TrainingRead, SimError>>,
{
    reads
        .fold(
            || TrainingTables::new(config),
            |mut tables, read| {
                match read {
                    Ok(r) => tables.record(&r),
                    Err(e) => {
                        warn!("Skipping training read: {}", e);
                        tables.diagnostics.malformed += 1;
                    }
                }

                tables
            },
        )
        .map(Ok)
        .reduce(
            || Ok(TrainingTables::new(config)),
            |a, b| {
                let mut a = a?;
                a.merge(&b?)?;

                Ok(a)
            },
        )
}
