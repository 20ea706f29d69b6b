/**
 * file: library.rs
 * desc: Generate the initial library of full length molecules, with optional variation of the
 *       transcription start site and the poly-A tail length.
 */
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Exp, Weibull};

use shared::SimError;

use crate::fragment::Fragment;
use crate::genome::Transcript;
use crate::rng::{self, Stream};

// Longest poly-A tail a molecule can carry, longer Weibull draws are redrawn
pub const POLY_A_CEILING: i64 = 500;
// Redraws before giving up on a truncated distribution and clamping instead
const MAX_REDRAWS: usize = 100;

/**
 * STRUCTS
 */

/**
 * fields
 *  tss_mean:      mean transcription start shift in nt, None disables TSS variation
 *  poly_a_shape:  Weibull shape of the poly-A length, None disables poly-A variation
 *  poly_a_scale:  Weibull scale of the poly-A length
 */
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    pub tss_mean: Option<f64>,
    pub poly_a_shape: Option<f64>,
    pub poly_a_scale: f64,
}

pub struct LibraryGenerator {
    pub config: LibraryConfig,
    tss: Option<Exp<f64>>,
    poly_a: Option<Weibull<f64>>,
    rng: StdRng,
}

impl LibraryGenerator {
    pub fn new(config: LibraryConfig, seed: Option<u64>) -> Result<Self, SimError> {
        let tss = match config.tss_mean {
            Some(mean) if mean > 0.0 => Some(
                Exp::new(1.0 / mean)
                    .map_err(|e| SimError::Config(format!("invalid TSS mean {}: {}", mean, e)))?,
            ),
            Some(mean) => {
                return Err(SimError::Config(format!(
                    "TSS mean must be positive, got {}",
                    mean
                )))
            }
            None => None,
        };

        let poly_a = match config.poly_a_shape {
            Some(shape) => Some(Weibull::new(config.poly_a_scale, shape).map_err(|e| {
                SimError::Config(format!(
                    "invalid poly-A shape/scale {}/{}: {}",
                    shape, config.poly_a_scale, e
                ))
            })?),
            None => None,
        };

        Ok(LibraryGenerator {
            config,
            tss,
            poly_a,
            rng: rng::stream(seed, Stream::Library),
        })
    }

    /**
     * Upstream padding transcripts need so that every shifted start maps onto sequence.
     */
    pub fn flank(&self) -> usize {
        self.config.tss_mean.map(|m| m.ceil() as usize).unwrap_or(0)
    }

    /**
     * Downstream padding transcripts need to hold the longest poly-A tail.
     */
    pub fn tail(&self) -> usize {
        POLY_A_CEILING as usize
    }

    /**
     * Transcription start offset relative to the annotated start. The magnitude comes from an
     * exponential bounded by min(mean, length / 4), the sign from a fair coin.
     */
    pub fn start_offset(&mut self, length: usize) -> i64 {
        let exp = match &self.tss {
            Some(e) => e,
            None => return 0,
        };

        let mean = self.config.tss_mean.unwrap_or(0.0);
        let bound = mean.min(length as f64 / 4.0);
        let mut magnitude = bound;

        for _ in 0..MAX_REDRAWS {
            let draw = exp.sample(&mut self.rng);

            if draw <= bound {
                magnitude = draw;
                break;
            }
        }

        let magnitude = magnitude.round() as i64;

        if self.rng.gen_bool(0.5) {
            -magnitude
        } else {
            magnitude
        }
    }

    /**
     * Poly-A tail length appended to the transcript end. Draws above the ceiling are redrawn.
     */
    pub fn end_offset(&mut self) -> i64 {
        let weibull = match &self.poly_a {
            Some(w) => w,
            None => return 0,
        };

        for _ in 0..MAX_REDRAWS {
            let draw = weibull.sample(&mut self.rng).round() as i64;

            if draw <= POLY_A_CEILING {
                return draw;
            }
        }

        POLY_A_CEILING
    }

    /**
     * A single full length molecule of the given transcript.
     */
    pub fn molecule(&mut self, transcript: &Transcript) -> Fragment {
        let start = self.start_offset(transcript.length);
        let end = transcript.length as i64 - 1 + self.end_offset();

        Fragment::new(&transcript.id, start, end)
    }

    /**
     * All molecules of a transcript, as many as its profile asks for.
     */
    pub fn molecules_for(&mut self, transcript: &Transcript) -> Vec<Fragment> {
        (0..transcript.molecules)
            .map(|_| self.molecule(transcript))
            .collect()
    }

    pub fn name(&self) -> String {
        format!(
            "Initial library (TSS mean {}, poly-A {})",
            self.config
                .tss_mean
                .map(|m| m.to_string())
                .unwrap_or_else(|| "off".to_string()),
            self.config
                .poly_a_shape
                .map(|s| format!("Weibull shape {} scale {}", s, self.config.poly_a_scale))
                .unwrap_or_else(|| "off".to_string())
        )
    }
}
