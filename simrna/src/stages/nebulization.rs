/**
 * file: nebulization.rs
 * desc: Nebulization breaks molecules by random physical shearing. Each round every fragment
 *       above the threshold may be split close to its middle, long fragments are much more
 *       likely to break than short ones.
 */
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

use shared::SimError;

use super::base;
use crate::fragment::Fragment;
use crate::genome::Transcript;
use crate::rng::{self, Stream};

// Breakpoints come from a standard normal clipped to this many standard deviations
pub const CUT_OFF_GAUSSIAN: f64 = 2.85;
// Rounds are capped so 2^rounds can't overflow
const MAX_ROUNDS: usize = 62;

/**
 * fields
 *  lambda:    characteristic fragment length of the shearing
 *  m:         sharpness of the length dependent breakage probability
 *  threshold: fragments of this length or shorter are never broken
 */
#[derive(Debug, Clone)]
pub struct NebulizationConfig {
    pub lambda: f64,
    pub m: f64,
    pub threshold: i64,
}

pub struct Nebulization {
    pub config: NebulizationConfig,
    // Number of halving rounds, ceil(longest molecule / lambda)
    depth: usize,
    // Upper bound on the number of pieces a single molecule can end up in
    capacity: usize,
    current: Vec<i64>,
    next: Vec<i64>,
    breakpoint_rng: StdRng,
    acceptance_rng: StdRng,
    attempts: u64,
    breaks: u64,
}

/**
 * Draw from a standard normal clipped to +/- CUT_OFF_GAUSSIAN.
 */
fn bounded_gaussian(rng: &mut StdRng) -> f64 {
    loop {
        let z: f64 = rng.sample(StandardNormal);

        if z.abs() <= CUT_OFF_GAUSSIAN {
            return z;
        }
    }
}

impl Nebulization {
    /**
     * args
     *  config:     shearing parameters
     *  max_length: longest molecule that will be processed, bounds the number of rounds
     *  seed:       optional seed
     */
    pub fn new(
        config: NebulizationConfig,
        max_length: usize,
        seed: Option<u64>,
    ) -> Result<Self, SimError> {
        if !(config.lambda > 0.0) || !(config.m > 0.0) {
            return Err(SimError::Config(format!(
                "nebulization lambda and M must be positive, got {} and {}",
                config.lambda, config.m
            )));
        }

        let max_length = max_length.max(1);
        let depth = ((max_length as f64 / config.lambda).ceil() as usize).clamp(1, MAX_ROUNDS);
        let capacity = (1usize << depth).min(max_length);

        Ok(Nebulization {
            config,
            depth,
            capacity,
            current: Vec::with_capacity(capacity),
            next: Vec::with_capacity(capacity),
            breakpoint_rng: rng::stream(seed, Stream::Breakpoint),
            acceptance_rng: rng::stream(seed, Stream::BreakageAcceptance),
            attempts: 0,
            breaks: 0,
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /**
     * Breakpoint offset for a fragment of the given length, in [0, length].
     */
    fn breakpoint(&mut self, length: i64) -> i64 {
        let half = length as f64 / 2.0;
        let z = bounded_gaussian(&mut self.breakpoint_rng);

        (half + z * half / CUT_OFF_GAUSSIAN).round() as i64
    }

    /**
     * Probability that a break at the given distance to the nearest end actually happens.
     */
    pub fn breakage_probability(&self, distance: i64) -> f64 {
        1.0 - (-(distance as f64 / self.config.lambda).powf(self.config.m)).exp()
    }

    /**
     * Shear a molecule of the given length. Returns the piece lengths in 5' -> 3' order, they
     * always add up to the input length.
     */
    pub fn shear(&mut self, length: i64) -> Vec<i64> {
        self.current.clear();
        self.current.push(length);

        for _ in 0..self.depth {
            if !self
                .current
                .iter()
                .any(|l| *l > self.config.threshold && *l > 1)
            {
                break;
            }

            self.next.clear();
            let mut pieces = self.current.len();

            for j in 0..self.current.len() {
                let l = self.current[j];

                if l <= self.config.threshold || l < 2 || pieces >= self.capacity {
                    self.next.push(l);
                    continue;
                }

                self.attempts += 1;
                let bp = self.breakpoint(l);

                if bp <= 0 || bp >= l {
                    self.next.push(l);
                    continue;
                }

                let p = self.breakage_probability(bp.min(l - bp));

                if self.acceptance_rng.gen::<f64>() < p {
                    self.breaks += 1;
                    pieces += 1;
                    self.next.push(bp);
                    self.next.push(l - bp);
                } else {
                    self.next.push(l);
                }
            }

            std::mem::swap(&mut self.current, &mut self.next);
        }

        self.current.clone()
    }
}

impl base::FragmentStage for Nebulization {
    fn name(&self) -> String {
        format!(
            "Nebulization (lambda {}, M {}, threshold {}, {} rounds)",
            self.config.lambda, self.config.m, self.config.threshold, self.depth
        )
    }

    fn process(&mut self, fragment: &Fragment, _transcript: &Transcript) -> Vec<Fragment> {
        let length = fragment.length();

        if length <= 0 {
            return vec![];
        }

        let mut start = fragment.start;
        let mut pieces = Vec::new();

        for l in self.shear(length) {
            pieces.push(fragment.span(start, start + l - 1));
            start += l;
        }

        pieces
    }

    fn status(&self) -> String {
        format!(
            "{} breaks accepted out of {} attempts",
            self.breaks, self.attempts
        )
    }
}
