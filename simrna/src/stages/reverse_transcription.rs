/**
 * file: reverse_transcription.rs
 * desc: First strand synthesis. Every fragment gets a number of priming events, each event
 *       extends toward the 5' end for a random length, and competing events displace each
 *       other before the surviving copies are emitted.
 */
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;

use shared::util;
use shared::SimError;

use super::base::FragmentStage;
use crate::fragment::Fragment;
use crate::genome::Transcript;
use crate::pwm::{Cumulative, Pwm, WeightArrays};
use crate::rng::{self, Stream};

// One priming event per this many nt of fragment
pub const PRIMING_SPACING: f64 = 100.0;
pub const FIVE_PRIME_TRIALS: usize = 3;
pub const FIVE_PRIME_WINDOW: i64 = 10;
// Steepness of the GC acceptance curve around the low GC threshold
pub const GC_SLOPE: f64 = 25.0;
const GC_BINS: usize = 20;

/**
 * STRUCTS
 */

/**
 * fields
 *  min_ext:      shortest extension in nt
 *  max_ext:      longest extension in nt
 *  gc_low:       GC fraction around which products start getting rejected, None disables it
 *  lossless:     short fragments still get one priming event
 *  poly_a_aware: anchors in the poly-A tail may slip upstream
 */
#[derive(Debug, Clone)]
pub struct RtConfig {
    pub min_ext: i64,
    pub max_ext: i64,
    pub gc_low: Option<f64>,
    pub lossless: bool,
    pub poly_a_aware: bool,
}

/**
 * How likely an earlier priming event is to be displaced by a later one.
 */
#[derive(Debug, Clone, PartialEq)]
pub enum DisplacementRule {
    // exp(-distance between 5' ends / mean extension)
    Distance { mean_ext: f64 },
    // w_later / (w_later + w_earlier)
    Motif,
}

/**
 * A single priming event and the copy it would produce.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub five: i64,
    pub three: i64,
    pub weight: f64,
}

/**
 * Accepted and rejected products of the GC filter, binned by GC fraction.
 */
#[derive(Debug, Clone)]
pub struct GcHistogram {
    pub accepted: Vec<u64>,
    pub rejected: Vec<u64>,
}

pub struct ReverseTranscription {
    pub config: RtConfig,
    pub rule: DisplacementRule,
    pwm: Option<Pwm>,
    // Weight arrays of the transcript currently streaming through
    weights: HashMap<String, WeightArrays>,
    priming_rng: StdRng,
    extension_rng: StdRng,
    gc_rng: StdRng,
    displacement_rng: StdRng,
    jitter_rng: StdRng,
    pub histogram: GcHistogram,
    events: u64,
    displaced: u64,
}

/**
 * FUNCTIONS
 */

/**
 * Probability of keeping a product with the given GC fraction. Logistic, 0.5 at the
 * threshold and approaching 1 for GC rich products.
 */
pub fn gc_acceptance(gc: f64, gc_low: f64) -> f64 {
    1.0 / (1.0 + (-GC_SLOPE * (gc - gc_low)).exp())
}

impl GcHistogram {
    pub fn new() -> Self {
        GcHistogram {
            accepted: vec![0; GC_BINS],
            rejected: vec![0; GC_BINS],
        }
    }

    fn bin(gc: f64) -> usize {
        ((gc * GC_BINS as f64) as usize).min(GC_BINS - 1)
    }

    pub fn record(&mut self, gc: f64, accepted: bool) {
        let b = GcHistogram::bin(gc);

        if accepted {
            self.accepted[b] += 1;
        } else {
            self.rejected[b] += 1;
        }
    }

    pub fn total_rejected(&self) -> u64 {
        self.rejected.iter().sum()
    }
}

impl Default for GcHistogram {
    fn default() -> Self {
        GcHistogram::new()
    }
}

impl std::fmt::Display for GcHistogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "gc_bin\taccepted\trejected")?;

        for b in 0..GC_BINS {
            if self.accepted[b] + self.rejected[b] == 0 {
                continue;
            }

            writeln!(
                f,
                "{:.2}\t{}\t{}",
                b as f64 / GC_BINS as f64,
                self.accepted[b],
                self.rejected[b]
            )?;
        }

        Ok(())
    }
}

impl DisplacementRule {
    pub fn probability(&self, earlier: &Candidate, later: &Candidate) -> f64 {
        match self {
            DisplacementRule::Distance { mean_ext } => {
                let distance = (later.five - earlier.five).abs() as f64;

                (-distance / mean_ext).exp()
            }
            DisplacementRule::Motif => {
                let total = later.weight + earlier.weight;

                if total <= 0.0 {
                    0.5
                } else {
                    later.weight / total
                }
            }
        }
    }
}

impl ReverseTranscription {
    /**
     * args
     *  config: extension and filter parameters
     *  pwm:    priming motif, None primes at the fragment end
     *  seed:   optional seed
     */
    pub fn new(config: RtConfig, pwm: Option<Pwm>, seed: Option<u64>) -> Result<Self, SimError> {
        if config.min_ext < 1 || config.max_ext < config.min_ext {
            return Err(SimError::Config(format!(
                "invalid extension range [{}, {}]",
                config.min_ext, config.max_ext
            )));
        }

        if let Some(gc) = config.gc_low {
            if !(0.0..=1.0).contains(&gc) {
                return Err(SimError::Config(format!(
                    "GC threshold must be within [0, 1], got {}",
                    gc
                )));
            }
        }

        let rule = match pwm {
            Some(_) => DisplacementRule::Motif,
            None => DisplacementRule::Distance {
                mean_ext: (config.min_ext + config.max_ext) as f64 / 2.0,
            },
        };

        Ok(ReverseTranscription {
            config,
            rule,
            pwm,
            weights: HashMap::new(),
            priming_rng: rng::stream(seed, Stream::Priming),
            extension_rng: rng::stream(seed, Stream::ExtensionLength),
            gc_rng: rng::stream(seed, Stream::GcAcceptance),
            displacement_rng: rng::stream(seed, Stream::Displacement),
            jitter_rng: rng::stream(seed, Stream::FivePrimeJitter),
            histogram: GcHistogram::new(),
            events: 0,
            displaced: 0,
        })
    }

    pub fn events(&self) -> u64 {
        self.events
    }

    pub fn weights_of(&self, id: &str) -> Option<&WeightArrays> {
        self.weights.get(id)
    }

    /**
     * Number of priming events for a fragment of the given length.
     */
    pub fn event_count(&self, length: i64) -> usize {
        let n = (length as f64 / PRIMING_SPACING).round() as usize;

        if n == 0 && self.config.lossless && length > 0 {
            1
        } else {
            n
        }
    }

    /**
     * Anchor at the fragment end. Inside the poly-A tail the anchor slips upstream one base at
     * a time until the first favorable coin flip.
     */
    fn end_anchor(&mut self, fragment: &Fragment, transcript: &Transcript) -> i64 {
        let mut anchor = fragment.end;

        if !self.config.poly_a_aware {
            return anchor;
        }

        while anchor > fragment.start && transcript.in_poly_a(anchor) {
            if self.priming_rng.gen_bool(0.5) {
                break;
            }
            anchor -= 1;
        }

        anchor
    }

    /**
     * 3' anchors and their motif weights, one per priming event that found a site.
     */
    fn anchors(&mut self, fragment: &Fragment, transcript: &Transcript, n: usize) -> Vec<(i64, f64)> {
        if self.pwm.is_none() {
            return (0..n)
                .map(|_| (self.end_anchor(fragment, transcript), 1.0))
                .collect();
        }

        let pwm = match &self.pwm {
            Some(p) => p,
            None => return vec![],
        };

        let (lo, hi) = match (
            transcript.padded_index(fragment.start),
            transcript.padded_index(fragment.end),
        ) {
            (Some(lo), Some(hi)) => (lo, hi),
            _ => return vec![],
        };

        if !self.weights.contains_key(&transcript.id) {
            self.weights.clear();
        }

        let weights = self
            .weights
            .entry(transcript.id.clone())
            .or_insert_with(|| pwm.weights_for(&transcript.sequence));
        let antisense = Cumulative::new(&mut weights.antisense);
        let mut anchors = Vec::with_capacity(n);

        for _ in 0..n {
            if let Some(site) = antisense.sample(lo, hi, self.priming_rng.gen::<f64>()) {
                anchors.push((
                    site as i64 - transcript.offset as i64,
                    antisense.density(site),
                ));
            }
        }

        anchors
    }

    /**
     * Scan from the 3'-most candidate toward the 5' end. Each earlier candidate is displaced
     * by the nearest surviving later one with the rule's probability, the first candidate
     * that resists ends the scan and everything upstream of it survives. Events sharing an
     * anchor are taken in random order.
     */
    pub fn resolve_displacement(&mut self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates.shuffle(&mut self.displacement_rng);
        candidates.sort_by(|a, b| b.three.cmp(&a.three));

        let mut survivors: Vec<Candidate> = Vec::with_capacity(candidates.len());
        let mut resisted = false;

        for c in candidates {
            let later = match survivors.last() {
                Some(l) if !resisted => l,
                _ => {
                    survivors.push(c);
                    continue;
                }
            };

            let p = self.rule.probability(&c, later);

            if self.displacement_rng.gen::<f64>() < p {
                self.displaced += 1;
            } else {
                resisted = true;
                survivors.push(c);
            }
        }

        survivors
    }

    /**
     * Final 5' end, the most 5' of a few trial positions around the nominal one.
     */
    fn choose_five_prime(&mut self, c: &Candidate, fragment: &Fragment) -> i64 {
        let lo = (c.five - FIVE_PRIME_WINDOW).max(fragment.start);
        let hi = (c.five + FIVE_PRIME_WINDOW).min(c.three);

        (0..FIVE_PRIME_TRIALS)
            .map(|_| self.jitter_rng.gen_range(lo..=hi))
            .min()
            .unwrap_or(c.five)
    }
}

impl FragmentStage for ReverseTranscription {
    fn name(&self) -> String {
        format!(
            "Reverse transcription (extension {}-{}, GC threshold {}, {}, {}{})",
            self.config.min_ext,
            self.config.max_ext,
            self.config
                .gc_low
                .map(|g| g.to_string())
                .unwrap_or_else(|| "off".to_string()),
            match &self.pwm {
                Some(p) => format!("primed by {}", p),
                None => "primed at the 3' end".to_string(),
            },
            if self.config.lossless { "lossless" } else { "lossy" },
            if self.config.poly_a_aware {
                ", poly-A aware"
            } else {
                ""
            }
        )
    }

    fn process(&mut self, fragment: &Fragment, transcript: &Transcript) -> Vec<Fragment> {
        let n = self.event_count(fragment.length());

        if n == 0 {
            return vec![];
        }

        self.events += n as u64;

        let mut candidates = Vec::with_capacity(n);

        for (anchor, weight) in self.anchors(fragment, transcript, n) {
            let ext = self
                .extension_rng
                .gen_range(self.config.min_ext..=self.config.max_ext);
            let five = (anchor - ext + 1).max(fragment.start);

            if let Some(gc_low) = self.config.gc_low {
                let gc = util::gc_content(transcript.window(five, anchor));
                let keep = self.gc_rng.gen::<f64>() < gc_acceptance(gc, gc_low);

                self.histogram.record(gc, keep);

                if !keep {
                    continue;
                }
            }

            candidates.push(Candidate {
                five,
                three: anchor,
                weight,
            });
        }

        let survivors = self.resolve_displacement(candidates);
        let mut products: Vec<Fragment> = survivors
            .iter()
            .map(|c| {
                let five = self.choose_five_prime(c, fragment);
                fragment.span(five, c.three)
            })
            .collect();

        products.sort_by_key(|p| (p.start, p.end));

        products
    }

    fn status(&self) -> String {
        format!(
            "{} priming events, {} rejected on GC content, {} displaced",
            self.events,
            self.histogram.total_rejected(),
            self.displaced
        )
    }
}

#[cfg(test)]
#[path = "../tests/reverse_transcription_tests.rs"]
mod reverse_transcription_tests;
