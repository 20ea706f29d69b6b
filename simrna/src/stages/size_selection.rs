/**
 * file: size_selection.rs
 * desc: Size selection keeps or drops whole fragments according to a target length
 *       distribution, either a mixture of normals or the empirical distribution of a file of
 *       observed lengths.
 */
use rand::rngs::StdRng;
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use shared::SimError;

use super::base::FragmentStage;
use crate::fragment::Fragment;
use crate::genome::Transcript;
use crate::rng::{self, Stream};

// Mixture components are tabulated out to this many standard deviations
const TABLE_SDS: f64 = 6.0;
// Metropolis-Hastings falls back to plain rejection until this many fragments survived
pub const MH_WARMUP: u64 = 100;

/**
 * STRUCTS
 */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    // Keep with the target density relative to its peak
    Rejection,
    // Keep with the two-sided tail mass of the target CDF
    Acceptance,
    // Rejection, corrected by how over or under represented a length already is
    MetropolisHastings,
}

/**
 * Where the target distribution comes from.
 */
#[derive(Debug, Clone, PartialEq)]
pub enum TargetSource {
    Mixture(String),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub weight: f64,
    pub mean: f64,
    pub sd: f64,
}

/**
 * Target length distribution tabulated over integer lengths.
 *
 * fields
 *  source: description of where the distribution came from
 *  pdf:    probability of each length, index is the length
 *  cdf:    running sum of pdf
 *  peak:   largest pdf value
 */
#[derive(Debug, Clone)]
pub struct TargetDistribution {
    pub source: String,
    pdf: Vec<f64>,
    cdf: Vec<f64>,
    peak: f64,
}

pub struct SizeSelection {
    pub mode: SelectionMode,
    pub target: TargetDistribution,
    rng: StdRng,
    // Length histogram of the fragments kept so far
    observed: Vec<u64>,
    observed_total: u64,
    accepted: u64,
    rejected: u64,
}

/**
 * FUNCTIONS
 */

fn parse_number(expression: &str, value: &str) -> Result<f64, SimError> {
    value.trim().parse::<f64>().map_err(|e| {
        SimError::parse(
            expression.to_string(),
            format!("invalid number '{}': {}", value.trim(), e),
        )
    })
}

/**
 * Parse a mixture expression such as "0.7*N(250,25)+0.3*N(400,40)". Weights are optional and
 * default to 1.
 */
pub fn parse_mixture(expression: &str) -> Result<Vec<Component>, SimError> {
    let mut components = Vec::new();

    for term in expression.split('+') {
        let term = term.trim();
        let (weight, normal) = match term.split_once('*') {
            Some((w, n)) => (parse_number(expression, w)?, n.trim()),
            None => (1.0, term),
        };

        let inner = normal
            .strip_prefix("N(")
            .and_then(|n| n.strip_suffix(')'))
            .ok_or_else(|| {
                SimError::parse(
                    expression.to_string(),
                    format!("expected N(mean,sd), got '{}'", normal),
                )
            })?;

        let (mean, sd) = inner.split_once(',').ok_or_else(|| {
            SimError::parse(
                expression.to_string(),
                format!("expected N(mean,sd), got '{}'", normal),
            )
        })?;

        let component = Component {
            weight,
            mean: parse_number(expression, mean)?,
            sd: parse_number(expression, sd)?,
        };

        if !(component.weight > 0.0) || !(component.sd > 0.0) {
            return Err(SimError::Config(format!(
                "mixture component '{}' needs a positive weight and standard deviation",
                term
            )));
        }

        components.push(component);
    }

    Ok(components)
}

/**
 * Load a target distribution on the current thread.
 */
pub fn load_target(source: &TargetSource) -> Result<TargetDistribution, SimError> {
    match source {
        TargetSource::Mixture(expression) => TargetDistribution::from_mixture(expression),
        TargetSource::File(path) => TargetDistribution::from_file(path),
    }
}

impl TargetDistribution {
    fn from_weights(source: &str, weights: Vec<f64>) -> Result<Self, SimError> {
        let total: f64 = weights.iter().sum();

        if !(total > 0.0) {
            return Err(SimError::Config(format!(
                "target distribution {} has no mass at positive lengths",
                source
            )));
        }

        let pdf: Vec<f64> = weights.iter().map(|w| w / total).collect();
        let mut cdf = pdf.clone();
        crate::pwm::to_cdf(&mut cdf);
        let peak = pdf.iter().cloned().fold(0.0, f64::max);

        Ok(TargetDistribution {
            source: source.to_string(),
            pdf,
            cdf,
            peak,
        })
    }

    pub fn from_mixture(expression: &str) -> Result<Self, SimError> {
        let components = parse_mixture(expression)?;
        let max_length = components
            .iter()
            .map(|c| c.mean + TABLE_SDS * c.sd)
            .fold(0.0, f64::max)
            .ceil()
            .max(0.0) as usize;

        // Length 0 never gets any mass
        let weights = (0..=max_length)
            .map(|l| {
                if l == 0 {
                    return 0.0;
                }

                components
                    .iter()
                    .map(|c| {
                        let z = (l as f64 - c.mean) / c.sd;
                        c.weight * (-0.5 * z * z).exp() / c.sd
                    })
                    .sum()
            })
            .collect();

        TargetDistribution::from_weights(expression, weights)
    }

    pub fn from_lengths(source: &str, lengths: &[usize]) -> Result<Self, SimError> {
        let max_length = lengths.iter().cloned().max().unwrap_or(0);
        let mut weights = vec![0.0; max_length + 1];

        for l in lengths.iter().filter(|l| **l > 0) {
            weights[*l] += 1.0;
        }

        TargetDistribution::from_weights(source, weights)
    }

    /**
     * Read one observed length per line. Lines that aren't a length are skipped.
     */
    pub fn from_file(path: &Path) -> Result<Self, SimError> {
        let text = fs::read_to_string(path).map_err(|e| SimError::io(e, path))?;
        let mut lengths = Vec::new();

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line.parse::<f64>() {
                Ok(l) if l >= 0.0 => lengths.push(l.round() as usize),
                _ => warn!(
                    "Skipping line {} of {}: '{}' is not a length",
                    lineno + 1,
                    path.display(),
                    line
                ),
            }
        }

        TargetDistribution::from_lengths(&path.display().to_string(), &lengths)
    }

    pub fn max_length(&self) -> usize {
        self.pdf.len() - 1
    }

    pub fn density(&self, length: i64) -> f64 {
        if length < 0 {
            return 0.0;
        }

        self.pdf.get(length as usize).copied().unwrap_or(0.0)
    }

    /**
     * Density relative to the mode, 1 at the most likely length.
     */
    pub fn relative_density(&self, length: i64) -> f64 {
        (self.density(length) / self.peak).min(1.0)
    }

    pub fn cdf(&self, length: i64) -> f64 {
        if length < 0 {
            return 0.0;
        }

        match self.cdf.get(length as usize) {
            Some(c) => *c,
            None => 1.0,
        }
    }

    /**
     * Two-sided tail mass, 1 at the median and falling off toward both tails.
     */
    pub fn tail_mass(&self, length: i64) -> f64 {
        let f = self.cdf(length);

        (2.0 * f.min(1.0 - f)).clamp(0.0, 1.0)
    }
}

impl std::fmt::Display for TargetDistribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<TargetDistribution ({}) lengths up to {}>",
            self.source,
            self.max_length()
        )
    }
}

impl SizeSelection {
    pub fn new(mode: SelectionMode, target: TargetDistribution, seed: Option<u64>) -> Self {
        let bins = target.pdf.len();

        SizeSelection {
            mode,
            target,
            rng: rng::stream(seed, Stream::SizeSelection),
            observed: vec![0; bins],
            observed_total: 0,
            accepted: 0,
            rejected: 0,
        }
    }

    /**
     * Probability of keeping a fragment of the given length, given what was kept so far.
     */
    pub fn acceptance_probability(&self, length: i64) -> f64 {
        match self.mode {
            SelectionMode::Rejection => self.target.relative_density(length),
            SelectionMode::Acceptance => self.target.tail_mass(length),
            SelectionMode::MetropolisHastings => {
                let relative = self.target.relative_density(length);

                if self.observed_total < MH_WARMUP || relative <= 0.0 {
                    return relative;
                }

                // Laplace smoothed share of the survivors at this length
                let observed = (self.observed[length as usize] + 1) as f64
                    / (self.observed_total + self.observed.len() as u64) as f64;

                (relative * self.target.density(length) / observed).min(1.0)
            }
        }
    }
}

impl FragmentStage for SizeSelection {
    fn name(&self) -> String {
        format!("Size selection ({:?}, {})", self.mode, self.target)
    }

    fn process(&mut self, fragment: &Fragment, _transcript: &Transcript) -> Vec<Fragment> {
        let length = fragment.length();
        let p = self.acceptance_probability(length);

        if p > 0.0 && self.rng.gen::<f64>() < p {
            self.accepted += 1;

            if let Some(o) = self.observed.get_mut(length as usize) {
                *o += 1;
                self.observed_total += 1;
            }

            vec![fragment.clone()]
        } else {
            self.rejected += 1;
            vec![]
        }
    }

    fn status(&self) -> String {
        format!("{} fragments kept, {} dropped", self.accepted, self.rejected)
    }
}

#[cfg(test)]
#[path = "../tests/size_selection_tests.rs"]
mod size_selection_tests;
