/**
 * file: model.rs
 * desc: Count tables making up the sequencing error model. The trainer appends observations
 *       to these tables, the simulator only ever samples from them.
 */
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/**
 * CONSTANTS
 */

// Symbols the cross-talk table is defined over. N doubles as the wildcard for anything else.
pub const ALPHABET: [u8; 5] = [b'A', b'C', b'G', b'T', b'N'];
pub const WILDCARD: usize = 4;

/**
 * STRUCTS
 */

/**
 * A position dependent Markov chain over quality values.
 *
 * fields
 *  num_states:  number of quality values, valid qualities are [0, num_states)
 *  read_length: number of positions with their own transition matrix
 *  transitions: [position][from quality][to quality] transition counts, position 0 is unused
 *  marginals:   [position][from quality] row totals of transitions
 *  initial:     quality counts observed at position 0
 */
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct QualityTransitionModel {
    pub num_states: usize,
    pub read_length: usize,
    pub transitions: Vec<Vec<Vec<u64>>>,
    pub marginals: Vec<Vec<u64>>,
    pub initial: Vec<u64>,
}

/**
 * What the cross-talk table is conditioned on.
 */
#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum CrossTalkState {
    Quality,
    Position,
}

/**
 * Base substitution counts conditioned on either a quality value or a read position.
 *
 * fields
 *  state:      whether rows are indexed by quality or position
 *  num_states: number of rows
 *  counts:     [state][from base][to base] substitution counts
 *  marginals:  [state][from base] row totals
 */
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CrossTalkModel {
    pub state: CrossTalkState,
    pub num_states: usize,
    pub counts: Vec<[[u64; 5]; 5]>,
    pub marginals: Vec<[u64; 5]>,
}

/**
 * FUNCTIONS
 */

/**
 * Map a nucleotide onto its alphabet index. Lower case bases are accepted, anything
 * else returns None.
 */
pub fn base_index(base: u8) -> Option<usize> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        b'N' | b'n' => Some(4),
        _ => None,
    }
}

/**
 * Inverse CDF lookup over integer weights. u must be in [0, 1). When every weight is zero
 * the choice is uniform over all indices.
 *
 * args
 *  weights: unnormalized weights
 *  total:   sum of the weights
 *  u:       a uniform draw
 *
 * returns
 *  the selected index
 */
pub fn inverse_cdf(weights: &[u64], total: u64, u: f64) -> usize {
    if weights.is_empty() {
        return 0;
    }

    if total == 0 {
        return ((u * weights.len() as f64) as usize).min(weights.len() - 1);
    }

    let threshold = u * total as f64;
    let mut cumulative = 0.0;
    let mut last_nonzero = 0;

    for (i, w) in weights.iter().enumerate() {
        if *w == 0 {
            continue;
        }

        cumulative += *w as f64;
        last_nonzero = i;

        if cumulative > threshold {
            return i;
        }
    }

    // Only reachable through rounding when u is very close to 1
    last_nonzero
}

/**
 * Normalize integer weights into probabilities, uniform if there are no observations.
 */
pub fn normalize(weights: &[u64]) -> Vec<f64> {
    let total: u64 = weights.iter().sum();

    if total == 0 {
        return vec![1.0 / weights.len() as f64; weights.len()];
    }

    weights.iter().map(|w| *w as f64 / total as f64).collect()
}

impl QualityTransitionModel {
    pub fn new(num_states: usize, read_length: usize) -> Self {
        // Position 0 has no transitions but keeps its (empty) slot, so there are always two
        let positions = read_length.max(2);

        QualityTransitionModel {
            num_states,
            read_length,
            transitions: vec![vec![vec![0; num_states]; num_states]; positions],
            marginals: vec![vec![0; num_states]; positions],
            initial: vec![0; num_states],
        }
    }

    /**
     * Qualities above the state range are lumped into the top state.
     */
    pub fn clamp_state(&self, quality: u8) -> usize {
        (quality as usize).min(self.num_states - 1)
    }

    pub fn record_initial(&mut self, quality: u8) {
        let q = self.clamp_state(quality);

        self.initial[q] += 1;
    }

    pub fn record_transition(&mut self, position: usize, from: u8, to: u8) {
        if position == 0 || position >= self.read_length {
            return;
        }

        let from = self.clamp_state(from);
        let to = self.clamp_state(to);

        self.transitions[position][from][to] += 1;
        self.marginals[position][from] += 1;
    }

    /**
     * Record every quality value of a single read. Anything past the trained read length
     * is ignored.
     */
    pub fn record_read(&mut self, qualities: &[u8]) {
        if qualities.is_empty() {
            return;
        }

        self.record_initial(qualities[0]);

        for pos in 1..qualities.len().min(self.read_length) {
            self.record_transition(pos, qualities[pos - 1], qualities[pos]);
        }
    }

    /**
     * Probability of each quality at position 0. Always sums to one.
     */
    pub fn initial_distribution(&self) -> Vec<f64> {
        normalize(&self.initial)
    }

    /**
     * Probability of each quality at the given position, conditioned on the previous one.
     */
    pub fn transition_distribution(&self, position: usize, previous: u8) -> Vec<f64> {
        let pos = self.trained_position(position);
        let from = self.clamp_state(previous);

        normalize(&self.transitions[pos][from])
    }

    pub fn sample_initial<R: Rng + ?Sized>(&self, rng: &mut R) -> u8 {
        let total = self.initial.iter().sum();

        inverse_cdf(&self.initial, total, rng.gen::<f64>()) as u8
    }

    /**
     * Sample the quality at the given position from the row of the previous quality.
     * Rows without observations are sampled uniformly.
     */
    pub fn sample_next<R: Rng + ?Sized>(&self, position: usize, previous: u8, rng: &mut R) -> u8 {
        let pos = self.trained_position(position);
        let from = self.clamp_state(previous);

        inverse_cdf(
            &self.transitions[pos][from],
            self.marginals[pos][from],
            rng.gen::<f64>(),
        ) as u8
    }

    /**
     * Positions past the trained length reuse the last trained position.
     */
    fn trained_position(&self, position: usize) -> usize {
        position.max(1).min(self.transitions.len() - 1)
    }

    /**
     * Add all counts from another model trained with the same shape.
     */
    pub fn merge(&mut self, other: &QualityTransitionModel) -> Result<(), SimError> {
        if self.num_states != other.num_states || self.read_length != other.read_length {
            return Err(SimError::Config(format!(
                "cannot merge quality models of shape {}x{} and {}x{}",
                self.read_length, self.num_states, other.read_length, other.num_states
            )));
        }

        for (a, b) in self.initial.iter_mut().zip(other.initial.iter()) {
            *a += b;
        }

        for pos in 0..self.transitions.len() {
            for from in 0..self.num_states {
                self.marginals[pos][from] += other.marginals[pos][from];

                for to in 0..self.num_states {
                    self.transitions[pos][from][to] += other.transitions[pos][from][to];
                }
            }
        }

        Ok(())
    }

    /**
     * True if at least one read has been recorded.
     */
    pub fn is_trained(&self) -> bool {
        self.initial.iter().any(|c| *c > 0)
    }
}

impl CrossTalkModel {
    pub fn new(state: CrossTalkState, num_states: usize) -> Self {
        CrossTalkModel {
            state,
            num_states,
            counts: vec![[[0; 5]; 5]; num_states],
            marginals: vec![[0; 5]; num_states],
        }
    }

    pub fn clamp_state(&self, state: usize) -> usize {
        state.min(self.num_states - 1)
    }

    /**
     * Record a single genomic -> read base observation. Unknown symbols are counted
     * against the wildcard.
     */
    pub fn record(&mut self, state: usize, genomic: u8, read: u8) {
        let s = self.clamp_state(state);
        let from = base_index(genomic).unwrap_or(WILDCARD);
        let to = base_index(read).unwrap_or(WILDCARD);

        self.counts[s][from][to] += 1;
        self.marginals[s][from] += 1;
    }

    /**
     * Substitution probabilities for a base under the given state, uniform if unobserved.
     */
    pub fn distribution(&self, state: usize, base: u8) -> Vec<f64> {
        let s = self.clamp_state(state);
        let from = base_index(base).unwrap_or(WILDCARD);

        normalize(&self.counts[s][from])
    }

    /**
     * Pick the base that replaces the given one for a uniform draw u in [0, 1).
     */
    pub fn substitute_with(&self, state: usize, base: u8, u: f64) -> u8 {
        let s = self.clamp_state(state);
        let from = base_index(base).unwrap_or(WILDCARD);

        ALPHABET[inverse_cdf(&self.counts[s][from], self.marginals[s][from], u)]
    }

    pub fn substitute<R: Rng + ?Sized>(&self, state: usize, base: u8, rng: &mut R) -> u8 {
        self.substitute_with(state, base, rng.gen::<f64>())
    }

    pub fn merge(&mut self, other: &CrossTalkModel) -> Result<(), SimError> {
        if self.state != other.state || self.num_states != other.num_states {
            return Err(SimError::Config(format!(
                "cannot merge cross-talk models ({:?}, {}) and ({:?}, {})",
                self.state, self.num_states, other.state, other.num_states
            )));
        }

        for s in 0..self.num_states {
            for from in 0..5 {
                self.marginals[s][from] += other.marginals[s][from];

                for to in 0..5 {
                    self.counts[s][from][to] += other.counts[s][from][to];
                }
            }
        }

        Ok(())
    }

    pub fn total_observations(&self) -> u64 {
        self.marginals.iter().flat_map(|m| m.iter()).sum()
    }
}
