/**
 * file: markov.rs
 * desc: Error profile replaying a trained model. Quality scores follow the position dependent
 *       Markov chain, miscalled bases are replaced according to the cross-talk table.
 */
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use shared::encoding::ErrorModelParams;
use shared::model::{self, CrossTalkState};

use super::base;
use crate::util;

pub struct MarkovErrorProfile {
    pub params: ErrorModelParams,
    // Unknown symbols are only reported the first time they show up
    reported_unknown: AtomicBool,
}

impl MarkovErrorProfile {
    pub fn new(params: ErrorModelParams) -> Self {
        MarkovErrorProfile {
            params,
            reported_unknown: AtomicBool::new(false),
        }
    }
}

impl base::ErrorProfile for MarkovErrorProfile {
    fn name(&self) -> String {
        format!(
            "trained {} model ({} nt, {} quality states)",
            self.params.technology, self.params.read_length, self.params.qualities.num_states
        )
    }

    /**
     * Position 0 draws from the initial distribution, every later position from the
     * transition row of the previously drawn quality.
     */
    fn simulate_phred_scores(&self, length: usize, rng: &mut StdRng) -> Vec<u8> {
        let mut scores = Vec::with_capacity(length);

        if length == 0 {
            return scores;
        }

        let mut previous = self.params.qualities.sample_initial(rng);
        scores.push(previous);

        for i in 1..length {
            previous = self.params.qualities.sample_next(i, previous, rng);
            scores.push(previous);
        }

        scores
    }

    fn simulate_point_mutations(
        &self,
        sequence: &[u8],
        quality: &[u8],
        rng: &mut StdRng,
    ) -> Vec<u8> {
        let crosstalk = &self.params.crosstalk;

        sequence
            .iter()
            .zip(quality.iter())
            .enumerate()
            .map(|(i, (nt, q))| {
                if model::base_index(*nt).is_none()
                    && !self.reported_unknown.swap(true, Ordering::Relaxed)
                {
                    warn!(
                        "Unknown base '{}' in a simulated read, substituting as {}",
                        *nt as char,
                        model::ALPHABET[model::WILDCARD] as char
                    );
                }

                if rng.gen::<f64>() < util::convert_phred_to_probability(*q) {
                    let state = match crosstalk.state {
                        CrossTalkState::Quality => *q as usize,
                        CrossTalkState::Position => i,
                    };

                    crosstalk.substitute(state, *nt, rng)
                } else {
                    *nt
                }
            })
            .collect()
    }
}
