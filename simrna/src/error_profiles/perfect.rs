/**
 * file: perfect.rs
 * desc: The perfect error profile generates perfect reads. No substitutions and high, uniform
 *       phred scores.
 */
use rand::rngs::StdRng;

use super::base;

pub const PERFECT_QUALITY: u8 = 60;

pub struct PerfectErrorProfile {}

impl base::ErrorProfile for PerfectErrorProfile {
    fn name(&self) -> String {
        format!("perfect (Q{})", PERFECT_QUALITY)
    }

    fn simulate_phred_scores(&self, length: usize, _rng: &mut StdRng) -> Vec<u8> {
        std::iter::repeat(PERFECT_QUALITY).take(length).collect()
    }

    fn simulate_point_mutations(
        &self,
        sequence: &[u8],
        _quality: &[u8],
        _rng: &mut StdRng,
    ) -> Vec<u8> {
        // Perfect reads, nothing gets mutated
        sequence.to_vec()
    }
}
