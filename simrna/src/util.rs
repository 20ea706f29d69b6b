/**
 * file: util.rs
 * desc: Quality score conversions.
 */

/**
 * quality score functions
 */

const PHRED_OFFSET: u8 = 33;
// Highest score that still encodes to a printable character
const MAX_PHRED: u8 = 93;

/**
 * Encode a phred quality score into its ascii equivalent.
 */
pub fn encode_quality_score(s: u8) -> u8 {
    s.min(MAX_PHRED) + PHRED_OFFSET
}

/**
 * Encode an array of phred quality score into their ascii representations.
 */
pub fn encode_quality_scores(scores: &[u8]) -> Vec<u8> {
    scores.iter().map(|q| encode_quality_score(*q)).collect()
}

/**
 * Convert a phred quality score to an error probability.
 *
 * args
 *  score: a phred quality score
 *
 * returns
 *  an error probability (miscalled base)
 */
pub fn convert_phred_to_probability(score: u8) -> f64 {
    10f64.powf(-(score as f64) / 10.0)
}

/**
 * Convert an error probability to a phred quality score.
 *
 * args
 *  prob: an error probability
 *
 * returns
 *  a phred quality score
 */
pub fn convert_probability_to_phred(prob: f64) -> u8 {
    if prob <= 0.0 {
        return MAX_PHRED;
    }

    (-10.0 * prob.log10()).round().clamp(0.0, MAX_PHRED as f64) as u8
}
