/**
 * file: error_profile_tests.rs
 * desc: Perfect and trained error profile tests.
 */
use rand::rngs::StdRng;
use rand::SeedableRng;

use shared::encoding::ErrorModelParams;
use shared::model::{CrossTalkModel, CrossTalkState, QualityTransitionModel};

use crate::error_profiles::{ErrorProfile, MarkovErrorProfile, PerfectErrorProfile};

fn params(qualities: &[u8], state: CrossTalkState) -> ErrorModelParams {
    let mut model = QualityTransitionModel::new(61, qualities.len());
    model.record_read(qualities);

    ErrorModelParams {
        technology: "test".to_string(),
        read_length: qualities.len(),
        qualities: model,
        crosstalk: CrossTalkModel::new(state, 61),
    }
}

#[test]
fn test_perfect_profile() {
    let profile = PerfectErrorProfile {};
    let mut rng = StdRng::seed_from_u64(0);
    let scores = profile.simulate_phred_scores(150, &mut rng);

    assert!(scores.len() == 150);
    assert!(scores.iter().all(|q| *q == 60));
    assert!(profile.simulate_point_mutations(b"ACGTN", &scores[..5], &mut rng) == b"ACGTN");
}

#[test]
fn test_markov_scores_follow_trained_chain() {
    let profile = MarkovErrorProfile::new(params(&[38, 38, 38], CrossTalkState::Quality));
    let mut rng = StdRng::seed_from_u64(1);

    // Positions past the trained length reuse the last trained position
    assert!(profile.simulate_phred_scores(8, &mut rng) == vec![38; 8]);
    assert!(profile.simulate_phred_scores(0, &mut rng).is_empty());
}

#[test]
fn test_markov_substitutions_use_cross_talk() {
    let mut p = params(&[0, 0, 0], CrossTalkState::Quality);
    // Q0 always miscalls, A is read as C and anything unknown as G
    p.crosstalk.record(0, b'A', b'C');
    p.crosstalk.record(0, b'N', b'G');

    let profile = MarkovErrorProfile::new(p);
    let mut rng = StdRng::seed_from_u64(2);
    let scores = profile.simulate_phred_scores(4, &mut rng);

    assert!(scores == vec![0; 4]);
    assert!(profile.simulate_point_mutations(b"AAXA", &scores, &mut rng) == b"CCGC");
}

#[test]
fn test_markov_position_state() {
    let mut p = params(&[0, 0], CrossTalkState::Position);
    p.crosstalk.record(0, b'T', b'G');
    p.crosstalk.record(1, b'T', b'A');

    let profile = MarkovErrorProfile::new(p);
    let mut rng = StdRng::seed_from_u64(3);

    assert!(profile.simulate_point_mutations(b"TT", &[0, 0], &mut rng) == b"GA");
}

#[test]
fn test_high_quality_rarely_mutates() {
    let profile = MarkovErrorProfile::new(params(&[60, 60], CrossTalkState::Quality));
    let mut rng = StdRng::seed_from_u64(4);
    let sequence = vec![b'A'; 1000];
    let mutated = profile.simulate_point_mutations(&sequence, &vec![60; 1000], &mut rng);

    assert!(mutated.iter().filter(|b| **b != b'A').count() <= 1);
}
