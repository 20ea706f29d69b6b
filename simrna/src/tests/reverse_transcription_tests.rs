/**
 * file: reverse_transcription_tests.rs
 * desc: Priming, extension, GC filtering and displacement tests.
 */
use std::collections::HashSet;

use super::*;

fn config() -> RtConfig {
    RtConfig {
        min_ext: 50,
        max_ext: 150,
        gc_low: None,
        lossless: false,
        poly_a_aware: false,
    }
}

fn transcript(length: usize) -> Transcript {
    let bases: Vec<u8> = b"ACGT".iter().cycle().take(length).cloned().collect();

    Transcript::new("tx", &bases, 0, 500, 1000)
}

#[test]
fn test_end_to_end_products() {
    let t = transcript(1000);
    let mut stage = ReverseTranscription::new(config(), None, Some(42)).unwrap();
    let mut products = Vec::new();
    let mut per_molecule = HashSet::new();

    for _ in 0..1000 {
        let molecule = Fragment::new("tx", 0, 999);
        let out = stage.process(&molecule, &t);

        assert!(!out.is_empty());
        per_molecule.insert(out.len());
        products.extend(out);
    }

    assert!(stage.events() == 10 * 1000);
    assert!(products.iter().all(|p| p.end == 999 && p.id == "tx"));
    assert!(products
        .iter()
        .all(|p| p.length() >= 50 - FIVE_PRIME_WINDOW && p.length() <= 150 + FIVE_PRIME_WINDOW));

    // Events primed at the same end compete on their extensions, not on the shortest one
    let mean = products.iter().map(|p| p.length()).sum::<i64>() as f64 / products.len() as f64;

    assert!(per_molecule.len() > 2);
    assert!(products.len() > 1000);
    assert!((mean - 100.0).abs() < 15.0);
}

#[test]
fn test_distance_rule_uses_five_prime_ends() {
    let rule = DisplacementRule::Distance { mean_ext: 100.0 };
    let later = Candidate {
        five: 900,
        three: 999,
        weight: 1.0,
    };
    let same = Candidate {
        five: 900,
        three: 999,
        weight: 1.0,
    };
    let longer = Candidate {
        five: 850,
        three: 999,
        weight: 1.0,
    };

    assert!(rule.probability(&same, &later) == 1.0);
    assert!((rule.probability(&longer, &later) - (-0.5f64).exp()).abs() < 1e-12);
}

#[test]
fn test_motif_weights_dropped_when_transcript_changes() {
    let pwm = Pwm::from_rows(
        "ttt",
        vec![[0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 0.0, 1.0]],
        None,
    )
    .unwrap();
    let bases: Vec<u8> = b"CCCCCAAACCCCCCC".iter().cycle().take(600).cloned().collect();
    let first = Transcript::new("tx1", &bases, 0, 0, 1);
    let second = Transcript::new("tx2", &bases, 0, 0, 1);
    let mut stage = ReverseTranscription::new(config(), Some(pwm), Some(9)).unwrap();

    stage.process(&Fragment::new("tx1", 0, 599), &first);
    assert!(stage.weights_of("tx1").is_some());

    stage.process(&Fragment::new("tx2", 0, 599), &second);
    assert!(stage.weights_of("tx1").is_none());
    assert!(stage.weights_of("tx2").is_some());
}

#[test]
fn test_event_count() {
    let mut lossless = config();
    lossless.lossless = true;

    let lossy_stage = ReverseTranscription::new(config(), None, Some(1)).unwrap();
    let lossless_stage = ReverseTranscription::new(lossless, None, Some(1)).unwrap();

    assert!(lossy_stage.event_count(1000) == 10);
    assert!(lossy_stage.event_count(149) == 1);
    assert!(lossy_stage.event_count(30) == 0);
    assert!(lossless_stage.event_count(30) == 1);
}

#[test]
fn test_short_fragments_dropped_unless_lossless() {
    let t = transcript(1000);
    let f = Fragment::new("tx", 100, 129);

    let mut lossy = ReverseTranscription::new(config(), None, Some(2)).unwrap();
    assert!(lossy.process(&f, &t).is_empty());

    let mut c = config();
    c.lossless = true;
    let mut lossless = ReverseTranscription::new(c, None, Some(2)).unwrap();
    let out = lossless.process(&f, &t);

    // The extension is clipped to the fragment start, then jittered inside the fragment
    assert!(out.len() == 1);
    assert!(out[0].end == 129);
    assert!(out[0].start >= 100 && out[0].start <= 100 + FIVE_PRIME_WINDOW);
}

#[test]
fn test_three_prime_event_always_survives() {
    let mut stage = ReverseTranscription::new(config(), None, Some(3)).unwrap();
    let mut rng = rng::stream(Some(4), Stream::Priming);

    for rule in [
        DisplacementRule::Motif,
        DisplacementRule::Distance { mean_ext: 100.0 },
    ] {
        stage.rule = rule;

        for _ in 0..200 {
            let candidates: Vec<Candidate> = (0..8)
                .map(|_| {
                    let three = rng.gen_range(0..1000);
                    Candidate {
                        five: three - 50,
                        three,
                        weight: rng.gen::<f64>(),
                    }
                })
                .collect();
            let most_3p = candidates.iter().map(|c| c.three).max().unwrap();
            let survivors = stage.resolve_displacement(candidates);

            assert!(!survivors.is_empty());
            assert!(survivors[0].three == most_3p);
        }
    }
}

#[test]
fn test_strong_earlier_event_resists() {
    let mut stage = ReverseTranscription::new(config(), None, Some(5)).unwrap();
    stage.rule = DisplacementRule::Motif;

    let later = Candidate {
        five: 800,
        three: 900,
        weight: 0.0,
    };
    let earlier = Candidate {
        five: 100,
        three: 200,
        weight: 1.0,
    };

    for _ in 0..100 {
        let survivors = stage.resolve_displacement(vec![earlier.clone(), later.clone()]);
        assert!(survivors == vec![later.clone(), earlier.clone()]);
    }
}

#[test]
fn test_gc_filter_rejects_gc_poor_products() {
    let t = Transcript::new("tx", &vec![b'A'; 1000], 0, 0, 1);
    let mut c = config();
    c.gc_low = Some(0.5);
    let mut stage = ReverseTranscription::new(c, None, Some(6)).unwrap();
    let mut kept = 0;

    for _ in 0..100 {
        kept += stage.process(&Fragment::new("tx", 0, 999), &t).len();
    }

    assert!(kept < 5);
    assert!(stage.histogram.total_rejected() > 990);
    assert!(stage.histogram.rejected[0] == stage.histogram.total_rejected());
    assert!(gc_acceptance(0.5, 0.5) == 0.5);
    assert!(gc_acceptance(0.9, 0.5) > 0.99);
}

#[test]
fn test_poly_a_aware_anchor_slips_upstream() {
    let t = transcript(100);
    let mut c = config();
    c.poly_a_aware = true;
    let mut stage = ReverseTranscription::new(c, None, Some(7)).unwrap();
    let mut ends = Vec::new();

    for _ in 0..200 {
        ends.extend(
            stage
                .process(&Fragment::new("tx", 0, 299), &t)
                .iter()
                .map(|p| p.end),
        );
    }

    assert!(ends.iter().all(|e| *e >= 99 && *e <= 299));
    assert!(ends.iter().any(|e| *e < 299));
}

#[test]
fn test_motif_priming_anchors_on_sites() {
    // Antisense "TTT" is an AAA stretch on the sense strand
    let pwm = Pwm::from_rows(
        "ttt",
        vec![[0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 0.0, 1.0]],
        None,
    )
    .unwrap();
    let bases: Vec<u8> = b"CCCCCAAACCCCCCC".iter().cycle().take(600).cloned().collect();
    let t = Transcript::new("tx", &bases, 0, 0, 1);
    let mut stage = ReverseTranscription::new(config(), Some(pwm), Some(8)).unwrap();

    assert!(stage.rule == DisplacementRule::Motif);

    for _ in 0..50 {
        for p in stage.process(&Fragment::new("tx", 0, 599), &t) {
            assert!(t.sequence[p.end as usize] == b'A');
        }
    }
}

#[test]
fn test_invalid_extension_range() {
    let mut c = config();
    c.max_ext = 10;

    assert!(ReverseTranscription::new(c, None, None).is_err());
}
