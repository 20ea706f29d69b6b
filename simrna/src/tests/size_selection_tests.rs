/**
 * file: size_selection_tests.rs
 * desc: Target distribution parsing and selection mode tests.
 */
use std::path::PathBuf;

use super::*;

fn data(name: &str) -> PathBuf {
    PathBuf::from("src/tests/data").join(name)
}

fn transcript() -> Transcript {
    Transcript::new("tx", &vec![b'A'; 2000], 0, 0, 1)
}

#[test]
fn test_parse_mixture() {
    let components = parse_mixture("0.7*N(250,25) + N(400, 40)").unwrap();

    assert!(
        components
            == vec![
                Component {
                    weight: 0.7,
                    mean: 250.0,
                    sd: 25.0
                },
                Component {
                    weight: 1.0,
                    mean: 400.0,
                    sd: 40.0
                }
            ]
    );
    assert!(parse_mixture("N(250)").is_err());
    assert!(parse_mixture("0.5*X(1,2)").is_err());
    assert!(parse_mixture("N(250,0)").is_err());
    assert!(parse_mixture("a*N(250,10)").is_err());
}

#[test]
fn test_mixture_table() {
    let target = TargetDistribution::from_mixture("N(300,30)").unwrap();

    assert!(target.max_length() == 480);
    assert!(target.relative_density(300) == 1.0);
    assert!(target.relative_density(240) < target.relative_density(270));
    assert!(target.density(0) == 0.0);
    assert!(target.density(10_000) == 0.0);
    assert!((target.cdf(480) - 1.0).abs() < 1e-9);
    assert!(target.cdf(10_000) == 1.0);
    assert!((target.tail_mass(300) - 1.0).abs() < 0.05);
    assert!(target.tail_mass(200) < 0.01);
}

#[test]
fn test_lengths_file() {
    let target = TargetDistribution::from_file(&data("lengths.txt")).unwrap();

    assert!(target.max_length() == 300);
    assert!(target.relative_density(250) == 1.0);
    assert!((target.density(200) - 2.0 / 6.0).abs() < 1e-12);
    assert!(target.density(225) == 0.0);
    assert!(TargetDistribution::from_file(&data("missing.txt")).is_err());
    assert!(TargetDistribution::from_lengths("empty", &[]).is_err());
}

#[test]
fn test_rejection_never_drops_at_full_density() {
    let target = TargetDistribution::from_lengths("flat", &[100, 150]).unwrap();
    let mut stage = SizeSelection::new(SelectionMode::Rejection, target, Some(1));
    let t = transcript();

    for _ in 0..1000 {
        assert!(stage.process(&Fragment::new("tx", 0, 99), &t).len() == 1);
    }

    assert!(stage.process(&Fragment::new("tx", 0, 119), &t).is_empty());
}

#[test]
fn test_selection_shapes_lengths() {
    let t = transcript();
    let mut rng = rng::stream(Some(9), Stream::Breakpoint);
    let lengths: Vec<i64> = (0..20_000).map(|_| rng.gen_range(50..1000)).collect();

    for mode in [
        SelectionMode::Rejection,
        SelectionMode::Acceptance,
        SelectionMode::MetropolisHastings,
    ] {
        let target = TargetDistribution::from_mixture("N(300,30)").unwrap();
        let mut stage = SizeSelection::new(mode, target, Some(2));
        let kept: Vec<i64> = lengths
            .iter()
            .flat_map(|l| stage.process(&Fragment::new("tx", 0, l - 1), &t))
            .map(|f| f.length())
            .collect();

        let mean = kept.iter().sum::<i64>() as f64 / kept.len() as f64;

        assert!(kept.len() > 100);
        assert!(kept.iter().all(|l| *l > 100 && *l < 500));
        assert!((mean - 300.0).abs() < 15.0);
    }
}

#[test]
fn test_metropolis_hastings_adapts_to_kept_lengths() {
    let t = transcript();
    let target = TargetDistribution::from_mixture("N(300,30)").unwrap();
    let mut stage = SizeSelection::new(SelectionMode::MetropolisHastings, target, Some(4));

    // Before warmup it behaves like rejection sampling
    assert!(stage.acceptance_probability(330) == stage.target.relative_density(330));

    // Only ever offer the mode so it ends up over-represented among the kept fragments
    for _ in 0..2000 {
        stage.process(&Fragment::new("tx", 0, 299), &t);
    }

    assert!(stage.observed_total >= MH_WARMUP);
    assert!(stage.observed_total == stage.observed[300]);

    let over = stage.acceptance_probability(300);
    let under = stage.acceptance_probability(330);

    assert!(over < stage.target.relative_density(300));
    assert!(under > stage.target.relative_density(330));
    assert!(under <= 1.0);
}

#[test]
fn test_load_target() {
    let mixture = load_target(&TargetSource::Mixture("N(100,10)".to_string())).unwrap();
    let file = load_target(&TargetSource::File(data("lengths.txt"))).unwrap();

    assert!(mixture.relative_density(100) == 1.0);
    assert!(file.max_length() == 300);
}
