/**
 * file: breakage.rs
 * desc: The breakage stage. One of nebulization, enzymatic cleavage or uniformly placed cuts,
 *       the last one doubling as a pass-through.
 */
use rand::rngs::StdRng;
use rand::seq::index;

use shared::SimError;

use super::base::FragmentStage;
use super::enzymatic::Enzymatic;
use super::nebulization::Nebulization;
use crate::fragment::Fragment;
use crate::genome::Transcript;
use crate::rng::{self, Stream};

pub enum Breakage {
    Nebulization(Nebulization),
    Enzymatic(Enzymatic),
    Uniform(UniformBreakage),
}

/**
 * Cuts placed uniformly at random, cuts_per_kb cuts per 1000 nt of fragment.
 */
pub struct UniformBreakage {
    pub cuts_per_kb: f64,
    rng: StdRng,
    cuts: u64,
}

/**
 * Split a fragment after each of the given coordinates. Cuts must be sorted, unique and lie
 * in [start, end - 1]. The pieces tile the fragment.
 */
pub fn partition(fragment: &Fragment, cuts: &[i64]) -> Vec<Fragment> {
    let mut pieces = Vec::with_capacity(cuts.len() + 1);
    let mut start = fragment.start;

    for cut in cuts {
        pieces.push(fragment.span(start, *cut));
        start = cut + 1;
    }

    pieces.push(fragment.span(start, fragment.end));

    pieces
}

impl UniformBreakage {
    pub fn new(cuts_per_kb: f64, seed: Option<u64>) -> Result<Self, SimError> {
        if !(cuts_per_kb >= 0.0) || !cuts_per_kb.is_finite() {
            return Err(SimError::Config(format!(
                "cuts per kb must be a non-negative number, got {}",
                cuts_per_kb
            )));
        }

        Ok(UniformBreakage {
            cuts_per_kb,
            rng: rng::stream(seed, Stream::Breakpoint),
            cuts: 0,
        })
    }

    pub fn pass_through() -> Self {
        UniformBreakage {
            cuts_per_kb: 0.0,
            rng: rng::stream(Some(0), Stream::Breakpoint),
            cuts: 0,
        }
    }
}

impl FragmentStage for UniformBreakage {
    fn name(&self) -> String {
        if self.cuts_per_kb == 0.0 {
            "No breakage".to_string()
        } else {
            format!("Uniform breakage ({} cuts per kb)", self.cuts_per_kb)
        }
    }

    fn process(&mut self, fragment: &Fragment, _transcript: &Transcript) -> Vec<Fragment> {
        let length = fragment.length();

        if length <= 0 {
            return vec![];
        }

        let wanted = (length as f64 * self.cuts_per_kb / 1000.0).round() as usize;
        let count = wanted.min(length as usize - 1);

        if count == 0 {
            return vec![fragment.clone()];
        }

        // Cut after offset i, i in [0, length - 2]
        let mut cuts: Vec<i64> = index::sample(&mut self.rng, length as usize - 1, count)
            .into_iter()
            .map(|i| fragment.start + i as i64)
            .collect();
        cuts.sort_unstable();
        self.cuts += cuts.len() as u64;

        partition(fragment, &cuts)
    }

    fn status(&self) -> String {
        format!("{} cuts placed", self.cuts)
    }
}

impl FragmentStage for Breakage {
    fn name(&self) -> String {
        match self {
            Breakage::Nebulization(s) => s.name(),
            Breakage::Enzymatic(s) => s.name(),
            Breakage::Uniform(s) => s.name(),
        }
    }

    fn process(&mut self, fragment: &Fragment, transcript: &Transcript) -> Vec<Fragment> {
        match self {
            Breakage::Nebulization(s) => s.process(fragment, transcript),
            Breakage::Enzymatic(s) => s.process(fragment, transcript),
            Breakage::Uniform(s) => s.process(fragment, transcript),
        }
    }

    fn status(&self) -> String {
        match self {
            Breakage::Nebulization(s) => s.status(),
            Breakage::Enzymatic(s) => s.status(),
            Breakage::Uniform(s) => s.status(),
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_partition() {
        let f = Fragment::new("tx", 10, 29);
        let pieces = partition(&f, &[14, 20]);

        assert!(pieces == vec![f.span(10, 14), f.span(15, 20), f.span(21, 29)]);
        assert!(partition(&f, &[]) == vec![f.clone()]);
    }

    #[test]
    fn test_pass_through() {
        let t = Transcript::new("tx", &vec![b'G'; 200], 0, 0, 1);
        let f = Fragment::new("tx", 0, 199);
        let mut stage = Breakage::Uniform(UniformBreakage::pass_through());

        assert!(stage.process(&f, &t) == vec![f.clone()]);
        assert!(stage.name() == "No breakage");
    }

    #[test]
    fn test_uniform_cuts() {
        let t = Transcript::new("tx", &vec![b'G'; 2000], 0, 0, 1);
        let f = Fragment::new("tx", 0, 1999);
        let mut stage = UniformBreakage::new(5.0, Some(9)).unwrap();
        let pieces = stage.process(&f, &t);

        assert!(pieces.len() == 11);
        assert!(pieces.iter().map(|p| p.length()).sum::<i64>() == 2000);
        assert!(pieces.windows(2).all(|w| w[0].end + 1 == w[1].start));
        assert!(UniformBreakage::new(-1.0, None).is_err());
    }
}
