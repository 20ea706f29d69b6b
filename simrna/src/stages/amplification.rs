/**
 * file: amplification.rs
 * desc: PCR amplification. Fragments are duplicated according to how well their GC content
 *       fits the polymerase's preference.
 */
use shared::util;
use shared::SimError;

use super::base::FragmentStage;
use crate::fragment::Fragment;
use crate::genome::Transcript;

// 2^rounds has to fit into the multiplicity
const MAX_ROUNDS: u32 = 30;

/**
 * fields
 *  rounds: number of PCR cycles
 *  mean:   preferred GC fraction
 *  sigma:  spread of the GC preference
 */
#[derive(Debug, Clone)]
pub struct AmplificationConfig {
    pub rounds: u32,
    pub mean: f64,
    pub sigma: f64,
}

pub struct Amplification {
    pub config: AmplificationConfig,
    copies: u64,
}

impl Amplification {
    pub fn new(config: AmplificationConfig) -> Result<Self, SimError> {
        if config.rounds > MAX_ROUNDS {
            return Err(SimError::Config(format!(
                "at most {} amplification rounds are supported, got {}",
                MAX_ROUNDS, config.rounds
            )));
        }

        if !(config.sigma > 0.0) {
            return Err(SimError::Config(format!(
                "amplification sigma must be positive, got {}",
                config.sigma
            )));
        }

        Ok(Amplification { config, copies: 0 })
    }

    /**
     * Relative amplification efficiency of a fragment with the given GC fraction, 1 at the
     * preferred GC content.
     */
    pub fn likelihood(&self, gc: f64) -> f64 {
        let d = gc - self.config.mean;

        (-(d * d) / (2.0 * self.config.sigma * self.config.sigma)).exp()
    }

    pub fn multiplicity(&self, gc: f64) -> usize {
        let max_copies = ((1u64 << self.config.rounds) - 1) as f64;

        ((max_copies * self.likelihood(gc)).floor() as usize).max(1)
    }
}

impl FragmentStage for Amplification {
    fn name(&self) -> String {
        format!(
            "Amplification ({} rounds, GC mean {}, sigma {})",
            self.config.rounds, self.config.mean, self.config.sigma
        )
    }

    fn process(&mut self, fragment: &Fragment, transcript: &Transcript) -> Vec<Fragment> {
        let gc = util::gc_content(transcript.window(fragment.start, fragment.end));
        let n = self.multiplicity(gc);

        self.copies += n as u64;

        vec![fragment.clone(); n]
    }

    fn status(&self) -> String {
        format!("{} copies emitted", self.copies)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn config() -> AmplificationConfig {
        AmplificationConfig {
            rounds: 4,
            mean: 0.5,
            sigma: 0.1,
        }
    }

    #[test]
    fn test_multiplicity() {
        let stage = Amplification::new(config()).unwrap();

        assert!(stage.likelihood(0.5) == 1.0);
        assert!(stage.multiplicity(0.5) == 15);
        // exp(-0.5) * 15 = 9.1
        assert!(stage.multiplicity(0.6) == 9);
        assert!(stage.multiplicity(0.0) == 1);
    }

    #[test]
    fn test_copies_are_identical() {
        let bases: Vec<u8> = b"GCAT".iter().cycle().take(400).cloned().collect();
        let t = Transcript::new("tx", &bases, 0, 0, 1);
        let f = Fragment::new("tx", 10, 209);
        let mut stage = Amplification::new(config()).unwrap();
        let copies = stage.process(&f, &t);

        assert!(copies.len() == 15);
        assert!(copies.iter().all(|c| *c == f));
        assert!(stage.status() == "15 copies emitted");
    }

    #[test]
    fn test_zero_rounds_keep_one_copy() {
        let mut c = config();
        c.rounds = 0;
        let stage = Amplification::new(c).unwrap();

        assert!(stage.multiplicity(0.5) == 1);
    }

    #[test]
    fn test_invalid_config() {
        let mut c = config();
        c.sigma = 0.0;
        assert!(Amplification::new(c).is_err());

        let mut c = config();
        c.rounds = 64;
        assert!(Amplification::new(c).is_err());
    }
}
