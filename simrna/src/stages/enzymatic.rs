/**
 * file: enzymatic.rs
 * desc: Motif directed cleavage. Candidate cut sites are drawn from the motif weights of
 *       either strand and kept in proportion to how good a site they are.
 */
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::{BTreeSet, HashMap};

use super::base::FragmentStage;
use super::breakage::partition;
use crate::fragment::Fragment;
use crate::genome::Transcript;
use crate::pwm::{Cumulative, Pwm, WeightArrays};
use crate::rng::{self, Stream};

pub struct Enzymatic {
    pub pwm: Pwm,
    // Weight arrays of the transcript currently streaming through, always in density form
    // between calls
    weights: HashMap<String, WeightArrays>,
    strand_rng: StdRng,
    site_rng: StdRng,
    acceptance_rng: StdRng,
    candidates: u64,
    accepted: u64,
}

impl Enzymatic {
    pub fn new(pwm: Pwm, seed: Option<u64>) -> Self {
        Enzymatic {
            pwm,
            weights: HashMap::new(),
            strand_rng: rng::stream(seed, Stream::Strand),
            site_rng: rng::stream(seed, Stream::Breakpoint),
            acceptance_rng: rng::stream(seed, Stream::BreakageAcceptance),
            candidates: 0,
            accepted: 0,
        }
    }

    pub fn weights_of(&self, id: &str) -> Option<&WeightArrays> {
        self.weights.get(id)
    }

    /**
     * Sorted, unique cut coordinates for a fragment. A cut at c separates c from c + 1.
     */
    fn cut_sites(&mut self, fragment: &Fragment, transcript: &Transcript) -> Vec<i64> {
        let (lo, hi) = match (
            transcript.padded_index(fragment.start),
            transcript.padded_index(fragment.end),
        ) {
            (Some(lo), Some(hi)) if hi > lo => (lo, hi),
            _ => return vec![],
        };

        if !self.weights.contains_key(&transcript.id) {
            self.weights.clear();
        }

        let pwm = &self.pwm;
        let weights = self
            .weights
            .entry(transcript.id.clone())
            .or_insert_with(|| pwm.weights_for(&transcript.sequence));
        let max_score = pwm.max_score();

        let n = (fragment.length() as f64).sqrt().round().max(1.0) as usize;
        let mut sites = BTreeSet::new();

        let sense = Cumulative::new(&mut weights.sense);
        let antisense = Cumulative::new(&mut weights.antisense);

        for _ in 0..n {
            self.candidates += 1;

            let strand = if self.strand_rng.gen_bool(0.5) {
                &sense
            } else {
                &antisense
            };

            // The last base can't be cut after
            let site = match strand.sample(lo, hi - 1, self.site_rng.gen::<f64>()) {
                Some(s) => s,
                None => continue,
            };

            let p = (strand.density(site) / max_score).min(1.0);

            if self.acceptance_rng.gen::<f64>() < p && sites.insert(site) {
                self.accepted += 1;
            }
        }

        sites
            .into_iter()
            .map(|s| s as i64 - transcript.offset as i64)
            .collect()
    }
}

impl FragmentStage for Enzymatic {
    fn name(&self) -> String {
        format!("Enzymatic breakage ({})", self.pwm)
    }

    fn process(&mut self, fragment: &Fragment, transcript: &Transcript) -> Vec<Fragment> {
        if fragment.length() <= 0 {
            return vec![];
        }

        let cuts = self.cut_sites(fragment, transcript);

        partition(fragment, &cuts)
    }

    fn status(&self) -> String {
        format!(
            "{} cut sites accepted out of {} candidates",
            self.accepted, self.candidates
        )
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn motif() -> Pwm {
        // Cuts at the middle of "GAT"
        Pwm::from_rows(
            "gat",
            vec![[0.0, 0.0, 1.0, 0.0], [1.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]],
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_partition_covers_molecule_and_restores_weights() {
        let bases: Vec<u8> = b"CCGATCC".iter().cycle().take(700).cloned().collect();
        let t = Transcript::new("tx", &bases, 20, 50, 1);
        let mut stage = Enzymatic::new(motif(), Some(5));

        let f = Fragment::new("tx", -10, 699);
        let pieces = stage.process(&f, &t);

        assert!(pieces.iter().map(|p| p.length()).sum::<i64>() == f.length());
        assert!(pieces[0].start == f.start);
        assert!(pieces[pieces.len() - 1].end == f.end);
        assert!(pieces.windows(2).all(|w| w[0].end + 1 == w[1].start));
        assert!(pieces.len() > 1);

        let expected = motif().weights_for(&t.sequence);
        let cached = stage.weights_of("tx").unwrap();

        assert!(cached
            .sense
            .iter()
            .zip(expected.sense.iter())
            .all(|(a, b)| (a - b).abs() < 1e-9));
        assert!(cached
            .antisense
            .iter()
            .zip(expected.antisense.iter())
            .all(|(a, b)| (a - b).abs() < 1e-9));
    }

    #[test]
    fn test_cuts_only_at_motif_sites() {
        let bases: Vec<u8> = b"CCGATCC".iter().cycle().take(700).cloned().collect();
        let t = Transcript::new("tx", &bases, 0, 0, 1);
        let mut stage = Enzymatic::new(motif(), Some(8));
        let f = Fragment::new("tx", 0, 699);

        for _ in 0..10 {
            for p in stage.process(&f, &t).iter().filter(|p| p.end != 699) {
                // Sense GAT is centered on the A, antisense GAT (ATC) on the T
                let base = t.sequence[p.end as usize];
                assert!(base == b'A' || base == b'T');
            }
        }
    }

    #[test]
    fn test_weights_dropped_when_transcript_changes() {
        let bases: Vec<u8> = b"CCGATCC".iter().cycle().take(700).cloned().collect();
        let first = Transcript::new("tx1", &bases, 0, 0, 1);
        let second = Transcript::new("tx2", &bases, 0, 0, 1);
        let mut stage = Enzymatic::new(motif(), Some(3));

        stage.process(&Fragment::new("tx1", 0, 699), &first);
        stage.process(&Fragment::new("tx1", 0, 399), &first);
        assert!(stage.weights_of("tx1").is_some());

        stage.process(&Fragment::new("tx2", 0, 699), &second);
        assert!(stage.weights_of("tx1").is_none());
        assert!(stage.weights_of("tx2").is_some());
    }

    #[test]
    fn test_no_sites_no_cuts() {
        let t = Transcript::new("tx", &vec![b'C'; 300], 0, 0, 1);
        let mut stage = Enzymatic::new(motif(), Some(1));
        let f = Fragment::new("tx", 0, 299);

        assert!(stage.process(&f, &t) == vec![f.clone()]);
    }
}
