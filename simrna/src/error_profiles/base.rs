/**
 * file: base.rs
 * desc: Base error profile trait which all sequencing error models implement.
 */
use rand::rngs::StdRng;

pub trait ErrorProfile {
    // Short description used in logs
    fn name(&self) -> String;
    // Simulate a phred score for every position of a read of the given length
    fn simulate_phred_scores(&self, length: usize, rng: &mut StdRng) -> Vec<u8>;
    // Introduce substitutions into the sequence given the simulated quality scores
    fn simulate_point_mutations(&self, sequence: &[u8], quality: &[u8], rng: &mut StdRng)
        -> Vec<u8>;
}

impl<T: ?Sized> ErrorProfile for Box<T>
where
    T: ErrorProfile,
{
    fn name(&self) -> String {
        (**self).name()
    }

    fn simulate_phred_scores(&self, length: usize, rng: &mut StdRng) -> Vec<u8> {
        (**self).simulate_phred_scores(length, rng)
    }

    fn simulate_point_mutations(
        &self,
        sequence: &[u8],
        quality: &[u8],
        rng: &mut StdRng,
    ) -> Vec<u8> {
        (**self).simulate_point_mutations(sequence, quality, rng)
    }
}
