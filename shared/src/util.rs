/**
 * file: util.rs
 * desc: Misc. utility functions.
 */
use num_traits::Float;

/**
 * Sequence related functions
 */

/**
 * Generate the complement of the given nucleotide.
 * TODO: IUPAC support
 */
pub fn complement(n: u8) -> u8 {
    match n {
        b'A' => b'T',
        b'a' => b't',
        b'T' => b'A',
        b't' => b'a',
        b'C' => b'G',
        b'c' => b'g',
        b'G' => b'C',
        b'g' => b'c',
        x => x,
    }
}

/**
 * Given a sequence of nucleotides, generate the reverse complement.
 */
pub fn reverse_complement(nucs: &[u8]) -> Vec<u8> {
    nucs.iter()
        .rev()
        .map(|n| complement(*n))
        .collect::<Vec<u8>>()
}

/**
 * Fraction of G and C among the called bases (A, C, G, T) of the sequence. Ambiguous bases
 * don't count towards the total. A sequence without called bases has a GC content of 0.
 */
pub fn gc_content(nucs: &[u8]) -> f64 {
    let mut gc = 0;
    let mut called = 0;

    for n in nucs {
        match n {
            b'G' | b'g' | b'C' | b'c' => {
                gc += 1;
                called += 1;
            }
            b'A' | b'a' | b'T' | b't' => called += 1,
            _ => (),
        }
    }

    if called == 0 {
        return 0.0;
    }

    gc as f64 / called as f64
}

/**
 * Convert a byte array into a string.
 *
 * args
 *  bs: byte array
 *
 * returns
 *  a string representation of the given bytes or an empty string if the conversion failed
 */
pub fn bytes_to_string(bs: &[u8]) -> String {
    std::str::from_utf8(bs).unwrap_or("").to_string()
}

/**
 * maths
 */

/**
 * Mean of the given values, zero for an empty slice.
 */
pub fn mean<T>(vs: &[T]) -> T
where
    T: Float,
{
    if vs.is_empty() {
        return T::zero();
    }

    vs.iter().fold(T::zero(), |ac: T, v| ac + *v) / T::from(vs.len()).unwrap_or_else(T::one)
}

pub fn variance<T>(vs: &[T]) -> T
where
    T: Float,
{
    if vs.is_empty() {
        return T::zero();
    }

    let avg = mean(vs);

    vs.iter()
        .fold(T::zero(), |ac: T, v| ac + (*v - avg) * (*v - avg))
        / T::from(vs.len()).unwrap_or_else(T::one)
}

pub fn std_deviation<T>(vs: &[T]) -> T
where
    T: Float,
{
    variance(vs).sqrt()
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_complement_0() {
        let s1 = "aacctg".as_bytes();

        assert!(
            std::str::from_utf8(&s1.into_iter().map(|n| complement(*n)).collect::<Vec<u8>>())
                .unwrap()
                == "ttggac"
        );
    }

    #[test]
    fn test_complement_1() {
        let s1 = "TAGCNNNN".as_bytes();

        assert!(
            std::str::from_utf8(&s1.into_iter().map(|n| complement(*n)).collect::<Vec<u8>>())
                .unwrap()
                == "ATCGNNNN"
        );
    }

    #[test]
    fn test_reverse_complement() {
        assert!(reverse_complement(b"AACGTN") == b"NACGTT".to_vec());
    }

    #[test]
    fn test_gc_content() {
        assert!(gc_content(b"GGCC") == 1.0);
        assert!(gc_content(b"ATGC") == 0.5);
        assert!(gc_content(b"atgcNNNN") == 0.5);
        assert!(gc_content(b"NNNN") == 0.0);
        assert!(gc_content(b"") == 0.0);
    }

    #[test]
    fn test_bytes_to_string() {
        assert!(bytes_to_string(&vec![b'f', b'o', b'o']) == "foo".to_string());
    }

    #[test]
    fn test_mean_1() {
        assert!(mean(&vec![1.0, 2.0, 3.0, 4.0, 5.0]) == 3.0);
        assert!(mean::<f64>(&[]) == 0.0);
    }

    #[test]
    fn test_std_dev_1() {
        assert!((std_deviation(&vec![1.0, 2.0, 3.0, 4.0, 5.0]) * 100.0).round() / 100.0 == 1.41);
    }
}
