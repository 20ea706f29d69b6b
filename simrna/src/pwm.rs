/**
 * file: pwm.rs
 * desc: Position weight matrices and the per-transcript weight arrays derived from them.
 */
use std::fs;
use std::path::Path;

use shared::util;
use shared::SimError;

/**
 * STRUCTS
 */

/**
 * A position weight matrix. Each row holds the A, C, G, T probabilities of one motif
 * position.
 *
 * fields
 *  name:      where the matrix came from, used in stage descriptions
 *  rows:      per position base probabilities, each row sums to one
 *  center:    motif offset of the site being scored
 *  max_score: highest score any sequence can reach
 */
#[derive(Debug, Clone)]
pub struct Pwm {
    pub name: String,
    pub rows: Vec<[f64; 4]>,
    pub center: usize,
    max_score: f64,
}

/**
 * Sense and antisense site densities for every position of a padded transcript sequence.
 * Both arrays are in density form unless a Cumulative guard is alive.
 */
#[derive(Debug, Clone)]
pub struct WeightArrays {
    pub sense: Vec<f64>,
    pub antisense: Vec<f64>,
}

/**
 * Holds a weight array in cumulative form. The array is converted when the guard is created
 * and converted back to density form when the guard is dropped, so the borrow can't outlive
 * the sampling that needs it.
 */
pub struct Cumulative<'a> {
    values: &'a mut [f64],
}

/**
 * FUNCTIONS
 */

/**
 * Convert a density array into its running sum, in place.
 */
pub fn to_cdf(values: &mut [f64]) {
    for i in 1..values.len() {
        values[i] += values[i - 1];
    }
}

/**
 * Undo to_cdf, in place.
 */
pub fn to_pdf(values: &mut [f64]) {
    for i in (1..values.len()).rev() {
        values[i] -= values[i - 1];
    }
}

fn nucleotide_column(n: u8) -> Option<usize> {
    match n {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

impl Pwm {
    /**
     * Build a matrix from raw rows of counts or frequencies. Rows are normalized to sum to one.
     */
    pub fn from_rows(name: &str, rows: Vec<[f64; 4]>, center: Option<usize>) -> Result<Pwm, SimError> {
        if rows.is_empty() {
            return Err(SimError::Config(format!("motif {} has no positions", name)));
        }

        let mut normalized = Vec::with_capacity(rows.len());

        for (i, row) in rows.iter().enumerate() {
            let total: f64 = row.iter().sum();

            if total <= 0.0 || row.iter().any(|v| *v < 0.0 || !v.is_finite()) {
                return Err(SimError::Config(format!(
                    "motif {} has an invalid row at position {}",
                    name,
                    i + 1
                )));
            }

            normalized.push([
                row[0] / total,
                row[1] / total,
                row[2] / total,
                row[3] / total,
            ]);
        }

        let center = center.unwrap_or(normalized.len() / 2);

        if center >= normalized.len() {
            return Err(SimError::Config(format!(
                "motif {} center {} is outside the motif",
                name, center
            )));
        }

        let max_score = normalized
            .iter()
            .map(|r| r.iter().cloned().fold(0.0, f64::max))
            .product();

        Ok(Pwm {
            name: name.to_string(),
            rows: normalized,
            center,
            max_score,
        })
    }

    /**
     * Parse a motif file. One row per motif position with four whitespace separated columns
     * (A, C, G, T). Comment lines start with '#', a "# center=<k>" comment sets the scored
     * offset. A header row of letters is ignored.
     */
    pub fn parse(name: &str, text: &str) -> Result<Pwm, SimError> {
        let mut rows = Vec::new();
        let mut center = None;

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            if let Some(comment) = line.strip_prefix('#') {
                if let Some(value) = comment.trim().strip_prefix("center=") {
                    center = Some(value.trim().parse::<usize>().map_err(|e| {
                        SimError::parse(name.to_string(), format!("line {}: {}", lineno + 1, e))
                    })?);
                }
                continue;
            }

            // Header row, e.g. "A C G T"
            if line
                .chars()
                .all(|c| c.is_ascii_alphabetic() || c.is_whitespace())
            {
                continue;
            }

            let values = line
                .split_whitespace()
                .map(|v| v.parse::<f64>())
                .collect::<Result<Vec<f64>, _>>()
                .map_err(|e| {
                    SimError::parse(name.to_string(), format!("line {}: {}", lineno + 1, e))
                })?;

            if values.len() != 4 {
                return Err(SimError::parse(
                    name.to_string(),
                    format!("line {}: expected 4 columns, got {}", lineno + 1, values.len()),
                ));
            }

            rows.push([values[0], values[1], values[2], values[3]]);
        }

        Pwm::from_rows(name, rows, center)
    }

    pub fn from_file(path: &Path) -> Result<Pwm, SimError> {
        let text = fs::read_to_string(path).map_err(|e| SimError::io(e, path))?;

        Pwm::parse(&path.display().to_string(), &text)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn max_score(&self) -> f64 {
        self.max_score
    }

    /**
     * Probability of a site at the given sequence position. The motif is laid over the
     * sequence with its center on the position. Ambiguous bases score the row average and
     * positions where the motif hangs off the sequence score 0.
     */
    pub fn score(&self, sequence: &[u8], position: usize) -> f64 {
        if position < self.center || position - self.center + self.rows.len() > sequence.len() {
            return 0.0;
        }

        let first = position - self.center;

        self.rows
            .iter()
            .zip(sequence[first..first + self.rows.len()].iter())
            .map(|(row, n)| match nucleotide_column(*n) {
                Some(c) => row[c],
                None => 0.25,
            })
            .product()
    }

    /**
     * Score both strands of a sequence. The antisense array is indexed in sense coordinates.
     */
    pub fn weights_for(&self, sequence: &[u8]) -> WeightArrays {
        let n = sequence.len();
        let rc = util::reverse_complement(sequence);

        let sense = (0..n).map(|i| self.score(sequence, i)).collect();
        let antisense = (0..n).map(|i| self.score(&rc, n - 1 - i)).collect();

        WeightArrays { sense, antisense }
    }
}

impl std::fmt::Display for Pwm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<PWM ({}) length {}, center {}>",
            self.name,
            self.rows.len(),
            self.center
        )
    }
}

impl<'a> Cumulative<'a> {
    pub fn new(values: &'a mut [f64]) -> Self {
        to_cdf(values);

        Cumulative { values }
    }

    fn below(&self, i: usize) -> f64 {
        if i == 0 {
            0.0
        } else {
            self.values[i - 1]
        }
    }

    /**
     * Total density over [lo, hi].
     */
    pub fn mass(&self, lo: usize, hi: usize) -> f64 {
        self.values[hi] - self.below(lo)
    }

    pub fn density(&self, i: usize) -> f64 {
        self.values[i] - self.below(i)
    }

    /**
     * Inverse CDF sampling restricted to [lo, hi] for a uniform draw u in [0, 1). Returns None
     * if there is no density in the range.
     */
    pub fn sample(&self, lo: usize, hi: usize, u: f64) -> Option<usize> {
        let base = self.below(lo);
        let mass = self.values[hi] - base;

        if mass <= 0.0 {
            return None;
        }

        let target = base + u * mass;
        let offset = self.values[lo..=hi].partition_point(|v| *v <= target);

        Some((lo + offset).min(hi))
    }
}

impl<'a> Drop for Cumulative<'a> {
    fn drop(&mut self) {
        to_pdf(self.values);
    }
}

#[cfg(test)]
mod tests {

    use rand::rngs::StdRng;
    use rand::Rng;
    use rand::SeedableRng;

    use super::*;

    static MOTIF: &str = "# cleavage motif
# center=1
A C G T
10 0 0 0
0 5 5 0
0 0 0 10
";

    #[test]
    fn test_cdf_pdf_round_trip() {
        let mut rng = StdRng::seed_from_u64(11);
        let original: Vec<f64> = (0..500).map(|_| rng.gen::<f64>() * 1e-3).collect();
        let mut values = original.clone();

        to_cdf(&mut values);
        assert!((values[499] - original.iter().sum::<f64>()).abs() < 1e-12);

        to_pdf(&mut values);
        assert!(values
            .iter()
            .zip(original.iter())
            .all(|(a, b)| (a - b).abs() < 1e-12));
    }

    #[test]
    fn test_cumulative_guard_restores_density() {
        let original = vec![0.0, 0.5, 0.0, 0.25, 0.25];
        let mut values = original.clone();

        {
            let cdf = Cumulative::new(&mut values);

            assert!(cdf.mass(0, 4) == 1.0);
            assert!(cdf.density(3) == 0.25);
            assert!(cdf.sample(0, 4, 0.0) == Some(1));
            assert!(cdf.sample(0, 4, 0.6) == Some(3));
            assert!(cdf.sample(2, 3, 0.1) == Some(3));
            assert!(cdf.sample(2, 2, 0.5).is_none());
        }

        assert!(values == original);
    }

    #[test]
    fn test_parse_motif() {
        let pwm = Pwm::parse("test", MOTIF).unwrap();

        assert!(pwm.len() == 3);
        assert!(pwm.center == 1);
        assert!(pwm.max_score() == 0.5);
        assert!(pwm.rows[1] == [0.0, 0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_bad_motifs() {
        assert!(Pwm::parse("empty", "# nothing\n").is_err());
        assert!(Pwm::parse("columns", "1 2 3\n").is_err());
        assert!(Pwm::parse("zero", "0 0 0 0\n").is_err());
        assert!(Pwm::parse("center", "# center=4\n1 1 1 1\n").is_err());
    }

    #[test]
    fn test_score_both_strands() {
        let pwm = Pwm::parse("test", MOTIF).unwrap();
        // ACT on the sense strand at 1..4, AGT (revcomp of ACT) at 5..8
        let seq = b"GACTTAGTC";
        let weights = pwm.weights_for(seq);

        assert!(pwm.score(seq, 2) == 0.5);
        assert!(weights.sense[2] == 0.5);
        assert!(weights.sense[0] == 0.0);
        assert!(weights.sense[8] == 0.0);
        // ACT on the antisense strand is the reverse complement of AGT at 5..8, centered on 6
        assert!(weights.antisense[6] == 0.5);
        assert!(weights.antisense[4] == 0.0);
    }
}
