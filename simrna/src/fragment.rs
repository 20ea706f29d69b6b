/**
 * file: fragment.rs
 * desc: The molecule/fragment record that flows through every pipeline stage, and the run
 *       statistics collected for each stage pass.
 */
use serde::{Deserialize, Serialize};
use stats::OnlineStats;

/**
 * STRUCTS
 */

/**
 * A contiguous span over a transcript's padded coordinate space. Coordinates are inclusive,
 * start can be negative (upstream transcription start) and end can run into the poly-A tail.
 * Field order matches the working file columns.
 */
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Fragment {
    pub start: i64,
    pub end: i64,
    pub id: String,
}

/**
 * Counters for a single pass of a stage over the working file.
 *
 * fields
 *  stage:       stage name
 *  records_in:  records read from the working file
 *  records_out: records written back
 *  dropped:     records for which the stage emitted nothing
 *  malformed:   unparseable rows or rows referencing unknown transcripts
 *  lengths:     length summary of the emitted records
 */
#[derive(Clone)]
pub struct StageStats {
    pub stage: String,
    pub records_in: u64,
    pub records_out: u64,
    pub dropped: u64,
    pub malformed: u64,
    pub lengths: OnlineStats,
}

impl Fragment {
    pub fn new(id: &str, start: i64, end: i64) -> Self {
        Fragment {
            start,
            end,
            id: id.to_string(),
        }
    }

    pub fn length(&self) -> i64 {
        self.end - self.start + 1
    }

    /**
     * A new fragment of the same molecule spanning [start, end].
     */
    pub fn span(&self, start: i64, end: i64) -> Self {
        Fragment {
            start,
            end,
            id: self.id.clone(),
        }
    }
}

impl std::fmt::Display for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{}\t{}", self.start, self.end, self.id)
    }
}

impl StageStats {
    pub fn new(stage: &str) -> Self {
        StageStats {
            stage: stage.to_string(),
            records_in: 0,
            records_out: 0,
            dropped: 0,
            malformed: 0,
            lengths: OnlineStats::new(),
        }
    }

    /**
     * Account for one input record and everything the stage emitted for it.
     */
    pub fn record(&mut self, emitted: &[Fragment]) {
        self.records_in += 1;

        if emitted.is_empty() {
            self.dropped += 1;
        }

        for f in emitted {
            self.records_out += 1;
            self.lengths.add(f.length() as f64);
        }
    }
}

impl std::fmt::Display for StageStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} in, {} out, {} dropped, {} malformed, length mean {:.1} (sd {:.1})",
            self.stage,
            self.records_in,
            self.records_out,
            self.dropped,
            self.malformed,
            self.lengths.mean(),
            self.lengths.stddev()
        )
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_fragment_length_and_display() {
        let f = Fragment::new("tx1", -5, 94);

        assert!(f.length() == 100);
        assert!(f.to_string() == "-5\t94\ttx1");
        assert!(f.span(10, 19).length() == 10);
        assert!(f.span(10, 19).id == "tx1");
    }

    #[test]
    fn test_stage_stats_counts_drops() {
        let mut stats = StageStats::new("test");
        let f = Fragment::new("tx1", 0, 9);

        stats.record(&[f.clone(), f.clone()]);
        stats.record(&[]);

        assert!(stats.records_in == 2);
        assert!(stats.records_out == 2);
        assert!(stats.dropped == 1);
        assert!(stats.lengths.mean() == 10.0);
    }
}
