/**
 * file: genome.rs
 * desc: Model transcripts, their padded sequences and expression levels.
 */
use needletail::parse_fastx_file;
use needletail::Sequence;
use std::collections::HashMap;
use std::path;
use tracing::warn;

use shared::SimError;

/**
 * STRUCTS
 */

/**
 * A single transcript. The sequence is padded with an upstream flank of N and a poly-A tail
 * so that fragment coordinates outside the transcript body still map onto sequence.
 *
 * fields
 *  id:        transcript identifier (first word of the FASTA header)
 *  sequence:  flank + transcript + poly-A tail, upper case
 *  offset:    length of the upstream flank, i.e. the padded index of coordinate 0
 *  length:    length of the transcript body
 *  molecules: number of full length molecules to instantiate
 */
#[derive(Debug, Clone)]
pub struct Transcript {
    pub id: String,
    pub sequence: Vec<u8>,
    pub offset: usize,
    pub length: usize,
    pub molecules: usize,
}

/**
 * Supplies the sequence and molecule count of a transcript by id.
 */
pub trait SequenceProvider {
    fn sequence_of(&self, id: &str) -> Option<&Transcript>;
    fn molecule_count_of(&self, id: &str) -> usize;
}

/**
 * All transcripts available to a run.
 */
#[derive(Debug, Clone)]
pub struct TranscriptLibrary {
    pub filepath: path::PathBuf,
    pub transcripts: Vec<Transcript>,
    index: HashMap<String, usize>,
}

impl Transcript {
    pub fn new(id: &str, bases: &[u8], flank: usize, tail: usize, molecules: usize) -> Self {
        let mut sequence = Vec::with_capacity(flank + bases.len() + tail);

        sequence.extend(std::iter::repeat(b'N').take(flank));
        sequence.extend(bases.iter().map(|b| b.to_ascii_uppercase()));
        sequence.extend(std::iter::repeat(b'A').take(tail));

        Transcript {
            id: id.to_string(),
            sequence,
            offset: flank,
            length: bases.len(),
            molecules,
        }
    }

    /**
     * Index into the padded sequence for a transcript coordinate, None if the coordinate
     * falls outside the padding.
     */
    pub fn padded_index(&self, coord: i64) -> Option<usize> {
        let i = coord + self.offset as i64;

        if i < 0 || i >= self.sequence.len() as i64 {
            None
        } else {
            Some(i as usize)
        }
    }

    /**
     * Padded bases covering [start, end], clipped to the padded extent.
     */
    pub fn window(&self, start: i64, end: i64) -> &[u8] {
        let lo = (start + self.offset as i64).max(0) as usize;
        let hi = (end + self.offset as i64 + 1).min(self.sequence.len() as i64);

        if hi <= lo as i64 {
            return &[];
        }

        &self.sequence[lo..hi as usize]
    }

    /**
     * True if the coordinate lies in the poly-A tail.
     */
    pub fn in_poly_a(&self, coord: i64) -> bool {
        coord >= self.length as i64
    }
}

impl SequenceProvider for TranscriptLibrary {
    fn sequence_of(&self, id: &str) -> Option<&Transcript> {
        self.index.get(id).map(|i| &self.transcripts[*i])
    }

    fn molecule_count_of(&self, id: &str) -> usize {
        self.sequence_of(id).map(|t| t.molecules).unwrap_or(0)
    }
}

impl TranscriptLibrary {
    pub fn from_transcripts(filepath: &str, transcripts: Vec<Transcript>) -> Self {
        let index = transcripts
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();

        TranscriptLibrary {
            filepath: path::PathBuf::from(filepath),
            transcripts,
            index,
        }
    }

    /**
     * Constructs a new library from the given FASTA file and expression profile. Transcripts
     * missing from the profile get zero molecules.
     *
     * args
     *  filepath: transcript FASTA
     *  profile:  transcript id -> number of molecules
     *  flank:    length of the upstream padding
     *  tail:     length of the poly-A padding
     */
    pub fn from_fasta(
        filepath: &str,
        profile: &HashMap<String, usize>,
        flank: usize,
        tail: usize,
    ) -> Result<TranscriptLibrary, SimError> {
        let mut transcripts = Vec::new();
        // Record iterator, any parse errors get returned to the caller
        let mut fasta_reader = parse_fastx_file(filepath)
            .map_err(|e| SimError::parse(filepath.to_string(), format!("{}", e)))?;

        while let Some(record_wrap) = fasta_reader.next() {
            // Fail on any parse errors even if all other records are fine
            let record =
                record_wrap.map_err(|e| SimError::parse(filepath.to_string(), format!("{}", e)))?;
            // Only the first word of the header is used as the transcript ID
            let header = shared::util::bytes_to_string(record.id());
            let id = header.split_whitespace().next().unwrap_or("").to_string();
            // Normalized sequences, removes softmasking, etc.
            let seq = record.normalize(false);

            let molecules = profile.get(&id).copied().unwrap_or(0);

            transcripts.push(Transcript::new(&id, &seq, flank, tail, molecules));
        }

        let library = TranscriptLibrary::from_transcripts(filepath, transcripts);

        for id in profile.keys() {
            if library.sequence_of(id).is_none() {
                warn!("Transcript {} is in the profile but not in {}", id, filepath);
            }
        }

        Ok(library)
    }

    pub fn max_length(&self) -> usize {
        self.transcripts.iter().map(|t| t.length).max().unwrap_or(0)
    }

    pub fn total_molecules(&self) -> usize {
        self.transcripts.iter().map(|t| t.molecules).sum()
    }
}

impl std::fmt::Display for TranscriptLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<TranscriptLibrary ({}) {} transcripts, {} molecules>",
            self.filepath
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("-"),
            self.transcripts.len(),
            self.total_molecules()
        )
    }
}

#[cfg(test)]
#[path = "tests/genome_tests.rs"]
mod genome_tests;
