/**
 * file: alignment.rs
 * desc: Turning SAM alignment fields into training reads, and the hex line encoding used to
 *       spill training reads to disk.
 */
use bincode;
use hex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use shared::util;
use shared::SimError;

/**
 * STRUCTS
 */

/**
 * A single base that was sequenced differently from the reference.
 *
 * fields
 *  position: 0-based position in the read, in sequencing order
 *  genomic:  reference base
 *  read:     base that was called
 */
#[derive(Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Debug)]
pub struct Mismatch {
    pub position: usize,
    pub genomic: u8,
    pub read: u8,
}

/**
 * Where a read aligned and what differed.
 */
#[derive(Clone, Deserialize, Serialize, PartialEq, Debug, Default)]
pub struct Mapping {
    pub mismatches: Vec<Mismatch>,
}

/**
 * Everything the trainer needs from one sequenced read. Reads that weren't used for
 * mismatches (unmapped, low MAPQ, no MD tag) have no mappings.
 *
 * fields
 *  sequence:  called bases, in sequencing order
 *  qualities: Phred quality of each base, in sequencing order
 *  mappings:  alignments of the read
 */
#[derive(Clone, Deserialize, Serialize, PartialEq, Debug)]
pub struct TrainingRead {
    pub sequence: Vec<u8>,
    pub qualities: Vec<u8>,
    pub mappings: Vec<Mapping>,
}

/**
 * FUNCTIONS
 */

fn parse_run(run: &[u8], context: &str, raw: &[u8]) -> Result<u32, SimError> {
    util::bytes_to_string(run).parse::<u32>().map_err(|e| {
        SimError::parse(
            context,
            format!("{} is probably malformed: {}", util::bytes_to_string(raw), e),
        )
    })
}

/**
 * Fully expand the given cigar string. e.g., 2M1I3M2D into MMIMMMDD
 *
 * args
 *  cigar: the original, unexpanded CIGAR string
 *
 * returns
 *  an expanded CIGAR string
 */
pub fn expand_cigar(cigar: &[u8]) -> Result<Vec<u8>, SimError> {
    let mut new_cigar = Vec::new();
    let mut run = Vec::new();

    for c in cigar {
        if c.is_ascii_digit() {
            run.push(*c);
            continue;
        }

        // Every operation needs a run length in front of it
        if run.is_empty() {
            return Err(SimError::parse(
                "CIGAR",
                format!("{} has an operation without a length", util::bytes_to_string(cigar)),
            ));
        }

        let runs = parse_run(&run, "CIGAR", cigar)?;

        new_cigar.extend(std::iter::repeat(*c).take(runs as usize));
        run.clear();
    }

    if !run.is_empty() {
        return Err(SimError::parse(
            "CIGAR",
            format!("{} ends without an operation", util::bytes_to_string(cigar)),
        ));
    }

    Ok(new_cigar)
}

/**
 * Fully expand the given MD tag.
 * e.g., 2C1T^GC into [(M, M), (M, M), (N, C), (M, M), (N, T), (D, G), (D, C)]
 * The expanded tag contains both the error type
 *      M = match, N = mismatch, D = deletion
 * and the reference nucleotide.
 *
 * args
 *  md: the original, raw MD tag
 *
 * returns
 *  an expanded MD tag
 */
pub fn expand_md_tag(md: &[u8]) -> Result<Vec<(u8, u8)>, SimError> {
    let mut new_md: Vec<(u8, u8)> = Vec::new();
    let mut md_iter = md.iter().peekable();

    while let Some(c) = md_iter.next() {
        match c {
            b'0'..=b'9' => {
                let mut matches = vec![*c];

                // It could be more than a single digit
                while let Some(d) = md_iter.peek().filter(|d| d.is_ascii_digit()) {
                    matches.push(**d);
                    md_iter.next();
                }

                for _ in 0..parse_run(&matches, "MD tag", md)? {
                    new_md.push((b'M', b'M'));
                }
            }
            // Deletion, followed by the deleted reference bases
            b'^' => {
                while let Some(d) = md_iter.peek().filter(|d| d.is_ascii_alphabetic()) {
                    new_md.push((b'D', d.to_ascii_uppercase()));
                    md_iter.next();
                }
            }
            x if x.is_ascii_alphabetic() => new_md.push((b'N', x.to_ascii_uppercase())),
            x => {
                return Err(SimError::parse(
                    "MD tag",
                    format!(
                        "unexpected character '{}' in {}",
                        char::from(*x),
                        util::bytes_to_string(md)
                    ),
                ))
            }
        }
    }

    Ok(new_md)
}

/**
 * This uses the CIGAR string, MD tag, and read (query) sequence to reconstruct the
 * reference sequence and its alignment to the query sequence. Soft clipped and inserted read
 * bases are aligned against '-', as are deleted reference bases. Skipped regions (introns)
 * and hard clips don't show up in the alignment.
 *
 * args
 *  cigar:    an expanded CIGAR string
 *  md:       an expanded MD tag
 *  sequence: the read (query) sequence
 *
 * returns
 *  a tuple containing
 *      0: the aligned and reconstructed reference sequence
 *      1: the aligned query sequence
 * both returned sequences are aligned to one another and are equal length
 */
pub fn reconstruct_alignment(
    cigar: &[u8],
    md: &[(u8, u8)],
    sequence: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), SimError> {
    let mut reference = Vec::with_capacity(cigar.len());
    let mut query = Vec::with_capacity(cigar.len());
    let mut md_iter = md.iter();
    let mut seq_iter = sequence.iter();

    let short_read = || SimError::parse("alignment", "CIGAR is longer than the read sequence");
    let short_md = || SimError::parse("alignment", "CIGAR and MD tag disagree");

    for op in cigar {
        match op {
            // Aligned base, the MD tag says whether it matches the reference
            b'M' | b'=' | b'X' => {
                let base = *seq_iter.next().ok_or_else(short_read)?;

                match md_iter.next().ok_or_else(short_md)? {
                    (b'M', _) => reference.push(base),
                    (b'N', r) => reference.push(*r),
                    _ => return Err(short_md()),
                }

                query.push(base);
            }
            // Read bases with no reference counterpart
            b'I' | b'S' => {
                reference.push(b'-');
                query.push(*seq_iter.next().ok_or_else(short_read)?);
            }
            // Deletion from reference
            b'D' => match md_iter.next().ok_or_else(short_md)? {
                (b'D', r) => {
                    reference.push(*r);
                    query.push(b'-');
                }
                _ => return Err(short_md()),
            },
            b'N' | b'H' | b'P' => (),
            x => {
                return Err(SimError::parse(
                    "alignment",
                    format!("unhandled CIGAR operation {}", char::from(*x)),
                ))
            }
        }
    }

    if md_iter.next().is_some() {
        return Err(short_md());
    }

    Ok((reference, query))
}

/**
 * Collect the mismatches of an aligned read. Positions are read positions in the orientation
 * of the SAM record.
 */
pub fn alignment_mismatches(reference: &[u8], query: &[u8]) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();
    let mut position = 0;

    for (r, q) in reference.iter().zip(query.iter()) {
        if *q == b'-' {
            continue;
        }

        if *r != b'-' && !r.eq_ignore_ascii_case(q) {
            mismatches.push(Mismatch {
                position,
                genomic: r.to_ascii_uppercase(),
                read: q.to_ascii_uppercase(),
            });
        }

        position += 1;
    }

    mismatches
}

impl TrainingRead {
    /**
     * Build a training read from SAM fields. SAM stores reverse strand alignments reverse
     * complemented, these are flipped back into sequencing order.
     *
     * args
     *  sequence:  SEQ field
     *  qualities: QUAL field as Phred values, may be empty
     *  reverse:   the alignment is on the reverse strand
     *  alignment: unexpanded CIGAR and MD tag, if the read should contribute mismatches
     */
    pub fn from_sam_fields(
        sequence: &[u8],
        qualities: &[u8],
        reverse: bool,
        alignment: Option<(&[u8], &[u8])>,
    ) -> Result<Self, SimError> {
        let mappings = match alignment {
            None => Vec::new(),
            Some((cigar, md)) => {
                let (reference, query) =
                    reconstruct_alignment(&expand_cigar(cigar)?, &expand_md_tag(md)?, sequence)?;
                let mut mismatches = alignment_mismatches(&reference, &query);

                if reverse {
                    mismatches = mismatches
                        .iter()
                        .rev()
                        .map(|m| Mismatch {
                            position: sequence.len() - 1 - m.position,
                            genomic: util::complement(m.genomic),
                            read: util::complement(m.read),
                        })
                        .collect();
                }

                vec![Mapping { mismatches }]
            }
        };

        if reverse {
            Ok(TrainingRead {
                sequence: util::reverse_complement(sequence),
                qualities: qualities.iter().rev().cloned().collect(),
                mappings,
            })
        } else {
            Ok(TrainingRead {
                sequence: sequence.to_vec(),
                qualities: qualities.to_vec(),
                mappings,
            })
        }
    }
}

pub fn serialize_to_hex_string<T: Serialize>(t: &T) -> Result<String, SimError> {
    let bytes = bincode::serialize(&t).map_err(|e| SimError::Persistence(format!("{}", e)))?;

    Ok(hex::encode(bytes))
}

pub fn deserialize_from_hex_string<T: DeserializeOwned>(s: &str) -> Result<T, SimError> {
    let bytes = hex::decode(s).map_err(|e| SimError::parse("spilled read", format!("{}", e)))?;

    bincode::deserialize(&bytes).map_err(|e| SimError::parse("spilled read", format!("{}", e)))
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_expand_cigar() {
        assert!(expand_cigar(b"5M").unwrap() == b"MMMMM");
        assert!(expand_cigar(b"2M1I").unwrap() == b"MMI");
        assert!(expand_cigar(b"3H1M2D1I2M").unwrap() == b"HHHMDDIMM");
        assert!(expand_cigar(b"12S2M").unwrap().len() == 14);
        assert!(expand_cigar(b"M").is_err());
        assert!(expand_cigar(b"2M3").is_err());
    }

    #[test]
    fn test_expand_md_tag() {
        let truth0 = vec![
            (b'M', b'M'),
            (b'N', b'A'),
            (b'N', b'C'),
            (b'M', b'M'),
            (b'N', b'T'),
            (b'N', b'C'),
        ];
        let truth1 = vec![
            (b'M', b'M'),
            (b'M', b'M'),
            (b'N', b'G'),
            (b'N', b'A'),
            (b'M', b'M'),
            (b'D', b'A'),
            (b'D', b'T'),
            (b'M', b'M'),
        ];

        assert!(expand_md_tag(b"1A0C1T0C0").unwrap() == truth0);
        assert!(expand_md_tag(b"2G0A1^AT1").unwrap() == truth1);
        assert!(expand_md_tag(b"12").unwrap().len() == 12);
        assert!(expand_md_tag(b"3*2").is_err());
    }

    #[test]
    fn test_reconstruct_alignment() {
        let cigar = expand_cigar(b"2M1I7M6D26M").unwrap();
        let md = expand_md_tag(b"3C3T1^GCTCAG26").unwrap();
        let query = b"AGTGATGGGAGGATGTCTCGTCTGTGAGTTACAGCA";

        let query_truth = b"AGTGATGGGA------GGATGTCTCGTCTGTGAGTTACAGCA";
        let ref_truth = b"AG-GCTGGTAGCTCAGGGATGTCTCGTCTGTGAGTTACAGCA";

        let (aligned_ref, aligned_query) = reconstruct_alignment(&cigar, &md, query).unwrap();

        assert!(aligned_ref == ref_truth);
        assert!(aligned_query == query_truth);
    }

    #[test]
    fn test_soft_clips_and_introns() {
        // Soft clipped bases aren't in the MD tag, skipped reference isn't either
        let cigar = expand_cigar(b"2S3M100N2M").unwrap();
        let md = expand_md_tag(b"1A3").unwrap();
        let (reference, query) = reconstruct_alignment(&cigar, &md, b"TTCGTAC").unwrap();

        assert!(reference == b"--CATAC");
        assert!(query == b"TTCGTAC");
        assert!(
            alignment_mismatches(&reference, &query)
                == vec![Mismatch {
                    position: 3,
                    genomic: b'A',
                    read: b'G'
                }]
        );
    }

    #[test]
    fn test_disagreeing_alignment_fields() {
        let cigar = expand_cigar(b"5M").unwrap();

        assert!(reconstruct_alignment(&cigar, &expand_md_tag(b"4").unwrap(), b"ACGTA").is_err());
        assert!(reconstruct_alignment(&cigar, &expand_md_tag(b"6").unwrap(), b"ACGTA").is_err());
        assert!(reconstruct_alignment(&cigar, &expand_md_tag(b"5").unwrap(), b"ACG").is_err());
    }

    #[test]
    fn test_training_read_forward() {
        let query = b"AGTGATGGGAGGATGTCTCGTCTGTGAGTTACAGCA";
        let qualities: Vec<u8> = (0..36).collect();
        let read = TrainingRead::from_sam_fields(
            query,
            &qualities,
            false,
            Some((b"2M1I7M6D26M", b"3C3T1^GCTCAG26")),
        )
        .unwrap();

        assert!(read.sequence == query);
        assert!(read.qualities == qualities);
        assert!(
            read.mappings[0].mismatches
                == vec![
                    Mismatch {
                        position: 4,
                        genomic: b'C',
                        read: b'A'
                    },
                    Mismatch {
                        position: 8,
                        genomic: b'T',
                        read: b'G'
                    },
                ]
        );
    }

    #[test]
    fn test_training_read_reverse_strand() {
        let query = b"AGTGATGGGAGGATGTCTCGTCTGTGAGTTACAGCA";
        let qualities: Vec<u8> = (0..36).collect();
        let read = TrainingRead::from_sam_fields(
            query,
            &qualities,
            true,
            Some((b"2M1I7M6D26M", b"3C3T1^GCTCAG26")),
        )
        .unwrap();

        assert!(read.sequence == util::reverse_complement(query));
        assert!(read.qualities[0] == 35);
        assert!(
            read.mappings[0].mismatches
                == vec![
                    Mismatch {
                        position: 27,
                        genomic: b'A',
                        read: b'C'
                    },
                    Mismatch {
                        position: 31,
                        genomic: b'G',
                        read: b'T'
                    },
                ]
        );
        // The called base at a mismatch is the read base
        assert!(read.sequence[27] == b'C' && read.sequence[31] == b'T');
    }

    #[test]
    fn test_qualities_only() {
        let read = TrainingRead::from_sam_fields(b"ACGT", &[30, 30, 20, 10], false, None).unwrap();

        assert!(read.mappings.is_empty());
    }

    #[test]
    fn test_hex_lines() {
        let read = TrainingRead::from_sam_fields(b"ACGT", &[30, 30, 20, 10], true, None).unwrap();
        let line = serialize_to_hex_string(&read).unwrap();

        assert!(line.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(deserialize_from_hex_string::<TrainingRead>(&line).unwrap() == read);
        assert!(deserialize_from_hex_string::<TrainingRead>("zz").is_err());
        assert!(deserialize_from_hex_string::<TrainingRead>("00").is_err());
    }
}
