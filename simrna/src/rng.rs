/**
 * file: rng.rs
 * desc: Independent random number streams, one per sampling purpose, all derived from a
 *       single optional seed.
 */
use rand::rngs::StdRng;
use rand::SeedableRng;

/**
 * Every independent random decision made during a run. Unrelated decisions never share a
 * stream so that enabling one feature doesn't shift the draws of another.
 */
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stream {
    Library,
    Breakpoint,
    BreakageAcceptance,
    Strand,
    GcAcceptance,
    Priming,
    ExtensionLength,
    Displacement,
    FivePrimeJitter,
    SizeSelection,
    Sequencing,
}

impl Stream {
    fn salt(&self) -> u64 {
        match self {
            Stream::Library => 0x9E37_79B9_7F4A_7C15,
            Stream::Breakpoint => 0xBF58_476D_1CE4_E5B9,
            Stream::BreakageAcceptance => 0x94D0_49BB_1331_11EB,
            Stream::Strand => 0xD6E8_FEB8_6659_FD93,
            Stream::GcAcceptance => 0xA076_1D64_78BD_642F,
            Stream::Priming => 0xE703_7ED1_A0B4_28DB,
            Stream::ExtensionLength => 0x8EBC_6AF0_9C88_C6E3,
            Stream::Displacement => 0x5899_65CC_7537_4CC3,
            Stream::FivePrimeJitter => 0x1D8E_4E27_C47D_124F,
            Stream::SizeSelection => 0x2545_F491_4F6C_DD1D,
            Stream::Sequencing => 0x6A09_E667_F3BC_C908,
        }
    }
}

/**
 * Create the generator for a single purpose. With a seed the stream is reproducible, without
 * one it is seeded from entropy.
 */
pub fn stream(seed: Option<u64>, purpose: Stream) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s ^ purpose.salt()),
        None => StdRng::from_entropy(),
    }
}
