/**
 * file: mod.rs
 * desc: Profile module which implements sequencing error profiles.
 */
mod base;
mod markov;
mod perfect;

pub use self::base::ErrorProfile;
pub use self::markov::MarkovErrorProfile;
pub use self::perfect::{PerfectErrorProfile, PERFECT_QUALITY};

#[cfg(test)]
#[path = "../tests/error_profile_tests.rs"]
mod error_profile_tests;
