/**
 * file: lib.rs
 * desc: Code shared between the simulator (simrna) and the error model trainer (simrnad).
 */
pub mod encoding;
pub mod error;
pub mod model;
pub mod util;

pub use error::SimError;
