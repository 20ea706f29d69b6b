/**
 * file: encoding.rs
 * desc: The trained error model artifact and its serialization.
 */
use bincode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::SimError;
use crate::model::{CrossTalkModel, QualityTransitionModel};

/**
 * STRUCTS
 */

/**
 * Everything simrna needs to replay sequencing errors. This is serialized using bincode into
 * a single file produced by simrnad.
 *
 * fields
 *  technology:  free form sequencing technology tag, e.g. "illumina"
 *  read_length: read length the model was trained on
 *  qualities:   position dependent quality Markov chain
 *  crosstalk:   base substitution table
 */
#[derive(Clone, Deserialize, Serialize, PartialEq, Debug)]
pub struct ErrorModelParams {
    pub technology: String,
    pub read_length: usize,
    pub qualities: QualityTransitionModel,
    pub crosstalk: CrossTalkModel,
}

impl std::fmt::Display for ErrorModelParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = String::new();

        s.push_str("<Error Model Params>\n");
        s.push_str(&format!("technology: {}\n", self.technology));
        s.push_str(&format!("read_length: {}\n", self.read_length));
        s.push_str(&format!("quality_states: {}\n", self.qualities.num_states));
        s.push_str(&format!(
            "reads_observed: {}\n",
            self.qualities.initial.iter().sum::<u64>()
        ));
        s.push_str(&format!("crosstalk_state: {:?}\n", self.crosstalk.state));
        s.push_str(&format!(
            "substitutions_observed: {}\n",
            self.crosstalk.total_observations()
        ));

        write!(f, "{}", s)
    }
}

/**
 * FUNCTIONS
 */

/**
 * Uses bincode to serialize a model and write it to the given output. An existing file is
 * truncated.
 */
pub fn serialize_model_to_path(filepath: &Path, model: &ErrorModelParams) -> Result<(), SimError> {
    // Serialize into a binary format
    let bytes = bincode::serialize(&model).map_err(|e| SimError::Persistence(format!("{}", e)))?;

    // Set up file for writing
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(filepath)
        .map_err(|e| SimError::io(e, filepath))?;

    // Write out the bytes to the file
    file.write_all(&bytes).map_err(|e| SimError::io(e, filepath))
}

/**
 * Deserialize a model into the proper struct.
 */
pub fn deserialize_model_from_path(filepath: &Path) -> Result<ErrorModelParams, SimError> {
    let bytes = fs::read(filepath).map_err(|e| SimError::io(e, filepath))?;

    // Attempt to deserialize
    let model: ErrorModelParams = bincode::deserialize(&bytes).map_err(|e| {
        SimError::Persistence(format!("{} is not a valid model: {}", filepath.display(), e))
    })?;

    Ok(model)
}

/**
 * Write the model and immediately read it back. The reloaded model must be identical to the
 * one that was written, otherwise the artifact can't be trusted and this is fatal.
 */
pub fn save_and_verify_model(filepath: &Path, model: &ErrorModelParams) -> Result<(), SimError> {
    serialize_model_to_path(filepath, model)?;

    let reloaded = deserialize_model_from_path(filepath).map_err(|e| {
        SimError::Persistence(format!(
            "failed to reload model written to {}: {}",
            filepath.display(),
            e
        ))
    })?;

    if reloaded != *model {
        return Err(SimError::Persistence(format!(
            "model reloaded from {} differs from the model that was written",
            filepath.display()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::model::CrossTalkState;

    fn small_model() -> ErrorModelParams {
        let mut qualities = QualityTransitionModel::new(42, 4);
        let mut crosstalk = CrossTalkModel::new(CrossTalkState::Quality, 42);

        qualities.record_read(&[30, 32, 32, 20]);
        crosstalk.record(20, b'A', b'G');

        ErrorModelParams {
            technology: "illumina".to_string(),
            read_length: 4,
            qualities,
            crosstalk,
        }
    }

    #[test]
    fn test_save_and_verify_model() {
        let path = std::env::temp_dir().join(format!("shared-model-{}.bin", std::process::id()));
        let model = small_model();

        save_and_verify_model(&path, &model).unwrap();

        let reloaded = deserialize_model_from_path(&path).unwrap();

        assert!(reloaded == model);
        assert!(reloaded.crosstalk.counts[20][0][2] == 1);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_corrupt_model_is_a_persistence_error() {
        let path = std::env::temp_dir().join(format!("shared-corrupt-{}.bin", std::process::id()));
        fs::write(&path, b"definitely not a model").unwrap();

        match deserialize_model_from_path(&path) {
            Err(SimError::Persistence(_)) => (),
            other => panic!("expected a persistence error, got {:?}", other),
        }

        fs::remove_file(&path).ok();
    }
}
