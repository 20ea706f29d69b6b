/**
 * file: files.rs
 * desc: Functions related to file reading, writing, and parsing. This includes the expression
 *       profile, the working file every stage streams through, and the per-transcript counts.
 */
use csv;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

use shared::SimError;

use crate::fragment::Fragment;

/**
 * STRUCTS
 */

#[derive(Debug, Deserialize)]
pub struct ProfileRecord {
    #[serde(alias = "transcript", alias = "transcript_id")]
    pub id: String,
    #[serde(alias = "count", alias = "molecule_count")]
    pub molecules: usize,
}

/**
 * A row of the per-transcript summary written at the end of a run.
 */
#[derive(Debug, Serialize, PartialEq)]
pub struct CountRecord {
    pub id: String,
    pub molecules: usize,
    pub fragments: u64,
}

/**
 * Streams fragments out of a working file. Rows that can't be parsed are reported through
 * the iterator as errors so the caller can count and skip them.
 */
pub struct WorkingFileReader {
    path: PathBuf,
    records: csv::DeserializeRecordsIntoIter<File, Fragment>,
}

/**
 * Writes fragments into a temporary file next to the working file. Calling commit() replaces
 * the working file with the temporary one.
 */
pub struct WorkingFileWriter {
    target: PathBuf,
    temp: PathBuf,
    writer: csv::Writer<File>,
}

/**
 * FUNCTIONS
 */

/**
 * Parse the expression profile. The format is TSV with a header, at minimum an id column and
 * a molecule count column. Malformed rows are skipped.
 */
pub fn parse_profile(filepath: &Path) -> Result<HashMap<String, usize>, SimError> {
    if !filepath.exists() {
        return Err(SimError::Config(format!(
            "Profile {} does not exist",
            filepath.display()
        )));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(filepath)
        .map_err(|e| SimError::parse(filepath.display().to_string(), format!("{}", e)))?;
    let mut profile = HashMap::new();

    for (i, rec_result) in reader.deserialize().enumerate() {
        let rec: ProfileRecord = match rec_result {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping profile row {}: {}", i + 1, e);
                continue;
            }
        };

        *profile.entry(rec.id).or_insert(0) += rec.molecules;
    }

    Ok(profile)
}

impl WorkingFileReader {
    pub fn open(path: &Path) -> Result<Self, SimError> {
        let reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| SimError::parse(path.display().to_string(), format!("{}", e)))?;

        Ok(WorkingFileReader {
            path: path.to_path_buf(),
            records: reader.into_deserialize(),
        })
    }
}

impl Iterator for WorkingFileReader {
    type Item = Result<Fragment, SimError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.next().map(|r| {
            r.map_err(|e| SimError::parse(self.path.display().to_string(), format!("{}", e)))
        })
    }
}

impl WorkingFileWriter {
    /**
     * Create a writer whose output will eventually replace the given file. The target doesn't
     * need to exist yet.
     */
    pub fn create(target: &Path) -> Result<Self, SimError> {
        let file_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("working");
        let temp = target.with_file_name(format!("{}.{}.tmp", file_name, Uuid::new_v4()));

        let writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_path(&temp)
            .map_err(|e| SimError::parse(temp.display().to_string(), format!("{}", e)))?;

        Ok(WorkingFileWriter {
            target: target.to_path_buf(),
            temp,
            writer,
        })
    }

    pub fn write(&mut self, fragment: &Fragment) -> Result<(), SimError> {
        self.writer
            .serialize(fragment)
            .map_err(|e| SimError::parse(self.temp.display().to_string(), format!("{}", e)))
    }

    /**
     * Flush everything and swap the temporary file in: delete the original, then rename.
     */
    pub fn commit(mut self) -> Result<PathBuf, SimError> {
        self.writer
            .flush()
            .map_err(|e| SimError::io(e, &self.temp))?;
        drop(self.writer);

        if self.target.exists() {
            fs::remove_file(&self.target).map_err(|e| SimError::io(e, &self.target))?;
        }

        fs::rename(&self.temp, &self.target).map_err(|e| SimError::io(e, &self.temp))?;

        Ok(self.target)
    }
}

/**
 * Write the per-transcript summary to the output file, replacing it if it already exists.
 */
pub fn write_counts(counts: &[CountRecord], output: &Path) -> Result<(), SimError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(output)
        .map_err(|e| SimError::parse(output.display().to_string(), format!("{}", e)))?;

    for rec in counts {
        writer
            .serialize(rec)
            .map_err(|e| SimError::parse(output.display().to_string(), format!("{}", e)))?;
    }

    writer.flush().map_err(|e| SimError::io(e, output))
}

#[cfg(test)]
#[path = "tests/files_tests.rs"]
mod files_tests;
