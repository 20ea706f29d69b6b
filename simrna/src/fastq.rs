/**
 * file: fastq.rs
 * desc: Write simulated reads to a FASTQ file.
 */
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use shared::SimError;

use crate::simulate::SimulatedRead;
use crate::util;

pub struct FastqWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FastqWriter {
    /**
     * Create the output file, replacing it if it already exists.
     */
    pub fn create(path: &Path) -> Result<Self, SimError> {
        let file = File::create(path).map_err(|e| SimError::io(e, path))?;

        Ok(FastqWriter {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn write_read(&mut self, read: &SimulatedRead) -> Result<(), SimError> {
        let header = format!(
            "@{}:{}:{}-{}\n",
            read.id, read.transcript_id, read.start, read.end
        );

        self.writer
            .write_all(header.as_bytes())
            .and_then(|_| self.writer.write_all(&read.sequence))
            .and_then(|_| self.writer.write_all(b"\n+\n"))
            .and_then(|_| {
                self.writer
                    .write_all(&util::encode_quality_scores(&read.quality))
            })
            .and_then(|_| self.writer.write_all(b"\n"))
            .map_err(|e| SimError::io(e, &self.path))
    }

    pub fn finish(mut self) -> Result<(), SimError> {
        self.writer.flush().map_err(|e| SimError::io(e, &self.path))
    }
}
