//! Append-only record file, one per worker.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::record::{decode_record, encode_record, RecordError, TrainingRecord, RECORD_LEN};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("record error: {0}")]
    Record(#[from] RecordError),
    #[error("file length {len} is not a whole number of records")]
    TruncatedFile { len: u64 },
}

/// Appends finished games to a record file. Creation fails if the file
/// already exists, so reruns never silently clobber data.
pub struct GameWriter {
    out: BufWriter<File>,
    path: PathBuf,
    records_written: u64,
}

impl GameWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<GameWriter, ReplayError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        Ok(GameWriter {
            out: BufWriter::new(file),
            path,
            records_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Append one game's records in move order.
    pub fn append_game(&mut self, records: &[TrainingRecord]) -> Result<(), ReplayError> {
        for rec in records {
            self.out.write_all(&encode_record(rec))?;
        }
        self.records_written += records.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ReplayError> {
        self.out.flush()?;
        Ok(())
    }

    /// Flush and close, returning the record count.
    pub fn finish(mut self) -> Result<u64, ReplayError> {
        self.out.flush()?;
        Ok(self.records_written)
    }
}

/// Read a whole record file back. Rejects files whose length is not a
/// multiple of the record size.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<TrainingRecord>, ReplayError> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    if bytes.len() % RECORD_LEN != 0 {
        return Err(ReplayError::TruncatedFile {
            len: bytes.len() as u64,
        });
    }
    bytes
        .chunks_exact(RECORD_LEN)
        .map(|chunk| decode_record(chunk).map_err(ReplayError::from))
        .collect()
}
