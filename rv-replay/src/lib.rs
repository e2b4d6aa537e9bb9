//! Flat binary training records and the per-worker file writer.

pub mod record;
pub mod writer;

pub use record::{decode_record, encode_record, RecordError, TrainingRecord, RECORD_LEN};
pub use writer::{read_records, GameWriter, ReplayError};

#[cfg(test)]
mod writer_tests;
