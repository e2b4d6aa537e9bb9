//! NDJSON run events and the run manifest.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const RUN_MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn now_ms() -> u64 {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    d.as_millis() as u64
}

pub fn hash_config_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// One finished self-play game.
#[derive(Debug, Clone, Serialize)]
pub struct GameEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    pub worker: u32,
    pub game_idx: u32,
    pub moves: u32,
    /// Final result from Black's perspective.
    pub result: f32,
    pub black: u32,
    pub white: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifestV1 {
    pub run_manifest_version: u32,
    pub created_ts_ms: u64,
    pub config_hash: String,
    pub mode: String,
    pub n_thread: u32,
    pub total_games: u32,
    pub games_completed: u32,
    pub records_written: u64,
}

pub fn write_manifest_atomic(
    path: impl AsRef<Path>,
    m: &RunManifestV1,
) -> Result<(), EventError> {
    let path = path.as_ref();
    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(m)?;
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub fn read_manifest(path: impl AsRef<Path>) -> Result<RunManifestV1, EventError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice::<RunManifestV1>(&bytes)?)
}

/// Append-only NDJSON writer: one JSON object per line.
pub struct EventLog {
    out: BufWriter<File>,
}

impl EventLog {
    pub fn open_append(path: impl AsRef<Path>) -> Result<EventLog, EventError> {
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(EventLog {
            out: BufWriter::new(f),
        })
    }

    pub fn write_event<T: Serialize>(&mut self, event: &T) -> Result<(), EventError> {
        let mut buf = serde_json::to_vec(event)?;
        buf.push(b'\n');
        self.out.write_all(&buf)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), EventError> {
        self.out.flush()?;
        Ok(())
    }
}
