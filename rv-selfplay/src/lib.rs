//! Self-play runtime: worker threads, run events, and the run manifest.

pub mod events;
pub mod worker;

pub use events::{
    hash_config_bytes, now_ms, write_manifest_atomic, EventLog, GameEventV1, RunManifestV1,
    RUN_MANIFEST_VERSION,
};
pub use worker::{run_selfplay, RunMode, SelfplayError, SelfplayReport};
