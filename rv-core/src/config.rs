//! Unified YAML configuration for the self-play stack.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid bind address {0:?} (expected unix://PATH or tcp://HOST:PORT)")]
    InvalidBind(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Search settings.
    #[serde(default)]
    pub mcts: MctsConfig,
    /// Evaluation gateway (server + client) settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Self-play run settings.
    #[serde(default)]
    pub selfplay: SelfplayConfig,
}

/// MCTS algorithm configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MctsConfig {
    /// PUCT exploration constant.
    #[serde(default = "default_c_puct")]
    pub c_puct: f32,
    /// Simulations per committed move.
    #[serde(default = "default_n_simulation")]
    pub n_simulation: u32,
    /// Sampling temperature for early moves.
    #[serde(default = "default_tau")]
    pub tau: f32,
    /// Fraction of Dirichlet noise mixed into root priors.
    #[serde(default = "default_e_frac")]
    pub e_frac: f32,
    /// Dirichlet concentration; 0 disables noise sampling.
    #[serde(default = "default_d_alpha")]
    pub d_alpha: f32,
    /// Plies played at temperature `tau`; later moves are greedy.
    #[serde(default = "default_e_step")]
    pub e_step: u32,
}

fn default_c_puct() -> f32 {
    1.4
}

fn default_n_simulation() -> u32 {
    128
}

fn default_tau() -> f32 {
    1.0
}

fn default_e_frac() -> f32 {
    0.25
}

fn default_d_alpha() -> f32 {
    1.0
}

fn default_e_step() -> u32 {
    10
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            c_puct: default_c_puct(),
            n_simulation: default_n_simulation(),
            tau: default_tau(),
            e_frac: default_e_frac(),
            d_alpha: default_d_alpha(),
            e_step: default_e_step(),
        }
    }
}

/// Evaluation gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Bind address: "unix:///tmp/rv_eval.sock" or "tcp://127.0.0.1:9000".
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Number of worker connections the server multiplexes.
    #[serde(default = "default_n_thread")]
    pub n_thread: u32,
    /// Batch-gathering timeout per tick, in microseconds.
    #[serde(default = "default_timeout_us")]
    pub timeout_us: u64,
    /// Maximum timeout ticks spent gathering one batch.
    #[serde(default = "default_max_timeout_ticks")]
    pub max_timeout_ticks: u32,
}

fn default_bind() -> String {
    "unix:///tmp/rv_eval.sock".to_string()
}

fn default_n_thread() -> u32 {
    4
}

fn default_timeout_us() -> u64 {
    500
}

fn default_max_timeout_ticks() -> u32 {
    4
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            n_thread: default_n_thread(),
            timeout_us: default_timeout_us(),
            max_timeout_ticks: default_max_timeout_ticks(),
        }
    }
}

/// Self-play run configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelfplayConfig {
    /// Total games across all workers.
    #[serde(default = "default_total_games")]
    pub total_games: u32,
    /// Output directory for record files, events, and the manifest.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    /// Base RNG seed; per-worker seeds are derived from it.
    #[serde(default)]
    pub seed: u64,
}

fn default_total_games() -> u32 {
    100
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for SelfplayConfig {
    fn default() -> Self {
        Self {
            total_games: default_total_games(),
            out_dir: default_out_dir(),
            seed: 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mcts: MctsConfig::default(),
            gateway: GatewayConfig::default(),
            selfplay: SelfplayConfig::default(),
        }
    }
}

/// Parsed bind address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bind {
    Unix(PathBuf),
    Tcp(String),
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }
}

impl GatewayConfig {
    pub fn parse_bind(&self) -> Result<Bind, ConfigError> {
        if let Some(path) = self.bind.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(ConfigError::InvalidBind(self.bind.clone()));
            }
            return Ok(Bind::Unix(PathBuf::from(path)));
        }
        if let Some(addr) = self.bind.strip_prefix("tcp://") {
            if !addr.contains(':') {
                return Err(ConfigError::InvalidBind(self.bind.clone()));
            }
            return Ok(Bind::Tcp(addr.to_string()));
        }
        Err(ConfigError::InvalidBind(self.bind.clone()))
    }
}
