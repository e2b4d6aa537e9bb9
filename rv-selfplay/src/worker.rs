//! Worker threads playing full games against an evaluation gateway.

use std::sync::mpsc;
use std::thread;

use thiserror::Error;

use rv_core::{Bind, Config, ConfigError, Side};
use rv_gateway::{BatchServer, GatewayError, ServerConfig, ServerError, ServerReport, UniformOracle};
use rv_mcts::{Evaluate, GameOutcome, LocalGateway, RemoteGateway, SearchConfig, SearchError, SearchTree};
use rv_replay::{GameWriter, ReplayError, TrainingRecord};

use crate::events::{
    hash_config_bytes, now_ms, write_manifest_atomic, EventError, EventLog, GameEventV1,
    RunManifestV1, RUN_MANIFEST_VERSION,
};

#[derive(Debug, Error)]
pub enum SelfplayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("search error: {0}")]
    Search(#[from] SearchError),
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("replay error: {0}")]
    Replay(#[from] ReplayError),
    #[error("server error: {0}")]
    Server(#[from] ServerError),
    #[error("event log error: {0}")]
    Event(#[from] EventError),
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: u32 },
    #[error("evaluation server panicked")]
    ServerPanicked,
}

/// Deployment shape for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Workers talk to a batching server thread over the configured
    /// socket; the oracle sees one batch per round.
    Networked,
    /// Each worker evaluates in-process, batch of one.
    InProcess,
}

impl RunMode {
    fn as_str(self) -> &'static str {
        match self {
            RunMode::Networked => "networked",
            RunMode::InProcess => "in_process",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SelfplayReport {
    pub games: u32,
    pub records: u64,
    pub server: Option<ServerReport>,
}

/// Convert a finished game into training records, assigning the final
/// result to every record from its mover's perspective.
pub fn pack_game(outcome: &GameOutcome) -> Vec<TrainingRecord> {
    outcome
        .records
        .iter()
        .map(|rec| {
            let mut legal_flags = [0u8; rv_core::N_ACTION];
            for (flag, &b) in legal_flags.iter_mut().zip(&rec.legal_flags) {
                *flag = b as u8;
            }
            let result = match rec.side {
                Side::Black => outcome.result,
                Side::White => -outcome.result,
            };
            TrainingRecord {
                black: rec.board.black(),
                white: rec.board.white(),
                side: rec.side.index(),
                action: rec.action.to_byte(),
                q: rec.q,
                result,
                legal_flags,
                posteriors: rec.posteriors,
            }
        })
        .collect()
}

fn search_config(cfg: &Config) -> SearchConfig {
    SearchConfig {
        c_puct: cfg.mcts.c_puct,
        n_simulation: cfg.mcts.n_simulation,
        tau: cfg.mcts.tau,
        e_frac: cfg.mcts.e_frac,
        d_alpha: cfg.mcts.d_alpha,
        e_step: cfg.mcts.e_step,
    }
}

fn worker_seed(base: u64, worker: u32) -> u64 {
    base ^ (worker as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn run_worker<E: Evaluate>(
    worker: u32,
    games: u32,
    search_cfg: SearchConfig,
    seed: u64,
    mut eval: E,
    mut writer: GameWriter,
    events: mpsc::Sender<GameEventV1>,
) -> Result<u64, SelfplayError> {
    let mut tree = SearchTree::new(search_cfg, seed)?;
    for game_idx in 0..games {
        let outcome = tree.play_game(&mut eval)?;
        let records = pack_game(&outcome);
        writer.append_game(&records)?;
        // The log loop may be gone if another worker already failed;
        // keep playing, the error surfaces at join.
        let _ = events.send(GameEventV1 {
            event: "game_done",
            ts_ms: now_ms(),
            worker,
            game_idx,
            moves: outcome.moves,
            result: outcome.result,
            black: outcome.final_board.count(Side::Black),
            white: outcome.final_board.count(Side::White),
        });
    }
    Ok(writer.finish()?)
}

fn spawn_workers<E: Evaluate + Send + 'static>(
    evals: Vec<E>,
    games_per_worker: &[u32],
    search_cfg: SearchConfig,
    base_seed: u64,
    cfg: &Config,
    events: &mpsc::Sender<GameEventV1>,
) -> Result<Vec<thread::JoinHandle<Result<u64, SelfplayError>>>, SelfplayError> {
    let mut handles = Vec::with_capacity(evals.len());
    for (i, eval) in evals.into_iter().enumerate() {
        let worker = i as u32;
        let games = games_per_worker[i];
        let writer = GameWriter::create(cfg.selfplay.out_dir.join(format!("worker_{worker}.bin")))?;
        let events = events.clone();
        let seed = worker_seed(base_seed, worker);
        let handle = thread::Builder::new()
            .name(format!("rv-selfplay-{worker}"))
            .spawn(move || run_worker(worker, games, search_cfg, seed, eval, writer, events))?;
        handles.push(handle);
    }
    Ok(handles)
}

/// Run a full self-play batch: `n_thread` workers splitting
/// `total_games`, record files and an NDJSON event log under
/// `out_dir`, and a manifest written when the run completes.
pub fn run_selfplay(cfg: &Config, mode: RunMode) -> Result<SelfplayReport, SelfplayError> {
    std::fs::create_dir_all(&cfg.selfplay.out_dir)?;
    let config_hash = match serde_yaml::to_string(cfg) {
        Ok(text) => hash_config_bytes(text.as_bytes()),
        Err(_) => String::new(),
    };

    let n_thread = cfg.gateway.n_thread.max(1) as usize;
    let total_games = cfg.selfplay.total_games;
    let mut games_per_worker = vec![total_games / n_thread as u32; n_thread];
    for slot in games_per_worker
        .iter_mut()
        .take((total_games % n_thread as u32) as usize)
    {
        *slot += 1;
    }

    let search_cfg = search_config(cfg);
    let base_seed = cfg.selfplay.seed;
    // Open the log before spawning anything so an unwritable out_dir
    // fails while no threads need joining.
    let mut event_log = EventLog::open_append(cfg.selfplay.out_dir.join("events.ndjson"))?;
    let (events_tx, events_rx) = mpsc::channel::<GameEventV1>();

    let mut server_handle: Option<thread::JoinHandle<Result<ServerReport, ServerError>>> = None;
    let workers = match mode {
        RunMode::InProcess => {
            let evals: Vec<_> = (0..n_thread)
                .map(|_| LocalGateway::new(UniformOracle))
                .collect();
            spawn_workers(evals, &games_per_worker, search_cfg, base_seed, cfg, &events_tx)?
        }
        RunMode::Networked => {
            let server_cfg = ServerConfig {
                n_thread,
                timeout: std::time::Duration::from_micros(cfg.gateway.timeout_us),
                max_timeout_ticks: cfg.gateway.max_timeout_ticks,
            };
            let bind = cfg.gateway.parse_bind()?;
            // Bind first so worker connections queue while the server
            // thread starts accepting.
            let (server, evals) = match bind {
                Bind::Tcp(addr) => {
                    let server = BatchServer::bind_tcp(addr.as_str(), server_cfg)?;
                    let addr = server.local_addr()?;
                    let mut evals = Vec::with_capacity(n_thread);
                    for _ in 0..n_thread {
                        evals.push(RemoteGateway::connect_tcp(addr)?);
                    }
                    (server, evals)
                }
                Bind::Unix(path) => {
                    let server = BatchServer::bind_uds(&path, server_cfg)?;
                    let mut evals = Vec::with_capacity(n_thread);
                    for _ in 0..n_thread {
                        evals.push(RemoteGateway::connect_uds(&path)?);
                    }
                    (server, evals)
                }
            };
            server_handle = Some(thread::spawn(move || {
                let mut oracle = UniformOracle;
                server.serve(&mut oracle)
            }));
            spawn_workers(evals, &games_per_worker, search_cfg, base_seed, cfg, &events_tx)?
        }
    };
    drop(events_tx);

    // Drain game events while workers run; the channel closes when the
    // last worker drops its sender. A log failure must not cut the
    // drain short: the workers still have to be joined before any
    // error propagates, or they could be killed mid-append.
    let mut games_completed = 0u32;
    let mut log_error: Option<SelfplayError> = None;
    while let Ok(ev) = events_rx.recv() {
        games_completed += 1;
        if log_error.is_none() {
            if let Err(e) = event_log.write_event(&ev) {
                log_error = Some(e.into());
            }
        }
    }
    if log_error.is_none() {
        if let Err(e) = event_log.flush() {
            log_error = Some(e.into());
        }
    }

    let mut records_written = 0u64;
    let mut first_error: Option<SelfplayError> = None;
    for (i, handle) in workers.into_iter().enumerate() {
        match handle.join() {
            Ok(Ok(records)) => records_written += records,
            Ok(Err(e)) => first_error = first_error.or(Some(e)),
            Err(_) => {
                first_error = first_error.or(Some(SelfplayError::WorkerPanicked {
                    worker: i as u32,
                }))
            }
        }
    }

    let server_report = match server_handle {
        Some(handle) => match handle.join() {
            Ok(report) => Some(report?),
            Err(_) => return Err(SelfplayError::ServerPanicked),
        },
        None => None,
    };

    if let Some(e) = first_error.or(log_error) {
        return Err(e);
    }

    write_manifest_atomic(
        cfg.selfplay.out_dir.join("run_manifest.json"),
        &RunManifestV1 {
            run_manifest_version: RUN_MANIFEST_VERSION,
            created_ts_ms: now_ms(),
            config_hash,
            mode: mode.as_str().to_string(),
            n_thread: n_thread as u32,
            total_games,
            games_completed,
            records_written,
        },
    )?;

    Ok(SelfplayReport {
        games: games_completed,
        records: records_written,
        server: server_report,
    })
}
