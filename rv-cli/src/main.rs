//! rv: CLI binary for the Reversi self-play data generator.
//!
//! Subcommands:
//! - selfplay
//! - play

mod play;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use rv_core::{Bind, Config, Side};
use rv_gateway::{BatchServer, ServerConfig, UniformOracle};
use rv_mcts::{LocalGateway, RemoteGateway, SearchConfig, SearchTree};
use rv_selfplay::{run_selfplay, RunMode};

fn print_help() {
    eprintln!(
        r#"rv - Reversi self-play data generator

USAGE:
    rv <COMMAND> [OPTIONS]

COMMANDS:
    selfplay            Generate training records by self-play
    play                Play an interactive game against the search

OPTIONS:
    -h, --help          Print this help message
    -V, --version       Print version

Run `rv <COMMAND> --help` for command usage.
"#
    );
}

fn print_version() {
    println!("rv {}", env!("CARGO_PKG_VERSION"));
}

fn cmd_selfplay(args: &[String]) {
    let mut config_path: Option<String> = None;
    let mut games: Option<u32> = None;
    let mut threads: Option<u32> = None;
    let mut out: Option<PathBuf> = None;
    let mut local = false;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!(
                    r#"rv selfplay

USAGE:
    rv selfplay [--config cfg.yaml] [--games N] [--threads N] [--local] [--out DIR]

OPTIONS:
    --config F   Load configuration from a YAML file (default: built-in defaults)
    --games N    Total games to play (overrides config)
    --threads N  Worker connections (overrides config)
    --local      Evaluate in-process instead of through the batching server
    --out DIR    Output directory (overrides config)
"#
                );
                return;
            }
            "--config" => {
                if i + 1 >= args.len() {
                    eprintln!("Missing value for --config");
                    process::exit(1);
                }
                config_path = Some(args[i + 1].clone());
                i += 2;
            }
            "--games" => {
                if i + 1 >= args.len() {
                    eprintln!("Missing value for --games");
                    process::exit(1);
                }
                games = Some(args[i + 1].parse().unwrap_or_else(|_| {
                    eprintln!("Invalid --games value: {}", args[i + 1]);
                    process::exit(1);
                }));
                i += 2;
            }
            "--threads" => {
                if i + 1 >= args.len() {
                    eprintln!("Missing value for --threads");
                    process::exit(1);
                }
                threads = Some(args[i + 1].parse().unwrap_or_else(|_| {
                    eprintln!("Invalid --threads value: {}", args[i + 1]);
                    process::exit(1);
                }));
                i += 2;
            }
            "--out" => {
                if i + 1 >= args.len() {
                    eprintln!("Missing value for --out");
                    process::exit(1);
                }
                out = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--local" => {
                local = true;
                i += 1;
            }
            other => {
                eprintln!("Unknown option for `rv selfplay`: {}", other);
                eprintln!("Run `rv selfplay --help` for usage.");
                process::exit(1);
            }
        }
    }

    let mut cfg = match config_path {
        Some(path) => Config::load(&path).unwrap_or_else(|e| {
            eprintln!("Failed to load config {}: {}", path, e);
            process::exit(1);
        }),
        None => Config::default(),
    };
    if let Some(games) = games {
        cfg.selfplay.total_games = games;
    }
    if let Some(threads) = threads {
        cfg.gateway.n_thread = threads;
    }
    if let Some(out) = out {
        cfg.selfplay.out_dir = out;
    }
    let mode = if local {
        RunMode::InProcess
    } else {
        RunMode::Networked
    };

    println!(
        "Self-play: {} games, {} workers, {} simulations/move, out: {}",
        cfg.selfplay.total_games,
        cfg.gateway.n_thread,
        cfg.mcts.n_simulation,
        cfg.selfplay.out_dir.display()
    );
    if !local {
        println!("Gateway: {}", cfg.gateway.bind);
    }

    match run_selfplay(&cfg, mode) {
        Ok(report) => {
            println!(
                "Done: {} games, {} records written",
                report.games, report.records
            );
            if let Some(server) = report.server {
                println!(
                    "Server: {} rounds, {} requests, occupancy {:.3}, work {:.3} ms",
                    server.rounds, server.requests, server.occupancy_rate, server.work_time_ms
                );
            }
        }
        Err(e) => {
            eprintln!("Self-play failed: {}", e);
            process::exit(1);
        }
    }
}

fn cmd_play(args: &[String]) {
    let mut config_path: Option<String> = None;
    let mut side_arg: Option<String> = None;
    let mut out: Option<PathBuf> = None;
    let mut local = false;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!(
                    r#"rv play

USAGE:
    rv play [--config cfg.yaml] [--side b|w] [--local] [--out FILE]

OPTIONS:
    --config F   Load configuration from a YAML file (default: built-in defaults)
    --side S     Play black (b) or white (w); prompted for when omitted
    --local      Evaluate in-process instead of through the batching server
    --out FILE   Record each action to FILE, one per line

Enter moves as coordinates (d3), `pass` when stuck, or `back` to undo
the last two plies.
"#
                );
                return;
            }
            "--config" => {
                if i + 1 >= args.len() {
                    eprintln!("Missing value for --config");
                    process::exit(1);
                }
                config_path = Some(args[i + 1].clone());
                i += 2;
            }
            "--side" => {
                if i + 1 >= args.len() {
                    eprintln!("Missing value for --side");
                    process::exit(1);
                }
                side_arg = Some(args[i + 1].clone());
                i += 2;
            }
            "--out" => {
                if i + 1 >= args.len() {
                    eprintln!("Missing value for --out");
                    process::exit(1);
                }
                out = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--local" => {
                local = true;
                i += 1;
            }
            other => {
                eprintln!("Unknown option for `rv play`: {}", other);
                eprintln!("Run `rv play --help` for usage.");
                process::exit(1);
            }
        }
    }

    let cfg = match config_path {
        Some(path) => Config::load(&path).unwrap_or_else(|e| {
            eprintln!("Failed to load config {}: {}", path, e);
            process::exit(1);
        }),
        None => Config::default(),
    };

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    let side_text = side_arg.unwrap_or_else(|| {
        print!("[b]lack / [w]hite ? ");
        let _ = output.flush();
        let mut line = String::new();
        if input.read_line(&mut line).unwrap_or(0) == 0 {
            eprintln!("No side chosen");
            process::exit(1);
        }
        line
    });
    let player_side = match side_text.trim() {
        "b" | "black" => Side::Black,
        "w" | "white" => Side::White,
        other => {
            eprintln!("Invalid side {:?}: expected b or w", other);
            process::exit(1);
        }
    };

    // No exploration noise against a human; every move is greedy.
    let search_cfg = SearchConfig {
        c_puct: cfg.mcts.c_puct,
        n_simulation: cfg.mcts.n_simulation,
        tau: 0.0,
        e_frac: 0.0,
        d_alpha: cfg.mcts.d_alpha,
        e_step: 0,
    };
    let mut tree = SearchTree::new(search_cfg, cfg.selfplay.seed).unwrap_or_else(|e| {
        eprintln!("Invalid search configuration: {}", e);
        process::exit(1);
    });

    let mut record_file = out.map(|path| {
        std::fs::File::create(&path).unwrap_or_else(|e| {
            eprintln!("Failed to create {}: {}", path.display(), e);
            process::exit(1);
        })
    });
    let record = record_file.as_mut().map(|f| f as &mut dyn Write);

    let played = if local {
        let mut eval = LocalGateway::new(UniformOracle);
        play::play_session(&mut tree, &mut eval, player_side, &mut input, &mut output, record)
    } else {
        let server_cfg = ServerConfig {
            n_thread: 1,
            timeout: Duration::from_micros(cfg.gateway.timeout_us),
            max_timeout_ticks: cfg.gateway.max_timeout_ticks,
        };
        let startup = || -> Result<(BatchServer, RemoteGateway), Box<dyn std::error::Error>> {
            let bind = cfg.gateway.parse_bind()?;
            Ok(match bind {
                Bind::Tcp(addr) => {
                    let server = BatchServer::bind_tcp(addr.as_str(), server_cfg)?;
                    let addr = server.local_addr()?;
                    (server, RemoteGateway::connect_tcp(addr)?)
                }
                Bind::Unix(path) => {
                    let server = BatchServer::bind_uds(&path, server_cfg)?;
                    (server, RemoteGateway::connect_uds(&path)?)
                }
            })
        };
        let (server, mut eval) = startup().unwrap_or_else(|e| {
            eprintln!("Failed to start the evaluation server: {}", e);
            process::exit(1);
        });
        let server_handle = std::thread::spawn(move || {
            let mut oracle = UniformOracle;
            server.serve(&mut oracle)
        });
        let played =
            play::play_session(&mut tree, &mut eval, player_side, &mut input, &mut output, record);
        drop(eval);
        match server_handle.join() {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => eprintln!("Evaluation server error: {}", e),
            Err(_) => eprintln!("Evaluation server panicked"),
        }
        played
    };

    if let Err(e) = played {
        eprintln!("Game aborted: {}", e);
        process::exit(1);
    }
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("selfplay") => cmd_selfplay(&args[1..]),
        Some("play") => cmd_play(&args[1..]),
        Some("--version") | Some("-V") => print_version(),
        Some("--help") | Some("-h") | None => print_help(),
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            print_help();
            process::exit(1);
        }
    }
}
