//! Batching evaluation server.
//!
//! The server accepts exactly `n_thread` worker connections, then runs
//! batching rounds: block until the first request of the round arrives,
//! then keep gathering under a bounded timeout-tick budget, stopping
//! early once every still-connected worker has submitted. Each round
//! triggers one oracle call and writes one response per contributor.
//! A clean EOF removes a worker; the server exits when all are gone.
//!
//! Each connection gets a reader thread that decodes fixed-size request
//! records and forwards them over a shared channel, which the batching
//! loop drains with `recv` / `recv_timeout`.

use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, ToSocketAddrs};
use std::os::unix::net::UnixListener;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::client::{read_record, Stream};
use crate::codec::{decode_request, encode_response, DecodeError};
use crate::oracle::Oracle;
use crate::protocol::{EvalRequest, REQUEST_LEN};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed request from worker {worker}: {source}")]
    BadRequest {
        worker: usize,
        #[source]
        source: DecodeError,
    },
    #[error("oracle returned {got} responses for a batch of {expected}")]
    BadBatch { got: usize, expected: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// Number of worker connections to accept before serving.
    pub n_thread: usize,
    /// Batch-gathering timeout per tick.
    pub timeout: Duration,
    /// Maximum timeout ticks spent on one round.
    pub max_timeout_ticks: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            n_thread: 4,
            timeout: Duration::from_micros(500),
            max_timeout_ticks: 4,
        }
    }
}

/// Final statistics returned when all workers have disconnected.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerReport {
    pub rounds: u64,
    pub requests: u64,
    /// EWMA of batch size over connection count.
    pub occupancy_rate: f64,
    /// EWMA of oracle time per round, in milliseconds.
    pub work_time_ms: f64,
}

enum Listener {
    Tcp(TcpListener),
    Uds(UnixListener),
}

enum Event {
    Request { worker: usize, req: EvalRequest },
    Disconnected { worker: usize },
    Failed { worker: usize, error: ServerError },
}

pub struct BatchServer {
    listener: Listener,
    cfg: ServerConfig,
}

impl BatchServer {
    /// Bind a TCP listener. Connections may queue as soon as this
    /// returns, so workers can connect before `serve` starts.
    pub fn bind_tcp<A: ToSocketAddrs>(addr: A, cfg: ServerConfig) -> Result<BatchServer, ServerError> {
        let listener = TcpListener::bind(addr)?;
        Ok(BatchServer {
            listener: Listener::Tcp(listener),
            cfg,
        })
    }

    /// Bind a Unix socket, removing any stale socket file first.
    pub fn bind_uds<P: AsRef<Path>>(path: P, cfg: ServerConfig) -> Result<BatchServer, ServerError> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path)?;
        Ok(BatchServer {
            listener: Listener::Uds(listener),
            cfg,
        })
    }

    /// Bound TCP address, for port-0 binds.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        match &self.listener {
            Listener::Tcp(l) => Ok(l.local_addr()?),
            Listener::Uds(_) => Err(ServerError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unix listener has no socket address",
            ))),
        }
    }

    fn accept(&self) -> Result<Stream, ServerError> {
        match &self.listener {
            Listener::Tcp(l) => {
                let (s, _) = l.accept()?;
                s.set_nodelay(true)?;
                Ok(Stream::Tcp(s))
            }
            Listener::Uds(l) => {
                let (s, _) = l.accept()?;
                Ok(Stream::Uds(s))
            }
        }
    }

    /// Accept `n_thread` workers and run batching rounds until every
    /// worker has disconnected cleanly.
    pub fn serve(self, oracle: &mut dyn Oracle) -> Result<ServerReport, ServerError> {
        let (tx, rx) = mpsc::channel::<Event>();
        let mut writers: Vec<Option<Stream>> = Vec::with_capacity(self.cfg.n_thread);
        let mut readers: Vec<thread::JoinHandle<()>> = Vec::with_capacity(self.cfg.n_thread);

        for worker in 0..self.cfg.n_thread {
            let stream = self.accept()?;
            let mut read_half = stream.try_clone()?;
            writers.push(Some(stream));
            let tx = tx.clone();
            let handle = thread::Builder::new()
                .name(format!("rv-gateway-reader-{worker}"))
                .spawn(move || {
                    let mut buf = [0u8; REQUEST_LEN];
                    loop {
                        match read_record(&mut read_half, &mut buf) {
                            Ok(false) => {
                                let _ = tx.send(Event::Disconnected { worker });
                                return;
                            }
                            Ok(true) => match decode_request(&buf) {
                                Ok(req) => {
                                    if tx.send(Event::Request { worker, req }).is_err() {
                                        return;
                                    }
                                }
                                Err(source) => {
                                    let _ = tx.send(Event::Failed {
                                        worker,
                                        error: ServerError::BadRequest { worker, source },
                                    });
                                    return;
                                }
                            },
                            Err(e) => {
                                let _ = tx.send(Event::Failed {
                                    worker,
                                    error: ServerError::Io(e),
                                });
                                return;
                            }
                        }
                    }
                })
                .map_err(ServerError::Io)?;
            readers.push(handle);
        }
        drop(tx);

        let result = self.run_rounds(oracle, &rx, &mut writers);

        for w in writers.iter().flatten() {
            let _ = w.shutdown(Shutdown::Both);
        }
        for h in readers {
            let _ = h.join();
        }
        result
    }

    fn run_rounds(
        &self,
        oracle: &mut dyn Oracle,
        rx: &mpsc::Receiver<Event>,
        writers: &mut [Option<Stream>],
    ) -> Result<ServerReport, ServerError> {
        let mut connected = self.cfg.n_thread;
        let mut report = ServerReport {
            occupancy_rate: 0.5,
            work_time_ms: 1.0,
            ..ServerReport::default()
        };

        while connected > 0 {
            let mut batch: Vec<(usize, EvalRequest)> = Vec::with_capacity(connected);

            // Block for the first request of the round.
            match rx.recv() {
                Ok(ev) => handle_event(ev, &mut batch, &mut connected, writers)?,
                Err(_) => break,
            }

            // Gather more under the tick budget; stop early once every
            // still-connected worker has contributed.
            let mut ticks = 0u32;
            while connected > 0 && batch.len() < connected && ticks < self.cfg.max_timeout_ticks {
                match rx.recv_timeout(self.cfg.timeout) {
                    Ok(ev) => handle_event(ev, &mut batch, &mut connected, writers)?,
                    Err(RecvTimeoutError::Timeout) => ticks += 1,
                    Err(RecvTimeoutError::Disconnected) => {
                        connected = 0;
                        break;
                    }
                }
            }

            if batch.is_empty() {
                continue;
            }

            let requests: Vec<EvalRequest> = batch.iter().map(|(_, r)| r.clone()).collect();
            let started = Instant::now();
            let responses = oracle.infer_batch(&requests);
            let elapsed_ms = started.elapsed().as_secs_f64() * 1e3;
            // A short return would silently starve contributors.
            if responses.len() != requests.len() {
                return Err(ServerError::BadBatch {
                    got: responses.len(),
                    expected: requests.len(),
                });
            }

            for ((worker, _), resp) in batch.iter().zip(&responses) {
                if let Some(stream) = writers[*worker].as_mut() {
                    let out = encode_response(resp);
                    stream.write_all(&out)?;
                    stream.flush()?;
                }
            }

            let denom = self.cfg.n_thread.max(1) as f64;
            report.occupancy_rate =
                report.occupancy_rate * 0.99 + (batch.len() as f64 / denom) * 0.01;
            report.work_time_ms = report.work_time_ms * 0.99 + elapsed_ms * 0.01;
            report.rounds += 1;
            report.requests += batch.len() as u64;
            if report.rounds % 1000 == 0 {
                eprintln!(
                    "rv-gateway: {} rounds, occupancy {:.3}, work {:.3} ms",
                    report.rounds, report.occupancy_rate, report.work_time_ms
                );
            }
        }

        Ok(report)
    }
}

fn handle_event(
    ev: Event,
    batch: &mut Vec<(usize, EvalRequest)>,
    connected: &mut usize,
    writers: &mut [Option<Stream>],
) -> Result<(), ServerError> {
    match ev {
        Event::Request { worker, req } => {
            batch.push((worker, req));
            Ok(())
        }
        Event::Disconnected { worker } => {
            if let Some(stream) = writers[worker].take() {
                let _ = stream.shutdown(Shutdown::Both);
            }
            *connected = connected.saturating_sub(1);
            Ok(())
        }
        Event::Failed { error, .. } => Err(error),
    }
}
