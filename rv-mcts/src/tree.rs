//! PUCT search controller: expansion, selection, backpropagation,
//! root exploration noise, temperature sampling, and whole-game driving.

use crate::arena::Arena;
use crate::eval::Evaluate;
use crate::node::{Node, NodeId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Gamma};
use thiserror::Error;

use rv_core::{Action, Board, BoardError, Side, N_ACTION};
use rv_gateway::{EvalRequest, GatewayError};

/// Below this temperature move selection is greedy.
const TAU_GREEDY_THRESHOLD: f32 = 0.01;

#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    pub c_puct: f32,
    pub n_simulation: u32,
    /// Sampling temperature for early moves.
    pub tau: f32,
    /// Fraction of Dirichlet noise mixed into root priors.
    pub e_frac: f32,
    /// Dirichlet concentration; 0 disables noise sampling.
    pub d_alpha: f32,
    /// Plies played at `tau`; later moves are greedy.
    pub e_step: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            c_puct: 1.4,
            n_simulation: 128,
            tau: 1.0,
            e_frac: 0.25,
            d_alpha: 1.0,
            e_step: 10,
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid config: {msg}")]
    InvalidConfig { msg: &'static str },
    #[error("evaluation failed: {0}")]
    Eval(#[from] GatewayError),
    #[error("board update failed: {0}")]
    Board(#[from] BoardError),
    #[error("no visits to sample a move from")]
    DegenerateVisits,
    #[error("action {action} does not lead out of this position")]
    UnexpectedAction { action: Action },
    #[error("no earlier position to return to")]
    NoHistory,
}

/// One committed position of a finished game.
#[derive(Debug, Clone)]
pub struct MoveRecord {
    pub board: Board,
    pub side: Side,
    pub action: Action,
    pub q: f32,
    pub legal_flags: [bool; N_ACTION],
    pub posteriors: [f32; N_ACTION],
}

/// A finished self-play game.
#[derive(Debug, Clone)]
pub struct GameOutcome {
    pub records: Vec<MoveRecord>,
    /// Final disk differential in [-1, 1] from Black's perspective.
    pub result: f32,
    pub moves: u32,
    pub final_board: Board,
}

pub struct SearchTree {
    cfg: SearchConfig,
    arena: Arena,
    rng: ChaCha8Rng,
}

impl SearchTree {
    pub fn new(cfg: SearchConfig, seed: u64) -> Result<Self, SearchError> {
        if !(cfg.c_puct.is_finite() && cfg.c_puct > 0.0) {
            return Err(SearchError::InvalidConfig {
                msg: "c_puct must be finite and > 0",
            });
        }
        if cfg.n_simulation == 0 {
            return Err(SearchError::InvalidConfig {
                msg: "n_simulation must be > 0",
            });
        }
        if !(0.0..=1.0).contains(&cfg.e_frac) {
            return Err(SearchError::InvalidConfig {
                msg: "e_frac must be in [0, 1]",
            });
        }
        if !(cfg.tau.is_finite() && cfg.tau >= 0.0) {
            return Err(SearchError::InvalidConfig {
                msg: "tau must be finite and >= 0",
            });
        }
        if !(cfg.d_alpha.is_finite() && cfg.d_alpha >= 0.0) {
            return Err(SearchError::InvalidConfig {
                msg: "d_alpha must be finite and >= 0",
            });
        }
        Ok(Self {
            cfg,
            arena: Arena::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Clear the tree and allocate a fresh root for the start position.
    pub fn new_root(&mut self) -> NodeId {
        self.root_from(Board::new(), Side::Black)
    }

    /// Clear the tree and allocate a fresh root for an arbitrary
    /// position.
    pub fn root_from(&mut self, board: Board, side: Side) -> NodeId {
        self.arena.clear();
        self.arena.alloc(Node::new(board, side, 0.0, None))
    }

    /// Evaluate `id` and attach one child per legal placement (or the
    /// single pass child), unless the position is terminal, in which
    /// case the analytic score becomes its value and no oracle call is
    /// made.
    pub fn expand(&mut self, id: NodeId, eval: &mut impl Evaluate) -> Result<(), SearchError> {
        let (board, side, parent) = {
            let node = self.arena.get(id);
            (node.board, node.side, node.parent)
        };
        let legal_actions = board.legal_actions(side);
        let pass = legal_actions.is_empty();
        // Two consecutive passes (or a full board) end the game. The
        // root has no parent, so a first forced pass never terminates.
        let parent_pass = parent.map(|p| self.arena.get(p).pass).unwrap_or(false);
        let terminal = (pass && parent_pass) || board.is_full();

        {
            let node = self.arena.get_mut(id);
            node.pass = pass;
            node.terminal = terminal;
            for &a in &legal_actions {
                node.legal_flags[a as usize] = true;
            }
            node.legal_actions = legal_actions.clone();
        }

        if terminal {
            self.arena.get_mut(id).value = board.score_for(side);
            return Ok(());
        }

        let mut flag_bytes = [0u8; N_ACTION];
        for &a in &legal_actions {
            flag_bytes[a as usize] = 1;
        }
        let resp = eval.evaluate(&EvalRequest {
            black: board.black(),
            white: board.white(),
            side: side.index(),
            legal_flags: flag_bytes,
        })?;
        self.arena.get_mut(id).value = resp.value;

        if pass {
            // Forced pass: same board, other side to move, full prior.
            let child = self
                .arena
                .alloc(Node::new(board, side.opponent(), 1.0, Some(id)));
            self.arena.get_mut(id).children.push(child);
        } else {
            for &a in &legal_actions {
                let mut next = board;
                next.place_disk(Action::Cell(a), side)?;
                let child = self.arena.alloc(Node::new(
                    next,
                    side.opponent(),
                    resp.priors[a as usize],
                    Some(id),
                ));
                self.arena.get_mut(id).children.push(child);
            }
        }
        Ok(())
    }

    /// PUCT child selection. The first child at the maximum score wins
    /// ties, making selection deterministic for equal stats.
    fn select_child(&self, id: NodeId) -> NodeId {
        let node = self.arena.get(id);
        debug_assert!(node.expanded());
        let sqrt_n = (node.n as f32).sqrt();
        let mut best = node.children[0];
        let mut best_score = f32::NEG_INFINITY;
        for &child_id in &node.children {
            let child = self.arena.get(child_id);
            // child.q is from the child mover's perspective; negate it
            // for the parent's choice.
            let score = -child.q + self.cfg.c_puct * child.prior * sqrt_n / (child.n as f32 + 1.0);
            if score > best_score {
                best_score = score;
                best = child_id;
            }
        }
        best
    }

    /// Fold `value` into the running means from `leaf` up to and
    /// including `stop`, flipping the sign at every ply.
    pub fn backpropagate(&mut self, leaf: NodeId, value: f32, stop: NodeId) {
        let mut cur = leaf;
        let mut v = value;
        loop {
            let node = self.arena.get_mut(cur);
            node.q = (node.q * node.n as f32 + v) / (node.n as f32 + 1.0);
            node.n += 1;
            if cur == stop {
                break;
            }
            match node.parent {
                Some(parent) => {
                    cur = parent;
                    v = -v;
                }
                None => break,
            }
        }
    }

    /// Mix Dirichlet noise into the children's priors:
    /// `prior <- (1 - e_frac) * prior + e_frac * noise`. With
    /// `d_alpha == 0` the noise vector stays zero and no RNG draws are
    /// consumed, but the mix is still applied.
    fn add_exploration_noise(&mut self, id: NodeId) {
        let children = self.arena.get(id).children.clone();
        if children.is_empty() || self.cfg.e_frac == 0.0 {
            return;
        }
        let mut noise = vec![0.0f32; children.len()];
        if self.cfg.d_alpha > 0.0 {
            if let Ok(gamma) = Gamma::new(self.cfg.d_alpha as f64, 1.0) {
                let mut sum = 0.0f64;
                let samples: Vec<f64> = (0..children.len())
                    .map(|_| {
                        let g = gamma.sample(&mut self.rng).max(0.0);
                        sum += g;
                        g
                    })
                    .collect();
                if sum.is_finite() && sum > 0.0 {
                    for (n, g) in noise.iter_mut().zip(samples) {
                        *n = (g / sum) as f32;
                    }
                }
            }
        }
        for (&child_id, &n) in children.iter().zip(&noise) {
            let child = self.arena.get_mut(child_id);
            child.prior = child.prior * (1.0 - self.cfg.e_frac) + n * self.cfg.e_frac;
        }
    }

    /// Commit a move from `id`: sample a child by visit count at
    /// temperature `tau` (greedy below the threshold), record the
    /// posterior distribution and the chosen action on `id`, and return
    /// the child.
    fn next_node(&mut self, id: NodeId, tau: f32) -> Result<NodeId, SearchError> {
        let (pass, children, legal_actions) = {
            let node = self.arena.get(id);
            (node.pass, node.children.clone(), node.legal_actions.clone())
        };

        if pass {
            let child = match children.first() {
                Some(&c) => c,
                // Terminal positions commit no move.
                None => return Err(SearchError::DegenerateVisits),
            };
            self.arena.get_mut(id).action = Action::Pass;
            return Ok(child);
        }

        let stochastic = tau > TAU_GREEDY_THRESHOLD;
        let tau_inv = if stochastic { 1.0 / tau } else { 1.0 };
        let ratios: Vec<f32> = children
            .iter()
            .map(|&c| (self.arena.get(c).n as f32).powf(tau_inv))
            .collect();
        let ratio_sum: f32 = ratios.iter().sum();
        if !(ratio_sum.is_finite() && ratio_sum > 0.0) {
            return Err(SearchError::DegenerateVisits);
        }

        let mut posteriors = [0.0f32; N_ACTION];
        let selected = if stochastic {
            for (i, &r) in ratios.iter().enumerate() {
                posteriors[legal_actions[i] as usize] = r / ratio_sum;
            }
            let mut draw: f32 = self.rng.gen_range(0.0..ratio_sum);
            let mut sel = None;
            for (i, &r) in ratios.iter().enumerate() {
                // Unvisited children are never committed.
                if r <= 0.0 {
                    continue;
                }
                if draw <= r {
                    sel = Some(i);
                    break;
                }
                draw -= r;
            }
            match sel {
                Some(i) => i,
                // Accumulated rounding ran past the end; take the most
                // visited child.
                None => {
                    let mut best = 0usize;
                    let mut best_r = f32::NEG_INFINITY;
                    for (i, &r) in ratios.iter().enumerate() {
                        if r > best_r {
                            best_r = r;
                            best = i;
                        }
                    }
                    best
                }
            }
        } else {
            let mut sel = 0usize;
            let mut max_ratio = f32::NEG_INFINITY;
            for (i, &r) in ratios.iter().enumerate() {
                if r > max_ratio {
                    max_ratio = r;
                    sel = i;
                }
            }
            posteriors[legal_actions[sel] as usize] = 1.0;
            sel
        };

        let node = self.arena.get_mut(id);
        node.posteriors = posteriors;
        node.action = Action::Cell(legal_actions[selected]);
        Ok(children[selected])
    }

    /// Run `n_simulation` select/expand/backpropagate cycles rooted at
    /// `root`.
    pub fn run_simulations(
        &mut self,
        root: NodeId,
        eval: &mut impl Evaluate,
    ) -> Result<(), SearchError> {
        for _ in 0..self.cfg.n_simulation {
            let mut node = root;
            while self.arena.get(node).expanded() {
                node = self.select_child(node);
            }
            if !self.arena.get(node).terminal {
                self.expand(node, eval)?;
            }
            let value = self.arena.get(node).value;
            self.backpropagate(node, value, root);
        }
        Ok(())
    }

    /// Search from `root` and commit one move: noise, simulations,
    /// temperature sampling, then release every sibling subtree of the
    /// chosen child.
    pub fn run_move(
        &mut self,
        root: NodeId,
        tau: f32,
        eval: &mut impl Evaluate,
    ) -> Result<NodeId, SearchError> {
        self.add_exploration_noise(root);
        self.run_simulations(root, eval)?;
        let next = self.next_node(root, tau)?;
        self.commit_child(root, next);
        Ok(next)
    }

    fn commit_child(&mut self, id: NodeId, next: NodeId) {
        let siblings: Vec<NodeId> = self
            .arena
            .get(id)
            .children
            .iter()
            .copied()
            .filter(|&c| c != next)
            .collect();
        for s in siblings {
            self.arena.release_subtree(s);
        }
        self.arena.get_mut(id).children = vec![next];
    }

    /// Commit an externally chosen action from `id` (interactive play):
    /// descend to the matching child, record the action, and release
    /// the sibling subtrees. `id` must already be expanded.
    pub fn advance(&mut self, id: NodeId, action: Action) -> Result<NodeId, SearchError> {
        let (pass, children, legal_actions) = {
            let node = self.arena.get(id);
            (node.pass, node.children.clone(), node.legal_actions.clone())
        };
        let selected = match action {
            Action::Pass if pass => 0,
            Action::Cell(c) if !pass => legal_actions
                .iter()
                .position(|&a| a == c)
                .ok_or(SearchError::UnexpectedAction { action })?,
            _ => return Err(SearchError::UnexpectedAction { action }),
        };
        let next = children
            .get(selected)
            .copied()
            .ok_or(SearchError::UnexpectedAction { action })?;
        self.arena.get_mut(id).action = action;
        self.commit_child(id, next);
        Ok(next)
    }

    /// Undo the last two plies: walk two parent links up from `id`,
    /// release everything below that position, and rebuild its children
    /// with freshly requested priors. The node's visit statistics are
    /// kept.
    pub fn retract(
        &mut self,
        id: NodeId,
        eval: &mut impl Evaluate,
    ) -> Result<NodeId, SearchError> {
        let parent = self.arena.get(id).parent.ok_or(SearchError::NoHistory)?;
        let target = self
            .arena
            .get(parent)
            .parent
            .ok_or(SearchError::NoHistory)?;
        let children = std::mem::take(&mut self.arena.get_mut(target).children);
        for c in children {
            self.arena.release_subtree(c);
        }
        self.arena.get_mut(target).action = Action::Invalid;
        self.expand(target, eval)?;
        Ok(target)
    }

    /// Play one full game from the start position and collect its
    /// committed path. The tree is cleared before and after.
    pub fn play_game(&mut self, eval: &mut impl Evaluate) -> Result<GameOutcome, SearchError> {
        let root = self.new_root();
        self.expand(root, eval)?;
        let value = self.arena.get(root).value;
        self.backpropagate(root, value, root);

        let mut history = vec![root];
        let mut current = root;
        let mut ply = 0u32;
        loop {
            let tau = if ply < self.cfg.e_step { self.cfg.tau } else { 0.0 };
            current = self.run_move(current, tau, eval)?;
            history.push(current);
            ply += 1;
            if self.arena.get(current).terminal {
                break;
            }
        }

        let final_board = self.arena.get(current).board;
        let result = final_board.score();
        // The terminal position committed no move, so it yields no record.
        let records = history[..history.len() - 1]
            .iter()
            .map(|&id| {
                let node = self.arena.get(id);
                MoveRecord {
                    board: node.board,
                    side: node.side,
                    action: node.action,
                    q: node.q,
                    legal_flags: node.legal_flags,
                    posteriors: node.posteriors,
                }
            })
            .collect::<Vec<_>>();
        let moves = records.len() as u32;
        self.arena.clear();
        Ok(GameOutcome {
            records,
            result,
            moves,
            final_board,
        })
    }
}
