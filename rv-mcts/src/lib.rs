//! PUCT Monte Carlo tree search over the Reversi board engine, with
//! arena-backed node storage and a pluggable leaf evaluator.

pub mod arena;
pub mod eval;
pub mod node;
pub mod tree;

pub use arena::Arena;
pub use eval::{Evaluate, LocalGateway, RemoteGateway};
pub use node::{Node, NodeId};
pub use tree::{GameOutcome, MoveRecord, SearchConfig, SearchError, SearchTree};

#[cfg(test)]
mod tree_tests;
