//! Search-tree node: one position plus its edge statistics.

use rv_core::{Action, Board, Side, N_ACTION};

pub type NodeId = u32;

#[derive(Clone)]
pub struct Node {
    pub board: Board,
    /// Side to move at this position.
    pub side: Side,

    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,

    /// Visit count.
    pub n: u32,
    /// Mean backed-up value from this node's side to move.
    pub q: f32,
    /// Prior assigned by the parent's evaluation.
    pub prior: f32,
    /// Leaf evaluation (oracle value, or analytic score if terminal).
    pub value: f32,

    /// The side to move here has no placement.
    pub pass: bool,
    /// Game over at this position.
    pub terminal: bool,

    /// Move committed FROM this position, set when the game advances.
    pub action: Action,
    pub legal_actions: Vec<u8>,
    pub legal_flags: [bool; N_ACTION],
    /// Normalized visit distribution recorded when the move was chosen.
    pub posteriors: [f32; N_ACTION],
}

impl Node {
    pub fn new(board: Board, side: Side, prior: f32, parent: Option<NodeId>) -> Self {
        Self {
            board,
            side,
            parent,
            children: Vec::new(),
            n: 0,
            q: 0.0,
            prior,
            value: 0.0,
            pass: false,
            terminal: false,
            action: Action::Invalid,
            legal_actions: Vec::new(),
            legal_flags: [false; N_ACTION],
            posteriors: [0.0; N_ACTION],
        }
    }

    pub fn expanded(&self) -> bool {
        !self.children.is_empty()
    }
}
