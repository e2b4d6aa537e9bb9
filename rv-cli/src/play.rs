//! Interactive game against the search.
//!
//! The human enters coordinates like `d3`, `pass` when stuck, or
//! `back` to undo the last two plies; the search answers with a full
//! PUCT search per move. Chosen actions can be mirrored to a record
//! file, one per line.

use std::io::{BufRead, Write};

use thiserror::Error;

use rv_core::{parse_action, Action, Side};
use rv_mcts::{Evaluate, NodeId, SearchError, SearchTree};

#[derive(Debug, Error)]
pub enum PlayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("search error: {0}")]
    Search(#[from] SearchError),
    #[error("input closed")]
    InputClosed,
}

/// Play one game from the start position, the human as `player_side`.
/// Returns the final result from the human's perspective.
pub fn play_session<E: Evaluate>(
    tree: &mut SearchTree,
    eval: &mut E,
    player_side: Side,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
    mut record: Option<&mut dyn Write>,
) -> Result<f32, PlayError> {
    let root = tree.new_root();
    tree.expand(root, eval)?;
    let value = tree.arena().get(root).value;
    tree.backpropagate(root, value, root);

    let mut current = root;
    writeln!(output, "{}", tree.arena().get(current).board)?;

    loop {
        let side = tree.arena().get(current).side;
        let action;
        if side == player_side {
            let chosen = prompt_action(tree, current, side, input, output)?;
            if chosen == Action::Retract {
                current = tree.retract(current, eval)?;
                if let Some(rec) = record.as_deref_mut() {
                    writeln!(rec, "{}", Action::Retract)?;
                }
                writeln!(output, "{}", tree.arena().get(current).board)?;
                continue;
            }
            current = tree.advance(current, chosen)?;
            action = chosen;
        } else {
            let from = current;
            current = tree.run_move(current, 0.0, eval)?;
            action = tree.arena().get(from).action;
        }
        ensure_evaluated(tree, current, eval)?;

        writeln!(output, "{} : {}", side, action)?;
        writeln!(output, "{}", tree.arena().get(current).board)?;
        if let Some(rec) = record.as_deref_mut() {
            writeln!(rec, "{}", action)?;
        }
        if tree.arena().get(current).terminal {
            break;
        }
    }

    let board = tree.arena().get(current).board;
    let result = board.score_for(player_side);
    writeln!(
        output,
        "black:{} white:{} result:{}",
        board.count(Side::Black),
        board.count(Side::White),
        result
    )?;
    Ok(result)
}

fn prompt_action(
    tree: &SearchTree,
    current: NodeId,
    side: Side,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<Action, PlayError> {
    let board = tree.arena().get(current).board;
    loop {
        write!(output, "action ? ")?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(PlayError::InputClosed);
        }
        let parsed = parse_action(&line);
        if board.is_legal(parsed, side) {
            return Ok(parsed);
        }
        writeln!(output, "invalid action \"{}\"", line.trim())?;
    }
}

/// The pass and terminal flags are only trustworthy once a node has
/// been expanded; committed children may not have been reached by any
/// simulation yet.
fn ensure_evaluated(
    tree: &mut SearchTree,
    id: NodeId,
    eval: &mut impl Evaluate,
) -> Result<(), PlayError> {
    let (expanded, terminal) = {
        let node = tree.arena().get(id);
        (node.expanded(), node.terminal)
    };
    if !expanded && !terminal {
        tree.expand(id, eval)?;
    }
    Ok(())
}
