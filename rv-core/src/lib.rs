//! Core Reversi domain types: bitboard engine, actions, configuration.

pub mod action;
pub mod board;
pub mod config;

pub use action::{parse_action, Action};
pub use board::{Board, BoardError, Side};
pub use config::{Bind, Config, ConfigError};

/// Number of board cells / policy entries.
pub const N_ACTION: usize = 64;

#[cfg(test)]
mod board_tests;
