//! Bit-parallel 8x8 Reversi board.
//!
//! Both colors are stored as `u64` masks, bit `i` = column `i % 8`, row
//! `i / 8` (a1 = bit 0, h8 = bit 63). Legal-move generation runs the
//! classic 6-fold shift-fill over all eight directions with edge masks
//! that stop wraparound across board edges.

use crate::action::Action;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("illegal action {action} for {side}")]
    IllegalAction { action: Action, side: Side },
    #[error("overlapping disk masks")]
    OverlappingMasks,
}

/// Disk color. Black moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Black,
    White,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Black => Side::White,
            Side::White => Side::Black,
        }
    }

    /// Wire encoding: 0 = black, 1 = white.
    pub fn index(self) -> u8 {
        match self {
            Side::Black => 0,
            Side::White => 1,
        }
    }

    pub fn from_byte(b: u8) -> Option<Side> {
        match b {
            0 => Some(Side::Black),
            1 => Some(Side::White),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Black => write!(f, "black"),
            Side::White => write!(f, "white"),
        }
    }
}

// Edge masks bounding each direction group: horizontal shifts must not
// leave columns b..g, vertical shifts must not leave rows 2..7, diagonal
// shifts neither.
const MASK_HORIZONTAL: u64 = 0x7e7e_7e7e_7e7e_7e7e;
const MASK_VERTICAL: u64 = 0x00ff_ffff_ffff_ff00;
const MASK_DIAGONAL: u64 = 0x007e_7e7e_7e7e_7e00;

const DIRECTIONS: usize = 8;

/// Raw shift by one cell in direction `dir` (0 left, 1 right, 2 up,
/// 3 down, 4 up-left, 5 up-right, 6 down-left, 7 down-right).
fn shift(bits: u64, dir: usize) -> u64 {
    match dir {
        0 => bits >> 1,
        1 => bits << 1,
        2 => bits >> 8,
        3 => bits << 8,
        4 => bits >> 9,
        5 => bits >> 7,
        6 => bits << 7,
        7 => bits << 9,
        _ => unreachable!(),
    }
}

fn edge_mask(dir: usize) -> u64 {
    match dir {
        0 | 1 => MASK_HORIZONTAL,
        2 | 3 => MASK_VERTICAL,
        _ => MASK_DIAGONAL,
    }
}

/// One-cell shift that also clamps to the direction's edge mask, used
/// when walking a flip ray outward from a placed disk.
fn shift_ray(bits: u64, dir: usize) -> u64 {
    match dir {
        0 => (bits >> 1) & 0x7f7f_7f7f_7f7f_7f7f,
        1 => (bits << 1) & 0xfefe_fefe_fefe_fefe,
        2 => (bits >> 8) & 0x00ff_ffff_ffff_ffff,
        3 => (bits << 8) & 0xffff_ffff_ffff_ff00,
        4 => (bits >> 9) & 0x007f_7f7f_7f7f_7f7f,
        5 => (bits >> 7) & 0x00fe_fefe_fefe_fefe,
        6 => (bits << 7) & 0x7f7f_7f7f_7f7f_7f00,
        7 => (bits << 9) & 0xfefe_fefe_fefe_fe00,
        _ => unreachable!(),
    }
}

/// Board position plus the number of disks on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    black: u64,
    white: u64,
    disks: u8,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Standard start position: white on d4/e5, black on e4/d5.
    pub fn new() -> Board {
        Board {
            black: (1u64 << 28) | (1u64 << 35),
            white: (1u64 << 27) | (1u64 << 36),
            disks: 4,
        }
    }

    /// Build a board from raw masks. The masks must be disjoint.
    pub fn from_masks(black: u64, white: u64) -> Result<Board, BoardError> {
        if black & white != 0 {
            return Err(BoardError::OverlappingMasks);
        }
        Ok(Board {
            black,
            white,
            disks: (black | white).count_ones() as u8,
        })
    }

    pub fn black(&self) -> u64 {
        self.black
    }

    pub fn white(&self) -> u64 {
        self.white
    }

    pub fn disks(&self) -> u8 {
        self.disks
    }

    fn side_mask(&self, side: Side) -> u64 {
        match side {
            Side::Black => self.black,
            Side::White => self.white,
        }
    }

    fn side_mask_mut(&mut self, side: Side) -> &mut u64 {
        match side {
            Side::Black => &mut self.black,
            Side::White => &mut self.white,
        }
    }

    /// Bitmask of cells where `side` may place a disk.
    pub fn legal_board(&self, side: Side) -> u64 {
        let own = self.side_mask(side);
        let opp = self.side_mask(side.opponent());
        let empty = !(own | opp);
        let mut legal = 0u64;
        for dir in 0..DIRECTIONS {
            let watch = opp & edge_mask(dir);
            let mut run = watch & shift(own, dir);
            for _ in 0..5 {
                run |= watch & shift(run, dir);
            }
            legal |= empty & shift(run, dir);
        }
        legal
    }

    /// Legal placement cells for `side` in ascending index order.
    pub fn legal_actions(&self, side: Side) -> Vec<u8> {
        let mut legal = self.legal_board(side);
        let mut out = Vec::with_capacity(legal.count_ones() as usize);
        while legal != 0 {
            let i = legal.trailing_zeros() as u8;
            out.push(i);
            legal &= legal - 1;
        }
        out
    }

    /// Pass is legal only when no placement is; retract needs two plies
    /// on the board to undo; invalid is never legal.
    pub fn is_legal(&self, action: Action, side: Side) -> bool {
        match action {
            Action::Cell(i) => i < 64 && self.legal_board(side) & (1u64 << i) != 0,
            Action::Pass => self.legal_board(side) == 0,
            Action::Retract => self.disks >= 6,
            Action::Invalid => false,
        }
    }

    /// Place a disk for `side` and flip every bounded run of opposing
    /// disks. `Action::Pass` leaves the board untouched.
    pub fn place_disk(&mut self, action: Action, side: Side) -> Result<(), BoardError> {
        let cell = match action {
            Action::Pass => {
                if self.legal_board(side) != 0 {
                    return Err(BoardError::IllegalAction { action, side });
                }
                return Ok(());
            }
            Action::Cell(i) => i,
            _ => return Err(BoardError::IllegalAction { action, side }),
        };
        if !self.is_legal(action, side) {
            return Err(BoardError::IllegalAction { action, side });
        }
        let pos = 1u64 << cell;
        let own = self.side_mask(side);
        let opp = self.side_mask(side.opponent());
        let mut flipped = 0u64;
        for dir in 0..DIRECTIONS {
            let mut run = 0u64;
            let mut probe = shift_ray(pos, dir);
            while probe != 0 && probe & opp != 0 {
                run |= probe;
                probe = shift_ray(probe, dir);
            }
            if probe & own != 0 {
                flipped |= run;
            }
        }
        *self.side_mask_mut(side) |= pos | flipped;
        *self.side_mask_mut(side.opponent()) &= !flipped;
        self.disks += 1;
        Ok(())
    }

    pub fn count(&self, side: Side) -> u32 {
        self.side_mask(side).count_ones()
    }

    pub fn empty_count(&self) -> u32 {
        64 - self.disks as u32
    }

    pub fn is_full(&self) -> bool {
        self.disks == 64
    }

    /// Disk differential in [-1, 1] from Black's perspective.
    pub fn score(&self) -> f32 {
        (self.count(Side::Black) as f32 - self.count(Side::White) as f32) / 64.0
    }

    /// Disk differential from `side`'s perspective.
    pub fn score_for(&self, side: Side) -> f32 {
        match side {
            Side::Black => self.score(),
            Side::White => -self.score(),
        }
    }

    /// Occupant of (col, row), both zero-based.
    pub fn cell(&self, col: u8, row: u8) -> Option<Side> {
        let pos = 1u64 << (row * 8 + col);
        if self.black & pos != 0 {
            Some(Side::Black)
        } else if self.white & pos != 0 {
            Some(Side::White)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  a b c d e f g h")?;
        for row in 0..8u8 {
            write!(f, "{} ", row + 1)?;
            for col in 0..8u8 {
                let c = match self.cell(col, row) {
                    Some(Side::Black) => 'x',
                    Some(Side::White) => 'o',
                    None => '-',
                };
                write!(f, "{} ", c)?;
            }
            writeln!(f)?;
        }
        write!(
            f,
            "black {} white {}",
            self.count(Side::Black),
            self.count(Side::White)
        )
    }
}
