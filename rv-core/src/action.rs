//! Player actions and their single-byte wire encoding.

/// Byte codes for the non-placement actions. Placements use their cell
/// index (0..=63) directly.
pub const PASS_BYTE: u8 = 101;
pub const RETRACT_BYTE: u8 = 102;
pub const INVALID_BYTE: u8 = 201;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Place a disk on cell 0..=63 (a1 = 0, h8 = 63).
    Cell(u8),
    Pass,
    /// Undo the last two plies (interactive play only).
    Retract,
    Invalid,
}

impl Action {
    pub fn to_byte(self) -> u8 {
        match self {
            Action::Cell(i) => i,
            Action::Pass => PASS_BYTE,
            Action::Retract => RETRACT_BYTE,
            Action::Invalid => INVALID_BYTE,
        }
    }

    pub fn from_byte(b: u8) -> Action {
        match b {
            0..=63 => Action::Cell(b),
            PASS_BYTE => Action::Pass,
            RETRACT_BYTE => Action::Retract,
            _ => Action::Invalid,
        }
    }

    pub fn cell(self) -> Option<u8> {
        match self {
            Action::Cell(i) => Some(i),
            _ => None,
        }
    }
}

/// Parse a human move: a coordinate like `d3`, or `pass` / `back`.
/// Anything else is `Action::Invalid`.
pub fn parse_action(input: &str) -> Action {
    let s = input.trim();
    match s.to_ascii_lowercase().as_str() {
        "pass" => return Action::Pass,
        "back" => return Action::Retract,
        _ => {}
    }
    let mut chars = s.chars();
    let (col, row) = match (chars.next(), chars.next(), chars.next()) {
        (Some(c), Some(r), None) => (c.to_ascii_lowercase(), r),
        _ => return Action::Invalid,
    };
    if !('a'..='h').contains(&col) || !('1'..='8').contains(&row) {
        return Action::Invalid;
    }
    let col = col as u8 - b'a';
    let row = row as u8 - b'1';
    Action::Cell(row * 8 + col)
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Cell(i) => {
                let col = (b'a' + i % 8) as char;
                let row = (b'1' + i / 8) as char;
                write!(f, "{}{}", col, row)
            }
            Action::Pass => write!(f, "pass"),
            Action::Retract => write!(f, "back"),
            Action::Invalid => write!(f, "invalid"),
        }
    }
}
