//! Fixed-layout evaluation protocol records.
//!
//! Both directions are packed little-endian with no framing: every
//! request is exactly [`REQUEST_LEN`] bytes and every response exactly
//! [`RESPONSE_LEN`] bytes, so stream boundaries are implicit.

use rv_core::N_ACTION;

/// black u64 + white u64 + side u8 + 64 legal-flag bytes.
pub const REQUEST_LEN: usize = 8 + 8 + 1 + N_ACTION;
/// 64 prior f32s + value f32.
pub const RESPONSE_LEN: usize = N_ACTION * 4 + 4;

/// One position submitted for evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalRequest {
    pub black: u64,
    pub white: u64,
    /// 0 = black to move, 1 = white to move.
    pub side: u8,
    /// 1 where the side to move may place a disk, 0 elsewhere.
    pub legal_flags: [u8; N_ACTION],
}

/// Oracle output for one position.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalResponse {
    pub priors: [f32; N_ACTION],
    /// Expected outcome in [-1, 1] from the requesting side's perspective.
    pub value: f32,
}
