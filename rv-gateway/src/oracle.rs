//! Batch evaluation seam between the server and whatever produces
//! priors and values.

use crate::protocol::{EvalRequest, EvalResponse};
use rv_core::N_ACTION;

/// Evaluates a whole gathered batch in one call.
///
/// Implementations must return exactly one response per request, in
/// request order; the server treats any other length as a fatal
/// protocol violation.
pub trait Oracle: Send {
    fn infer_batch(&mut self, batch: &[EvalRequest]) -> Vec<EvalResponse>;
}

/// Stand-in oracle: uniform priors over the legal cells and a
/// disk-differential value from the requesting side's perspective.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformOracle;

impl Oracle for UniformOracle {
    fn infer_batch(&mut self, batch: &[EvalRequest]) -> Vec<EvalResponse> {
        batch.iter().map(eval_one).collect()
    }
}

fn eval_one(req: &EvalRequest) -> EvalResponse {
    let n_legal = req.legal_flags.iter().filter(|&&b| b == 1).count();
    let mut priors = [0f32; N_ACTION];
    if n_legal > 0 {
        let p = 1.0 / n_legal as f32;
        for (prior, &flag) in priors.iter_mut().zip(&req.legal_flags) {
            if flag == 1 {
                *prior = p;
            }
        }
    }
    let black = req.black.count_ones() as f32;
    let white = req.white.count_ones() as f32;
    let diff = (black - white) / 64.0;
    let value = if req.side == 0 { diff } else { -diff };
    EvalResponse { priors, value }
}
