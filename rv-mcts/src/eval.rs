//! Leaf evaluation seam.
//!
//! The search only ever sees [`Evaluate`]; whether evaluations travel
//! over a socket to the batching server or run in-process against an
//! oracle is the caller's deployment choice.

use rv_gateway::{EvalRequest, EvalResponse, GatewayClient, GatewayError, Oracle};
use std::net::ToSocketAddrs;
use std::path::Path;

pub trait Evaluate {
    fn evaluate(&mut self, req: &EvalRequest) -> Result<EvalResponse, GatewayError>;
}

/// Remote evaluation through the batching server.
pub struct RemoteGateway {
    client: GatewayClient,
}

impl RemoteGateway {
    pub fn connect_tcp<A: ToSocketAddrs>(addr: A) -> Result<RemoteGateway, GatewayError> {
        Ok(RemoteGateway {
            client: GatewayClient::connect_tcp(addr)?,
        })
    }

    pub fn connect_uds<P: AsRef<Path>>(path: P) -> Result<RemoteGateway, GatewayError> {
        Ok(RemoteGateway {
            client: GatewayClient::connect_uds(path)?,
        })
    }
}

impl Evaluate for RemoteGateway {
    fn evaluate(&mut self, req: &EvalRequest) -> Result<EvalResponse, GatewayError> {
        self.client.request(req)
    }
}

/// In-process evaluation: each request becomes a batch of one against
/// the wrapped oracle.
pub struct LocalGateway<O: Oracle> {
    oracle: O,
}

impl<O: Oracle> LocalGateway<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }
}

impl<O: Oracle> Evaluate for LocalGateway<O> {
    fn evaluate(&mut self, req: &EvalRequest) -> Result<EvalResponse, GatewayError> {
        let mut out = self.oracle.infer_batch(std::slice::from_ref(req));
        if out.len() != 1 {
            return Err(GatewayError::BadBatch {
                got: out.len(),
                expected: 1,
            });
        }
        Ok(out.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rv_core::N_ACTION;

    struct SilentOracle;

    impl Oracle for SilentOracle {
        fn infer_batch(&mut self, _batch: &[EvalRequest]) -> Vec<EvalResponse> {
            Vec::new()
        }
    }

    #[test]
    fn empty_oracle_return_is_an_error_not_a_panic() {
        let mut gateway = LocalGateway::new(SilentOracle);
        let req = EvalRequest {
            black: 0,
            white: 0,
            side: 0,
            legal_flags: [0u8; N_ACTION],
        };
        assert!(matches!(
            gateway.evaluate(&req),
            Err(GatewayError::BadBatch { got: 0, expected: 1 })
        ));
    }
}
