//! Evaluation gateway: wire protocol, blocking client, batching server,
//! and the oracle seam the server multiplexes workers onto.

pub mod client;
pub mod codec;
pub mod oracle;
pub mod protocol;
pub mod server;

pub use client::{GatewayClient, GatewayError};
pub use codec::DecodeError;
pub use oracle::{Oracle, UniformOracle};
pub use protocol::{EvalRequest, EvalResponse, REQUEST_LEN, RESPONSE_LEN};
pub use server::{BatchServer, ServerConfig, ServerError, ServerReport};
