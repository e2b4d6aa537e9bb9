//! Binary codec for the fixed-layout evaluation protocol.

use thiserror::Error;

use crate::protocol::{EvalRequest, EvalResponse, REQUEST_LEN, RESPONSE_LEN};
use rv_core::N_ACTION;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload too short")]
    TooShort,
    #[error("invalid payload length: got {got}, expected {expected}")]
    BadLength { got: usize, expected: usize },
    #[error("invalid side byte: {0}")]
    BadSide(u8),
    #[error("invalid boolean byte in legal_flags: {0}")]
    BadLegalByte(u8),
}

pub fn encode_request(req: &EvalRequest) -> [u8; REQUEST_LEN] {
    let mut out = [0u8; REQUEST_LEN];
    out[0..8].copy_from_slice(&req.black.to_le_bytes());
    out[8..16].copy_from_slice(&req.white.to_le_bytes());
    out[16] = req.side;
    out[17..].copy_from_slice(&req.legal_flags);
    out
}

pub fn decode_request(bytes: &[u8]) -> Result<EvalRequest, DecodeError> {
    if bytes.len() != REQUEST_LEN {
        return Err(DecodeError::BadLength {
            got: bytes.len(),
            expected: REQUEST_LEN,
        });
    }
    let mut c = Cursor::new(bytes);
    let black = c.read_u64()?;
    let white = c.read_u64()?;
    let side = c.read_u8()?;
    if side > 1 {
        return Err(DecodeError::BadSide(side));
    }
    let mut legal_flags = [0u8; N_ACTION];
    c.read_bytes_into(&mut legal_flags)?;
    for &b in &legal_flags {
        if b != 0 && b != 1 {
            return Err(DecodeError::BadLegalByte(b));
        }
    }
    Ok(EvalRequest {
        black,
        white,
        side,
        legal_flags,
    })
}

pub fn encode_response(resp: &EvalResponse) -> [u8; RESPONSE_LEN] {
    let mut out = [0u8; RESPONSE_LEN];
    for (i, &p) in resp.priors.iter().enumerate() {
        out[i * 4..i * 4 + 4].copy_from_slice(&p.to_le_bytes());
    }
    out[N_ACTION * 4..].copy_from_slice(&resp.value.to_le_bytes());
    out
}

pub fn decode_response(bytes: &[u8]) -> Result<EvalResponse, DecodeError> {
    if bytes.len() != RESPONSE_LEN {
        return Err(DecodeError::BadLength {
            got: bytes.len(),
            expected: RESPONSE_LEN,
        });
    }
    let mut c = Cursor::new(bytes);
    let mut priors = [0f32; N_ACTION];
    for p in priors.iter_mut() {
        *p = c.read_f32()?;
    }
    let value = c.read_f32()?;
    Ok(EvalResponse { priors, value })
}

struct Cursor<'a> {
    bytes: &'a [u8],
    off: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, off: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.off + n > self.bytes.len() {
            return Err(DecodeError::TooShort);
        }
        let s = &self.bytes[self.off..self.off + n];
        self.off += n;
        Ok(s)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn read_u64(&mut self) -> Result<u64, DecodeError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_f32(&mut self) -> Result<f32, DecodeError> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_bytes_into(&mut self, out: &mut [u8]) -> Result<(), DecodeError> {
        let b = self.take(out.len())?;
        out.copy_from_slice(b);
        Ok(())
    }
}
