//! Packed training-record codec.
//!
//! One record per committed move, little-endian with no padding:
//! black u64, white u64, side u8, action u8, q f32, result f32,
//! 64 legal-flag bytes, 64 posterior f32s.

use rv_core::N_ACTION;
use thiserror::Error;

/// 8 + 8 + 1 + 1 + 4 + 4 + 64 + 256.
pub const RECORD_LEN: usize = 8 + 8 + 1 + 1 + 4 + 4 + N_ACTION + N_ACTION * 4;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid record length: got {got}, expected {expected}")]
    BadLength { got: usize, expected: usize },
    #[error("invalid side byte: {0}")]
    BadSide(u8),
    #[error("invalid boolean byte in legal_flags: {0}")]
    BadLegalByte(u8),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingRecord {
    pub black: u64,
    pub white: u64,
    /// 0 = black to move, 1 = white to move.
    pub side: u8,
    /// Committed action byte: cell 0..=63 or the pass code.
    pub action: u8,
    /// Root mean value from the mover's perspective.
    pub q: f32,
    /// Final game result from the mover's perspective.
    pub result: f32,
    pub legal_flags: [u8; N_ACTION],
    pub posteriors: [f32; N_ACTION],
}

pub fn encode_record(rec: &TrainingRecord) -> [u8; RECORD_LEN] {
    let mut out = [0u8; RECORD_LEN];
    out[0..8].copy_from_slice(&rec.black.to_le_bytes());
    out[8..16].copy_from_slice(&rec.white.to_le_bytes());
    out[16] = rec.side;
    out[17] = rec.action;
    out[18..22].copy_from_slice(&rec.q.to_le_bytes());
    out[22..26].copy_from_slice(&rec.result.to_le_bytes());
    out[26..26 + N_ACTION].copy_from_slice(&rec.legal_flags);
    let base = 26 + N_ACTION;
    for (i, &p) in rec.posteriors.iter().enumerate() {
        out[base + i * 4..base + i * 4 + 4].copy_from_slice(&p.to_le_bytes());
    }
    out
}

pub fn decode_record(bytes: &[u8]) -> Result<TrainingRecord, RecordError> {
    if bytes.len() != RECORD_LEN {
        return Err(RecordError::BadLength {
            got: bytes.len(),
            expected: RECORD_LEN,
        });
    }
    let mut c = Cursor { bytes, off: 0 };
    let black = c.read_u64();
    let white = c.read_u64();
    let side = c.read_u8();
    if side > 1 {
        return Err(RecordError::BadSide(side));
    }
    let action = c.read_u8();
    let q = c.read_f32();
    let result = c.read_f32();
    let mut legal_flags = [0u8; N_ACTION];
    c.read_bytes_into(&mut legal_flags);
    for &b in &legal_flags {
        if b != 0 && b != 1 {
            return Err(RecordError::BadLegalByte(b));
        }
    }
    let mut posteriors = [0f32; N_ACTION];
    for p in posteriors.iter_mut() {
        *p = c.read_f32();
    }
    Ok(TrainingRecord {
        black,
        white,
        side,
        action,
        q,
        result,
        legal_flags,
        posteriors,
    })
}

/// Infallible reader over an exactly [`RECORD_LEN`]-sized slice; the
/// length is validated before any field is read.
struct Cursor<'a> {
    bytes: &'a [u8],
    off: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> &'a [u8] {
        let s = &self.bytes[self.off..self.off + n];
        self.off += n;
        s
    }

    fn read_u8(&mut self) -> u8 {
        self.take(1)[0]
    }

    fn read_u64(&mut self) -> u64 {
        let b = self.take(8);
        u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
    }

    fn read_f32(&mut self) -> f32 {
        let b = self.take(4);
        f32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    fn read_bytes_into(&mut self, out: &mut [u8]) {
        out.copy_from_slice(self.take(out.len()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_len_is_packed() {
        assert_eq!(RECORD_LEN, 346);
    }

    #[test]
    fn round_trip_is_bit_exact() {
        let mut legal_flags = [0u8; N_ACTION];
        legal_flags[19] = 1;
        let mut posteriors = [0f32; N_ACTION];
        posteriors[19] = 1.0;
        let rec = TrainingRecord {
            black: (1u64 << 28) | (1u64 << 35),
            white: (1u64 << 27) | (1u64 << 36),
            side: 0,
            action: 19,
            q: -0.125,
            result: 0.5,
            legal_flags,
            posteriors,
        };
        let bytes = encode_record(&rec);
        let back = decode_record(&bytes).expect("decode");
        assert_eq!(back, rec);
        assert_eq!(back.q.to_bits(), rec.q.to_bits());
    }

    #[test]
    fn rejects_bad_bytes() {
        let rec = TrainingRecord {
            black: 0,
            white: 0,
            side: 0,
            action: 101,
            q: 0.0,
            result: 0.0,
            legal_flags: [0u8; N_ACTION],
            posteriors: [0f32; N_ACTION],
        };
        let mut bytes = encode_record(&rec);
        bytes[16] = 9;
        assert!(matches!(decode_record(&bytes), Err(RecordError::BadSide(9))));
        let mut bytes = encode_record(&rec);
        bytes[30] = 2;
        assert!(matches!(
            decode_record(&bytes),
            Err(RecordError::BadLegalByte(2))
        ));
        assert!(matches!(
            decode_record(&bytes[..10]),
            Err(RecordError::BadLength { .. })
        ));
    }
}
