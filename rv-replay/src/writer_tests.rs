use crate::record::{TrainingRecord, RECORD_LEN};
use crate::writer::{read_records, GameWriter, ReplayError};
use rv_core::N_ACTION;
use std::io::Write;

fn sample_record(action: u8, result: f32) -> TrainingRecord {
    let mut legal_flags = [0u8; N_ACTION];
    let mut posteriors = [0f32; N_ACTION];
    if action < 64 {
        legal_flags[action as usize] = 1;
        posteriors[action as usize] = 1.0;
    }
    TrainingRecord {
        black: (1u64 << 28) | (1u64 << 35),
        white: (1u64 << 27) | (1u64 << 36),
        side: (result < 0.0) as u8,
        action,
        q: result / 2.0,
        result,
        legal_flags,
        posteriors,
    }
}

#[test]
fn write_then_read_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("worker_0.bin");

    let game_a = vec![sample_record(19, 0.25), sample_record(20, -0.25)];
    let game_b = vec![sample_record(101, 0.5)];

    let mut w = GameWriter::create(&path).expect("create");
    w.append_game(&game_a).expect("append");
    w.append_game(&game_b).expect("append");
    assert_eq!(w.finish().expect("finish"), 3);

    let back = read_records(&path).expect("read");
    assert_eq!(back.len(), 3);
    assert_eq!(back[0], game_a[0]);
    assert_eq!(back[1], game_a[1]);
    assert_eq!(back[2], game_b[0]);
}

#[test]
fn create_refuses_existing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("worker_0.bin");
    std::fs::write(&path, b"existing").expect("seed file");
    assert!(GameWriter::create(&path).is_err());
}

#[test]
fn read_rejects_partial_records() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("worker_0.bin");
    let mut f = std::fs::File::create(&path).expect("create");
    f.write_all(&vec![0u8; RECORD_LEN + 10]).expect("write");
    drop(f);
    assert!(matches!(
        read_records(&path),
        Err(ReplayError::TruncatedFile { len }) if len == (RECORD_LEN + 10) as u64
    ));
}
