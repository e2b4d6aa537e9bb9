use crate::action::Action;
use crate::board::{Board, Side};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn assert_invariants(b: &Board) {
    assert_eq!(b.black() & b.white(), 0, "masks overlap");
    assert_eq!(
        (b.black() | b.white()).count_ones() as u8,
        b.disks(),
        "disk count out of sync"
    );
}

#[test]
fn start_position() {
    let b = Board::new();
    assert_eq!(b.disks(), 4);
    assert_eq!(b.count(Side::Black), 2);
    assert_eq!(b.count(Side::White), 2);
    assert_eq!(b.cell(3, 3), Some(Side::White)); // d4
    assert_eq!(b.cell(4, 4), Some(Side::White)); // e5
    assert_eq!(b.cell(4, 3), Some(Side::Black)); // e4
    assert_eq!(b.cell(3, 4), Some(Side::Black)); // d5
    assert_invariants(&b);
}

#[test]
fn black_opening_moves() {
    let b = Board::new();
    assert_eq!(b.legal_actions(Side::Black), vec![19, 26, 37, 44]);
    assert_eq!(b.legal_actions(Side::White), vec![20, 29, 34, 43]);
    assert!(b.is_legal(Action::Cell(19), Side::Black));
    assert!(!b.is_legal(Action::Cell(20), Side::Black));
    assert!(!b.is_legal(Action::Pass, Side::Black));
    assert!(!b.is_legal(Action::Cell(27), Side::Black)); // occupied
}

#[test]
fn opening_move_flips_one_disk() {
    let mut b = Board::new();
    b.place_disk(Action::Cell(19), Side::Black).expect("d3 is legal");
    assert_eq!(b.disks(), 5);
    assert_eq!(b.count(Side::Black), 4);
    assert_eq!(b.count(Side::White), 1);
    assert_eq!(b.cell(3, 3), Some(Side::Black)); // d4 flipped
    assert_invariants(&b);
}

#[test]
fn illegal_placement_is_rejected_and_leaves_board_unchanged() {
    let mut b = Board::new();
    let before = b;
    assert!(b.place_disk(Action::Cell(0), Side::Black).is_err());
    assert!(b.place_disk(Action::Cell(27), Side::Black).is_err());
    assert!(b.place_disk(Action::Pass, Side::Black).is_err());
    assert!(b.place_disk(Action::Invalid, Side::Black).is_err());
    assert_eq!(b, before);
}

#[test]
fn pass_is_legal_only_without_placements() {
    // Black in a corner, white far away: nobody can move.
    let b = Board::from_masks(1, 1u64 << 63).expect("disjoint");
    assert!(b.legal_actions(Side::Black).is_empty());
    assert!(b.legal_actions(Side::White).is_empty());
    assert!(b.is_legal(Action::Pass, Side::Black));
    assert!(b.is_legal(Action::Pass, Side::White));
}

#[test]
fn retract_needs_two_plies() {
    let mut b = Board::new();
    assert!(!b.is_legal(Action::Retract, Side::Black));
    b.place_disk(Action::Cell(19), Side::Black).expect("legal");
    assert!(!b.is_legal(Action::Retract, Side::White));
    b.place_disk(Action::Cell(18), Side::White).expect("legal");
    assert!(b.is_legal(Action::Retract, Side::Black));
}

#[test]
fn from_masks_rejects_overlap() {
    assert!(Board::from_masks(3, 1).is_err());
}

#[test]
fn score_perspectives() {
    let b = Board::from_masks(0b111, 1u64 << 63).expect("disjoint");
    assert!((b.score() - 2.0 / 64.0).abs() < 1e-6);
    assert!((b.score_for(Side::Black) - 2.0 / 64.0).abs() < 1e-6);
    assert!((b.score_for(Side::White) + 2.0 / 64.0).abs() < 1e-6);
}

#[test]
fn edge_moves_do_not_wrap() {
    // White fills row 1 between black corners except one gap; a flip along
    // the top edge must not spill into row 2.
    let black = 1u64; // a1
    let white = 0b0111_1110u64 & !(1u64 << 4); // b1,c1,d1,f1,g1 (e1 empty)
    let b = Board::from_masks(black, white).expect("disjoint");
    let legal = b.legal_board(Side::Black);
    assert_eq!(legal & 0xff, 1u64 << 4, "only e1 closes a run on row 1");
    assert_eq!(legal & !0xffu64 & (1u64 << 8), 0, "no wrap into a2");
}

#[test]
fn random_playout_preserves_invariants() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for _ in 0..20 {
        let mut b = Board::new();
        let mut side = Side::Black;
        let mut passes = 0;
        while passes < 2 && !b.is_full() {
            let moves = b.legal_actions(side);
            if moves.is_empty() {
                passes += 1;
            } else {
                passes = 0;
                let pick = moves[rng.gen_range(0..moves.len())];
                let before_disks = b.disks();
                let before_own = b.count(side);
                b.place_disk(Action::Cell(pick), side).expect("legal move");
                assert_eq!(b.disks(), before_disks + 1);
                assert!(b.count(side) > before_own, "mover gains disks");
                assert_invariants(&b);
            }
            side = side.opponent();
        }
        // Finished games stay in score range.
        assert!(b.score() >= -1.0 && b.score() <= 1.0);
    }
}
