//! Property-based tests over randomly played games.

use proptest::prelude::*;
use rand::prelude::*;
use rand::Rng as _;

use super::movegen::MoveGenPreset;
use super::state::Board;

/// Play up to `num_moves` random legal moves starting from the initial
/// position.
fn random_board(seed: u64, num_moves: usize) -> Board {
    let mut board = Board::initial();
    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..num_moves {
        let moves = board.gen_legal_moves(MoveGenPreset::All);
        if moves.is_empty() {
            break;
        }
        let mv = moves[rng.gen_range(0..moves.len())];
        board.make_legal_move(mv);
    }
    board
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// make followed by unmake restores the position bit-for-bit,
    /// including the hash.
    #[test]
    fn prop_make_unmake_restores_state(seed in any::<u64>(), num_moves in 0..40usize) {
        let board = random_board(seed, num_moves);
        let mut scratch = board.clone();
        for mv in &board.gen_legal_moves(MoveGenPreset::All) {
            let undo = scratch.make_legal_move(*mv);
            scratch.unmake_move(&undo);
            prop_assert_eq!(scratch.raw(), board.raw());
            prop_assert_eq!(scratch.zobrist_hash(), board.zobrist_hash());
            prop_assert_eq!(scratch.bb_all(), board.bb_all());
        }
    }

    /// The incremental hash always equals the recomputed one.
    #[test]
    fn prop_hash_is_incremental(seed in any::<u64>(), num_moves in 0..40usize) {
        let board = random_board(seed, num_moves);
        prop_assert_eq!(board.zobrist_hash(), board.raw().zobrist_hash());
    }

    /// FEN round-trips through parse and emit.
    #[test]
    fn prop_fen_round_trip(seed in any::<u64>(), num_moves in 0..40usize) {
        let board = random_board(seed, num_moves);
        let fen = board.fen();
        let reparsed = Board::from_fen(&fen).unwrap();
        prop_assert_eq!(reparsed.raw(), board.raw());
        prop_assert_eq!(reparsed.fen(), fen);
    }

    /// The generation presets partition the full legal move set.
    #[test]
    fn prop_presets_partition(seed in any::<u64>(), num_moves in 0..40usize) {
        let board = random_board(seed, num_moves);
        let all = board.gen_legal_moves(MoveGenPreset::All);
        let captures = board.gen_legal_moves(MoveGenPreset::Capture);
        let quiet = board.gen_legal_moves(MoveGenPreset::SimpleNoPromote);
        let promote = board.gen_legal_moves(MoveGenPreset::SimplePromote);
        prop_assert_eq!(all.len(), captures.len() + quiet.len() + promote.len());
        for mv in &all {
            prop_assert!(
                captures.contains(*mv) || quiet.contains(*mv) || promote.contains(*mv)
            );
        }
    }

    /// Every generated semi-legal move passes semi-validation, and every
    /// legal one converts through SAN and back.
    #[test]
    fn prop_san_round_trip(seed in any::<u64>(), num_moves in 0..40usize) {
        let board = random_board(seed, num_moves);
        for mv in &board.gen_semilegal_moves(MoveGenPreset::All) {
            prop_assert!(mv.semi_validate(&board).is_ok());
        }
        for mv in &board.gen_legal_moves(MoveGenPreset::All) {
            let san = mv.san(&board).unwrap();
            prop_assert_eq!(super::san::legal_move_from_san(&san, &board).unwrap(), *mv);
        }
    }

    /// has_legal_moves agrees with full generation.
    #[test]
    fn prop_has_legal_moves(seed in any::<u64>(), num_moves in 0..60usize) {
        let board = random_board(seed, num_moves);
        prop_assert_eq!(
            board.has_legal_moves(),
            !board.gen_legal_moves(MoveGenPreset::All).is_empty()
        );
    }
}
