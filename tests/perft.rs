//! Perft: exhaustive move-generation counts on the standard test
//! positions. Any divergence points at a generator, legality or
//! make/unmake bug.

use castellan::board::{Board, MoveGenPreset};

fn perft(board: &mut Board, depth: usize) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = board.gen_legal_moves(MoveGenPreset::All);
    if depth == 1 {
        return moves.len() as u64;
    }
    let mut nodes = 0;
    for mv in &moves {
        let undo = board.make_legal_move(*mv);
        nodes += perft(board, depth - 1);
        board.unmake_move(&undo);
    }
    nodes
}

fn check(fen: &str, expected: &[u64]) {
    let mut board = Board::from_fen(fen).unwrap();
    for (i, &nodes) in expected.iter().enumerate() {
        assert_eq!(perft(&mut board, i + 1), nodes, "{fen} depth {}", i + 1);
    }
    // The walk must leave the position untouched.
    assert_eq!(board.fen(), fen);
}

#[test]
fn perft_initial() {
    check(
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        &[20, 400, 8902, 197_281],
    );
}

#[test]
fn perft_kiwipete() {
    check(
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        &[48, 2039, 97_862],
    );
}

#[test]
fn perft_endgame() {
    check(
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        &[14, 191, 2812, 43_238],
    );
}

#[test]
fn perft_promotion_heavy() {
    check(
        "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
        &[6, 264, 9467],
    );
}

#[test]
fn perft_talkchess() {
    check(
        "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        &[44, 1486, 62_379],
    );
}

#[test]
fn perft_steven_edwards() {
    check(
        "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
        &[46, 2079, 89_890],
    );
}
