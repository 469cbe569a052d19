//! End-to-end game scenarios exercising the board, SAN, game history and
//! outcome layers together.

use castellan::board::{
    Board, Color, Move, MoveGenPreset, Outcome, Verdict, VerdictFilter,
};
use castellan::game::{Game, GameOutcomeStyle, GameStyle, MoveNumberStyle};

#[test]
fn legal_mate_line() {
    // The classic Légal trap, played in SAN, checked via outcomes.
    let sans = [
        "e4", "e5", "Nf3", "d6", "Bc4", "Bg4", "Nc3", "g6", "Nxe5", "Bxd1", "Bxf7+", "Ke7",
        "Nd5#",
    ];
    let mut game = Game::new();
    for san in sans {
        assert!(!game.is_finished());
        game.push_move_san(san).unwrap();
        game.set_auto_outcome(VerdictFilter::Strict);
    }
    assert_eq!(
        game.outcome(),
        Outcome::win(Verdict::Checkmate, Color::White).unwrap()
    );

    let board = game.cur_board();
    assert!(board.is_check());
    assert!(!board.has_legal_moves());
    assert_eq!(board.side(), Color::Black);
    assert_eq!(board.move_number(), 7);
    // The final position round-trips through FEN.
    let reparsed = Board::from_fen(&board.fen()).unwrap();
    assert_eq!(reparsed.zobrist_hash(), board.zobrist_hash());
}

#[test]
fn stalemate_and_insufficient_material() {
    let board = Board::from_fen("7K/8/5n2/5n2/8/8/7k/8 w - - 0 1").unwrap();
    assert_eq!(board.calc_outcome().verdict(), Verdict::Stalemate);

    let board = Board::from_fen("7K/8/5n2/8/8/8/7k/8 w - - 0 1").unwrap();
    assert_eq!(
        board.calc_outcome().verdict(),
        Verdict::InsufficientMaterial
    );
}

#[test]
fn san_round_trip_through_random_game() {
    // Every legal move must survive SAN emission and re-parsing at every
    // point of a long scripted game.
    let ucis = "e2e4 c7c5 g1f3 d7d6 d2d4 c5d4 f3d4 g8f6 b1c3 a7a6 \
                c1e3 e7e5 d4b3 c8e6 f2f3 f8e7 d1d2 e8g8 e1c1 b8d7";
    let mut game = Game::new();
    for uci in ucis.split_whitespace() {
        let board = game.cur_board();
        let mv = Move::from_uci(uci, board).unwrap();
        let san = mv.san(board).unwrap();
        assert_eq!(Move::from_san(&san, board).unwrap(), mv, "san {san}");
        game.push_move(mv).unwrap();
    }
    assert_eq!(game.len(), 20);
}

#[test]
fn san_candidates_round_trip_all_moves() {
    let fens = [
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
        "rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 2",
    ];
    for fen in fens {
        let board = Board::from_fen(fen).unwrap();
        for mv in &board.gen_legal_moves(MoveGenPreset::All) {
            let san = mv.san(&board).unwrap();
            assert_eq!(
                Move::from_san(&san, &board).unwrap(),
                *mv,
                "{fen}: {san}"
            );
        }
    }
}

#[test]
fn unmake_restores_every_position() {
    let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    let board = Board::from_fen(fen).unwrap();
    let mut scratch = board.clone();
    for mv in &board.gen_legal_moves(MoveGenPreset::All) {
        let undo = scratch.make_legal_move(*mv);
        scratch.unmake_move(&undo);
        assert_eq!(scratch.raw(), board.raw(), "{mv}");
        assert_eq!(scratch.zobrist_hash(), board.zobrist_hash(), "{mv}");
    }
}

#[test]
fn zobrist_matches_repetition_equality() {
    // Transpose into the same position along two different move orders.
    let mut a = Game::new();
    a.push_uci_list("g1f3 g8f6 b1c3 b8c6").unwrap();
    let mut b = Game::new();
    b.push_uci_list("b1c3 b8c6 g1f3 g8f6").unwrap();

    let mut raw_a = a.cur_board().raw();
    let mut raw_b = b.cur_board().raw();
    raw_a.move_counter = 0;
    raw_b.move_counter = 0;
    raw_a.move_number = 0;
    raw_b.move_number = 0;
    assert_eq!(raw_a, raw_b);
    assert_eq!(
        a.cur_board().zobrist_hash(),
        b.cur_board().zobrist_hash()
    );
}

#[test]
fn pgn_like_move_text() {
    let mut game = Game::new();
    game.push_uci_list("e2e4 e7e5 g1f3 b8c6 f1b5").unwrap();
    let style = GameStyle {
        move_number: MoveNumberStyle {
            enabled: true,
            start_from: None,
        },
        outcome: GameOutcomeStyle::Show,
        ..GameStyle::default()
    };
    assert_eq!(
        game.styled(style).unwrap(),
        "1. e4 e5 2. Nf3 Nc6 3. Bb5 *"
    );
}

#[test]
fn move_text_from_custom_position() {
    // A game starting from a black-to-move position numbers correctly.
    let mut game =
        Game::with_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 3").unwrap();
    game.push_uci_list("e7e5 g1f3").unwrap();
    let style = GameStyle {
        move_number: MoveNumberStyle {
            enabled: true,
            start_from: None,
        },
        ..GameStyle::default()
    };
    assert_eq!(game.styled(style).unwrap(), "3... e5 4. Nf3");
}

#[test]
fn ep_square_normalization() {
    // e3 implies a white pawn on e4 that just double-moved, with e3 free.
    // Both hold here, so the field survives.
    let board =
        Board::from_fen("rnbqkbnr/pppp1ppp/4p3/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1")
            .unwrap();
    assert!(board.ep_source().is_some());

    // No pawn on the implied square: cleared silently.
    let board =
        Board::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq e3 0 1").unwrap();
    assert_eq!(board.ep_source(), None);
}

#[test]
fn fifty_and_seventyfive_move_boundaries() {
    for (counter, verdict) in [
        (99, Verdict::Running),
        (100, Verdict::Moves50),
        (149, Verdict::Moves50),
        (150, Verdict::Moves75),
    ] {
        let fen = format!("8/R7/2r5/8/5k1K/8/8/8 w - - {counter} 1");
        let board = Board::from_fen(&fen).unwrap();
        assert_eq!(board.calc_outcome().verdict(), verdict, "counter {counter}");
    }
}

#[test]
fn strict_filter_commits_seventyfive_but_not_fifty() {
    let mut game = Game::with_fen("8/R7/2r5/8/5k1K/8/8/8 w - - 100 1").unwrap();
    assert!(!game.set_auto_outcome(VerdictFilter::Strict).is_finished());
    assert!(game.set_auto_outcome(VerdictFilter::Relaxed).is_finished());
    assert_eq!(game.outcome().verdict(), Verdict::Moves50);

    let mut game = Game::with_fen("8/R7/2r5/8/5k1K/8/8/8 w - - 150 1").unwrap();
    assert!(game.set_auto_outcome(VerdictFilter::Strict).is_finished());
    assert_eq!(game.outcome().verdict(), Verdict::Moves75);
}
