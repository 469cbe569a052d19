//! Game history: move stack, repetition tracking, outcome policy and
//! read-only navigation.

use std::collections::HashMap;
use std::fmt;

use crate::board::{
    Board, BoardFromFenError, Move, MoveError, MoveStyle, Outcome, RawBoard, SanError, UciMove,
    UciMoveError, Undo, Verdict, VerdictFilter,
};

/// Multiset of positions for repetition detection.
///
/// Repetition is defined over piece placement, side to move, castling
/// rights and en passant, so the key is the raw board with both move
/// counters zeroed.
#[derive(Clone, Debug, Default)]
pub struct RepetitionTable {
    counts: HashMap<RawBoard, u32>,
}

fn repetition_key(board: &Board) -> RawBoard {
    let mut raw = board.raw();
    raw.move_counter = 0;
    raw.move_number = 0;
    raw
}

impl RepetitionTable {
    #[must_use]
    pub fn new() -> Self {
        RepetitionTable {
            counts: HashMap::new(),
        }
    }

    pub fn push(&mut self, board: &Board) {
        *self.counts.entry(repetition_key(board)).or_insert(0) += 1;
    }

    pub fn pop(&mut self, board: &Board) {
        let key = repetition_key(board);
        if let Some(count) = self.counts.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&key);
            }
        }
    }

    /// How many times the board's position has been recorded.
    #[must_use]
    pub fn count(&self, board: &Board) -> u32 {
        self.counts
            .get(&repetition_key(board))
            .copied()
            .unwrap_or(0)
    }
}

/// Error from [`Game::push_uci_list`], carrying the failing move's
/// 1-based position in the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushUciListError {
    pub index: usize,
    pub error: UciMoveError,
}

impl fmt::Display for PushUciListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "push uci move #{}: {}", self.index, self.error)
    }
}

impl std::error::Error for PushUciListError {}

/// Move number rendering in [`GameStyle`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MoveNumberStyle {
    pub enabled: bool,
    /// Override the first move number instead of taking it from the
    /// starting position.
    pub start_from: Option<u32>,
}

/// When to append the outcome marker to styled move text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GameOutcomeStyle {
    #[default]
    Hide,
    FinishedOnly,
    Show,
}

/// Options for [`Game::styled`] move-text rendering.
#[derive(Clone, Copy, Debug)]
pub struct GameStyle {
    pub mv: MoveStyle,
    pub move_number: MoveNumberStyle,
    pub outcome: GameOutcomeStyle,
}

impl Default for GameStyle {
    fn default() -> Self {
        GameStyle {
            mv: MoveStyle::San,
            move_number: MoveNumberStyle::default(),
            outcome: GameOutcomeStyle::default(),
        }
    }
}

/// Per-move comments for [`Game::styled_ext`]: `comments[0]` precedes the
/// first move, `comments[i]` follows move `i`.
#[derive(Clone, Debug, Default)]
pub struct GameAnnotations {
    pub comments: Vec<Vec<String>>,
}

/// A chess game: an immutable starting position, the current board, the
/// move stack with undo records, a repetition table and the committed
/// outcome.
#[derive(Clone, Debug)]
pub struct Game {
    start: RawBoard,
    board: Board,
    repeat: RepetitionTable,
    stack: Vec<Undo>,
    outcome: Outcome,
}

impl Game {
    /// A game from the standard starting position.
    #[must_use]
    pub fn new() -> Game {
        Game::with_position(&Board::initial())
    }

    /// A game starting at an arbitrary position.
    #[must_use]
    pub fn with_position(board: &Board) -> Game {
        let mut game = Game {
            start: board.raw(),
            board: board.clone(),
            repeat: RepetitionTable::new(),
            stack: Vec::new(),
            outcome: Outcome::running(),
        };
        game.repeat.push(&game.board);
        game
    }

    /// A game starting at the position described by `fen`.
    pub fn with_fen(fen: &str) -> Result<Game, BoardFromFenError> {
        Ok(Game::with_position(&Board::from_fen(fen)?))
    }

    /// A game built from a starting position and a space-separated list of
    /// UCI moves.
    pub fn from_uci_list(board: &Board, ucis: &str) -> Result<Game, PushUciListError> {
        let mut game = Game::with_position(board);
        game.push_uci_list(ucis)?;
        Ok(game)
    }

    /// The starting position.
    #[must_use]
    pub fn start_pos(&self) -> RawBoard {
        self.start
    }

    /// The current position as a raw descriptor.
    #[must_use]
    pub fn cur_pos(&self) -> RawBoard {
        self.board.raw()
    }

    /// The current position. Updates automatically after pushes and pops.
    #[must_use]
    pub fn cur_board(&self) -> &Board {
        &self.board
    }

    /// Number of moves played.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// The move at `index` (0-based) in the played sequence.
    #[must_use]
    pub fn move_at(&self, index: usize) -> Move {
        self.stack[index].mv()
    }

    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.outcome.is_finished()
    }

    /// Reset the outcome to running.
    pub fn clear_outcome(&mut self) {
        self.outcome = Outcome::running();
    }

    /// Overwrite the outcome unconditionally.
    pub fn set_outcome(&mut self, outcome: Outcome) {
        self.outcome = outcome;
    }

    /// Compute the outcome of the current position, including the
    /// history-dependent repetition verdicts. Does not commit anything.
    #[must_use]
    pub fn calc_outcome(&self) -> Outcome {
        let outcome = self.board.calc_outcome();
        if outcome.is_finished() && outcome.passes(VerdictFilter::Strict) {
            return outcome;
        }
        let repetitions = self.repeat.count(&self.board);
        if repetitions >= 5 {
            return Outcome::draw(Verdict::Repeat5).unwrap();
        }
        if repetitions >= 3 {
            return Outcome::draw(Verdict::Repeat3).unwrap();
        }
        outcome
    }

    /// Compute the outcome and commit it iff the game is not already
    /// finished and the verdict passes `filter`. Returns the game outcome
    /// after the update.
    pub fn set_auto_outcome(&mut self, filter: VerdictFilter) -> Outcome {
        if !self.outcome.is_finished() {
            let outcome = self.calc_outcome();
            if outcome.is_finished() && outcome.passes(filter) {
                self.outcome = outcome;
            }
        }
        self.outcome
    }

    fn finish_push(&mut self, undo: Undo) {
        self.repeat.push(&self.board);
        self.stack.push(undo);
    }

    /// Push a move the caller knows to be legal.
    pub fn push_legal_move(&mut self, mv: Move) {
        let undo = self.board.make_legal_move(mv);
        self.finish_push(undo);
    }

    /// Push a move known to be semi-legal; fails if it exposes the king.
    pub fn push_semilegal_move(&mut self, mv: Move) -> Result<(), MoveError> {
        let undo = self.board.make_semilegal_move(mv)?;
        self.finish_push(undo);
        Ok(())
    }

    /// Validate and push a move.
    pub fn push_move(&mut self, mv: Move) -> Result<(), MoveError> {
        let undo = self.board.make_move(mv)?;
        self.finish_push(undo);
        Ok(())
    }

    /// Convert and push a [`UciMove`].
    pub fn push_uci_move(&mut self, mv: UciMove) -> Result<(), UciMoveError> {
        let undo = self.board.make_uci_move(mv)?;
        self.finish_push(undo);
        Ok(())
    }

    /// Parse and push a move in UCI notation.
    pub fn push_move_uci(&mut self, s: &str) -> Result<(), UciMoveError> {
        let undo = self.board.make_move_uci(s)?;
        self.finish_push(undo);
        Ok(())
    }

    /// Parse and push a move in SAN.
    pub fn push_move_san(&mut self, s: &str) -> Result<(), SanError> {
        let undo = self.board.make_move_san(s)?;
        self.finish_push(undo);
        Ok(())
    }

    /// Push a whitespace-separated list of UCI moves. Returns the number
    /// of moves pushed; on error, the moves before the failing one stay
    /// applied.
    pub fn push_uci_list(&mut self, ucis: &str) -> Result<usize, PushUciListError> {
        let mut count = 0;
        for uci in ucis.split_whitespace() {
            self.push_move_uci(uci).map_err(|error| PushUciListError {
                index: count + 1,
                error,
            })?;
            count += 1;
        }
        Ok(count)
    }

    /// Take back the last move. Clears any committed outcome.
    pub fn pop(&mut self) -> Option<Move> {
        let undo = self.stack.pop()?;
        self.repeat.pop(&self.board);
        self.clear_outcome();
        self.board.unmake_move(&undo);
        Some(undo.mv())
    }

    /// The played moves in UCI notation, space-separated.
    #[must_use]
    pub fn uci_list(&self) -> String {
        let mut res = String::new();
        for (i, undo) in self.stack.iter().enumerate() {
            if i != 0 {
                res.push(' ');
            }
            res.push_str(&undo.mv().to_string());
        }
        res
    }

    /// A read-only cursor over the game, initially at the last position.
    ///
    /// The walker owns a private board, so walking never affects the game.
    /// Do not modify the game while walkers exist; the borrow checker
    /// enforces this.
    #[must_use]
    pub fn walk(&self) -> Walker<'_> {
        Walker {
            board: self.board.clone(),
            stack: &self.stack,
            pos: self.stack.len(),
        }
    }

    /// Render the move text with the given style.
    pub fn styled(&self, style: GameStyle) -> Result<String, SanError> {
        self.styled_ext(style, &GameAnnotations::default())
    }

    /// Render the move text with styles and inline `{...}` comments.
    pub fn styled_ext(
        &self,
        style: GameStyle,
        annotations: &GameAnnotations,
    ) -> Result<String, SanError> {
        use std::fmt::Write as _;

        fn add_comments(out: &mut String, comments: &[String]) {
            for (i, comment) in comments.iter().enumerate() {
                if i != 0 {
                    out.push(' ');
                }
                let _ = write!(out, "{{{}}}", comment.replace('}', ""));
            }
        }

        let mut out = String::new();
        let mut first = true;

        if let Some(head) = annotations.comments.first() {
            if !head.is_empty() {
                add_comments(&mut out, head);
                first = false;
            }
        }

        if !self.stack.is_empty() {
            let mut walker = self.walk();
            walker.first();
            let mut move_number = match style.move_number.start_from {
                Some(n) => n,
                None => walker.board().move_number(),
            };
            let mut must_number = true;
            for (i, undo) in self.stack.iter().enumerate() {
                if !first {
                    out.push(' ');
                }
                first = false;
                if style.move_number.enabled {
                    if walker.board().side() == crate::board::Color::White {
                        let _ = write!(out, "{move_number}. ");
                    } else if must_number {
                        let _ = write!(out, "{move_number}... ");
                    }
                }
                must_number = false;
                let rendered = undo.mv().styled(walker.board(), style.mv)?;
                out.push_str(&rendered);
                if let Some(comments) = annotations.comments.get(i + 1) {
                    if !comments.is_empty() {
                        out.push(' ');
                        add_comments(&mut out, comments);
                        must_number = true;
                    }
                }
                if walker.board().side() == crate::board::Color::Black {
                    move_number += 1;
                }
                walker.next();
            }
        }

        if style.outcome == GameOutcomeStyle::Show
            || (style.outcome == GameOutcomeStyle::FinishedOnly && self.outcome.is_finished())
        {
            if !first {
                out.push(' ');
            }
            let _ = write!(out, "{}", self.outcome.status());
        }

        Ok(out)
    }

    /// Whether two games start from the same position, played the same
    /// moves and carry the same outcome.
    #[must_use]
    pub fn eq_moves(&self, other: &Game) -> bool {
        self.start == other.start
            && self.outcome == other.outcome
            && self.stack.len() == other.stack.len()
            && self
                .stack
                .iter()
                .zip(&other.stack)
                .all(|(a, b)| a.mv() == b.mv())
    }
}

impl Default for Game {
    fn default() -> Self {
        Game::new()
    }
}

/// A read-only cursor over a game's move list.
///
/// Maintains its own board and a position index in `[0, len]`; moving the
/// cursor replays or unwinds moves on the private board.
pub struct Walker<'a> {
    board: Board,
    stack: &'a [Undo],
    pos: usize,
}

impl Walker<'_> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// The cursor position: the number of moves currently applied.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The board at the cursor. Updates automatically on navigation.
    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    fn do_prev(&mut self) {
        self.pos -= 1;
        self.board.unmake_move(&self.stack[self.pos]);
    }

    fn do_next(&mut self) {
        let _ = self.board.make_legal_move(self.stack[self.pos].mv());
        self.pos += 1;
    }

    /// Step one move forward. Returns `false` at the end.
    pub fn next(&mut self) -> bool {
        if self.pos == self.stack.len() {
            return false;
        }
        self.do_next();
        true
    }

    /// Step one move back. Returns `false` at the start.
    pub fn prev(&mut self) -> bool {
        if self.pos == 0 {
            return false;
        }
        self.do_prev();
        true
    }

    /// Jump to an absolute position. Returns `false` when out of range.
    pub fn jump(&mut self, pos: usize) -> bool {
        if pos > self.stack.len() {
            return false;
        }
        while self.pos > pos {
            self.do_prev();
        }
        while self.pos < pos {
            self.do_next();
        }
        true
    }

    /// Jump to the starting position.
    pub fn first(&mut self) {
        self.jump(0);
    }

    /// Jump past the last move.
    pub fn last(&mut self) {
        self.jump(self.stack.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_round_trip() {
        let mut game = Game::new();
        game.push_uci_list("e2e4 e7e5 g1f3").unwrap();
        assert_eq!(game.len(), 3);
        assert_eq!(game.uci_list(), "e2e4 e7e5 g1f3");
        assert_eq!(game.pop().unwrap().to_string(), "g1f3");
        assert_eq!(game.len(), 2);
        game.pop();
        game.pop();
        assert!(game.is_empty());
        assert_eq!(game.pop(), None);
        assert_eq!(game.cur_pos(), game.start_pos());
    }

    #[test]
    fn test_push_uci_list_error_index() {
        let mut game = Game::new();
        let err = game.push_uci_list("e2e4 e7e5 e4e6").unwrap_err();
        assert_eq!(err.index, 3);
        assert_eq!(game.len(), 2);
    }

    #[test]
    fn test_threefold_and_fivefold() {
        const CYCLE: &str = "g1f3 b8c6 f3g1 c6b8";
        let mut game = Game::new();

        // The starting position counts as its first occurrence; each cycle
        // brings it back once more.
        game.push_uci_list(CYCLE).unwrap();
        assert_eq!(game.calc_outcome().verdict(), Verdict::Running);
        game.push_uci_list(CYCLE).unwrap();
        assert_eq!(game.calc_outcome().verdict(), Verdict::Repeat3);
        game.push_uci_list(CYCLE).unwrap();
        assert_eq!(game.calc_outcome().verdict(), Verdict::Repeat3);

        // Relaxed commits it, strict does not.
        assert!(!game
            .clone()
            .set_auto_outcome(VerdictFilter::Strict)
            .is_finished());
        let mut relaxed = game.clone();
        assert!(relaxed.set_auto_outcome(VerdictFilter::Relaxed).is_finished());
        assert_eq!(relaxed.outcome().verdict(), Verdict::Repeat3);

        // The fifth occurrence upgrades to the strict verdict.
        game.push_uci_list(CYCLE).unwrap();
        game.push_uci_list(CYCLE).unwrap();
        assert_eq!(game.calc_outcome().verdict(), Verdict::Repeat5);
        assert!(game.set_auto_outcome(VerdictFilter::Strict).is_finished());
    }

    #[test]
    fn test_pop_clears_repetition() {
        let mut game = Game::new();
        for _ in 0..3 {
            game.push_uci_list("g1f3 b8c6 f3g1 c6b8").unwrap();
        }
        assert_eq!(game.calc_outcome().verdict(), Verdict::Repeat3);
        game.pop();
        game.push_move_uci("c6b8").unwrap();
        // Same position again; the count must not have drifted.
        assert_eq!(game.calc_outcome().verdict(), Verdict::Repeat3);
    }

    #[test]
    fn test_fifty_move_rule_scenario() {
        let mut game = Game::with_fen("8/R7/2r5/8/5k1K/8/8/8 w - - 98 1").unwrap();
        game.push_uci_list("a7a8 c6c5 a8a7 c5c6").unwrap();
        assert_eq!(game.cur_board().move_counter(), 102);
        assert_eq!(game.calc_outcome().verdict(), Verdict::Moves50);
    }

    #[test]
    fn test_checkmate_takes_priority() {
        let mut game = Game::new();
        game.push_uci_list("f2f3 e7e5 g2g4 d8h4").unwrap();
        let outcome = game.set_auto_outcome(VerdictFilter::Force);
        assert_eq!(outcome.verdict(), Verdict::Checkmate);
        assert_eq!(outcome.side(), Some(crate::board::Color::Black));
        assert!(game.is_finished());
        // Finished games keep their outcome.
        let outcome2 = game.set_auto_outcome(VerdictFilter::Relaxed);
        assert_eq!(outcome, outcome2);
    }

    #[test]
    fn test_pop_clears_outcome() {
        let mut game = Game::new();
        game.push_uci_list("f2f3 e7e5 g2g4 d8h4").unwrap();
        game.set_auto_outcome(VerdictFilter::Force);
        assert!(game.is_finished());
        game.pop();
        assert!(!game.is_finished());
        assert!(game.cur_board().has_legal_moves());
    }

    #[test]
    fn test_walker_navigation() {
        let mut game = Game::new();
        game.push_uci_list("e2e4 e7e5 g1f3 b8c6").unwrap();
        let final_fen = game.cur_board().fen();

        let mut walker = game.walk();
        assert_eq!(walker.pos(), 4);
        assert_eq!(walker.board().fen(), final_fen);

        walker.first();
        assert_eq!(walker.pos(), 0);
        assert_eq!(walker.board().raw(), game.start_pos());

        assert!(walker.next());
        assert!(walker.board().fen().contains("4P3"));

        walker.last();
        assert_eq!(walker.board().fen(), final_fen);
        assert!(!walker.next());

        assert!(walker.jump(2));
        assert_eq!(walker.pos(), 2);
        assert!(!walker.jump(5));

        // The game itself is untouched.
        drop(walker);
        assert_eq!(game.cur_board().fen(), final_fen);
    }

    #[test]
    fn test_styled_move_text() {
        let mut game = Game::new();
        game.push_uci_list("e2e4 e7e5 g1f3").unwrap();
        let style = GameStyle {
            mv: MoveStyle::San,
            move_number: MoveNumberStyle {
                enabled: true,
                start_from: None,
            },
            outcome: GameOutcomeStyle::Hide,
        };
        assert_eq!(game.styled(style).unwrap(), "1. e4 e5 2. Nf3");
    }

    #[test]
    fn test_styled_outcome_marker() {
        let mut game = Game::new();
        game.push_uci_list("f2f3 e7e5 g2g4 d8h4").unwrap();
        game.set_auto_outcome(VerdictFilter::Force);
        let style = GameStyle {
            mv: MoveStyle::San,
            move_number: MoveNumberStyle {
                enabled: true,
                start_from: None,
            },
            outcome: GameOutcomeStyle::FinishedOnly,
        };
        assert_eq!(
            game.styled(style).unwrap(),
            "1. f3 e5 2. g4 Qh4# 0-1"
        );
    }

    #[test]
    fn test_styled_comments() {
        let mut game = Game::new();
        game.push_uci_list("e2e4 c7c5").unwrap();
        let style = GameStyle {
            mv: MoveStyle::San,
            move_number: MoveNumberStyle {
                enabled: true,
                start_from: None,
            },
            outcome: GameOutcomeStyle::Hide,
        };
        let annotations = GameAnnotations {
            comments: vec![
                vec![],
                vec!["best by test".to_string()],
                vec!["the Sicilian }".to_string()],
            ],
        };
        assert_eq!(
            game.styled_ext(style, &annotations).unwrap(),
            "1. e4 {best by test} 1... c5 {the Sicilian }"
        );
    }

    #[test]
    fn test_clone_is_deep() {
        let mut game = Game::new();
        game.push_uci_list("e2e4").unwrap();
        let mut copy = game.clone();
        copy.push_move_uci("e7e5").unwrap();
        assert_eq!(game.len(), 1);
        assert_eq!(copy.len(), 2);
        assert!(!game.eq_moves(&copy));
        copy.pop();
        assert!(game.eq_moves(&copy));
    }
}
