//! Chess support library: a correct, fast foundation for chess programs.
//!
//! Provides:
//! - Bitboard-based position representation with incremental Zobrist hashing
//! - Magic-bitboard attack tables and staged legal move generation
//! - FEN, UCI long algebraic and SAN parsing/formatting
//! - Game history with repetition and 50/75-move rule tracking
//! - Multi-stage chess clocks with forfeit detection
//! - An asynchronous driver for external UCI engines
//!
//! # Quick start
//!
//! ```
//! use castellan::board::Board;
//!
//! let mut board = Board::initial();
//! assert_eq!(board.gen_legal_moves(Default::default()).len(), 20);
//!
//! board.make_move_uci("e2e4").unwrap();
//! board.make_move_san("e5").unwrap();
//! assert_eq!(
//!     board.fen(),
//!     "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2"
//! );
//! ```
//!
//! # Playing a game
//!
//! ```
//! use castellan::game::Game;
//! use castellan::board::{Verdict, VerdictFilter};
//!
//! let mut game = Game::new();
//! game.push_uci_list("f2f3 e7e5 g2g4 d8h4").unwrap();
//! game.set_auto_outcome(VerdictFilter::Strict);
//! assert_eq!(game.outcome().verdict(), Verdict::Checkmate);
//! ```
//!
//! # Features
//!
//! - `serde` - Enable serialization for the leaf value types (`Square`,
//!   `Color`, `Piece`, `Cell`, `CastlingRights`, `Verdict`, `Status`)

// Enable pedantic lints with sensible domain-specific exceptions
#![warn(clippy::pedantic)]
// Bitboard hex literals are clearer without separators (bit patterns visible)
#![allow(clippy::unreadable_literal)]
// Index casts are ubiquitous and safe in chess (board indices, square indices)
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
// Large arrays are needed for move lists and attack tables
#![allow(clippy::large_stack_arrays)]
// Module-level documentation is sufficient for this codebase
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod board;
pub mod clock;
pub mod game;
pub mod uci;
