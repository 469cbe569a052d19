//! Position representation and move engine.
//!
//! The centerpiece is [`Board`]: a validated bitboard position with an
//! incrementally maintained Zobrist hash, magic-bitboard attack queries,
//! staged legal move generation, make/unmake with full undo, and FEN, UCI
//! and SAN conversions.

mod attack_tables;
mod error;
mod fen;
mod geometry;
mod make_unmake;
mod movegen;
mod moves;
mod san;
mod state;
mod types;
mod zobrist;

#[cfg(test)]
mod proptests;

pub use error::{
    BoardFromFenError, CastlingError, CellError, FenError, MoveError, SanError, SquareError,
    UciMoveError, ValidateError,
};
pub use make_unmake::Undo;
pub use movegen::{MoveGenPreset, MoveList};
pub use moves::{Move, MoveKind, MoveStyle, UciMove};
pub use state::{Board, RawBoard};
pub use types::{
    Bitboard, BitboardIter, CastlingRights, CastlingSide, Cell, Color, File, Outcome, Piece, Rank,
    Square, Status, Verdict, VerdictFilter, VerdictKind,
};
