//! Error types for board operations.

use std::fmt;

use super::types::{Color, Square};

/// Error type for square and file/rank parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SquareError {
    /// Not a file letter `a`-`h`.
    BadFile { ch: char },
    /// Not a rank digit `1`-`8`.
    BadRank { ch: char },
    /// Square notation must be exactly two characters.
    BadLength { len: usize },
}

impl fmt::Display for SquareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SquareError::BadFile { ch } => write!(f, "unexpected file char {ch:?}"),
            SquareError::BadRank { ch } => write!(f, "unexpected rank char {ch:?}"),
            SquareError::BadLength { len } => {
                write!(f, "square must be 2 characters, found {len}")
            }
        }
    }
}

impl std::error::Error for SquareError {}

/// Error type for color, piece and cell parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellError {
    /// Not `w` or `b`.
    BadColor { ch: char },
    /// Not a piece letter.
    BadPiece { ch: char },
    /// Not a FEN cell character.
    BadCell { ch: char },
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellError::BadColor { ch } => write!(f, "unexpected color char {ch:?}"),
            CellError::BadPiece { ch } => write!(f, "unexpected piece char {ch:?}"),
            CellError::BadCell { ch } => write!(f, "unexpected cell char {ch:?}"),
        }
    }
}

impl std::error::Error for CellError {}

/// Error type for castling rights parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastlingError {
    /// Castling rights string must not be empty (use `-`).
    Empty,
    /// Not one of `KQkq`.
    BadChar { ch: char },
    /// The same right appears twice.
    DuplicateChar { ch: char },
}

impl fmt::Display for CastlingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CastlingError::Empty => write!(f, "castling rights string is empty"),
            CastlingError::BadChar { ch } => {
                write!(f, "unexpected castling rights char {ch:?}")
            }
            CastlingError::DuplicateChar { ch } => {
                write!(f, "duplicate castling rights char {ch:?}")
            }
        }
    }
}

impl std::error::Error for CastlingError {}

/// Error type for FEN parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    /// FEN must be ASCII.
    NonAscii,
    /// A required field is missing.
    MissingField { field: &'static str },
    /// Trailing tokens after the move number.
    ExtraData,
    /// Bad piece placement section.
    BadPlacement { message: String },
    /// Bad side-to-move field.
    BadSide(CellError),
    /// Bad castling field.
    BadCastling(CastlingError),
    /// Bad en-passant field.
    BadEnPassant { message: String },
    /// Bad halfmove-clock field.
    BadMoveCounter { token: String },
    /// Bad fullmove-number field.
    BadMoveNumber { token: String },
}

impl fmt::Display for FenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenError::NonAscii => write!(f, "non-ASCII data in FEN"),
            FenError::MissingField { field } => write!(f, "no {field} in FEN"),
            FenError::ExtraData => write!(f, "extra data in FEN"),
            FenError::BadPlacement { message } => write!(f, "bad board: {message}"),
            FenError::BadSide(e) => write!(f, "bad move side: {e}"),
            FenError::BadCastling(e) => write!(f, "bad castling: {e}"),
            FenError::BadEnPassant { message } => write!(f, "bad enpassant: {message}"),
            FenError::BadMoveCounter { token } => write!(f, "bad move counter {token:?}"),
            FenError::BadMoveNumber { token } => write!(f, "bad move number {token:?}"),
        }
    }
}

impl std::error::Error for FenError {}

/// Error type for position validation failures in [`Board::new`].
///
/// [`Board::new`]: crate::board::Board::new
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidateError {
    /// En-passant source square on the wrong rank for the side to move.
    BadEnPassantRank { sq: Square },
    /// A side has more than 16 pieces.
    TooManyPieces { color: Color },
    /// A side has no king.
    NoKing { color: Color },
    /// A side has more than one king.
    TooManyKings { color: Color },
    /// A pawn stands on rank 1 or rank 8.
    BadPawnRank { sq: Square },
    /// The side that has already moved is left in check.
    OpponentKingAttacked,
    /// More than two pieces give check simultaneously.
    TooManyCheckers,
}

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidateError::BadEnPassantRank { sq } => {
                write!(f, "invalid enpassant source {sq}")
            }
            ValidateError::TooManyPieces { color } => {
                write!(f, "too many pieces of color {}", color.long_name())
            }
            ValidateError::NoKing { color } => {
                write!(f, "no king of color {}", color.long_name())
            }
            ValidateError::TooManyKings { color } => {
                write!(f, "too many kings of color {}", color.long_name())
            }
            ValidateError::BadPawnRank { sq } => write!(f, "invalid pawn position {sq}"),
            ValidateError::OpponentKingAttacked => write!(f, "opponent king is attacked"),
            ValidateError::TooManyCheckers => {
                write!(f, "too many pieces attack the king simultaneously")
            }
        }
    }
}

impl std::error::Error for ValidateError {}

/// Error type for building a [`Board`] straight from FEN: either the text
/// failed to parse or the parsed position failed validation.
///
/// [`Board`]: crate::board::Board
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardFromFenError {
    /// The FEN text is malformed.
    Fen(FenError),
    /// The position described by the FEN is invalid.
    Validate(ValidateError),
}

impl fmt::Display for BoardFromFenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardFromFenError::Fen(e) => write!(f, "parse board: {e}"),
            BoardFromFenError::Validate(e) => write!(f, "create board: {e}"),
        }
    }
}

impl std::error::Error for BoardFromFenError {}

impl From<FenError> for BoardFromFenError {
    fn from(e: FenError) -> Self {
        BoardFromFenError::Fen(e)
    }
}

impl From<ValidateError> for BoardFromFenError {
    fn from(e: ValidateError) -> Self {
        BoardFromFenError::Validate(e)
    }
}

/// Error type for move construction and validation failures.
///
/// The three variants have distinct identities so callers can tell a
/// syntactically broken move from a blocked one from one that exposes the
/// king.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    /// The move is not syntactically possible for its piece and kind.
    NotWellFormed,
    /// The move does not fit the position (blocked, wrong color, no right).
    NotSemiLegal,
    /// The move leaves the mover's king attacked.
    NotLegal,
}

impl fmt::Display for MoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveError::NotWellFormed => write!(f, "move is not well-formed"),
            MoveError::NotSemiLegal => write!(f, "move is not semi-legal"),
            MoveError::NotLegal => write!(f, "move is not legal"),
        }
    }
}

impl std::error::Error for MoveError {}

/// Error type for UCI long algebraic move parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciMoveError {
    /// Move string must be 4 or 5 characters (or `0000`).
    BadLength { len: usize },
    /// Bad source square.
    BadSrc(SquareError),
    /// Bad destination square.
    BadDst(SquareError),
    /// Bad promotion piece letter.
    BadPromote { ch: char },
    /// The promotion piece cannot be a pawn or king.
    InvalidPromotePiece,
    /// The source square does not hold a piece of the side to move.
    NoSourcePiece,
    /// The converted move is not well-formed on the board.
    Move(MoveError),
}

impl fmt::Display for UciMoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UciMoveError::BadLength { len } => {
                write!(f, "uci move must be 4-5 characters, found {len}")
            }
            UciMoveError::BadSrc(e) => write!(f, "bad src: {e}"),
            UciMoveError::BadDst(e) => write!(f, "bad dst: {e}"),
            UciMoveError::BadPromote { ch } => write!(f, "bad promote char {ch:?}"),
            UciMoveError::InvalidPromotePiece => write!(f, "invalid promote piece"),
            UciMoveError::NoSourcePiece => write!(f, "no piece of the moving side on src"),
            UciMoveError::Move(e) => write!(f, "bad uci move: {e}"),
        }
    }
}

impl std::error::Error for UciMoveError {}

impl From<MoveError> for UciMoveError {
    fn from(e: MoveError) -> Self {
        UciMoveError::Move(e)
    }
}

/// Error type for SAN parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanError {
    /// Empty SAN string.
    Empty,
    /// The SAN string does not fit any recognized move shape.
    NotWellFormed,
    /// Bad destination square.
    BadDst(SquareError),
    /// Multiple legal moves match the given qualifiers.
    Ambiguous { first: String, second: String },
    /// No legal move matches.
    NoSuchMove,
    /// A capture marker was given but the destination is empty.
    CaptureExpected,
    /// The underlying move failed validation.
    Move(MoveError),
    /// The embedded UCI move failed to parse or convert.
    Uci(UciMoveError),
}

impl fmt::Display for SanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SanError::Empty => write!(f, "empty san string"),
            SanError::NotWellFormed => write!(f, "san move is not well-formed"),
            SanError::BadDst(e) => write!(f, "bad san dst: {e}"),
            SanError::Ambiguous { first, second } => {
                write!(f, "ambiguous move: {first} and {second} are candidates")
            }
            SanError::NoSuchMove => write!(f, "no such move"),
            SanError::CaptureExpected => write!(f, "capture is expected"),
            SanError::Move(e) => write!(f, "bad san move: {e}"),
            SanError::Uci(e) => write!(f, "bad uci move in san: {e}"),
        }
    }
}

impl std::error::Error for SanError {}

impl From<MoveError> for SanError {
    fn from(e: MoveError) -> Self {
        SanError::Move(e)
    }
}

impl From<UciMoveError> for SanError {
    fn from(e: UciMoveError) -> Self {
        SanError::Uci(e)
    }
}
