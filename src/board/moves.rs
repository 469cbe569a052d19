//! Moves and UCI long algebraic moves.

use std::fmt;
use std::str::FromStr;

use super::attack_tables::{
    is_bishop_move_valid, is_rook_move_valid, king_attacks, knight_attacks,
};
use super::error::{MoveError, UciMoveError};
use super::geometry::{
    castling_dst_file, enpassant_dst_rank, enpassant_src_rank, home_rank, pawn_double_dst_rank,
    pawn_home_rank, promote_dst_rank, promote_src_rank,
};
use super::state::Board;
use super::types::{CastlingSide, Cell, Color, File, Piece, Rank, Square};

/// The kind of a [`Move`], distinguishing every mutation shape make-move
/// must handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MoveKind {
    Null,
    Simple,
    CastlingQueenside,
    CastlingKingside,
    PawnDouble,
    Enpassant,
    PromoteKnight,
    PromoteBishop,
    PromoteRook,
    PromoteQueen,
}

impl MoveKind {
    #[must_use]
    pub const fn from_castling_side(side: CastlingSide) -> MoveKind {
        match side {
            CastlingSide::Queenside => MoveKind::CastlingQueenside,
            CastlingSide::Kingside => MoveKind::CastlingKingside,
        }
    }

    /// The castling side, for the two castling kinds.
    #[must_use]
    pub const fn castling_side(self) -> Option<CastlingSide> {
        match self {
            MoveKind::CastlingQueenside => Some(CastlingSide::Queenside),
            MoveKind::CastlingKingside => Some(CastlingSide::Kingside),
            _ => None,
        }
    }

    /// The promotion kind for a target piece, if the piece is promotable-to.
    #[must_use]
    pub const fn from_promote(piece: Piece) -> Option<MoveKind> {
        match piece {
            Piece::Knight => Some(MoveKind::PromoteKnight),
            Piece::Bishop => Some(MoveKind::PromoteBishop),
            Piece::Rook => Some(MoveKind::PromoteRook),
            Piece::Queen => Some(MoveKind::PromoteQueen),
            _ => None,
        }
    }

    /// The promotion target, for the four promotion kinds.
    #[must_use]
    pub const fn promote(self) -> Option<Piece> {
        match self {
            MoveKind::PromoteKnight => Some(Piece::Knight),
            MoveKind::PromoteBishop => Some(Piece::Bishop),
            MoveKind::PromoteRook => Some(Piece::Rook),
            MoveKind::PromoteQueen => Some(Piece::Queen),
            _ => None,
        }
    }

    /// Whether a piece can be the mover of this move kind.
    #[must_use]
    pub const fn matches_piece(self, piece: Piece) -> bool {
        match self {
            MoveKind::Null => false,
            MoveKind::Simple => true,
            MoveKind::CastlingQueenside | MoveKind::CastlingKingside => {
                matches!(piece, Piece::King)
            }
            MoveKind::PawnDouble
            | MoveKind::Enpassant
            | MoveKind::PromoteKnight
            | MoveKind::PromoteBishop
            | MoveKind::PromoteRook
            | MoveKind::PromoteQueen => matches!(piece, Piece::Pawn),
        }
    }
}

/// Output styles for [`Move::styled`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveStyle {
    /// Standard algebraic notation with ASCII piece letters.
    San,
    /// SAN with Unicode piece glyphs and no promotion separator.
    FancySan,
    /// UCI long algebraic.
    Uci,
}

/// A move on some board.
///
/// `src_cell` duplicates what the board holds on `src`, which keeps a move
/// self-contained when it is stored or inspected without the position it
/// was created on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Move {
    kind: MoveKind,
    src_cell: Cell,
    src: Square,
    dst: Square,
}

const NULL_MOVE: Move = Move {
    kind: MoveKind::Null,
    src_cell: Cell::EMPTY,
    src: Square::from_index(0),
    dst: Square::from_index(0),
};

impl Move {
    /// The null move (`0000`).
    #[must_use]
    pub const fn null() -> Move {
        NULL_MOVE
    }

    /// The castling move of the given color and side.
    #[must_use]
    pub const fn from_castling(color: Color, side: CastlingSide) -> Move {
        let rank = home_rank(color);
        Move {
            kind: MoveKind::from_castling_side(side),
            src_cell: Cell::from_parts(color, Piece::King),
            src: Square::new(File::E, rank),
            dst: Square::new(castling_dst_file(side), rank),
        }
    }

    /// Create a move, checking well-formedness.
    pub fn new(kind: MoveKind, src_cell: Cell, src: Square, dst: Square) -> Result<Move, MoveError> {
        let mv = Move {
            kind,
            src_cell,
            src,
            dst,
        };
        if !mv.is_well_formed() {
            return Err(MoveError::NotWellFormed);
        }
        Ok(mv)
    }

    /// Create a move without any checks. The caller must guarantee that
    /// the move is well-formed; the generator uses this on its hot path.
    #[inline]
    #[must_use]
    pub(crate) const fn new_unchecked(
        kind: MoveKind,
        src_cell: Cell,
        src: Square,
        dst: Square,
    ) -> Move {
        Move {
            kind,
            src_cell,
            src,
            dst,
        }
    }

    #[inline]
    #[must_use]
    pub const fn kind(self) -> MoveKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub const fn src(self) -> Square {
        self.src
    }

    #[inline]
    #[must_use]
    pub const fn dst(self) -> Square {
        self.dst
    }

    #[inline]
    #[must_use]
    pub const fn src_cell(self) -> Cell {
        self.src_cell
    }

    /// Syntactic validity: the move shape is possible for its piece on an
    /// empty board. Position-dependent checks live in `semi_validate`.
    #[must_use]
    pub fn is_well_formed(self) -> bool {
        if self.kind == MoveKind::Null {
            return self == NULL_MOVE;
        }
        // Occupied source and distinct squares hold for every non-null kind.
        let (Some(color), Some(piece)) = (self.src_cell.color(), self.src_cell.piece()) else {
            return false;
        };
        if self.src == self.dst || !self.kind.matches_piece(piece) {
            return false;
        }

        let (sf, sr) = (self.src.file(), self.src.rank());
        let (df, dr) = (self.dst.file(), self.dst.rank());
        match self.kind {
            MoveKind::Simple => match piece {
                Piece::Pawn => {
                    if (sf.index() as i8 - df.index() as i8).abs() > 1
                        || matches!(sr, Rank::R1 | Rank::R8)
                        || matches!(dr, Rank::R1 | Rank::R8)
                    {
                        return false;
                    }
                    match color {
                        Color::White => sr.index() == dr.index() + 1,
                        Color::Black => sr.index() + 1 == dr.index(),
                    }
                }
                Piece::King => king_attacks(self.src).has(self.dst),
                Piece::Knight => knight_attacks(self.src).has(self.dst),
                Piece::Bishop => is_bishop_move_valid(self.src, self.dst),
                Piece::Rook => is_rook_move_valid(self.src, self.dst),
                Piece::Queen => {
                    is_bishop_move_valid(self.src, self.dst)
                        || is_rook_move_valid(self.src, self.dst)
                }
            },
            MoveKind::CastlingQueenside => {
                let rank = home_rank(color);
                self.src == Square::new(File::E, rank) && self.dst == Square::new(File::C, rank)
            }
            MoveKind::CastlingKingside => {
                let rank = home_rank(color);
                self.src == Square::new(File::E, rank) && self.dst == Square::new(File::G, rank)
            }
            MoveKind::PawnDouble => {
                sf == df && sr == pawn_home_rank(color) && dr == pawn_double_dst_rank(color)
            }
            MoveKind::Enpassant => {
                sr == enpassant_src_rank(color)
                    && dr == enpassant_dst_rank(color)
                    && (sf.index() as i8 - df.index() as i8).abs() == 1
            }
            MoveKind::PromoteKnight
            | MoveKind::PromoteBishop
            | MoveKind::PromoteRook
            | MoveKind::PromoteQueen => {
                sr == promote_src_rank(color)
                    && dr == promote_dst_rank(color)
                    && (sf.index() as i8 - df.index() as i8).abs() <= 1
            }
            MoveKind::Null => unreachable!(),
        }
    }

    /// Check that the move fits the position (right mover, clear path,
    /// castling rights). Does not test for exposed king.
    pub fn semi_validate(self, board: &Board) -> Result<(), MoveError> {
        if board.is_move_semilegal(self) {
            Ok(())
        } else {
            Err(MoveError::NotSemiLegal)
        }
    }

    /// Full validation: semi-legality plus king safety.
    pub fn validate(self, board: &Board) -> Result<(), MoveError> {
        self.semi_validate(board)?;
        if !board.is_legal_when_semilegal(self) {
            return Err(MoveError::NotLegal);
        }
        Ok(())
    }

    /// The UCI rendering of this move.
    #[must_use]
    pub fn uci_move(self) -> UciMove {
        if self.kind == MoveKind::Null {
            return UciMove::Null;
        }
        match self.kind.promote() {
            Some(promote) => UciMove::Promote {
                src: self.src,
                dst: self.dst,
                promote,
            },
            None => UciMove::Simple {
                src: self.src,
                dst: self.dst,
            },
        }
    }

    /// Parse a UCI move string and bind it to `board`.
    pub fn from_uci(s: &str, board: &Board) -> Result<Move, UciMoveError> {
        let uci: UciMove = s.parse()?;
        uci.to_move(board)
    }

    /// Parse a UCI move string and check it is semi-legal on `board`.
    pub fn semilegal_from_uci(s: &str, board: &Board) -> Result<Move, UciMoveError> {
        let mv = Move::from_uci(s, board)?;
        mv.semi_validate(board)?;
        Ok(mv)
    }

    /// Parse a UCI move string and check it is legal on `board`.
    pub fn legal_from_uci(s: &str, board: &Board) -> Result<Move, UciMoveError> {
        let mv = Move::from_uci(s, board)?;
        mv.validate(board)?;
        Ok(mv)
    }

    /// Render the move in the given style. SAN styles need the position
    /// the move is about to be made on.
    pub fn styled(
        self,
        board: &Board,
        style: MoveStyle,
    ) -> Result<String, crate::board::error::SanError> {
        match style {
            MoveStyle::Uci => Ok(self.to_string()),
            MoveStyle::San => super::san::move_to_san(self, board, super::san::SanStyle::Ascii),
            MoveStyle::FancySan => {
                super::san::move_to_san(self, board, super::san::SanStyle::Fancy)
            }
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uci_move())
    }
}

/// A move in UCI long algebraic notation.
///
/// The concrete [`MoveKind`] (simple vs. double push vs. en passant vs.
/// castling) is unknown until the move is bound to a board with
/// [`UciMove::to_move`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UciMove {
    Null,
    Simple {
        src: Square,
        dst: Square,
    },
    Promote {
        src: Square,
        dst: Square,
        promote: Piece,
    },
}

impl UciMove {
    /// Bind the move to a position, deriving the concrete move kind from
    /// the mover piece and geometry.
    pub fn to_move(self, board: &Board) -> Result<Move, UciMoveError> {
        let (src, dst, promote) = match self {
            UciMove::Null => return Ok(Move::null()),
            UciMove::Simple { src, dst } => (src, dst, None),
            UciMove::Promote { src, dst, promote } => (src, dst, Some(promote)),
        };

        let side = board.side();
        let src_cell = board.get(src);
        if !src_cell.has_color(side) {
            return Err(UciMoveError::NoSourcePiece);
        }

        let kind = if let Some(promote) = promote {
            MoveKind::from_promote(promote).ok_or(UciMoveError::InvalidPromotePiece)?
        } else {
            // src_cell is occupied: has_color held above.
            let piece = src_cell.piece().unwrap();
            match piece {
                Piece::Pawn => {
                    if src.rank() == pawn_home_rank(side) && dst.rank() == pawn_double_dst_rank(side)
                    {
                        MoveKind::PawnDouble
                    } else if src.file() != dst.file() && board.get(dst).is_free() {
                        MoveKind::Enpassant
                    } else {
                        MoveKind::Simple
                    }
                }
                Piece::King => {
                    let rank = home_rank(side);
                    if src == Square::new(File::E, rank) {
                        if dst == Square::new(File::C, rank) {
                            MoveKind::CastlingQueenside
                        } else if dst == Square::new(File::G, rank) {
                            MoveKind::CastlingKingside
                        } else {
                            MoveKind::Simple
                        }
                    } else {
                        MoveKind::Simple
                    }
                }
                _ => MoveKind::Simple,
            }
        };

        let mv = Move::new_unchecked(kind, src_cell, src, dst);
        if !mv.is_well_formed() {
            return Err(UciMoveError::Move(MoveError::NotWellFormed));
        }
        Ok(mv)
    }
}

impl fmt::Display for UciMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            UciMove::Null => write!(f, "0000"),
            UciMove::Simple { src, dst } => write!(f, "{src}{dst}"),
            UciMove::Promote { src, dst, promote } => write!(f, "{src}{dst}{promote}"),
        }
    }
}

impl FromStr for UciMove {
    type Err = UciMoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "0000" {
            return Ok(UciMove::Null);
        }
        if s.len() != 4 && s.len() != 5 {
            return Err(UciMoveError::BadLength { len: s.len() });
        }
        let src: Square = s[0..2].parse().map_err(UciMoveError::BadSrc)?;
        let dst: Square = s[2..4].parse().map_err(UciMoveError::BadDst)?;
        if s.len() == 5 {
            let ch = s.as_bytes()[4] as char;
            let promote = match ch {
                'n' => Piece::Knight,
                'b' => Piece::Bishop,
                'r' => Piece::Rook,
                'q' => Piece::Queen,
                _ => return Err(UciMoveError::BadPromote { ch }),
            };
            Ok(UciMove::Promote { src, dst, promote })
        } else {
            Ok(UciMove::Simple { src, dst })
        }
    }
}
