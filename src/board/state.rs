//! Position descriptors: the raw packed board and the validated board.

use std::fmt;
use std::str::FromStr;

use super::error::{FenError, ValidateError};
use super::geometry::{enpassant_dst_rank, enpassant_src_rank, home_rank, pawn_forward_delta, pawn_home_rank};
use super::types::{
    Bitboard, CastlingRights, CastlingSide, Cell, Color, File, Outcome, Piece, Rank, Square,
    Verdict, CELL_MAX,
};
use super::zobrist;

/// A plain position descriptor: cells plus the scalar state fields.
///
/// A `RawBoard` carries no derived data and no validity guarantee; it is
/// cheap to copy, hash and compare, which is what the repetition table
/// needs. Use [`Board::new`] to validate and upgrade it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawBoard {
    pub cells: [Cell; 64],
    pub side: Color,
    pub castling: CastlingRights,
    /// The square of the pawn whose double move enabled en passant (not
    /// the capture destination).
    pub ep_source: Option<Square>,
    /// Half-moves since the last capture or pawn move, saturating at 255.
    pub move_counter: u8,
    /// Full-move number, starting at 1.
    pub move_number: u32,
}

impl RawBoard {
    /// The standard starting position.
    #[must_use]
    pub fn initial() -> RawBoard {
        let mut cells = [Cell::EMPTY; 64];
        for color in Color::BOTH {
            let rank = home_rank(color);
            let pawn_rank = pawn_home_rank(color);
            let back = [
                Piece::Rook,
                Piece::Knight,
                Piece::Bishop,
                Piece::Queen,
                Piece::King,
                Piece::Bishop,
                Piece::Knight,
                Piece::Rook,
            ];
            for (file, piece) in File::ALL.into_iter().zip(back) {
                cells[Square::new(file, rank).index()] = Cell::from_parts(color, piece);
                cells[Square::new(file, pawn_rank).index()] = Cell::from_parts(color, Piece::Pawn);
            }
        }
        RawBoard {
            cells,
            side: Color::White,
            castling: CastlingRights::FULL,
            ep_source: None,
            move_counter: 0,
            move_number: 1,
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, sq: Square) -> Cell {
        self.cells[sq.index()]
    }

    #[inline]
    #[must_use]
    pub fn get2(&self, file: File, rank: Rank) -> Cell {
        self.get(Square::new(file, rank))
    }

    #[inline]
    pub fn put(&mut self, sq: Square, cell: Cell) {
        self.cells[sq.index()] = cell;
    }

    #[inline]
    pub fn put2(&mut self, file: File, rank: Rank, cell: Cell) {
        self.put(Square::new(file, rank), cell);
    }

    /// The en-passant capture destination, derived from [`RawBoard::ep_source`].
    #[must_use]
    pub fn ep_dest(&self) -> Option<Square> {
        self.ep_source
            .map(|ep| Square::new(ep.file(), enpassant_dst_rank(self.side)))
    }

    /// Compute the Zobrist hash of this position from scratch.
    #[must_use]
    pub fn zobrist_hash(&self) -> u64 {
        let mut hash = 0;
        if self.side == Color::White {
            hash ^= zobrist::move_side_key();
        }
        if let Some(ep) = self.ep_source {
            hash ^= zobrist::enpassant_key(ep);
        }
        hash ^= zobrist::castling_key(self.castling);
        for (idx, cell) in self.cells.iter().enumerate() {
            if cell.is_occupied() {
                hash ^= zobrist::cell_key(*cell, Square::from_index(idx));
            }
        }
        hash
    }
}

impl fmt::Debug for RawBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawBoard({})", self.fen())
    }
}

impl fmt::Display for RawBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fen())
    }
}

impl FromStr for RawBoard {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RawBoard::from_fen(s)
    }
}

/// A validated position with derived state: Zobrist hash, per-cell and
/// per-color bitboards and the total occupancy.
///
/// A `Board` is only created through validation ([`Board::new`],
/// [`Board::from_fen`], [`Board::initial`]) and only mutated through
/// make/unmake, so the derived state always matches the raw descriptor.
#[derive(Clone)]
pub struct Board {
    pub(crate) raw: RawBoard,
    pub(crate) hash: u64,
    pub(crate) bb_cell: [Bitboard; CELL_MAX],
    pub(crate) bb_color: [Bitboard; 2],
    pub(crate) bb_all: Bitboard,
}

impl Board {
    /// Validate a raw position and build the derived state.
    ///
    /// Returns an error for structurally impossible positions. Two classes
    /// of defects are silently repaired instead: an en-passant square whose
    /// implied pawn is missing (or blocked from behind) is cleared, and a
    /// castling right whose king or rook has left its home square is
    /// cleared.
    pub fn new(mut raw: RawBoard) -> Result<Board, ValidateError> {
        // Check enpassant
        if let Some(ep) = raw.ep_source {
            if ep.rank() != enpassant_src_rank(raw.side) {
                return Err(ValidateError::BadEnPassantRank { sq: ep });
            }
            // Reset enpassant if either there is no pawn or the cell on the
            // pawn's path is occupied
            let behind = ep.add(pawn_forward_delta(raw.side));
            if raw.get(ep) != Cell::from_parts(raw.side.inv(), Piece::Pawn)
                || raw.get(behind).is_occupied()
            {
                raw.ep_source = None;
            }
        }

        // Reset bad castling flags
        for color in Color::BOTH {
            let rank = home_rank(color);
            if raw.get2(File::E, rank) != Cell::from_parts(color, Piece::King) {
                raw.castling.unset_color(color);
            }
            if raw.get2(File::A, rank) != Cell::from_parts(color, Piece::Rook) {
                raw.castling.unset(color, CastlingSide::Queenside);
            }
            if raw.get2(File::H, rank) != Cell::from_parts(color, Piece::Rook) {
                raw.castling.unset(color, CastlingSide::Kingside);
            }
        }

        // Calculate bitboards
        let mut bb_cell = [Bitboard::EMPTY; CELL_MAX];
        let mut bb_color = [Bitboard::EMPTY; 2];
        for (idx, cell) in raw.cells.iter().enumerate() {
            if let Some(color) = cell.color() {
                let sq = Square::from_index(idx);
                bb_color[color.index()].set(sq);
                bb_cell[cell.index()].set(sq);
            }
        }

        for color in Color::BOTH {
            if bb_color[color.index()].len() > 16 {
                return Err(ValidateError::TooManyPieces { color });
            }
            let kings = bb_cell[Cell::from_parts(color, Piece::King).index()];
            if kings.is_empty() {
                return Err(ValidateError::NoKing { color });
            }
            if kings.len() > 1 {
                return Err(ValidateError::TooManyKings { color });
            }
        }

        // No pawns on the first or last rank
        let pawns = bb_cell[Cell::from_parts(Color::White, Piece::Pawn).index()]
            | bb_cell[Cell::from_parts(Color::Black, Piece::Pawn).index()];
        const BAD_PAWN_RANKS: Bitboard = Bitboard(0xff000000000000ff);
        let bad_pawns = pawns & BAD_PAWN_RANKS;
        if !bad_pawns.is_empty() {
            return Err(ValidateError::BadPawnRank {
                sq: bad_pawns.first(),
            });
        }

        let board = Board {
            hash: raw.zobrist_hash(),
            raw,
            bb_cell,
            bb_color,
            bb_all: bb_color[0] | bb_color[1],
        };
        if board.is_opponent_king_attacked() {
            return Err(ValidateError::OpponentKingAttacked);
        }
        if board.checkers().len() > 2 {
            return Err(ValidateError::TooManyCheckers);
        }

        Ok(board)
    }

    /// The standard starting position.
    #[must_use]
    pub fn initial() -> Board {
        Board::new(RawBoard::initial()).expect("initial position must be valid")
    }

    /// The raw descriptor of the current position.
    #[inline]
    #[must_use]
    pub fn raw(&self) -> RawBoard {
        self.raw
    }

    #[inline]
    #[must_use]
    pub fn get(&self, sq: Square) -> Cell {
        self.raw.get(sq)
    }

    #[inline]
    #[must_use]
    pub fn get2(&self, file: File, rank: Rank) -> Cell {
        self.raw.get2(file, rank)
    }

    /// The side to move.
    #[inline]
    #[must_use]
    pub fn side(&self) -> Color {
        self.raw.side
    }

    #[inline]
    #[must_use]
    pub fn castling(&self) -> CastlingRights {
        self.raw.castling
    }

    #[inline]
    #[must_use]
    pub fn ep_source(&self) -> Option<Square> {
        self.raw.ep_source
    }

    #[inline]
    #[must_use]
    pub fn ep_dest(&self) -> Option<Square> {
        self.raw.ep_dest()
    }

    #[inline]
    #[must_use]
    pub fn move_counter(&self) -> u8 {
        self.raw.move_counter
    }

    #[inline]
    #[must_use]
    pub fn move_number(&self) -> u32 {
        self.raw.move_number
    }

    /// The incrementally maintained Zobrist hash.
    #[inline]
    #[must_use]
    pub fn zobrist_hash(&self) -> u64 {
        self.hash
    }

    /// All squares occupied by `color`.
    #[inline]
    #[must_use]
    pub fn bb_color(&self, color: Color) -> Bitboard {
        self.bb_color[color.index()]
    }

    /// All squares holding exactly `cell`.
    #[inline]
    #[must_use]
    pub fn bb_cell(&self, cell: Cell) -> Bitboard {
        self.bb_cell[cell.index()]
    }

    /// All squares holding the given piece of the given color.
    #[inline]
    #[must_use]
    pub fn bb_piece(&self, color: Color, piece: Piece) -> Bitboard {
        self.bb_cell(Cell::from_parts(color, piece))
    }

    /// All occupied squares.
    #[inline]
    #[must_use]
    pub fn bb_all(&self) -> Bitboard {
        self.bb_all
    }

    /// Diagonal sliders (bishops and queens) of `color`.
    #[inline]
    pub(crate) fn bb_piece_diag(&self, color: Color) -> Bitboard {
        self.bb_piece(color, Piece::Bishop) | self.bb_piece(color, Piece::Queen)
    }

    /// Straight sliders (rooks and queens) of `color`.
    #[inline]
    pub(crate) fn bb_piece_line(&self, color: Color) -> Bitboard {
        self.bb_piece(color, Piece::Rook) | self.bb_piece(color, Piece::Queen)
    }

    /// The king square of `color`. Valid boards always have one king.
    #[inline]
    #[must_use]
    pub fn king_pos(&self, color: Color) -> Square {
        self.bb_piece(color, Piece::King).first()
    }

    pub(crate) fn is_opponent_king_attacked(&self) -> bool {
        let side = self.raw.side;
        self.is_cell_attacked(self.king_pos(side.inv()), side)
    }

    /// Whether the side to move is in check.
    #[must_use]
    pub fn is_check(&self) -> bool {
        let side = self.raw.side;
        self.is_cell_attacked(self.king_pos(side), side.inv())
    }

    /// The pieces giving check to the side to move.
    #[must_use]
    pub fn checkers(&self) -> Bitboard {
        let side = self.raw.side;
        self.cell_attackers(self.king_pos(side), side.inv())
    }

    /// Neither side can possibly deliver mate: bare kings, a lone knight,
    /// or only bishops on a single square color.
    #[must_use]
    pub fn is_insufficient_material(&self) -> bool {
        let kings = self.bb_piece(Color::White, Piece::King) | self.bb_piece(Color::Black, Piece::King);
        let rest = self.bb_all ^ kings;

        // Pieces on both square colors can always mate; this cheap cutoff
        // answers most positions.
        if !(rest & Bitboard::LIGHT).is_empty() && !(rest & Bitboard::DARK).is_empty() {
            return false;
        }

        // Two kings only
        if rest.is_empty() {
            return true;
        }

        // King vs king + knight
        let knights =
            self.bb_piece(Color::White, Piece::Knight) | self.bb_piece(Color::Black, Piece::Knight);
        if rest == knights && knights.len() == 1 {
            return true;
        }

        // Kings and bishops of the same square color. The cutoff above
        // already ensured everything shares one color complex, so it
        // remains to check all the pieces are bishops.
        let bishops =
            self.bb_piece(Color::White, Piece::Bishop) | self.bb_piece(Color::Black, Piece::Bishop);
        rest == bishops
    }

    /// Detect the position-local outcome: mate, stalemate, insufficient
    /// material and the move-counter draws.
    ///
    /// Repetition verdicts require history and are computed by
    /// [`Game`](crate::game::Game), not here.
    #[must_use]
    pub fn calc_outcome(&self) -> Outcome {
        // Force verdicts take precedence over non-force ones.
        if !self.has_legal_moves() {
            return if self.is_check() {
                Outcome::new(Verdict::Checkmate, self.raw.side.inv())
            } else {
                Outcome::new(Verdict::Stalemate, Color::White)
            };
        }

        if self.is_insufficient_material() {
            return Outcome::new(Verdict::InsufficientMaterial, Color::White);
        }

        // The 50 move check must come last among the counter rules, as it
        // is the non-strict one.
        if self.raw.move_counter >= 150 {
            return Outcome::new(Verdict::Moves75, Color::White);
        }
        if self.raw.move_counter >= 100 {
            return Outcome::new(Verdict::Moves50, Color::White);
        }

        Outcome::running()
    }
}

impl PartialEq for Board {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Board {}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({})", self.fen())
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fen())
    }
}

impl FromStr for Board {
    type Err = super::error::BoardFromFenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Board::from_fen(s)
    }
}
