//! Making and unmaking moves, with full undo.

use super::error::{MoveError, SanError, UciMoveError};
use super::geometry::{castling_offset, home_rank, pawn_forward_delta, CASTLING_ALL_SRCS, castling_srcs};
use super::moves::{Move, MoveKind, UciMove};
use super::san;
use super::state::Board;
use super::types::{Bitboard, CastlingRights, CastlingSide, Cell, Color, File, Piece, Square};
use super::zobrist;

/// Everything make-move erases, captured so unmake can restore it in O(1).
#[derive(Clone, Copy, Debug)]
pub(crate) struct RawUndo {
    hash: u64,
    dst_cell: Cell,
    castling: CastlingRights,
    ep_source: Option<Square>,
    move_counter: u8,
    move_number: u32,
}

/// An undo record paired with the move it undoes. Returned by the
/// make-move family; hand it back to [`Board::unmake_move`].
#[derive(Clone, Copy, Debug)]
pub struct Undo {
    pub(crate) raw: RawUndo,
    pub(crate) mv: Move,
}

impl Undo {
    /// The move this record undoes.
    #[inline]
    #[must_use]
    pub fn mv(&self) -> Move {
        self.mv
    }
}

/// Recompute castling rights after `diff` squares were disturbed, updating
/// the hash for the transition.
fn update_castling(b: &mut Board, diff: Bitboard) {
    if (diff & CASTLING_ALL_SRCS).is_empty() {
        return;
    }

    let mut c = b.raw.castling;
    for color in Color::BOTH {
        for side in CastlingSide::BOTH {
            if !(diff & castling_srcs(color, side)).is_empty() {
                c.unset(color, side);
            }
        }
    }

    if c != b.raw.castling {
        b.hash ^= zobrist::castling_key(b.raw.castling);
        b.raw.castling = c;
        b.hash ^= zobrist::castling_key(b.raw.castling);
    }
}

fn do_pawn_double(b: &mut Board, c: Color, mv: Move, diff: Bitboard, inv: bool) {
    let pawn = Cell::from_parts(c, Piece::Pawn);
    if inv {
        b.raw.put(mv.src(), pawn);
        b.raw.put(mv.dst(), Cell::EMPTY);
    } else {
        b.raw.put(mv.src(), Cell::EMPTY);
        b.raw.put(mv.dst(), pawn);
        b.hash ^= zobrist::cell_key(pawn, mv.src()) ^ zobrist::cell_key(pawn, mv.dst());
    }
    b.bb_color[c.index()] ^= diff;
    b.bb_cell[pawn.index()] ^= diff;
    if !inv {
        b.raw.ep_source = Some(mv.dst());
        b.hash ^= zobrist::enpassant_key(mv.dst());
    }
}

fn do_enpassant(b: &mut Board, c: Color, mv: Move, diff: Bitboard, inv: bool) {
    let taken = mv.dst().add(-pawn_forward_delta(c));
    let bb_taken = Bitboard::from_square(taken);
    let our_pawn = Cell::from_parts(c, Piece::Pawn);
    let their_pawn = Cell::from_parts(c.inv(), Piece::Pawn);
    if inv {
        b.raw.put(mv.src(), our_pawn);
        b.raw.put(mv.dst(), Cell::EMPTY);
        b.raw.put(taken, their_pawn);
    } else {
        b.raw.put(mv.src(), Cell::EMPTY);
        b.raw.put(mv.dst(), our_pawn);
        b.raw.put(taken, Cell::EMPTY);
        b.hash ^= zobrist::cell_key(our_pawn, mv.src())
            ^ zobrist::cell_key(our_pawn, mv.dst())
            ^ zobrist::cell_key(their_pawn, taken);
    }
    b.bb_color[c.index()] ^= diff;
    b.bb_cell[our_pawn.index()] ^= diff;
    b.bb_color[c.inv().index()] ^= bb_taken;
    b.bb_cell[their_pawn.index()] ^= bb_taken;
}

fn do_castling(b: &mut Board, c: Color, side: CastlingSide, inv: bool) {
    let king = Cell::from_parts(c, Piece::King);
    let rook = Cell::from_parts(c, Piece::Rook);
    let rank = home_rank(c);
    let off = castling_offset(c);

    // Fixed XOR patterns for the king+rook leap, shifted to the home rank.
    let (bb_both, bb_rook, bb_king) = match side {
        CastlingSide::Queenside => (0x1du64, 0x09u64, 0x14u64),
        CastlingSide::Kingside => (0xf0u64, 0xa0u64, 0x50u64),
    };

    match (side, inv) {
        (CastlingSide::Queenside, true) => {
            b.raw.put2(File::A, rank, rook);
            b.raw.put2(File::C, rank, Cell::EMPTY);
            b.raw.put2(File::D, rank, Cell::EMPTY);
            b.raw.put2(File::E, rank, king);
        }
        (CastlingSide::Queenside, false) => {
            b.raw.put2(File::A, rank, Cell::EMPTY);
            b.raw.put2(File::C, rank, king);
            b.raw.put2(File::D, rank, rook);
            b.raw.put2(File::E, rank, Cell::EMPTY);
            b.hash ^= zobrist::castling_delta_key(c, side);
        }
        (CastlingSide::Kingside, true) => {
            b.raw.put2(File::E, rank, king);
            b.raw.put2(File::F, rank, Cell::EMPTY);
            b.raw.put2(File::G, rank, Cell::EMPTY);
            b.raw.put2(File::H, rank, rook);
        }
        (CastlingSide::Kingside, false) => {
            b.raw.put2(File::E, rank, Cell::EMPTY);
            b.raw.put2(File::F, rank, rook);
            b.raw.put2(File::G, rank, king);
            b.raw.put2(File::H, rank, Cell::EMPTY);
            b.hash ^= zobrist::castling_delta_key(c, side);
        }
    }

    b.bb_color[c.index()] ^= Bitboard(bb_both << off);
    b.bb_cell[rook.index()] ^= Bitboard(bb_rook << off);
    b.bb_cell[king.index()] ^= Bitboard(bb_king << off);

    if !inv {
        b.hash ^= zobrist::castling_key(b.raw.castling);
        b.raw.castling.unset_color(c);
        b.hash ^= zobrist::castling_key(b.raw.castling);
    }
}

fn do_make_move(b: &mut Board, mv: Move) -> RawUndo {
    let src_cell = mv.src_cell();
    let dst_cell = b.get(mv.dst());
    let undo = RawUndo {
        hash: b.hash,
        dst_cell,
        castling: b.raw.castling,
        ep_source: b.raw.ep_source,
        move_counter: b.raw.move_counter,
        move_number: b.raw.move_number,
    };
    let bb_src = Bitboard::from_square(mv.src());
    let bb_dst = Bitboard::from_square(mv.dst());
    let diff = bb_src | bb_dst;
    let c = b.raw.side;
    let pawn = Cell::from_parts(c, Piece::Pawn);

    if let Some(ep) = b.raw.ep_source.take() {
        b.hash ^= zobrist::enpassant_key(ep);
    }

    match mv.kind() {
        MoveKind::Simple => {
            b.raw.put(mv.src(), Cell::EMPTY);
            b.raw.put(mv.dst(), src_cell);
            b.hash ^= zobrist::cell_key(src_cell, mv.src())
                ^ zobrist::cell_key(src_cell, mv.dst())
                ^ zobrist::cell_key(dst_cell, mv.dst());
            b.bb_color[c.index()] ^= diff;
            b.bb_cell[src_cell.index()] ^= diff;
            b.bb_color[c.inv().index()] &= !bb_dst;
            b.bb_cell[dst_cell.index()] &= !bb_dst;
            if src_cell != pawn {
                update_castling(b, diff);
            }
        }
        MoveKind::PawnDouble => do_pawn_double(b, c, mv, diff, false),
        MoveKind::PromoteKnight
        | MoveKind::PromoteBishop
        | MoveKind::PromoteRook
        | MoveKind::PromoteQueen => {
            // matches_piece guarantees the promote target exists
            let promote = Cell::from_parts(c, mv.kind().promote().unwrap());
            b.raw.put(mv.src(), Cell::EMPTY);
            b.raw.put(mv.dst(), promote);
            b.hash ^= zobrist::cell_key(src_cell, mv.src())
                ^ zobrist::cell_key(promote, mv.dst())
                ^ zobrist::cell_key(dst_cell, mv.dst());
            b.bb_color[c.index()] ^= diff;
            b.bb_cell[src_cell.index()] ^= bb_src;
            b.bb_cell[promote.index()] ^= bb_dst;
            b.bb_color[c.inv().index()] &= !bb_dst;
            b.bb_cell[dst_cell.index()] &= !bb_dst;
            update_castling(b, diff);
        }
        MoveKind::CastlingQueenside => do_castling(b, c, CastlingSide::Queenside, false),
        MoveKind::CastlingKingside => do_castling(b, c, CastlingSide::Kingside, false),
        MoveKind::Enpassant => do_enpassant(b, c, mv, diff, false),
        MoveKind::Null => {}
    }

    if dst_cell.is_occupied() || src_cell == pawn {
        b.raw.move_counter = 0;
    } else {
        b.raw.move_counter = b.raw.move_counter.saturating_add(1);
    }
    b.raw.side = c.inv();
    b.hash ^= zobrist::move_side_key();
    if c == Color::Black {
        b.raw.move_number = b.raw.move_number.saturating_add(1);
    }
    b.bb_all = b.bb_color[0] | b.bb_color[1];

    undo
}

fn do_unmake_move(b: &mut Board, mv: Move, u: RawUndo) {
    let bb_src = Bitboard::from_square(mv.src());
    let bb_dst = Bitboard::from_square(mv.dst());
    let diff = bb_src | bb_dst;
    let src_cell = b.get(mv.dst());
    let dst_cell = u.dst_cell;
    let c = b.raw.side.inv();

    match mv.kind() {
        MoveKind::Simple => {
            b.raw.put(mv.src(), src_cell);
            b.raw.put(mv.dst(), dst_cell);
            b.bb_color[c.index()] ^= diff;
            b.bb_cell[src_cell.index()] ^= diff;
            if dst_cell.is_occupied() {
                b.bb_color[c.inv().index()] |= bb_dst;
                b.bb_cell[dst_cell.index()] |= bb_dst;
            }
        }
        MoveKind::PawnDouble => do_pawn_double(b, c, mv, diff, true),
        MoveKind::PromoteKnight
        | MoveKind::PromoteBishop
        | MoveKind::PromoteRook
        | MoveKind::PromoteQueen => {
            let pawn = Cell::from_parts(c, Piece::Pawn);
            b.raw.put(mv.src(), pawn);
            b.raw.put(mv.dst(), dst_cell);
            b.bb_color[c.index()] ^= diff;
            b.bb_cell[pawn.index()] ^= bb_src;
            b.bb_cell[src_cell.index()] ^= bb_dst;
            if dst_cell.is_occupied() {
                b.bb_color[c.inv().index()] |= bb_dst;
                b.bb_cell[dst_cell.index()] |= bb_dst;
            }
        }
        MoveKind::CastlingQueenside => do_castling(b, c, CastlingSide::Queenside, true),
        MoveKind::CastlingKingside => do_castling(b, c, CastlingSide::Kingside, true),
        MoveKind::Enpassant => do_enpassant(b, c, mv, diff, true),
        MoveKind::Null => {}
    }

    b.hash = u.hash;
    b.raw.castling = u.castling;
    b.raw.ep_source = u.ep_source;
    b.raw.move_counter = u.move_counter;
    b.raw.move_number = u.move_number;
    b.raw.side = c;
    b.bb_all = b.bb_color[0] | b.bb_color[1];
}

impl Board {
    /// Make a move the caller knows to be legal. No checks are performed;
    /// an illegal move corrupts the position.
    pub fn make_legal_move(&mut self, mv: Move) -> Undo {
        let raw = do_make_move(self, mv);
        Undo { raw, mv }
    }

    /// Make a move the caller knows to be semi-legal. If it turns out to
    /// leave the king attacked, the move is rolled back and
    /// [`MoveError::NotLegal`] is returned.
    pub fn make_semilegal_move(&mut self, mv: Move) -> Result<Undo, MoveError> {
        let raw = do_make_move(self, mv);
        if self.is_opponent_king_attacked() {
            do_unmake_move(self, mv, raw);
            return Err(MoveError::NotLegal);
        }
        Ok(Undo { raw, mv })
    }

    /// Validate a move fully, then make it.
    pub fn make_move(&mut self, mv: Move) -> Result<Undo, MoveError> {
        mv.validate(self)?;
        Ok(self.make_legal_move(mv))
    }

    /// Undo a move made by any of the make-move methods. Undo records must
    /// be applied in reverse order of their creation.
    pub fn unmake_move(&mut self, u: &Undo) {
        do_unmake_move(self, u.mv, u.raw);
    }

    /// Convert a [`UciMove`] against this position and make it.
    pub fn make_uci_move(&mut self, mv: UciMove) -> Result<Undo, UciMoveError> {
        let mv = mv.to_move(self)?;
        Ok(self.make_move(mv)?)
    }

    /// Parse a move in UCI long algebraic notation and make it.
    pub fn make_move_uci(&mut self, s: &str) -> Result<Undo, UciMoveError> {
        let mv = Move::from_uci(s, self)?;
        Ok(self.make_move(mv)?)
    }

    /// Parse a move in SAN and make it. SAN conversion already guarantees
    /// legality.
    pub fn make_move_san(&mut self, s: &str) -> Result<Undo, SanError> {
        let mv = san::legal_move_from_san(s, self)?;
        Ok(self.make_legal_move(mv))
    }
}
