//! Zobrist hashing tables.
//!
//! Five key families: per-(cell, square), side-to-move, per castling-rights
//! nibble, per en-passant source square, and the precomputed king+rook
//! deltas for the two castling moves. The empty cell hashes to zero so the
//! per-cell XOR loop needs no branch.

use once_cell::sync::Lazy;
use rand::Rng;

use crate::board::geometry::home_rank;
use crate::board::types::{CastlingSide, Cell, Color, File, Piece, Square, CELL_MAX};

pub(crate) struct ZobristTables {
    pub cells: [[u64; 64]; CELL_MAX],
    pub move_side: u64,
    pub castling: [u64; 16],
    pub enpassant: [u64; 64],
    pub castling_delta: [[u64; 2]; 2],
}

pub(crate) static ZOBRIST: Lazy<ZobristTables> = Lazy::new(|| {
    let mut rng = rand::thread_rng();

    let mut cells = [[0u64; 64]; CELL_MAX];
    for (cell_idx, tab) in cells.iter_mut().enumerate() {
        if cell_idx == Cell::EMPTY.index() {
            continue;
        }
        for key in tab.iter_mut() {
            *key = rng.gen();
        }
    }

    let move_side = rng.gen();

    let mut castling = [0u64; 16];
    for key in &mut castling {
        *key = rng.gen();
    }

    let mut enpassant = [0u64; 64];
    for key in &mut enpassant {
        *key = rng.gen();
    }

    let mut castling_delta = [[0u64; 2]; 2];
    for color in Color::BOTH {
        let king = Cell::from_parts(color, Piece::King).index();
        let rook = Cell::from_parts(color, Piece::Rook).index();
        let rank = home_rank(color);
        let at = |f: File| Square::new(f, rank).index();
        castling_delta[color.index()][CastlingSide::Kingside.index()] = cells[king][at(File::E)]
            ^ cells[king][at(File::G)]
            ^ cells[rook][at(File::H)]
            ^ cells[rook][at(File::F)];
        castling_delta[color.index()][CastlingSide::Queenside.index()] = cells[king][at(File::E)]
            ^ cells[king][at(File::C)]
            ^ cells[rook][at(File::A)]
            ^ cells[rook][at(File::D)];
    }

    ZobristTables {
        cells,
        move_side,
        castling,
        enpassant,
        castling_delta,
    }
});

#[inline]
pub(crate) fn cell_key(cell: Cell, sq: Square) -> u64 {
    ZOBRIST.cells[cell.index()][sq.index()]
}

#[inline]
pub(crate) fn move_side_key() -> u64 {
    ZOBRIST.move_side
}

#[inline]
pub(crate) fn castling_key(rights: crate::board::types::CastlingRights) -> u64 {
    ZOBRIST.castling[rights.bits() as usize]
}

#[inline]
pub(crate) fn enpassant_key(sq: Square) -> u64 {
    ZOBRIST.enpassant[sq.index()]
}

#[inline]
pub(crate) fn castling_delta_key(color: Color, side: CastlingSide) -> u64 {
    ZOBRIST.castling_delta[color.index()][side.index()]
}
