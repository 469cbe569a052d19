//! FEN parsing and emission.

use std::fmt::Write as _;

use super::error::{BoardFromFenError, FenError};
use super::geometry::{enpassant_dst_rank, enpassant_src_rank};
use super::state::{Board, RawBoard};
use super::types::{Cell, Color, Rank, Square};

fn parse_cells(s: &str) -> Result<[Cell; 64], FenError> {
    let bad = |message: String| FenError::BadPlacement { message };

    let mut cells = [Cell::EMPTY; 64];
    let mut file = 0usize;
    let mut rank = 0usize;
    let mut pos = 0usize;
    for b in s.chars() {
        match b {
            '1'..='8' => {
                let add = b as usize - '0' as usize;
                if file + add > 8 {
                    return Err(bad(format!("too many items in rank {}", Rank::from_index(rank))));
                }
                file += add;
                pos += add;
            }
            '/' => {
                if file < 8 {
                    return Err(bad(format!(
                        "not enough items in rank {}",
                        Rank::from_index(rank)
                    )));
                }
                rank += 1;
                file = 0;
                if rank >= 8 {
                    return Err(bad("too many ranks".to_string()));
                }
            }
            _ => {
                if file >= 8 {
                    return Err(bad(format!("too many items in rank {}", Rank::from_index(rank))));
                }
                cells[pos] =
                    Cell::from_char(b).map_err(|_| bad(format!("unexpected char {b:?}")))?;
                file += 1;
                pos += 1;
            }
        }
    }
    if file < 8 {
        return Err(bad(format!(
            "not enough items in rank {}",
            Rank::from_index(rank)
        )));
    }
    if rank < 7 {
        return Err(bad("too few ranks".to_string()));
    }
    Ok(cells)
}

/// Parse the en-passant field. FEN stores the capture destination; the
/// board stores the moved pawn's square, so the rank is translated here.
fn parse_ep_source(s: &str, side: Color) -> Result<Option<Square>, FenError> {
    if s == "-" {
        return Ok(None);
    }
    let sq: Square = s.parse().map_err(|e| FenError::BadEnPassant {
        message: format!("{e}"),
    })?;
    if sq.rank() != enpassant_dst_rank(side) {
        return Err(FenError::BadEnPassant {
            message: format!("invalid enpassant rank {}", sq.rank()),
        });
    }
    Ok(Some(Square::new(sq.file(), enpassant_src_rank(side))))
}

fn fmt_cells(cells: &[Cell; 64]) -> String {
    let mut res = String::new();
    for rank in 0..8 {
        if rank != 0 {
            res.push('/');
        }
        let mut empty = 0;
        for file in 0..8 {
            let cell = cells[rank * 8 + file];
            if cell.is_free() {
                empty += 1;
                continue;
            }
            if empty != 0 {
                res.push((b'0' + empty) as char);
                empty = 0;
            }
            res.push(cell.to_char());
        }
        if empty != 0 {
            res.push((b'0' + empty) as char);
        }
    }
    res
}

impl RawBoard {
    /// Parse a FEN string into a raw (unvalidated) position.
    ///
    /// The halfmove clock and fullmove number are optional and default to
    /// 0 and 1; anything after them is an error.
    pub fn from_fen(fen: &str) -> Result<RawBoard, FenError> {
        if !fen.is_ascii() {
            return Err(FenError::NonAscii);
        }

        let mut parts = fen.split_whitespace();

        let placement = parts.next().ok_or(FenError::MissingField { field: "board" })?;
        let cells = parse_cells(placement)?;

        let side_str = parts.next().ok_or(FenError::MissingField { field: "move side" })?;
        let side = match side_str {
            "w" => Color::White,
            "b" => Color::Black,
            _ => {
                return Err(FenError::BadSide(super::error::CellError::BadColor {
                    ch: side_str.chars().next().unwrap_or('?'),
                }))
            }
        };

        let castling_str = parts.next().ok_or(FenError::MissingField { field: "castling" })?;
        let castling = castling_str.parse().map_err(FenError::BadCastling)?;

        let ep_str = parts.next().ok_or(FenError::MissingField { field: "enpassant" })?;
        let ep_source = parse_ep_source(ep_str, side)?;

        let mut res = RawBoard {
            cells,
            side,
            castling,
            ep_source,
            move_counter: 0,
            move_number: 1,
        };

        if let Some(token) = parts.next() {
            let counter: u64 = token.parse().map_err(|_| FenError::BadMoveCounter {
                token: token.to_string(),
            })?;
            res.move_counter = counter.min(u64::from(u8::MAX)) as u8;
        } else {
            return Ok(res);
        }

        if let Some(token) = parts.next() {
            res.move_number = token.parse().map_err(|_| FenError::BadMoveNumber {
                token: token.to_string(),
            })?;
        } else {
            return Ok(res);
        }

        if parts.next().is_some() {
            return Err(FenError::ExtraData);
        }
        Ok(res)
    }

    /// The canonical FEN form of this position.
    #[must_use]
    pub fn fen(&self) -> String {
        let mut res = fmt_cells(&self.cells);
        let ep = match self.ep_dest() {
            Some(sq) => sq.to_string(),
            None => "-".to_string(),
        };
        let _ = write!(
            res,
            " {} {} {} {} {}",
            self.side, self.castling, ep, self.move_counter, self.move_number
        );
        res
    }
}

impl Board {
    /// Parse a FEN string, validating and normalizing the position.
    pub fn from_fen(fen: &str) -> Result<Board, BoardFromFenError> {
        let raw = RawBoard::from_fen(fen)?;
        Ok(Board::new(raw)?)
    }

    /// The canonical FEN form of the current position.
    #[must_use]
    pub fn fen(&self) -> String {
        self.raw.fen()
    }
}
