//! SAN (Standard Algebraic Notation) parsing and emission.

use super::error::SanError;
use super::geometry::{home_rank, pawn_forward_delta, pawn_home_rank};
use super::moves::{Move, MoveKind, UciMove};
use super::movegen::MoveList;
use super::state::Board;
use super::types::{Bitboard, CastlingSide, Cell, File, Piece, Rank, Square};

/// Rendering style for SAN output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SanStyle {
    /// ASCII piece letters and `=` before the promotion piece.
    Ascii,
    /// Unicode piece glyphs and no promotion separator.
    Fancy,
}

impl SanStyle {
    fn piece_str(self, piece: Piece) -> &'static str {
        match (self, piece) {
            (SanStyle::Ascii, Piece::Pawn) => "P",
            (SanStyle::Ascii, Piece::King) => "K",
            (SanStyle::Ascii, Piece::Knight) => "N",
            (SanStyle::Ascii, Piece::Bishop) => "B",
            (SanStyle::Ascii, Piece::Rook) => "R",
            (SanStyle::Ascii, Piece::Queen) => "Q",
            (SanStyle::Fancy, Piece::Pawn) => "♙",
            (SanStyle::Fancy, Piece::King) => "♔",
            (SanStyle::Fancy, Piece::Knight) => "♘",
            (SanStyle::Fancy, Piece::Bishop) => "♗",
            (SanStyle::Fancy, Piece::Rook) => "♖",
            (SanStyle::Fancy, Piece::Queen) => "♕",
        }
    }

    fn promote_sign(self) -> &'static str {
        match self {
            SanStyle::Ascii => "=",
            SanStyle::Fancy => "",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CheckMark {
    None,
    Check,
    Checkmate,
}

#[derive(Clone, Debug)]
enum SanData {
    /// SAN also accepts plain UCI notation.
    Uci(UciMove),
    Castling(CastlingSide),
    Simple {
        piece: Piece,
        /// For a short capture (`fg`) the rank is unknown at parse time
        /// and set to `R8` as a placeholder.
        dst: Square,
        is_capture: bool,
        is_short_capture: bool,
        promote: Option<Piece>,
        file: Option<File>,
        rank: Option<Rank>,
    },
}

#[derive(Clone, Debug)]
struct SanMove {
    data: SanData,
    check: CheckMark,
}

/// Determine the minimum source qualifier needed to make `mv` unique
/// among `candidates`: the file unless another candidate shares it (then
/// the rank; both if the rank is shared too).
fn resolve_ambiguity(mv: Move, candidates: &MoveList) -> (bool, bool) {
    let mut sim_any = false;
    let mut sim_file = false;
    let mut sim_rank = false;
    for cand in candidates {
        if *cand == mv {
            continue;
        }
        sim_any = true;
        if mv.src().file() == cand.src().file() {
            sim_file = true;
        }
        if mv.src().rank() == cand.src().rank() {
            sim_rank = true;
        }
    }
    let needs_file = sim_any && (sim_rank || !sim_file);
    let needs_rank = sim_any && sim_file;
    (needs_file, needs_rank)
}

/// Select the unique candidate whose source matches the file/rank
/// qualifiers.
fn select_move(
    file: Option<File>,
    rank: Option<Rank>,
    candidates: &MoveList,
) -> Result<Move, SanError> {
    let mut srcs = Bitboard::FULL;
    if let Some(f) = file {
        srcs &= Bitboard::file(f);
    }
    if let Some(r) = rank {
        srcs &= Bitboard::rank(r);
    }
    let mut found: Option<Move> = None;
    for cand in candidates {
        if !srcs.has(cand.src()) {
            continue;
        }
        if let Some(prev) = found {
            return Err(SanError::Ambiguous {
                first: prev.to_string(),
                second: cand.to_string(),
            });
        }
        found = Some(*cand);
    }
    found.ok_or(SanError::NoSuchMove)
}

fn san_from_move_without_check(mv: Move, board: &Board) -> SanMove {
    if mv.kind() == MoveKind::Null {
        return SanMove {
            data: SanData::Uci(UciMove::Null),
            check: CheckMark::None,
        };
    }
    if let Some(side) = mv.kind().castling_side() {
        return SanMove {
            data: SanData::Castling(side),
            check: CheckMark::None,
        };
    }

    // Non-null moves always carry an occupied source cell.
    let piece = mv.src_cell().piece().unwrap();
    let is_capture = mv.kind() == MoveKind::Enpassant || board.get(mv.dst()).is_occupied();
    let mut file = None;
    let mut rank = None;

    if piece == Piece::Pawn {
        if is_capture {
            file = Some(mv.src().file());
        }
    } else {
        let candidates = board.san_candidates(piece, mv.dst());
        let (needs_file, needs_rank) = resolve_ambiguity(mv, &candidates);
        if needs_file {
            file = Some(mv.src().file());
        }
        if needs_rank {
            rank = Some(mv.src().rank());
        }
    }

    SanMove {
        data: SanData::Simple {
            piece,
            dst: mv.dst(),
            is_capture,
            is_short_capture: false,
            promote: mv.kind().promote(),
            file,
            rank,
        },
        check: CheckMark::None,
    }
}

fn san_from_move(mv: Move, board: &Board) -> Result<SanMove, SanError> {
    let mut scratch = board.clone();
    scratch.make_move(mv)?;
    let mut san = san_from_move_without_check(mv, board);
    if scratch.is_check() {
        san.check = if scratch.has_legal_moves() {
            CheckMark::Check
        } else {
            CheckMark::Checkmate
        };
    }
    Ok(san)
}

fn parse_without_check(s: &str) -> Result<SanMove, SanError> {
    if s.is_empty() {
        return Err(SanError::Empty);
    }
    if s == "O-O-O" || s == "0-0-0" {
        return Ok(SanMove {
            data: SanData::Castling(CastlingSide::Queenside),
            check: CheckMark::None,
        });
    }
    if s == "O-O" || s == "0-0" {
        return Ok(SanMove {
            data: SanData::Castling(CastlingSide::Kingside),
            check: CheckMark::None,
        });
    }
    if let Ok(uci) = s.parse::<UciMove>() {
        return Ok(SanMove {
            data: SanData::Uci(uci),
            check: CheckMark::None,
        });
    }

    let b = s.as_bytes();
    match b[0] {
        b'K' | b'N' | b'B' | b'R' | b'Q' => {
            let piece = match b[0] {
                b'K' => Piece::King,
                b'N' => Piece::Knight,
                b'B' => Piece::Bishop,
                b'R' => Piece::Rook,
                _ => Piece::Queen,
            };
            let mut rest = &b[1..];
            if rest.len() < 2 {
                return Err(SanError::NotWellFormed);
            }
            let dst: Square = std::str::from_utf8(&rest[rest.len() - 2..])
                .map_err(|_| SanError::NotWellFormed)?
                .parse()
                .map_err(SanError::BadDst)?;
            rest = &rest[..rest.len() - 2];

            let mut file = None;
            let mut rank = None;
            let mut is_capture = false;
            if let Some(&ch) = rest.first() {
                if ch.is_ascii_lowercase() && (b'a'..=b'h').contains(&ch) {
                    file = Some(File::from_char(ch as char).unwrap());
                    rest = &rest[1..];
                }
            }
            if let Some(&ch) = rest.first() {
                if (b'1'..=b'8').contains(&ch) {
                    rank = Some(Rank::from_char(ch as char).unwrap());
                    rest = &rest[1..];
                }
            }
            if let Some(&ch) = rest.first() {
                if ch == b':' || ch == b'x' {
                    is_capture = true;
                    rest = &rest[1..];
                }
            }
            if !rest.is_empty() {
                return Err(SanError::NotWellFormed);
            }
            Ok(SanMove {
                data: SanData::Simple {
                    piece,
                    dst,
                    is_capture,
                    is_short_capture: false,
                    promote: None,
                    file,
                    rank,
                },
                check: CheckMark::None,
            })
        }
        _ => {
            // Pawn move
            let mut rest = b;
            let promote = match rest.last() {
                Some(b'N') => Some(Piece::Knight),
                Some(b'B') => Some(Piece::Bishop),
                Some(b'R') => Some(Piece::Rook),
                Some(b'Q') => Some(Piece::Queen),
                _ => None,
            };
            if promote.is_some() {
                rest = &rest[..rest.len() - 1];
                if rest.last() == Some(&b'=') {
                    rest = &rest[..rest.len() - 1];
                }
            }
            if rest.len() < 2 {
                return Err(SanError::NotWellFormed);
            }

            let is_file = |ch: u8| (b'a'..=b'h').contains(&ch);
            if rest.len() == 2 && is_file(rest[0]) && is_file(rest[1]) {
                // Short capture (e.g. `fg`); the destination rank is
                // resolved against the position later.
                let src_file = File::from_char(rest[0] as char).unwrap();
                let dst_file = File::from_char(rest[1] as char).unwrap();
                return Ok(SanMove {
                    data: SanData::Simple {
                        piece: Piece::Pawn,
                        dst: Square::new(dst_file, Rank::R8),
                        is_capture: true,
                        is_short_capture: true,
                        promote,
                        file: Some(src_file),
                        rank: None,
                    },
                    check: CheckMark::None,
                });
            }

            let dst: Square = std::str::from_utf8(&rest[rest.len() - 2..])
                .map_err(|_| SanError::NotWellFormed)?
                .parse()
                .map_err(SanError::BadDst)?;
            rest = &rest[..rest.len() - 2];
            let (is_capture, file) = match rest.len() {
                0 => (false, None),
                2 if is_file(rest[0]) && (rest[1] == b':' || rest[1] == b'x') => (
                    true,
                    Some(File::from_char(rest[0] as char).unwrap()),
                ),
                _ => return Err(SanError::NotWellFormed),
            };
            Ok(SanMove {
                data: SanData::Simple {
                    piece: Piece::Pawn,
                    dst,
                    is_capture,
                    is_short_capture: false,
                    promote,
                    file,
                    rank: None,
                },
                check: CheckMark::None,
            })
        }
    }
}

fn parse_san(s: &str) -> Result<SanMove, SanError> {
    if !s.is_ascii() {
        return Err(SanError::NotWellFormed);
    }
    let (rest, check) = if let Some(rest) = s.strip_suffix("++") {
        (rest, CheckMark::Checkmate)
    } else if let Some(rest) = s.strip_suffix('#') {
        (rest, CheckMark::Checkmate)
    } else if let Some(rest) = s.strip_suffix('+') {
        (rest, CheckMark::Check)
    } else {
        (s, CheckMark::None)
    };
    let mut san = parse_without_check(rest)?;
    san.check = check;
    Ok(san)
}

impl SanMove {
    fn styled(&self, style: SanStyle) -> Result<String, SanError> {
        let mut res = self.styled_without_check(style)?;
        match self.check {
            CheckMark::None => {}
            CheckMark::Check => res.push('+'),
            CheckMark::Checkmate => res.push('#'),
        }
        Ok(res)
    }

    fn styled_without_check(&self, style: SanStyle) -> Result<String, SanError> {
        match &self.data {
            SanData::Uci(uci) => Ok(uci.to_string()),
            SanData::Castling(CastlingSide::Queenside) => Ok("O-O-O".to_string()),
            SanData::Castling(CastlingSide::Kingside) => Ok("O-O".to_string()),
            SanData::Simple {
                piece,
                dst,
                is_capture,
                is_short_capture,
                promote,
                file,
                rank,
            } => {
                let mut res = String::new();
                match piece {
                    Piece::Pawn => {
                        if *is_capture {
                            let Some(file) = file else {
                                return Err(SanError::NotWellFormed);
                            };
                            if rank.is_some() {
                                return Err(SanError::NotWellFormed);
                            }
                            if *is_short_capture {
                                res.push(file.to_char());
                                res.push(dst.file().to_char());
                            } else {
                                res.push(file.to_char());
                                res.push('x');
                                res.push_str(&dst.to_string());
                            }
                        } else {
                            if file.is_some() || rank.is_some() {
                                return Err(SanError::NotWellFormed);
                            }
                            res.push_str(&dst.to_string());
                        }
                        if let Some(p) = promote {
                            if MoveKind::from_promote(*p).is_none() {
                                return Err(SanError::NotWellFormed);
                            }
                            res.push_str(style.promote_sign());
                            res.push_str(style.piece_str(*p));
                        }
                    }
                    _ => {
                        if *is_short_capture || promote.is_some() {
                            return Err(SanError::NotWellFormed);
                        }
                        res.push_str(style.piece_str(*piece));
                        if let Some(f) = file {
                            res.push(f.to_char());
                        }
                        if let Some(r) = rank {
                            res.push(r.to_char());
                        }
                        if *is_capture {
                            res.push('x');
                        }
                        res.push_str(&dst.to_string());
                    }
                }
                Ok(res)
            }
        }
    }

    /// Convert to a legal move on `board`. Returns the move and whether it
    /// still needs full validation (candidate-based paths are legal by
    /// construction).
    fn to_move_impl(&self, board: &Board) -> Result<(Move, bool), SanError> {
        match &self.data {
            SanData::Uci(uci) => Ok((uci.to_move(board)?, true)),
            SanData::Castling(side) => Ok((Move::from_castling(board.side(), *side), true)),
            SanData::Simple {
                piece,
                dst,
                is_capture,
                is_short_capture,
                promote,
                file,
                rank,
            } => match piece {
                Piece::Pawn => {
                    let side = board.side();
                    let pawn = Cell::from_parts(side, Piece::Pawn);
                    let kind = match promote {
                        Some(p) => MoveKind::from_promote(*p).ok_or(SanError::NotWellFormed)?,
                        None => MoveKind::Simple,
                    };
                    if *is_capture {
                        if rank.is_some() {
                            return Err(SanError::NotWellFormed);
                        }
                        let Some(src_file) = file else {
                            return Err(SanError::NotWellFormed);
                        };
                        if *is_short_capture {
                            let moves =
                                board.san_pawn_capture_candidates(*src_file, dst.file(), *promote);
                            Ok((select_move(None, None, &moves)?, false))
                        } else {
                            if dst.rank() == home_rank(side) {
                                return Err(SanError::Move(
                                    super::error::MoveError::NotWellFormed,
                                ));
                            }
                            let mut kind = kind;
                            if board.ep_dest() == Some(*dst) {
                                if kind != MoveKind::Simple {
                                    return Err(SanError::Move(
                                        super::error::MoveError::NotWellFormed,
                                    ));
                                }
                                kind = MoveKind::Enpassant;
                            }
                            if kind != MoveKind::Enpassant && board.get(*dst).is_free() {
                                return Err(SanError::CaptureExpected);
                            }
                            let src = Square::new(*src_file, dst.rank())
                                .add(-pawn_forward_delta(side));
                            let mv = Move::new(kind, pawn, src, *dst)?;
                            Ok((mv, true))
                        }
                    } else {
                        if *is_short_capture || file.is_some() || rank.is_some() {
                            return Err(SanError::NotWellFormed);
                        }
                        if dst.rank() == home_rank(side) {
                            return Err(SanError::Move(super::error::MoveError::NotWellFormed));
                        }
                        let mut kind = kind;
                        let mut src = dst.add(-pawn_forward_delta(side));
                        if board.get(src).is_free() {
                            // No pawn one step behind: must be a double push.
                            if kind != MoveKind::Simple {
                                return Err(SanError::Move(
                                    super::error::MoveError::NotWellFormed,
                                ));
                            }
                            src = Square::new(dst.file(), pawn_home_rank(side));
                            kind = MoveKind::PawnDouble;
                        }
                        let mv = Move::new(kind, pawn, src, *dst)?;
                        Ok((mv, true))
                    }
                }
                _ => {
                    if *is_short_capture || promote.is_some() {
                        return Err(SanError::NotWellFormed);
                    }
                    if *is_capture && board.get(*dst).is_free() {
                        return Err(SanError::CaptureExpected);
                    }
                    let moves = board.san_candidates(*piece, *dst);
                    Ok((select_move(*file, *rank, &moves)?, false))
                }
            },
        }
    }

    fn to_legal_move(&self, board: &Board) -> Result<Move, SanError> {
        let (mv, needs_validate) = self.to_move_impl(board)?;
        if needs_validate {
            mv.validate(board)?;
        }
        Ok(mv)
    }
}

/// Parse a SAN string and resolve it to a legal move on `board`.
pub(crate) fn legal_move_from_san(s: &str, board: &Board) -> Result<Move, SanError> {
    parse_san(s)?.to_legal_move(board)
}

/// Render a legal move as SAN, with the minimal disambiguation qualifier
/// and a trailing `+`/`#` as appropriate.
pub(crate) fn move_to_san(mv: Move, board: &Board, style: SanStyle) -> Result<String, SanError> {
    san_from_move(mv, board)?.styled(style)
}

impl Move {
    /// Parse a move from SAN, accepting UCI notation and castling in both
    /// `O-O` and `0-0` forms. The result is guaranteed legal on `board`.
    pub fn from_san(s: &str, board: &Board) -> Result<Move, SanError> {
        legal_move_from_san(s, board)
    }

    /// The SAN rendering of this move on `board` (ASCII style).
    pub fn san(self, board: &Board) -> Result<String, SanError> {
        move_to_san(self, board, SanStyle::Ascii)
    }
}
