//! Game verdicts, outcomes and result status.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::piece::Color;

/// The reason a game ended (or `Running`).
///
/// The top three bits of the tag encode the verdict class (running=0,
/// draw=1, win=2), so [`Verdict::kind`] is a single shift.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Verdict {
    Running = 0,

    // Draw verdicts
    DrawUnknown = 32,
    Stalemate = 33,
    InsufficientMaterial = 34,
    Moves75 = 35,
    Repeat5 = 36,
    Moves50 = 37,
    Repeat3 = 38,
    DrawAgreement = 39,

    // Win verdicts
    WinUnknown = 64,
    Checkmate = 65,
    TimeForfeit = 66,
    InvalidMove = 67,
    EngineError = 68,
    Resign = 69,
    OpponentAbandon = 70,
}

/// The coarse class of a verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VerdictKind {
    Running = 0,
    Draw = 1,
    Win = 2,
}

/// Policy selecting which termination conditions may be committed to a
/// game's outcome.
///
/// `Force` commits only checkmate and stalemate. `Strict` adds the
/// mandatory FIDE terminations (insufficient material, 75 moves, fivefold
/// repetition). `Relaxed` additionally commits the claimable ones
/// (50 moves, threefold repetition).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VerdictFilter {
    Force = 0,
    Strict = 1,
    Relaxed = 2,
}

impl Verdict {
    #[inline]
    #[must_use]
    pub const fn kind(self) -> VerdictKind {
        match self as u8 >> 5 {
            0 => VerdictKind::Running,
            1 => VerdictKind::Draw,
            _ => VerdictKind::Win,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_finished(self) -> bool {
        !matches!(self.kind(), VerdictKind::Running)
    }

    /// Whether this verdict may be committed under the given filter.
    #[must_use]
    pub const fn passes(self, filter: VerdictFilter) -> bool {
        let level = filter as u8;
        match self {
            Verdict::Checkmate | Verdict::Stalemate | Verdict::Running => {
                level >= VerdictFilter::Force as u8
            }
            Verdict::InsufficientMaterial | Verdict::Moves75 | Verdict::Repeat5 => {
                level >= VerdictFilter::Strict as u8
            }
            Verdict::Moves50 | Verdict::Repeat3 => level >= VerdictFilter::Relaxed as u8,
            _ => false,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Running => "",
            Verdict::DrawUnknown => "draw by unknown reason",
            Verdict::Stalemate => "stalemate",
            Verdict::InsufficientMaterial => "insufficient material",
            Verdict::Moves75 => "75 move rule",
            Verdict::Repeat5 => "fivefold repetition",
            Verdict::Moves50 => "50 move rule",
            Verdict::Repeat3 => "threefold repetition",
            Verdict::DrawAgreement => "draw by agreement",
            Verdict::WinUnknown => "win by unknown reason",
            Verdict::Checkmate => "checkmate",
            Verdict::TimeForfeit => "opponent forfeits on time",
            Verdict::InvalidMove => "opponent made an invalid move",
            Verdict::EngineError => "opponent is a buggy chess engine",
            Verdict::Resign => "opponent resigns",
            Verdict::OpponentAbandon => "opponent abandons the game",
        };
        write!(f, "{s}")
    }
}

/// Game result as it appears in PGN move text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Status {
    Running,
    Draw,
    WhiteWins,
    BlackWins,
}

impl Status {
    #[must_use]
    pub const fn win(color: Color) -> Status {
        match color {
            Color::White => Status::WhiteWins,
            Color::Black => Status::BlackWins,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_finished(self) -> bool {
        !matches!(self, Status::Running)
    }

    #[must_use]
    pub const fn winner(self) -> Option<Color> {
        match self {
            Status::WhiteWins => Some(Color::White),
            Status::BlackWins => Some(Color::Black),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Running => "*",
            Status::Draw => "1/2-1/2",
            Status::WhiteWins => "1-0",
            Status::BlackWins => "0-1",
        };
        write!(f, "{s}")
    }
}

/// A verdict paired with the winning side (meaningful for win verdicts only).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Outcome {
    verdict: Verdict,
    side: Color,
}

impl Outcome {
    /// The running (not finished) outcome.
    #[must_use]
    pub const fn running() -> Outcome {
        Outcome {
            verdict: Verdict::Running,
            side: Color::White,
        }
    }

    /// Create a draw outcome. Returns `None` if the verdict is not a draw.
    #[must_use]
    pub const fn draw(verdict: Verdict) -> Option<Outcome> {
        match verdict.kind() {
            VerdictKind::Draw => Some(Outcome {
                verdict,
                side: Color::White,
            }),
            _ => None,
        }
    }

    /// Create a win outcome for `side`. Returns `None` if the verdict is
    /// not a win.
    #[must_use]
    pub const fn win(verdict: Verdict, side: Color) -> Option<Outcome> {
        match verdict.kind() {
            VerdictKind::Win => Some(Outcome { verdict, side }),
            _ => None,
        }
    }

    /// Create an outcome from any verdict; `side` is ignored unless the
    /// verdict is a win.
    #[must_use]
    pub const fn new(verdict: Verdict, side: Color) -> Outcome {
        match verdict.kind() {
            VerdictKind::Win => Outcome { verdict, side },
            _ => Outcome {
                verdict,
                side: Color::White,
            },
        }
    }

    #[inline]
    #[must_use]
    pub const fn verdict(self) -> Verdict {
        self.verdict
    }

    /// The winning side, for win verdicts.
    #[must_use]
    pub const fn side(self) -> Option<Color> {
        match self.verdict.kind() {
            VerdictKind::Win => Some(self.side),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_finished(self) -> bool {
        self.verdict.is_finished()
    }

    #[inline]
    #[must_use]
    pub const fn passes(self, filter: VerdictFilter) -> bool {
        self.verdict.passes(filter)
    }

    #[must_use]
    pub const fn status(self) -> Status {
        match self.verdict.kind() {
            VerdictKind::Running => Status::Running,
            VerdictKind::Draw => Status::Draw,
            VerdictKind::Win => Status::win(self.side),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !matches!(self.verdict.kind(), VerdictKind::Win) {
            return write!(f, "{}", self.verdict);
        }
        let s = self.side;
        match self.verdict {
            Verdict::WinUnknown => write!(f, "{} wins by unknown reason", s.long_name()),
            Verdict::Checkmate => write!(f, "{} checkmates", s.long_name()),
            Verdict::TimeForfeit => write!(f, "{} forfeits on time", s.inv().long_name()),
            Verdict::InvalidMove => write!(f, "{} made an invalid move", s.inv().long_name()),
            Verdict::EngineError => write!(f, "{} is a buggy chess engine", s.inv().long_name()),
            Verdict::Resign => write!(f, "{} resigns", s.inv().long_name()),
            Verdict::OpponentAbandon => write!(f, "{} abandons the game", s.inv().long_name()),
            _ => write!(f, "invalid"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_kind_is_a_shift() {
        assert_eq!(Verdict::Running.kind(), VerdictKind::Running);
        assert_eq!(Verdict::Stalemate.kind(), VerdictKind::Draw);
        assert_eq!(Verdict::Repeat3.kind(), VerdictKind::Draw);
        assert_eq!(Verdict::Checkmate.kind(), VerdictKind::Win);
        assert_eq!(Verdict::OpponentAbandon.kind(), VerdictKind::Win);
    }

    #[test]
    fn test_verdict_filter_partition() {
        assert!(Verdict::Checkmate.passes(VerdictFilter::Force));
        assert!(Verdict::Stalemate.passes(VerdictFilter::Force));
        assert!(!Verdict::Moves75.passes(VerdictFilter::Force));
        assert!(Verdict::Moves75.passes(VerdictFilter::Strict));
        assert!(Verdict::Repeat5.passes(VerdictFilter::Strict));
        assert!(!Verdict::Moves50.passes(VerdictFilter::Strict));
        assert!(Verdict::Moves50.passes(VerdictFilter::Relaxed));
        assert!(Verdict::Repeat3.passes(VerdictFilter::Relaxed));
        assert!(!Verdict::Resign.passes(VerdictFilter::Relaxed));
    }

    #[test]
    fn test_outcome_sides() {
        let o = Outcome::win(Verdict::Checkmate, Color::Black).unwrap();
        assert_eq!(o.side(), Some(Color::Black));
        assert_eq!(o.status(), Status::BlackWins);
        let d = Outcome::draw(Verdict::Stalemate).unwrap();
        assert_eq!(d.side(), None);
        assert_eq!(d.status(), Status::Draw);
        assert!(Outcome::draw(Verdict::Checkmate).is_none());
        assert!(Outcome::win(Verdict::Stalemate, Color::White).is_none());
    }

    #[test]
    fn test_outcome_display() {
        let o = Outcome::win(Verdict::Checkmate, Color::White).unwrap();
        assert_eq!(o.to_string(), "white checkmates");
        let t = Outcome::win(Verdict::TimeForfeit, Color::Black).unwrap();
        assert_eq!(t.to_string(), "white forfeits on time");
        let d = Outcome::draw(Verdict::Moves75).unwrap();
        assert_eq!(d.to_string(), "75 move rule");
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::Running.to_string(), "*");
        assert_eq!(Status::Draw.to_string(), "1/2-1/2");
        assert_eq!(Status::WhiteWins.to_string(), "1-0");
        assert_eq!(Status::BlackWins.to_string(), "0-1");
    }
}
