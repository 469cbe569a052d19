//! Chess clocks: multi-stage time controls, per-side timers with
//! increments and forfeit detection, and a clock-coupled game wrapper.

mod control;
mod game;
mod parse;
mod timer;

use std::fmt;

use crate::board::Color;

pub use control::{Control, ControlItem, ControlSide};
pub use game::{ClockGameError, Game, GameOptions};
pub use timer::{ClockView, NowFn, Timer, TimerOptions, UciTimeSpec};

/// Error type for time control parsing and validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// Time controls must not be empty.
    EmptyString,
    /// Bad move count before `/`.
    BadMoves { token: String },
    /// Bad duration (seconds with an optional decimal fraction).
    BadDuration { token: String },
    /// A non-final stage must carry a move count.
    MovesRequired,
    /// A side's control must have at least one stage.
    NoItems,
    /// The first stage must grant some time.
    ZeroInitialTime,
    /// Error in stage `index` (1-based).
    Item {
        index: usize,
        error: Box<ControlError>,
    },
    /// Error in one side of a split control.
    ForSide {
        side: Color,
        error: Box<ControlError>,
    },
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::EmptyString => write!(f, "empty time control"),
            ControlError::BadMoves { token } => write!(f, "parse moves {token:?}"),
            ControlError::BadDuration { token } => write!(f, "parse duration {token:?}"),
            ControlError::MovesRequired => {
                write!(f, "number of moves must be specified for non-final controls")
            }
            ControlError::NoItems => write!(f, "no time control"),
            ControlError::ZeroInitialTime => write!(f, "initial time must be positive"),
            ControlError::Item { index, error } => write!(f, "section #{index}: {error}"),
            ControlError::ForSide { side, error } => {
                write!(f, "{}: {error}", side.long_name())
            }
        }
    }
}

impl std::error::Error for ControlError {}
