//! Time control descriptions and their text syntax.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::board::Color;

use super::parse::{format_duration, parse_duration};
use super::ControlError;

/// One stage of a time control: `[moves/]time[+inc]`.
///
/// `moves == 0` means "for the rest of the game" and is valid only in the
/// final stage of a side's control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlItem {
    pub time: Duration,
    pub inc: Duration,
    pub moves: u32,
}

impl ControlItem {
    fn parse(s: &str) -> Result<ControlItem, ControlError> {
        let mut item = ControlItem {
            time: Duration::ZERO,
            inc: Duration::ZERO,
            moves: 0,
        };
        let mut rest = s;
        if let Some(pos) = rest.find('/') {
            let moves_str = &rest[..pos];
            rest = &rest[pos + 1..];
            item.moves = moves_str.parse().map_err(|_| ControlError::BadMoves {
                token: moves_str.to_string(),
            })?;
        }
        if let Some(pos) = rest.find('+') {
            item.inc = parse_duration(&rest[pos + 1..])?;
            rest = &rest[..pos];
        }
        item.time = parse_duration(rest)?;
        Ok(item)
    }

    /// Parse a single stage, validating it for its position in the list.
    pub fn from_str_checked(s: &str, is_final: bool) -> Result<ControlItem, ControlError> {
        let item = Self::parse(s)?;
        item.validate(is_final)?;
        Ok(item)
    }

    pub fn validate(&self, is_final: bool) -> Result<(), ControlError> {
        if !is_final && self.moves == 0 {
            return Err(ControlError::MovesRequired);
        }
        Ok(())
    }
}

impl fmt::Display for ControlItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.moves != 0 {
            write!(f, "{}/", self.moves)?;
        }
        write!(f, "{}", format_duration(self.time))?;
        if self.inc != Duration::ZERO {
            write!(f, "+{}", format_duration(self.inc))?;
        }
        Ok(())
    }
}

/// One side's time control: a non-empty list of stages joined by `:`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlSide {
    items: Vec<ControlItem>,
}

impl ControlSide {
    /// Create from stages, validating the list shape.
    pub fn new(items: Vec<ControlItem>) -> Result<ControlSide, ControlError> {
        let side = ControlSide { items };
        side.validate()?;
        Ok(side)
    }

    #[must_use]
    pub fn items(&self) -> &[ControlItem] {
        &self.items
    }

    pub fn validate(&self) -> Result<(), ControlError> {
        if self.items.is_empty() {
            return Err(ControlError::NoItems);
        }
        for (i, item) in self.items.iter().enumerate() {
            item.validate(i == self.items.len() - 1)
                .map_err(|error| ControlError::Item {
                    index: i + 1,
                    error: Box::new(error),
                })?;
        }
        if self.items[0].time == Duration::ZERO {
            return Err(ControlError::ZeroInitialTime);
        }
        Ok(())
    }
}

impl fmt::Display for ControlSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i != 0 {
                write!(f, ":")?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

impl FromStr for ControlSide {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ControlError::EmptyString);
        }
        let items = s
            .split(':')
            .enumerate()
            .map(|(i, sub)| {
                ControlItem::parse(sub).map_err(|error| ControlError::Item {
                    index: i + 1,
                    error: Box::new(error),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        ControlSide::new(items)
    }
}

/// A complete time control: one [`ControlSide`] per side. The text form
/// collapses to a single side when both are equal, or splits them with
/// `|` (`<white>|<black>`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Control {
    pub white: ControlSide,
    pub black: ControlSide,
}

impl Control {
    /// The same control for both sides.
    #[must_use]
    pub fn symmetric(side: ControlSide) -> Control {
        Control {
            white: side.clone(),
            black: side,
        }
    }

    #[must_use]
    pub fn side(&self, color: Color) -> &ControlSide {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    pub fn validate(&self) -> Result<(), ControlError> {
        self.white.validate().map_err(|error| ControlError::ForSide {
            side: Color::White,
            error: Box::new(error),
        })?;
        self.black.validate().map_err(|error| ControlError::ForSide {
            side: Color::Black,
            error: Box::new(error),
        })
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.white == self.black {
            write!(f, "{}", self.white)
        } else {
            write!(f, "{}|{}", self.white, self.black)
        }
    }
}

impl FromStr for Control {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(pos) = s.find('|') {
            let white = s[..pos].parse().map_err(|error| ControlError::ForSide {
                side: Color::White,
                error: Box::new(error),
            })?;
            let black = s[pos + 1..]
                .parse()
                .map_err(|error| ControlError::ForSide {
                    side: Color::Black,
                    error: Box::new(error),
                })?;
            Ok(Control { white, black })
        } else {
            Ok(Control::symmetric(s.parse()?))
        }
    }
}
