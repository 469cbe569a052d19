//! A game coupled to an optional chess clock.

use std::fmt;
use std::time::Instant;

use crate::board::{Board, Color, Move, MoveError, Outcome, VerdictFilter};
use crate::game;

use super::control::Control;
use super::timer::{ClockView, NowFn, Timer, TimerOptions, UciTimeSpec};

/// Error type for clocked-game operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockGameError {
    /// The game is already finished.
    AlreadyFinished,
    /// [`Game::finish`] needs a finishing outcome.
    OutcomeNotFinished,
    /// The pushed move failed validation.
    Move(MoveError),
}

impl fmt::Display for ClockGameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockGameError::AlreadyFinished => write!(f, "game already finished"),
            ClockGameError::OutcomeNotFinished => {
                write!(f, "outcome must finish the game")
            }
            ClockGameError::Move(e) => write!(f, "add move: {e}"),
        }
    }
}

impl std::error::Error for ClockGameError {}

impl From<MoveError> for ClockGameError {
    fn from(e: MoveError) -> Self {
        ClockGameError::Move(e)
    }
}

/// Options for [`Game::new`].
#[derive(Clone, Default)]
pub struct GameOptions {
    /// Which verdicts are committed automatically; defaults to strict.
    pub outcome_filter: Option<VerdictFilter>,
    /// Time source override, forwarded to the timer.
    pub now: Option<NowFn>,
}

/// A [`game::Game`] wrapped with an optional [`Timer`].
///
/// Pushing a move advances both the game and the clock; a time forfeit
/// discovered while the move was being made wins over the move itself
/// (the move is rolled back).
pub struct Game {
    filter: VerdictFilter,
    game: game::Game,
    timer: Option<Timer>,
}

impl Game {
    /// Wrap a game, optionally attaching a clock. The timer is pre-flipped
    /// to match the number of moves already played.
    #[must_use]
    pub fn new(game: &game::Game, control: Option<&Control>, options: GameOptions) -> Game {
        let filter = options.outcome_filter.unwrap_or(VerdictFilter::Strict);
        let mut game = game.clone();
        game.set_auto_outcome(filter);
        let timer = control.map(|control| {
            let mut num_flips = game.len();
            let outcome = game.outcome();
            if outcome.is_finished() && num_flips != 0 {
                num_flips -= 1;
            }
            Timer::new(
                game.start_pos().side,
                control,
                TimerOptions {
                    num_flips,
                    outcome: Some(outcome),
                    now: options.now,
                },
            )
        });
        Game {
            filter,
            game,
            timer,
        }
    }

    /// The wrapped game.
    #[must_use]
    pub fn inner(&self) -> &game::Game {
        &self.game
    }

    #[must_use]
    pub fn cur_board(&self) -> &Board {
        self.game.cur_board()
    }

    #[must_use]
    pub fn cur_side(&self) -> Color {
        self.game.cur_board().side()
    }

    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.game.outcome()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.game.is_finished()
    }

    #[must_use]
    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// The timer state as UCI `go` time fields, if a timer is attached.
    #[must_use]
    pub fn uci_time_spec(&self) -> Option<UciTimeSpec> {
        self.timer.as_ref().map(Timer::uci_time_spec)
    }

    /// The clock view, if a timer is attached.
    #[must_use]
    pub fn clock(&self) -> Option<ClockView> {
        self.timer.as_ref().map(Timer::clock)
    }

    /// The ticking side's forfeit deadline, if a timer is attached and
    /// running.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.timer.as_ref().and_then(Timer::deadline)
    }

    /// Settle the clock and propagate a discovered forfeit into the game
    /// outcome. Called for monitoring between moves.
    pub fn update_timer(&mut self) {
        if self.is_finished() {
            return;
        }
        let Some(timer) = &mut self.timer else {
            return;
        };
        timer.update();
        let outcome = timer.outcome();
        if outcome.is_finished() {
            self.game.set_outcome(outcome);
        }
    }

    /// Finish the game with an explicit outcome (resignation, agreement).
    /// If the clock discovers an earlier forfeit, the forfeit wins.
    pub fn finish(&mut self, outcome: Outcome) -> Result<(), ClockGameError> {
        if self.is_finished() {
            return Err(ClockGameError::AlreadyFinished);
        }
        if !outcome.is_finished() {
            return Err(ClockGameError::OutcomeNotFinished);
        }
        self.game.set_outcome(outcome);
        if let Some(timer) = &mut self.timer {
            timer.stop(outcome);
            let timer_outcome = timer.outcome();
            if timer_outcome != outcome {
                self.game.set_outcome(timer_outcome);
            }
        }
        Ok(())
    }

    /// Make a move, re-apply the outcome policy and flip the clock. If the
    /// mover's flag fell before the move, the move is rolled back and the
    /// forfeit is committed instead.
    pub fn push(&mut self, mv: Move) -> Result<(), ClockGameError> {
        if self.is_finished() {
            return Err(ClockGameError::AlreadyFinished);
        }
        self.game.push_move(mv)?;
        self.game.set_auto_outcome(self.filter);
        if let Some(timer) = &mut self.timer {
            let outcome = self.game.outcome();
            if outcome.is_finished() {
                timer.stop(outcome);
            } else {
                timer.flip();
            }
            let timer_outcome = timer.outcome();
            if timer_outcome != outcome {
                self.game.pop();
                self.game.set_outcome(timer_outcome);
            }
        }
        Ok(())
    }
}
