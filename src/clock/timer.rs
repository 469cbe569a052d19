//! Per-side chess clocks driven by a multi-stage time control.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::board::{Color, Outcome, Verdict};

use super::control::{Control, ControlSide};

/// Injectable time source; defaults to [`Instant::now`]. Tests substitute
/// a fake clock to get deterministic timings.
pub type NowFn = Arc<dyn Fn() -> Instant + Send + Sync>;

/// Per-side remaining time and ticking flags at one observation point.
///
/// At most one side ticks, and only while the game is running; the ticking
/// side's remaining time already accounts for the time since the last
/// flip. Overdrawn clocks are reported as zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockView {
    pub white: Duration,
    pub black: Duration,
    pub white_ticking: bool,
    pub black_ticking: bool,
}

/// The timer state expressed as UCI `go` time fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UciTimeSpec {
    pub wtime: Duration,
    pub btime: Duration,
    pub winc: Duration,
    pub binc: Duration,
    /// Moves remaining in the current stage; 0 for sudden death.
    pub moves_to_go: u32,
}

impl UciTimeSpec {
    /// Validity for use in a `go` command.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.wtime > Duration::ZERO && self.btime > Duration::ZERO
    }
}

/// One side's position within its control: the current stage and the
/// moves left in it.
#[derive(Clone, Debug)]
struct SubController {
    control: ControlSide,
    item: usize,
    left: u32,
}

impl SubController {
    fn new(control: &ControlSide, remaining: &mut i64) -> SubController {
        let first = control.items()[0];
        *remaining = first.time.as_nanos() as i64;
        SubController {
            control: control.clone(),
            item: 0,
            left: first.moves,
        }
    }

    fn cur(&self) -> super::control::ControlItem {
        self.control.items()[self.item]
    }

    fn flip(&mut self, remaining: &mut i64) {
        *remaining += self.cur().inc.as_nanos() as i64;
        if self.cur().moves != 0 {
            self.left -= 1;
            if self.left == 0 {
                if self.item + 1 < self.control.items().len() {
                    self.item += 1;
                }
                self.left = self.cur().moves;
                *remaining += self.cur().time.as_nanos() as i64;
            }
        }
    }
}

/// Options for [`Timer::new`].
#[derive(Clone, Default)]
pub struct TimerOptions {
    /// Replay this many flips at construction, reconstructing a timer
    /// mid-game (each flip applies one move's worth of increments).
    pub num_flips: usize,
    /// An outcome to preload, unless a forfeit is discovered first.
    pub outcome: Option<Outcome>,
    /// Time source override.
    pub now: Option<NowFn>,
}

/// A two-sided chess clock with multi-stage controls, increments and time
/// forfeit detection.
pub struct Timer {
    side: Color,
    outcome: Outcome,
    /// The moment the ticking side's clock was last settled.
    anchor: Instant,
    now_fn: NowFn,
    sub: [SubController; 2],
    /// Remaining time per side in nanoseconds; negative when overdrawn.
    remaining: [i64; 2],
}

impl Timer {
    #[must_use]
    pub fn new(side: Color, control: &Control, options: TimerOptions) -> Timer {
        let now_fn: NowFn = options.now.unwrap_or_else(|| Arc::new(Instant::now));
        let mut remaining = [0i64; 2];
        let sub = [
            SubController::new(control.side(Color::White), &mut remaining[0]),
            SubController::new(control.side(Color::Black), &mut remaining[1]),
        ];
        let mut timer = Timer {
            side,
            outcome: Outcome::running(),
            anchor: now_fn(),
            now_fn,
            sub,
            remaining,
        };
        timer.check_forfeit();
        for _ in 0..options.num_flips {
            if timer.outcome.is_finished() {
                break;
            }
            timer.do_flip();
            timer.check_forfeit();
        }
        if let Some(outcome) = options.outcome {
            if outcome.is_finished() && !timer.outcome.is_finished() {
                timer.outcome = outcome;
            }
        }
        timer
    }

    #[must_use]
    pub fn side(&self) -> Color {
        self.side
    }

    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    fn nanos_to_duration(nanos: i64) -> Duration {
        Duration::from_nanos(nanos.max(0) as u64)
    }

    /// The current per-side clocks.
    #[must_use]
    pub fn clock(&self) -> ClockView {
        let mut view = ClockView {
            white: Self::nanos_to_duration(self.remaining[0]),
            black: Self::nanos_to_duration(self.remaining[1]),
            white_ticking: false,
            black_ticking: false,
        };
        if self.outcome.is_finished() {
            return view;
        }
        let now = (self.now_fn)();
        let mut ticking_left = self.remaining[self.side.index()];
        if now > self.anchor {
            ticking_left -= (now - self.anchor).as_nanos() as i64;
        }
        match self.side {
            Color::White => {
                view.white_ticking = true;
                view.white = Self::nanos_to_duration(ticking_left);
            }
            Color::Black => {
                view.black_ticking = true;
                view.black = Self::nanos_to_duration(ticking_left);
            }
        }
        view
    }

    /// The moment the ticking side forfeits, unless it moves first.
    /// `None` once the timer is stopped.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        if self.outcome.is_finished() {
            return None;
        }
        Some(self.anchor + Self::nanos_to_duration(self.remaining[self.side.index()]))
    }

    fn check_forfeit(&mut self) {
        if !self.outcome.is_finished() && self.remaining[self.side.index()] <= 0 {
            self.outcome = Outcome::win(Verdict::TimeForfeit, self.side.inv()).unwrap();
        }
    }

    /// Settle the ticking side's clock against the wall clock, possibly
    /// triggering a forfeit. Safe to call at any time for monitoring.
    pub fn update(&mut self) {
        if self.outcome.is_finished() {
            return;
        }
        let now = (self.now_fn)();
        if now > self.anchor {
            self.remaining[self.side.index()] -= (now - self.anchor).as_nanos() as i64;
            self.anchor = now;
        }
        self.check_forfeit();
    }

    fn do_flip(&mut self) {
        self.sub[self.side.index()].flip(&mut self.remaining[self.side.index()]);
        self.side = self.side.inv();
    }

    /// Switch the clock after a move: charge the elapsed time, detect
    /// forfeit, apply the increment and stage transition, then hand the
    /// clock to the opponent.
    pub fn flip(&mut self) {
        if self.outcome.is_finished() {
            return;
        }
        self.update();
        if self.outcome.is_finished() {
            return;
        }
        self.do_flip();
    }

    /// Stop the clock with `outcome`. A forfeit discovered during the
    /// last-moment update wins over the given outcome (it is the earlier
    /// real event). A running outcome is ignored.
    pub fn stop(&mut self, outcome: Outcome) {
        if !outcome.is_finished() || self.outcome.is_finished() {
            return;
        }
        self.update();
        if self.outcome.is_finished() {
            return;
        }
        self.outcome = outcome;
    }

    /// The timer state as UCI `go` time fields.
    #[must_use]
    pub fn uci_time_spec(&self) -> UciTimeSpec {
        UciTimeSpec {
            wtime: Self::nanos_to_duration(self.remaining[0]),
            btime: Self::nanos_to_duration(self.remaining[1]),
            winc: self.sub[0].cur().inc,
            binc: self.sub[1].cur().inc,
            moves_to_go: self.sub[self.side.index()].left,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// A controllable time source for deterministic timer tests.
    #[derive(Clone)]
    pub(crate) struct FakeClock {
        inner: Arc<Mutex<Instant>>,
    }

    impl FakeClock {
        pub(crate) fn new() -> FakeClock {
            FakeClock {
                inner: Arc::new(Mutex::new(Instant::now())),
            }
        }

        pub(crate) fn advance(&self, d: Duration) {
            *self.inner.lock() += d;
        }

        pub(crate) fn now_fn(&self) -> NowFn {
            let inner = Arc::clone(&self.inner);
            Arc::new(move || *inner.lock())
        }
    }

    fn make_timer(control: &str, clock: &FakeClock) -> Timer {
        Timer::new(
            Color::White,
            &control.parse().unwrap(),
            TimerOptions {
                now: Some(clock.now_fn()),
                ..TimerOptions::default()
            },
        )
    }

    #[test]
    fn test_initial_clock() {
        let fake = FakeClock::new();
        let timer = make_timer("60+1", &fake);
        let view = timer.clock();
        assert_eq!(view.white, Duration::from_secs(60));
        assert_eq!(view.black, Duration::from_secs(60));
        assert!(view.white_ticking);
        assert!(!view.black_ticking);
    }

    #[test]
    fn test_flip_subtracts_and_increments() {
        let fake = FakeClock::new();
        let mut timer = make_timer("60+1", &fake);
        fake.advance(Duration::from_secs(5));
        timer.flip();
        // 60 - 5 + 1 increment
        let view = timer.clock();
        assert_eq!(view.white, Duration::from_secs(56));
        assert!(view.black_ticking);
        assert_eq!(timer.side(), Color::Black);
    }

    #[test]
    fn test_ticking_side_decreases_in_view() {
        let fake = FakeClock::new();
        let timer = make_timer("60", &fake);
        fake.advance(Duration::from_secs(10));
        let view = timer.clock();
        assert_eq!(view.white, Duration::from_secs(50));
        assert_eq!(view.black, Duration::from_secs(60));
    }

    #[test]
    fn test_forfeit_on_flip() {
        let fake = FakeClock::new();
        let mut timer = make_timer("60", &fake);
        fake.advance(Duration::from_secs(61));
        timer.flip();
        assert_eq!(timer.outcome().verdict(), Verdict::TimeForfeit);
        assert_eq!(timer.outcome().side(), Some(Color::Black));
        // The flip did not happen; the loser stays on move.
        assert_eq!(timer.side(), Color::White);
        assert_eq!(timer.deadline(), None);
    }

    #[test]
    fn test_forfeit_on_update() {
        let fake = FakeClock::new();
        let mut timer = make_timer("60", &fake);
        fake.advance(Duration::from_secs(30));
        timer.update();
        assert!(!timer.outcome().is_finished());
        fake.advance(Duration::from_secs(31));
        timer.update();
        assert_eq!(timer.outcome().verdict(), Verdict::TimeForfeit);
    }

    #[test]
    fn test_stage_transition() {
        let fake = FakeClock::new();
        let mut timer = make_timer("2/60:30+1", &fake);
        assert_eq!(timer.uci_time_spec().moves_to_go, 2);
        timer.flip(); // white move 1
        timer.flip(); // black move 1
        assert_eq!(timer.uci_time_spec().moves_to_go, 1);
        timer.flip(); // white move 2 enters the next stage
        let view = timer.clock();
        // 60 + 30 from the new stage (no increment in the first stage)
        assert_eq!(view.white, Duration::from_secs(90));
        timer.flip();
        // Now in the final stage: increments apply, moves_to_go is 0.
        assert_eq!(timer.uci_time_spec().moves_to_go, 0);
        assert_eq!(timer.uci_time_spec().winc, Duration::from_secs(1));
    }

    #[test]
    fn test_final_stage_repeats() {
        let fake = FakeClock::new();
        let mut timer = make_timer("1/60", &fake);
        for _ in 0..6 {
            timer.flip();
        }
        // Each completed stage re-adds its minute.
        assert_eq!(timer.clock().white, Duration::from_secs(240));
    }

    #[test]
    fn test_pre_flips_reconstruct_state() {
        let fake = FakeClock::new();
        let control: Control = "60+1".parse().unwrap();
        let timer = Timer::new(
            Color::White,
            &control,
            TimerOptions {
                num_flips: 4,
                now: Some(fake.now_fn()),
                ..TimerOptions::default()
            },
        );
        // Two flips per side, each granting one increment.
        let view = timer.clock();
        assert_eq!(view.white, Duration::from_secs(62));
        assert_eq!(view.black, Duration::from_secs(62));
        assert_eq!(timer.side(), Color::White);
    }

    #[test]
    fn test_stop_prefers_forfeit() {
        let fake = FakeClock::new();
        let mut timer = make_timer("60", &fake);
        fake.advance(Duration::from_secs(61));
        // The stop outcome loses to the forfeit that already happened.
        timer.stop(Outcome::win(Verdict::Resign, Color::White).unwrap());
        assert_eq!(timer.outcome().verdict(), Verdict::TimeForfeit);
    }

    #[test]
    fn test_stop_with_running_outcome_is_noop() {
        let fake = FakeClock::new();
        let mut timer = make_timer("60", &fake);
        timer.stop(Outcome::running());
        assert!(!timer.outcome().is_finished());
    }

    #[test]
    fn test_deadline() {
        let fake = FakeClock::new();
        let fake_now = (fake.now_fn())();
        let timer = make_timer("60", &fake);
        assert_eq!(timer.deadline().unwrap(), fake_now + Duration::from_secs(60));
    }

    #[test]
    fn test_uci_time_spec_validity() {
        let fake = FakeClock::new();
        let timer = make_timer("60+1", &fake);
        let spec = timer.uci_time_spec();
        assert!(spec.is_valid());
        assert_eq!(spec.wtime, Duration::from_secs(60));
        assert_eq!(spec.winc, Duration::from_secs(1));
        assert_eq!(spec.moves_to_go, 0);
    }
}
