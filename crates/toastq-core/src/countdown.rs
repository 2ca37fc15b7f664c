use std::time::Duration;

/// Interval between two countdown ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Phase of a [`Countdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    /// Created, first tick not yet delivered.
    Armed,
    /// At least one tick delivered, more to come.
    Ticking,
    /// Halted by the user before expiry. Further ticks are ignored.
    Stopped,
    /// Final decrement done. Further ticks are ignored.
    Expired,
}

/// Seconds-left counter of a toast with a TTL.
///
/// The counter keeps the fractional part of the TTL: a 2500ms toast shows 2.5, then 1.5,
/// then 0.5. It is display-only; reaching its terminal value never removes the toast, the
/// dismiss timer does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    remaining_ms: i64,
    state: CountdownState,
}

impl Countdown {
    /// Starts at the full TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            remaining_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            state: CountdownState::Armed,
        }
    }

    /// Seconds left, as displayed.
    pub fn remaining(&self) -> f64 {
        self.remaining_ms as f64 / 1000.0
    }

    /// Milliseconds left.
    pub fn remaining_millis(&self) -> i64 {
        self.remaining_ms
    }

    /// Current phase.
    pub fn state(&self) -> CountdownState {
        self.state
    }

    /// Applies one tick. Returns `true` when another tick should be scheduled.
    ///
    /// Above one second the counter drops by a second and keeps ticking. Otherwise it
    /// drops once more and expires.
    pub fn tick(&mut self) -> bool {
        let step = i64::try_from(TICK_INTERVAL.as_millis()).unwrap_or(i64::MAX);
        match self.state {
            CountdownState::Stopped | CountdownState::Expired => false,
            CountdownState::Armed | CountdownState::Ticking => {
                let more = self.remaining_ms > step;
                self.remaining_ms = self.remaining_ms.saturating_sub(step);
                self.state = if more {
                    CountdownState::Ticking
                } else {
                    CountdownState::Expired
                };
                more
            }
        }
    }

    /// Freezes the counter at its current value.
    pub fn stop(&mut self) {
        if self.state != CountdownState::Expired {
            self.state = CountdownState::Stopped;
        }
    }
}
