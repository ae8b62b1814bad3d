/// Scheduled tasks driven by elapsed time.
///
/// Each engine owns at most one pending task. Waiting is never blocking:
/// the main loop feeds elapsed milliseconds into `advance()`, which reports
/// how many times the task fired. Every task carries a `TaskToken`; a
/// handler compares the token of a firing task against the one it stored
/// before applying any result, so a task that outlived a reset is ignored.

/// Identity of one scheduled task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskToken(u64);

/// Issues fresh tokens. One per engine.
#[derive(Clone, Debug, Default)]
pub struct TokenSource {
    next: u64,
}

impl TokenSource {
    pub fn issue(&mut self) -> TaskToken {
        self.next += 1;
        TaskToken(self.next)
    }
}

#[derive(Clone, Debug)]
pub struct ScheduledTask {
    token: TaskToken,
    remaining_ms: u64,
    /// `Some(period)` for repeating tasks.
    period_ms: Option<u64>,
    done: bool,
}

impl ScheduledTask {
    pub fn once(token: TaskToken, delay_ms: u64) -> Self {
        ScheduledTask { token, remaining_ms: delay_ms, period_ms: None, done: false }
    }

    pub fn repeating(token: TaskToken, period_ms: u64) -> Self {
        // A zero period would fire forever within one advance.
        let period = period_ms.max(1);
        ScheduledTask { token, remaining_ms: period, period_ms: Some(period), done: false }
    }

    pub fn token(&self) -> TaskToken {
        self.token
    }

    /// Advance the task clock. Returns the number of firings.
    pub fn advance(&mut self, dt_ms: u64) -> u32 {
        if self.done {
            return 0;
        }
        if dt_ms < self.remaining_ms {
            self.remaining_ms -= dt_ms;
            return 0;
        }
        let overshoot = dt_ms - self.remaining_ms;
        match self.period_ms {
            None => {
                self.remaining_ms = 0;
                self.done = true;
                1
            }
            Some(period) => {
                let extra = overshoot / period;
                self.remaining_ms = period - overshoot % period;
                1 + extra as u32
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn once_fires_exactly_once() {
        let mut src = TokenSource::default();
        let mut t = ScheduledTask::once(src.issue(), 1000);
        assert_eq!(t.advance(400), 0);
        assert_eq!(t.advance(599), 0);
        assert_eq!(t.advance(1), 1);
        assert_eq!(t.advance(5000), 0);
    }

    #[test]
    fn repeating_counts_every_period() {
        let mut src = TokenSource::default();
        let mut t = ScheduledTask::repeating(src.issue(), 1000);
        assert_eq!(t.advance(999), 0);
        assert_eq!(t.advance(1), 1);
        assert_eq!(t.advance(2500), 2);
        assert_eq!(t.advance(499), 0);
        assert_eq!(t.advance(1), 1);
    }

    #[test]
    fn tokens_are_unique() {
        let mut src = TokenSource::default();
        let a = src.issue();
        let b = src.issue();
        assert_ne!(a, b);
    }
}
