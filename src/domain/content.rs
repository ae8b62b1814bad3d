/// State for the non-game stages: timed text reveal, list cursor and the
/// cake sequence.

use super::timer::{ScheduledTask, TokenSource};

pub const DEFAULT_REVEAL_MS: u64 = 3000;
pub const DEFAULT_CELEBRATION_MS: u64 = 1000;
pub const DEFAULT_CAKE_COMPLETE_MS: u64 = 2000;
pub const MAX_CANDLES: u32 = 10;

/// Shows text blocks one at a time on a repeating task.
pub struct TextReveal {
    blocks: Vec<String>,
    revealed: usize,
    period_ms: u64,
    tokens: TokenSource,
    task: Option<ScheduledTask>,
}

impl TextReveal {
    /// The first block is visible immediately.
    pub fn new(blocks: Vec<String>, period_ms: u64) -> Self {
        let mut tokens = TokenSource::default();
        let revealed = blocks.len().min(1);
        let task = (revealed < blocks.len())
            .then(|| ScheduledTask::repeating(tokens.issue(), period_ms));
        TextReveal { blocks, revealed, period_ms, tokens, task }
    }

    pub fn visible(&self) -> &[String] {
        &self.blocks[..self.revealed]
    }

    pub fn is_complete(&self) -> bool {
        self.revealed == self.blocks.len()
    }

    /// Returns how many blocks became visible.
    pub fn elapse(&mut self, dt_ms: u64) -> usize {
        let fires = match self.task.as_mut() {
            Some(t) => t.advance(dt_ms) as usize,
            None => return 0,
        };
        let before = self.revealed;
        self.revealed = (self.revealed + fires).min(self.blocks.len());
        if self.is_complete() {
            self.task = None;
        }
        self.revealed - before
    }

    pub fn reveal_all(&mut self) {
        self.revealed = self.blocks.len();
        self.task = None;
    }

    /// Restart from the first block.
    pub fn replay(&mut self) {
        self.revealed = self.blocks.len().min(1);
        self.task = (!self.is_complete())
            .then(|| ScheduledTask::repeating(self.tokens.issue(), self.period_ms));
    }

    pub fn teardown(&mut self) {
        self.task = None;
    }
}

/// Clamped selection over a list of `len` items.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    pub pos: usize,
    pub len: usize,
}

impl Cursor {
    pub fn new(len: usize) -> Self {
        Cursor { pos: 0, len }
    }

    /// Move by `delta`, staying inside the list.
    pub fn step(&mut self, delta: isize) -> bool {
        if self.len == 0 {
            return false;
        }
        let target = (self.pos as isize + delta).clamp(0, self.len as isize - 1) as usize;
        let moved = target != self.pos;
        self.pos = target;
        moved
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CakePhase {
    Lit,
    /// Candles out, waiting for the celebration.
    Blown,
    Celebrating,
    Done,
}

pub struct Cake {
    pub candles: u32,
    pub phase: CakePhase,
    celebration_ms: u64,
    complete_ms: u64,
    tokens: TokenSource,
    pending: Option<ScheduledTask>,
}

impl Cake {
    pub fn new(age: u32, celebration_ms: u64, complete_ms: u64) -> Self {
        Cake {
            candles: age.min(MAX_CANDLES),
            phase: CakePhase::Lit,
            celebration_ms,
            complete_ms,
            tokens: TokenSource::default(),
            pending: None,
        }
    }

    pub fn blow(&mut self) -> bool {
        if self.phase != CakePhase::Lit {
            return false;
        }
        self.phase = CakePhase::Blown;
        self.pending = Some(ScheduledTask::once(self.tokens.issue(), self.celebration_ms));
        true
    }

    /// Returns the new phase when a delay ran out.
    pub fn elapse(&mut self, dt_ms: u64) -> Option<CakePhase> {
        let task = self.pending.as_mut()?;
        if task.advance(dt_ms) == 0 {
            return None;
        }
        match self.phase {
            CakePhase::Blown => {
                self.phase = CakePhase::Celebrating;
                self.pending = Some(ScheduledTask::once(self.tokens.issue(), self.complete_ms));
            }
            CakePhase::Celebrating => {
                self.phase = CakePhase::Done;
                self.pending = None;
            }
            CakePhase::Lit | CakePhase::Done => {
                self.pending = None;
                return None;
            }
        }
        Some(self.phase)
    }

    pub fn teardown(&mut self) {
        self.pending = None;
    }
}
