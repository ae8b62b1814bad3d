/// Balloon-pop engine: fixed-duration round with a constant-size pool.
///
/// Phase flow: Idle → Active → Complete (summary shown) → Complete
/// (summary dismissed), with `restart()` going back to Active.
///
/// While Active the live pool always holds exactly `pool_size` balloons:
/// a pop removes one and generates its replacement in the same call.

use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::timer::{ScheduledTask, TokenSource};

pub const GAME_DURATION_SECS: u32 = 20;
pub const POOL_SIZE: usize = 5;

const TICK_MS: u64 = 1000;

/// Balloons spawn inside [INSET, INSET + SPAN] percent on both axes.
const INSET: f32 = 15.0;
const SPAN: f32 = 70.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BalloonColor {
    Rose,
    Teal,
    Sky,
    Sage,
    Butter,
    Plum,
}

impl BalloonColor {
    pub const PALETTE: [BalloonColor; 6] = [
        BalloonColor::Rose,
        BalloonColor::Teal,
        BalloonColor::Sky,
        BalloonColor::Sage,
        BalloonColor::Butter,
        BalloonColor::Plum,
    ];

    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            BalloonColor::Rose   => (0xFF, 0x6B, 0x8B),
            BalloonColor::Teal   => (0x4E, 0xCD, 0xC4),
            BalloonColor::Sky    => (0x45, 0xB7, 0xD1),
            BalloonColor::Sage   => (0x96, 0xCE, 0xB4),
            BalloonColor::Butter => (0xFF, 0xEA, 0xA7),
            BalloonColor::Plum   => (0xDD, 0xA0, 0xDD),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Balloon {
    pub id: String,
    /// Horizontal position, percent of the play area.
    pub x: f32,
    /// Vertical position, percent of the play area.
    pub y: f32,
    pub color: BalloonColor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BalloonPhase {
    Idle,
    Active,
    Complete,
}

/// Summary-screen verdict for a finished round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BalloonRating {
    Incredible,
    Amazing,
    Great,
    WellDone,
    NiceTry,
}

impl BalloonRating {
    pub fn for_score(score: u32) -> Self {
        match score {
            s if s >= 20 => BalloonRating::Incredible,
            s if s >= 15 => BalloonRating::Amazing,
            s if s >= 10 => BalloonRating::Great,
            s if s >= 5 => BalloonRating::WellDone,
            _ => BalloonRating::NiceTry,
        }
    }

    pub fn headline(self) -> &'static str {
        match self {
            BalloonRating::Incredible => "INCREDIBLE!",
            BalloonRating::Amazing => "AMAZING!",
            BalloonRating::Great => "GREAT JOB!",
            BalloonRating::WellDone => "WELL DONE!",
            BalloonRating::NiceTry => "NICE TRY!",
        }
    }
}

pub struct BalloonGame {
    pub score: u32,
    pub time_remaining: u32,
    pub phase: BalloonPhase,
    pub summary_visible: bool,
    pub balloons: Vec<Balloon>,

    duration_secs: u32,
    pool_size: usize,
    rng: Pcg32,
    next_id: u64,
    tokens: TokenSource,
    ticker: Option<ScheduledTask>,
}

impl BalloonGame {
    pub fn new(duration_secs: u32, pool_size: usize, seed: u64) -> Self {
        BalloonGame {
            score: 0,
            time_remaining: duration_secs,
            phase: BalloonPhase::Idle,
            summary_visible: false,
            balloons: Vec::with_capacity(pool_size),
            duration_secs,
            pool_size: pool_size.max(1),
            rng: Pcg32::seed_from_u64(seed),
            next_id: 0,
            tokens: TokenSource::default(),
            ticker: None,
        }
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn is_complete(&self) -> bool {
        self.phase == BalloonPhase::Complete
    }

    /// Reset everything and begin a round.
    pub fn start(&mut self) {
        self.score = 0;
        self.time_remaining = self.duration_secs;
        self.phase = BalloonPhase::Active;
        self.summary_visible = false;
        self.balloons.clear();
        for _ in 0..self.pool_size {
            let b = self.spawn();
            self.balloons.push(b);
        }
        // Replacing the handle drops any previous ticker.
        let token = self.tokens.issue();
        self.ticker = Some(ScheduledTask::repeating(token, TICK_MS));
        log::debug!("balloon round started ({}s, pool {})", self.duration_secs, self.pool_size);
    }

    pub fn restart(&mut self) {
        self.start();
    }

    /// Pop a live balloon by id. Returns false when nothing happened.
    pub fn pop(&mut self, balloon_id: &str) -> bool {
        if self.phase != BalloonPhase::Active {
            return false;
        }
        match self.balloons.iter().position(|b| b.id == balloon_id) {
            Some(idx) => self.pop_at(idx),
            None => false,
        }
    }

    /// Pop the balloon in pool slot `slot` (keyboard selection).
    pub fn pop_slot(&mut self, slot: usize) -> bool {
        if self.phase != BalloonPhase::Active || slot >= self.balloons.len() {
            return false;
        }
        self.pop_at(slot)
    }

    fn pop_at(&mut self, idx: usize) -> bool {
        self.balloons.remove(idx);
        self.score += 1;
        // Replacement takes the same slot so slot keys stay put.
        let fresh = self.spawn();
        self.balloons.insert(idx, fresh);
        while self.balloons.len() < self.pool_size {
            let b = self.spawn();
            self.balloons.push(b);
        }
        true
    }

    /// One countdown second. Returns the final score when the round ends.
    pub fn tick(&mut self) -> Option<u32> {
        if self.phase != BalloonPhase::Active {
            return None;
        }
        self.time_remaining = self.time_remaining.saturating_sub(1);
        if self.time_remaining == 0 {
            self.finish();
            return Some(self.score);
        }
        None
    }

    /// Feed elapsed time. Returns the final score if the round ended.
    pub fn elapse(&mut self, dt_ms: u64) -> Option<u32> {
        let fires = match self.ticker.as_mut() {
            Some(t) => t.advance(dt_ms),
            None => return None,
        };
        for _ in 0..fires {
            if let Some(score) = self.tick() {
                return Some(score);
            }
        }
        None
    }

    pub fn dismiss_summary(&mut self) {
        self.summary_visible = false;
    }

    /// Cancel the countdown; used when the stage is left.
    pub fn teardown(&mut self) {
        self.ticker = None;
    }

    pub fn rating(&self) -> BalloonRating {
        BalloonRating::for_score(self.score)
    }

    pub fn pops_per_second(&self) -> f32 {
        self.score as f32 / self.duration_secs.max(1) as f32
    }

    fn finish(&mut self) {
        self.phase = BalloonPhase::Complete;
        self.summary_visible = true;
        self.balloons.clear();
        self.ticker = None;
        log::info!("balloon round finished, score {}", self.score);
    }

    fn spawn(&mut self) -> Balloon {
        self.next_id += 1;
        let palette = &BalloonColor::PALETTE;
        Balloon {
            id: format!("balloon-{}", self.next_id),
            x: INSET + self.rng.gen::<f32>() * SPAN,
            y: INSET + self.rng.gen::<f32>() * SPAN,
            color: palette[self.rng.gen_range(0..palette.len())],
        }
    }
}
