/// Memory-match engine.
///
/// Phase flow: Idle → Active ⇄ Evaluating → Active | Complete.
///
/// The second flip of a turn moves the game to Evaluating and schedules a
/// one-shot reveal task. Only that task resolves the turn, and only when
/// its token is the stored one and exactly two cards are unresolved, so a
/// turn can never be counted twice.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::timer::{ScheduledTask, TaskToken, TokenSource};

pub const DEFAULT_REVEAL_MS: u64 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn pairs(self) -> usize {
        match self {
            Difficulty::Easy => 6,
            Difficulty::Medium => 8,
            Difficulty::Hard => 10,
        }
    }

    /// (rows, cols) of the board.
    pub fn grid(self) -> (usize, usize) {
        match self {
            Difficulty::Easy => (3, 4),
            Difficulty::Medium => (4, 4),
            Difficulty::Hard => (4, 5),
        }
    }

    /// Map the stage config's 1-5 difficulty scale.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 | 1 => Difficulty::Easy,
            2 | 3 => Difficulty::Medium,
            _ => Difficulty::Hard,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Symbol {
    Heart,
    Star,
    Gift,
    Cake,
    Music,
    Sun,
    Moon,
    Cloud,
    Flower,
    Sparkles,
    Crown,
    IceCream,
    Rocket,
    Umbrella,
    Balloon,
}

impl Symbol {
    pub const ALL: [Symbol; 15] = [
        Symbol::Heart, Symbol::Star, Symbol::Gift, Symbol::Cake,
        Symbol::Music, Symbol::Sun, Symbol::Moon, Symbol::Cloud,
        Symbol::Flower, Symbol::Sparkles, Symbol::Crown, Symbol::IceCream,
        Symbol::Rocket, Symbol::Umbrella, Symbol::Balloon,
    ];

    pub fn glyph(self) -> char {
        match self {
            Symbol::Heart    => '♥',
            Symbol::Star     => '★',
            Symbol::Gift     => '◆',
            Symbol::Cake     => '▲',
            Symbol::Music    => '♪',
            Symbol::Sun      => '☼',
            Symbol::Moon     => '☾',
            Symbol::Cloud    => '☁',
            Symbol::Flower   => '✿',
            Symbol::Sparkles => '✦',
            Symbol::Crown    => '♛',
            Symbol::IceCream => '▼',
            Symbol::Rocket   => '➶',
            Symbol::Umbrella => '☂',
            Symbol::Balloon  => '●',
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Card {
    pub id: String,
    pub pair_key: String,
    pub face: Symbol,
    pub flipped: bool,
    pub matched: bool,
}

impl Card {
    /// Matched cards stay face up for good.
    pub fn face_up(&self) -> bool {
        self.flipped || self.matched
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryPhase {
    Idle,
    Active,
    Evaluating,
    Complete,
}

/// Result of a resolved turn, for sound and messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Matched,
    Mismatched,
    Won,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryRating {
    Perfect,
    Excellent,
    Great,
    Good,
    Completed,
}

impl MemoryRating {
    pub fn for_turns(pairs: u32, attempts: u32) -> Self {
        let efficiency = pairs as f32 / attempts.max(1) as f32;
        if efficiency >= 0.8 { MemoryRating::Perfect }
        else if efficiency >= 0.6 { MemoryRating::Excellent }
        else if efficiency >= 0.4 { MemoryRating::Great }
        else if efficiency >= 0.3 { MemoryRating::Good }
        else { MemoryRating::Completed }
    }

    pub fn headline(self) -> &'static str {
        match self {
            MemoryRating::Perfect => "PERFECT!",
            MemoryRating::Excellent => "EXCELLENT!",
            MemoryRating::Great => "GREAT JOB!",
            MemoryRating::Good => "GOOD WORK!",
            MemoryRating::Completed => "COMPLETED!",
        }
    }
}

pub struct MemoryMatch {
    pub cards: Vec<Card>,
    /// Ids of face-up cards awaiting evaluation (at most two).
    pub unresolved: Vec<String>,
    pub matches_found: u32,
    pub attempts: u32,
    pub phase: MemoryPhase,
    pub summary_visible: bool,

    difficulty: Difficulty,
    reveal_ms: u64,
    rng: Pcg32,
    tokens: TokenSource,
    pending: Option<ScheduledTask>,
}

impl MemoryMatch {
    pub fn new(difficulty: Difficulty, reveal_ms: u64, seed: u64) -> Self {
        let mut game = MemoryMatch {
            cards: vec![],
            unresolved: Vec::with_capacity(2),
            matches_found: 0,
            attempts: 0,
            phase: MemoryPhase::Idle,
            summary_visible: false,
            difficulty,
            reveal_ms,
            rng: Pcg32::seed_from_u64(seed),
            tokens: TokenSource::default(),
            pending: None,
        };
        game.deal();
        game
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn target_pairs(&self) -> u32 {
        self.difficulty.pairs() as u32
    }

    pub fn is_complete(&self) -> bool {
        self.phase == MemoryPhase::Complete
    }

    /// Build and shuffle a fresh deck, reset counters, and go Active.
    pub fn start(&mut self, difficulty: Difficulty) {
        self.pending = None;
        self.difficulty = difficulty;
        self.deal();
        self.unresolved.clear();
        self.matches_found = 0;
        self.attempts = 0;
        self.summary_visible = false;
        self.phase = MemoryPhase::Active;
        log::debug!("memory match started: {:?}, {} pairs", difficulty, difficulty.pairs());
    }

    pub fn restart(&mut self) {
        self.start(self.difficulty);
    }

    /// Turn a card face up. Returns true when the flip was accepted.
    pub fn flip(&mut self, card_id: &str) -> bool {
        if self.phase != MemoryPhase::Active || self.unresolved.len() >= 2 {
            return false;
        }
        if self.unresolved.iter().any(|id| id == card_id) {
            return false;
        }
        let card = match self.cards.iter_mut().find(|c| c.id == card_id) {
            Some(c) => c,
            None => return false,
        };
        if card.matched || card.flipped {
            return false;
        }
        card.flipped = true;
        self.unresolved.push(card_id.to_string());

        if self.unresolved.len() == 2 {
            self.phase = MemoryPhase::Evaluating;
            if self.pending.is_none() {
                let token = self.tokens.issue();
                self.pending = Some(ScheduledTask::once(token, self.reveal_ms));
            }
        }
        true
    }

    /// Flip by board position (keyboard cursor).
    pub fn flip_at(&mut self, index: usize) -> bool {
        match self.cards.get(index) {
            Some(card) => {
                let id = card.id.clone();
                self.flip(&id)
            }
            None => false,
        }
    }

    /// Feed elapsed time; resolves the pending turn when its delay is over.
    pub fn elapse(&mut self, dt_ms: u64) -> Option<Resolution> {
        let token = {
            let task = self.pending.as_mut()?;
            if task.advance(dt_ms) == 0 {
                return None;
            }
            task.token()
        };
        self.resolve(token)
    }

    fn resolve(&mut self, token: TaskToken) -> Option<Resolution> {
        match self.pending.as_ref() {
            Some(task) if task.token() == token => {}
            _ => return None,
        }
        self.pending = None;

        if self.unresolved.len() != 2 {
            self.unresolved.clear();
            if self.phase == MemoryPhase::Evaluating {
                self.phase = MemoryPhase::Active;
            }
            return None;
        }

        let first = self.unresolved[0].clone();
        let second = self.unresolved[1].clone();
        let pair_of = |id: &str, cards: &[Card]| {
            cards.iter().find(|c| c.id == id).map(|c| c.pair_key.clone())
        };
        let is_match = match (pair_of(&first, &self.cards), pair_of(&second, &self.cards)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };

        self.attempts += 1;
        for card in self.cards.iter_mut().filter(|c| c.id == first || c.id == second) {
            if is_match {
                card.matched = true;
                card.flipped = true;
            } else {
                card.flipped = false;
            }
        }
        self.unresolved.clear();

        if !is_match {
            self.phase = MemoryPhase::Active;
            return Some(Resolution::Mismatched);
        }

        self.matches_found += 1;
        if self.matches_found == self.target_pairs() {
            self.phase = MemoryPhase::Complete;
            self.summary_visible = true;
            log::info!("memory match won in {} attempts", self.attempts);
            Some(Resolution::Won)
        } else {
            self.phase = MemoryPhase::Active;
            Some(Resolution::Matched)
        }
    }

    pub fn dismiss_summary(&mut self) {
        self.summary_visible = false;
    }

    pub fn teardown(&mut self) {
        self.pending = None;
    }

    /// Jump straight to a won board. Development shortcut.
    pub fn force_complete(&mut self) {
        self.pending = None;
        self.unresolved.clear();
        for card in &mut self.cards {
            card.matched = true;
            card.flipped = true;
        }
        let pairs = self.target_pairs();
        self.matches_found = pairs;
        self.attempts = pairs + 2;
        self.phase = MemoryPhase::Complete;
        self.summary_visible = true;
        log::warn!("memory match force-completed");
    }

    pub fn rating(&self) -> MemoryRating {
        MemoryRating::for_turns(self.target_pairs(), self.attempts)
    }

    fn deal(&mut self) {
        let pairs = self.difficulty.pairs();
        let mut deck = Vec::with_capacity(pairs * 2);
        for (i, &face) in Symbol::ALL.iter().take(pairs).enumerate() {
            let pair_key = format!("pair_{}", i);
            for side in ["a", "b"] {
                deck.push(Card {
                    id: format!("card_{}_{}", i, side),
                    pair_key: pair_key.clone(),
                    face,
                    flipped: false,
                    matched: false,
                });
            }
        }
        deck.shuffle(&mut self.rng);
        self.cards = deck;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(difficulty: Difficulty) -> MemoryMatch {
        let mut g = MemoryMatch::new(difficulty, DEFAULT_REVEAL_MS, 42);
        g.start(difficulty);
        g
    }

    /// Ids of both cards for every pair.
    fn pairs_of(g: &MemoryMatch) -> Vec<(String, String)> {
        let mut out = vec![];
        for i in 0..g.target_pairs() {
            let key = format!("pair_{}", i);
            let ids: Vec<String> = g.cards.iter()
                .filter(|c| c.pair_key == key)
                .map(|c| c.id.clone())
                .collect();
            out.push((ids[0].clone(), ids[1].clone()));
        }
        out
    }

    fn mismatched_pair(g: &MemoryMatch) -> (String, String) {
        let a = &g.cards[0];
        let b = g.cards.iter().find(|c| c.pair_key != a.pair_key).unwrap();
        (a.id.clone(), b.id.clone())
    }

    #[test]
    fn deck_has_two_cards_per_key() {
        for d in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            let g = started(d);
            assert_eq!(g.cards.len(), d.pairs() * 2);
            for (a, b) in pairs_of(&g) {
                assert_ne!(a, b);
            }
            let (rows, cols) = d.grid();
            assert_eq!(rows * cols, g.cards.len());
        }
    }

    #[test]
    fn perfect_playthrough_counts_each_pair_once() {
        for d in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            let mut g = started(d);
            let pairs = pairs_of(&g);
            for (i, (a, b)) in pairs.iter().enumerate() {
                assert!(g.flip(a));
                assert!(g.flip(b));
                assert_eq!(g.phase, MemoryPhase::Evaluating);
                let r = g.elapse(DEFAULT_REVEAL_MS);
                if i + 1 == pairs.len() {
                    assert_eq!(r, Some(Resolution::Won));
                } else {
                    assert_eq!(r, Some(Resolution::Matched));
                }
            }
            assert_eq!(g.attempts, d.pairs() as u32);
            assert_eq!(g.matches_found, d.pairs() as u32);
            assert_eq!(g.phase, MemoryPhase::Complete);
            assert!(g.summary_visible);
        }
    }

    #[test]
    fn same_card_twice_is_noop() {
        let mut g = started(Difficulty::Easy);
        let id = g.cards[3].id.clone();
        assert!(g.flip(&id));
        assert!(!g.flip(&id));
        assert_eq!(g.unresolved, vec![id]);
        assert_eq!(g.phase, MemoryPhase::Active);
        assert!(g.pending.is_none());
    }

    #[test]
    fn flips_rejected_while_evaluating() {
        let mut g = started(Difficulty::Easy);
        let (a, b) = mismatched_pair(&g);
        g.flip(&a);
        g.flip(&b);
        let third = g.cards.iter().find(|c| c.id != a && c.id != b).unwrap().id.clone();
        assert!(!g.flip(&third));
        assert_eq!(g.unresolved.len(), 2);
        assert!(!g.cards.iter().find(|c| c.id == third).unwrap().flipped);
    }

    #[test]
    fn mismatch_flips_back_after_delay() {
        let mut g = started(Difficulty::Medium);
        let (a, b) = mismatched_pair(&g);
        g.flip(&a);
        g.flip(&b);
        assert_eq!(g.elapse(999), None);
        assert_eq!(g.elapse(1), Some(Resolution::Mismatched));
        assert_eq!(g.attempts, 1);
        assert_eq!(g.matches_found, 0);
        assert!(g.cards.iter().all(|c| !c.face_up()));
        assert_eq!(g.phase, MemoryPhase::Active);
        assert!(g.unresolved.is_empty());
    }

    #[test]
    fn matched_card_flip_changes_nothing() {
        let mut g = started(Difficulty::Easy);
        let (a, b) = pairs_of(&g)[0].clone();
        g.flip(&a);
        g.flip(&b);
        g.elapse(DEFAULT_REVEAL_MS);
        let (attempts, matches) = (g.attempts, g.matches_found);
        assert!(!g.flip(&a));
        assert!(!g.flip(&b));
        assert_eq!(g.attempts, attempts);
        assert_eq!(g.matches_found, matches);
        assert!(g.unresolved.is_empty());
    }

    #[test]
    fn restart_cancels_pending_reveal() {
        let mut g = started(Difficulty::Easy);
        let (a, b) = pairs_of(&g)[0].clone();
        g.flip(&a);
        g.flip(&b);
        g.restart();
        assert!(g.pending.is_none());
        assert_eq!(g.elapse(5000), None);
        assert_eq!(g.attempts, 0);
        assert_eq!(g.matches_found, 0);
        assert_eq!(g.phase, MemoryPhase::Active);
    }

    #[test]
    fn idle_board_rejects_flips() {
        let mut g = MemoryMatch::new(Difficulty::Easy, DEFAULT_REVEAL_MS, 1);
        assert_eq!(g.phase, MemoryPhase::Idle);
        assert!(!g.flip_at(0));
    }

    #[test]
    fn force_complete_wins_immediately() {
        let mut g = started(Difficulty::Medium);
        g.flip_at(0);
        g.force_complete();
        assert_eq!(g.phase, MemoryPhase::Complete);
        assert_eq!(g.matches_found, 8);
        assert_eq!(g.attempts, 10);
        assert!(g.summary_visible);
        assert!(g.cards.iter().all(|c| c.matched));
        assert_eq!(g.elapse(5000), None);
    }

    #[test]
    fn difficulty_levels_map_to_tables() {
        assert_eq!(Difficulty::from_level(1), Difficulty::Easy);
        assert_eq!(Difficulty::from_level(2), Difficulty::Medium);
        assert_eq!(Difficulty::from_level(5), Difficulty::Hard);
        assert_eq!(MemoryRating::for_turns(8, 8), MemoryRating::Perfect);
        assert_eq!(MemoryRating::for_turns(8, 30), MemoryRating::Completed);
    }
}
