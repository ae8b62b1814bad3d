/// Session: one visitor walking through the stages.
///
/// Owns the controller, the runtime of the stage being shown and the score
/// store. UI actions go to the runtime, which answers with `StageSignal`s
/// only at its completion points; the session applies those to the
/// controller and swaps runtimes when the current stage changes.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg32;

use crate::config::{AppConfig, ProfileConfig, TimingConfig, TriviaConfig};
use crate::domain::balloon::{BalloonGame, BalloonPhase};
use crate::domain::content::{Cake, CakePhase, Cursor, TextReveal};
use crate::domain::memory::{Difficulty, MemoryMatch, MemoryPhase, Resolution};
use crate::domain::stage::{fill_template, StageDescriptor, StageHandler};
use crate::domain::trivia::{Trivia, TriviaPhase};
use crate::sim::controller::{StageController, StageView};
use crate::sim::event::SessionEvent;
use crate::sim::progress::neighbour_dot;
use crate::sim::registry::StageRegistry;
use crate::sim::save::{bonus_years, ScoreStore, BALLOON_SCORE_KEY};

/// Input after key/button mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Confirm,
    Back,
    Retry,
    Up,
    Down,
    Left,
    Right,
    /// Numbered choice, zero based.
    Choose(usize),
    ToggleDev,
    DevSkip,
    DevBack,
    DevForceComplete,
    DotPrev,
    DotNext,
}

/// What a stage runtime asks of the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageSignal {
    Complete,
    Next,
    Previous,
}

pub struct BalloonStage {
    pub game: BalloonGame,
    pub cursor: Cursor,
}

pub struct MemoryStage {
    pub game: MemoryMatch,
    pub cursor: Cursor,
    pub cols: usize,
}

pub struct TriviaStage {
    pub game: Trivia,
    pub cursor: Cursor,
}

/// Gallery captions or trait names with a selection.
pub struct ListStage {
    pub items: Vec<String>,
    pub cursor: Cursor,
}

pub struct Letter {
    pub blocks: Vec<String>,
    pub opened: bool,
    pub bonus_years: u32,
}

pub enum StageRuntime {
    Intro(TextReveal),
    Balloon(BalloonStage),
    Gallery(ListStage),
    Memory(MemoryStage),
    Traits(ListStage),
    Trivia(TriviaStage),
    Cake(Cake),
    Wishes(Letter),
    NotImplemented,
    NotFound,
}

/// Everything a runtime may read while being built.
struct EnterContext<'a> {
    profile: &'a ProfileConfig,
    timing: &'a TimingConfig,
    trivia: &'a TriviaConfig,
    store: &'a dyn ScoreStore,
    seed: u64,
}

impl StageRuntime {
    fn enter(view: &StageView<'_>, ctx: &EnterContext<'_>) -> StageRuntime {
        let (desc, handler) = match *view {
            StageView::NotFound(_) => return StageRuntime::NotFound,
            StageView::NotImplemented(_) => return StageRuntime::NotImplemented,
            StageView::Found(d, h) => (d, h),
        };
        let templated = |lines: &[String]| -> Vec<String> {
            lines.iter().map(|l| fill_template(l, ctx.profile)).collect()
        };
        match handler {
            StageHandler::Intro => {
                let mut blocks = templated(&desc.config.text_blocks);
                if blocks.is_empty() {
                    blocks.push(desc.display_title(ctx.profile));
                }
                StageRuntime::Intro(TextReveal::new(blocks, ctx.timing.intro_reveal_ms))
            }
            StageHandler::BalloonPop => {
                let duration = desc.config.time_limit_secs.unwrap_or(ctx.timing.balloon_duration_secs);
                let pool = ctx.timing.balloon_pool_size;
                StageRuntime::Balloon(BalloonStage {
                    game: BalloonGame::new(duration, pool, ctx.seed),
                    cursor: Cursor::new(pool),
                })
            }
            StageHandler::PhotoGallery => {
                let items = if desc.config.media.is_empty() {
                    templated(&ctx.profile.memories)
                } else {
                    desc.config.media.clone()
                };
                let cursor = Cursor::new(items.len());
                StageRuntime::Gallery(ListStage { items, cursor })
            }
            StageHandler::MemoryMatch => {
                let difficulty = desc.config.difficulty
                    .map_or(Difficulty::Medium, Difficulty::from_level);
                let mut game = MemoryMatch::new(difficulty, ctx.timing.match_reveal_ms, ctx.seed);
                game.start(difficulty);
                let cursor = Cursor::new(game.cards.len());
                StageRuntime::Memory(MemoryStage { game, cursor, cols: difficulty.grid().1 })
            }
            StageHandler::Traits => {
                let items = ctx.profile.traits.clone();
                let cursor = Cursor::new(items.len());
                StageRuntime::Traits(ListStage { items, cursor })
            }
            StageHandler::Trivia => StageRuntime::Trivia(TriviaStage {
                game: Trivia::new(
                    ctx.trivia.questions.clone(),
                    ctx.trivia.required_correct,
                    ctx.timing.trivia_feedback_ms,
                ),
                cursor: Cursor::default(),
            }),
            StageHandler::Cake => StageRuntime::Cake(Cake::new(
                ctx.profile.age,
                ctx.timing.cake_celebration_ms,
                ctx.timing.cake_complete_ms,
            )),
            StageHandler::Wishes => StageRuntime::Wishes(Letter {
                blocks: templated(&desc.config.text_blocks),
                opened: false,
                bonus_years: bonus_years(ctx.store),
            }),
        }
    }

    fn handle(&mut self, action: Action, events: &mut Vec<SessionEvent>) -> Vec<StageSignal> {
        use StageSignal::*;
        match self {
            StageRuntime::Intro(reveal) => match action {
                Action::Confirm if !reveal.is_complete() => {
                    reveal.reveal_all();
                    events.push(SessionEvent::TextRevealed);
                    vec![]
                }
                Action::Confirm => vec![Complete, Next],
                Action::Back => vec![Previous],
                Action::Retry => {
                    reveal.replay();
                    vec![]
                }
                _ => vec![],
            },

            StageRuntime::Balloon(s) => handle_balloon(s, action, events),
            StageRuntime::Memory(s) => handle_memory(s, action, events),
            StageRuntime::Trivia(s) => handle_trivia(s, action, events),

            StageRuntime::Gallery(list) | StageRuntime::Traits(list) => match action {
                Action::Left | Action::Up => {
                    list.cursor.step(-1);
                    vec![]
                }
                Action::Right | Action::Down => {
                    list.cursor.step(1);
                    vec![]
                }
                Action::Confirm => vec![Complete, Next],
                Action::Back => vec![Previous],
                _ => vec![],
            },

            StageRuntime::Cake(cake) => match (action, cake.phase) {
                (Action::Confirm, CakePhase::Lit) => {
                    cake.blow();
                    events.push(SessionEvent::CandlesBlown);
                    vec![]
                }
                (Action::Confirm, CakePhase::Done) => vec![Next],
                _ => vec![],
            },

            StageRuntime::Wishes(letter) => match action {
                Action::Confirm if !letter.opened => {
                    letter.opened = true;
                    events.push(SessionEvent::LetterOpened);
                    vec![]
                }
                Action::Confirm => vec![Complete, Next],
                Action::Back => vec![Previous],
                _ => vec![],
            },

            StageRuntime::NotImplemented => match action {
                Action::Confirm => vec![Complete, Next],
                Action::Back => vec![Previous],
                _ => vec![],
            },

            // Recovery is handled by the session.
            StageRuntime::NotFound => vec![],
        }
    }

    fn elapse(&mut self, dt_ms: u64, events: &mut Vec<SessionEvent>) -> Vec<StageSignal> {
        match self {
            StageRuntime::Intro(reveal) => {
                if reveal.elapse(dt_ms) > 0 {
                    events.push(SessionEvent::TextRevealed);
                }
            }
            StageRuntime::Balloon(s) => {
                if let Some(score) = s.game.elapse(dt_ms) {
                    events.push(SessionEvent::BalloonRoundOver { score });
                }
            }
            StageRuntime::Memory(s) => match s.game.elapse(dt_ms) {
                Some(Resolution::Matched) => events.push(SessionEvent::PairMatched),
                Some(Resolution::Mismatched) => events.push(SessionEvent::PairMissed),
                Some(Resolution::Won) => events.push(SessionEvent::MemoryWon),
                None => {}
            },
            StageRuntime::Trivia(s) => {
                if s.game.elapse(dt_ms) {
                    after_trivia_advance(s, events);
                }
            }
            StageRuntime::Cake(cake) => match cake.elapse(dt_ms) {
                Some(CakePhase::Celebrating) => events.push(SessionEvent::Celebration),
                Some(CakePhase::Done) => return vec![StageSignal::Complete],
                _ => {}
            },
            StageRuntime::Gallery(_)
            | StageRuntime::Traits(_)
            | StageRuntime::Wishes(_)
            | StageRuntime::NotImplemented
            | StageRuntime::NotFound => {}
        }
        vec![]
    }

    /// Cancel every pending task before the runtime is dropped.
    fn teardown(&mut self) {
        match self {
            StageRuntime::Intro(reveal) => reveal.teardown(),
            StageRuntime::Balloon(s) => s.game.teardown(),
            StageRuntime::Memory(s) => s.game.teardown(),
            StageRuntime::Trivia(s) => s.game.teardown(),
            StageRuntime::Cake(cake) => cake.teardown(),
            StageRuntime::Gallery(_)
            | StageRuntime::Traits(_)
            | StageRuntime::Wishes(_)
            | StageRuntime::NotImplemented
            | StageRuntime::NotFound => {}
        }
    }
}

fn handle_balloon(s: &mut BalloonStage, action: Action, events: &mut Vec<SessionEvent>) -> Vec<StageSignal> {
    match s.game.phase {
        BalloonPhase::Idle => {
            if matches!(action, Action::Confirm | Action::Retry) {
                s.game.start();
                s.cursor = Cursor::new(s.game.pool_size());
            }
            vec![]
        }
        BalloonPhase::Active => {
            let slot = match action {
                Action::Left => { s.cursor.step(-1); return vec![]; }
                Action::Right => { s.cursor.step(1); return vec![]; }
                Action::Confirm => s.cursor.pos,
                Action::Choose(n) => n,
                _ => return vec![],
            };
            if s.game.pop_slot(slot) {
                events.push(SessionEvent::BalloonPopped { score: s.game.score });
            } else {
                events.push(SessionEvent::Rejected);
            }
            vec![]
        }
        BalloonPhase::Complete => match action {
            Action::Retry => {
                s.game.restart();
                s.cursor = Cursor::new(s.game.pool_size());
                vec![]
            }
            Action::Confirm if s.game.summary_visible => {
                s.game.dismiss_summary();
                vec![StageSignal::Complete, StageSignal::Next]
            }
            Action::Confirm => vec![StageSignal::Next],
            _ => vec![],
        },
    }
}

fn handle_memory(s: &mut MemoryStage, action: Action, events: &mut Vec<SessionEvent>) -> Vec<StageSignal> {
    if s.game.phase == MemoryPhase::Complete {
        return match action {
            Action::Retry => {
                s.game.restart();
                s.cursor = Cursor::new(s.game.cards.len());
                vec![]
            }
            Action::Confirm if s.game.summary_visible => {
                s.game.dismiss_summary();
                vec![StageSignal::Complete, StageSignal::Next]
            }
            Action::Confirm => vec![StageSignal::Next],
            _ => vec![],
        };
    }
    let cols = s.cols as isize;
    match action {
        Action::Left => { s.cursor.step(-1); }
        Action::Right => { s.cursor.step(1); }
        Action::Up => { s.cursor.step(-cols); }
        Action::Down => { s.cursor.step(cols); }
        Action::Retry => {
            s.game.restart();
            s.cursor = Cursor::new(s.game.cards.len());
        }
        Action::Confirm if s.game.phase == MemoryPhase::Idle => {
            let d = s.game.difficulty();
            s.game.start(d);
        }
        Action::Confirm => {
            if s.game.flip_at(s.cursor.pos) {
                events.push(SessionEvent::CardFlipped);
            } else {
                events.push(SessionEvent::Rejected);
            }
        }
        _ => {}
    }
    vec![]
}

fn handle_trivia(s: &mut TriviaStage, action: Action, events: &mut Vec<SessionEvent>) -> Vec<StageSignal> {
    match s.game.phase {
        TriviaPhase::Intro => {
            if action == Action::Confirm {
                s.game.start();
                after_trivia_advance(s, events);
            }
            vec![]
        }
        TriviaPhase::Playing => {
            let choice = match action {
                Action::Up => { s.cursor.step(-1); return vec![]; }
                Action::Down => { s.cursor.step(1); return vec![]; }
                Action::Confirm if s.game.is_locked() => {
                    s.game.advance();
                    after_trivia_advance(s, events);
                    return vec![];
                }
                Action::Confirm => s.cursor.pos,
                Action::Choose(n) => n,
                _ => return vec![],
            };
            match s.game.select_answer(choice) {
                Some(correct) => {
                    s.cursor.pos = choice;
                    events.push(SessionEvent::AnswerLocked { correct });
                }
                None => events.push(SessionEvent::Rejected),
            }
            vec![]
        }
        TriviaPhase::Complete { passed: true } => match action {
            Action::Confirm => vec![StageSignal::Complete, StageSignal::Next],
            Action::Retry => {
                s.game.restart();
                vec![]
            }
            _ => vec![],
        },
        TriviaPhase::Complete { passed: false } => {
            if matches!(action, Action::Confirm | Action::Retry) {
                s.game.restart();
            }
            vec![]
        }
    }
}

/// Reset the answer cursor for the new question and report a finish.
fn after_trivia_advance(s: &mut TriviaStage, events: &mut Vec<SessionEvent>) {
    let options = s.game.current_question().map_or(0, |q| q.options.len());
    s.cursor = Cursor::new(options);
    if let TriviaPhase::Complete { passed } = s.game.phase {
        events.push(SessionEvent::TriviaFinished { passed });
    }
}

// ══════════════════════════════════════════════════════════════
// Session
// ══════════════════════════════════════════════════════════════

pub struct Session {
    controller: StageController,
    runtime: StageRuntime,
    /// Stage id the runtime was built for.
    entered: u32,
    /// Complete already applied during this reach.
    completion_sent: bool,
    store: Box<dyn ScoreStore>,
    profile: ProfileConfig,
    timing: TimingConfig,
    trivia: TriviaConfig,
    dev_shortcut: bool,
    dev: bool,
    rng: Pcg32,
}

impl Session {
    pub fn new(registry: StageRegistry, store: Box<dyn ScoreStore>, config: &AppConfig, seed: u64) -> Self {
        let controller = StageController::new(registry, config.general.start_stage);
        let mut session = Session {
            entered: controller.current(),
            controller,
            runtime: StageRuntime::NotFound,
            completion_sent: false,
            store,
            profile: config.profile.clone(),
            timing: config.timing.clone(),
            trivia: config.trivia.clone(),
            dev_shortcut: config.general.dev_shortcut,
            dev: false,
            rng: Pcg32::seed_from_u64(seed),
        };
        let mut events = vec![];
        session.enter_current(&mut events);
        session
    }

    pub fn controller(&self) -> &StageController {
        &self.controller
    }

    pub fn runtime(&self) -> &StageRuntime {
        &self.runtime
    }

    pub fn profile(&self) -> &ProfileConfig {
        &self.profile
    }

    pub fn store(&self) -> &dyn ScoreStore {
        self.store.as_ref()
    }

    pub fn is_dev(&self) -> bool {
        self.dev
    }

    pub fn current_descriptor(&self) -> Option<&StageDescriptor> {
        self.controller.registry().get(self.controller.current())
    }

    /// Title of the current stage with profile tokens filled in.
    pub fn current_title(&self) -> String {
        match self.current_descriptor() {
            Some(d) => d.display_title(&self.profile),
            None => "Lost".to_string(),
        }
    }

    pub fn handle(&mut self, action: Action) -> Vec<SessionEvent> {
        let mut events = vec![];
        let signals = match action {
            Action::ToggleDev => {
                if self.dev_shortcut {
                    self.dev = !self.dev;
                    log::info!("dev overlay {}", if self.dev { "on" } else { "off" });
                    events.push(SessionEvent::DevToggled { on: self.dev });
                }
                return events;
            }
            Action::DotPrev | Action::DotNext => {
                if let Some(id) = neighbour_dot(&self.controller, action == Action::DotNext) {
                    match self.controller.navigate_to(id) {
                        Ok(()) => self.sync(&mut events),
                        Err(e) => log::debug!("dot navigation refused: {e}"),
                    }
                }
                return events;
            }
            Action::DevSkip if self.dev => vec![StageSignal::Complete, StageSignal::Next],
            Action::DevBack if self.dev => vec![StageSignal::Previous],
            Action::DevForceComplete if self.dev => {
                if let StageRuntime::Memory(s) = &mut self.runtime {
                    s.game.force_complete();
                    events.push(SessionEvent::MemoryWon);
                }
                return events;
            }
            Action::DevSkip | Action::DevBack | Action::DevForceComplete => return events,
            Action::Confirm if matches!(self.runtime, StageRuntime::NotFound) => {
                self.controller.return_to_first();
                self.sync(&mut events);
                return events;
            }
            _ => self.runtime.handle(action, &mut events),
        };
        self.apply(&signals, &mut events);
        events
    }

    /// Feed elapsed time to the active runtime.
    pub fn elapse(&mut self, dt_ms: u64) -> Vec<SessionEvent> {
        let mut events = vec![];
        let signals = self.runtime.elapse(dt_ms, &mut events);
        for ev in &events {
            if let SessionEvent::BalloonRoundOver { score } = *ev {
                self.persist_balloon_score(score);
            }
        }
        self.apply(&signals, &mut events);
        events
    }

    fn persist_balloon_score(&mut self, score: u32) {
        match self.store.write(BALLOON_SCORE_KEY, score) {
            Ok(()) => log::info!("balloon score {} saved", score),
            Err(e) => log::warn!("could not save balloon score: {e}"),
        }
    }

    fn apply(&mut self, signals: &[StageSignal], events: &mut Vec<SessionEvent>) {
        let id = self.entered;
        for signal in signals {
            match signal {
                StageSignal::Complete => {
                    if self.completion_sent {
                        continue;
                    }
                    self.completion_sent = true;
                    if self.controller.complete_stage(id) {
                        events.push(SessionEvent::StageCompleted { id });
                    }
                }
                StageSignal::Next => {
                    self.controller.advance_from_stage(id);
                }
                StageSignal::Previous => {
                    self.controller.retreat_from_stage(id);
                }
            }
        }
        self.sync(events);
    }

    /// Rebuild the runtime if the controller moved.
    fn sync(&mut self, events: &mut Vec<SessionEvent>) {
        if self.controller.current() != self.entered {
            self.runtime.teardown();
            self.enter_current(events);
        }
    }

    fn enter_current(&mut self, events: &mut Vec<SessionEvent>) {
        let ctx = EnterContext {
            profile: &self.profile,
            timing: &self.timing,
            trivia: &self.trivia,
            store: self.store.as_ref(),
            seed: self.rng.next_u64(),
        };
        let view = self.controller.resolve();
        self.runtime = StageRuntime::enter(&view, &ctx);
        self.entered = self.controller.current();
        self.completion_sent = false;
        events.push(SessionEvent::StageEntered { id: self.entered });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::save::MemoryScoreStore;

    fn session_at(start: u32) -> Session {
        let mut config = AppConfig::default();
        config.general.start_stage = start;
        Session::new(StageRegistry::builtin(), Box::new(MemoryScoreStore::default()), &config, 11)
    }

    fn session_with_store(start: u32, balloon_score: u32) -> Session {
        let mut store = MemoryScoreStore::default();
        store.write(BALLOON_SCORE_KEY, balloon_score).unwrap();
        let mut config = AppConfig::default();
        config.general.start_stage = start;
        Session::new(StageRegistry::builtin(), Box::new(store), &config, 11)
    }

    #[test]
    fn balloon_run_without_pops_persists_zero() {
        let mut s = session_with_store(2, 7);
        s.handle(Action::Confirm);
        let mut over = vec![];
        for _ in 0..20 {
            over.extend(s.elapse(1000));
        }
        assert!(over.contains(&SessionEvent::BalloonRoundOver { score: 0 }));
        assert_eq!(s.store().read(BALLOON_SCORE_KEY), 0);
        match s.runtime() {
            StageRuntime::Balloon(b) => {
                assert_eq!(b.game.phase, BalloonPhase::Complete);
                assert!(b.game.summary_visible);
            }
            _ => panic!("expected balloon runtime"),
        }
    }

    #[test]
    fn balloon_summary_confirm_completes_and_advances() {
        let mut s = session_at(2);
        s.handle(Action::Confirm);
        s.handle(Action::Choose(0));
        s.handle(Action::Confirm);
        s.elapse(20_000);
        assert_eq!(s.store().read(BALLOON_SCORE_KEY), 2);
        let events = s.handle(Action::Confirm);
        assert!(events.contains(&SessionEvent::StageCompleted { id: 2 }));
        assert_eq!(s.controller().current(), 3);
    }

    #[test]
    fn leaving_mid_round_cancels_countdown() {
        let mut s = session_at(1);
        s.handle(Action::Confirm);
        s.handle(Action::Confirm);
        assert_eq!(s.controller().current(), 2);
        s.handle(Action::Confirm);
        s.handle(Action::DotPrev);
        assert_eq!(s.controller().current(), 1);
        s.elapse(60_000);
        assert_eq!(s.store().read(BALLOON_SCORE_KEY), 0);
        assert!(matches!(s.runtime(), StageRuntime::Intro(_)));
    }

    #[test]
    fn intro_reveals_then_continues() {
        let mut s = session_at(1);
        assert!(s.elapse(3000).contains(&SessionEvent::TextRevealed));
        s.handle(Action::Confirm);
        assert_eq!(s.controller().current(), 1);
        let events = s.handle(Action::Confirm);
        assert_eq!(s.controller().current(), 2);
        assert!(s.controller().is_completed(1));
        assert!(events.contains(&SessionEvent::StageEntered { id: 2 }));
    }

    #[test]
    fn intro_retry_replays_text() {
        let mut s = session_at(1);
        s.handle(Action::Confirm);
        s.handle(Action::Retry);
        match s.runtime() {
            StageRuntime::Intro(r) => {
                assert_eq!(r.visible().len(), 1);
                assert!(!r.is_complete());
            }
            _ => panic!("expected intro runtime"),
        }
        assert!(s.elapse(3000).contains(&SessionEvent::TextRevealed));
    }

    #[test]
    fn completion_reported_once_per_reach() {
        let mut s = session_at(3);
        s.handle(Action::Confirm);
        assert_eq!(s.controller().current(), 4);
        let back = s.handle(Action::DotPrev);
        assert!(back.contains(&SessionEvent::StageEntered { id: 3 }));
        let again = s.handle(Action::Confirm);
        assert!(!again.iter().any(|e| matches!(e, SessionEvent::StageCompleted { .. })));
        assert_eq!(s.controller().completed().len(), 1);
    }

    #[test]
    fn dots_jump_only_between_reached_stages() {
        let mut s = session_at(1);
        s.handle(Action::Confirm);
        s.handle(Action::Confirm);
        assert_eq!(s.controller().current(), 2);
        assert!(s.handle(Action::DotNext).is_empty());
        assert_eq!(s.controller().current(), 2);

        s.handle(Action::Confirm);
        s.elapse(20_000);
        s.handle(Action::Confirm);
        assert_eq!(s.controller().current(), 3);

        s.handle(Action::DotPrev);
        assert_eq!(s.controller().current(), 2);
        let forward = s.handle(Action::DotNext);
        assert!(forward.contains(&SessionEvent::StageEntered { id: 3 }));
        assert_eq!(s.controller().current(), 3);

        assert!(!s.controller().can_navigate_to(4));
        assert!(s.handle(Action::DotNext).is_empty());
        assert_eq!(s.controller().current(), 3);
    }

    #[test]
    fn memory_force_complete_needs_dev() {
        let mut s = session_at(4);
        s.handle(Action::DevForceComplete);
        match s.runtime() {
            StageRuntime::Memory(m) => assert_eq!(m.game.phase, MemoryPhase::Active),
            _ => panic!("expected memory runtime"),
        }
        s.handle(Action::ToggleDev);
        assert!(s.is_dev());
        s.handle(Action::DevForceComplete);
        match s.runtime() {
            StageRuntime::Memory(m) => {
                assert!(m.game.is_complete());
                assert_eq!(m.game.attempts, m.game.target_pairs() + 2);
            }
            _ => panic!("expected memory runtime"),
        }
        s.handle(Action::Confirm);
        assert!(s.controller().is_completed(4));
        assert_eq!(s.controller().current(), 5);
    }

    #[test]
    fn memory_turn_resolves_after_reveal_delay() {
        let mut s = session_at(4);
        s.handle(Action::Confirm);
        s.handle(Action::Right);
        s.handle(Action::Confirm);
        let events = s.elapse(1000);
        assert!(events.iter().any(|e| matches!(e, SessionEvent::PairMatched | SessionEvent::PairMissed)));
        match s.runtime() {
            StageRuntime::Memory(m) => {
                assert_eq!(m.game.attempts, 1);
                assert!(m.game.unresolved.is_empty());
            }
            _ => panic!("expected memory runtime"),
        }
    }

    #[test]
    fn dev_skip_and_back() {
        let mut s = session_at(6);
        s.handle(Action::DevSkip);
        assert_eq!(s.controller().current(), 6);
        s.handle(Action::ToggleDev);
        s.handle(Action::DevSkip);
        assert_eq!(s.controller().current(), 7);
        assert!(s.controller().is_completed(6));
        s.handle(Action::DevBack);
        assert_eq!(s.controller().current(), 6);
    }

    /// Default questions have their answers at 2, 1, 0, 1, 0.
    fn answer_trivia(s: &mut Session, picks: [usize; 5]) {
        s.handle(Action::Confirm);
        for p in picks {
            s.handle(Action::Choose(p));
            s.handle(Action::Confirm);
        }
    }

    #[test]
    fn trivia_pass_completes_stage() {
        let mut s = session_at(6);
        answer_trivia(&mut s, [2, 1, 0, 1, 3]);
        match s.runtime() {
            StageRuntime::Trivia(t) => assert_eq!(t.game.phase, TriviaPhase::Complete { passed: true }),
            _ => panic!("expected trivia runtime"),
        }
        s.handle(Action::Confirm);
        assert!(s.controller().is_completed(6));
        assert_eq!(s.controller().current(), 7);
    }

    #[test]
    fn trivia_fail_restarts_from_first_question() {
        let mut s = session_at(6);
        answer_trivia(&mut s, [2, 1, 0, 3, 3]);
        s.handle(Action::Confirm);
        assert_eq!(s.controller().current(), 6);
        assert!(!s.controller().is_completed(6));
        match s.runtime() {
            StageRuntime::Trivia(t) => {
                assert_eq!(t.game.phase, TriviaPhase::Intro);
                assert_eq!(t.game.score, 0);
                assert_eq!(t.game.current_index, 0);
            }
            _ => panic!("expected trivia runtime"),
        }
    }

    #[test]
    fn cake_completes_on_timer_without_advancing() {
        let mut s = session_at(7);
        assert!(s.handle(Action::Confirm).contains(&SessionEvent::CandlesBlown));
        assert!(s.elapse(1000).contains(&SessionEvent::Celebration));
        let done = s.elapse(2000);
        assert!(done.contains(&SessionEvent::StageCompleted { id: 7 }));
        assert_eq!(s.controller().current(), 7);
        s.handle(Action::Confirm);
        assert_eq!(s.controller().current(), 8);
    }

    #[test]
    fn letter_shows_stored_bonus() {
        let mut s = session_with_store(8, 13);
        match s.runtime() {
            StageRuntime::Wishes(l) => assert_eq!(l.bonus_years, 13),
            _ => panic!("expected wishes runtime"),
        }
        assert!(s.handle(Action::Confirm).contains(&SessionEvent::LetterOpened));
        s.handle(Action::Confirm);
        assert!(s.controller().is_completed(8));
        assert_eq!(s.controller().current(), 8);
    }

    #[test]
    fn not_found_recovers_to_first_stage() {
        let mut s = session_at(99);
        assert!(matches!(s.runtime(), StageRuntime::NotFound));
        s.handle(Action::Back);
        assert_eq!(s.controller().current(), 99);
        s.handle(Action::Confirm);
        assert_eq!(s.controller().current(), 1);
        assert!(matches!(s.runtime(), StageRuntime::Intro(_)));
    }

    #[test]
    fn not_implemented_can_be_skipped() {
        let registry = StageRegistry::from_toml_str(
            "[[stage]]\nid = 1\ntitle = \"Puzzle\"\nhandler = \"PuzzleGame\"\n\n\
             [[stage]]\nid = 2\ntitle = \"Cake\"\nhandler = \"cake\"\nkind = \"special\"\n",
        )
        .unwrap();
        let mut s = Session::new(registry, Box::new(MemoryScoreStore::default()), &AppConfig::default(), 3);
        assert!(matches!(s.runtime(), StageRuntime::NotImplemented));
        s.handle(Action::Confirm);
        assert!(s.controller().is_completed(1));
        assert!(matches!(s.runtime(), StageRuntime::Cake(_)));
    }
}
