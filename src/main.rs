/// Entry point and main loop.

mod config;
mod domain;
mod error;
mod logging;
mod sim;
mod ui;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use crossterm::event::KeyCode;

use config::AppConfig;
use sim::event::SessionEvent;
use sim::progress::{parse_birth_date, time_alive};
use sim::registry::StageRegistry;
use sim::save::open_score_store;
use sim::session::{Action, Session};
use ui::gamepad::GamepadState;
use ui::input::InputState;
use ui::renderer::{Hud, Renderer};
use ui::sound::{AudioService, Sfx};

const FRAME_SLEEP: Duration = Duration::from_millis(5);

fn main() {
    let data_dir = config::data_dir();
    // Config is not loaded yet; its level applies right after.
    let log_path = logging::init(&data_dir, log::LevelFilter::Info);

    let config = AppConfig::load();
    log::set_max_level(config.general.log_level);
    match &log_path {
        Ok(p) => log::info!("logging to {}", p.display()),
        Err(e) => eprintln!("Log file unavailable: {e}"),
    }

    let registry = StageRegistry::load_or_builtin(config.stages_path.as_deref());
    let store = open_score_store(&data_dir);
    let mut session = Session::new(registry, store, &config, rand::random());

    let birth = config.profile.birth_date.as_deref().and_then(|s| match parse_birth_date(s) {
        Ok(d) => Some(d),
        Err(e) => {
            log::warn!("{e}");
            None
        }
    });

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let mut audio = AudioService::init(&config.audio);

    let result = main_loop(&mut session, &mut renderer, &mut audio, &config, birth);

    audio.dispose();
    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    if let Err(e) = result {
        log::error!("main loop failed: {e}");
        eprintln!("Error: {e}");
    }

    let done = session.controller().completed().len();
    let total = session.controller().registry().len();
    println!();
    println!("Happy birthday, {}!", session.profile().name);
    println!("Stages completed: {}/{}", done, total);
}

fn main_loop(
    session: &mut Session,
    renderer: &mut Renderer,
    audio: &mut AudioService,
    config: &AppConfig,
    birth: Option<NaiveDate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    let mut last_tick = Instant::now();
    let tick_rate = Duration::from_millis(config.timing.tick_rate_ms);

    loop {
        kb.drain_events();
        gp.update();

        if kb.ctrl_c_pressed() || (!kb.ctrl_held() && kb.any_pressed(KEYS_QUIT)) {
            break;
        }
        if !kb.ctrl_held() && kb.any_pressed(KEYS_MUTE) {
            let muted = audio.toggle_mute();
            log::info!("music {}", if muted { "muted" } else { "unmuted" });
        }

        for action in collect_actions(&kb, &gp) {
            let events = session.handle(action);
            process_sound_events(audio, session, &events);
        }

        if let Some(dt_ms) = take_tick(&mut last_tick, Instant::now(), tick_rate) {
            let events = session.elapse(dt_ms);
            process_sound_events(audio, session, &events);
        }

        let hud = Hud {
            sound: audio.is_active(),
            muted: audio.is_muted(),
            alive: birth.and_then(|b| time_alive(b, Utc::now())),
            gamepad: gp.connected,
        };
        renderer.render(session, &hud)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

/// Whole milliseconds since `last_tick` once a tick is due. The clock
/// moves forward by exactly that amount so no time is lost between ticks.
fn take_tick(last_tick: &mut Instant, now: Instant, tick_rate: Duration) -> Option<u64> {
    let since = now.saturating_duration_since(*last_tick);
    if since < tick_rate {
        return None;
    }
    let ms = since.as_millis() as u64;
    *last_tick += Duration::from_millis(ms);
    Some(ms)
}

/// The stage's own background track, resolved through the config dirs.
fn stage_track(session: &Session, id: u32) -> Option<PathBuf> {
    let name = session.controller().registry().get(id)?.config.music.as_deref()?;
    let path = config::find_asset(name);
    if path.is_none() {
        log::warn!("stage {} track {:?} not found", id, name);
    }
    path
}

fn process_sound_events(audio: &mut AudioService, session: &Session, events: &[SessionEvent]) {
    for event in events {
        match event {
            SessionEvent::StageEntered { id } => {
                audio.play(Sfx::Transition);
                if let Some(path) = stage_track(session, *id) {
                    audio.play_stage_track(&path);
                }
            }
            SessionEvent::StageCompleted { .. } => audio.play(Sfx::Complete),
            SessionEvent::BalloonPopped { .. } | SessionEvent::CandlesBlown => audio.play(Sfx::Pop),
            SessionEvent::CardFlipped => audio.play(Sfx::Flip),
            SessionEvent::PairMatched => audio.play(Sfx::Match),
            SessionEvent::PairMissed => audio.play(Sfx::Miss),
            SessionEvent::AnswerLocked { correct } => {
                audio.play(if *correct { Sfx::Match } else { Sfx::Miss })
            }
            SessionEvent::TriviaFinished { passed: false } => audio.play(Sfx::Miss),
            SessionEvent::BalloonRoundOver { .. }
            | SessionEvent::MemoryWon
            | SessionEvent::TriviaFinished { passed: true }
            | SessionEvent::Celebration => audio.play(Sfx::Fanfare),
            SessionEvent::TextRevealed => audio.play(Sfx::Reveal),
            SessionEvent::LetterOpened => {
                audio.stop_music();
                audio.play(Sfx::Reveal);
            }
            SessionEvent::DevToggled { .. } | SessionEvent::Rejected => audio.play(Sfx::Click),
        }
    }
}

// ── Key Constants ──

const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter, KeyCode::Char(' ')];
const KEYS_BACK: &[KeyCode] = &[KeyCode::Esc, KeyCode::Backspace];
const KEYS_RETRY: &[KeyCode] = &[KeyCode::Char('r'), KeyCode::Char('R')];
const KEYS_QUIT: &[KeyCode] = &[KeyCode::Char('q'), KeyCode::Char('Q')];
const KEYS_MUTE: &[KeyCode] = &[KeyCode::Char('m'), KeyCode::Char('M')];
const KEYS_DEV_SKIP: &[KeyCode] = &[KeyCode::Char('s'), KeyCode::Char('S')];
const KEYS_DEV_BACK: &[KeyCode] = &[KeyCode::Char('p'), KeyCode::Char('P')];
const KEYS_DEV_FORCE: &[KeyCode] = &[KeyCode::Char('f'), KeyCode::Char('F')];

/// Keyboard and gamepad presses of this frame, in a fixed order.
fn collect_actions(kb: &InputState, gp: &GamepadState) -> Vec<Action> {
    let mut actions = Vec::new();

    if kb.dev_chord_pressed() || gp.dev_toggle_pressed() {
        actions.push(Action::ToggleDev);
    }
    // Plain keys held together with Ctrl belong to a chord.
    let plain = !kb.ctrl_held();

    let pairs: [(bool, Action); 12] = [
        ((plain && kb.any_pressed(&[KeyCode::Up])) || gp.up_pressed(), Action::Up),
        ((plain && kb.any_pressed(&[KeyCode::Down])) || gp.down_pressed(), Action::Down),
        ((plain && kb.any_pressed(&[KeyCode::Left])) || gp.left_pressed(), Action::Left),
        ((plain && kb.any_pressed(&[KeyCode::Right])) || gp.right_pressed(), Action::Right),
        ((plain && kb.any_pressed(KEYS_CONFIRM)) || gp.confirm_pressed(), Action::Confirm),
        ((plain && kb.any_pressed(KEYS_BACK)) || gp.back_pressed(), Action::Back),
        ((plain && kb.any_pressed(KEYS_RETRY)) || gp.retry_pressed(), Action::Retry),
        ((plain && kb.any_pressed(&[KeyCode::PageUp])) || gp.prev_stage_pressed(), Action::DotPrev),
        ((plain && kb.any_pressed(&[KeyCode::PageDown])) || gp.next_stage_pressed(), Action::DotNext),
        (plain && kb.any_pressed(KEYS_DEV_SKIP), Action::DevSkip),
        (plain && kb.any_pressed(KEYS_DEV_BACK), Action::DevBack),
        (plain && kb.any_pressed(KEYS_DEV_FORCE), Action::DevForceComplete),
    ];
    actions.extend(pairs.iter().filter(|(hit, _)| *hit).map(|(_, a)| *a));

    if plain {
        for code in kb.presses() {
            if let KeyCode::Char(c @ '1'..='9') = *code {
                actions.push(Action::Choose(c as usize - '1' as usize));
            }
        }
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::save::MemoryScoreStore;

    #[test]
    fn stage_track_resolves_existing_files_only() {
        let dir = std::env::temp_dir().join(format!("birthday_track_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let track = dir.join("party.ogg");
        std::fs::write(&track, b"not really audio").unwrap();

        let toml = format!(
            "[[stage]]\nid = 1\ntitle = \"a\"\nhandler = \"intro\"\nmusic = {:?}\n\n\
             [[stage]]\nid = 2\ntitle = \"b\"\nhandler = \"cake\"\nmusic = \"nowhere/missing.ogg\"\n\n\
             [[stage]]\nid = 3\ntitle = \"c\"\nhandler = \"wishes\"\n",
            track.display().to_string()
        );
        let registry = StageRegistry::from_toml_str(&toml).unwrap();
        let session = Session::new(registry, Box::new(MemoryScoreStore::default()), &AppConfig::default(), 1);

        assert_eq!(stage_track(&session, 1), Some(track.clone()));
        assert_eq!(stage_track(&session, 2), None);
        assert_eq!(stage_track(&session, 3), None);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn ticks_keep_the_remainder() {
        let start = Instant::now();
        let rate = Duration::from_millis(16);
        let mut last = start;

        assert_eq!(take_tick(&mut last, start + Duration::from_millis(10), rate), None);
        assert_eq!(last, start);

        let first = start + Duration::from_micros(16_700);
        assert_eq!(take_tick(&mut last, first, rate), Some(16));
        assert_eq!(last, start + Duration::from_millis(16));

        // Work done after the tick still counts toward the next one.
        let second = start + Duration::from_micros(32_300);
        assert_eq!(take_tick(&mut last, second, rate), Some(16));

        let total: u64 = (1..=60)
            .filter_map(|i| take_tick(&mut last, start + Duration::from_millis(32 + i * 17), rate))
            .sum();
        assert_eq!(total, 60 * 17);
    }
}
