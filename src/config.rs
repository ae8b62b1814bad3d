/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::domain::trivia::{self, Question};
use crate::domain::{balloon, content, memory};
use crate::error::ConfigError;

pub const APP_DIR: &str = "birthday-stages";

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub timing: TimingConfig,
    pub profile: ProfileConfig,
    pub trivia: TriviaConfig,
    pub audio: AudioConfig,
    pub gamepad: GamepadConfig,
    /// Resolved location of the stage list, if one was found.
    pub stages_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct GeneralConfig {
    pub start_stage: u32,
    pub log_level: log::LevelFilter,
    pub dev_shortcut: bool,
}

#[derive(Clone, Debug)]
pub struct TimingConfig {
    pub tick_rate_ms: u64,
    pub balloon_duration_secs: u32,
    pub balloon_pool_size: usize,
    pub match_reveal_ms: u64,
    pub trivia_feedback_ms: u64,
    pub intro_reveal_ms: u64,
    pub cake_celebration_ms: u64,
    pub cake_complete_ms: u64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProfileConfig {
    pub name: String,
    pub age: u32,
    /// `YYYY-MM-DD`; parsed lazily by the progress display.
    pub birth_date: Option<String>,
    pub hobbies: Vec<String>,
    pub traits: Vec<String>,
    pub trait_descriptions: BTreeMap<String, String>,
    pub memories: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct TriviaConfig {
    pub required_correct: u32,
    pub questions: Vec<Question>,
}

#[derive(Clone, Debug)]
pub struct AudioConfig {
    pub muted: bool,
    pub volume: f32,
    pub background_track: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub confirm: Vec<String>,
    pub back: Vec<String>,
    pub retry: Vec<String>,
    pub dev_toggle: Vec<String>,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    general: TomlGeneral,
    #[serde(default)]
    timing: TomlTiming,
    #[serde(default)]
    profile: TomlProfile,
    #[serde(default)]
    trivia: TomlTrivia,
    #[serde(default)]
    audio: TomlAudio,
    #[serde(default)]
    gamepad: TomlGamepad,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_stages_file")]
    stages_file: String,
    #[serde(default = "default_start_stage")]
    start_stage: u32,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_true")]
    dev_shortcut: bool,
}

#[derive(Deserialize, Debug)]
struct TomlTiming {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
    #[serde(default = "default_balloon_duration")]
    balloon_duration_secs: u32,
    #[serde(default = "default_balloon_pool")]
    balloon_pool_size: usize,
    #[serde(default = "default_match_reveal")]
    match_reveal_ms: u64,
    #[serde(default = "default_trivia_feedback")]
    trivia_feedback_ms: u64,
    #[serde(default = "default_intro_reveal")]
    intro_reveal_ms: u64,
    #[serde(default = "default_cake_celebration")]
    cake_celebration_ms: u64,
    #[serde(default = "default_cake_complete")]
    cake_complete_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlProfile {
    #[serde(default = "default_name")]
    name: String,
    #[serde(default = "default_age")]
    age: u32,
    #[serde(default)]
    birth_date: Option<String>,
    #[serde(default = "default_hobbies")]
    hobbies: Vec<String>,
    #[serde(default = "default_traits")]
    traits: Vec<String>,
    #[serde(default)]
    trait_descriptions: BTreeMap<String, String>,
    #[serde(default = "default_memories")]
    memories: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlTrivia {
    #[serde(default = "default_required_correct")]
    required_correct: u32,
    #[serde(default = "default_questions")]
    questions: Vec<TomlQuestion>,
}

#[derive(Deserialize, Debug, Clone)]
struct TomlQuestion {
    question: String,
    options: Vec<String>,
    correct: usize,
}

#[derive(Deserialize, Debug)]
struct TomlAudio {
    #[serde(default)]
    muted: bool,
    #[serde(default = "default_volume")]
    volume: f32,
    #[serde(default)]
    background_track: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_back")]
    back: Vec<String>,
    #[serde(default = "default_retry")]
    retry: Vec<String>,
    #[serde(default = "default_dev_toggle")]
    dev_toggle: Vec<String>,
}

// ── Defaults ──

fn default_stages_file() -> String { "stages.toml".into() }
fn default_start_stage() -> u32 { 1 }
fn default_log_level() -> String { "info".into() }
fn default_true() -> bool { true }

fn default_tick_rate() -> u64 { 50 }
fn default_balloon_duration() -> u32 { balloon::GAME_DURATION_SECS }
fn default_balloon_pool() -> usize { balloon::POOL_SIZE }
fn default_match_reveal() -> u64 { memory::DEFAULT_REVEAL_MS }
fn default_trivia_feedback() -> u64 { trivia::DEFAULT_FEEDBACK_MS }
fn default_intro_reveal() -> u64 { content::DEFAULT_REVEAL_MS }
fn default_cake_celebration() -> u64 { content::DEFAULT_CELEBRATION_MS }
fn default_cake_complete() -> u64 { content::DEFAULT_CAKE_COMPLETE_MS }

fn default_name() -> String { "Friend".into() }
fn default_age() -> u32 { 30 }
fn default_hobbies() -> Vec<String> {
    vec!["photography".into(), "hiking".into(), "cooking".into()]
}
fn default_traits() -> Vec<String> {
    vec!["kind".into(), "curious".into(), "funny".into(), "brave".into()]
}
fn default_memories() -> Vec<String> {
    vec![
        "The road trip where the map was upside down".into(),
        "Baking a cake that never rose".into(),
        "Dancing in the rain after the concert".into(),
    ]
}

fn default_required_correct() -> u32 { trivia::DEFAULT_REQUIRED_CORRECT }
fn default_questions() -> Vec<TomlQuestion> {
    let q = |question: &str, options: [&str; 4], correct: usize| TomlQuestion {
        question: question.into(),
        options: options.iter().map(|s| s.to_string()).collect(),
        correct,
    };
    vec![
        q("What is my favourite season?", ["Spring", "Summer", "Autumn", "Winter"], 2),
        q("Which drink do I order first?", ["Coffee", "Tea", "Juice", "Water"], 1),
        q("Where did we first meet?", ["School", "Work", "A party", "Online"], 0),
        q("What do I do on a free Sunday?", ["Sleep in", "Hike", "Bake", "Read"], 1),
        q("Which animal would I adopt?", ["Cat", "Dog", "Parrot", "Turtle"], 0),
    ]
}

fn default_volume() -> f32 { 0.3 }

fn default_confirm() -> Vec<String> { vec!["A".into(), "Start".into()] }
fn default_back() -> Vec<String> { vec!["B".into()] }
fn default_retry() -> Vec<String> { vec!["Y".into()] }
fn default_dev_toggle() -> Vec<String> { vec!["Select".into()] }

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            stages_file: default_stages_file(),
            start_stage: default_start_stage(),
            log_level: default_log_level(),
            dev_shortcut: default_true(),
        }
    }
}

impl Default for TomlTiming {
    fn default() -> Self {
        TomlTiming {
            tick_rate_ms: default_tick_rate(),
            balloon_duration_secs: default_balloon_duration(),
            balloon_pool_size: default_balloon_pool(),
            match_reveal_ms: default_match_reveal(),
            trivia_feedback_ms: default_trivia_feedback(),
            intro_reveal_ms: default_intro_reveal(),
            cake_celebration_ms: default_cake_celebration(),
            cake_complete_ms: default_cake_complete(),
        }
    }
}

impl Default for TomlProfile {
    fn default() -> Self {
        TomlProfile {
            name: default_name(),
            age: default_age(),
            birth_date: None,
            hobbies: default_hobbies(),
            traits: default_traits(),
            trait_descriptions: BTreeMap::new(),
            memories: default_memories(),
        }
    }
}

impl Default for TomlTrivia {
    fn default() -> Self {
        TomlTrivia {
            required_correct: default_required_correct(),
            questions: default_questions(),
        }
    }
}

impl Default for TomlAudio {
    fn default() -> Self {
        TomlAudio {
            muted: false,
            volume: default_volume(),
            background_track: None,
        }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            confirm: default_confirm(),
            back: default_back(),
            retry: default_retry(),
            dev_toggle: default_dev_toggle(),
        }
    }
}

// ── Loading ──

impl AppConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory,
    /// (3) `~/.local/share/birthday-stages`, (4) `/usr/share/birthday-stages`.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        Self::resolve(toml_cfg, &search_dirs)
    }

    /// Parse a config document without touching the filesystem search.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let toml_cfg = toml::from_str::<TomlConfig>(text)?;
        Ok(Self::resolve(toml_cfg, &[]))
    }

    fn resolve(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let stages_path = find_file(&toml_cfg.general.stages_file, search_dirs);

        let log_level = toml_cfg.general.log_level.parse().unwrap_or_else(|_| {
            log::warn!("unknown log_level {:?}, using info", toml_cfg.general.log_level);
            log::LevelFilter::Info
        });

        let questions = toml_cfg.trivia.questions.iter().enumerate()
            .filter_map(|(i, q)| {
                if q.correct >= q.options.len() {
                    log::warn!("trivia question {} has no option {}, skipped", i + 1, q.correct);
                    return None;
                }
                Some(Question {
                    id: i as u32 + 1,
                    prompt: q.question.clone(),
                    options: q.options.clone(),
                    correct: q.correct,
                })
            })
            .collect();

        let background_track = toml_cfg.audio.background_track
            .as_deref()
            .and_then(|f| find_file(f, search_dirs));

        AppConfig {
            general: GeneralConfig {
                start_stage: toml_cfg.general.start_stage,
                log_level,
                dev_shortcut: toml_cfg.general.dev_shortcut,
            },
            timing: TimingConfig {
                tick_rate_ms: toml_cfg.timing.tick_rate_ms.max(1),
                balloon_duration_secs: toml_cfg.timing.balloon_duration_secs.max(1),
                balloon_pool_size: toml_cfg.timing.balloon_pool_size.max(1),
                match_reveal_ms: toml_cfg.timing.match_reveal_ms,
                trivia_feedback_ms: toml_cfg.timing.trivia_feedback_ms,
                intro_reveal_ms: toml_cfg.timing.intro_reveal_ms,
                cake_celebration_ms: toml_cfg.timing.cake_celebration_ms,
                cake_complete_ms: toml_cfg.timing.cake_complete_ms,
            },
            profile: ProfileConfig {
                name: toml_cfg.profile.name,
                age: toml_cfg.profile.age,
                birth_date: toml_cfg.profile.birth_date,
                hobbies: toml_cfg.profile.hobbies,
                traits: toml_cfg.profile.traits,
                trait_descriptions: toml_cfg.profile.trait_descriptions,
                memories: toml_cfg.profile.memories,
            },
            trivia: TriviaConfig {
                required_correct: toml_cfg.trivia.required_correct,
                questions,
            },
            audio: AudioConfig {
                muted: toml_cfg.audio.muted,
                volume: toml_cfg.audio.volume.clamp(0.0, 1.0),
                background_track,
            },
            gamepad: GamepadConfig {
                confirm: toml_cfg.gamepad.confirm,
                back: toml_cfg.gamepad.back,
                retry: toml_cfg.gamepad.retry,
                dev_toggle: toml_cfg.gamepad.dev_toggle,
            },
            stages_path,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::resolve(TomlConfig::default(), &[])
    }
}

/// Absolute paths are taken as-is; relative ones are looked up in the
/// candidate directories.
fn find_file(name: &str, search_dirs: &[PathBuf]) -> Option<PathBuf> {
    let p = PathBuf::from(name);
    if p.is_absolute() {
        return p.is_file().then_some(p);
    }
    search_dirs.iter()
        .map(|d| d.join(name))
        .find(|p| p.is_file())
}

/// Look up a media file (stage track) the same way config files are found.
pub fn find_asset(name: &str) -> Option<PathBuf> {
    find_file(name, &candidate_dirs())
}

/// Candidate directories to search: exe dir + CWD + system paths (deduplicated).
pub fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share").join(APP_DIR);
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. System data directory
    let sys = PathBuf::from("/usr/share").join(APP_DIR);
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    // 5. Fallback
    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Writable directory for the log and the score file: the exe directory
/// when writable, else `~/.local/share/birthday-stages`, else CWD.
pub fn data_dir() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            let test_path = parent.join(".write_test_birthday");
            if std::fs::write(&test_path, "").is_ok() {
                let _ = std::fs::remove_file(&test_path);
                return parent.to_path_buf();
            }
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share").join(APP_DIR);
        if std::fs::create_dir_all(&xdg).is_ok() {
            return xdg;
        }
    }

    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn read_toml(path: &Path) -> Result<TomlConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str::<TomlConfig>(&text)?)
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if !path.exists() {
            continue;
        }
        match read_toml(&path) {
            Ok(cfg) => {
                log::info!("config loaded from {}", path.display());
                return cfg;
            }
            Err(e @ ConfigError::Parse(_)) => {
                log::warn!("{e}; using default settings");
                return TomlConfig::default();
            }
            Err(e) => log::warn!("{e}"),
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.general.start_stage, 1);
        assert_eq!(cfg.timing.tick_rate_ms, 50);
        assert_eq!(cfg.timing.balloon_duration_secs, 20);
        assert_eq!(cfg.timing.balloon_pool_size, 5);
        assert_eq!(cfg.timing.match_reveal_ms, 1000);
        assert_eq!(cfg.trivia.required_correct, 3);
        assert_eq!(cfg.trivia.questions.len(), 5);
        assert_eq!(cfg.general.log_level, log::LevelFilter::Info);
        assert!(!cfg.audio.muted);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = AppConfig::from_toml_str(
            "[profile]\nname = \"Aisha\"\nage = 27\n\n[timing]\nballoon_duration_secs = 10\n",
        )
        .unwrap();
        assert_eq!(cfg.profile.name, "Aisha");
        assert_eq!(cfg.profile.age, 27);
        assert_eq!(cfg.timing.balloon_duration_secs, 10);
        assert_eq!(cfg.timing.trivia_feedback_ms, 2000);
        assert!(!cfg.profile.hobbies.is_empty());
    }

    #[test]
    fn trivia_questions_numbered_and_validated() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [trivia]
            required_correct = 1
            [[trivia.questions]]
            question = "Fine?"
            options = ["yes", "no"]
            correct = 0
            [[trivia.questions]]
            question = "Broken?"
            options = ["yes"]
            correct = 4
            "#,
        )
        .unwrap();
        assert_eq!(cfg.trivia.questions.len(), 1);
        assert_eq!(cfg.trivia.questions[0].id, 1);
        assert_eq!(cfg.trivia.required_correct, 1);
    }

    #[test]
    fn bad_values_clamped_or_defaulted() {
        let cfg = AppConfig::from_toml_str(
            "[general]\nlog_level = \"chatty\"\n[audio]\nvolume = 4.0\n[timing]\ntick_rate_ms = 0\n",
        )
        .unwrap();
        assert_eq!(cfg.general.log_level, log::LevelFilter::Info);
        assert_eq!(cfg.audio.volume, 1.0);
        assert_eq!(cfg.timing.tick_rate_ms, 1);
    }

    #[test]
    fn parse_error_is_reported() {
        let err = AppConfig::from_toml_str("[profile\nname=").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
