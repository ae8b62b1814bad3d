/// Stage descriptors: the immutable, ordered building blocks of the
/// experience. Created once at load and never mutated.

use crate::config::ProfileConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    Content,
    Game,
    Special,
}

impl StageKind {
    pub fn from_name(s: &str) -> Option<StageKind> {
        match s.to_ascii_lowercase().as_str() {
            "content" => Some(StageKind::Content),
            "game" => Some(StageKind::Game),
            "special" => Some(StageKind::Special),
            _ => None,
        }
    }

    /// Short tag shown next to the stage counter.
    pub fn label(self) -> &'static str {
        match self {
            StageKind::Content => "story",
            StageKind::Game => "game",
            StageKind::Special => "special",
        }
    }
}

/// Ambient decoration drawn along the bottom of a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageEffect {
    Confetti,
    Candles,
    Sparkles,
}

impl StageEffect {
    pub fn from_name(s: &str) -> Option<StageEffect> {
        match s.to_ascii_lowercase().as_str() {
            "confetti" => Some(StageEffect::Confetti),
            "candles" | "candle" => Some(StageEffect::Candles),
            "sparkles" | "sparkle" | "stars" => Some(StageEffect::Sparkles),
            _ => None,
        }
    }
}

/// Every stage implementation the program knows about. Dispatch over this
/// enum is exhaustive; an unknown handler key in a stage file becomes
/// `None` on the descriptor and renders the "not implemented" view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageHandler {
    Intro,
    BalloonPop,
    PhotoGallery,
    MemoryMatch,
    Traits,
    Trivia,
    Cake,
    Wishes,
}

impl StageHandler {
    /// Accepts both the short keys and the component names used by older
    /// stage lists ("BalloonGame", "MemoryStage", ...).
    pub fn from_key(key: &str) -> Option<StageHandler> {
        match key.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "intro" | "introstage" => Some(StageHandler::Intro),
            "balloon" | "balloonpop" | "balloongame" => Some(StageHandler::BalloonPop),
            "gallery" | "photogallery" | "memorystage" => Some(StageHandler::PhotoGallery),
            "memorymatch" | "memorygame" => Some(StageHandler::MemoryMatch),
            "traits" | "traitsstage" => Some(StageHandler::Traits),
            "trivia" | "triviagame" => Some(StageHandler::Trivia),
            "cake" | "cakestage" => Some(StageHandler::Cake),
            "wishes" | "wishesstage" => Some(StageHandler::Wishes),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            StageHandler::Intro => "intro",
            StageHandler::BalloonPop => "balloon-pop",
            StageHandler::PhotoGallery => "photo-gallery",
            StageHandler::MemoryMatch => "memory-match",
            StageHandler::Traits => "traits",
            StageHandler::Trivia => "trivia",
            StageHandler::Cake => "cake",
            StageHandler::Wishes => "wishes",
        }
    }
}

/// Open-ended per-stage settings. Handlers read what they need.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StageConfig {
    pub text_blocks: Vec<String>,
    pub media: Vec<String>,
    /// One-line objective shown under the header.
    pub goal: Option<String>,
    /// 1-5 scale.
    pub difficulty: Option<u8>,
    pub time_limit_secs: Option<u32>,
    pub effect: Option<StageEffect>,
    /// Background track played while this stage is current.
    pub music: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StageDescriptor {
    pub id: u32,
    pub kind: StageKind,
    /// May contain `{{name}}`, `{{hobby}}` and `{{trait}}` tokens.
    pub title: String,
    pub handler_key: String,
    pub handler: Option<StageHandler>,
    pub config: StageConfig,
}

impl StageDescriptor {
    pub fn new(id: u32, kind: StageKind, title: &str, handler_key: &str) -> Self {
        StageDescriptor {
            id,
            kind,
            title: title.to_string(),
            handler_key: handler_key.to_string(),
            handler: StageHandler::from_key(handler_key),
            config: StageConfig::default(),
        }
    }

    pub fn with_config(mut self, config: StageConfig) -> Self {
        self.config = config;
        self
    }

    pub fn display_title(&self, profile: &ProfileConfig) -> String {
        fill_template(&self.title, profile)
    }
}

/// Substitute `{{name}}`, `{{hobby}}` and `{{trait}}`. The first hobby and
/// the first trait are used, with fallbacks when the lists are empty.
pub fn fill_template(text: &str, profile: &ProfileConfig) -> String {
    let hobby = profile.hobbies.first().map(String::as_str).unwrap_or("adventure");
    let trait_word = profile.traits.first().map(String::as_str).unwrap_or("amazing");
    text.replace("{{name}}", &profile.name)
        .replace("{{hobby}}", hobby)
        .replace("{{trait}}", trait_word)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ProfileConfig {
        ProfileConfig {
            name: "Aisha".into(),
            hobbies: vec!["photography".into()],
            traits: vec!["creative".into()],
            ..ProfileConfig::default()
        }
    }

    #[test]
    fn template_tokens_replaced_everywhere() {
        let s = fill_template("{{name}}! {{name}} loves {{hobby}}, so {{trait}}", &profile());
        assert_eq!(s, "Aisha! Aisha loves photography, so creative");
    }

    #[test]
    fn template_falls_back_on_empty_lists() {
        let p = ProfileConfig { name: "Sam".into(), hobbies: vec![], traits: vec![], ..ProfileConfig::default() };
        assert_eq!(fill_template("{{hobby}} {{trait}}", &p), "adventure amazing");
    }

    #[test]
    fn handler_keys_accept_component_names() {
        assert_eq!(StageHandler::from_key("BalloonGame"), Some(StageHandler::BalloonPop));
        assert_eq!(StageHandler::from_key("memory-match"), Some(StageHandler::MemoryMatch));
        assert_eq!(StageHandler::from_key("MemoryStage"), Some(StageHandler::PhotoGallery));
        assert_eq!(StageHandler::from_key("PuzzleGame"), None);
        for h in [
            StageHandler::Intro, StageHandler::BalloonPop, StageHandler::PhotoGallery,
            StageHandler::MemoryMatch, StageHandler::Traits, StageHandler::Trivia,
            StageHandler::Cake, StageHandler::Wishes,
        ] {
            assert_eq!(StageHandler::from_key(h.key()), Some(h));
        }
    }

    #[test]
    fn effect_names() {
        assert_eq!(StageEffect::from_name("Confetti"), Some(StageEffect::Confetti));
        assert_eq!(StageEffect::from_name("candle"), Some(StageEffect::Candles));
        assert_eq!(StageEffect::from_name("stars"), Some(StageEffect::Sparkles));
        assert_eq!(StageEffect::from_name("fireworks"), None);
    }

    #[test]
    fn unknown_handler_leaves_descriptor_unbound() {
        let d = StageDescriptor::new(9, StageKind::Game, "Puzzle", "PuzzleGame");
        assert!(d.handler.is_none());
        assert_eq!(d.handler_key, "PuzzleGame");
    }
}
