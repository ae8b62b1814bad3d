/// Stage registry: the ordered list of stage descriptors.
///
/// Loaded once from `stages.toml` (a list of `[[stage]]` tables) or taken
/// from the built-in list. Ordered by id; the order is the only valid
/// traversal path.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;

use crate::domain::stage::{StageConfig, StageDescriptor, StageEffect, StageKind};
use crate::error::RegistryError;

#[derive(Deserialize, Debug)]
struct TomlStages {
    #[serde(default)]
    stage: Vec<TomlStage>,
}

#[derive(Deserialize, Debug)]
struct TomlStage {
    id: u32,
    #[serde(default = "default_kind")]
    kind: String,
    title: String,
    handler: String,
    #[serde(default)]
    text_blocks: Vec<String>,
    #[serde(default)]
    media: Vec<String>,
    #[serde(default)]
    goal: Option<String>,
    #[serde(default)]
    difficulty: Option<u8>,
    #[serde(default)]
    time_limit_secs: Option<u32>,
    #[serde(default)]
    effect: Option<String>,
    #[serde(default)]
    music: Option<String>,
}

fn default_kind() -> String { "content".into() }

#[derive(Clone, Debug)]
pub struct StageRegistry {
    stages: Vec<StageDescriptor>,
}

impl StageRegistry {
    /// Validate and sort. Ids must be >= 1 and unique.
    pub fn new(mut stages: Vec<StageDescriptor>) -> Result<Self, RegistryError> {
        if stages.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut seen = BTreeSet::new();
        for s in &stages {
            if s.id == 0 {
                return Err(RegistryError::InvalidId(s.id));
            }
            if !seen.insert(s.id) {
                return Err(RegistryError::DuplicateId(s.id));
            }
            if s.handler.is_none() {
                log::warn!("stage {}: no handler named {:?}", s.id, s.handler_key);
            }
        }
        stages.sort_by_key(|s| s.id);
        Ok(StageRegistry { stages })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, RegistryError> {
        let doc: TomlStages = toml::from_str(text)?;
        let stages = doc.stage.into_iter()
            .map(|t| -> Result<StageDescriptor, RegistryError> {
                let kind = StageKind::from_name(&t.kind)
                    .ok_or(RegistryError::UnknownKind { id: t.id, kind: t.kind.clone() })?;
                let config = StageConfig {
                    text_blocks: t.text_blocks,
                    media: t.media,
                    goal: t.goal,
                    difficulty: t.difficulty,
                    time_limit_secs: t.time_limit_secs,
                    effect: t.effect.as_deref().and_then(|name| {
                        let effect = StageEffect::from_name(name);
                        if effect.is_none() {
                            log::warn!("stage {}: unknown effect {:?} ignored", t.id, name);
                        }
                        effect
                    }),
                    music: t.music,
                };
                Ok(StageDescriptor::new(t.id, kind, &t.title, &t.handler).with_config(config))
            })
            .collect::<Result<Vec<_>, RegistryError>>()?;
        Self::new(stages)
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Stage file if present and valid, otherwise the built-in list.
    pub fn load_or_builtin(path: Option<&Path>) -> Self {
        if let Some(p) = path {
            match Self::load(p) {
                Ok(reg) => {
                    log::info!("{} stages loaded from {}", reg.len(), p.display());
                    return reg;
                }
                Err(e) => log::warn!("{e}; using built-in stages"),
            }
        }
        Self::builtin()
    }

    /// The eight-stage birthday sequence.
    pub fn builtin() -> Self {
        let text = |lines: &[&str]| lines.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let stages = vec![
            StageDescriptor::new(1, StageKind::Content, "Happy Birthday, {{name}}!", "IntroStage")
                .with_config(StageConfig {
                    text_blocks: text(&[
                        "Today is all about you, {{name}}.",
                        "A few games, a few memories, and one wish.",
                        "Ready when you are.",
                    ]),
                    effect: Some(StageEffect::Confetti),
                    ..StageConfig::default()
                }),
            StageDescriptor::new(2, StageKind::Game, "Pop the Balloons!", "BalloonGame")
                .with_config(StageConfig {
                    goal: Some("Pop as many balloons as you can".into()),
                    time_limit_secs: Some(20),
                    ..StageConfig::default()
                }),
            StageDescriptor::new(3, StageKind::Content, "Snapshots of {{name}}", "MemoryStage")
                .with_config(StageConfig {
                    media: text(&["beach.jpg", "graduation.jpg", "first-apartment.jpg", "mountain.jpg"]),
                    ..StageConfig::default()
                }),
            StageDescriptor::new(4, StageKind::Game, "Match the Memories", "MemoryGame")
                .with_config(StageConfig {
                    difficulty: Some(2),
                    goal: Some("Find every pair".into()),
                    ..StageConfig::default()
                }),
            StageDescriptor::new(5, StageKind::Content, "Why You're So {{trait}}", "TraitsStage"),
            StageDescriptor::new(6, StageKind::Game, "How Well Do You Know Me?", "TriviaGame")
                .with_config(StageConfig {
                    goal: Some("Get more than three right".into()),
                    ..StageConfig::default()
                }),
            StageDescriptor::new(7, StageKind::Special, "Make a Wish", "CakeStage")
                .with_config(StageConfig {
                    effect: Some(StageEffect::Candles),
                    ..StageConfig::default()
                }),
            StageDescriptor::new(8, StageKind::Special, "A Letter for {{name}}", "WishesStage")
                .with_config(StageConfig {
                    text_blocks: text(&[
                        "Another year of {{hobby}} and laughter.",
                        "Stay {{trait}}. The world needs it.",
                        "Happy birthday, {{name}}.",
                    ]),
                    ..StageConfig::default()
                }),
        ];
        StageRegistry { stages }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageDescriptor> {
        self.stages.iter()
    }

    pub fn get(&self, id: u32) -> Option<&StageDescriptor> {
        self.index_of(id).map(|i| &self.stages[i])
    }

    pub fn contains(&self, id: u32) -> bool {
        self.index_of(id).is_some()
    }

    pub fn index_of(&self, id: u32) -> Option<usize> {
        self.stages.binary_search_by_key(&id, |s| s.id).ok()
    }

    pub fn first_id(&self) -> u32 {
        self.stages.first().map_or(1, |s| s.id)
    }

    /// Id following `id` in registry order; None for the last or an unknown id.
    pub fn next_after(&self, id: u32) -> Option<u32> {
        let i = self.index_of(id)?;
        self.stages.get(i + 1).map(|s| s.id)
    }

    pub fn previous_before(&self, id: u32) -> Option<u32> {
        let i = self.index_of(id)?;
        i.checked_sub(1).map(|j| self.stages[j].id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stage::StageHandler;

    #[test]
    fn builtin_is_valid_and_fully_bound() {
        let reg = StageRegistry::builtin();
        assert_eq!(reg.len(), 8);
        assert!(reg.iter().all(|s| s.handler.is_some()));
        let ids: Vec<u32> = reg.iter().map(|s| s.id).collect();
        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
        // The same descriptors pass validation.
        assert!(StageRegistry::new(reg.stages.clone()).is_ok());
    }

    #[test]
    fn toml_stages_sorted_by_id() {
        let reg = StageRegistry::from_toml_str(
            r#"
            [[stage]]
            id = 5
            kind = "game"
            title = "Trivia"
            handler = "trivia"

            [[stage]]
            id = 2
            title = "Hello {{name}}"
            handler = "intro"
            text_blocks = ["one", "two"]
            "#,
        )
        .unwrap();
        assert_eq!(reg.first_id(), 2);
        assert_eq!(reg.next_after(2), Some(5));
        assert_eq!(reg.next_after(5), None);
        assert_eq!(reg.previous_before(5), Some(2));
        assert_eq!(reg.previous_before(2), None);
        let intro = reg.get(2).unwrap();
        assert_eq!(intro.kind, StageKind::Content);
        assert_eq!(intro.handler, Some(StageHandler::Intro));
        assert_eq!(intro.config.text_blocks.len(), 2);
    }

    #[test]
    fn presentation_fields_parsed() {
        let reg = StageRegistry::from_toml_str(
            r#"
            [[stage]]
            id = 1
            kind = "special"
            title = "Party"
            handler = "cake"
            goal = "Blow out the candles"
            effect = "sparkles"
            music = "party.ogg"

            [[stage]]
            id = 2
            title = "Quiet"
            handler = "intro"
            effect = "fireworks"
            "#,
        )
        .unwrap();
        let party = reg.get(1).unwrap();
        assert_eq!(party.kind, StageKind::Special);
        assert_eq!(party.config.goal.as_deref(), Some("Blow out the candles"));
        assert_eq!(party.config.effect, Some(StageEffect::Sparkles));
        assert_eq!(party.config.music.as_deref(), Some("party.ogg"));
        assert_eq!(reg.get(2).unwrap().config.effect, None);
    }

    #[test]
    fn validation_rejects_bad_lists() {
        assert!(matches!(StageRegistry::new(vec![]), Err(RegistryError::Empty)));
        let zero = vec![StageDescriptor::new(0, StageKind::Content, "x", "intro")];
        assert!(matches!(StageRegistry::new(zero), Err(RegistryError::InvalidId(0))));
        let dup = vec![
            StageDescriptor::new(1, StageKind::Content, "a", "intro"),
            StageDescriptor::new(1, StageKind::Game, "b", "trivia"),
        ];
        assert!(matches!(StageRegistry::new(dup), Err(RegistryError::DuplicateId(1))));
        let kind = StageRegistry::from_toml_str("[[stage]]\nid=1\nkind=\"boss\"\ntitle=\"x\"\nhandler=\"intro\"\n");
        assert!(matches!(kind, Err(RegistryError::UnknownKind { id: 1, .. })));
    }

    #[test]
    fn unknown_handler_is_kept_unbound() {
        let reg = StageRegistry::from_toml_str(
            "[[stage]]\nid = 1\ntitle = \"Puzzle\"\nhandler = \"PuzzleGame\"\n",
        )
        .unwrap();
        assert!(reg.get(1).unwrap().handler.is_none());
    }

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let reg = StageRegistry::load_or_builtin(Some(Path::new("/nonexistent/stages.toml")));
        assert_eq!(reg.len(), 8);
        assert!(matches!(
            StageRegistry::load(Path::new("/nonexistent/stages.toml")),
            Err(RegistryError::Read { .. })
        ));
    }
}
