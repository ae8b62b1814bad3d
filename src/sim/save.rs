/// Local score storage: one named integer, `balloonGameScore`.
///
/// ## File format:
///   Key-value lines in `scores.dat`, the same shape as the old save files.
///   Unknown keys are preserved on write. A missing file, missing key or
///   unparsable value all read as 0.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

pub const BALLOON_SCORE_KEY: &str = "balloonGameScore";
pub const SCORE_FILE: &str = "scores.dat";

pub trait ScoreStore {
    /// 0 when absent.
    fn read(&self, key: &str) -> u32;
    /// Overwrites any previous value.
    fn write(&mut self, key: &str, value: u32) -> Result<(), StoreError>;
    fn clear(&mut self, key: &str) -> Result<(), StoreError>;
}

// ══════════════════════════════════════════════════════════════
// File store
// ══════════════════════════════════════════════════════════════

pub struct FileScoreStore {
    path: PathBuf,
}

impl FileScoreStore {
    pub fn new(path: PathBuf) -> Self {
        FileScoreStore { path }
    }

    /// `scores.dat` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SCORE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entries(&self) -> BTreeMap<String, String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => parse(&content),
            Err(_) => BTreeMap::new(),
        }
    }

    fn store(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        std::fs::write(&self.path, serialize(entries))?;
        Ok(())
    }
}

impl ScoreStore for FileScoreStore {
    fn read(&self, key: &str) -> u32 {
        self.entries()
            .get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    fn write(&mut self, key: &str, value: u32) -> Result<(), StoreError> {
        let mut entries = self.entries();
        entries.insert(key.to_string(), value.to_string());
        self.store(&entries)
    }

    fn clear(&mut self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries();
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.store(&entries)
    }
}

// ══════════════════════════════════════════════════════════════
// In-memory store
// ══════════════════════════════════════════════════════════════

/// Used when no writable directory exists, and by tests.
#[derive(Default)]
pub struct MemoryScoreStore {
    values: BTreeMap<String, u32>,
}

impl ScoreStore for MemoryScoreStore {
    fn read(&self, key: &str) -> u32 {
        self.values.get(key).copied().unwrap_or(0)
    }

    fn write(&mut self, key: &str, value: u32) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn clear(&mut self, key: &str) -> Result<(), StoreError> {
        self.values.remove(key);
        Ok(())
    }
}

/// File store in `dir`, or an in-memory one when `dir` cannot be written.
pub fn open_score_store(dir: &Path) -> Box<dyn ScoreStore> {
    let file = FileScoreStore::in_dir(dir);
    match OpenOptions::new().create(true).append(true).open(file.path()) {
        Ok(_) => {
            log::info!("scores kept in {}", file.path().display());
            Box::new(file)
        }
        Err(e) => {
            log::warn!("scores kept in memory, {} not writable: {e}", dir.display());
            Box::new(MemoryScoreStore::default())
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Bonus
// ══════════════════════════════════════════════════════════════

/// Display-only longevity bonus shown on the closing letter: one extra
/// year per balloon popped.
pub fn bonus_years(store: &dyn ScoreStore) -> u32 {
    store.read(BALLOON_SCORE_KEY)
}

pub fn bonus_text(years: u32) -> String {
    match years {
        0 => "No bonus years this time. Every year is still a gift.".to_string(),
        1 => "+1 year of good luck, earned by popping one balloon.".to_string(),
        n => format!("+{} years of good luck, one for every balloon you popped.", n),
    }
}

// ══════════════════════════════════════════════════════════════
// Serialization
// ══════════════════════════════════════════════════════════════

fn serialize(entries: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (k, v) in entries {
        out.push_str(&format!("{}={}\n", k, v));
    }
    out
}

fn parse(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(|line| {
            let (k, v) = line.trim().split_once('=')?;
            let k = k.trim();
            if k.is_empty() {
                return None;
            }
            Some((k.to_string(), v.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(tag: &str) -> FileScoreStore {
        let dir = std::env::temp_dir().join(format!("birthday-stages-{}-{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let store = FileScoreStore::in_dir(&dir);
        let _ = std::fs::remove_file(store.path());
        store
    }

    #[test]
    fn absent_reads_zero() {
        let store = temp_store("absent");
        assert_eq!(store.read(BALLOON_SCORE_KEY), 0);
        assert_eq!(MemoryScoreStore::default().read(BALLOON_SCORE_KEY), 0);
    }

    #[test]
    fn write_overwrites_and_keeps_other_keys() {
        let mut store = temp_store("overwrite");
        std::fs::write(store.path(), "theme=dark\n").unwrap();
        store.write(BALLOON_SCORE_KEY, 12).unwrap();
        store.write(BALLOON_SCORE_KEY, 4).unwrap();
        assert_eq!(store.read(BALLOON_SCORE_KEY), 4);
        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("theme=dark"));
        assert_eq!(text.matches(BALLOON_SCORE_KEY).count(), 1);
    }

    #[test]
    fn garbage_value_reads_zero() {
        let store = temp_store("garbage");
        std::fs::write(store.path(), "balloonGameScore=lots\nnot a line\n").unwrap();
        assert_eq!(store.read(BALLOON_SCORE_KEY), 0);
    }

    #[test]
    fn clear_removes_key() {
        let mut store = temp_store("clear");
        store.write(BALLOON_SCORE_KEY, 9).unwrap();
        store.clear(BALLOON_SCORE_KEY).unwrap();
        assert_eq!(store.read(BALLOON_SCORE_KEY), 0);

        let mut mem = MemoryScoreStore::default();
        mem.write(BALLOON_SCORE_KEY, 3).unwrap();
        mem.clear(BALLOON_SCORE_KEY).unwrap();
        assert_eq!(mem.read(BALLOON_SCORE_KEY), 0);
    }

    #[test]
    fn unwritable_dir_falls_back_to_memory() {
        let mut store = open_score_store(Path::new("/nonexistent/birthday-stages"));
        store.write(BALLOON_SCORE_KEY, 6).unwrap();
        assert_eq!(store.read(BALLOON_SCORE_KEY), 6);

        let dir = std::env::temp_dir().join(format!("birthday-stages-open-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut on_disk = open_score_store(&dir);
        on_disk.write(BALLOON_SCORE_KEY, 8).unwrap();
        assert_eq!(FileScoreStore::in_dir(&dir).read(BALLOON_SCORE_KEY), 8);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bonus_follows_stored_score() {
        let mut mem = MemoryScoreStore::default();
        assert_eq!(bonus_years(&mem), 0);
        mem.write(BALLOON_SCORE_KEY, 17).unwrap();
        assert_eq!(bonus_years(&mem), 17);
        assert!(bonus_text(17).starts_with("+17 years"));
        assert!(bonus_text(1).starts_with("+1 year "));
    }
}
