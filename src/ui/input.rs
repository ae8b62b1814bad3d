/// Keyboard input tracker.
///
/// Every stage action is edge-triggered: a key counts once when it goes
/// from "not held" to "held", so auto-repeat from a held key does not pop
/// five balloons or skip three questions.
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't support it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that went from "not held" to "held" during the most recent
    /// drain_events() call.
    fresh_presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for modifier chords.
    pub raw_events: Vec<KeyEvent>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Drain all pending terminal events and update key states.
    /// Call this once per frame.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();

        // Resize events are dropped; the renderer polls the size itself.
        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.record(key);
            }
        }

        let now = Instant::now();
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    fn record(&mut self, key: KeyEvent) {
        self.raw_events.push(key);
        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&key.code);
            }
            KeyEventKind::Release => {}
            _ => {
                let was_held = self.is_held(key.code);
                self.last_active.insert(key.code, Instant::now());
                if !was_held {
                    self.fresh_presses.push(key.code);
                }
            }
        }
    }

    /// Was this key freshly pressed this frame?
    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.fresh_presses.contains(&code)
    }

    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    /// Fresh presses in arrival order.
    pub fn presses(&self) -> &[KeyCode] {
        &self.fresh_presses
    }

    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }

    /// Ctrl+Shift+D. Terminals report it either as an upper-case 'D' with
    /// CONTROL, or as 'd' with both modifiers.
    pub fn dev_chord_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.kind != KeyEventKind::Release
                && k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('D')
                    || (k.code == KeyCode::Char('d') && k.modifiers.contains(KeyModifiers::SHIFT)))
        })
    }

    /// Any Ctrl chord this frame; plain-key actions are skipped for those.
    pub fn ctrl_held(&self) -> bool {
        self.raw_events.iter().any(|k| k.modifiers.contains(KeyModifiers::CONTROL))
    }

    fn is_held(&self, code: KeyCode) -> bool {
        self.last_active.get(&code)
            .map(|t| t.elapsed() < HOLD_TIMEOUT)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    #[test]
    fn held_key_counts_once() {
        let mut kb = InputState::new();
        kb.record(press(KeyCode::Enter, KeyModifiers::NONE));
        kb.record(press(KeyCode::Enter, KeyModifiers::NONE));
        assert_eq!(kb.presses(), &[KeyCode::Enter]);
        assert!(kb.was_pressed(KeyCode::Enter));
    }

    #[test]
    fn dev_chord_variants() {
        let mut kb = InputState::new();
        kb.record(press(KeyCode::Char('D'), KeyModifiers::CONTROL | KeyModifiers::SHIFT));
        assert!(kb.dev_chord_pressed());

        let mut kb = InputState::new();
        kb.record(press(KeyCode::Char('d'), KeyModifiers::CONTROL | KeyModifiers::SHIFT));
        assert!(kb.dev_chord_pressed());

        let mut kb = InputState::new();
        kb.record(press(KeyCode::Char('d'), KeyModifiers::CONTROL));
        assert!(!kb.dev_chord_pressed());
        assert!(kb.ctrl_held());
    }
}
