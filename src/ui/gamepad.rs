/// Gamepad input tracker using gilrs.
///
/// Button mapping is loaded from config.toml via `load_button_config()`.
/// Default mapping:
///   D-pad / Left Stick    →  Move selection
///   A / Start             →  Confirm
///   B                     →  Back
///   Y                     →  Retry
///   Select                →  Dev overlay
///   L1 / R1               →  Previous / next reached stage
///
/// Every query is edge-triggered: a press counts for one frame.

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};

use crate::config::GamepadConfig;

#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
const STICK_DEADZONE: f32 = 0.25;

/// Logical button identifiers that can appear in the mapping.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Btn {
    A,
    B,
    X,
    Y,
    L1,
    R1,
    Start,
    Select,
}

const BTN_COUNT: usize = 8;

impl Btn {
    fn from_name(s: &str) -> Option<Btn> {
        match s.to_uppercase().as_str() {
            "A" | "SOUTH" => Some(Btn::A),
            "B" | "EAST" => Some(Btn::B),
            "X" | "WEST" => Some(Btn::X),
            "Y" | "NORTH" => Some(Btn::Y),
            "L1" | "LB" | "LEFTTRIGGER" => Some(Btn::L1),
            "R1" | "RB" | "RIGHTTRIGGER" => Some(Btn::R1),
            "START" => Some(Btn::Start),
            "SELECT" | "BACK" => Some(Btn::Select),
            _ => None,
        }
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<Btn> {
        Some(match btn {
            Button::South => Btn::A,
            Button::East => Btn::B,
            Button::West => Btn::X,
            Button::North => Btn::Y,
            Button::LeftTrigger => Btn::L1,
            Button::RightTrigger => Btn::R1,
            Button::Start => Btn::Start,
            Button::Select => Btn::Select,
            _ => return None,
        })
    }
}

/// Directions shared by the d-pad and the left stick.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Dir {
    Up,
    Down,
    Left,
    Right,
}

impl Dir {
    #[cfg(feature = "gamepad")]
    fn from_dpad(btn: Button) -> Option<Dir> {
        match btn {
            Button::DPadUp => Some(Dir::Up),
            Button::DPadDown => Some(Dir::Down),
            Button::DPadLeft => Some(Dir::Left),
            Button::DPadRight => Some(Dir::Right),
            _ => None,
        }
    }
}

/// Held state plus the press edge seen this frame.
#[derive(Clone, Copy, Debug, Default)]
struct Edge {
    down: bool,
    fresh: bool,
}

impl Edge {
    fn set(&mut self, down: bool) {
        if down && !self.down {
            self.fresh = true;
        }
        self.down = down;
    }
}

/// Action-to-button mapping (loaded from config).
struct ActionMap {
    confirm: Vec<Btn>,
    back: Vec<Btn>,
    retry: Vec<Btn>,
    dev_toggle: Vec<Btn>,
}

impl Default for ActionMap {
    fn default() -> Self {
        ActionMap {
            confirm: vec![Btn::A, Btn::Start],
            back: vec![Btn::B],
            retry: vec![Btn::Y],
            dev_toggle: vec![Btn::Select],
        }
    }
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    buttons: [Edge; BTN_COUNT],
    dpad: [Edge; 4],
    stick: [Edge; 4],
    stick_x: f32,
    stick_y: f32,

    action_map: ActionMap,

    pub connected: bool,
}

impl GamepadState {
    pub fn new() -> Self {
        #[cfg(feature = "gamepad")]
        let (gilrs, connected) = match Gilrs::new() {
            Ok(g) => {
                let has_pad = g.gamepads().next().is_some();
                (Some(g), has_pad)
            }
            Err(e) => {
                log::info!("gamepad support unavailable: {e}");
                (None, false)
            }
        };
        #[cfg(not(feature = "gamepad"))]
        let connected = false;

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs,
            buttons: [Edge::default(); BTN_COUNT],
            dpad: [Edge::default(); 4],
            stick: [Edge::default(); 4],
            stick_x: 0.0,
            stick_y: 0.0,
            action_map: ActionMap::default(),
            connected,
        }
    }

    /// Replace the default mapping for every action whose config list
    /// names at least one known button.
    pub fn load_button_config(&mut self, cfg: &GamepadConfig) {
        fn apply(slot: &mut Vec<Btn>, names: &[String]) {
            let parsed: Vec<Btn> = names.iter().filter_map(|s| Btn::from_name(s)).collect();
            if !parsed.is_empty() {
                *slot = parsed;
            }
        }
        let map = &mut self.action_map;
        apply(&mut map.confirm, &cfg.confirm);
        apply(&mut map.back, &cfg.back);
        apply(&mut map.retry, &cfg.retry);
        apply(&mut map.dev_toggle, &cfg.dev_toggle);
    }

    pub fn update(&mut self) {
        for e in self.buttons.iter_mut().chain(&mut self.dpad).chain(&mut self.stick) {
            e.fresh = false;
        }

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let Some(gilrs) = &mut self.gilrs else { return };
        let events: Vec<_> = std::iter::from_fn(|| gilrs.next_event()).collect();

        for event in events {
            match event.event {
                EventType::ButtonPressed(btn, _) => {
                    self.connected = true;
                    self.set_gilrs_button(btn, true);
                }
                EventType::ButtonReleased(btn, _) => {
                    self.connected = true;
                    self.set_gilrs_button(btn, false);
                }
                EventType::AxisChanged(Axis::LeftStickX, value, _) => {
                    self.connected = true;
                    self.stick_x = value;
                }
                EventType::AxisChanged(Axis::LeftStickY, value, _) => {
                    self.connected = true;
                    self.stick_y = value;
                }
                EventType::Connected => {
                    log::info!("gamepad connected");
                    self.connected = true;
                }
                EventType::Disconnected => {
                    log::info!("gamepad disconnected");
                    self.connected = false;
                    self.release_all();
                }
                _ => {}
            }
        }

        self.apply_stick();
    }

    #[cfg(feature = "gamepad")]
    fn set_gilrs_button(&mut self, btn: Button, down: bool) {
        if let Some(dir) = Dir::from_dpad(btn) {
            self.dpad[dir as usize].set(down);
        } else if let Some(b) = Btn::from_gilrs(btn) {
            self.set_button(b, down);
        }
    }

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn set_button(&mut self, btn: Btn, down: bool) {
        self.buttons[btn as usize].set(down);
    }

    /// Turn the analog stick position into digital directions.
    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn apply_stick(&mut self) {
        let (x, y) = (self.stick_x, self.stick_y);
        self.stick[Dir::Up as usize].set(y > STICK_DEADZONE);
        self.stick[Dir::Down as usize].set(y < -STICK_DEADZONE);
        self.stick[Dir::Left as usize].set(x < -STICK_DEADZONE);
        self.stick[Dir::Right as usize].set(x > STICK_DEADZONE);
    }

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn release_all(&mut self) {
        self.buttons = [Edge::default(); BTN_COUNT];
        self.dpad = [Edge::default(); 4];
        self.stick = [Edge::default(); 4];
        self.stick_x = 0.0;
        self.stick_y = 0.0;
    }

    // ── Action queries (config-driven) ──

    fn any_pressed(&self, btns: &[Btn]) -> bool {
        btns.iter().any(|&b| self.buttons[b as usize].fresh)
    }

    fn dir_pressed(&self, dir: Dir) -> bool {
        self.dpad[dir as usize].fresh || self.stick[dir as usize].fresh
    }

    pub fn confirm_pressed(&self) -> bool {
        self.any_pressed(&self.action_map.confirm)
    }
    pub fn back_pressed(&self) -> bool {
        self.any_pressed(&self.action_map.back)
    }
    pub fn retry_pressed(&self) -> bool {
        self.any_pressed(&self.action_map.retry)
    }
    pub fn dev_toggle_pressed(&self) -> bool {
        self.any_pressed(&self.action_map.dev_toggle)
    }
    pub fn prev_stage_pressed(&self) -> bool {
        self.any_pressed(&[Btn::L1])
    }
    pub fn next_stage_pressed(&self) -> bool {
        self.any_pressed(&[Btn::R1])
    }

    pub fn up_pressed(&self) -> bool {
        self.dir_pressed(Dir::Up)
    }
    pub fn down_pressed(&self) -> bool {
        self.dir_pressed(Dir::Down)
    }
    pub fn left_pressed(&self) -> bool {
        self.dir_pressed(Dir::Left)
    }
    pub fn right_pressed(&self) -> bool {
        self.dir_pressed(Dir::Right)
    }
}
