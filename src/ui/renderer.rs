/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// Every stage runtime has its own `compose_*` function. The header
/// (title, progress bar, navigation dots, time alive) and the footer help
/// line are shared.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::balloon::BalloonPhase;
use crate::domain::content::{Cake, CakePhase, TextReveal};
use crate::domain::memory::MemoryPhase;
use crate::domain::stage::StageEffect;
use crate::domain::trivia::TriviaPhase;
use crate::sim::progress::{nav_dots, percent_complete, DotState, TimeAlive};
use crate::sim::save::bonus_text;
use crate::sim::session::{
    BalloonStage, Letter, ListStage, MemoryStage, Session, StageRuntime, TriviaStage,
};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: [u8; 4],
    ch_len: u8,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit background for every "empty" cell. Using the same RGB for
    /// `Clear(ClearType::All)` and each cell keeps VTE terminals from
    /// showing lines between rows.
    const BASE_BG: Color = Color::Rgb { r: 28, g: 20, b: 36 };

    const BLANK: Cell = Cell {
        ch: [b' ', 0, 0, 0],
        ch_len: 1,
        fg: Color::White,
        bg: Cell::BASE_BG,
    };

    /// Sentinel cell used to invalidate the back buffer.
    const INVALID: Cell = Cell {
        ch: [b'?', 0, 0, 0],
        ch_len: 1,
        fg: Color::Magenta,
        bg: Color::Magenta,
    };

    /// Color::Reset maps to BASE_BG so no cell uses the terminal default.
    #[inline]
    fn norm_bg(bg: Color) -> Color {
        match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        }
    }

    fn from_char(c: char, fg: Color, bg: Color) -> Self {
        let mut cell = Self::BLANK;
        cell.ch_len = c.encode_utf8(&mut cell.ch).len() as u8;
        cell.fg = fg;
        cell.bg = Self::norm_bg(bg);
        cell
    }

    fn as_str(&self) -> &str {
        std::str::from_utf8(&self.ch[..self.ch_len as usize]).unwrap_or(" ")
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer {
            width: w,
            height: h,
            cells: vec![Cell::BLANK; w * h],
        }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write a string at (x, y). Each char occupies one column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        let mut cx = x;
        for ch in s.chars() {
            if cx >= self.width { break; }
            self.set(cx, y, Cell::from_char(ch, fg, bg));
            cx += 1;
        }
    }

    /// Centered on the row; clipped on narrow terminals.
    fn put_center(&mut self, y: usize, s: &str, fg: Color, bg: Color) {
        let len = s.chars().count();
        let x = self.width.saturating_sub(len) / 2;
        self.put_str(x, y, s, fg, bg);
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::from_char(' ', Color::White, bg));
        }
    }

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, bg: Color) {
        for row in y..y + h {
            for col in x..x + w {
                self.set(col, row, Cell::from_char(' ', Color::White, bg));
            }
        }
    }
}

/// Word-wrap `text` to lines of at most `width` columns.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(8);
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let needed = line.chars().count() + word.chars().count() + usize::from(!line.is_empty());
        if needed > width && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

// ── Palette ──

const GOLD: Color = Color::Rgb { r: 255, g: 210, b: 90 };
const PINK: Color = Color::Rgb { r: 255, g: 120, b: 170 };
const MINT: Color = Color::Rgb { r: 110, g: 230, b: 170 };
const SKY: Color = Color::Rgb { r: 120, g: 190, b: 255 };
const SOFT: Color = Color::Rgb { r: 200, g: 190, b: 210 };
const DIM: Color = Color::Rgb { r: 110, g: 100, b: 125 };
const ALERT: Color = Color::Rgb { r: 255, g: 95, b: 95 };
const PANEL_BG: Color = Color::Rgb { r: 48, g: 34, b: 60 };
const HUD_BG: Color = Color::Rgb { r: 60, g: 36, b: 72 };
const SELECT_BG: Color = Color::Rgb { r: 90, g: 60, b: 110 };

/// Vertical layout
const HUD_ROW: usize = 0;
const DOTS_ROW: usize = 1;
const CLOCK_ROW: usize = 2;
const GOAL_ROW: usize = 3;
const BODY_ROW: usize = 4;

/// Per-frame status that lives outside the session.
pub struct Hud {
    /// An output device is open.
    pub sound: bool,
    pub muted: bool,
    pub alive: Option<TimeAlive>,
    pub gamepad: bool,
}

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_stage: Option<u32>,
    frame: u64,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_stage: None,
            frame: 0,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Full repaint on the first frame.
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, session: &Session, hud: &Hud) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        // Clean slate when the stage changes.
        let stage = session.controller().current();
        if self.last_stage != Some(stage) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_stage = Some(stage);
        }

        self.frame = self.frame.wrapping_add(1);
        self.front.clear();

        self.compose_header(session, hud);
        match session.runtime() {
            StageRuntime::Intro(reveal) => self.compose_intro(session, reveal),
            StageRuntime::Balloon(s) => self.compose_balloon(s),
            StageRuntime::Gallery(list) => self.compose_gallery(list),
            StageRuntime::Memory(s) => self.compose_memory(s),
            StageRuntime::Traits(list) => self.compose_traits(session, list),
            StageRuntime::Trivia(s) => self.compose_trivia(s),
            StageRuntime::Cake(cake) => self.compose_cake(session, cake),
            StageRuntime::Wishes(letter) => self.compose_wishes(session, letter),
            StageRuntime::NotImplemented => self.compose_not_implemented(session),
            StageRuntime::NotFound => self.compose_not_found(stage),
        }
        self.compose_stage_extras(session);
        self.compose_footer(session.runtime());
        if session.is_dev() {
            self.compose_dev_overlay(session);
        }

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        // Explicit base colors; ResetColor would fall back to the
        // terminal's own default.
        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    need_move = true;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.as_str()))?;
                last_x = x;
                last_y = y;
            }
        }

        self.writer.flush()
    }

    fn blink(&self) -> bool {
        (self.frame / 10) % 2 == 0
    }

    fn body_bottom(&self) -> usize {
        self.front.height.saturating_sub(2)
    }

    // ── Shared chrome ──

    fn compose_header(&mut self, session: &Session, hud: &Hud) {
        let w = self.front.width;
        self.front.fill_row(HUD_ROW, HUD_BG);

        let ctrl = session.controller();
        let total = ctrl.registry().len();
        let index = ctrl.registry().index_of(ctrl.current()).map_or(0, |i| i + 1);
        let kind = session.current_descriptor().map_or("lost", |d| d.kind.label());
        let left = format!(" ★ {}   Stage {}/{} · {} ", session.current_title(), index, total, kind);
        self.front.put_str(0, HUD_ROW, &left, GOLD, HUD_BG);

        let mut right = String::new();
        if hud.gamepad {
            right.push_str("◆ pad  ");
        }
        let (note, fg) = match (hud.sound, hud.muted) {
            (false, _) => ("♪ -- ", DIM),
            (true, true) => ("♪ off ", DIM),
            (true, false) => ("♪ on ", MINT),
        };
        right.push_str(note);
        let rx = w.saturating_sub(right.chars().count());
        self.front.put_str(rx, HUD_ROW, &right, fg, HUD_BG);

        // Progress bar followed by the navigation dots.
        let pct = percent_complete(ctrl);
        let bar_w = 20;
        let filled = (pct as usize * bar_w) / 100;
        let mut x = 1;
        for i in 0..bar_w {
            let (ch, fg) = if i < filled { ('█', PINK) } else { ('░', DIM) };
            self.front.set(x, DOTS_ROW, Cell::from_char(ch, fg, Color::Reset));
            x += 1;
        }
        self.front.put_str(x, DOTS_ROW, &format!(" {:>3}%   ", pct), SOFT, Color::Reset);
        x += 8;
        for dot in nav_dots(ctrl) {
            let (ch, fg) = match dot.state {
                DotState::Current => ('◉', GOLD),
                DotState::Completed => ('●', MINT),
                DotState::Reachable => ('○', SKY),
                DotState::Locked => ('·', DIM),
            };
            self.front.set(x, DOTS_ROW, Cell::from_char(ch, fg, Color::Reset));
            x += 2;
        }

        if let Some(alive) = &hud.alive {
            let line = format!(" {} has been amazing for {}", session.profile().name, alive.describe());
            self.front.put_str(0, CLOCK_ROW, &line, DIM, Color::Reset);
        }
    }

    /// Goal line under the header and the stage's ambient effect along
    /// the bottom of the body.
    fn compose_stage_extras(&mut self, session: &Session) {
        let Some(desc) = session.current_descriptor() else { return };
        if let Some(goal) = &desc.config.goal {
            self.front.put_center(GOAL_ROW, &format!("◇ {} ◇", goal), SKY, Color::Reset);
        }
        let row = self.body_bottom();
        if row <= BODY_ROW {
            return;
        }
        match desc.config.effect {
            Some(StageEffect::Confetti) => {
                let colors = [PINK, GOLD, MINT, SKY];
                let shift = (self.frame / 8) as usize;
                for x in (0..self.front.width).step_by(3) {
                    let k = (x / 3 + shift) % 7;
                    if k < 4 {
                        let ch = ['*', '•', '+', '°'][k];
                        self.front.set(x, row, Cell::from_char(ch, colors[k], Color::Reset));
                    }
                }
            }
            Some(StageEffect::Candles) => {
                let w = self.front.width;
                for x in (w / 4..w - w / 4).step_by(4) {
                    let ch = if (self.frame / 5 + x as u64) % 3 == 0 { '˙' } else { '·' };
                    self.front.set(x, row, Cell::from_char(ch, GOLD, Color::Reset));
                }
            }
            Some(StageEffect::Sparkles) => {
                let on = self.blink();
                for x in (2..self.front.width).step_by(6) {
                    let ch = if on == (x % 12 == 2) { '✦' } else { '✧' };
                    self.front.set(x, row, Cell::from_char(ch, SOFT, Color::Reset));
                }
            }
            None => {}
        }
    }

    fn compose_footer(&mut self, runtime: &StageRuntime) {
        let row = self.front.height.saturating_sub(1);
        if row <= BODY_ROW {
            return;
        }
        let help = match runtime {
            StageRuntime::Intro(_) => "ENTER continue   R replay   ESC back",
            StageRuntime::Wishes(_) => "ENTER continue   ESC back",
            StageRuntime::Balloon(b) => match b.game.phase {
                BalloonPhase::Idle => "ENTER start",
                BalloonPhase::Active => "←→ aim   ENTER / 1-9 pop",
                BalloonPhase::Complete => "ENTER continue   R play again",
            },
            StageRuntime::Gallery(_) | StageRuntime::Traits(_) => "←→ browse   ENTER continue   ESC back",
            StageRuntime::Memory(m) => match m.game.phase {
                MemoryPhase::Complete => "ENTER continue   R play again",
                _ => "←↑↓→ move   ENTER flip   R restart",
            },
            StageRuntime::Trivia(t) => match t.game.phase {
                TriviaPhase::Intro => "ENTER start",
                TriviaPhase::Playing if t.game.is_locked() => "ENTER next question",
                TriviaPhase::Playing => "↑↓ choose   ENTER / 1-4 answer",
                TriviaPhase::Complete { passed: true } => "ENTER continue   R play again",
                TriviaPhase::Complete { passed: false } => "ENTER try again",
            },
            StageRuntime::Cake(_) => "ENTER blow / continue",
            StageRuntime::NotImplemented => "ENTER skip   ESC back",
            StageRuntime::NotFound => "ENTER back to the start",
        };
        let line = format!(" {}   PgUp/PgDn stages   M mute   Q quit", help);
        self.front.put_str(0, row, &line, DIM, Color::Reset);
    }

    fn compose_dev_overlay(&mut self, session: &Session) {
        let handler = session.current_descriptor()
            .map_or("-", |d| d.handler.map_or("unbound", |h| h.key()));
        let lines = [
            "DEV".to_string(),
            format!("stage    {}", session.controller().current()),
            format!("handler  {}", handler),
            format!("reached  {}", session.controller().highest_reached()),
            format!("done     {}", session.controller().completed().len()),
            "S  skip".to_string(),
            "P  back".to_string(),
            "F  finish memory".to_string(),
        ];
        let box_w = 20;
        let x = self.front.width.saturating_sub(box_w + 1);
        let y = BODY_ROW;
        self.front.fill_rect(x, y, box_w, lines.len() + 2, PANEL_BG);
        for (i, l) in lines.iter().enumerate() {
            let fg = if i == 0 { ALERT } else { SOFT };
            self.front.put_str(x + 2, y + 1 + i, l, fg, PANEL_BG);
        }
    }

    /// Banner box used for headings and summaries.
    fn banner(&mut self, y: usize, text: &str, fg: Color) {
        let inner = text.chars().count() + 4;
        let bar: String = "═".repeat(inner);
        self.front.put_center(y, &format!("╔{}╗", bar), fg, Color::Reset);
        self.front.put_center(y + 1, &format!("║  {}  ║", text), fg, Color::Reset);
        self.front.put_center(y + 2, &format!("╚{}╝", bar), fg, Color::Reset);
    }

    fn text_column(&mut self, y: usize, lines: &[String], fg: Color) -> usize {
        let width = self.front.width.saturating_sub(8).min(70);
        let x = self.front.width.saturating_sub(width) / 2;
        let mut row = y;
        for block in lines {
            for line in wrap(block, width) {
                if row >= self.body_bottom() { return row; }
                self.front.put_str(x, row, &line, fg, Color::Reset);
                row += 1;
            }
            row += 1;
        }
        row
    }

    // ── Content stages ──

    fn compose_intro(&mut self, session: &Session, reveal: &TextReveal) {
        let title = session.current_title();
        self.banner(BODY_ROW + 1, &title, GOLD);
        let blocks = reveal.visible().to_vec();
        let row = self.text_column(BODY_ROW + 5, &blocks, SOFT);
        if !reveal.is_complete() && self.blink() {
            self.front.put_center(row, "· · ·", DIM, Color::Reset);
        }
    }

    fn compose_gallery(&mut self, list: &ListStage) {
        self.front.put_center(BODY_ROW, "A few favourite memories", GOLD, Color::Reset);
        if list.items.is_empty() {
            self.front.put_center(BODY_ROW + 3, "(the album is empty)", DIM, Color::Reset);
            return;
        }
        let caption = &list.items[list.cursor.pos];
        let frame_w = self.front.width.saturating_sub(10).min(60);
        let x = self.front.width.saturating_sub(frame_w) / 2;
        let y = BODY_ROW + 2;
        let lines = wrap(caption, frame_w.saturating_sub(4));
        let frame_h = lines.len() + 4;
        self.front.fill_rect(x, y, frame_w, frame_h, PANEL_BG);
        for (i, line) in lines.iter().enumerate() {
            self.front.put_str(x + 2, y + 2 + i, line, Color::White, PANEL_BG);
        }

        // Thumbnail strip.
        let mut strip = String::new();
        for i in 0..list.items.len() {
            strip.push(if i == list.cursor.pos { '■' } else { '□' });
            strip.push(' ');
        }
        self.front.put_center(y + frame_h + 1, strip.trim_end(), PINK, Color::Reset);
        let counter = format!("{} / {}", list.cursor.pos + 1, list.items.len());
        self.front.put_center(y + frame_h + 2, &counter, DIM, Color::Reset);
    }

    fn compose_traits(&mut self, session: &Session, list: &ListStage) {
        let heading = format!("What makes {} wonderful", session.profile().name);
        self.front.put_center(BODY_ROW, &heading, GOLD, Color::Reset);
        if list.items.is_empty() {
            self.front.put_center(BODY_ROW + 3, "(too wonderful for words)", DIM, Color::Reset);
            return;
        }
        let x = self.front.width.saturating_sub(50) / 2;
        for (i, name) in list.items.iter().enumerate() {
            let y = BODY_ROW + 2 + i;
            if y >= self.body_bottom() { break; }
            let selected = i == list.cursor.pos;
            let bg = if selected { SELECT_BG } else { Color::Reset };
            let marker = if selected { "▸ " } else { "  " };
            self.front.put_str(x, y, &format!("{}{:<24}", marker, name), PINK, bg);
        }
        let name = &list.items[list.cursor.pos];
        if let Some(text) = session.profile().trait_descriptions.get(name) {
            let row = BODY_ROW + 3 + list.items.len();
            self.text_column(row, &[text.clone()], SOFT);
        }
    }

    fn compose_cake(&mut self, session: &Session, cake: &Cake) {
        let candles = cake.candles as usize;
        let width = (candles * 2 + 5).max(15);
        let cx = self.front.width.saturating_sub(width) / 2;
        let y = BODY_ROW + 2;
        let lit = cake.phase == CakePhase::Lit;

        // Flames and wicks.
        for i in 0..candles {
            let x = cx + 3 + i * 2;
            if lit {
                let flame = if (self.frame / 6 + i as u64) % 2 == 0 { '♦' } else { '◆' };
                self.front.set(x, y, Cell::from_char(flame, GOLD, Color::Reset));
            } else {
                self.front.set(x, y, Cell::from_char('~', DIM, Color::Reset));
            }
            self.front.set(x, y + 1, Cell::from_char('║', SKY, Color::Reset));
        }
        let frosting: String = "▀".repeat(width);
        let layer: String = "█".repeat(width);
        self.front.put_str(cx, y + 2, &frosting, Color::White, Color::Reset);
        self.front.put_str(cx, y + 3, &layer, PINK, Color::Reset);
        self.front.put_str(cx, y + 4, &layer, Color::Rgb { r: 200, g: 90, b: 140 }, Color::Reset);
        let plate: String = "▔".repeat(width + 4);
        self.front.put_str(cx.saturating_sub(2), y + 5, &plate, SOFT, Color::Reset);

        let msg_row = y + 7;
        match cake.phase {
            CakePhase::Lit => {
                self.front.put_center(msg_row, "Make a wish and blow out the candles!", GOLD, Color::Reset);
            }
            CakePhase::Blown => {
                self.front.put_center(msg_row, "Whoosh...", SOFT, Color::Reset);
            }
            CakePhase::Celebrating | CakePhase::Done => {
                let fg = if self.blink() { PINK } else { GOLD };
                let text = format!("✦ Happy Birthday, {}! ✦", session.profile().name);
                self.banner(msg_row, &text, fg);
                if cake.phase == CakePhase::Done {
                    self.front.put_center(msg_row + 4, "Press ENTER for one last surprise", MINT, Color::Reset);
                }
            }
        }
    }

    fn compose_wishes(&mut self, session: &Session, letter: &Letter) {
        let title = session.current_title();
        if !letter.opened {
            let x = self.front.width.saturating_sub(24) / 2;
            let y = BODY_ROW + 3;
            let envelope = [
                "┌──────────────────────┐",
                "│╲                    ╱│",
                "│  ╲                ╱  │",
                "│    ╲     ♥      ╱    │",
                "│      ╲────────╱      │",
                "└──────────────────────┘",
            ];
            for (i, l) in envelope.iter().enumerate() {
                self.front.put_str(x, y + i, l, PINK, Color::Reset);
            }
            self.front.put_center(y + envelope.len() + 1, &title, GOLD, Color::Reset);
            if self.blink() {
                self.front.put_center(y + envelope.len() + 3, "Press ENTER to open", SOFT, Color::Reset);
            }
            return;
        }
        self.front.put_center(BODY_ROW, &title, GOLD, Color::Reset);
        let mut blocks = letter.blocks.clone();
        blocks.push(bonus_text(letter.bonus_years));
        self.text_column(BODY_ROW + 2, &blocks, Color::White);
    }

    // ── Games ──

    fn compose_balloon(&mut self, s: &BalloonStage) {
        let game = &s.game;
        let status = format!("Score {:>3}    Time {:>2}s", game.score, game.time_remaining);
        self.front.put_center(BODY_ROW, &status, GOLD, Color::Reset);

        match game.phase {
            BalloonPhase::Idle => {
                self.banner(BODY_ROW + 3, "Balloon Pop", PINK);
                let rules = format!("Pop as many balloons as you can in {} seconds!", game.duration_secs());
                self.front.put_center(BODY_ROW + 7, &rules, SOFT, Color::Reset);
                self.front.put_center(BODY_ROW + 9, "Press ENTER to start", MINT, Color::Reset);
            }
            BalloonPhase::Active => self.compose_balloon_field(s),
            BalloonPhase::Complete if game.summary_visible => {
                self.banner(BODY_ROW + 3, game.rating().headline(), GOLD);
                let popped = format!("You popped {} balloons", game.score);
                let rate = format!("{:.1} pops per second", game.pops_per_second());
                self.front.put_center(BODY_ROW + 7, &popped, Color::White, Color::Reset);
                self.front.put_center(BODY_ROW + 8, &rate, SOFT, Color::Reset);
                self.front.put_center(BODY_ROW + 10, "ENTER continue    R play again", MINT, Color::Reset);
            }
            BalloonPhase::Complete => {
                self.front.put_center(BODY_ROW + 4, "Round over", SOFT, Color::Reset);
            }
        }
    }

    fn compose_balloon_field(&mut self, s: &BalloonStage) {
        let top = BODY_ROW + 2;
        let bottom = self.body_bottom();
        if bottom <= top + 3 {
            return;
        }
        let field_h = (bottom - top - 3) as f32;
        let field_w = self.front.width.saturating_sub(4) as f32;

        for (slot, b) in s.game.balloons.iter().enumerate() {
            let col = 1 + (b.x / 100.0 * field_w) as usize;
            let row = top + (b.y / 100.0 * field_h) as usize;
            let (r, g, bl) = b.color.rgb();
            let fg = Color::Rgb { r, g, b: bl };
            let bg = if slot == s.cursor.pos { SELECT_BG } else { Color::Reset };
            self.front.put_str(col, row, &format!("({})", slot + 1), fg, bg);
            self.front.set(col + 1, row + 1, Cell::from_char('│', DIM, Color::Reset));
            self.front.set(col + 1, row + 2, Cell::from_char('╵', DIM, Color::Reset));
        }
    }

    fn compose_memory(&mut self, s: &MemoryStage) {
        let game = &s.game;
        let status = format!(
            "Pairs {}/{}    Turns {}",
            game.matches_found, game.target_pairs(), game.attempts
        );
        self.front.put_center(BODY_ROW, &status, GOLD, Color::Reset);

        if game.phase == MemoryPhase::Complete && game.summary_visible {
            self.banner(BODY_ROW + 3, game.rating().headline(), GOLD);
            let turns = format!("All {} pairs found in {} turns", game.target_pairs(), game.attempts);
            self.front.put_center(BODY_ROW + 7, &turns, Color::White, Color::Reset);
            self.front.put_center(BODY_ROW + 9, "ENTER continue    R play again", MINT, Color::Reset);
            return;
        }

        let cols = s.cols.max(1);
        let card_w = 7;
        let grid_w = cols * card_w;
        let x0 = self.front.width.saturating_sub(grid_w) / 2;
        let y0 = BODY_ROW + 2;
        for (i, card) in game.cards.iter().enumerate() {
            let x = x0 + (i % cols) * card_w;
            let y = y0 + (i / cols) * 2;
            let selected = i == s.cursor.pos;
            let bg = if selected { SELECT_BG } else { Color::Reset };
            let (face, fg) = match (card.face_up(), card.matched) {
                (true, true) => (card.face.glyph(), MINT),
                (true, false) => (card.face.glyph(), GOLD),
                (false, _) => ('?', DIM),
            };
            self.front.put_str(x, y, "[   ]", fg, bg);
            self.front.set(x + 2, y, Cell::from_char(face, fg, bg));
        }
        if game.phase == MemoryPhase::Evaluating {
            let rows = game.cards.len().div_ceil(cols);
            self.front.put_center(y0 + rows * 2, "...", SOFT, Color::Reset);
        }
    }

    fn compose_trivia(&mut self, s: &TriviaStage) {
        let game = &s.game;
        match game.phase {
            TriviaPhase::Intro => {
                self.banner(BODY_ROW + 2, "Birthday Trivia", SKY);
                let rules = format!(
                    "{} questions. Get more than {} right to pass.",
                    game.questions.len(), game.required_correct()
                );
                self.front.put_center(BODY_ROW + 6, &rules, SOFT, Color::Reset);
                self.front.put_center(BODY_ROW + 8, "Press ENTER to begin", MINT, Color::Reset);
            }
            TriviaPhase::Playing => {
                let Some(q) = game.current_question() else { return };
                let header = format!(
                    "Question {}/{}    Score {}",
                    game.current_index + 1, game.questions.len(), game.score
                );
                self.front.put_center(BODY_ROW, &header, GOLD, Color::Reset);
                let filled = game.progress() as usize / 10;
                let bar = format!("{}{}", "▰".repeat(filled), "▱".repeat(10 - filled));
                self.front.put_center(BODY_ROW + 1, &bar, PINK, Color::Reset);
                let row = self.text_column(BODY_ROW + 3, &[q.prompt.clone()], Color::White);
                let locked = game.last_answer().filter(|_| game.is_locked());
                let x = self.front.width.saturating_sub(50) / 2;
                for (i, opt) in q.options.iter().enumerate() {
                    let y = row + i;
                    let (fg, bg) = match locked {
                        Some(a) if i == a.correct => (MINT, Color::Reset),
                        Some(a) if i == a.chosen => (ALERT, Color::Reset),
                        Some(_) => (DIM, Color::Reset),
                        None if i == s.cursor.pos => (Color::White, SELECT_BG),
                        None => (SOFT, Color::Reset),
                    };
                    self.front.put_str(x, y, &format!(" {}. {:<40}", i + 1, opt), fg, bg);
                }
                if let Some(a) = locked {
                    let (msg, fg) = if a.was_correct { ("Correct!", MINT) } else { ("Not quite.", ALERT) };
                    self.front.put_center(row + q.options.len() + 1, msg, fg, Color::Reset);
                }
            }
            TriviaPhase::Complete { passed } => {
                let (title, fg) = if passed { ("You know them well!", GOLD) } else { ("Almost there", ALERT) };
                self.banner(BODY_ROW + 2, title, fg);
                let score = format!("{} of {} correct", game.score, game.questions.len());
                self.front.put_center(BODY_ROW + 6, &score, Color::White, Color::Reset);
                let log: Vec<String> = game.answers.iter()
                    .map(|a| format!("Q{} {}", a.question_id, if a.was_correct { '✓' } else { '✗' }))
                    .collect();
                self.front.put_center(BODY_ROW + 7, &log.join("  "), DIM, Color::Reset);
                let next = if passed { "ENTER continue    R play again" } else { "ENTER try again" };
                self.front.put_center(BODY_ROW + 8, next, MINT, Color::Reset);
            }
        }
    }

    // ── Fallbacks ──

    fn compose_not_implemented(&mut self, session: &Session) {
        let title = session.current_title();
        self.banner(BODY_ROW + 2, &title, SOFT);
        self.front.put_center(BODY_ROW + 6, "This surprise is still being wrapped.", DIM, Color::Reset);
        self.front.put_center(BODY_ROW + 8, "Press ENTER to skip ahead", MINT, Color::Reset);
    }

    fn compose_not_found(&mut self, stage: u32) {
        self.banner(BODY_ROW + 2, "Lost in the party", ALERT);
        let msg = format!("There is no stage {}.", stage);
        self.front.put_center(BODY_ROW + 6, &msg, SOFT, Color::Reset);
        self.front.put_center(BODY_ROW + 8, "Press ENTER to go back to the start", MINT, Color::Reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_breaks_on_words() {
        let lines = wrap("one two three four five six", 10);
        assert_eq!(lines, vec!["one two", "three four", "five six"]);
        assert!(wrap("   ", 10).is_empty());
    }

    #[test]
    fn put_center_clips() {
        let mut fb = FrameBuffer::new(6, 1);
        fb.put_center(0, "ab", Color::White, Color::Reset);
        assert_eq!(fb.get(2, 0).as_str(), "a");
        fb.put_center(0, "abcdefgh", Color::White, Color::Reset);
        assert_eq!(fb.get(5, 0).as_str(), "f");
        assert_eq!(fb.get(9, 0).as_str(), " ");
    }
}
