/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Compose the next screen into `front` (array of Cell)
///   2. Compare each cell with `back` (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. Batch everything with `queue!`, flush once
///   5. Swap front/back
///
/// Screens: loading, drill (exercise, timer, answer, 3×4 pad), results,
/// and the score reveal (badge + downsampled cell grid).

use std::io::{self, BufWriter, Write};
use std::time::Duration;

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use pixelcalc::domain::destabilize::Mode;
use pixelcalc::domain::grid::CellGrid;
use pixelcalc::domain::keypad::{Key, COLS, SLOT_COUNT};
use pixelcalc::sim::session::{ExerciseSession, SessionSummary};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for every cell, so the terminal default
    /// never shows through between rows.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Sentinel that differs from every real cell: forces a full repaint.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        };
        Cell { ch, fg, bg }
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
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
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

    /// Write a string at (x, y). Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }
}

// ── Screens ──

pub struct DrillView<'a> {
    pub session: &'a ExerciseSession,
    pub answer: &'a str,
    pub elapsed: Duration,
    pub message: Option<&'a str>,
}

pub struct ResultsView<'a> {
    pub summary: &'a SessionSummary,
    pub notice: Option<&'a str>,
}

pub struct RevealView {
    pub lit_count: u32,
    pub capacity: u32,
    pub score_remaining: i32,
    pub grid_seed: u64,
    pub done: bool,
}

pub enum Screen<'a> {
    Loading(&'a str),
    Drill(DrillView<'a>),
    Results(ResultsView<'a>),
    Reveal(RevealView),
}

impl Screen<'_> {
    fn kind(&self) -> u8 {
        match self {
            Screen::Loading(_) => 0,
            Screen::Drill(_) => 1,
            Screen::Results(_) => 2,
            Screen::Reveal(_) => 3,
        }
    }
}

/// Fill ranks for the reveal grid, rebuilt only when capacity or seed change.
struct GridCache {
    capacity: u32,
    seed: u64,
    grid: CellGrid,
    ranks: Vec<usize>,
}

// ── Palette ──

const TITLE: Color = Color::Rgb { r: 255, g: 220, b: 50 };
const ACCENT: Color = Color::Rgb { r: 100, g: 200, b: 255 };
const GOOD: Color = Color::Rgb { r: 80, g: 255, b: 80 };
const BAD: Color = Color::Rgb { r: 255, g: 60, b: 60 };
const DIM: Color = Color::Rgb { r: 110, g: 110, b: 130 };
const KEY_BG: Color = Color::Rgb { r: 40, g: 40, b: 60 };
const ACTION_BG: Color = Color::Rgb { r: 60, g: 45, b: 80 };

const KEY_HINTS: [&str; SLOT_COUNT] = ["q", "w", "e", "a", "s", "d", "z", "x", "c", "bksp", "v", "enter"];

/// Key face: 7 columns × 3 rows, 1 column gap.
const KEY_W: usize = 7;
const KEY_H: usize = 3;
const PAD_COL: usize = 4;
const PAD_ROW: usize = 7;

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_screen: Option<u8>,
    grid_cache: Option<GridCache>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_screen: None,
            grid_cache: None,
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
        self.back.cells.fill(Cell::INVALID);
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(self.writer, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, screen: &Screen<'_>) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        if self.last_screen != Some(screen.kind()) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_screen = Some(screen.kind());
        }

        self.front.clear();
        match screen {
            Screen::Loading(msg) => self.compose_loading(msg),
            Screen::Drill(view) => self.compose_drill(view),
            Screen::Results(view) => self.compose_results(view),
            Screen::Reveal(view) => self.compose_reveal(view),
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

        // ResetColor here would fall back to the terminal default, not BASE_BG.
        queue!(self.writer, SetForegroundColor(Color::White), SetBackgroundColor(Cell::BASE_BG))?;

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
                queue!(self.writer, Print(cell.ch))?;
                last_x = x;
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Compose ──

    fn compose_loading(&mut self, msg: &str) {
        self.front.put_str(2, 1, "PIXEL CALC", TITLE, Color::Reset);
        self.front.put_str(2, 3, msg, Color::White, Color::Reset);
        self.front.put_str(2, 5, "Ctrl+C: quit", DIM, Color::Reset);
    }

    fn compose_drill(&mut self, v: &DrillView<'_>) {
        let s = v.session;
        let secs = v.elapsed.as_secs();
        let hud = format!(
            "PIXEL CALC   {}/{}   Score {:<3}  {:02}:{:02}",
            (s.index() + 1).min(s.total()), s.total(), s.score(), secs / 60, secs % 60,
        );
        self.front.put_str(2, 0, &hud, TITLE, Color::Reset);

        if let Some(effect) = s.destabilization().active {
            let label = match effect.mode {
                Mode::Hide => "labels hidden",
                Mode::Shuffle => "keys shuffled",
            };
            let status = format!("! {label} ({} left)", effect.remaining);
            self.front.put_str(2, 1, &status, BAD, Color::Reset);
        }

        if let Some(ex) = s.current_exercise() {
            self.front.put_str(PAD_COL, 3, &format!("{ex} ="), Color::White, Color::Reset);
        }
        let answer = format!("[ {:<9} ]", v.answer);
        self.front.put_str(PAD_COL, 5, &answer, ACCENT, Color::Reset);

        for (i, slot) in s.layout().slots().iter().enumerate() {
            let x = PAD_COL + (i % COLS) * (KEY_W + 1);
            let y = PAD_ROW + (i / COLS) * (KEY_H + 1);
            let bg = match slot.key {
                Key::Digit(_) => KEY_BG,
                Key::Erase | Key::Submit => ACTION_BG,
            };
            for dy in 0..KEY_H {
                for dx in 0..KEY_W {
                    self.front.set(x + dx, y + dy, Cell::new(' ', Color::White, bg));
                }
            }
            if let Some(label) = slot.visual_label() {
                let lx = x + (KEY_W.saturating_sub(label.chars().count())) / 2;
                self.front.put_str(lx, y + 1, &label, Color::White, bg);
            }
            self.front.put_str(x + 1, y + KEY_H - 1, KEY_HINTS[i], DIM, bg);
        }

        let footer = PAD_ROW + (SLOT_COUNT / COLS) * (KEY_H + 1);
        if let Some(msg) = v.message {
            self.front.put_str(PAD_COL, footer, msg, GOOD, Color::Reset);
        }
        self.front.put_str(PAD_COL, footer + 1, "Esc: quit", DIM, Color::Reset);
    }

    fn compose_results(&mut self, v: &ResultsView<'_>) {
        let sum = v.summary;
        self.front.put_str(2, 1, "SESSION COMPLETE", TITLE, Color::Reset);
        let score_color = if sum.score > 0 { GOOD } else { BAD };
        let line = format!("Score {} / {}", sum.score, sum.total);
        self.front.put_str(2, 3, &line, score_color, Color::Reset);

        let mut row = 5;
        if sum.missed.is_empty() {
            self.front.put_str(2, row, "No misses.", GOOD, Color::Reset);
            row += 1;
        } else {
            self.front.put_str(2, row, "Missed:", Color::White, Color::Reset);
            row += 1;
            for m in &sum.missed {
                if row + 4 >= self.front.height { break; }
                let given = m.given.map_or_else(|| "no answer".to_string(), |g| g.to_string());
                let text = format!(
                    "  {} {} {} = {}   (you: {})",
                    m.operator_left, m.operation.symbol(), m.operator_right, m.expected, given,
                );
                self.front.put_str(2, row, &text, BAD, Color::Reset);
                row += 1;
            }
        }
        if let Some(notice) = v.notice {
            self.front.put_str(2, row + 1, notice, DIM, Color::Reset);
        }
        self.front.put_str(2, row + 2, "Enter: reveal   Esc: quit", ACCENT, Color::Reset);
    }

    fn compose_reveal(&mut self, v: &RevealView) {
        let badge = format!("{:+}", v.score_remaining);
        self.front.put_str(2, 0, "PIXEL GRID", TITLE, Color::Reset);
        let badge_color = if v.score_remaining < 0 { BAD } else { GOOD };
        self.front.put_str(14, 0, &badge, badge_color, Color::Reset);
        let count = format!("{} / {} lit", v.lit_count, v.capacity);
        self.front.put_str(22, 0, &count, DIM, Color::Reset);

        let area_w = self.front.width.saturating_sub(4);
        let area_h = self.front.height.saturating_sub(4);
        if area_w > 0 && area_h > 0 {
            self.compose_grid(v, 2, 2, area_w, area_h);
        }

        let hint = if v.done { "Enter / Esc: exit" } else { "Esc: skip" };
        self.front.put_str(2, self.front.height.saturating_sub(1), hint, DIM, Color::Reset);
    }

    /// Downsample the cell grid into `w × h` terminal cells, shading each
    /// by the fraction of its cells that are lit.
    fn compose_grid(&mut self, v: &RevealView, x0: usize, y0: usize, w: usize, h: usize) {
        const SHADES: [char; 5] = [' ', '░', '▒', '▓', '█'];

        let stale = self.grid_cache.as_ref().map_or(true, |c| c.capacity != v.capacity || c.seed != v.grid_seed);
        if stale {
            let grid = CellGrid::for_capacity(v.capacity);
            let ranks = grid.fill_ranks(v.grid_seed);
            self.grid_cache = Some(GridCache { capacity: v.capacity, seed: v.grid_seed, grid, ranks });
        }
        let Some(cache) = self.grid_cache.as_ref() else { return };

        let cols = cache.grid.cols as usize;
        let rows = cache.grid.rows as usize;
        let w = w.min(cols);
        let h = h.min(rows);
        let lit = v.lit_count as usize;

        let mut shaded = Vec::with_capacity(w * h);
        for ty in 0..h {
            let (r0, r1) = (ty * rows / h, (ty + 1) * rows / h);
            for tx in 0..w {
                let (c0, c1) = (tx * cols / w, (tx + 1) * cols / w);
                let mut on = 0usize;
                let mut total = 0usize;
                for r in r0..r1 {
                    for c in c0..c1 {
                        total += 1;
                        if cache.ranks[r * cols + c] < lit {
                            on += 1;
                        }
                    }
                }
                let level = if total == 0 || on == 0 {
                    0
                } else {
                    1 + (on * (SHADES.len() - 2)) / total
                };
                shaded.push(SHADES[level.min(SHADES.len() - 1)]);
            }
        }

        for (i, ch) in shaded.into_iter().enumerate() {
            self.front.set(x0 + i % w, y0 + i / w, Cell::new(ch, ACCENT, Color::Reset));
        }
    }
}
