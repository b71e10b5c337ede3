#![forbid(unsafe_code)]

use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};

use crate::menu::KEY_HINTS;
use crate::model::{ActivePane, Drive, FileEntry};
use crate::pane::Pane;

pub const DEFAULT_COLUMNS: u16 = 80;
pub const DEFAULT_LINES: u16 = 32;

/// Lines that are not panel rows: header, status, prompt and key bar.
const CHROME_LINES: u16 = 4;

/// Semantic drawing requests; the application never positions text itself.
pub trait Display {
    fn clear(&mut self) -> io::Result<()>;
    fn repaint_pane(&mut self, side: ActivePane, pane: &Pane) -> io::Result<()>;
    /// Redraws the row of catalog `index`, if it is on screen.
    fn draw_row(&mut self, side: ActivePane, pane: &Pane, index: usize) -> io::Result<()>;
    fn show_prompt(&mut self, drive: Drive, line: &str) -> io::Result<()>;
    fn show_status(&mut self, text: &str) -> io::Result<()>;
    fn show_keybar(&mut self) -> io::Result<()>;
    /// Full-screen text (viewer pages, help) with a footer line.
    fn show_page(&mut self, lines: &[String], footer: &str) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    /// Re-reads the screen size and returns the layout now in use.
    fn resize(&mut self) -> io::Result<Layout>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub columns: u16,
    pub lines: u16,
}

impl Layout {
    pub fn new(columns: u16, lines: u16) -> Self {
        Self { columns: columns.max(20), lines: lines.max(CHROME_LINES + 1) }
    }

    pub fn pane_width(&self) -> u16 {
        self.columns / 2
    }

    pub fn pane_x(&self, side: ActivePane) -> u16 {
        match side {
            ActivePane::Left => 0,
            ActivePane::Right => self.pane_width(),
        }
    }

    pub fn visible_rows(&self) -> usize {
        usize::from(self.lines - CHROME_LINES)
    }

    /// Rows available to a full-screen page, footer excluded.
    pub fn page_rows(&self) -> usize {
        usize::from(self.lines - 1)
    }

    pub fn status_line(&self) -> u16 {
        self.lines - 3
    }

    pub fn prompt_line(&self) -> u16 {
        self.lines - 2
    }

    pub fn keybar_line(&self) -> u16 {
        self.lines - 1
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(DEFAULT_COLUMNS, DEFAULT_LINES)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ThemeColors {
    pub panel_bg: Color,
    pub panel_fg: Color,
    pub system_fg: Color,
    pub header_active: Color,
    pub header_inactive: Color,
    pub selection_bg: Color,
    pub selection_fg: Color,
    pub marked_fg: Color,
    pub keybar_bg: Color,
    pub keybar_fg: Color,
    pub status_bg: Color,
    pub status_fg: Color,
}

impl ThemeColors {
    pub fn classic() -> Self {
        let rgb = |r, g, b| Color::Rgb { r, g, b };
        Self {
            panel_bg: rgb(0, 0, 170),
            panel_fg: rgb(170, 170, 170),
            system_fg: rgb(85, 85, 85),
            header_active: rgb(85, 255, 255),
            header_inactive: rgb(85, 85, 85),
            selection_bg: rgb(0, 170, 170),
            selection_fg: rgb(0, 0, 0),
            marked_fg: rgb(255, 255, 85),
            keybar_bg: rgb(0, 170, 170),
            keybar_fg: rgb(0, 0, 0),
            status_bg: rgb(0, 0, 170),
            status_fg: rgb(255, 255, 255),
        }
    }
}

/// Pads or cuts `text` to exactly `width` columns.
pub fn fit(text: &str, width: usize) -> String {
    let mut out: String = text.chars().take(width).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat_n(' ', width - len));
    out
}

/// `*NAME.EXT        1024 07-03-24 14:05`
pub fn row_text(entry: &FileEntry) -> String {
    let marker = if entry.selected { '*' } else { ' ' };
    let (date, clock) = entry.stamp_text();
    format!("{marker}{:<12} {:>8} {date:<8} {clock:<5}", entry.name, entry.size())
}

pub fn header_text(pane: &Pane) -> String {
    format!(" {}: {} files", pane.drive, pane.len())
}

/// `Sel: 2 Size: 3K`, or nothing when no file is marked.
pub fn selection_summary(pane: &Pane) -> String {
    match pane.selected_count() {
        0 => String::new(),
        marked => format!("Sel: {marked} Size: {}K", pane.selected_records().div_ceil(8)),
    }
}

/// Draws straight to a crossterm terminal.
pub struct TerminalDisplay<W: Write> {
    out: W,
    layout: Layout,
    theme: ThemeColors,
    fixed_size: bool,
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W, layout: Layout) -> Self {
        Self { out, layout, theme: ThemeColors::classic(), fixed_size: false }
    }

    /// Keeps the configured geometry instead of following the terminal.
    pub fn with_fixed_size(mut self, fixed: bool) -> Self {
        self.fixed_size = fixed;
        self
    }

    fn line(&mut self, x: u16, y: u16, text: &str, fg: Color, bg: Color) -> io::Result<()> {
        queue!(self.out, MoveTo(x, y), SetForegroundColor(fg), SetBackgroundColor(bg), Print(text), ResetColor)
    }

    fn row(&mut self, side: ActivePane, pane: &Pane, index: usize) -> io::Result<()> {
        let Some(row) = pane.row_of(index) else { return Ok(()) };
        let Some(entry) = pane.entries().get(index) else { return Ok(()) };
        let width = usize::from(self.layout.pane_width());
        let theme = self.theme;
        let (fg, bg) = if pane.active && index == pane.cursor() {
            (theme.selection_fg, theme.selection_bg)
        } else if entry.selected {
            (theme.marked_fg, theme.panel_bg)
        } else if entry.attributes.system {
            (theme.system_fg, theme.panel_bg)
        } else {
            (theme.panel_fg, theme.panel_bg)
        };
        let text = fit(&row_text(entry), width);
        self.line(self.layout.pane_x(side), row as u16 + 1, &text, fg, bg)
    }
}

impl<W: Write> Display for TerminalDisplay<W> {
    fn clear(&mut self) -> io::Result<()> {
        queue!(self.out, ResetColor, Clear(ClearType::All), MoveTo(0, 0))
    }

    fn repaint_pane(&mut self, side: ActivePane, pane: &Pane) -> io::Result<()> {
        let width = usize::from(self.layout.pane_width());
        let x = self.layout.pane_x(side);
        let theme = self.theme;
        let header_fg = if pane.active { theme.header_active } else { theme.header_inactive };
        self.line(x, 0, &fit(&header_text(pane), width), header_fg, theme.panel_bg)?;

        let blank = fit("", width);
        let rows = pane.visible_rows().min(self.layout.visible_rows());
        for row in 0..rows {
            let index = pane.scroll() + row;
            if index < pane.len() {
                self.row(side, pane, index)?;
            } else {
                self.line(x, row as u16 + 1, &blank, theme.panel_fg, theme.panel_bg)?;
            }
        }
        Ok(())
    }

    fn draw_row(&mut self, side: ActivePane, pane: &Pane, index: usize) -> io::Result<()> {
        self.row(side, pane, index)
    }

    fn show_prompt(&mut self, drive: Drive, line: &str) -> io::Result<()> {
        let width = usize::from(self.layout.columns);
        let prompt = format!("{drive}>{line}");
        let y = self.layout.prompt_line();
        queue!(self.out, MoveTo(0, y), ResetColor, Print(fit(&prompt, width)))?;
        let column = prompt.chars().count().min(width.saturating_sub(1)) as u16;
        queue!(self.out, MoveTo(column, y))
    }

    fn show_status(&mut self, text: &str) -> io::Result<()> {
        let width = usize::from(self.layout.columns);
        let theme = self.theme;
        self.line(0, self.layout.status_line(), &fit(text, width), theme.status_fg, theme.status_bg)
    }

    fn show_keybar(&mut self) -> io::Result<()> {
        let theme = self.theme;
        let mut text = String::new();
        for (key, label) in KEY_HINTS {
            text.push_str(&format!("F{key} {label}  "));
        }
        let width = usize::from(self.layout.columns);
        self.line(0, self.layout.keybar_line(), &fit(&text, width), theme.keybar_fg, theme.keybar_bg)
    }

    fn show_page(&mut self, lines: &[String], footer: &str) -> io::Result<()> {
        let width = usize::from(self.layout.columns);
        queue!(self.out, ResetColor, Clear(ClearType::All))?;
        for (y, text) in lines.iter().take(self.layout.page_rows()).enumerate() {
            queue!(self.out, MoveTo(0, y as u16), Print(fit(text, width)))?;
        }
        let theme = self.theme;
        self.line(0, self.layout.keybar_line(), &fit(footer, width), theme.status_fg, theme.status_bg)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn resize(&mut self) -> io::Result<Layout> {
        if !self.fixed_size {
            let (columns, lines) = crossterm::terminal::size()?;
            self.layout = Layout::new(columns, lines);
        }
        Ok(self.layout)
    }
}
