// SPDX-License-Identifier: MIT
//
// Frame: what `render` draws into.
//
// A mutable view of the back grid, lent to the application for exactly one
// render call. The grid starts blank every frame, so `render` describes the
// whole screen and the diff works out what actually changed. Alongside the
// cells, the frame collects the interactive regions for mouse hit-testing
// and where the application wants the terminal cursor.

use weft_term::cell::{Cell, Style};
use weft_term::grid::{Grid, Rect};
use weft_term::terminal::Size;

use crate::hit::{HitMap, RegionId};

/// Render target for one frame.
pub struct Frame<'a> {
    grid: &'a mut Grid,
    hits: &'a mut HitMap,
    cursor: Option<(u16, u16)>,
    index: u64,
}

impl<'a> Frame<'a> {
    pub(crate) const fn new(grid: &'a mut Grid, hits: &'a mut HitMap, index: u64) -> Self {
        Self {
            grid,
            hits,
            cursor: None,
            index,
        }
    }

    /// Screen size in cells.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        Size::new(self.grid.width(), self.grid.height())
    }

    #[inline]
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.grid.width()
    }

    #[inline]
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.grid.height()
    }

    /// The whole screen as a rectangle.
    #[inline]
    #[must_use]
    pub const fn area(&self) -> Rect {
        self.grid.area()
    }

    /// Frames rendered before this one.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> u64 {
        self.index
    }

    // ── Drawing ───────────────────────────────────────────────────────

    /// Write one character. Out-of-bounds writes are ignored; returns
    /// whether anything was written.
    pub fn set_cell(&mut self, x: u16, y: u16, ch: char, style: Style) -> bool {
        self.grid.set_cell(x, y, ch, style)
    }

    /// Write a ready-made cell.
    pub fn put(&mut self, x: u16, y: u16, cell: Cell) -> bool {
        self.grid.put(x, y, cell)
    }

    /// Write styled text from `(x, y)`, clipped at the right edge. Returns
    /// the columns written.
    pub fn print(&mut self, x: u16, y: u16, text: &str, style: Style) -> u16 {
        self.grid.print(x, y, text, style)
    }

    /// Alias of [`print`](Self::print) named after the diff instruction it
    /// usually turns into.
    pub fn write_run(&mut self, x: u16, y: u16, text: &str, style: Style) -> u16 {
        self.grid.write_run(x, y, text, style)
    }

    /// Overwrite every cell.
    pub fn fill(&mut self, ch: char, style: Style) {
        self.grid.fill(ch, style);
    }

    /// Overwrite the cells of `rect` (clipped to the screen).
    pub fn fill_rect(&mut self, rect: Rect, ch: char, style: Style) {
        self.grid.fill_rect(rect, ch, style);
    }

    /// Direct access to the grid, for drawing code that works on grids.
    pub const fn grid_mut(&mut self) -> &mut Grid {
        self.grid
    }

    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &*self.grid
    }

    // ── Interaction ───────────────────────────────────────────────────

    /// Make `rect` (clipped to the screen) report mouse events as `id`.
    /// Later regions are on top of earlier ones.
    pub fn register(&mut self, id: RegionId, rect: Rect) {
        if let Some(clipped) = rect.intersect(self.grid.area()) {
            self.hits.register(id, clipped);
        }
    }

    /// Show the terminal cursor at `(x, y)` after this frame. Ignored when
    /// out of bounds.
    pub const fn set_cursor(&mut self, x: u16, y: u16) {
        if x < self.grid.width() && y < self.grid.height() {
            self.cursor = Some((x, y));
        }
    }

    /// Hide the terminal cursor after this frame (the default).
    pub const fn hide_cursor(&mut self) {
        self.cursor = None;
    }

    /// Where the cursor goes after this frame.
    #[must_use]
    pub const fn cursor(&self) -> Option<(u16, u16)> {
        self.cursor
    }
}
