// SPDX-License-Identifier: MIT
//
// Grid — the 2D cell array every frame is drawn into.
//
// The application draws into a Grid through `set_cell`, `print` and
// `fill_rect`. The diff engine compares the freshly drawn grid against the
// one currently on screen and the encoder turns the difference into bytes.
//
// Design:
//
//   - Flat `Vec<Cell>` with row-major indexing. A row's cells are
//     contiguous, so the diff engine's left-to-right scan is a linear walk
//     and a whole row compares with one slice equality.
//
//   - Writes never fail. Anything outside the grid is clipped silently.
//
//   - Wide characters occupy two columns: the owner cell followed by a
//     continuation cell (ch = 0). Every write that lands on half of a wide
//     character breaks the whole character so no orphan halves survive.
//
//   - `resize` works in place. The overlapping top-left rectangle is kept,
//     everything else becomes blank, and the allocation is reused whenever
//     it is large enough.
//
//   - A generation counter increments on every clear and resize. The
//     runtime uses it to tell "same grid, new frame" apart from "stale
//     content from before a resize".
//
// Memory:
//
//   200×50 terminal = 10,000 cells × 16 bytes = 160 KB per grid.
//   Two grids for double-buffering: ~320 KB.

use unicode_width::UnicodeWidthChar;

use crate::cell::{Cell, Style};

// ─── Rect ──────────────────────────────────────────────────────────────────────

/// An axis-aligned rectangle in cell coordinates.
///
/// # Examples
///
/// ```
/// use weft_term::grid::Rect;
///
/// let r = Rect::new(10, 5, 80, 24);
/// assert!(r.contains(10, 5));    // top-left corner: inside
/// assert!(r.contains(89, 28));   // bottom-right corner: inside
/// assert!(!r.contains(9, 5));    // left of bounds: outside
/// assert!(!r.contains(90, 5));   // right of bounds: outside
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    #[inline]
    #[must_use]
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self { x, y, width, height }
    }

    /// Right edge (exclusive), widened so it cannot overflow.
    #[inline]
    #[must_use]
    pub const fn right(self) -> u32 {
        self.x as u32 + self.width as u32
    }

    /// Bottom edge (exclusive), widened so it cannot overflow.
    #[inline]
    #[must_use]
    pub const fn bottom(self) -> u32 {
        self.y as u32 + self.height as u32
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of cells covered.
    #[inline]
    #[must_use]
    pub const fn area(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether a point is inside this rectangle.
    #[inline]
    #[must_use]
    pub const fn contains(self, px: u16, py: u16) -> bool {
        px >= self.x
            && (px as u32) < self.right()
            && py >= self.y
            && (py as u32) < self.bottom()
    }

    /// Intersection of two rectangles, or `None` if they don't overlap.
    #[must_use]
    pub fn intersect(self, other: Self) -> Option<Self> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        if x2 > u32::from(x1) && y2 > u32::from(y1) {
            // Both extents are bounded by an input u16 extent.
            #[allow(clippy::cast_possible_truncation)]
            Some(Self {
                x: x1,
                y: y1,
                width: (x2 - u32::from(x1)) as u16,
                height: (y2 - u32::from(y1)) as u16,
            })
        } else {
            None
        }
    }
}

// ─── Grid ──────────────────────────────────────────────────────────────────────

/// A width × height array of cells.
///
/// # Examples
///
/// ```
/// use weft_term::cell::Style;
/// use weft_term::grid::Grid;
///
/// let mut grid = Grid::new(20, 2);
/// let cols = grid.print(0, 0, "hi 世界", Style::new().bold());
/// assert_eq!(cols, 7);
/// assert_eq!(grid.row_text(0).trim_end(), "hi 世界");
///
/// // Out-of-range writes are clipped, never panic.
/// assert!(!grid.set_cell(99, 99, 'x', Style::new()));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Grid {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
    generation: u64,
}

impl Grid {
    /// A blank grid.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        let size = usize::from(width) * usize::from(height);
        Self {
            width,
            height,
            cells: vec![Cell::BLANK; size],
            generation: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Incremented by every [`clear`](Self::clear), [`fill`](Self::fill)
    /// and [`resize`](Self::resize).
    #[inline]
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// The whole grid as a rectangle at the origin.
    #[inline]
    #[must_use]
    pub const fn area(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    #[inline]
    #[must_use]
    pub const fn in_bounds(&self, x: u16, y: u16) -> bool {
        x < self.width && y < self.height
    }

    #[inline]
    const fn index(&self, x: u16, y: u16) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    #[must_use]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if self.in_bounds(x, y) {
            Some(&self.cells[self.index(x, y)])
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self, x: u16, y: u16) -> Option<&mut Cell> {
        if self.in_bounds(x, y) {
            let idx = self.index(x, y);
            Some(&mut self.cells[idx])
        } else {
            None
        }
    }

    /// The raw cell slice, row-major.
    #[inline]
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// One row as a slice. `None` if `y` is out of bounds.
    #[inline]
    #[must_use]
    pub fn row(&self, y: u16) -> Option<&[Cell]> {
        if y < self.height {
            let start = self.index(0, y);
            Some(&self.cells[start..start + usize::from(self.width)])
        } else {
            None
        }
    }

    #[inline]
    pub fn row_mut(&mut self, y: u16) -> Option<&mut [Cell]> {
        if y < self.height {
            let start = self.index(0, y);
            let w = usize::from(self.width);
            Some(&mut self.cells[start..start + w])
        } else {
            None
        }
    }

    /// The visible text of one row. Continuation cells contribute nothing,
    /// so a wide character appears once. Empty if `y` is out of bounds.
    #[must_use]
    pub fn row_text(&self, y: u16) -> String {
        self.row(y)
            .map(|row| row.iter().filter_map(|c| c.character()).collect())
            .unwrap_or_default()
    }

    // ─── Clear, Fill & Resize ────────────────────────────────────────────

    /// Reset every cell to blank and start a new generation.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
        self.generation = self.generation.wrapping_add(1);
    }

    /// Overwrite every cell with `ch` in `style`.
    ///
    /// A wide `ch` is laid out in pairs; an odd trailing column gets a
    /// space. A zero-width `ch` fills with spaces.
    pub fn fill(&mut self, ch: char, style: Style) {
        let w = char_width(ch);
        if w == 1 {
            self.cells.fill(Cell::styled(ch, style));
        } else {
            self.cells.fill(Cell::styled(' ', style));
            if w == 2 {
                for y in 0..self.height {
                    let mut x = 0;
                    while x + 1 < self.width {
                        self.set_cell(x, y, ch, style);
                        x += 2;
                    }
                }
            }
        }
        self.generation = self.generation.wrapping_add(1);
    }

    /// Change dimensions, keeping the overlapping top-left rectangle.
    ///
    /// Cells outside the kept rectangle become blank. Content cut off by a
    /// shrink is gone: growing again does not bring it back. A wide
    /// character whose continuation falls off the new right edge is
    /// replaced with a space.
    pub fn resize(&mut self, width: u16, height: u16) {
        if width == self.width && height == self.height {
            return;
        }

        let (ow, oh) = (usize::from(self.width), usize::from(self.height));
        let (nw, nh) = (usize::from(width), usize::from(height));
        let keep_h = oh.min(nh);

        if nw <= ow {
            // Narrower (or same width): compact rows toward the front.
            for y in 1..keep_h {
                self.cells.copy_within(y * ow..y * ow + nw, y * nw);
            }
            self.cells.truncate(nw * keep_h);
            self.cells.resize(nw * nh, Cell::BLANK);
        } else {
            // Wider: make room, then move rows back-to-front so no source
            // row is overwritten before it has moved.
            self.cells.truncate(ow * keep_h);
            self.cells.resize(nw * nh, Cell::BLANK);
            for y in (0..keep_h).rev() {
                self.cells.copy_within(y * ow..y * ow + ow, y * nw);
                self.cells[y * nw + ow..(y + 1) * nw].fill(Cell::BLANK);
            }
        }

        self.width = width;
        self.height = height;

        if nw < ow && nw > 0 {
            for y in 0..keep_h {
                let last = &mut self.cells[y * nw + nw - 1];
                if last.character().is_some_and(|c| char_width(c) == 2) {
                    last.ch = u32::from(b' ');
                }
            }
        }

        self.generation = self.generation.wrapping_add(1);
    }

    // ─── Writing ─────────────────────────────────────────────────────────

    /// Write one character. Returns `false` if nothing was written.
    ///
    /// Out-of-bounds positions and zero-width characters are ignored. A
    /// wide character also claims `(x + 1, y)` as its continuation; if that
    /// column does not exist a space is written instead, since half a
    /// glyph is garbage on every terminal.
    pub fn set_cell(&mut self, x: u16, y: u16, ch: char, style: Style) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let w = char_width(ch);
        if w == 0 {
            return false;
        }

        self.break_wide_char_at(x, y);
        let idx = self.index(x, y);

        if w == 2 {
            if x + 1 >= self.width {
                self.cells[idx] = Cell::styled(' ', style);
                return true;
            }
            self.break_wide_char_at(x + 1, y);
            self.cells[idx] = Cell::styled(ch, style);
            self.cells[idx + 1] = Cell::continuation(style);
        } else {
            self.cells[idx] = Cell::styled(ch, style);
        }
        true
    }

    /// Store a cell as-is: no width handling, no cleanup. Returns `false`
    /// out of bounds.
    #[inline]
    pub fn put(&mut self, x: u16, y: u16, cell: Cell) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let idx = self.index(x, y);
        self.cells[idx] = cell;
        true
    }

    /// Write a styled run of text starting at `(x, y)`, clipped at the
    /// right edge. Returns the number of columns consumed.
    ///
    /// Zero-width characters (combining marks, controls) are skipped.
    pub fn print(&mut self, x: u16, y: u16, text: &str, style: Style) -> u16 {
        if y >= self.height {
            return 0;
        }

        let mut col = x;
        for ch in text.chars() {
            if col >= self.width {
                break;
            }
            let w = char_width(ch);
            if w == 0 {
                continue;
            }
            self.set_cell(col, y, ch, style);
            if w == 2 && col + 1 >= self.width {
                col += 1;
                break;
            }
            // w is 1 or 2.
            #[allow(clippy::cast_possible_truncation)]
            let w = w as u16;
            col = col.saturating_add(w);
        }

        col.saturating_sub(x)
    }

    /// Alias of [`print`](Self::print) matching the runtime's drawing
    /// vocabulary.
    #[inline]
    pub fn write_run(&mut self, x: u16, y: u16, text: &str, style: Style) -> u16 {
        self.print(x, y, text, style)
    }

    /// Fill a rectangle with `ch`, clipped to the grid.
    pub fn fill_rect(&mut self, rect: Rect, ch: char, style: Style) {
        let Some(r) = rect.intersect(self.area()) else {
            return;
        };
        let w = char_width(ch).max(1);
        #[allow(clippy::cast_possible_truncation)]
        let step = w as u16;
        for y in r.y..r.y + r.height {
            let mut x = r.x;
            while u32::from(x) < r.right() {
                if w == 2 && u32::from(x) + 1 >= r.right() {
                    self.set_cell(x, y, ' ', style);
                } else {
                    self.set_cell(x, y, ch, style);
                }
                x = x.saturating_add(step);
            }
        }
    }

    // ─── Wide Character Cleanup ──────────────────────────────────────────

    /// Break any wide character touching `(x, y)`.
    ///
    /// - If `(x, y)` is a continuation, the owner at `x - 1` becomes a space.
    /// - If `(x + 1, y)` is a continuation, it was owned by this cell and
    ///   becomes blank.
    fn break_wide_char_at(&mut self, x: u16, y: u16) {
        let idx = self.index(x, y);

        if self.cells[idx].is_continuation() && x > 0 {
            self.cells[idx - 1].ch = u32::from(b' ');
        }

        if x + 1 < self.width && self.cells[idx + 1].is_continuation() {
            let style = self.cells[idx + 1].style;
            self.cells[idx + 1] = Cell::styled(' ', style);
        }
    }
}

impl std::fmt::Debug for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Grid({}x{}, gen {})", self.width, self.height, self.generation)
    }
}

// ─── DoubleBuffer ──────────────────────────────────────────────────────────────

/// Front and back grids of identical dimensions.
///
/// The front grid is what the terminal currently shows; the back grid is
/// where the next frame is drawn. After a frame is written, `swap` makes
/// the back grid the new front. Both grids live for the whole session and
/// are resized in place.
#[derive(Debug, Clone)]
pub struct DoubleBuffer {
    front: Grid,
    back: Grid,
}

impl DoubleBuffer {
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            front: Grid::new(width, height),
            back: Grid::new(width, height),
        }
    }

    /// The committed frame (what is on screen).
    #[inline]
    #[must_use]
    pub const fn front(&self) -> &Grid {
        &self.front
    }

    /// The frame under construction.
    #[inline]
    #[must_use]
    pub const fn back(&self) -> &Grid {
        &self.back
    }

    #[inline]
    pub const fn back_mut(&mut self) -> &mut Grid {
        &mut self.back
    }

    /// Both grids at once: `(front, back)`.
    #[inline]
    pub const fn split(&mut self) -> (&Grid, &mut Grid) {
        (&self.front, &mut self.back)
    }

    /// Commit the back grid as the new front.
    #[inline]
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.front, &mut self.back);
    }

    /// Resize both grids in place.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.front.resize(width, height);
        self.back.resize(width, height);
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> (u16, u16) {
        (self.front.width, self.front.height)
    }
}

// ─── Text Width Utilities ──────────────────────────────────────────────────────

/// Display width of a character in terminal columns.
///
/// 0 for control and combining characters, 2 for wide characters (CJK,
/// most emoji), 1 otherwise. Follows Unicode Standard Annex #11 via the
/// `unicode-width` crate.
///
/// ```
/// use weft_term::grid::char_width;
///
/// assert_eq!(char_width('a'), 1);
/// assert_eq!(char_width('中'), 2);
/// assert_eq!(char_width('\n'), 0);
/// ```
#[inline]
#[must_use]
pub fn char_width(ch: char) -> usize {
    ch.width().unwrap_or(0)
}

/// Display width of a string in terminal columns.
///
/// ```
/// use weft_term::grid::string_width;
///
/// assert_eq!(string_width("hello"), 5);
/// assert_eq!(string_width("a中b"), 4);
/// ```
#[must_use]
pub fn string_width(s: &str) -> usize {
    s.chars().map(char_width).sum()
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
