// SPDX-License-Identifier: MIT
//
// Diff engine — turns "what is on screen" plus "what should be on screen"
// into the shortest list of styled writes that gets from one to the other.
//
// The pipeline per frame:
//
//   1. The application draws into the back Grid.
//   2. `DiffEngine::diff` compares it against the front Grid and produces
//      `Instruction`s: positioned, uniformly styled runs of text.
//   3. The encoder turns instructions into escape sequences.
//
// Per row:
//
//   - Unchanged rows are skipped with one slice comparison.
//   - Changed cells are grouped into spans. Two spans separated by at most
//     `merge_gap` unchanged cells are merged: rewriting a few unchanged
//     characters is cheaper than a cursor move (`ESC [ r ; c H` is 6–8
//     bytes, about the cost of rewriting 4 cells).
//   - Spans are widened so they never cut a wide character in half: a span
//     starting on a continuation cell takes in its owner, and a span ending
//     on a wide owner takes in its continuation.
//   - Each span is split wherever the style changes, so every instruction
//     carries exactly one style.
//
// A full redraw (first frame, after a resize) is the same algorithm run
// against an all-blank row, since that is what the screen holds right after
// it is cleared.
//
// Guarantee: diffing a grid against an identical grid yields no
// instructions.

use crate::cell::{Cell, Style};
use crate::grid::{Grid, char_width};

/// Default merge gap, in cells.
///
/// Two changed spans in the same row separated by this many unchanged cells
/// or fewer are written as one run. At 4, the rewritten cells cost about as
/// much as the cursor move they replace.
pub const DEFAULT_MERGE_GAP: u16 = 4;

// ─── Instruction ─────────────────────────────────────────────────────────────

/// One step of a screen update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Move the terminal cursor without writing anything.
    MoveCursorTo { x: u16, y: u16 },
    /// Write `text` in `style` starting at `(x, y)`.
    ///
    /// `text` never contains control characters. Wide characters appear
    /// once and cover two columns.
    WriteStyledRun {
        x: u16,
        y: u16,
        text: String,
        style: Style,
    },
}

impl Instruction {
    /// The position this instruction starts at.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> (u16, u16) {
        match self {
            Self::MoveCursorTo { x, y } | Self::WriteStyledRun { x, y, .. } => (*x, *y),
        }
    }

    /// Columns covered: 0 for a cursor move, the display width of the text
    /// for a run.
    #[must_use]
    pub fn columns(&self) -> usize {
        match self {
            Self::MoveCursorTo { .. } => 0,
            Self::WriteStyledRun { text, .. } => crate::grid::string_width(text),
        }
    }
}

// ─── DiffStats ───────────────────────────────────────────────────────────────

/// Counters from one diff pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffStats {
    /// Rows containing at least one change.
    pub rows_changed: usize,
    /// Cells whose content or style differed.
    pub cells_changed: usize,
    /// Instructions produced.
    pub runs: usize,
}

// ─── DiffEngine ──────────────────────────────────────────────────────────────

/// Grid differ with a reusable instruction buffer.
///
/// # Usage
///
/// ```
/// use weft_term::cell::Style;
/// use weft_term::diff::{DiffEngine, Instruction};
/// use weft_term::grid::Grid;
///
/// let before = Grid::new(10, 2);
/// let mut after = before.clone();
/// after.set_cell(3, 1, 'x', Style::new());
///
/// let mut engine = DiffEngine::default();
/// let out = engine.diff(&before, &after);
/// assert_eq!(out, [Instruction::WriteStyledRun {
///     x: 3,
///     y: 1,
///     text: "x".into(),
///     style: Style::new(),
/// }]);
/// assert!(engine.diff(&after, &after).is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct DiffEngine {
    merge_gap: u16,
    instructions: Vec<Instruction>,
    spans: Vec<(u16, u16)>,
    stats: DiffStats,
}

impl DiffEngine {
    #[must_use]
    pub const fn new(merge_gap: u16) -> Self {
        Self {
            merge_gap,
            instructions: Vec::new(),
            spans: Vec::new(),
            stats: DiffStats {
                rows_changed: 0,
                cells_changed: 0,
                runs: 0,
            },
        }
    }

    #[inline]
    #[must_use]
    pub const fn merge_gap(&self) -> u16 {
        self.merge_gap
    }

    #[inline]
    pub const fn set_merge_gap(&mut self, gap: u16) {
        self.merge_gap = gap;
    }

    /// Counters from the most recent pass.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> DiffStats {
        self.stats
    }

    /// Instructions turning `prev` into `next`.
    ///
    /// Grids of different dimensions cannot be diffed cell by cell; that
    /// case falls back to [`full`](Self::full).
    pub fn diff(&mut self, prev: &Grid, next: &Grid) -> &[Instruction] {
        if prev.width() != next.width() || prev.height() != next.height() {
            return self.full(next);
        }

        self.reset();
        for y in 0..next.height() {
            let (Some(old), Some(new)) = (prev.row(y), next.row(y)) else {
                continue;
            };
            if old == new {
                continue;
            }
            self.diff_row(y, Some(old), new);
        }
        self.stats.runs = self.instructions.len();
        &self.instructions
    }

    /// Instructions drawing `next` onto a freshly cleared screen.
    ///
    /// Blank cells (space, default style) are already what a cleared screen
    /// shows and are only written when they fall inside a merged run.
    pub fn full(&mut self, next: &Grid) -> &[Instruction] {
        self.reset();
        for y in 0..next.height() {
            if let Some(new) = next.row(y) {
                self.diff_row(y, None, new);
            }
        }
        self.stats.runs = self.instructions.len();
        &self.instructions
    }

    /// Instructions from the last pass.
    #[inline]
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    fn reset(&mut self) {
        self.instructions.clear();
        self.stats = DiffStats::default();
    }

    /// Diff one row. `old = None` compares against a blank row.
    fn diff_row(&mut self, y: u16, old: Option<&[Cell]>, new: &[Cell]) {
        let old_at = |x: usize| old.map_or(Cell::BLANK, |row| row[x]);
        let gap = usize::from(self.merge_gap);
        let width = new.len();

        self.spans.clear();
        let mut current: Option<(usize, usize)> = None;
        let mut changed = 0;

        for (x, cell) in new.iter().enumerate() {
            if *cell == old_at(x) {
                continue;
            }
            changed += 1;
            current = match current {
                Some((start, end)) if x - end <= gap => Some((start, x + 1)),
                Some(span) => {
                    self.push_span(span, old, new);
                    Some((x, x + 1))
                }
                None => Some((x, x + 1)),
            };
        }
        if let Some(span) = current {
            self.push_span(span, old, new);
        }

        if changed == 0 {
            return;
        }
        self.stats.rows_changed += 1;
        self.stats.cells_changed += changed;

        debug_assert!(self.spans.iter().all(|&(_, e)| usize::from(e) <= width));

        let spans = std::mem::take(&mut self.spans);
        for &(start, end) in &spans {
            self.emit_runs(y, &new[usize::from(start)..usize::from(end)], start);
        }
        self.spans = spans;
    }

    /// Widen a span so it covers whole wide characters, then append it,
    /// merging with the previous span if they now touch or overlap.
    fn push_span(&mut self, (mut start, mut end): (usize, usize), old: Option<&[Cell]>, new: &[Cell]) {
        let is_cont = |row: Option<&[Cell]>, x: usize| row.is_some_and(|r| r[x].is_continuation());

        if start > 0 && (new[start].is_continuation() || is_cont(old, start)) {
            start -= 1;
        }
        if end < new.len() && (is_wide_owner(new[end - 1]) || is_cont(old, end)) {
            end += 1;
        }

        // Row widths are u16, so both bounds fit.
        #[allow(clippy::cast_possible_truncation)]
        let (start, end) = (start as u16, end as u16);
        match self.spans.last_mut() {
            Some(last) if start <= last.1.saturating_add(self.merge_gap) => last.1 = last.1.max(end),
            _ => self.spans.push((start, end)),
        }
    }

    /// Split a span into uniformly styled runs.
    fn emit_runs(&mut self, y: u16, cells: &[Cell], x0: u16) {
        let mut run: Option<(u16, Style, String)> = None;
        let mut after_wide = false;
        let mut col = x0;

        for cell in cells {
            let x = col;
            col += 1;

            if cell.is_continuation() && after_wide {
                after_wide = false;
                continue;
            }

            // Orphan continuations and zero-width codepoints would desync
            // the terminal's cursor from ours; draw them as spaces.
            let ch = cell
                .character()
                .filter(|&c| char_width(c) > 0)
                .unwrap_or(' ');
            after_wide = char_width(ch) == 2;

            match &mut run {
                Some((_, style, text)) if *style == cell.style => text.push(ch),
                _ => {
                    if let Some((rx, style, text)) = run.take() {
                        self.instructions.push(Instruction::WriteStyledRun {
                            x: rx,
                            y,
                            text,
                            style,
                        });
                    }
                    run = Some((x, cell.style, String::from(ch)));
                }
            }
        }

        if let Some((rx, style, text)) = run {
            self.instructions.push(Instruction::WriteStyledRun {
                x: rx,
                y,
                text,
                style,
            });
        }
    }
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MERGE_GAP)
    }
}

/// Whether `cell` holds a double-width character.
#[inline]
fn is_wide_owner(cell: Cell) -> bool {
    cell.character().is_some_and(|c| char_width(c) == 2)
}

/// Diff two grids with the default merge gap.
#[must_use]
pub fn diff(prev: &Grid, next: &Grid) -> Vec<Instruction> {
    DiffEngine::default().diff(prev, next).to_vec()
}

/// Instructions drawing `next` onto a cleared screen, default merge gap.
#[must_use]
pub fn full_redraw(next: &Grid) -> Vec<Instruction> {
    DiffEngine::default().full(next).to_vec()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
