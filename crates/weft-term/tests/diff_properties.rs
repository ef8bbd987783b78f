// SPDX-License-Identifier: MIT
//
// Properties of the diff engine over arbitrary grids.

use proptest::prelude::*;

use weft_term::cell::{Attr, Cell, Style};
use weft_term::color::Color;
use weft_term::diff::{DiffEngine, Instruction, diff};
use weft_term::grid::Grid;

const W: u16 = 16;
const H: u16 = 4;

/// Text mixing narrow and wide characters.
fn text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            4 => proptest::char::range('a', 'e'),
            1 => Just(' '),
            2 => prop_oneof![Just('世'), Just('界'), Just('한')],
        ],
        0..12,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

fn style() -> impl Strategy<Value = Style> {
    prop_oneof![
        Just(Style::new()),
        Just(Style::new().fg(Color::RED)),
        Just(Style::new().bg(Color::BLUE).attrs(Attr::BOLD)),
    ]
}

/// A grid built the way applications build them: a series of prints.
fn grid() -> impl Strategy<Value = Grid> {
    proptest::collection::vec((0..W, 0..H, text(), style()), 0..10).prop_map(|ops| {
        let mut g = Grid::new(W, H);
        for (x, y, t, s) in ops {
            g.print(x, y, &t, s);
        }
        g
    })
}

/// Replay instructions onto `screen` the way a terminal would.
fn apply(screen: &mut Grid, instructions: &[Instruction]) {
    for ins in instructions {
        if let Instruction::WriteStyledRun { x, y, text, style } = ins {
            screen.print(*x, *y, text, *style);
        }
    }
}

proptest! {
    #[test]
    fn diff_of_identical_grids_is_empty(g in grid()) {
        let copy = g.clone();
        prop_assert!(diff(&g, &copy).is_empty());
    }

    #[test]
    fn applying_the_diff_reproduces_the_new_grid(prev in grid(), next in grid()) {
        let mut screen = prev.clone();
        apply(&mut screen, &diff(&prev, &next));
        prop_assert_eq!(screen.cells(), next.cells());
    }

    #[test]
    fn applying_the_diff_reproduces_at_any_gap(
        prev in grid(),
        next in grid(),
        gap in 0u16..8,
    ) {
        let mut engine = DiffEngine::new(gap);
        let mut screen = prev.clone();
        apply(&mut screen, engine.diff(&prev, &next));
        prop_assert_eq!(screen.cells(), next.cells());
    }

    #[test]
    fn full_redraw_paints_from_blank(next in grid()) {
        let mut screen = Grid::new(W, H);
        let mut engine = DiffEngine::default();
        apply(&mut screen, engine.full(&next));
        prop_assert_eq!(screen.cells(), next.cells());
    }

    #[test]
    fn runs_never_start_on_a_continuation(prev in grid(), next in grid()) {
        for ins in diff(&prev, &next) {
            if let Instruction::WriteStyledRun { x, y, .. } = ins {
                let cell = next.get(x, y).copied().unwrap_or(Cell::BLANK);
                prop_assert!(!cell.is_continuation(), "run starts at ({x},{y}) on a continuation");
            }
        }
    }

    #[test]
    fn single_narrow_change_is_one_instruction(
        g in grid(),
        x in 0..W,
        y in 0..H,
        ch in proptest::char::range('v', 'z'),
    ) {
        // Only cells outside any wide character qualify.
        let before = g.get(x, y).copied().unwrap_or(Cell::BLANK);
        let after_cont = x + 1 < W && g.get(x + 1, y).is_some_and(|c| c.is_continuation());
        prop_assume!(!before.is_continuation() && !after_cont);

        let mut next = g.clone();
        next.set_cell(x, y, ch, Style::new().fg(Color::GREEN));
        let out = diff(&g, &next);
        prop_assert_eq!(out.len(), 1);
        match &out[0] {
            Instruction::WriteStyledRun { x: rx, y: ry, text, .. } => {
                prop_assert_eq!((*rx, *ry), (x, y));
                prop_assert_eq!(text.chars().count(), 1);
            }
            other => prop_assert!(false, "unexpected {other:?}"),
        }
    }
}

#[test]
fn wide_char_change_always_covers_its_owner() {
    let prev = Grid::new(8, 1);
    let mut next = prev.clone();
    next.set_cell(3, 0, '世', Style::new());

    let out = diff(&prev, &next);
    assert_eq!(
        out,
        [Instruction::WriteStyledRun {
            x: 3,
            y: 0,
            text: "世".into(),
            style: Style::new(),
        }]
    );
}

#[test]
fn restyling_only_the_continuation_rewrites_the_whole_glyph() {
    let mut prev = Grid::new(8, 1);
    prev.set_cell(2, 0, '世', Style::new());
    let mut next = prev.clone();
    next.put(3, 0, Cell::continuation(Style::new().fg(Color::RED)));

    for ins in diff(&prev, &next) {
        if let Instruction::WriteStyledRun { x, .. } = ins {
            assert!(x <= 2, "run at {x} would split the wide character");
        }
    }
}
