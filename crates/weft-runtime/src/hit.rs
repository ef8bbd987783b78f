// SPDX-License-Identifier: MIT
//
// Mouse hit-testing.
//
// While rendering, the application registers the rectangles it wants to
// hear about, each tagged with a `RegionId`. When a mouse event arrives the
// runtime looks its position up once against the regions of the frame
// currently on screen and hands the answer to `update` along with the
// event. Nothing is called back; the application decides what a hit means.
//
// Later registrations sit on top of earlier ones, matching paint order:
// something drawn last is what the user sees under the pointer.

use weft_term::grid::Rect;

/// Application-chosen identifier for an interactive region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub u32);

/// The interactive regions of one frame, in paint order.
#[derive(Debug, Clone, Default)]
pub struct HitMap {
    regions: Vec<(RegionId, Rect)>,
}

impl HitMap {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: Vec::new(),
        }
    }

    /// Forget every region. Called before each render.
    pub fn clear(&mut self) {
        self.regions.clear();
    }

    /// Add a region on top of those already registered. Empty rectangles
    /// are ignored.
    pub fn register(&mut self, id: RegionId, rect: Rect) {
        if !rect.is_empty() {
            self.regions.push((id, rect));
        }
    }

    /// The topmost region containing `(x, y)`.
    #[must_use]
    pub fn hit_test(&self, x: u16, y: u16) -> Option<RegionId> {
        self.regions
            .iter()
            .rev()
            .find(|(_, rect)| rect.contains(x, y))
            .map(|&(id, _)| id)
    }

    /// Registered regions, bottom first.
    #[must_use]
    pub fn regions(&self) -> &[(RegionId, Rect)] {
        &self.regions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
