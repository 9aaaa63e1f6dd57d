// src/amr/layout.rs

use serde::{Deserialize, Serialize};

use crate::amr::rect::Rect2i;

/// The rectangular problem domain of one level, in that level's cell indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDomain {
    pub rect: Rect2i,
}

impl ProblemDomain {
    pub fn new(rect: Rect2i) -> Self {
        Self { rect }
    }

    /// Domain of `nx × ny` cells with its lower-left cell at (0,0).
    pub fn from_size(nx: usize, ny: usize) -> Self {
        Self::new(Rect2i::new(0, 0, nx, ny))
    }

    #[inline]
    pub fn contains(&self, i: i64, j: i64) -> bool {
        self.rect.contains(i, j)
    }

    pub fn refine(&self, ratio: usize) -> Self {
        Self::new(self.rect.refine(ratio))
    }

    pub fn coarsen(&self, ratio: usize) -> Self {
        Self::new(self.rect.coarsen(ratio))
    }

    /// True if every extent of the domain is `<= limit` cells.
    pub fn is_at_most(&self, limit: usize) -> bool {
        self.rect.nx <= limit && self.rect.ny <= limit
    }
}

/// A set of disjoint rectangular patches tiling (part of) one level.
///
/// Layouts are immutable once built and shared between every field defined on
/// them, so they are handed around as `Arc<PatchLayout>`. Patch order is
/// significant: coarsening preserves it, so patch `k` of a coarsened layout
/// sits underneath patch `k` of the uncoarsened layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchLayout {
    boxes: Vec<Rect2i>,
}

impl PatchLayout {
    /// Build a layout from disjoint, non-empty boxes.
    pub fn new(boxes: Vec<Rect2i>) -> Self {
        debug_assert!(boxes.iter().all(|b| !b.is_empty()), "empty patch box");
        debug_assert!(
            boxes
                .iter()
                .enumerate()
                .all(|(k, a)| boxes[k + 1..].iter().all(|b| a.intersect(*b).is_none())),
            "patch boxes must be disjoint"
        );
        Self { boxes }
    }

    /// Split `rect` into tiles of at most `max_size` cells per side.
    pub fn tiled(rect: Rect2i, max_size: usize) -> Self {
        assert!(max_size >= 1, "max_size must be >= 1");
        let mut boxes = Vec::new();
        let mut j = rect.j0;
        while j < rect.j1() {
            let ny = ((rect.j1() - j) as usize).min(max_size);
            let mut i = rect.i0;
            while i < rect.i1() {
                let nx = ((rect.i1() - i) as usize).min(max_size);
                boxes.push(Rect2i::new(i, j, nx, ny));
                i += nx as i64;
            }
            j += ny as i64;
        }
        Self::new(boxes)
    }

    #[inline]
    pub fn boxes(&self) -> &[Rect2i] {
        &self.boxes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    #[inline]
    pub fn get(&self, k: usize) -> Rect2i {
        self.boxes[k]
    }

    pub fn coarsenable(&self, ratio: usize) -> bool {
        self.boxes.iter().all(|b| b.coarsenable(ratio))
    }

    /// Coarsen every box; patch indices are preserved.
    pub fn coarsen(&self, ratio: usize) -> Self {
        Self {
            boxes: self.boxes.iter().map(|b| b.coarsen(ratio)).collect(),
        }
    }

    pub fn refine(&self, ratio: usize) -> Self {
        Self {
            boxes: self.boxes.iter().map(|b| b.refine(ratio)).collect(),
        }
    }

    /// Index of the patch whose valid region holds cell (i,j).
    pub fn find(&self, i: i64, j: i64) -> Option<usize> {
        self.boxes.iter().position(|b| b.contains(i, j))
    }

    #[inline]
    pub fn covers(&self, i: i64, j: i64) -> bool {
        self.find(i, j).is_some()
    }

    pub fn n_cells(&self) -> usize {
        self.boxes.iter().map(|b| b.n_cells()).sum()
    }
}
