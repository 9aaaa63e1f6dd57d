// src/amr/rect.rs

use serde::{Deserialize, Serialize};

/// Integer rectangle in (i,j) cell-index space, using half-open intervals:
/// [i0, i0+nx) × [j0, j0+ny)
///
/// Indices are signed so that ghost cells outside the problem domain
/// (negative indices) can be addressed with the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect2i {
    pub i0: i64,
    pub j0: i64,
    pub nx: usize,
    pub ny: usize,
}

impl Rect2i {
    #[inline]
    pub fn new(i0: i64, j0: i64, nx: usize, ny: usize) -> Self {
        Self { i0, j0, nx, ny }
    }

    /// Rectangle from inclusive-low / exclusive-high corners.
    #[inline]
    pub fn from_corners(lo: [i64; 2], hi: [i64; 2]) -> Self {
        let nx = (hi[0] - lo[0]).max(0) as usize;
        let ny = (hi[1] - lo[1]).max(0) as usize;
        Self::new(lo[0], lo[1], nx, ny)
    }

    #[inline]
    pub fn i1(self) -> i64 {
        self.i0 + self.nx as i64
    }

    #[inline]
    pub fn j1(self) -> i64 {
        self.j0 + self.ny as i64
    }

    #[inline]
    pub fn lo(self, dir: usize) -> i64 {
        if dir == 0 {
            self.i0
        } else {
            self.j0
        }
    }

    /// Exclusive upper bound along `dir`.
    #[inline]
    pub fn hi(self, dir: usize) -> i64 {
        if dir == 0 {
            self.i1()
        } else {
            self.j1()
        }
    }

    #[inline]
    pub fn len(self, dir: usize) -> usize {
        if dir == 0 {
            self.nx
        } else {
            self.ny
        }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.nx == 0 || self.ny == 0
    }

    #[inline]
    pub fn n_cells(self) -> usize {
        self.nx * self.ny
    }

    #[inline]
    pub fn contains(self, i: i64, j: i64) -> bool {
        i >= self.i0 && i < self.i1() && j >= self.j0 && j < self.j1()
    }

    /// True if `other` lies entirely inside `self`.
    #[inline]
    pub fn contains_rect(self, other: Rect2i) -> bool {
        other.is_empty()
            || (other.i0 >= self.i0
                && other.j0 >= self.j0
                && other.i1() <= self.i1()
                && other.j1() <= self.j1())
    }

    /// Intersection of two rectangles.
    pub fn intersect(self, other: Rect2i) -> Option<Rect2i> {
        let i0 = self.i0.max(other.i0);
        let j0 = self.j0.max(other.j0);
        let i1 = self.i1().min(other.i1());
        let j1 = self.j1().min(other.j1());
        if i1 <= i0 || j1 <= j0 {
            None
        } else {
            Some(Rect2i::from_corners([i0, j0], [i1, j1]))
        }
    }

    /// Grow by `pad` cells in every direction (unclamped).
    pub fn grow(self, pad: usize) -> Rect2i {
        let p = pad as i64;
        Rect2i::new(self.i0 - p, self.j0 - p, self.nx + 2 * pad, self.ny + 2 * pad)
    }

    /// Grow by `pad` cells along `dir` only.
    pub fn grow_dir(self, dir: usize, pad: usize) -> Rect2i {
        let p = pad as i64;
        if dir == 0 {
            Rect2i::new(self.i0 - p, self.j0, self.nx + 2 * pad, self.ny)
        } else {
            Rect2i::new(self.i0, self.j0 - p, self.nx, self.ny + 2 * pad)
        }
    }

    /// The `width`-cell strip just outside the low (`high == false`) or high
    /// face of this rectangle along `dir`, spanning the rectangle tangentially.
    pub fn adjacent_strip(self, dir: usize, high: bool, width: usize) -> Rect2i {
        let w = width as i64;
        match (dir, high) {
            (0, false) => Rect2i::new(self.i0 - w, self.j0, width, self.ny),
            (0, true) => Rect2i::new(self.i1(), self.j0, width, self.ny),
            (_, false) => Rect2i::new(self.i0, self.j0 - w, self.nx, width),
            (_, true) => Rect2i::new(self.i0, self.j1(), self.nx, width),
        }
    }

    /// True if both corners are multiples of `ratio`, i.e. coarsening loses nothing.
    pub fn coarsenable(self, ratio: usize) -> bool {
        let r = ratio as i64;
        ratio >= 1
            && self.i0.rem_euclid(r) == 0
            && self.j0.rem_euclid(r) == 0
            && self.i1().rem_euclid(r) == 0
            && self.j1().rem_euclid(r) == 0
    }

    /// Smallest coarse rectangle covering this one.
    pub fn coarsen(self, ratio: usize) -> Rect2i {
        let r = ratio as i64;
        let i0 = self.i0.div_euclid(r);
        let j0 = self.j0.div_euclid(r);
        let i1 = (self.i1() + r - 1).div_euclid(r);
        let j1 = (self.j1() + r - 1).div_euclid(r);
        Rect2i::from_corners([i0, j0], [i1, j1])
    }

    pub fn refine(self, ratio: usize) -> Rect2i {
        let r = ratio as i64;
        Rect2i::new(self.i0 * r, self.j0 * r, self.nx * ratio, self.ny * ratio)
    }

    /// Iterate cells row by row (i fastest).
    pub fn cells(self) -> impl Iterator<Item = (i64, i64)> {
        let (i0, i1) = (self.i0, self.i1());
        (self.j0..self.j1()).flat_map(move |j| (i0..i1).map(move |i| (i, j)))
    }
}
