// src/amr/patch.rs

use crate::amr::rect::Rect2i;

/// Dense cell data for one patch: the valid (interior) box plus a ghost margin.
///
/// Values are stored component-major over the ghost-grown box, row by row
/// (i fastest), so a single component is one contiguous slice. Ghost cells
/// hold stencil values owned by a sibling patch, the coarser level or the
/// physical boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchData {
    /// Valid region in level cell indices.
    pub valid: Rect2i,

    /// Number of ghost cells around the valid region.
    pub ghost: usize,

    /// Number of components per cell.
    pub ncomp: usize,

    /// Ghost-grown box the storage covers.
    pub grown: Rect2i,

    pub data: Vec<f64>,
}

impl PatchData {
    /// Zero-initialised patch data over `valid` grown by `ghost`.
    pub fn new(valid: Rect2i, ghost: usize, ncomp: usize) -> Self {
        assert!(ncomp >= 1, "ncomp must be >= 1");
        let grown = valid.grow(ghost);
        Self {
            valid,
            ghost,
            ncomp,
            grown,
            data: vec![0.0; grown.n_cells() * ncomp],
        }
    }

    /// Flat index of component `c` at level cell (i,j); (i,j) must lie in the grown box.
    #[inline]
    pub fn idx(&self, i: i64, j: i64, c: usize) -> usize {
        debug_assert!(
            self.grown.contains(i, j),
            "cell ({i},{j}) outside patch storage {:?}",
            self.grown
        );
        debug_assert!(c < self.ncomp);
        let li = (i - self.grown.i0) as usize;
        let lj = (j - self.grown.j0) as usize;
        c * self.grown.n_cells() + lj * self.grown.nx + li
    }

    #[inline]
    pub fn get(&self, i: i64, j: i64, c: usize) -> f64 {
        self.data[self.idx(i, j, c)]
    }

    #[inline]
    pub fn set(&mut self, i: i64, j: i64, c: usize, v: f64) {
        let k = self.idx(i, j, c);
        self.data[k] = v;
    }

    #[inline]
    pub fn add(&mut self, i: i64, j: i64, c: usize, v: f64) {
        let k = self.idx(i, j, c);
        self.data[k] += v;
    }

    /// Row stride of the storage (cells per row of the grown box).
    #[inline]
    pub fn stride(&self) -> usize {
        self.grown.nx
    }

    /// Contiguous storage of component `c` (grown box, row-major).
    #[inline]
    pub fn component(&self, c: usize) -> &[f64] {
        let n = self.grown.n_cells();
        &self.data[c * n..(c + 1) * n]
    }

    #[inline]
    pub fn component_mut(&mut self, c: usize) -> &mut [f64] {
        let n = self.grown.n_cells();
        &mut self.data[c * n..(c + 1) * n]
    }

    /// Set every value in `region` (clipped to storage) for all components.
    pub fn fill_region(&mut self, region: Rect2i, v: f64) {
        let Some(r) = region.intersect(self.grown) else {
            return;
        };
        for c in 0..self.ncomp {
            for (i, j) in r.cells() {
                self.set(i, j, c, v);
            }
        }
    }

    /// Copy values in `region` from `src` (both must store `region`).
    pub fn copy_region_from(&mut self, src: &PatchData, region: Rect2i) {
        debug_assert_eq!(self.ncomp, src.ncomp);
        for c in 0..self.ncomp {
            for (i, j) in region.cells() {
                let v = src.get(i, j, c);
                self.set(i, j, c, v);
            }
        }
    }

    /// Values of `region` packed component-major (used as an exchange buffer).
    pub fn pack(&self, region: Rect2i) -> Vec<f64> {
        let mut out = Vec::with_capacity(region.n_cells() * self.ncomp);
        for c in 0..self.ncomp {
            for (i, j) in region.cells() {
                out.push(self.get(i, j, c));
            }
        }
        out
    }

    /// Inverse of [`PatchData::pack`].
    pub fn unpack(&mut self, region: Rect2i, buf: &[f64]) {
        debug_assert_eq!(buf.len(), region.n_cells() * self.ncomp);
        let mut k = 0;
        for c in 0..self.ncomp {
            for (i, j) in region.cells() {
                self.set(i, j, c, buf[k]);
                k += 1;
            }
        }
    }

    /// Max |value| over the valid region.
    pub fn valid_max_abs(&self) -> f64 {
        let mut m: f64 = 0.0;
        for c in 0..self.ncomp {
            for (i, j) in self.valid.cells() {
                m = m.max(self.get(i, j, c).abs());
            }
        }
        m
    }
}
