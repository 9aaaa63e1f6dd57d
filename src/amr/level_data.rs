// src/amr/level_data.rs

use std::sync::Arc;

use rayon::prelude::*;

use crate::amr::layout::PatchLayout;
use crate::amr::patch::PatchData;
use crate::amr::rect::Rect2i;
use crate::config::ExchangeMode;
use crate::error::ensure_same_ncomp;

/// A field on one level: one `PatchData` per patch of a shared layout.
///
/// All patches are owned by this process; patch loops run in parallel with
/// rayon. Patch `k` of the field always corresponds to box `k` of the layout.
#[derive(Debug, Clone)]
pub struct LevelData {
    layout: Arc<PatchLayout>,
    ncomp: usize,
    ghost: usize,
    patches: Vec<PatchData>,
}

impl LevelData {
    pub fn new(layout: Arc<PatchLayout>, ncomp: usize, ghost: usize) -> Self {
        let patches = layout
            .boxes()
            .iter()
            .map(|&b| PatchData::new(b, ghost, ncomp))
            .collect();
        Self {
            layout,
            ncomp,
            ghost,
            patches,
        }
    }

    /// Zeroed field with the same layout, components and ghosts as `other`.
    pub fn new_like(other: &LevelData) -> Self {
        Self::new(other.layout.clone(), other.ncomp, other.ghost)
    }

    #[inline]
    pub fn layout(&self) -> &Arc<PatchLayout> {
        &self.layout
    }

    #[inline]
    pub fn ncomp(&self) -> usize {
        self.ncomp
    }

    #[inline]
    pub fn ghost(&self) -> usize {
        self.ghost
    }

    #[inline]
    pub fn patches(&self) -> &[PatchData] {
        &self.patches
    }

    #[inline]
    pub fn patches_mut(&mut self) -> &mut [PatchData] {
        &mut self.patches
    }

    #[inline]
    pub fn patch(&self, k: usize) -> &PatchData {
        &self.patches[k]
    }

    #[inline]
    pub fn patch_mut(&mut self, k: usize) -> &mut PatchData {
        &mut self.patches[k]
    }

    /// True if both fields live on the same layout object or identical boxes.
    pub fn same_layout(&self, other: &LevelData) -> bool {
        self.same_layout_as(&other.layout)
    }

    pub fn same_layout_as(&self, layout: &Arc<PatchLayout>) -> bool {
        Arc::ptr_eq(&self.layout, layout) || *self.layout == **layout
    }

    /// Apply `f` to every patch in parallel.
    pub fn for_each_patch_mut<F>(&mut self, f: F)
    where
        F: Fn(usize, &mut PatchData) + Sync + Send,
    {
        self.patches
            .par_iter_mut()
            .enumerate()
            .for_each(|(k, p)| f(k, p));
    }

    /// Value at a level cell from whichever patch's valid region holds it.
    pub fn value_at(&self, i: i64, j: i64, c: usize) -> Option<f64> {
        self.layout.find(i, j).map(|k| self.patches[k].get(i, j, c))
    }

    /// Fill every valid cell from `f(i, j, comp)`; ghosts are left alone.
    pub fn fill_valid_with<F>(&mut self, f: F)
    where
        F: Fn(i64, i64, usize) -> f64 + Sync + Send,
    {
        self.for_each_patch_mut(|_, p| {
            let valid = p.valid;
            for c in 0..p.ncomp {
                for (i, j) in valid.cells() {
                    p.set(i, j, c, f(i, j, c));
                }
            }
        });
    }

    /// Set every value (valid and ghost) to `v`.
    pub fn set_val(&mut self, v: f64) {
        self.patches
            .par_iter_mut()
            .for_each(|p| p.data.iter_mut().for_each(|x| *x = v));
    }

    /// Resolve same-level ghost overlap: every ghost cell lying in a sibling
    /// patch's valid region receives the sibling's value.
    pub fn exchange(&mut self, mode: ExchangeMode) {
        let g = self.ghost;
        let n = self.patches.len();
        if g == 0 || n < 2 {
            return;
        }

        // Gather first (read-only over all patches), then scatter per patch.
        let patches = &self.patches;
        let incoming: Vec<Vec<(Rect2i, Vec<f64>)>> = (0..n)
            .into_par_iter()
            .map(|k| {
                let targets = ghost_regions(patches[k].valid, g, mode);
                let mut msgs = Vec::new();
                for (m, src) in patches.iter().enumerate() {
                    if m == k {
                        continue;
                    }
                    for t in &targets {
                        if let Some(r) = t.intersect(src.valid) {
                            msgs.push((r, src.pack(r)));
                        }
                    }
                }
                msgs
            })
            .collect();

        self.patches
            .par_iter_mut()
            .zip(incoming.into_par_iter())
            .for_each(|(p, msgs)| {
                for (r, buf) in msgs {
                    p.unpack(r, &buf);
                }
            });
    }

    /// Copy valid data into `dst`'s valid cells wherever the two layouts overlap.
    /// `dst` may use a different layout; cells of `dst` not covered by `self`
    /// are left unchanged.
    pub fn copy_to(&self, dst: &mut LevelData) {
        ensure_same_ncomp("copyTo", self.ncomp, dst.ncomp);
        let src = &self.patches;
        dst.patches.par_iter_mut().for_each(|d| {
            for s in src {
                if let Some(r) = s.valid.intersect(d.valid) {
                    d.copy_region_from(s, r);
                }
            }
        });
    }

    /// `self += scale * x` over valid cells (same layout).
    pub fn incr(&mut self, x: &LevelData, scale: f64) {
        ensure_same_ncomp("incr", self.ncomp, x.ncomp);
        self.patches
            .par_iter_mut()
            .zip(x.patches.par_iter())
            .for_each(|(p, q)| {
                for c in 0..p.ncomp {
                    for (i, j) in p.valid.cells() {
                        p.add(i, j, c, scale * q.get(i, j, c));
                    }
                }
            });
    }

    /// `self = a * x + b * y` over valid cells (same layout).
    pub fn axby(&mut self, x: &LevelData, y: &LevelData, a: f64, b: f64) {
        ensure_same_ncomp("axby", self.ncomp, x.ncomp);
        ensure_same_ncomp("axby", self.ncomp, y.ncomp);
        self.patches
            .par_iter_mut()
            .zip(x.patches.par_iter().zip(y.patches.par_iter()))
            .for_each(|(p, (px, py))| {
                for c in 0..p.ncomp {
                    for (i, j) in p.valid.cells() {
                        p.set(i, j, c, a * px.get(i, j, c) + b * py.get(i, j, c));
                    }
                }
            });
    }

    /// In-place `self = a * self + b * y`.
    pub fn axby_in_place(&mut self, y: &LevelData, a: f64, b: f64) {
        ensure_same_ncomp("axby", self.ncomp, y.ncomp);
        self.patches
            .par_iter_mut()
            .zip(y.patches.par_iter())
            .for_each(|(p, q)| {
                for c in 0..p.ncomp {
                    for (i, j) in p.valid.cells() {
                        let v = a * p.get(i, j, c) + b * q.get(i, j, c);
                        p.set(i, j, c, v);
                    }
                }
            });
    }

    pub fn scale(&mut self, s: f64) {
        self.patches
            .par_iter_mut()
            .for_each(|p| p.data.iter_mut().for_each(|x| *x *= s));
    }

    /// Sum over valid cells and components of `self * other`.
    pub fn dot(&self, other: &LevelData) -> f64 {
        ensure_same_ncomp("dotProduct", self.ncomp, other.ncomp);
        self.patches
            .par_iter()
            .zip(other.patches.par_iter())
            .map(|(p, q)| {
                let mut s = 0.0;
                for c in 0..p.ncomp {
                    for (i, j) in p.valid.cells() {
                        s += p.get(i, j, c) * q.get(i, j, c);
                    }
                }
                s
            })
            .sum()
    }

    /// Max |value| over all valid cells and components.
    pub fn max_norm(&self) -> f64 {
        self.patches
            .par_iter()
            .map(|p| p.valid_max_abs())
            .reduce(|| 0.0f64, f64::max)
    }

    /// Zero every valid cell of `self` that lies inside one of `boxes`.
    pub fn zero_under(&mut self, boxes: &[Rect2i]) {
        self.patches.par_iter_mut().for_each(|p| {
            for b in boxes {
                if let Some(r) = p.valid.intersect(*b) {
                    p.fill_region(r, 0.0);
                }
            }
        });
    }
}

/// Ghost regions of `valid` a sibling may own under the given exchange mode.
fn ghost_regions(valid: Rect2i, g: usize, mode: ExchangeMode) -> Vec<Rect2i> {
    match mode {
        ExchangeMode::Full => vec![valid.grow(g)],
        ExchangeMode::FacesOnly => {
            let mut v = Vec::with_capacity(4);
            for d in 0..2 {
                for high in [false, true] {
                    v.push(valid.adjacent_strip(d, high, g));
                }
            }
            v
        }
    }
}
