// src/flux_register.rs
//
// Coarse-fine flux mismatch register.

use std::collections::HashMap;
use std::sync::Arc;

use crate::amr::layout::{PatchLayout, ProblemDomain};
use crate::amr::level_data::LevelData;
use crate::stencil::{unit, FaceFlux, SPACE_DIM};

/// Which face of a coarse cell a register entry sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Lo,
    Hi,
}

impl Side {
    /// Sign with which this face's flux enters the cell's divergence.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Side::Lo => -1.0,
            Side::Hi => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Record {
    coarse_patch: usize,
    cell: (i64, i64),
    dir: usize,
    side: Side,
}

/// A fine face that contributes to one register record.
#[derive(Debug, Clone, Copy)]
struct FineFace {
    dir: usize,
    face: (i64, i64),
    record: usize,
}

/// Accumulates, for every coarse face on the coarse-fine interface, the
/// difference between the averaged fine flux and the coarse flux, and adds
/// its divergence back to the coarse operator.
///
/// One record per (coarse cell, direction, side); each record is owned by the
/// coarse patch holding the cell. Records are signed so that `reflux` is a
/// plain addition of `register / dx_coarse`.
#[derive(Debug, Clone)]
pub struct FluxRegister {
    ratio: usize,
    ncomp: usize,
    records: Vec<Record>,
    values: Vec<f64>,
    /// Record ids per coarse patch.
    by_coarse_patch: Vec<Vec<usize>>,
    /// Contributing faces per fine patch.
    by_fine_patch: Vec<Vec<FineFace>>,
    fine_weight: f64,
}

impl FluxRegister {
    pub fn define(
        fine: &Arc<PatchLayout>,
        coarse: &Arc<PatchLayout>,
        fine_domain: &ProblemDomain,
        ratio: usize,
        ncomp: usize,
    ) -> Self {
        assert!(ratio >= 2, "flux register ratio must be >= 2, got {ratio}");
        let r = ratio as i64;
        let coarse_domain = fine_domain.coarsen(ratio);
        let coarsened_fine = fine.coarsen(ratio);

        let mut records = Vec::new();
        let mut index: HashMap<((i64, i64), usize, Side), usize> = HashMap::new();
        let mut by_coarse_patch = vec![Vec::new(); coarse.len()];
        let mut by_fine_patch = vec![Vec::new(); fine.len()];

        for (fp, valid) in fine.boxes().iter().enumerate() {
            for dir in 0..SPACE_DIM {
                let (ei, ej) = unit(dir);
                for high in [false, true] {
                    // The fine face lies on the patch's high or low side; the
                    // coarse cell across it sees that face on its opposite side.
                    let side = if high { Side::Lo } else { Side::Hi };
                    let strip = valid.adjacent_strip(dir, high, 1);
                    for (oi, oj) in strip.cells() {
                        let cell = (oi.div_euclid(r), oj.div_euclid(r));
                        if !coarse_domain.contains(cell.0, cell.1)
                            || fine.covers(oi, oj)
                            || coarsened_fine.covers(cell.0, cell.1)
                        {
                            continue;
                        }
                        let Some(coarse_patch) = coarse.find(cell.0, cell.1) else {
                            continue;
                        };
                        let record = *index.entry((cell, dir, side)).or_insert_with(|| {
                            records.push(Record {
                                coarse_patch,
                                cell,
                                dir,
                                side,
                            });
                            by_coarse_patch[coarse_patch].push(records.len() - 1);
                            records.len() - 1
                        });
                        // Fine face index is the low face of the higher cell.
                        let face = if high { (oi, oj) } else { (oi + ei, oj + ej) };
                        by_fine_patch[fp].push(FineFace { dir, face, record });
                    }
                }
            }
        }

        log::debug!(
            "[flux_register] defined: {} records over {} coarse / {} fine patches, ratio {}",
            records.len(),
            coarse.len(),
            fine.len(),
            ratio
        );

        let values = vec![0.0; records.len() * ncomp];
        Self {
            ratio,
            ncomp,
            records,
            values,
            by_coarse_patch,
            by_fine_patch,
            fine_weight: 1.0 / (ratio.pow(SPACE_DIM as u32 - 1) as f64),
        }
    }

    pub fn ratio(&self) -> usize {
        self.ratio
    }

    pub fn n_records(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn reset(&mut self) {
        self.values.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Subtract the coarse flux on the interface faces of `coarse_patch`.
    pub fn increment_coarse(&mut self, coarse_patch: usize, flux: &FaceFlux) {
        let nc = self.ncomp;
        for &id in &self.by_coarse_patch[coarse_patch] {
            let rec = self.records[id];
            if rec.dir != flux.dir {
                continue;
            }
            let (ei, ej) = unit(rec.dir);
            let face = match rec.side {
                Side::Lo => rec.cell,
                Side::Hi => (rec.cell.0 + ei, rec.cell.1 + ej),
            };
            for c in 0..nc {
                self.values[id * nc + c] -= rec.side.sign() * flux.get(face.0, face.1, c);
            }
        }
    }

    /// Add the fine flux on the interface faces of `fine_patch`, averaged over
    /// the `ratio^(SPACE_DIM-1)` fine faces covering each coarse face.
    pub fn increment_fine(&mut self, fine_patch: usize, flux: &FaceFlux) {
        let nc = self.ncomp;
        let w = self.fine_weight;
        for f in &self.by_fine_patch[fine_patch] {
            if f.dir != flux.dir {
                continue;
            }
            let sign = self.records[f.record].side.sign();
            for c in 0..nc {
                self.values[f.record * nc + c] += sign * w * flux.get(f.face.0, f.face.1, c);
            }
        }
    }

    /// `target += scale * register` on the coarse cells of the interface.
    pub fn reflux(&self, target: &mut LevelData, scale: f64) {
        let nc = self.ncomp;
        let records = &self.records;
        let values = &self.values;
        let by_patch = &self.by_coarse_patch;
        target.for_each_patch_mut(|k, p| {
            for &id in &by_patch[k] {
                let (i, j) = records[id].cell;
                for c in 0..nc {
                    p.add(i, j, c, scale * values[id * nc + c]);
                }
            }
        });
    }

    /// Register content for a coarse cell face (mainly for diagnostics).
    pub fn value(&self, cell: (i64, i64), dir: usize, side: Side, c: usize) -> Option<f64> {
        self.records
            .iter()
            .position(|r| r.cell == cell && r.dir == dir && r.side == side)
            .map(|id| self.values[id * self.ncomp + c])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amr::rect::Rect2i;

    fn setup() -> (Arc<PatchLayout>, Arc<PatchLayout>, ProblemDomain) {
        let coarse_domain = ProblemDomain::from_size(8, 8);
        let coarse = Arc::new(PatchLayout::tiled(coarse_domain.rect, 4));
        let fine = Arc::new(PatchLayout::new(vec![Rect2i::new(4, 4, 4, 4), Rect2i::new(8, 4, 4, 4)]));
        (fine, coarse, coarse_domain.refine(2))
    }

    #[test]
    fn one_record_per_interface_coarse_face() {
        let (fine, coarse, fine_domain) = setup();
        let reg = FluxRegister::define(&fine, &coarse, &fine_domain, 2, 1);
        // Coarsened fine region is [2,6) x [2,4): perimeter of 2*4 + 2*2 faces.
        assert_eq!(reg.n_records(), 12);
        assert!(reg.value((1, 2), 0, Side::Hi, 0).is_some());
        assert!(reg.value((6, 3), 0, Side::Lo, 0).is_some());
        assert!(reg.value((3, 4), 1, Side::Lo, 0).is_some());
        assert!(reg.value((3, 3), 1, Side::Lo, 0).is_none());
    }

    #[test]
    fn matching_fluxes_cancel() {
        let (fine, coarse, fine_domain) = setup();
        let mut reg = FluxRegister::define(&fine, &coarse, &fine_domain, 2, 1);
        reg.reset();
        for (k, b) in coarse.boxes().iter().enumerate() {
            for dir in 0..2 {
                let mut f = FaceFlux::zeros(*b, dir, 1);
                f.data.iter_mut().for_each(|v| *v = 2.5);
                reg.increment_coarse(k, &f);
            }
        }
        for (k, b) in fine.boxes().iter().enumerate() {
            for dir in 0..2 {
                let mut f = FaceFlux::zeros(*b, dir, 1);
                f.data.iter_mut().for_each(|v| *v = 2.5);
                reg.increment_fine(k, &f);
            }
        }
        assert!(reg.values.iter().all(|v| v.abs() < 1e-14));
    }

    #[test]
    fn reflux_adds_signed_mismatch() {
        let (fine, coarse, fine_domain) = setup();
        let mut reg = FluxRegister::define(&fine, &coarse, &fine_domain, 2, 1);
        reg.reset();
        // Only fine fluxes, all equal to 1: the coarse cell left of the fine
        // region sees its high face gain +1, the one right of it its low face.
        for (k, b) in fine.boxes().iter().enumerate() {
            let mut f = FaceFlux::zeros(*b, 0, 1);
            f.data.iter_mut().for_each(|v| *v = 1.0);
            reg.increment_fine(k, &f);
        }
        let mut target = LevelData::new(coarse.clone(), 1, 1);
        reg.reflux(&mut target, 0.5);
        assert_eq!(target.value_at(1, 2, 0), Some(0.5));
        assert_eq!(target.value_at(6, 3, 0), Some(-0.5));
        assert_eq!(target.value_at(3, 1, 0), Some(0.0));
    }
}
