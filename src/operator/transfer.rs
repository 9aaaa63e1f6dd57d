// src/operator/transfer.rs
//
// Restriction (cell averaging) and prolongation (piecewise-constant injection).

use std::sync::Arc;

use rayon::prelude::*;

use crate::amr::level_data::LevelData;
use crate::error::ensure_same_ncomp;
use crate::operator::helmholtz::HelmholtzOp;
use crate::operator::{LinearOp, MultigridLevelOp};

impl HelmholtzOp {
    /// `coarse = average of ratio^2 fine cells`, written wherever `coarse`'s
    /// layout overlaps the coarsened fine layout.
    pub(crate) fn restrict(&self, coarse: &mut LevelData, fine: &LevelData, ratio: usize) {
        ensure_same_ncomp("restrict", coarse.ncomp(), fine.ncomp());
        let layout = Arc::new(self.coarsened(fine, ratio));
        let mut averaged = LevelData::new(layout, fine.ncomp(), 0);

        let r = ratio as i64;
        let w = 1.0 / (ratio * ratio) as f64;
        averaged
            .patches_mut()
            .par_iter_mut()
            .zip(fine.patches().par_iter())
            .for_each(|(c, f)| {
                let cvalid = c.valid;
                for comp in 0..c.ncomp {
                    for (ic, jc) in cvalid.cells() {
                        let mut sum = 0.0;
                        for dj in 0..r {
                            for di in 0..r {
                                sum += f.get(ic * r + di, jc * r + dj, comp);
                            }
                        }
                        c.set(ic, jc, comp, w * sum);
                    }
                }
            });

        averaged.copy_to(coarse);
    }

    /// `fine += coarse` injected at `ratio`. `coarse` must cover the fine
    /// layout coarsened by `ratio`.
    pub(crate) fn prolong(&self, fine: &mut LevelData, coarse: &LevelData, ratio: usize) {
        ensure_same_ncomp("prolong", fine.ncomp(), coarse.ncomp());
        let coarsened = self.coarsened(fine, ratio);

        let staged;
        let src = if coarse.layout().boxes() == coarsened.boxes() {
            coarse
        } else {
            let mut t = LevelData::new(Arc::new(coarsened), coarse.ncomp(), 0);
            coarse.copy_to(&mut t);
            staged = t;
            &staged
        };

        let r = ratio as i64;
        fine.patches_mut()
            .par_iter_mut()
            .zip(src.patches().par_iter())
            .for_each(|(f, c)| {
                let fvalid = f.valid;
                for comp in 0..f.ncomp {
                    for (i, j) in fvalid.cells() {
                        f.add(i, j, comp, c.get(i.div_euclid(r), j.div_euclid(r), comp));
                    }
                }
            });
    }
}

impl MultigridLevelOp for HelmholtzOp {
    fn create_coarser(&self, fine: &LevelData) -> LevelData {
        self.create_coarsened(fine, 2)
    }

    fn restrict_residual(&self, res_coarse: &mut LevelData, phi_fine: &mut LevelData, rhs_fine: &LevelData) {
        let mut resid = self.create(rhs_fine);
        self.residual(&mut resid, phi_fine, rhs_fine, true);
        self.restrict(res_coarse, &resid, 2);
    }

    fn prolong_increment(&self, phi: &mut LevelData, coarse_correction: &LevelData) {
        self.prolong(phi, coarse_correction, 2);
    }
}
