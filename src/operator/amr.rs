// src/operator/amr.rs
//
// Coupling between adjacent AMR levels: composite operator and residual,
// reflux, and the AMR restriction / prolongation / norm.

use std::sync::Arc;

use rayon::prelude::*;

use crate::amr::level_data::LevelData;
use crate::config::Centering;
use crate::error::{fatal, HelmholtzError};
use crate::operator::helmholtz::{CoarseFill, HelmholtzOp};
use crate::operator::{AmrLevelOp, FinerLevel, LinearOp};
use crate::stencil::{FaceFlux, SPACE_DIM};

impl AmrLevelOp for HelmholtzOp {
    fn ref_to_coarser(&self) -> usize {
        self.ref_to_coarser
    }

    fn amr_residual(
        &mut self,
        residual: &mut LevelData,
        finer: FinerLevel<'_, Self>,
        phi: &mut LevelData,
        phi_coarse: &LevelData,
        rhs: &LevelData,
        homogeneous_bc: bool,
    ) {
        self.amr_operator(residual, finer, phi, phi_coarse, homogeneous_bc);
        residual.axby_in_place(rhs, -1.0, 1.0);
    }

    fn amr_residual_nc(
        &mut self,
        residual: &mut LevelData,
        finer: FinerLevel<'_, Self>,
        phi: &mut LevelData,
        rhs: &LevelData,
        homogeneous_bc: bool,
    ) {
        self.amr_operator_nc(residual, finer, phi, homogeneous_bc);
        residual.axby_in_place(rhs, -1.0, 1.0);
    }

    fn amr_residual_nf(
        &self,
        residual: &mut LevelData,
        phi: &mut LevelData,
        phi_coarse: &LevelData,
        rhs: &LevelData,
        homogeneous_bc: bool,
    ) {
        self.amr_operator_nf(residual, phi, phi_coarse, homogeneous_bc);
        residual.axby_in_place(rhs, -1.0, 1.0);
    }

    fn amr_update_residual(&self, res: &mut LevelData, corr: &mut LevelData, coarse_corr: &LevelData) {
        let mut lcorr = self.create(res);
        self.amr_operator_nf(&mut lcorr, corr, coarse_corr, true);
        res.incr(&lcorr, -1.0);
    }

    fn amr_operator(
        &mut self,
        lofphi: &mut LevelData,
        finer: FinerLevel<'_, Self>,
        phi: &mut LevelData,
        phi_coarse: &LevelData,
        homogeneous_bc: bool,
    ) {
        self.amr_operator_nf(lofphi, phi, phi_coarse, homogeneous_bc);
        if let Some((phi_fine, finer_op)) = finer {
            self.reflux(phi_fine, phi, lofphi, finer_op, homogeneous_bc);
        }
    }

    fn amr_operator_nc(
        &mut self,
        lofphi: &mut LevelData,
        finer: FinerLevel<'_, Self>,
        phi: &mut LevelData,
        homogeneous_bc: bool,
    ) {
        self.apply_op_i(lofphi, phi, homogeneous_bc);
        if let Some((phi_fine, finer_op)) = finer {
            self.reflux(phi_fine, phi, lofphi, finer_op, homogeneous_bc);
        }
    }

    fn amr_operator_nf(&self, lofphi: &mut LevelData, phi: &mut LevelData, phi_coarse: &LevelData, homogeneous_bc: bool) {
        self.check_field("AMROperatorNF", phi);
        self.fill_ghosts(phi, CoarseFill::From(phi_coarse), homogeneous_bc);
        self.apply_stencil(lofphi, phi);
    }

    fn amr_restrict(
        &self,
        res_coarse: &mut LevelData,
        residual: &LevelData,
        correction: &mut LevelData,
        coarse_correction: &LevelData,
        skip_res: bool,
    ) {
        let mut scratch = self.create(residual);
        self.amr_restrict_s(res_coarse, residual, correction, coarse_correction, &mut scratch, skip_res);
    }

    fn amr_restrict_s(
        &self,
        res_coarse: &mut LevelData,
        residual: &LevelData,
        correction: &mut LevelData,
        coarse_correction: &LevelData,
        scratch: &mut LevelData,
        skip_res: bool,
    ) {
        if skip_res {
            self.assign_local(scratch, residual);
        } else {
            self.amr_residual_nf(scratch, correction, coarse_correction, residual, true);
        }
        self.restrict(res_coarse, scratch, self.ref_to_coarser);
    }

    fn amr_prolong(&self, correction: &mut LevelData, coarse_correction: &LevelData) {
        let r = self.ref_to_coarser;
        let layout = Arc::new(self.coarsened(correction, r));
        let mut staged = LevelData::new(layout, correction.ncomp(), coarse_correction.ghost());
        coarse_correction.copy_to(&mut staged);
        self.prolong(correction, &staged, r);
    }

    fn amr_norm(&self, coarse_res: &LevelData, fine_res: Option<&LevelData>, ref_ratio: usize, ord: i32) -> f64 {
        let mut temp = self.create(coarse_res);
        self.assign_local(&mut temp, coarse_res);
        if let Some(fine) = fine_res {
            let covered = fine.layout().coarsen(ref_ratio);
            temp.zero_under(covered.boxes());
        }
        self.norm(&temp, ord)
    }

    fn reflux(
        &mut self,
        phi_fine: &mut LevelData,
        phi: &LevelData,
        residual: &mut LevelData,
        finer_op: &Self,
        homogeneous_bc: bool,
    ) {
        if self.cfg.centering != Centering::CellAveraged {
            fatal(HelmholtzError::RequiresCellAveraged("reflux"));
        }
        if self.flux_register.is_none() {
            fatal(HelmholtzError::NoFinerLevel);
        }

        // Coarse fluxes read phi's ghosts as left by the preceding stencil pass.
        let coarse_fluxes: Vec<Vec<FaceFlux>> = (0..phi.patches().len())
            .into_par_iter()
            .map(|k| (0..SPACE_DIM).map(|d| self.get_flux(phi, k, d)).collect())
            .collect();

        finer_op.fill_ghosts(phi_fine, CoarseFill::From(phi), homogeneous_bc);
        let fine_fluxes: Vec<Vec<FaceFlux>> = (0..phi_fine.patches().len())
            .into_par_iter()
            .map(|k| (0..SPACE_DIM).map(|d| finer_op.get_flux(phi_fine, k, d)).collect())
            .collect();

        let scale = 1.0 / self.dx;
        let Some(register) = self.flux_register.as_mut() else {
            return;
        };
        register.reset();
        for (k, fluxes) in coarse_fluxes.iter().enumerate() {
            for f in fluxes {
                register.increment_coarse(k, f);
            }
        }
        for (k, fluxes) in fine_fluxes.iter().enumerate() {
            for f in fluxes {
                register.increment_fine(k, f);
            }
        }
        register.reflux(residual, scale);
    }
}

impl HelmholtzOp {
    /// Replace the coarse correction under this level by the average of the
    /// fine correction, so both levels agree where they overlap.
    pub fn enforce_cf_consistency(&self, coarse_correction: &mut LevelData, correction: &LevelData) {
        self.restrict(coarse_correction, correction, self.ref_to_coarser);
    }
}
