// src/operator/mod.rs
//
// Operator capability traits and the Helmholtz operator that implements them.
//
// The traits mirror the contract an AMR multigrid driver expects from one
// level: plain linear-operator utilities, smoothing, the two-grid multigrid
// transfers, and the AMR coupling between adjacent refinement levels.

mod amr;
mod helmholtz;
mod relax;
mod transfer;

pub use helmholtz::{HelmholtzOp, LevelGeometry, LevelLink};

use crate::amr::level_data::LevelData;

/// Field algebra plus operator application on one level.
pub trait LinearOp {
    /// `lhs = rhs - L(phi)`, coarse-fine ghosts filled homogeneously.
    fn residual(&self, lhs: &mut LevelData, phi: &mut LevelData, rhs: &LevelData, homogeneous: bool);

    /// `lhs = L(phi)`, coarse-fine ghosts filled homogeneously.
    fn apply_op(&self, lhs: &mut LevelData, phi: &mut LevelData, homogeneous: bool);

    /// Zeroed field shaped like `like`.
    fn create(&self, like: &LevelData) -> LevelData;

    /// Zeroed field on `like`'s layout coarsened by `ratio`.
    fn create_coarsened(&self, like: &LevelData, ratio: usize) -> LevelData;

    /// Copy valid data from `rhs` into `lhs` where their layouts overlap.
    fn assign(&self, lhs: &mut LevelData, rhs: &LevelData);

    /// Patch-by-patch copy between fields on the same layout, ghosts included.
    fn assign_local(&self, lhs: &mut LevelData, rhs: &LevelData);

    /// Copy between fields on different layouts.
    fn assign_copier(&self, lhs: &mut LevelData, rhs: &LevelData);

    /// Zero the valid cells of `lhs` covered by `rhs`'s layout.
    fn zero_covered(&self, lhs: &mut LevelData, rhs: &LevelData);

    fn dot_product(&self, a: &LevelData, b: &LevelData) -> f64;

    fn incr(&self, lhs: &mut LevelData, x: &LevelData, scale: f64);

    /// `lhs = a * x + b * y`.
    fn axby(&self, lhs: &mut LevelData, x: &LevelData, y: &LevelData, a: f64, b: f64);

    fn scale(&self, lhs: &mut LevelData, s: f64);

    /// Norm used for convergence checks. Always the max norm, whatever `ord`.
    fn norm(&self, x: &LevelData, ord: i32) -> f64;

    fn local_max_norm(&self, x: &LevelData) -> f64;

    fn set_to_zero(&self, x: &mut LevelData);
}

pub trait Smoother {
    /// Apply `iterations` smoothing steps to `L(e) = residual`.
    fn relax(&mut self, e: &mut LevelData, residual: &LevelData, iterations: usize);

    /// Initial guess `phi = rhs / D` followed by two relaxation steps.
    fn pre_cond(&mut self, phi: &mut LevelData, rhs: &LevelData);
}

pub trait MultigridLevelOp: LinearOp + Smoother {
    /// Zeroed field on the fine layout coarsened by 2.
    fn create_coarser(&self, fine: &LevelData) -> LevelData;

    /// `res_coarse = R(rhs_fine - L(phi_fine))`, restriction by 2.
    fn restrict_residual(&self, res_coarse: &mut LevelData, phi_fine: &mut LevelData, rhs_fine: &LevelData);

    /// `phi += P(coarse_correction)`, prolongation by 2.
    fn prolong_increment(&self, phi: &mut LevelData, coarse_correction: &LevelData);
}

/// The finer level's solution together with its operator.
pub type FinerLevel<'a, Op> = Option<(&'a mut LevelData, &'a Op)>;

pub trait AmrLevelOp: MultigridLevelOp {
    /// Refinement ratio to the next coarser AMR level (1 if there is none).
    fn ref_to_coarser(&self) -> usize;

    /// `residual = rhs - L(phi, phi_fine, phi_coarse)`.
    fn amr_residual(
        &mut self,
        residual: &mut LevelData,
        finer: FinerLevel<'_, Self>,
        phi: &mut LevelData,
        phi_coarse: &LevelData,
        rhs: &LevelData,
        homogeneous_bc: bool,
    ) where
        Self: Sized;

    /// As `amr_residual`, with no coarser level.
    fn amr_residual_nc(
        &mut self,
        residual: &mut LevelData,
        finer: FinerLevel<'_, Self>,
        phi: &mut LevelData,
        rhs: &LevelData,
        homogeneous_bc: bool,
    ) where
        Self: Sized;

    /// As `amr_residual`, with no finer level.
    fn amr_residual_nf(
        &self,
        residual: &mut LevelData,
        phi: &mut LevelData,
        phi_coarse: &LevelData,
        rhs: &LevelData,
        homogeneous_bc: bool,
    );

    /// `res = res - L(corr, coarse_corr)` with homogeneous physical BCs.
    fn amr_update_residual(&self, res: &mut LevelData, corr: &mut LevelData, coarse_corr: &LevelData);

    /// `lofphi = L(phi)` with coarse-fine ghosts from `phi_coarse`, refluxed
    /// against the finer level when one is given.
    fn amr_operator(
        &mut self,
        lofphi: &mut LevelData,
        finer: FinerLevel<'_, Self>,
        phi: &mut LevelData,
        phi_coarse: &LevelData,
        homogeneous_bc: bool,
    ) where
        Self: Sized;

    fn amr_operator_nc(
        &mut self,
        lofphi: &mut LevelData,
        finer: FinerLevel<'_, Self>,
        phi: &mut LevelData,
        homogeneous_bc: bool,
    ) where
        Self: Sized;

    fn amr_operator_nf(&self, lofphi: &mut LevelData, phi: &mut LevelData, phi_coarse: &LevelData, homogeneous_bc: bool);

    /// `res_coarse = R(residual - L(correction, coarse_correction))` at
    /// `ref_to_coarser`, or `R(residual)` when `skip_res` is set.
    fn amr_restrict(
        &self,
        res_coarse: &mut LevelData,
        residual: &LevelData,
        correction: &mut LevelData,
        coarse_correction: &LevelData,
        skip_res: bool,
    );

    /// As `amr_restrict`, with caller-provided scratch on this level's layout.
    fn amr_restrict_s(
        &self,
        res_coarse: &mut LevelData,
        residual: &LevelData,
        correction: &mut LevelData,
        coarse_correction: &LevelData,
        scratch: &mut LevelData,
        skip_res: bool,
    );

    /// `correction += P(coarse_correction)` at `ref_to_coarser`.
    fn amr_prolong(&self, correction: &mut LevelData, coarse_correction: &LevelData);

    /// Norm of `coarse_res` over cells not covered by `fine_res`'s layout.
    fn amr_norm(&self, coarse_res: &LevelData, fine_res: Option<&LevelData>, ref_ratio: usize, ord: i32) -> f64;

    /// Correct `residual` on coarse cells next to the finer level by the
    /// mismatch between fine and coarse face fluxes. The fine ghosts are
    /// refilled from `phi`, with the physical boundary in the given mode.
    fn reflux(
        &mut self,
        phi_fine: &mut LevelData,
        phi: &LevelData,
        residual: &mut LevelData,
        finer_op: &Self,
        homogeneous_bc: bool,
    ) where
        Self: Sized;
}
