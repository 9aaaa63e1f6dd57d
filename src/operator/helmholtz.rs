// src/operator/helmholtz.rs

use std::path::Path;
use std::sync::{Arc, OnceLock};

use rayon::prelude::*;

use crate::amr::layout::{PatchLayout, ProblemDomain};
use crate::amr::level_data::LevelData;
use crate::boundary::BoundaryPolicy;
use crate::coarse_fine::{CoarseFineInterp, CoarseFineTransfer};
use crate::config::{Centering, HelmholtzConfig};
use crate::error::{ensure_same_ncomp, fatal, HelmholtzError, HelmholtzResult};
use crate::flux_register::FluxRegister;
use crate::io;
use crate::operator::LinearOp;
use crate::stencil::{kernel_for, FaceFlux, StencilKernel};

/// Geometry of one level: its patches, domain and (uniform) cell size.
#[derive(Debug, Clone)]
pub struct LevelGeometry {
    pub layout: Arc<PatchLayout>,
    pub domain: ProblemDomain,
    pub dx: f64,
}

/// A neighbouring AMR level as seen from this one.
#[derive(Debug, Clone)]
pub struct LevelLink {
    pub layout: Arc<PatchLayout>,
    /// Refinement ratio between the two levels.
    pub ratio: usize,
}

/// Where coarse-fine ghost values come from during a ghost fill.
#[derive(Debug, Clone, Copy)]
pub(crate) enum CoarseFill<'a> {
    /// Leave coarse-fine ghosts as they are.
    Skip,
    /// Coarse level implicitly zero.
    Homogeneous,
    /// Interpolate from an explicit coarse field.
    From(&'a LevelData),
}

/// `L(phi) = alpha * phi + beta * Laplacian(phi)` on one AMR or multigrid level.
#[derive(Debug)]
pub struct HelmholtzOp {
    pub(crate) cfg: HelmholtzConfig,
    pub(crate) kernel: Box<dyn StencilKernel>,
    pub(crate) alpha: f64,
    pub(crate) beta: f64,
    pub(crate) dx: f64,
    pub(crate) domain: ProblemDomain,
    pub(crate) layout: Arc<PatchLayout>,
    pub(crate) ncomp: usize,
    pub(crate) ref_to_coarser: usize,
    pub(crate) ref_to_finer: usize,
    pub(crate) bc: Arc<dyn BoundaryPolicy>,
    pub(crate) cf_interp: Option<Arc<dyn CoarseFineTransfer>>,
    pub(crate) flux_register: Option<FluxRegister>,
    /// Inverse diagonal, refreshed before every Jacobi sweep.
    pub(crate) diag_inv: Option<LevelData>,
    pub(crate) coarsened_mg_layout: OnceLock<Arc<PatchLayout>>,
}

impl HelmholtzOp {
    /// Operator on an AMR level with optional finer and coarser neighbours.
    ///
    /// A flux register is built when a finer level exists. Coarse-fine
    /// interpolation is set up only when a coarser level exists and the
    /// domain is not small (some extent larger than
    /// `ref_to_coarser * min_coarsest_domain_size`).
    pub fn define_amr(
        cfg: HelmholtzConfig,
        geom: LevelGeometry,
        finer: Option<LevelLink>,
        coarser: Option<LevelLink>,
        bc: Arc<dyn BoundaryPolicy>,
        ncomp: usize,
    ) -> HelmholtzResult<Self> {
        let mut op = Self::new_level(cfg, geom, bc, ncomp)?;

        if let Some(link) = &finer {
            check_ratio(link.ratio)?;
            if !link.layout.coarsenable(link.ratio) {
                return Err(HelmholtzError::NotCoarsenable {
                    context: "finer level",
                    ratio: link.ratio,
                });
            }
            op.ref_to_finer = link.ratio;
            let fine_domain = op.domain.refine(link.ratio);
            op.flux_register = Some(FluxRegister::define(
                &link.layout,
                &op.layout,
                &fine_domain,
                link.ratio,
                ncomp,
            ));
        }

        if let Some(link) = &coarser {
            check_ratio(link.ratio)?;
            if !op.layout.coarsenable(link.ratio) {
                return Err(HelmholtzError::NotCoarsenable {
                    context: "coarser level",
                    ratio: link.ratio,
                });
            }
            op.ref_to_coarser = link.ratio;

            let small = op
                .domain
                .is_at_most(link.ratio * op.cfg.min_coarsest_domain_size);
            if small {
                log::info!(
                    "[helmholtz] domain {}x{} is small: coarse-fine interpolation disabled",
                    op.domain.rect.nx,
                    op.domain.rect.ny
                );
            } else {
                op.cf_interp = Some(Arc::new(CoarseFineInterp::define(
                    &op.layout,
                    link.layout.clone(),
                    &op.domain,
                    link.ratio,
                    op.kernel.n_ghost(),
                )));
            }
        }

        log::debug!(
            "[helmholtz] define amr level: {} patches, dx={:.3e}, order {}, ref coarser/finer {}/{}, cf {}",
            op.layout.len(),
            op.dx,
            op.order_of_accuracy(),
            op.ref_to_coarser,
            op.ref_to_finer,
            op.cf_interp.is_some()
        );
        Ok(op)
    }

    /// Operator on a multigrid level with no AMR neighbours.
    pub fn define_mg(
        cfg: HelmholtzConfig,
        geom: LevelGeometry,
        bc: Arc<dyn BoundaryPolicy>,
        ncomp: usize,
    ) -> HelmholtzResult<Self> {
        let mut op = Self::new_level(cfg, geom, bc, ncomp)?;
        op.ref_to_coarser = 2;
        op.ref_to_finer = 2;
        log::debug!(
            "[helmholtz] define mg level: {} patches, dx={:.3e}",
            op.layout.len(),
            op.dx
        );
        Ok(op)
    }

    fn new_level(
        cfg: HelmholtzConfig,
        geom: LevelGeometry,
        bc: Arc<dyn BoundaryPolicy>,
        ncomp: usize,
    ) -> HelmholtzResult<Self> {
        cfg.validate()?;
        if ncomp == 0 {
            return Err(HelmholtzError::InvalidConfig("ncomp must be >= 1".to_string()));
        }
        if !(geom.dx > 0.0) {
            return Err(HelmholtzError::InvalidConfig(format!(
                "cell size must be positive, got {}",
                geom.dx
            )));
        }
        Ok(Self {
            kernel: kernel_for(cfg.order),
            alpha: cfg.alpha,
            beta: cfg.beta,
            cfg,
            dx: geom.dx,
            domain: geom.domain,
            layout: geom.layout,
            ncomp,
            ref_to_coarser: 1,
            ref_to_finer: 1,
            bc,
            cf_interp: None,
            flux_register: None,
            diag_inv: None,
            coarsened_mg_layout: OnceLock::new(),
        })
    }

    // ---------------------------------------------------------------------
    // Accessors / setters
    // ---------------------------------------------------------------------

    pub fn config(&self) -> &HelmholtzConfig {
        &self.cfg
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn dx(&self) -> f64 {
        self.dx
    }

    pub fn domain(&self) -> &ProblemDomain {
        &self.domain
    }

    pub fn layout(&self) -> &Arc<PatchLayout> {
        &self.layout
    }

    pub fn ncomp(&self) -> usize {
        self.ncomp
    }

    pub fn ref_to_finer(&self) -> usize {
        self.ref_to_finer
    }

    pub fn order_of_accuracy(&self) -> usize {
        self.kernel.order().order()
    }

    /// Ghost width every operator field must carry.
    pub fn n_ghost(&self) -> usize {
        self.kernel.n_ghost()
    }

    pub fn has_coarse_fine_interp(&self) -> bool {
        self.cf_interp.is_some()
    }

    pub fn flux_register(&self) -> Option<&FluxRegister> {
        self.flux_register.as_ref()
    }

    pub fn set_alpha_and_beta(&mut self, alpha: f64, beta: f64) {
        self.alpha = alpha;
        self.beta = beta;
        self.diag_inv = None;
    }

    pub fn set_bc(&mut self, bc: Arc<dyn BoundaryPolicy>) {
        self.bc = bc;
    }

    /// Diagonal coefficient `D` of the stencil at the current alpha / beta.
    pub fn diagonal(&self) -> f64 {
        self.kernel.diagonal(self.alpha, self.beta, self.dx)
    }

    /// Field with this operator's layout, component count and ghost width.
    pub fn new_field(&self) -> LevelData {
        LevelData::new(self.layout.clone(), self.ncomp, self.n_ghost())
    }

    // ---------------------------------------------------------------------
    // Ghost cells and stencil application
    // ---------------------------------------------------------------------

    #[track_caller]
    pub(crate) fn check_field(&self, context: &'static str, field: &LevelData) {
        ensure_same_ncomp(context, self.ncomp, field.ncomp());
        if field.ghost() < self.n_ghost() {
            fatal(HelmholtzError::InsufficientGhosts {
                required: self.n_ghost(),
                actual: field.ghost(),
            });
        }
    }

    /// Fill every ghost cell the stencil reads: same-level overlap first,
    /// then the coarse-fine interface, then the physical boundary.
    pub(crate) fn fill_ghosts(&self, phi: &mut LevelData, coarse: CoarseFill<'_>, homogeneous_bc: bool) {
        phi.exchange(self.cfg.exchange_mode);
        if let Some(cf) = &self.cf_interp {
            match coarse {
                CoarseFill::Skip => {}
                CoarseFill::Homogeneous => cf.fill_ghosts(phi, None, true),
                CoarseFill::From(c) => {
                    ensure_same_ncomp("coarse-fine fill", phi.ncomp(), c.ncomp());
                    cf.fill_ghosts(phi, Some(c), false)
                }
            }
        }
        self.bc
            .fill_domain_ghosts(phi, &self.domain, self.dx, homogeneous_bc);
    }

    /// `lhs = L(phi)` on valid cells, reading `phi`'s ghosts as they are.
    pub(crate) fn apply_stencil(&self, lhs: &mut LevelData, phi: &LevelData) {
        ensure_same_ncomp("applyOp", phi.ncomp(), lhs.ncomp());
        debug_assert!(lhs.same_layout(phi), "lhs and phi must share a layout");
        let kernel = self.kernel.as_ref();
        let (alpha, beta, dx) = (self.alpha, self.beta, self.dx);
        lhs.patches_mut()
            .par_iter_mut()
            .zip(phi.patches().par_iter())
            .for_each(|(out, p)| kernel.apply(out, p, alpha, beta, dx));
    }

    /// `lhs = L(phi)` ignoring the coarse-fine interface.
    pub fn apply_op_i(&self, lhs: &mut LevelData, phi: &mut LevelData, homogeneous: bool) {
        self.check_field("applyOpI", phi);
        self.fill_ghosts(phi, CoarseFill::Skip, homogeneous);
        self.apply_stencil(lhs, phi);
    }

    /// `lhs = rhs - L(phi)` ignoring the coarse-fine interface.
    pub fn residual_i(&self, lhs: &mut LevelData, phi: &mut LevelData, rhs: &LevelData, homogeneous: bool) {
        self.apply_op_i(lhs, phi, homogeneous);
        lhs.axby_in_place(rhs, -1.0, 1.0);
    }

    /// Face fluxes `beta * dphi/dx_dir` over the faces of patch `k` of `phi`,
    /// whose ghosts must already be filled.
    pub fn get_flux(&self, phi: &LevelData, k: usize, dir: usize) -> FaceFlux {
        if self.cfg.centering != Centering::CellAveraged {
            fatal(HelmholtzError::RequiresCellAveraged("getFlux"));
        }
        self.check_field("getFlux", phi);
        debug_assert!(dir < crate::stencil::SPACE_DIM);
        self.kernel
            .face_flux(phi.patch(k), dir, self.beta / self.dx)
    }

    /// Dump `data` as JSON for inspection.
    pub fn write(&self, data: &LevelData, path: &Path) -> std::io::Result<()> {
        io::write_level_data(path, data, self.dx)
    }
}

fn check_ratio(ratio: usize) -> HelmholtzResult<()> {
    if ratio < 2 {
        return Err(HelmholtzError::InvalidRefinementRatio(ratio));
    }
    Ok(())
}

impl LinearOp for HelmholtzOp {
    fn residual(&self, lhs: &mut LevelData, phi: &mut LevelData, rhs: &LevelData, homogeneous: bool) {
        self.apply_op(lhs, phi, homogeneous);
        lhs.axby_in_place(rhs, -1.0, 1.0);
    }

    fn apply_op(&self, lhs: &mut LevelData, phi: &mut LevelData, homogeneous: bool) {
        self.check_field("applyOp", phi);
        self.fill_ghosts(phi, CoarseFill::Homogeneous, homogeneous);
        self.apply_stencil(lhs, phi);
    }

    fn create(&self, like: &LevelData) -> LevelData {
        LevelData::new_like(like)
    }

    fn create_coarsened(&self, like: &LevelData, ratio: usize) -> LevelData {
        let layout = if ratio == 2 {
            self.coarsened_by_two(like)
        } else {
            Arc::new(self.coarsened(like, ratio))
        };
        LevelData::new(layout, like.ncomp(), like.ghost())
    }

    fn assign(&self, lhs: &mut LevelData, rhs: &LevelData) {
        rhs.copy_to(lhs);
    }

    fn assign_local(&self, lhs: &mut LevelData, rhs: &LevelData) {
        ensure_same_ncomp("assignLocal", lhs.ncomp(), rhs.ncomp());
        lhs.patches_mut()
            .par_iter_mut()
            .zip(rhs.patches().par_iter())
            .for_each(|(l, r)| {
                if let Some(region) = l.grown.intersect(r.grown) {
                    l.copy_region_from(r, region);
                }
            });
    }

    fn assign_copier(&self, lhs: &mut LevelData, rhs: &LevelData) {
        rhs.copy_to(lhs);
    }

    fn zero_covered(&self, lhs: &mut LevelData, rhs: &LevelData) {
        lhs.zero_under(rhs.layout().boxes());
    }

    fn dot_product(&self, a: &LevelData, b: &LevelData) -> f64 {
        a.dot(b)
    }

    fn incr(&self, lhs: &mut LevelData, x: &LevelData, scale: f64) {
        lhs.incr(x, scale);
    }

    fn axby(&self, lhs: &mut LevelData, x: &LevelData, y: &LevelData, a: f64, b: f64) {
        lhs.axby(x, y, a, b);
    }

    fn scale(&self, lhs: &mut LevelData, s: f64) {
        lhs.scale(s);
    }

    fn norm(&self, x: &LevelData, _ord: i32) -> f64 {
        self.local_max_norm(x)
    }

    fn local_max_norm(&self, x: &LevelData) -> f64 {
        x.max_norm()
    }

    fn set_to_zero(&self, x: &mut LevelData) {
        x.set_val(0.0);
    }
}

impl HelmholtzOp {
    /// `like`'s layout coarsened by `ratio`; aborts if that loses cells.
    #[track_caller]
    pub(crate) fn coarsened(&self, like: &LevelData, ratio: usize) -> PatchLayout {
        if !like.layout().coarsenable(ratio) {
            fatal(HelmholtzError::NotCoarsenable {
                context: "createCoarsened",
                ratio,
            });
        }
        like.layout().coarsen(ratio)
    }

    /// Cached 2-coarsening of this level's layout (computed on first use).
    pub(crate) fn coarsened_by_two(&self, like: &LevelData) -> Arc<PatchLayout> {
        if !like.same_layout_as(&self.layout) {
            return Arc::new(self.coarsened(like, 2));
        }
        self.coarsened_mg_layout
            .get_or_init(|| Arc::new(self.coarsened(like, 2)))
            .clone()
    }
}
