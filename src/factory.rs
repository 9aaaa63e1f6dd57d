// src/factory.rs

use std::sync::Arc;

use crate::amr::layout::{PatchLayout, ProblemDomain};
use crate::boundary::BoundaryPolicy;
use crate::config::HelmholtzConfig;
use crate::error::{HelmholtzError, HelmholtzResult};
use crate::operator::{HelmholtzOp, LevelGeometry, LevelLink};

/// Builds the `HelmholtzOp` of every level of an AMR hierarchy, and the
/// coarsened multigrid operators underneath any one level.
#[derive(Debug, Clone)]
pub struct HelmholtzOpFactory {
    cfg: HelmholtzConfig,
    levels: Vec<LevelGeometry>,
    /// `ref_ratios[l]` is the ratio between level `l` and level `l + 1`.
    ref_ratios: Vec<usize>,
    bc: Arc<dyn BoundaryPolicy>,
    ncomp: usize,
}

impl HelmholtzOpFactory {
    /// `layouts[0]` lives on `coarsest_domain` with cell size `coarsest_dx`;
    /// each finer level is refined by the matching entry of `ref_ratios`.
    pub fn define(
        cfg: HelmholtzConfig,
        coarsest_domain: ProblemDomain,
        coarsest_dx: f64,
        layouts: Vec<Arc<PatchLayout>>,
        ref_ratios: Vec<usize>,
        bc: Arc<dyn BoundaryPolicy>,
        ncomp: usize,
    ) -> HelmholtzResult<Self> {
        cfg.validate()?;
        if layouts.is_empty() {
            return Err(HelmholtzError::InvalidConfig("no AMR levels given".to_string()));
        }
        if ref_ratios.len() + 1 < layouts.len() {
            return Err(HelmholtzError::InvalidConfig(format!(
                "{} levels need {} refinement ratios, got {}",
                layouts.len(),
                layouts.len() - 1,
                ref_ratios.len()
            )));
        }

        let mut levels = Vec::with_capacity(layouts.len());
        let mut domain = coarsest_domain;
        let mut dx = coarsest_dx;
        for (l, layout) in layouts.into_iter().enumerate() {
            if l > 0 {
                let r = ref_ratios[l - 1];
                if r < 2 {
                    return Err(HelmholtzError::InvalidRefinementRatio(r));
                }
                domain = domain.refine(r);
                dx /= r as f64;
            }
            levels.push(LevelGeometry { layout, domain, dx });
        }

        log::info!(
            "[helmholtz] factory: {} AMR levels, order {}, relax {:?}",
            levels.len(),
            cfg.order.order(),
            cfg.relax_mode
        );

        Ok(Self {
            cfg,
            levels,
            ref_ratios,
            bc,
            ncomp,
        })
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn geometry(&self, level: usize) -> &LevelGeometry {
        &self.levels[level]
    }

    pub fn config(&self) -> &HelmholtzConfig {
        &self.cfg
    }

    /// Ratio to the next finer level; 2 on the finest level.
    pub fn ref_to_finer(&self, level: usize) -> usize {
        if level + 1 < self.levels.len() {
            self.ref_ratios[level]
        } else {
            2
        }
    }

    /// Operator for AMR level `level`, linked to its neighbours.
    pub fn amr_new_op(&self, level: usize) -> HelmholtzResult<HelmholtzOp> {
        let geom = self
            .levels
            .get(level)
            .cloned()
            .ok_or_else(|| HelmholtzError::InvalidConfig(format!("no AMR level {level}")))?;
        let finer = self.levels.get(level + 1).map(|g| LevelLink {
            layout: g.layout.clone(),
            ratio: self.ref_ratios[level],
        });
        let coarser = level.checked_sub(1).map(|c| LevelLink {
            layout: self.levels[c].layout.clone(),
            ratio: self.ref_ratios[c],
        });
        HelmholtzOp::define_amr(self.cfg, geom, finer, coarser, self.bc.clone(), self.ncomp)
    }

    /// All AMR operators, coarsest first.
    pub fn amr_ops(&self) -> HelmholtzResult<Vec<HelmholtzOp>> {
        (0..self.levels.len()).map(|l| self.amr_new_op(l)).collect()
    }

    /// Multigrid operator `depth` halvings below AMR level `level`, or `None`
    /// once the level can no longer be coarsened that far.
    pub fn mg_new_op(&self, level: usize, depth: usize) -> HelmholtzResult<Option<HelmholtzOp>> {
        let geom = self
            .levels
            .get(level)
            .ok_or_else(|| HelmholtzError::InvalidConfig(format!("no AMR level {level}")))?;
        let factor = 1usize << depth;
        if !geom.layout.coarsenable(factor) || !geom.domain.rect.coarsenable(factor) {
            log::debug!("[helmholtz] mg level {level}/{depth}: layout not coarsenable by {factor}");
            return Ok(None);
        }
        let coarse = LevelGeometry {
            layout: Arc::new(geom.layout.coarsen(factor)),
            domain: geom.domain.coarsen(factor),
            dx: geom.dx * factor as f64,
        };
        HelmholtzOp::define_mg(self.cfg, coarse, self.bc.clone(), self.ncomp).map(Some)
    }
}
