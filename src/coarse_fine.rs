// src/coarse_fine.rs
//
// Coarse-fine ghost interpolation.

use std::fmt::Debug;
use std::sync::Arc;

use rayon::prelude::*;

use crate::amr::layout::{PatchLayout, ProblemDomain};
use crate::amr::level_data::LevelData;
use crate::stencil::{unit, SPACE_DIM};

/// Fills fine ghost cells that lie on a coarse-fine interface.
pub trait CoarseFineTransfer: Debug + Send + Sync {
    /// In homogeneous mode the coarse field is taken to be identically zero
    /// and `coarse` is ignored. Otherwise `coarse` must be supplied.
    fn fill_ghosts(&self, fine: &mut LevelData, coarse: Option<&LevelData>, homogeneous: bool);

    fn ratio(&self) -> usize;
}

/// One fine ghost cell on a coarse-fine interface.
#[derive(Debug, Clone, Copy)]
struct CfGhost {
    /// The ghost cell itself.
    cell: (i64, i64),
    /// Fine interior cell adjacent to the interface on the same line.
    interior: (i64, i64),
    /// Ghost layer, 1 at the interface.
    layer: usize,
    /// Coarse cell just across the interface.
    coarse: (i64, i64),
    /// Tangential direction and the ghost's offset inside the coarse cell,
    /// in coarse cell widths, in (-1/2, 1/2).
    tan_dir: usize,
    tan_offset: f64,
}

/// Linear coarse-fine interpolation.
///
/// Along the interface the coarse field is interpolated linearly with central
/// (one-sided at the edge of the coarse data) slopes. Normal to the interface
/// the ghost value lies on the line through the adjacent fine cell and the
/// interpolated coarse value, whose centre is `(r + 1) / 2` fine cells away:
///
///   phi_g(k) = phi_f + (phi_c - phi_f) * 2k / (r + 1)
///
/// Only face ghosts are filled; corners are never needed by the stencils.
///
/// The ghosts are second-order accurate (exact for linear fields, O(h^2) error
/// on curved ones) for either operator order, so the fourth-order operator is
/// only second order in the fine cells next to a coarse-fine interface.
#[derive(Debug, Clone)]
pub struct CoarseFineInterp {
    ratio: usize,
    ghost: usize,
    coarse_layout: Arc<PatchLayout>,
    coarse_domain: ProblemDomain,
    /// Per fine patch, its coarse-fine ghosts.
    plan: Vec<Vec<CfGhost>>,
}

impl CoarseFineInterp {
    /// Plan the interpolation for every patch of `fine`.
    ///
    /// A ghost cell is on the coarse-fine interface when it is inside the fine
    /// domain and not covered by any fine patch.
    pub fn define(
        fine: &PatchLayout,
        coarse_layout: Arc<PatchLayout>,
        fine_domain: &ProblemDomain,
        ratio: usize,
        ghost: usize,
    ) -> Self {
        assert!(ratio >= 2, "coarse-fine ratio must be >= 2, got {ratio}");
        let r = ratio as i64;
        let coarse_domain = fine_domain.coarsen(ratio);

        let plan: Vec<Vec<CfGhost>> = fine
            .boxes()
            .par_iter()
            .map(|valid| {
                let mut out = Vec::new();
                for dir in 0..SPACE_DIM {
                    let (ei, ej) = unit(dir);
                    let tan_dir = 1 - dir;
                    for high in [false, true] {
                        let s: i64 = if high { 1 } else { -1 };
                        let strip = valid.adjacent_strip(dir, high, 1);
                        for (gi, gj) in strip.cells() {
                            if !fine_domain.contains(gi, gj) || fine.covers(gi, gj) {
                                continue;
                            }
                            let interior = (gi - s * ei, gj - s * ej);
                            let coarse = (gi.div_euclid(r), gj.div_euclid(r));
                            let t_fine = if tan_dir == 0 { gi } else { gj };
                            let t_coarse = if tan_dir == 0 { coarse.0 } else { coarse.1 };
                            let tan_offset = ((t_fine - t_coarse * r) as f64 + 0.5) / ratio as f64 - 0.5;

                            for k in 1..=ghost as i64 {
                                let cell = (gi + s * (k - 1) * ei, gj + s * (k - 1) * ej);
                                if !fine_domain.contains(cell.0, cell.1) || fine.covers(cell.0, cell.1) {
                                    break;
                                }
                                out.push(CfGhost {
                                    cell,
                                    interior,
                                    layer: k as usize,
                                    coarse,
                                    tan_dir,
                                    tan_offset,
                                });
                            }
                        }
                    }
                }
                out
            })
            .collect();

        let n: usize = plan.iter().map(|p| p.len()).sum();
        log::debug!(
            "[cf_interp] defined: {} fine patches, {} coarse patches, ratio {}, {} ghost cells",
            fine.len(),
            coarse_layout.len(),
            ratio,
            n
        );

        Self {
            ratio,
            ghost,
            coarse_layout,
            coarse_domain,
            plan,
        }
    }

    pub fn coarse_layout(&self) -> &Arc<PatchLayout> {
        &self.coarse_layout
    }

    /// Number of interface ghost cells planned for patch `k`.
    pub fn n_ghost_cells(&self, k: usize) -> usize {
        self.plan.get(k).map_or(0, |p| p.len())
    }

    /// Coarse value at a fine ghost's tangential position.
    fn coarse_value(&self, coarse: &LevelData, g: &CfGhost, c: usize) -> Option<f64> {
        let (ci, cj) = g.coarse;
        let centre = coarse.value_at(ci, cj, c)?;

        let (ti, tj) = unit(g.tan_dir);
        let sample = |s: i64| {
            let (i, j) = (ci + s * ti, cj + s * tj);
            if self.coarse_domain.contains(i, j) {
                coarse.value_at(i, j, c)
            } else {
                None
            }
        };
        let slope = match (sample(-1), sample(1)) {
            (Some(lo), Some(hi)) => 0.5 * (hi - lo),
            (Some(lo), None) => centre - lo,
            (None, Some(hi)) => hi - centre,
            (None, None) => 0.0,
        };
        Some(centre + g.tan_offset * slope)
    }
}

impl CoarseFineTransfer for CoarseFineInterp {
    fn fill_ghosts(&self, fine: &mut LevelData, coarse: Option<&LevelData>, homogeneous: bool) {
        debug_assert_eq!(fine.layout().len(), self.plan.len(), "layout does not match the interpolation plan");
        let g_avail = fine.ghost().min(self.ghost);
        let coarse = if homogeneous { None } else { coarse };
        assert!(
            homogeneous || coarse.is_some(),
            "non-homogeneous coarse-fine fill needs a coarse field"
        );
        let w = 2.0 / (self.ratio as f64 + 1.0);

        fine.patches_mut()
            .par_iter_mut()
            .zip(self.plan.par_iter())
            .for_each(|(p, ghosts)| {
                for g in ghosts.iter().filter(|g| g.layer <= g_avail) {
                    for c in 0..p.ncomp {
                        let phi_f = p.get(g.interior.0, g.interior.1, c);
                        let phi_c = match coarse {
                            None => 0.0,
                            Some(cd) => {
                                let v = self.coarse_value(cd, g, c);
                                debug_assert!(v.is_some(), "coarse cell {:?} not covered by the coarse level", g.coarse);
                                v.unwrap_or(phi_f)
                            }
                        };
                        let v = phi_f + (phi_c - phi_f) * w * g.layer as f64;
                        p.set(g.cell.0, g.cell.1, c, v);
                    }
                }
            });
    }

    fn ratio(&self) -> usize {
        self.ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amr::rect::Rect2i;

    fn two_level(ghost: usize) -> (LevelData, LevelData, CoarseFineInterp) {
        let coarse_domain = ProblemDomain::from_size(8, 8);
        let fine_domain = coarse_domain.refine(2);
        let coarse_layout = Arc::new(PatchLayout::tiled(coarse_domain.rect, 4));
        let fine_layout = Arc::new(PatchLayout::new(vec![
            Rect2i::new(4, 4, 4, 8),
            Rect2i::new(8, 4, 4, 8),
        ]));
        let interp = CoarseFineInterp::define(&fine_layout, coarse_layout.clone(), &fine_domain, 2, ghost);
        (
            LevelData::new(fine_layout, 1, ghost),
            LevelData::new(coarse_layout, 1, ghost),
            interp,
        )
    }

    #[test]
    fn plan_skips_ghosts_owned_by_siblings() {
        let (_, _, interp) = two_level(1);
        // Each patch is 4x8: 8 + 4 + 4 ghosts on the three coarse-fine sides;
        // the shared side is covered by the sibling.
        assert_eq!(interp.n_ghost_cells(0), 16);
        assert_eq!(interp.n_ghost_cells(1), 16);
    }

    #[test]
    fn linear_fields_are_reproduced() {
        let h_c = 1.0;
        let h_f = 0.5;
        let lin = |x: f64, y: f64| 2.0 * x - 3.0 * y + 1.0;
        for ghost in [1, 2] {
            let (mut fine, mut coarse, interp) = two_level(ghost);
            fine.fill_valid_with(|i, j, _| lin((i as f64 + 0.5) * h_f, (j as f64 + 0.5) * h_f));
            coarse.fill_valid_with(|i, j, _| lin((i as f64 + 0.5) * h_c, (j as f64 + 0.5) * h_c));
            interp.fill_ghosts(&mut fine, Some(&coarse), false);

            let p = fine.patch(0);
            for k in 1..=ghost as i64 {
                for j in 4..12 {
                    let i = 4 - k;
                    let exact = lin((i as f64 + 0.5) * h_f, (j as f64 + 0.5) * h_f);
                    assert!((p.get(i, j, 0) - exact).abs() < 1e-12, "ghost ({i},{j})");
                }
                let j = 12 + k - 1;
                let exact = lin(5.5 * h_f, (j as f64 + 0.5) * h_f);
                assert!((p.get(5, j, 0) - exact).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn interface_ghosts_are_second_order_accurate() {
        // phi = x^2 across the low x interface of patch 0. The ghost at fine
        // column 3 lies between the coarse centre (column 1, 3 fine widths) and
        // the fine centre (4.5 fine widths): error 0.5 h_f^2 at any resolution.
        let quad = |x: f64| x * x;
        let mut errors = Vec::new();
        for h_c in [1.0, 0.5] {
            let h_f = 0.5 * h_c;
            let (mut fine, mut coarse, interp) = two_level(1);
            fine.fill_valid_with(|i, _, _| quad((i as f64 + 0.5) * h_f));
            coarse.fill_valid_with(|i, _, _| quad((i as f64 + 0.5) * h_c));
            interp.fill_ghosts(&mut fine, Some(&coarse), false);

            let err = fine.patch(0).get(3, 6, 0) - quad(3.5 * h_f);
            assert!((err - 0.5 * h_f * h_f).abs() < 1e-12, "h_f = {h_f}: error {err}");
            errors.push(err);
        }
        assert!((errors[0] / errors[1] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn homogeneous_fill_treats_coarse_as_zero() {
        let (mut fine, _, interp) = two_level(1);
        fine.set_val(3.0);
        interp.fill_ghosts(&mut fine, None, true);
        // phi_f + (0 - phi_f) * 2/3
        assert!((fine.patch(0).get(3, 6, 0) - 1.0).abs() < 1e-12);
        // Shared face untouched by the interpolation.
        assert_eq!(fine.patch(0).get(8, 6, 0), 3.0);
    }
}
