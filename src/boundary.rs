// src/boundary.rs
//
// Physical (domain) boundary conditions.

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;

use crate::amr::layout::ProblemDomain;
use crate::amr::level_data::LevelData;
use crate::amr::patch::PatchData;
use crate::stencil::{unit, SPACE_DIM};

/// Fills the ghost cells of a field that lie outside the problem domain.
pub trait BoundaryPolicy: fmt::Debug + Send + Sync {
    /// With `homogeneous == true` the boundary data is taken to be zero.
    fn fill_domain_ghosts(&self, field: &mut LevelData, domain: &ProblemDomain, dx: f64, homogeneous: bool);
}

/// Boundary data as a function of the physical position of a face point.
pub type BcValue = Arc<dyn Fn([f64; 2]) -> f64 + Send + Sync>;

/// Condition on one face of the domain.
#[derive(Clone)]
pub enum FaceBc {
    /// `phi = v` on the face.
    Dirichlet(BcValue),
    /// `dphi/dn = q` along the outward normal.
    Neumann(BcValue),
}

impl FaceBc {
    pub fn dirichlet(f: impl Fn([f64; 2]) -> f64 + Send + Sync + 'static) -> Self {
        Self::Dirichlet(Arc::new(f))
    }

    pub fn neumann(f: impl Fn([f64; 2]) -> f64 + Send + Sync + 'static) -> Self {
        Self::Neumann(Arc::new(f))
    }

    pub fn zero_dirichlet() -> Self {
        Self::dirichlet(|_| 0.0)
    }

    pub fn zero_neumann() -> Self {
        Self::neumann(|_| 0.0)
    }
}

impl fmt::Debug for FaceBc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dirichlet(_) => f.write_str("Dirichlet"),
            Self::Neumann(_) => f.write_str("Neumann"),
        }
    }
}

/// Per-face Dirichlet / Neumann conditions on a rectangular domain, indexed
/// `[dir][side]` with side 0 = low, 1 = high.
///
/// Dirichlet ghosts are extrapolated through the face value: linearly when the
/// field has one ghost layer, cubically (three interior cells + the face) when
/// it has two. Neumann ghosts are even reflections corrected by the normal
/// derivative.
#[derive(Debug, Clone)]
pub struct DomainBoundary {
    faces: [[FaceBc; 2]; SPACE_DIM],
}

impl DomainBoundary {
    pub fn uniform(bc: FaceBc) -> Self {
        Self {
            faces: [[bc.clone(), bc.clone()], [bc.clone(), bc]],
        }
    }

    pub fn zero_dirichlet() -> Self {
        Self::uniform(FaceBc::zero_dirichlet())
    }

    pub fn zero_neumann() -> Self {
        Self::uniform(FaceBc::zero_neumann())
    }

    pub fn with_face(mut self, dir: usize, high: bool, bc: FaceBc) -> Self {
        self.faces[dir][high as usize] = bc;
        self
    }

    pub fn face(&self, dir: usize, high: bool) -> &FaceBc {
        &self.faces[dir][high as usize]
    }
}

impl BoundaryPolicy for DomainBoundary {
    fn fill_domain_ghosts(&self, field: &mut LevelData, domain: &ProblemDomain, dx: f64, homogeneous: bool) {
        let ghost = field.ghost();
        if ghost == 0 {
            return;
        }
        field.patches_mut().par_iter_mut().for_each(|p| {
            for dir in 0..SPACE_DIM {
                for high in [false, true] {
                    let on_face = if high {
                        p.valid.hi(dir) == domain.rect.hi(dir)
                    } else {
                        p.valid.lo(dir) == domain.rect.lo(dir)
                    };
                    if on_face {
                        self.fill_face(p, domain, dir, high, ghost, dx, homogeneous);
                    }
                }
            }
        });
    }
}

impl DomainBoundary {
    /// Extrapolation reads the cells `at(k)` inward from the face. Those past
    /// the patch's own valid box are taken from its ghosts, which the overlap
    /// exchange has already filled, so the result does not depend on where
    /// the patch boundaries fall.
    fn fill_face(
        &self,
        p: &mut PatchData,
        domain: &ProblemDomain,
        dir: usize,
        high: bool,
        ghost: usize,
        dx: f64,
        homogeneous: bool,
    ) {
        let (ei, ej) = unit(dir);
        // Step from the face outward, and the first interior cell row.
        let out = if high { 1 } else { -1 };
        let face_cells = p.valid.adjacent_strip(dir, high, 1);
        let first_interior = if high { p.valid.hi(dir) - 1 } else { p.valid.lo(dir) };
        let bc = self.face(dir, high);
        let grown = p.grown;
        let readable = |(i, j): (i64, i64)| grown.contains(i, j) && domain.contains(i, j);

        for (gi, gj) in face_cells.cells() {
            // Tangential cell index and the interior cell adjacent to the face.
            let (ti, tj) = if dir == 0 { (first_interior, gj) } else { (gi, first_interior) };
            let at = |k: i64| (ti - out * k * ei, tj - out * k * ej);
            let ghost_at = |k: i64| (ti + out * k * ei, tj + out * k * ej);

            let face_pos = {
                let (ci, cj) = (ti as f64 + 0.5, tj as f64 + 0.5);
                let n = if high { (first_interior + 1) as f64 } else { first_interior as f64 };
                if dir == 0 {
                    [n * dx, cj * dx]
                } else {
                    [ci * dx, n * dx]
                }
            };

            for c in 0..p.ncomp {
                match bc {
                    FaceBc::Dirichlet(f) => {
                        let v = if homogeneous { 0.0 } else { f(face_pos) };
                        let (i0, j0) = at(0);
                        let phi0 = p.get(i0, j0, c);
                        if ghost >= 2 && readable(at(1)) && readable(at(2)) {
                            let (i1, j1) = at(1);
                            let (i2, j2) = at(2);
                            let phi1 = p.get(i1, j1, c);
                            let phi2 = p.get(i2, j2, c);
                            let g1 = (16.0 * v - 15.0 * phi0 + 5.0 * phi1 - phi2) / 5.0;
                            let g2 = (64.0 * v - 90.0 * phi0 + 40.0 * phi1 - 9.0 * phi2) / 5.0;
                            let (a, b) = ghost_at(1);
                            p.set(a, b, c, g1);
                            let (a, b) = ghost_at(2);
                            p.set(a, b, c, g2);
                            for k in 3..=ghost as i64 {
                                let (a, b) = ghost_at(k);
                                p.set(a, b, c, g2);
                            }
                        } else {
                            // Linear through the face value and the first interior cell.
                            for k in 1..=ghost as i64 {
                                let (a, b) = ghost_at(k);
                                p.set(a, b, c, v + (v - phi0) * (2 * k - 1) as f64);
                            }
                        }
                    }
                    FaceBc::Neumann(f) => {
                        let q = if homogeneous { 0.0 } else { f(face_pos) };
                        for k in 1..=ghost as i64 {
                            let mirror = (0..k).rev().find(|&m| readable(at(m))).unwrap_or(0);
                            let (mi, mj) = at(mirror);
                            let (a, b) = ghost_at(k);
                            let v = p.get(mi, mj, c) + (2 * k - 1) as f64 * dx * q;
                            p.set(a, b, c, v);
                        }
                    }
                }
            }
        }
    }
}
