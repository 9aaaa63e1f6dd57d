// src/stencil.rs
//
// Discrete Helmholtz stencils on one patch.
//
// Both kernels are written in flux form, so that
//
//   L(phi)_i = alpha * phi_i + sum_d (F_d(i + 1/2) - F_d(i - 1/2)) / h
//
// holds exactly for the face fluxes returned by `face_flux`. This is what makes
// refluxing at coarse-fine interfaces conservative.

use std::fmt::Debug;

use crate::amr::patch::PatchData;
use crate::amr::rect::Rect2i;
use crate::config::AccuracyOrder;

pub const SPACE_DIM: usize = 2;

/// Face-centred flux along one direction over a patch.
///
/// Face `(i, j)` is the low face of cell `(i, j)` along `dir`, i.e. the face
/// between cell `(i, j) - e_dir` and `(i, j)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceFlux {
    pub dir: usize,
    pub faces: Rect2i,
    pub ncomp: usize,
    pub data: Vec<f64>,
}

impl FaceFlux {
    /// Zero flux over all faces of `cells` normal to `dir`.
    pub fn zeros(cells: Rect2i, dir: usize, ncomp: usize) -> Self {
        let faces = if dir == 0 {
            Rect2i::new(cells.i0, cells.j0, cells.nx + 1, cells.ny)
        } else {
            Rect2i::new(cells.i0, cells.j0, cells.nx, cells.ny + 1)
        };
        Self {
            dir,
            faces,
            ncomp,
            data: vec![0.0; faces.n_cells() * ncomp],
        }
    }

    #[inline]
    fn idx(&self, i: i64, j: i64, c: usize) -> usize {
        debug_assert!(self.faces.contains(i, j), "face ({i},{j}) outside {:?}", self.faces);
        let li = (i - self.faces.i0) as usize;
        let lj = (j - self.faces.j0) as usize;
        c * self.faces.n_cells() + lj * self.faces.nx + li
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
}

/// Order-specific stencil evaluation.
///
/// Implementations only read `phi` inside the valid box grown by `n_ghost()`
/// and never look at corner ghosts.
pub trait StencilKernel: Debug + Send + Sync {
    fn order(&self) -> AccuracyOrder;

    #[inline]
    fn n_ghost(&self) -> usize {
        self.order().n_ghost()
    }

    /// Coefficient of `phi_i` in `L(phi)_i`.
    fn diagonal(&self, alpha: f64, beta: f64, dx: f64) -> f64;

    /// Undivided difference `phi(face) * h` approximating `h * dphi/dx_dir`
    /// at the low face of cell (i,j) along `dir`.
    fn face_difference(&self, phi: &PatchData, i: i64, j: i64, c: usize, dir: usize) -> f64;

    /// `L(phi)` at one valid cell.
    fn apply_at(&self, phi: &PatchData, i: i64, j: i64, c: usize, alpha: f64, beta: f64, dx: f64) -> f64 {
        let mut div = 0.0;
        for dir in 0..SPACE_DIM {
            let (ei, ej) = unit(dir);
            div += self.face_difference(phi, i + ei, j + ej, c, dir)
                - self.face_difference(phi, i, j, c, dir);
        }
        alpha * phi.get(i, j, c) + beta * div / (dx * dx)
    }

    /// `out = L(phi)` over the valid box of `out`; ghosts of `out` are untouched.
    fn apply(&self, out: &mut PatchData, phi: &PatchData, alpha: f64, beta: f64, dx: f64) {
        debug_assert_eq!(out.valid, phi.valid);
        let valid = out.valid;
        for c in 0..out.ncomp {
            for (i, j) in valid.cells() {
                out.set(i, j, c, self.apply_at(phi, i, j, c, alpha, beta, dx));
            }
        }
    }

    /// `scale * face_difference` on every face of `phi.valid` normal to `dir`.
    fn face_flux(&self, phi: &PatchData, dir: usize, scale: f64) -> FaceFlux {
        let mut flux = FaceFlux::zeros(phi.valid, dir, phi.ncomp);
        let faces = flux.faces;
        for c in 0..phi.ncomp {
            for (i, j) in faces.cells() {
                flux.set(i, j, c, scale * self.face_difference(phi, i, j, c, dir));
            }
        }
        flux
    }
}

#[inline]
pub(crate) fn unit(dir: usize) -> (i64, i64) {
    if dir == 0 {
        (1, 0)
    } else {
        (0, 1)
    }
}

/// 5-point stencil.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecondOrder;

impl StencilKernel for SecondOrder {
    fn order(&self) -> AccuracyOrder {
        AccuracyOrder::Second
    }

    fn diagonal(&self, alpha: f64, beta: f64, dx: f64) -> f64 {
        alpha - 2.0 * SPACE_DIM as f64 * beta / (dx * dx)
    }

    #[inline]
    fn face_difference(&self, phi: &PatchData, i: i64, j: i64, c: usize, dir: usize) -> f64 {
        let (ei, ej) = unit(dir);
        phi.get(i, j, c) - phi.get(i - ei, j - ej, c)
    }
}

/// Fourth-order stencil `[-1, 16, -30, 16, -1] / 12` per axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct FourthOrder;

impl StencilKernel for FourthOrder {
    fn order(&self) -> AccuracyOrder {
        AccuracyOrder::Fourth
    }

    fn diagonal(&self, alpha: f64, beta: f64, dx: f64) -> f64 {
        alpha - 30.0 * SPACE_DIM as f64 * beta / (12.0 * dx * dx)
    }

    #[inline]
    fn face_difference(&self, phi: &PatchData, i: i64, j: i64, c: usize, dir: usize) -> f64 {
        let (ei, ej) = unit(dir);
        let p1 = phi.get(i + ei, j + ej, c);
        let p0 = phi.get(i, j, c);
        let m1 = phi.get(i - ei, j - ej, c);
        let m2 = phi.get(i - 2 * ei, j - 2 * ej, c);
        (-p1 + 15.0 * p0 - 15.0 * m1 + m2) / 12.0
    }
}

pub fn kernel_for(order: AccuracyOrder) -> Box<dyn StencilKernel> {
    match order {
        AccuracyOrder::Second => Box::new(SecondOrder),
        AccuracyOrder::Fourth => Box::new(FourthOrder),
    }
}
