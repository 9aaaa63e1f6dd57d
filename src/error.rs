// src/error.rs

use thiserror::Error;

/// Configuration errors of the Helmholtz operator.
///
/// These indicate a setup mistake, never a runtime condition: construction
/// returns them as `Err`, and an operation that discovers one aborts through
/// [`fatal`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HelmholtzError {
    #[error("unsupported accuracy order {0} (expected 2 or 4)")]
    UnsupportedOrder(usize),

    #[error("unrecognized relaxation mode {0:?}")]
    UnknownRelaxMode(String),

    #[error("unrecognized exchange mode {0:?}")]
    UnknownExchangeMode(String),

    #[error("component count mismatch in {context}: expected {expected}, got {actual}")]
    ComponentMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("layout is not coarsenable by {ratio} ({context})")]
    NotCoarsenable { context: &'static str, ratio: usize },

    #[error("invalid refinement ratio {0}")]
    InvalidRefinementRatio(usize),

    #[error("ghost width {actual} is smaller than the {required} cells required by the stencil")]
    InsufficientGhosts { required: usize, actual: usize },

    #[error("{0} requires cell-averaged data")]
    RequiresCellAveraged(&'static str),

    #[error("reflux requested but no finer level was defined for this operator")]
    NoFinerLevel,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl HelmholtzError {
    pub fn component_mismatch(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::ComponentMismatch {
            context,
            expected,
            actual,
        }
    }
}

pub type HelmholtzResult<T> = Result<T, HelmholtzError>;

/// Abort the current operation on an unrecoverable configuration error.
#[cold]
#[track_caller]
pub fn fatal(err: HelmholtzError) -> ! {
    log::error!("[helmholtz] fatal: {err}");
    panic!("{err}");
}

/// Abort unless two component counts agree.
#[inline]
#[track_caller]
pub fn ensure_same_ncomp(context: &'static str, expected: usize, actual: usize) {
    if expected != actual {
        fatal(HelmholtzError::component_mismatch(context, expected, actual));
    }
}
