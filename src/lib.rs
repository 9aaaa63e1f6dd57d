// src/lib.rs

pub mod amr;
pub mod boundary;
pub mod coarse_fine;
pub mod config;
pub mod error;
pub mod factory;
pub mod flux_register;
pub mod io;
pub mod operator;
pub mod stencil;

pub use amr::{LevelData, PatchData, PatchLayout, ProblemDomain, Rect2i};
pub use boundary::{BoundaryPolicy, DomainBoundary, FaceBc};
pub use coarse_fine::{CoarseFineInterp, CoarseFineTransfer};
pub use config::{AccuracyOrder, Centering, ExchangeMode, HelmholtzConfig, RelaxMode};
pub use error::{HelmholtzError, HelmholtzResult};
pub use factory::HelmholtzOpFactory;
pub use flux_register::FluxRegister;
pub use operator::{AmrLevelOp, HelmholtzOp, LevelGeometry, LevelLink, LinearOp, MultigridLevelOp, Smoother};
