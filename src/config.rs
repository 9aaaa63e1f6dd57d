// src/config.rs

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

use crate::error::{HelmholtzError, HelmholtzResult};

/// Discretisation order of the Laplacian stencil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccuracyOrder {
    Second,
    Fourth,
}

impl AccuracyOrder {
    pub fn from_order(order: usize) -> HelmholtzResult<Self> {
        match order {
            2 => Ok(Self::Second),
            4 => Ok(Self::Fourth),
            other => Err(HelmholtzError::UnsupportedOrder(other)),
        }
    }

    #[inline]
    pub fn order(self) -> usize {
        match self {
            Self::Second => 2,
            Self::Fourth => 4,
        }
    }

    /// Ghost width the stencil needs: order/2.
    #[inline]
    pub fn n_ghost(self) -> usize {
        self.order() / 2
    }
}

/// Smoother used by `relax`. Fixed for the lifetime of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelaxMode {
    /// Mode 0: point Jacobi with the cached inverse diagonal.
    PointJacobi,
    /// Mode 1: red-black Gauss–Seidel.
    GaussSeidelRedBlack,
}

impl RelaxMode {
    pub fn parse(s: &str) -> HelmholtzResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "jacobi" | "point_jacobi" | "pj" => Ok(Self::PointJacobi),
            "1" | "gsrb" | "rbgs" | "red_black" | "gauss_seidel" => Ok(Self::GaussSeidelRedBlack),
            _ => Err(HelmholtzError::UnknownRelaxMode(s.to_string())),
        }
    }

    /// Numeric mode id (0 = Jacobi, 1 = GSRB).
    pub fn from_id(id: i32) -> HelmholtzResult<Self> {
        match id {
            0 => Ok(Self::PointJacobi),
            1 => Ok(Self::GaussSeidelRedBlack),
            other => Err(HelmholtzError::UnknownRelaxMode(other.to_string())),
        }
    }
}

/// Storage kind of the fields an operator works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Centering {
    CellAveraged,
    FaceCentered,
}

/// How same-level ghost overlap is exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeMode {
    /// Every ghost cell covered by a sibling patch, corners included.
    Full,
    /// Face-adjacent ghost strips only; corner ghosts are left alone.
    FacesOnly,
}

impl ExchangeMode {
    pub fn parse(s: &str) -> HelmholtzResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "full" => Ok(Self::Full),
            "1" | "faces" | "faces_only" | "no_overlap" => Ok(Self::FacesOnly),
            _ => Err(HelmholtzError::UnknownExchangeMode(s.to_string())),
        }
    }
}

/// Immutable construction-time configuration of a `HelmholtzOp`.
///
/// `alpha`/`beta` here are only the initial coefficients; the operator
/// exposes `set_alpha_and_beta` for later changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HelmholtzConfig {
    pub order: AccuracyOrder,
    pub relax_mode: RelaxMode,
    pub centering: Centering,
    pub exchange_mode: ExchangeMode,

    /// Jacobi damping weight w in `phi += w * (rhs - L phi) / D` (0 < w <= 1).
    /// The fourth-order sweep only converges for w below about 0.9.
    pub jacobi_weight: f64,

    /// Coarse-fine interpolation is skipped when every domain extent is
    /// `<= refToCoarser * min_coarsest_domain_size`.
    pub min_coarsest_domain_size: usize,

    pub alpha: f64,
    pub beta: f64,
}

impl Default for HelmholtzConfig {
    fn default() -> Self {
        Self {
            order: AccuracyOrder::Fourth,
            relax_mode: RelaxMode::PointJacobi,
            centering: Centering::CellAveraged,
            exchange_mode: ExchangeMode::Full,
            jacobi_weight: 0.5,
            min_coarsest_domain_size: 8,
            alpha: 0.0,
            beta: 1.0,
        }
    }
}

impl HelmholtzConfig {
    /// Second-order defaults: GSRB is the usual smoother at this order.
    pub fn second_order() -> Self {
        Self {
            order: AccuracyOrder::Second,
            relax_mode: RelaxMode::GaussSeidelRedBlack,
            ..Self::default()
        }
    }

    pub fn with_coefficients(mut self, alpha: f64, beta: f64) -> Self {
        self.alpha = alpha;
        self.beta = beta;
        self
    }

    pub fn validate(&self) -> HelmholtzResult<()> {
        if !(self.jacobi_weight > 0.0 && self.jacobi_weight <= 1.0) {
            return Err(HelmholtzError::InvalidConfig(format!(
                "jacobi_weight must lie in (0, 1], got {}",
                self.jacobi_weight
            )));
        }
        if self.min_coarsest_domain_size == 0 {
            return Err(HelmholtzError::InvalidConfig(
                "min_coarsest_domain_size must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Defaults overridden by environment variables, for experimenting
    /// without plumbing options through a driver:
    ///
    ///   HELMHOLTZ_ORDER=2|4
    ///   HELMHOLTZ_RELAX=jacobi|gsrb|0|1
    ///   HELMHOLTZ_EXCHANGE=full|faces
    ///   HELMHOLTZ_JACOBI_WEIGHT=<f64>
    ///   HELMHOLTZ_MIN_COARSEST=<cells>
    ///
    /// Unparseable values are configuration errors rather than silently ignored.
    pub fn from_env() -> HelmholtzResult<Self> {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().map(|s| s.trim().to_string())
        }
        fn parse<T: std::str::FromStr>(name: &str, s: &str) -> HelmholtzResult<T> {
            s.parse::<T>()
                .map_err(|_| HelmholtzError::InvalidConfig(format!("{name}={s:?}")))
        }

        let mut cfg = Self::default();

        if let Some(v) = var("HELMHOLTZ_ORDER") {
            cfg.order = AccuracyOrder::from_order(parse("HELMHOLTZ_ORDER", &v)?)?;
        }
        if let Some(v) = var("HELMHOLTZ_RELAX") {
            cfg.relax_mode = RelaxMode::parse(&v)?;
        }
        if let Some(v) = var("HELMHOLTZ_EXCHANGE") {
            cfg.exchange_mode = ExchangeMode::parse(&v)?;
        }
        if let Some(v) = var("HELMHOLTZ_JACOBI_WEIGHT") {
            cfg.jacobi_weight = parse("HELMHOLTZ_JACOBI_WEIGHT", &v)?;
        }
        if let Some(v) = var("HELMHOLTZ_MIN_COARSEST") {
            cfg.min_coarsest_domain_size = parse("HELMHOLTZ_MIN_COARSEST", &v)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Record the configuration of a run as `helmholtz.json` in `out_dir`.
    pub fn write_to_dir(&self, out_dir: &Path) -> std::io::Result<()> {
        let path = out_dir.join("helmholtz.json");
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_orders_two_and_four_are_accepted() {
        assert_eq!(AccuracyOrder::from_order(2), Ok(AccuracyOrder::Second));
        assert_eq!(AccuracyOrder::Fourth.n_ghost(), 2);
        assert_eq!(
            AccuracyOrder::from_order(3),
            Err(HelmholtzError::UnsupportedOrder(3))
        );
    }

    #[test]
    fn relax_mode_parsing() {
        assert_eq!(RelaxMode::parse("GSRB"), Ok(RelaxMode::GaussSeidelRedBlack));
        assert_eq!(RelaxMode::from_id(0), Ok(RelaxMode::PointJacobi));
        assert!(matches!(
            RelaxMode::from_id(7),
            Err(HelmholtzError::UnknownRelaxMode(_))
        ));
        assert!(RelaxMode::parse("sor").is_err());
    }

    #[test]
    fn validate_rejects_bad_weight() {
        let mut cfg = HelmholtzConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.jacobi_weight = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = HelmholtzConfig::second_order().with_coefficients(1.0, -0.5);
        let s = serde_json::to_string(&cfg).unwrap();
        let back: HelmholtzConfig = serde_json::from_str(&s).unwrap();
        assert_eq!(back, cfg);
    }
}
