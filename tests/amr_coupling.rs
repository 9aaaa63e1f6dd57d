// tests/amr_coupling.rs
//
// Two-level AMR coupling through the operator factory:
// - Refluxing a linear field changes nothing: coarse and fine fluxes agree.
// - A fine level held at 1 over a coarse level held at 0 corrects exactly the coarse
//   cells next to the fine region, by the hand-computed flux mismatch.
// - AMR norm, residual update, restriction and prolongation agree with their
//   definitions in terms of the single-level pieces.
// - A fine domain that is too small never consults the coarse level.
//
// Hierarchy: coarse 16x16 (dx = 1/16, 8x8 patches) with the coarse cells [4, 12)^2
// refined, at ratio 2 and at ratio 4, the fine region split into two patches side by side.

use std::sync::Arc;

use helmholtz_amr::{
    AccuracyOrder, AmrLevelOp, DomainBoundary, FaceBc, HelmholtzConfig, HelmholtzOp,
    HelmholtzOpFactory, LevelData, LinearOp, PatchLayout, ProblemDomain, Rect2i,
};

const N: usize = 16;

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol * (1.0 + a.abs().max(b.abs()))
}

fn max_diff(a: &LevelData, b: &LevelData) -> f64 {
    let mut d = LevelData::new_like(a);
    d.axby(a, b, 1.0, -1.0);
    d.max_norm()
}

const RATIOS: [usize; 2] = [2, 4];

fn factory(cfg: HelmholtzConfig, bc: DomainBoundary) -> HelmholtzOpFactory {
    factory_with_ratio(cfg, bc, 2)
}

fn factory_with_ratio(cfg: HelmholtzConfig, bc: DomainBoundary, ratio: usize) -> HelmholtzOpFactory {
    let r = ratio as i64;
    let fine = PatchLayout::new(vec![
        Rect2i::new(4 * r, 4 * r, 4 * ratio, 8 * ratio),
        Rect2i::new(8 * r, 4 * r, 4 * ratio, 8 * ratio),
    ]);
    hierarchy(cfg, bc, fine, ratio)
}

fn hierarchy(cfg: HelmholtzConfig, bc: DomainBoundary, fine: PatchLayout, ratio: usize) -> HelmholtzOpFactory {
    let domain = ProblemDomain::from_size(N, N);
    let base = Arc::new(PatchLayout::tiled(domain.rect, 8));
    HelmholtzOpFactory::define(
        cfg,
        domain,
        1.0 / N as f64,
        vec![base, Arc::new(fine)],
        vec![ratio],
        Arc::new(bc),
        1,
    )
    .unwrap()
}

fn with_order(order: AccuracyOrder) -> HelmholtzConfig {
    HelmholtzConfig {
        order,
        ..HelmholtzConfig::default()
    }
}

fn fill_cell_centres(field: &mut LevelData, dx: f64, f: impl Fn(f64, f64) -> f64 + Sync + Send) {
    field.fill_valid_with(|i, j, _| f((i as f64 + 0.5) * dx, (j as f64 + 0.5) * dx));
}

#[test]
fn linear_fields_need_no_flux_correction() {
    let linear = |x: f64, y: f64| 1.0 + 2.0 * x - 3.0 * y;
    for (order, ratio) in [AccuracyOrder::Second, AccuracyOrder::Fourth]
        .into_iter()
        .flat_map(|o| RATIOS.map(|r| (o, r)))
    {
        let bc = DomainBoundary::uniform(FaceBc::dirichlet(move |p| linear(p[0], p[1])));
        let f = factory_with_ratio(with_order(order).with_coefficients(0.5, 1.0), bc, ratio);
        let mut ops = f.amr_ops().unwrap();
        let (coarse_ops, fine_ops) = ops.split_at_mut(1);
        let (coarse, fine) = (&mut coarse_ops[0], &fine_ops[0]);

        let mut phi = coarse.new_field();
        fill_cell_centres(&mut phi, coarse.dx(), linear);
        let mut phi_fine = fine.new_field();
        fill_cell_centres(&mut phi_fine, fine.dx(), linear);

        let mut composite = coarse.new_field();
        coarse.amr_operator_nc(&mut composite, Some((&mut phi_fine, fine)), &mut phi, false);
        let mut level_only = coarse.new_field();
        coarse.apply_op_i(&mut level_only, &mut phi, false);

        let d = max_diff(&composite, &level_only);
        assert!(d < 1e-9, "{order:?}, ratio {ratio}: reflux changed a linear field by {d}");
    }
}

#[test]
fn reflux_corrects_cells_next_to_the_fine_region() {
    for ratio in RATIOS {
        let f = factory_with_ratio(HelmholtzConfig::second_order(), DomainBoundary::zero_dirichlet(), ratio);
        let mut ops = f.amr_ops().unwrap();
        let (coarse_ops, fine_ops) = ops.split_at_mut(1);
        let (coarse, fine) = (&mut coarse_ops[0], &fine_ops[0]);
        assert!(fine.has_coarse_fine_interp());

        let mut phi = coarse.new_field();
        let mut phi_fine = fine.new_field();
        phi_fine.set_val(1.0);

        let mut lofphi = coarse.new_field();
        coarse.amr_operator_nc(&mut lofphi, Some((&mut phi_fine, fine)), &mut phi, false);

        // Fine ghost across the interface: 1 + (0 - 1) * 2/(r+1), so every fine
        // face carries flux -(2/(r+1)) / h_f. The r fine faces of a coarse face
        // are averaged, then divided by h_c = 1/16.
        let r = ratio as f64;
        let h_f = 1.0 / (N as f64 * r);
        let expect = 2.0 / (r + 1.0) / h_f * N as f64;
        for (i, j) in [(12, 6), (3, 6), (6, 12), (6, 3), (12, 4), (3, 11)] {
            let v = lofphi.value_at(i, j, 0).unwrap();
            assert!(approx_eq(v, expect, 1e-12), "ratio {ratio}, ({i},{j}): {v} vs {expect}");
        }
        // Covered cells, diagonal neighbours and far cells see no correction.
        for (i, j) in [(6, 6), (12, 12), (3, 3), (0, 0), (15, 8)] {
            assert_eq!(lofphi.value_at(i, j, 0), Some(0.0), "ratio {ratio}, ({i},{j})");
        }
        assert_eq!(coarse.flux_register().map(|r| r.n_records()), Some(32));
    }
}

#[test]
fn reflux_fills_fine_boundary_ghosts_in_the_callers_mode() {
    // Fine patch on the low x face of the domain, Dirichlet value 5 there.
    let fine_layout = PatchLayout::new(vec![Rect2i::new(0, 8, 8, 16)]);
    let bc = || DomainBoundary::uniform(FaceBc::dirichlet(|_| 5.0));
    for (homogeneous, expect) in [(true, 0.0), (false, 10.0)] {
        let f = hierarchy(HelmholtzConfig::second_order(), bc(), fine_layout.clone(), 2);
        let mut ops = f.amr_ops().unwrap();
        let (coarse_ops, fine_ops) = ops.split_at_mut(1);
        let (coarse, fine) = (&mut coarse_ops[0], &fine_ops[0]);

        let mut phi = coarse.new_field();
        let mut phi_fine = fine.new_field();
        let mut lofphi = coarse.new_field();
        coarse.amr_operator_nc(&mut lofphi, Some((&mut phi_fine, fine)), &mut phi, homogeneous);

        // Linear extrapolation through 0 in the interior: 2 * v - 0.
        for j in [8, 15, 23] {
            assert_eq!(
                phi_fine.patch(0).get(-1, j, 0),
                expect,
                "homogeneous = {homogeneous}, row {j}"
            );
        }
    }
}

#[test]
fn amr_norm_ignores_covered_cells() {
    let f = factory(HelmholtzConfig::default(), DomainBoundary::zero_dirichlet());
    let ops = f.amr_ops().unwrap();
    let (coarse, fine) = (&ops[0], &ops[1]);

    let mut res = coarse.new_field();
    res.fill_valid_with(|i, j, _| if (i, j) == (6, 6) { -5.0 } else { 1.0 });
    let fine_res = fine.new_field();

    assert_eq!(coarse.amr_norm(&res, None, 2, 0), 5.0);
    assert_eq!(coarse.amr_norm(&res, Some(&fine_res), 2, 0), 1.0);
    // The input itself is untouched.
    assert_eq!(res.value_at(6, 6, 0), Some(-5.0));
}

#[test]
fn update_residual_matches_no_finer_residual() {
    let f = factory(HelmholtzConfig::default(), DomainBoundary::zero_dirichlet());
    let ops = f.amr_ops().unwrap();
    let (coarse, fine) = (&ops[0], &ops[1]);

    let mut res = fine.new_field();
    res.fill_valid_with(|i, j, _| ((i * 7 + j * 3) % 11) as f64 - 5.0);
    let mut corr = fine.new_field();
    fill_cell_centres(&mut corr, fine.dx(), |x, y| (x * 9.0).sin() * (y * 4.0).cos());
    let mut coarse_corr = coarse.new_field();
    fill_cell_centres(&mut coarse_corr, coarse.dx(), |x, y| x * x - y);

    let mut expect = fine.new_field();
    fine.amr_residual_nf(&mut expect, &mut corr, &coarse_corr, &res, true);

    fine.amr_update_residual(&mut res, &mut corr, &coarse_corr);
    let d = max_diff(&res, &expect);
    assert!(d < 1e-9, "update differs by {d}");
}

#[test]
fn amr_prolong_injects_the_covering_coarse_value() {
    for ratio in RATIOS {
        let f = factory_with_ratio(HelmholtzConfig::default(), DomainBoundary::zero_dirichlet(), ratio);
        let ops = f.amr_ops().unwrap();
        let (coarse, fine) = (&ops[0], &ops[1]);
        assert_eq!(fine.ref_to_coarser(), ratio);

        let mut coarse_corr = coarse.new_field();
        coarse_corr.fill_valid_with(|i, j, _| (i + 100 * j) as f64);
        let mut corr = fine.new_field();
        corr.set_val(0.5);
        fine.amr_prolong(&mut corr, &coarse_corr);

        let r = ratio as i64;
        let (lo, hi) = (4 * r, 12 * r - 1);
        for (i, j) in [(lo, lo), (lo + 1, lo + 5), (8 * r, hi), (hi, lo), (hi, hi)] {
            let expect = 0.5 + (i / r + 100 * (j / r)) as f64;
            assert_eq!(corr.value_at(i, j, 0), Some(expect), "ratio {ratio}, ({i},{j})");
        }
    }
}

#[test]
fn amr_restrict_averages_under_the_fine_region_only() {
    for ratio in RATIOS {
        let f = factory_with_ratio(HelmholtzConfig::default(), DomainBoundary::zero_dirichlet(), ratio);
        let ops = f.amr_ops().unwrap();
        let (coarse, fine) = (&ops[0], &ops[1]);

        let mut residual = fine.new_field();
        residual.fill_valid_with(|i, j, _| i as f64 + 0.25 * j as f64);
        let mut correction = fine.new_field();
        let coarse_corr = coarse.new_field();

        let mut skipped = coarse.new_field();
        skipped.set_val(-7.0);
        fine.amr_restrict(&mut skipped, &residual, &mut correction, &coarse_corr, true);
        // Average over fine columns [5r, 6r) and rows [6r, 7r): ratio^2 cells.
        let r = ratio as f64;
        let mean_i = 5.0 * r + (r - 1.0) / 2.0;
        let mean_j = 6.0 * r + (r - 1.0) / 2.0;
        assert_eq!(skipped.value_at(5, 6, 0), Some(mean_i + 0.25 * mean_j), "ratio {ratio}");
        assert_eq!(skipped.value_at(0, 0, 0), Some(-7.0));
        assert_eq!(skipped.value_at(12, 6, 0), Some(-7.0));

        // With zero corrections the residual update is a no-op.
        let mut full = coarse.new_field();
        full.set_val(-7.0);
        fine.amr_restrict(&mut full, &residual, &mut correction, &coarse_corr, false);
        assert!(max_diff(&full, &skipped) < 1e-12, "ratio {ratio}");
    }
}

#[test]
fn cf_consistency_overwrites_the_covered_coarse_correction() {
    let f = factory(HelmholtzConfig::default(), DomainBoundary::zero_dirichlet());
    let ops = f.amr_ops().unwrap();
    let (coarse, fine) = (&ops[0], &ops[1]);

    let mut correction = fine.new_field();
    correction.set_val(2.0);
    let mut coarse_corr = coarse.new_field();
    coarse_corr.set_val(9.0);
    fine.enforce_cf_consistency(&mut coarse_corr, &correction);

    assert_eq!(coarse_corr.value_at(4, 4, 0), Some(2.0));
    assert_eq!(coarse_corr.value_at(11, 11, 0), Some(2.0));
    assert_eq!(coarse_corr.value_at(3, 4, 0), Some(9.0));
}

#[test]
fn small_fine_domain_ignores_the_coarse_level() {
    // Fine domain 16x16 <= 2 * 8: no coarse-fine interpolation.
    let domain = ProblemDomain::from_size(8, 8);
    let f = HelmholtzOpFactory::define(
        HelmholtzConfig::second_order(),
        domain,
        1.0 / 8.0,
        vec![
            Arc::new(PatchLayout::tiled(domain.rect, 8)),
            Arc::new(PatchLayout::new(vec![Rect2i::new(4, 4, 8, 8)])),
        ],
        vec![2],
        Arc::new(DomainBoundary::zero_dirichlet()),
        1,
    )
    .unwrap();
    let fine: HelmholtzOp = f.amr_new_op(1).unwrap();
    assert!(!fine.has_coarse_fine_interp());

    let mut phi = fine.new_field();
    fill_cell_centres(&mut phi, fine.dx(), |x, y| x * y);
    let mut coarse_phi = f.amr_new_op(0).unwrap().new_field();
    coarse_phi.set_val(100.0);

    let mut with_coarse = fine.new_field();
    fine.amr_operator_nf(&mut with_coarse, &mut phi, &coarse_phi, false);
    let mut level_only = fine.new_field();
    fine.apply_op_i(&mut level_only, &mut phi, false);
    assert_eq!(max_diff(&with_coarse, &level_only), 0.0);
}
