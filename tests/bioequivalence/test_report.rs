//! Tests for back-transformation, table assembly and the forest plot

use approx::assert_relative_eq;
use pkbe::prelude::*;
use pkbe::model::{Contrast, MarginalMean};
use pkbe::report::{gcv_percent, ratio_percent};
use pkbe::simulation::DEFAULT_SEED;

fn synthetic(estimate: f64, residual_sd: f64) -> ModelResult {
    let mean = |treatment, estimate: f64| MarginalMean {
        treatment,
        estimate,
        se: 0.05,
        df: 14.0,
        lower: estimate - 0.09,
        upper: estimate + 0.09,
    };
    ModelResult {
        parameter: Parameter::Cmax,
        form: ModelForm::CrossoverFixed,
        confidence_level: 0.90,
        n_observations: 32,
        n_subjects: 16,
        means: vec![
            mean(Treatment::Reference, 5.3),
            mean(Treatment::Test, 5.3 + estimate),
        ],
        contrast: Contrast {
            estimate,
            se: 0.04,
            df: 14.0,
            lower: estimate - 0.07,
            upper: estimate + 0.07,
            t_ratio: estimate / 0.04,
            p_value: 1.0,
        },
        residual_sd,
        variance: VarianceComponents::Residual { sigma: residual_sd },
        normality: None,
        residuals: Vec::new(),
    }
}

#[test]
fn zero_contrast_is_exactly_100_percent() {
    let bt = back_transform(&synthetic(0.0, 0.2));
    assert_eq!(bt.ratio, 100.0);
    assert_relative_eq!(bt.lower * bt.upper, 100.0 * 100.0, max_relative = 1e-12);
}

#[test]
fn back_transform_inverts_log_scale() {
    let result = synthetic(-0.0513, 0.2);
    let bt = back_transform(&result);
    for (gm, mm) in bt.means.iter().zip(&result.means) {
        assert_eq!(gm.treatment, mm.treatment);
        assert_relative_eq!(gm.adj_gmean.ln(), mm.estimate, max_relative = 1e-14);
        assert_relative_eq!(gm.adj_gse.ln(), mm.se, max_relative = 1e-12);
    }
    assert_relative_eq!((bt.ratio / 100.0).ln(), -0.0513, max_relative = 1e-12);
    assert_relative_eq!(bt.gse, 0.04f64.exp(), max_relative = 1e-14);
    assert_relative_eq!(bt.gcv, (0.04f64.exp() - 1.0).sqrt() * 100.0, max_relative = 1e-12);
}

#[test]
fn back_transform_is_idempotent() {
    let result = synthetic(0.1, 0.3);
    assert_eq!(back_transform(&result), back_transform(&result));
}

#[test]
fn gcv_is_never_negative() {
    for i in 0..200 {
        let sd = i as f64 * 0.01;
        assert!(gcv_percent(sd) >= 0.0);
    }
    assert_eq!(ratio_percent(0.0), 100.0);
}

#[test]
fn verdict_uses_the_80_125_limits() {
    assert!(back_transform(&synthetic(0.0, 0.2)).is_bioequivalent());
    assert!(!back_transform(&synthetic(0.25, 0.2)).is_bioequivalent());
}

#[test]
fn table_first_row_rule_on_fitted_data() {
    let balanced = simulate_crossover(16, DEFAULT_SEED).unwrap();
    let data = drop_period(&balanced, &ImbalanceSpec::default()).unwrap();
    let results = fit_all(&data, &Parameter::ALL, ModelKind::Fixed, &FitOptions::default()).unwrap();
    let bt: Vec<BackTransformed> = results.iter().map(back_transform).collect();
    let table = assemble(&bt, &data, &EndpointGroups::default());

    assert_eq!(table.len(), 9);
    for parameter in Parameter::ALL {
        let block = table.block(parameter);
        assert_eq!(block.len(), 3);
        assert!(block[0].is_header());
        assert!(block[0].adj_gmean.is_empty() && block[0].ratio.is_empty());
        assert_eq!(block[1].treatment, "R");
        assert_eq!(block[2].treatment, "T");
        assert!(block[1].has_ratio());
        assert!(!block[2].has_ratio());
        assert!(block[2].lower.is_empty() && block[2].gcv.is_empty());

        // Subjects 5 and 6 miss period 2, which holds R for one sequence
        // and T for the other
        let n_r: usize = block[1].n.parse().unwrap();
        let n_t: usize = block[2].n.parse().unwrap();
        assert_eq!(n_r + n_t, 30);

        let decimals = |s: &str| s.split('.').nth(1).map_or(0, str::len);
        assert_eq!(decimals(&block[1].adj_gmean), 2);
        assert_eq!(decimals(&block[1].ratio), 2);
        assert_eq!(decimals(&block[1].gcv), 1);
    }
    assert_eq!(table.block(Parameter::AUCINF_pred)[0].group, "Secondary endpoint");
    assert_eq!(table.block(Parameter::Cmax)[0].group, "Primary endpoints");
}

#[test]
fn forest_plot_mirrors_back_transformed_values() {
    let bt = vec![
        back_transform(&synthetic(0.0, 0.2)),
        back_transform(&synthetic(0.3, 0.2)),
    ];
    let plot = ForestPlot::from_results(&bt, &EndpointGroups::default());
    assert_eq!(plot.points.len(), 2);
    assert_eq!(plot.points[0].ratio, bt[0].ratio);
    assert!(plot.points[0].bioequivalent);
    assert!(!plot.points[1].bioequivalent);
    assert_eq!(plot.limits, (80.0, 125.0));
}

#[test]
fn fixed_and_mixed_tables_compare_closely_when_balanced() {
    let data = simulate_crossover(16, DEFAULT_SEED).unwrap();
    let fixed: Vec<BackTransformed> =
        fit_all(&data, &Parameter::ALL, ModelKind::Fixed, &FitOptions::default())
            .unwrap()
            .iter()
            .map(back_transform)
            .collect();
    let mixed: Vec<BackTransformed> =
        fit_all(&data, &Parameter::ALL, ModelKind::Mixed, &FitOptions::default())
            .unwrap()
            .iter()
            .map(back_transform)
            .collect();
    let comparisons = compare_tables(&fixed, &mixed);
    assert_eq!(comparisons.len(), 3);
    for c in comparisons {
        assert!(c.max_ratio_shift() < 1e-2, "{c:?}");
        assert!(c.same_verdict);
    }
}
