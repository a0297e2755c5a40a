//! Tests for the model fitter on simulated data

use approx::{assert_abs_diff_eq, assert_relative_eq};
use pkbe::prelude::*;
use pkbe::simulation::DEFAULT_SEED;

fn options() -> FitOptions {
    FitOptions::default()
}

#[test]
fn fixed_and_mixed_crossover_agree_on_balanced_data() {
    let data = simulate_crossover(16, DEFAULT_SEED).unwrap();
    for parameter in Parameter::ALL {
        let fixed = fit(&data, parameter, ModelKind::Fixed, &options()).unwrap();
        let mixed = fit(&data, parameter, ModelKind::Mixed, &options()).unwrap();
        assert_eq!(fixed.form, ModelForm::CrossoverFixed);
        assert_eq!(mixed.form, ModelForm::CrossoverMixed);

        for treatment in Treatment::LEVELS {
            let a = fixed.mean(treatment).unwrap();
            let b = mixed.mean(treatment).unwrap();
            assert_abs_diff_eq!(a.estimate, b.estimate, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(
            fixed.contrast.estimate,
            mixed.contrast.estimate,
            epsilon = 1e-6
        );
        // Within-subject error and its 14 df are shared by both models
        assert_relative_eq!(fixed.contrast.se, mixed.contrast.se, max_relative = 1e-4);
        assert_eq!(fixed.contrast.df, 14.0);
        assert_relative_eq!(mixed.contrast.df, 14.0, max_relative = 1e-2);
    }
}

#[test]
fn marginal_means_are_raw_treatment_means_when_balanced() {
    let data = simulate_crossover(16, DEFAULT_SEED).unwrap();
    let result = fit(&data, Parameter::Cmax, ModelKind::Fixed, &options()).unwrap();
    for treatment in Treatment::LEVELS {
        let values: Vec<f64> = data
            .for_parameter(Parameter::Cmax)
            .iter()
            .filter(|o| o.treatment() == treatment)
            .map(|o| o.log_pk())
            .collect();
        let raw = values.iter().sum::<f64>() / values.len() as f64;
        assert_abs_diff_eq!(result.mean(treatment).unwrap().estimate, raw, epsilon = 1e-10);
    }
    let r = result.mean(Treatment::Reference).unwrap().estimate;
    let t = result.mean(Treatment::Test).unwrap().estimate;
    assert_abs_diff_eq!(result.contrast.estimate, t - r, epsilon = 1e-10);
}

#[test]
fn unbalanced_crossover_fits_with_both_kinds() {
    let balanced = simulate_crossover(16, DEFAULT_SEED).unwrap();
    let data = drop_period(&balanced, &ImbalanceSpec::default()).unwrap();
    let fixed = fit(&data, Parameter::AUC0_tz, ModelKind::Fixed, &options()).unwrap();
    let mixed = fit(&data, Parameter::AUC0_tz, ModelKind::Mixed, &options()).unwrap();

    assert_eq!(fixed.n_observations, 30);
    assert_eq!(mixed.n_subjects, 16);
    assert_eq!(fixed.residuals.len(), 30);
    // Subjects observed once carry no within-subject information in the
    // fixed model
    assert_eq!(fixed.contrast.df, 12.0);
    assert!(mixed.contrast.df > 10.0);
    assert!((fixed.contrast.estimate - mixed.contrast.estimate).abs() < 0.1);
    match mixed.variance {
        VarianceComponents::Subject { between, within } => {
            assert!(between > 0.0);
            assert_abs_diff_eq!(within, mixed.residual_sd, epsilon = 1e-12);
        }
        other => panic!("expected subject variance components, got {other:?}"),
    }
}

#[test]
fn fixed_sequence_models() {
    let data = simulate_fixed_sequence(12, DEFAULT_SEED).unwrap();
    let fixed = fit(&data, Parameter::Cmax, ModelKind::Fixed, &options()).unwrap();
    let mixed = fit(&data, Parameter::Cmax, ModelKind::Mixed, &options()).unwrap();
    assert_eq!(fixed.form, ModelForm::FixedSequenceFixed);
    assert_eq!(fixed.contrast.df, 11.0);
    assert_relative_eq!(mixed.contrast.df, 11.0, max_relative = 1e-2);
    assert_abs_diff_eq!(
        fixed.contrast.estimate,
        mixed.contrast.estimate,
        epsilon = 1e-6
    );
    assert!(fixed.contrast.lower < fixed.contrast.estimate);
    assert!(fixed.contrast.estimate < fixed.contrast.upper);
}

#[test]
fn parallel_gls_per_group_variances() {
    let data = simulate_parallel(80, DEFAULT_SEED, Allocation::default()).unwrap();
    let result = fit(&data, Parameter::Cmax, ModelKind::Fixed, &options()).unwrap();
    assert_eq!(result.form, ModelForm::ParallelGls);
    assert_eq!(result.n_subjects, 80);
    for mean in &result.means {
        assert_eq!(mean.df, 39.0);
    }
    assert!(result.contrast.df > 39.0 && result.contrast.df <= 78.0);

    let VarianceComponents::Group { reference, test } = result.variance else {
        panic!("expected group variances");
    };
    let pooled = ((reference * reference + test * test) / 2.0).sqrt();
    assert_relative_eq!(result.residual_sd, pooled, max_relative = 1e-12);
    assert_relative_eq!(
        result.contrast.se,
        (reference * reference / 40.0 + test * test / 40.0).sqrt(),
        max_relative = 1e-12
    );
}

#[test]
fn parallel_design_has_no_mixed_model() {
    let data = simulate_parallel(20, 1, Allocation::default()).unwrap();
    assert!(matches!(
        fit(&data, Parameter::Cmax, ModelKind::Mixed, &options()),
        Err(PkbeError::InvalidArgument(_))
    ));
}

#[test]
fn wider_level_gives_wider_interval() {
    let data = simulate_crossover(16, DEFAULT_SEED).unwrap();
    let narrow = fit(&data, Parameter::Cmax, ModelKind::Fixed, &options()).unwrap();
    let wide = fit(
        &data,
        Parameter::Cmax,
        ModelKind::Fixed,
        &options().with_confidence_level(0.95),
    )
    .unwrap();
    assert!(wide.contrast.lower < narrow.contrast.lower);
    assert!(wide.contrast.upper > narrow.contrast.upper);
    assert_eq!(wide.contrast.estimate, narrow.contrast.estimate);
}

#[test]
fn too_few_subjects_is_a_fit_error() {
    let data = simulate_crossover(2, DEFAULT_SEED).unwrap();
    for kind in [ModelKind::Fixed, ModelKind::Mixed] {
        assert!(matches!(
            fit(&data, Parameter::Cmax, kind, &options()),
            Err(PkbeError::FitError(FitError::InsufficientDf { .. }))
        ));
    }
}

#[test]
fn data_shape_is_checked_before_fitting() {
    let only_cmax = simulate_seeded(
        &SimulationOptions::new(Design::Crossover).with_parameters(vec![Parameter::Cmax]),
    )
    .unwrap();
    assert_eq!(only_cmax.len(), 32);
    assert!(matches!(
        fit(&only_cmax, Parameter::AUC0_tz, ModelKind::Fixed, &options()),
        Err(PkbeError::DataError(DataError::NoObservations { .. }))
    ));

    let reference_only = only_cmax.filter(|o| o.treatment() == Treatment::Reference);
    assert!(matches!(
        fit(&reference_only, Parameter::Cmax, ModelKind::Fixed, &options()),
        Err(PkbeError::DataError(DataError::MissingTreatment { .. }))
    ));
}

#[test]
fn parallel_fitting_preserves_order_and_values() {
    let data = simulate_crossover(16, DEFAULT_SEED).unwrap();
    let order = [Parameter::Cmax, Parameter::AUC0_tz, Parameter::AUCINF_pred];
    let serial = fit_all(&data, &order, ModelKind::Mixed, &options()).unwrap();
    let threaded = fit_all(&data, &order, ModelKind::Mixed, &options().with_parallel(true)).unwrap();
    assert_eq!(serial, threaded);
    let fitted: Vec<Parameter> = threaded.iter().map(|r| r.parameter).collect();
    assert_eq!(fitted, order);
}

#[test]
fn residual_normality_is_reported() {
    let data = simulate_crossover(16, DEFAULT_SEED).unwrap();
    let result = fit(&data, Parameter::Cmax, ModelKind::Fixed, &options()).unwrap();
    let test = result.normality.unwrap();
    assert_eq!(test.n, 32);
    assert!((0.0..=1.0).contains(&test.p_value));
    assert!(test.statistic > 0.0 && test.statistic <= 1.0);

    let skipped = fit(
        &data,
        Parameter::Cmax,
        ModelKind::Fixed,
        &options().with_normality(false),
    )
    .unwrap();
    assert!(skipped.normality.is_none());
}

#[test]
fn model_kind_strings_are_strict() {
    assert_eq!("fixed".parse::<ModelKind>().unwrap(), ModelKind::Fixed);
    assert_eq!("mixed".parse::<ModelKind>().unwrap(), ModelKind::Mixed);
    assert!(matches!(
        "Fixed".parse::<ModelKind>(),
        Err(PkbeError::InvalidArgument(_))
    ));
}
