//! End-to-end analysis tests

use pkbe::prelude::*;
use pkbe::simulation::DEFAULT_SEED;

#[test]
fn crossover_analysis_produces_full_report() {
    let data = simulate_crossover(16, DEFAULT_SEED).unwrap();
    let report = Analysis::new(AnalysisOptions::default()).run(&data).unwrap();

    assert_eq!(report.n_observations, 96);
    assert_eq!(report.results.len(), 3);
    assert_eq!(report.back_transformed.len(), 3);
    assert_eq!(report.table.len(), 9);
    assert_eq!(report.forest.points.len(), 3);

    let text = report.to_string();
    assert!(text.contains("crossover fixed model"));
    assert!(text.contains("Primary endpoints"));
    assert!(text.contains("Shapiro-Wilk"));
}

#[test]
fn unbalanced_mixed_analysis_from_json_options() {
    let options = AnalysisOptions::from_json(
        r#"{
            "kind": "mixed",
            "balance": "unbalanced",
            "parameters": ["Cmax", "AUC0_tz"]
        }"#,
    )
    .unwrap();
    let data = simulate_crossover(16, DEFAULT_SEED).unwrap();
    let report = Analysis::new(options).run(&data).unwrap();

    assert_eq!(report.n_observations, 90);
    assert_eq!(report.balance, Balance::Unbalanced);
    let order: Vec<Parameter> = report.results.iter().map(|r| r.parameter).collect();
    assert_eq!(order, vec![Parameter::Cmax, Parameter::AUC0_tz]);
    assert_eq!(report.table.rows()[0].parameter, "Cmax");
    assert!(report
        .results
        .iter()
        .all(|r| r.form == ModelForm::CrossoverMixed));
}

#[test]
fn parallel_analysis() {
    let data = simulate_parallel(80, DEFAULT_SEED, Allocation::default()).unwrap();
    let report = Analysis::new(AnalysisOptions::default()).run(&data).unwrap();
    assert_eq!(report.n_observations, 240);
    for row in report.table.rows().iter().filter(|r| !r.is_header()) {
        assert_eq!(row.n, "40");
    }

    let unbalanced = Analysis::new(AnalysisOptions::default().with_balance(Balance::Unbalanced));
    assert!(matches!(
        unbalanced.run(&data),
        Err(PkbeError::InvalidArgument(_))
    ));
}

#[test]
fn first_failure_aborts_the_batch() {
    let data = simulate_crossover(2, DEFAULT_SEED).unwrap();
    let result = Analysis::default().run(&data);
    assert!(matches!(result, Err(PkbeError::FitError(_))));
}

#[test]
fn report_serializes_to_json() {
    let data = simulate_fixed_sequence(12, DEFAULT_SEED).unwrap();
    let report = Analysis::new(
        AnalysisOptions::default().with_parameters(vec![Parameter::AUCINF_pred]),
    )
    .run(&data)
    .unwrap();
    let json = report.to_json_string().unwrap();
    let back: AnalysisReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back.table, report.table);
    assert_eq!(back.results[0].form, ModelForm::FixedSequenceFixed);
}

#[test]
fn datasets_load_back_for_analysis() {
    let data = simulate_crossover(16, DEFAULT_SEED).unwrap();
    let from_json = Dataset::from_json_str(&data.to_json_string().unwrap()).unwrap();
    assert_eq!(from_json, data);

    let csv = data.to_csv_string().unwrap();
    let from_csv = Dataset::from_csv_reader(csv.as_bytes(), Design::Crossover).unwrap();
    let a = Analysis::default().run(&data).unwrap();
    let b = Analysis::default().run(&from_csv).unwrap();
    for (x, y) in a.back_transformed.iter().zip(&b.back_transformed) {
        assert!((x.ratio - y.ratio).abs() < 1e-3);
    }
}

#[test]
fn missing_csv_column_is_a_data_error() {
    let csv = "Subject,Sequence,Period,Parameter,logPK\n1,TR,1,Cmax,5.0\n";
    assert!(matches!(
        Dataset::from_csv_reader(csv.as_bytes(), Design::Crossover),
        Err(DataError::MissingColumn { column }) if column == "Treatment"
    ));

    let bad_level = "Subject,Sequence,Period,Treatment,Parameter,logPK\n1,TR,1,X,Cmax,5.0\n";
    assert!(matches!(
        Dataset::from_csv_reader(bad_level.as_bytes(), Design::Crossover),
        Err(DataError::UnknownLevel { .. })
    ));
}
