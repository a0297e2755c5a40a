//! Tests for the design simulators and the imbalance injector

use pkbe::prelude::*;
use pkbe::simulation::DEFAULT_SEED;
use rand::{rngs::StdRng, SeedableRng};

#[test]
fn same_seed_gives_identical_datasets() {
    let a = simulate_crossover(16, DEFAULT_SEED).unwrap();
    let b = simulate_crossover(16, DEFAULT_SEED).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.to_json_string().unwrap(), b.to_json_string().unwrap());
    assert_eq!(a.to_csv_string().unwrap(), b.to_csv_string().unwrap());

    let c = simulate_crossover(16, DEFAULT_SEED + 1).unwrap();
    assert_ne!(a, c);
}

#[test]
fn explicit_generator_matches_seeded_shortcut() {
    let options = SimulationOptions::new(Design::FixedSequence).with_seed(42);
    let mut rng = StdRng::seed_from_u64(42);
    let threaded = simulate(&options, &mut rng).unwrap();
    assert_eq!(threaded, simulate_seeded(&options).unwrap());
    assert_eq!(threaded, simulate_fixed_sequence(16, 42).unwrap());
}

#[test]
fn crossover_reference_scenario() {
    let balanced = simulate_crossover(16, DEFAULT_SEED).unwrap();
    assert_eq!(balanced.len(), 96);
    assert_eq!(balanced.subjects().len(), 16);

    // Block randomization: 8 subjects per sequence
    for sequence in [Sequence::TR, Sequence::RT] {
        let mut subjects: Vec<u32> = balanced
            .observations()
            .iter()
            .filter(|o| o.sequence() == Some(sequence))
            .map(|o| o.subject())
            .collect();
        subjects.dedup();
        assert_eq!(subjects.len(), 8);
    }

    let unbalanced = drop_period(&balanced, &ImbalanceSpec::default()).unwrap();
    assert_eq!(unbalanced.len(), 90);
}

#[test]
fn every_subject_gets_both_treatments_across_periods() {
    let data = simulate_crossover(10, 7).unwrap();
    for obs in data.observations() {
        let sequence = obs.sequence().unwrap();
        assert_eq!(sequence.treatment_in(obs.period().unwrap()), Some(obs.treatment()));
    }
    for subject in data.subjects() {
        let rows: Vec<_> = data
            .observations()
            .iter()
            .filter(|o| o.subject() == subject)
            .collect();
        assert_eq!(rows.len(), 6);
        assert!(rows.iter().any(|o| o.treatment() == Treatment::Test));
        assert!(rows.iter().any(|o| o.treatment() == Treatment::Reference));
    }
}

#[test]
fn fixed_sequence_follows_configured_order() {
    let data = simulate_fixed_sequence(12, DEFAULT_SEED).unwrap();
    assert_eq!(data.len(), 12 * 2 * 3);
    for obs in data.observations() {
        let expected = if obs.period() == Some(1) {
            Treatment::Reference
        } else {
            Treatment::Test
        };
        assert_eq!(obs.treatment(), expected);
    }

    let reversed = simulate_seeded(
        &SimulationOptions::new(Design::FixedSequence).with_sequence(Sequence::TR),
    )
    .unwrap();
    assert!(reversed
        .observations()
        .iter()
        .filter(|o| o.period() == Some(1))
        .all(|o| o.treatment() == Treatment::Test));
}

#[test]
fn parallel_reference_scenario() {
    let data = simulate_parallel(80, DEFAULT_SEED, Allocation::default()).unwrap();
    assert_eq!(data.len(), 240);
    assert_eq!(data.subject_count(Parameter::Cmax, Treatment::Reference), 40);
    assert_eq!(data.subject_count(Parameter::Cmax, Treatment::Test), 40);
    assert!(data.observations().iter().all(|o| o.period().is_none()));
}

#[test]
fn parallel_respects_unequal_allocation() {
    let data = simulate_parallel(30, 3, Allocation::new(2, 1)).unwrap();
    assert_eq!(data.subject_count(Parameter::AUC0_tz, Treatment::Reference), 20);
    assert_eq!(data.subject_count(Parameter::AUC0_tz, Treatment::Test), 10);
}

#[test]
fn pk_is_exp_of_log_pk_for_every_row() {
    let data = simulate_crossover(16, DEFAULT_SEED).unwrap();
    for obs in data.observations() {
        assert_eq!(obs.pk(), obs.log_pk().exp());
        assert!((obs.pk().ln() - obs.log_pk()).abs() < 1e-12);
    }
}

#[test]
fn unbalanced_is_strict_subset() {
    let balanced = simulate_crossover(16, DEFAULT_SEED).unwrap();
    let spec = ImbalanceSpec::new(vec![1, 2, 3], 1);
    let unbalanced = drop_period(&balanced, &spec).unwrap();

    assert_eq!(balanced.len() - unbalanced.len(), 3 * 3);
    assert!(unbalanced
        .observations()
        .iter()
        .all(|o| balanced.observations().contains(o)));
    assert!(unbalanced
        .observations()
        .iter()
        .all(|o| !(spec.subjects.contains(&o.subject()) && o.period() == Some(1))));

    // Kept rows keep their relative order
    let kept: Vec<_> = balanced
        .observations()
        .iter()
        .filter(|o| unbalanced.observations().contains(o))
        .cloned()
        .collect();
    assert_eq!(kept, unbalanced.observations());
}

#[test]
fn imbalance_is_rejected_for_parallel_data() {
    let data = simulate_parallel(10, 1, Allocation::default()).unwrap();
    assert!(matches!(
        drop_period(&data, &ImbalanceSpec::default()),
        Err(PkbeError::InvalidArgument(_))
    ));
    assert!(Balance::Balanced
        .apply(&data, &ImbalanceSpec::default())
        .is_ok());
}

#[test]
fn balance_strings_are_strict() {
    assert_eq!("balanced".parse::<Balance>().unwrap(), Balance::Balanced);
    assert_eq!("unbalanced".parse::<Balance>().unwrap(), Balance::Unbalanced);
    assert!(matches!(
        "Balanced".parse::<Balance>(),
        Err(PkbeError::InvalidArgument(_))
    ));
}

#[test]
fn invalid_simulation_inputs() {
    assert!(matches!(
        simulate_crossover(1, 1),
        Err(PkbeError::InvalidArgument(_))
    ));
    assert!(simulate_parallel(10, 1, Allocation::new(0, 1)).is_err());
    assert!(matches!(
        simulate_parallel(10, 1, Allocation::new(1, 100)),
        Err(PkbeError::InvalidArgument(_))
    ));

    let zero_sd = SimulationOptions::new(Design::Parallel).with_reference(
        ReferenceTable::parallel().with_variability(Parameter::Cmax, Variability::Total { sd: 0.0 }),
    );
    assert!(matches!(
        simulate_seeded(&zero_sd),
        Err(PkbeError::InvalidArgument(_))
    ));

    let bad_sd = SimulationOptions::new(Design::Crossover).with_reference(
        ReferenceTable::repeated_measures().with_variability(
            Parameter::Cmax,
            Variability::BetweenWithin {
                between: -1.0,
                within: 0.1,
            },
        ),
    );
    assert!(matches!(
        simulate_seeded(&bad_sd),
        Err(PkbeError::InvalidArgument(_))
    ));

    let wrong_table =
        SimulationOptions::new(Design::Parallel).with_reference(ReferenceTable::repeated_measures());
    assert!(simulate_seeded(&wrong_table).is_err());
}

#[test]
fn csv_round_trip_keeps_rows_within_precision() {
    let data = simulate_crossover(4, 11).unwrap();
    let csv = data.to_csv_string().unwrap();
    let back = Dataset::from_csv_reader(csv.as_bytes(), Design::Crossover).unwrap();
    assert_eq!(back.len(), data.len());
    for (a, b) in data.observations().iter().zip(back.observations()) {
        assert_eq!(a.subject(), b.subject());
        assert_eq!(a.treatment(), b.treatment());
        assert!((a.log_pk() - b.log_pk()).abs() <= 5e-7);
    }
}
