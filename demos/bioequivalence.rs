use anyhow::Result;
use pkbe::prelude::*;
use pkbe::simulation::DEFAULT_SEED;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let crossover = simulate_crossover(16, DEFAULT_SEED)?;
    println!(
        "Simulated {} rows for {} subjects\n",
        crossover.len(),
        crossover.subjects().len()
    );

    for (kind, balance) in [
        (ModelKind::Fixed, Balance::Balanced),
        (ModelKind::Mixed, Balance::Balanced),
        (ModelKind::Fixed, Balance::Unbalanced),
        (ModelKind::Mixed, Balance::Unbalanced),
    ] {
        let options = AnalysisOptions::default()
            .with_kind(kind)
            .with_balance(balance);
        let report = Analysis::new(options).run(&crossover)?;
        println!("{report}");
    }

    // Fixed against mixed on the unbalanced data
    let unbalanced = AnalysisOptions::default().with_balance(Balance::Unbalanced);
    let fixed = Analysis::new(unbalanced.clone()).run(&crossover)?;
    let mixed = Analysis::new(unbalanced.with_kind(ModelKind::Mixed)).run(&crossover)?;
    for c in compare_tables(&fixed.back_transformed, &mixed.back_transformed) {
        println!(
            "{}: ratio shift {:+.3} pp, CI shift up to {:.3} pp",
            c.parameter,
            c.ratio_difference,
            c.max_ratio_shift()
        );
    }

    let parallel = simulate_parallel(80, DEFAULT_SEED, Allocation::default())?;
    let report = Analysis::default().run(&parallel)?;
    println!("\n{report}");
    for bt in &report.back_transformed {
        println!(
            "{}: {}",
            bt.parameter,
            if bt.is_bioequivalent() {
                "bioequivalent"
            } else {
                "not shown bioequivalent"
            }
        );
    }

    Ok(())
}
