use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use irriplan::{
    manager::FarmManager,
    optimiser::GoodLpSolver,
    report::ReportWriter,
    scenario::ScenarioLoader,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Whole-farm irrigation planner")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/riverina_mixed.yaml")]
    scenario: PathBuf,

    /// Override the simulated horizon in years
    #[arg(long)]
    years: Option<u32>,

    /// Override the simulation step in days
    #[arg(long)]
    step_days: Option<u32>,

    /// Directory for season reports (scenario default when omitted)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Log filter, e.g. "info" or "irriplan=debug"
    #[arg(long, default_value = "info")]
    log: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log)?)
        .init();

    let loader = ScenarioLoader::new(".");
    let mut scenario = loader.load(&cli.scenario)?;
    if let Some(years) = cli.years {
        scenario.years = years;
    }

    if let Some(step_days) = cli.step_days {
        scenario.manager.step_days = step_days;
    }

    let settings = scenario.manager_settings()?;
    let step_days = settings.step_days;
    let climate = scenario.build_climate()?;
    let farm = scenario.build_farm()?;
    let out_dir = cli.out_dir.or_else(|| scenario.out_dir.clone());
    let writer = ReportWriter::new(out_dir)?;

    let mut manager = FarmManager::new(
        farm,
        climate,
        Box::new(GoodLpSolver::new()),
        settings,
        scenario.start_date,
        writer,
    )?;
    manager.run(scenario.steps(step_days))?;

    println!(
        "Scenario '{}' completed: {} season(s) closed over {} year(s).",
        scenario.name,
        manager.summaries().len(),
        scenario.years
    );
    for summary in manager.summaries() {
        println!(
            "  season {:>2}: {} to {}  profit ${:>12.2}  pumped ${:>9.2}  applied {:>8.1} ML",
            summary.season,
            summary.opened,
            summary.closed,
            summary.profit,
            summary.total_pumping_cost(),
            summary.total_applied_ml,
        );
    }
    Ok(())
}
