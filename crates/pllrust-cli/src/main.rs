//! pllrust CLI - Si5351 frequency planner.
//!
//! Lists every PLL and multisynth configuration that produces the requested
//! clocks from a given reference, one block per candidate. Candidates the chip
//! cannot be programmed with are logged to stderr.

mod report;

use std::io::{self, IsTerminal, Write};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use pllrust_core::config::multisynth::MAX_DENOMINATOR;
use pllrust_core::{
    condition, plan_with_scenarios, ChipEnvelope, Frequency, PlanSearch, Scenario, SearchStep,
    TargetClocks,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Scenario selection.
#[derive(Clone, Copy, PartialEq, Eq, Debug, ValueEnum)]
enum ScenarioArg {
    /// Fractional feedback divider, even integer output divider.
    A,
    /// Even integer feedback divider, fractional output divider.
    B,
    /// Both scenarios, fractional feedback first.
    Both,
}

impl ScenarioArg {
    fn selected(self) -> &'static [Scenario] {
        match self {
            ScenarioArg::A => &[Scenario::FractionalFeedback],
            ScenarioArg::B => &[Scenario::FractionalOutput],
            ScenarioArg::Both => &Scenario::ALL,
        }
    }
}

/// CLI arguments structure.
#[derive(Parser, Debug)]
#[command(name = "pllrust", version, about = "Si5351 clock generator frequency planner", long_about = None)]
struct Cli {
    /// Reference (XTAL or CLKIN) frequency, e.g. `25MHz` or `25000000`.
    reference: Frequency,

    /// Target clocks, primary first (at most 3).
    #[arg(required = true, num_args = 1..)]
    clocks: Vec<Frequency>,

    /// Scenarios to search.
    #[arg(short, long, value_enum, default_value_t = ScenarioArg::Both)]
    scenario: ScenarioArg,

    /// Largest fraction denominator to program.
    #[arg(
        long,
        value_parser = clap::value_parser!(u32).range(1..=MAX_DENOMINATOR as i64)
    )]
    max_denominator: Option<u32>,

    /// Print the whole plan as JSON instead of the text report.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn envelope(&self) -> ChipEnvelope {
        let envelope = ChipEnvelope::default();
        match self.max_denominator {
            Some(n) => envelope.with_max_denominator(n),
            None => envelope,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let envelope = cli.envelope();
    debug!(?cli, max_denominator = envelope.max_denominator, "starting");

    if cli.json {
        run_json(&cli, &envelope)
    } else {
        run_text(&cli, &envelope)
    }
}

/// Logs go to stderr so stdout carries only the report.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();
}

/// Streams the text report scenario by scenario.
///
/// A scenario that cannot start aborts the run, but everything printed for
/// earlier scenarios stays on stdout.
fn run_text(cli: &Cli, envelope: &ChipEnvelope) -> Result<()> {
    let targets = TargetClocks::new(&cli.clocks).context("invalid clock list")?;
    let input = condition(cli.reference, targets.primary(), envelope)
        .context("cannot condition the reference input")?;

    let mut out = io::stdout().lock();
    report::write_input(&mut out, &input)?;

    for &scenario in cli.scenario.selected() {
        report::write_scenario_header(&mut out, scenario)?;
        out.flush()?;

        let search = PlanSearch::new(scenario, input, targets, *envelope)
            .with_context(|| format!("{} scenario cannot start", report::ordinal(scenario)))?;

        for step in search {
            if let SearchStep::Plan(plan) = step {
                report::write_plan(&mut out, &input, &plan)?;
            }
        }
        report::write_scenario_footer(&mut out)?;
    }

    out.flush()?;
    Ok(())
}

fn run_json(cli: &Cli, envelope: &ChipEnvelope) -> Result<()> {
    let plan = plan_with_scenarios(cli.reference, &cli.clocks, cli.scenario.selected(), envelope)
        .context("planning failed")?;
    let json = report::to_json(&plan).context("cannot serialize plan")?;

    let mut out = io::stdout().lock();
    writeln!(out, "{json}")?;
    Ok(())
}
