//! Plan report rendering.
//!
//! The text report is written incrementally so a scenario's plans reach the
//! terminal before the next scenario is searched. The JSON report is built
//! from a finished [`FrequencyPlan`].

use std::io::{self, Write};

use pllrust_core::config::report::CLOCK_TOLERANCE;
use pllrust_core::{ClockOutput, ConditionedInput, FrequencyPlan, PllPlan, RatioKind, Scenario};
use serde::Serialize;

/// Input conditioning summary, printed once before the scenarios.
pub fn write_input<W: Write>(out: &mut W, input: &ConditionedInput) -> io::Result<()> {
    if input.clkin_div.is_active() {
        writeln!(out, "--> CLKIN_DIV={}", input.clkin_div.exponent())?;
        writeln!(out)?;
    }
    Ok(())
}

/// Position of a scenario in the full search order.
pub fn ordinal(scenario: Scenario) -> &'static str {
    match scenario {
        Scenario::FractionalFeedback => "first",
        Scenario::FractionalOutput => "second",
    }
}

pub fn write_scenario_header<W: Write>(out: &mut W, scenario: Scenario) -> io::Result<()> {
    writeln!(out, "{} scenario - {}", ordinal(scenario), scenario.description())?;
    writeln!(out)
}

pub fn write_scenario_footer<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out)
}

/// One plan block: PLL line(s), one line per clock, then a blank line.
pub fn write_plan<W: Write>(
    out: &mut W,
    input: &ConditionedInput,
    plan: &PllPlan,
) -> io::Result<()> {
    let reference = format_hz(input.reference.hz());
    let clkin_div = input.clkin_div.divisor();
    let vco = format_hz(plan.vco);
    let primary = plan.primary();

    match plan.scenario {
        Scenario::FractionalFeedback => {
            writeln!(
                out,
                "actual PLL frequency: {reference}/{clkin_div} * ({}) = {vco}{}",
                plan.feedback,
                kind_flag(plan.feedback.kind())
            )?;
            writeln!(
                out,
                "actual clock 0: {vco} / {} = {}",
                total_divider(primary),
                format_hz(primary.achieved)
            )?;
        }
        Scenario::FractionalOutput => {
            writeln!(
                out,
                "actual PLL frequency: {reference}/{clkin_div} * {}",
                plan.divider
            )?;
            writeln!(out, "actual PLL frequency: {vco}")?;
            writeln!(
                out,
                "actual clock 0: {vco} / ({}) / {} = {}{}",
                primary.divider,
                primary.rdiv.divisor(),
                format_hz(primary.achieved),
                kind_flag(primary.kind())
            )?;
        }
    }
    write_difference(out, primary)?;

    for clock in plan.clocks.iter().skip(1) {
        writeln!(
            out,
            "actual clock {}: {vco} / ({}) = {}{}",
            clock.index,
            clock.divider,
            format_hz(clock.achieved),
            kind_flag(clock.kind())
        )?;
        write_difference(out, clock)?;
    }

    writeln!(out)
}

fn write_difference<W: Write>(out: &mut W, clock: &ClockOutput) -> io::Result<()> {
    if clock.deviation.abs() >= CLOCK_TOLERANCE {
        writeln!(
            out,
            "*** clock {} difference: {}",
            clock.index,
            format_deviation(clock.deviation)
        )?;
    }
    Ok(())
}

/// Output multisynth times R-divider; only meaningful for integer dividers.
fn total_divider(clock: &ClockOutput) -> u64 {
    clock.divider.a() as u64 * clock.rdiv.divisor() as u64
}

fn kind_flag(kind: RatioKind) -> &'static str {
    match kind {
        RatioKind::EvenInteger => "   -> even integer",
        RatioKind::OddInteger => "   -> integer",
        RatioKind::Fractional => "",
    }
}

/// Formats a frequency in whole Hz with comma separators (e.g. "14,200,000").
pub fn format_hz(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());

    let mut result = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    if rounded < 0.0 {
        result.push('-');
    }
    result.chars().rev().collect()
}

/// Sub-Hz deviations would round to zero, so they are shown in scientific
/// notation instead.
fn format_deviation(deviation: f64) -> String {
    if deviation.abs() >= 1.0 {
        format_hz(deviation)
    } else {
        format!("{deviation:.1e}")
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    plan: &'a FrequencyPlan,
    best: Option<&'a PllPlan>,
}

/// Pretty-printed JSON of the whole plan plus the best candidate.
pub fn to_json(plan: &FrequencyPlan) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport {
        plan,
        best: plan.best_plan(),
    })
}
