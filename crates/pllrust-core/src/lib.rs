//! # pllrust Core
//!
//! Frequency planning for Si5351-class fractional-PLL clock generators.
//!
//! Given a reference frequency and up to three output clocks sharing one PLL,
//! the planner lists every divider configuration the chip can be programmed
//! with, together with the frequencies it would actually produce.
//!
//! ## Pipeline
//!
//! 1. **Conditioning**: the reference is halved with CLKIN_DIV until the PLL
//!    input is at most 40 MHz, and a primary clock below 1 MHz gets an
//!    R-divider.
//! 2. **Search**: two scenarios walk an even integer divider downwards from
//!    the VCO ceiling:
//!    - *fractional feedback*: even integer output divider, the feedback
//!      divider is approximated;
//!    - *fractional output*: even integer feedback divider, the output divider
//!      is approximated.
//! 3. **Approximation**: real dividers become `a + b/c` with `c < 2^20` using a
//!    continued-fraction expansion with semiconvergents.
//! 4. **Validation**: every candidate is checked against the chip envelope;
//!    out-of-band candidates are reported, not fatal.
//!
//! ## Example
//!
//! ```rust
//! use pllrust_core::{plan_frequencies, ChipEnvelope, Frequency};
//!
//! let plan = plan_frequencies(
//!     Frequency::new(25e6),
//!     &[Frequency::new(14.2e6), Frequency::new(10e6)],
//!     &ChipEnvelope::default(),
//! )
//! .unwrap();
//!
//! for p in plan.plans() {
//!     println!("{:?} VCO {} Hz, feedback {}", p.scenario, p.vco, p.feedback);
//! }
//! ```

pub mod algo;
pub mod config;
pub mod types;

// Re-export types
pub use config::ChipEnvelope;
pub use types::{
    Frequency, ParseFrequencyError, PlanError, Ratio, RatioKind, Scenario, TargetClocks,
};

// Re-export algorithms
pub use algo::{
    approximate, condition, plan_scenario, ClockOutput, ConditionedInput, PlanSearch, PllPlan,
    PreDivider, Rejection, SearchStep, Violation,
};

/// All steps of one scenario, in search order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScenarioResult {
    pub scenario: Scenario,
    pub initial_divider: u32,
    pub steps: Vec<SearchStep>,
}

/// The complete explored space of a planning run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrequencyPlan {
    pub input: ConditionedInput,
    pub targets: Vec<Frequency>,
    /// Fractional feedback first, then fractional output.
    pub scenarios: Vec<ScenarioResult>,
}

impl FrequencyPlan {
    /// Every emitted plan, scenario by scenario.
    pub fn plans(&self) -> impl Iterator<Item = &PllPlan> {
        self.scenarios
            .iter()
            .flat_map(|s| s.steps.iter())
            .filter_map(SearchStep::as_plan)
    }

    /// Every rejected candidate, scenario by scenario.
    pub fn rejections(&self) -> impl Iterator<Item = &Rejection> {
        self.scenarios
            .iter()
            .flat_map(|s| s.steps.iter())
            .filter_map(SearchStep::as_rejection)
    }

    /// The plan with the smallest worst-case clock deviation.
    ///
    /// Ties go to the plan found first. This is a convenience for callers;
    /// the planner itself never discards plans.
    pub fn best_plan(&self) -> Option<&PllPlan> {
        self.plans().fold(None, |best: Option<&PllPlan>, plan| match best {
            Some(b) if b.worst_deviation() <= plan.worst_deviation() => Some(b),
            _ => Some(plan),
        })
    }
}

/// Runs both scenarios to completion.
///
/// # Arguments
///
/// * `reference` - Raw reference (XTAL or CLKIN) frequency.
/// * `clocks` - One to three target clocks, primary first.
/// * `envelope` - Chip limits, usually `ChipEnvelope::default()`.
///
/// # Errors
///
/// Returns the first fatal [`PlanError`]: invalid clock list, reference out
/// of range, primary clock too low, or a scenario whose first candidate is
/// already out of band.
pub fn plan_frequencies(
    reference: Frequency,
    clocks: &[Frequency],
    envelope: &ChipEnvelope,
) -> Result<FrequencyPlan, PlanError> {
    plan_with_scenarios(reference, clocks, &Scenario::ALL, envelope)
}

/// Runs the given scenarios to completion, in the order given.
///
/// # Errors
///
/// Same as [`plan_frequencies`], limited to the selected scenarios.
pub fn plan_with_scenarios(
    reference: Frequency,
    clocks: &[Frequency],
    scenarios: &[Scenario],
    envelope: &ChipEnvelope,
) -> Result<FrequencyPlan, PlanError> {
    let targets = TargetClocks::new(clocks)?;
    let input = condition(reference, targets.primary(), envelope)?;

    let scenarios = scenarios
        .iter()
        .map(|&scenario| {
            let search = PlanSearch::new(scenario, input, targets, *envelope)?;
            Ok(ScenarioResult {
                scenario,
                initial_divider: search.initial_divider(),
                steps: search.collect(),
            })
        })
        .collect::<Result<Vec<_>, PlanError>>()?;

    Ok(FrequencyPlan {
        input,
        targets: targets.as_slice().to_vec(),
        scenarios,
    })
}
