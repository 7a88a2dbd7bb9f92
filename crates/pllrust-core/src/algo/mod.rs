//! Planning algorithms.
//!
//! The modules follow the data flow of a planning run:
//!
//! - **Conditioning (`condition`)**: CLKIN_DIV and R-divider selection.
//! - **Search (`search`)**: walks even integer dividers for one scenario.
//! - **Rational approximation (`rational`)**: turns a real divider into
//!   `a + b/c` with a bounded denominator.
//! - **Validation (`validate`)**: range predicates on [`ChipEnvelope`].

use crate::config::ChipEnvelope;
use crate::types::{Frequency, PlanError, Scenario, TargetClocks};

pub mod condition;
pub mod rational;
pub mod search;
pub mod validate;

pub use condition::{condition, ConditionedInput, PreDivider};
pub use rational::{approximate, ContinuedFraction, ExpansionStep};
pub use search::{ClockOutput, PlanSearch, PllPlan, Rejection, SearchStep, Violation};

/// Conditions the input and prepares the candidate walk of one scenario.
///
/// This is the streaming entry point: nothing is evaluated until the returned
/// iterator is advanced.
///
/// # Errors
///
/// Any fatal [`PlanError`] from conditioning or from the scenario's first
/// candidate.
///
/// # Example
///
/// ```
/// use pllrust_core::{plan_scenario, ChipEnvelope, Frequency, Scenario, TargetClocks};
///
/// let targets = TargetClocks::new(&[Frequency::new(14.2e6)]).unwrap();
/// let envelope = ChipEnvelope::default();
/// let search = plan_scenario(
///     Scenario::FractionalOutput,
///     Frequency::new(25e6),
///     &targets,
///     &envelope,
/// )
/// .unwrap();
/// assert_eq!(search.initial_divider(), 40);
/// ```
pub fn plan_scenario(
    scenario: Scenario,
    reference: Frequency,
    targets: &TargetClocks,
    envelope: &ChipEnvelope,
) -> Result<PlanSearch, PlanError> {
    let input = condition(reference, targets.primary(), envelope)?;
    PlanSearch::new(scenario, input, *targets, *envelope)
}
