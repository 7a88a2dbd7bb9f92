//! Two-scenario divider search.
//!
//! A PLL plan is a feedback divider (reference → VCO) and one output divider
//! per clock (VCO → clock). The search fixes one divider of the primary pair
//! to an even integer, derives the other one as a real number and turns it
//! into a register-ready fraction with [`approximate`].
//!
//! | Scenario                          | Walked as even integer | Approximated |
//! |-----------------------------------|------------------------|--------------|
//! | [`Scenario::FractionalFeedback`]  | output divider         | feedback     |
//! | [`Scenario::FractionalOutput`]    | feedback divider       | output       |
//!
//! The integer candidate starts as high as the VCO ceiling allows and is
//! lowered by 2 at each step until it leaves its band or the VCO drops below
//! the floor. Every step yields either a [`PllPlan`] or a [`Rejection`].

use std::fmt::{self, Display};

use tracing::{debug, warn};

use super::condition::{ConditionedInput, PreDivider};
use super::rational::approximate;
use crate::config::report::CLOCK_TOLERANCE;
use crate::config::ChipEnvelope;
use crate::types::{Frequency, PlanError, Ratio, RatioKind, Scenario, TargetClocks};

/// Result for one output clock within a plan.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClockOutput {
    /// Position in the request, 0 being the primary clock.
    pub index: usize,
    pub requested: Frequency,
    /// Output multisynth ratio.
    pub divider: Ratio,
    /// R-divider after the multisynth (primary clock only).
    pub rdiv: PreDivider,
    pub achieved: f64,
    /// `achieved - requested`, in Hz.
    pub deviation: f64,
}

impl ClockOutput {
    fn new(
        index: usize,
        requested: Frequency,
        divider: Ratio,
        rdiv: PreDivider,
        vco: f64,
    ) -> Self {
        let achieved = vco / divider.value() / rdiv.divisor() as f64;
        Self {
            index,
            requested,
            divider,
            rdiv,
            achieved,
            deviation: achieved - requested.hz(),
        }
    }

    /// Whether the achieved frequency matches the request within
    /// [`CLOCK_TOLERANCE`].
    pub fn within_tolerance(&self) -> bool {
        self.deviation.abs() < CLOCK_TOLERANCE
    }

    pub fn kind(&self) -> RatioKind {
        self.divider.kind()
    }
}

/// One surviving candidate: a full PLL configuration for every clock that
/// fits the output divider band.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PllPlan {
    pub scenario: Scenario,
    /// The even integer divider walked by the search.
    pub divider: u32,
    /// Feedback multisynth ratio.
    pub feedback: Ratio,
    /// Actual VCO frequency, `pll_input * feedback`.
    pub vco: f64,
    /// Primary clock first; secondary clocks whose divider left the band are
    /// absent.
    pub clocks: Vec<ClockOutput>,
}

impl PllPlan {
    /// The fractional ratio the search derived for this candidate.
    pub fn approximated(&self) -> Ratio {
        match self.scenario {
            Scenario::FractionalFeedback => self.feedback,
            Scenario::FractionalOutput => self.primary().divider,
        }
    }

    pub fn primary(&self) -> &ClockOutput {
        &self.clocks[0]
    }

    /// Largest absolute deviation over the emitted clocks.
    pub fn worst_deviation(&self) -> f64 {
        self.clocks
            .iter()
            .map(|c| c.deviation.abs())
            .fold(0.0, f64::max)
    }

    pub fn all_within_tolerance(&self) -> bool {
        self.clocks.iter().all(ClockOutput::within_tolerance)
    }
}

/// Which part of the envelope a candidate violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Violation {
    FeedbackRange,
    OutputRange,
    /// The VCO reached with the approximated ratio left the band.
    VcoRange,
}

/// A candidate skipped because its derived divider or VCO is out of band.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rejection {
    pub scenario: Scenario,
    pub divider: u32,
    /// The derived divider value that failed the check.
    pub companion: f64,
    pub vco: f64,
    pub violation: Violation,
}

impl Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.violation {
            Violation::FeedbackRange => "feedback MS",
            Violation::OutputRange => "output MS",
            Violation::VcoRange => {
                return write!(
                    f,
                    "invalid f_VCO {:.0} ({}={}, ratio={})",
                    self.vco, self.scenario, self.divider, self.companion
                );
            }
        };
        write!(
            f,
            "invalid {} {:.0} ({}={}, f_VCO={:.0})",
            what, self.companion, self.scenario, self.divider, self.vco
        )
    }
}

/// One item produced by [`PlanSearch`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "kebab-case"))]
pub enum SearchStep {
    Plan(PllPlan),
    Rejected(Rejection),
}

impl SearchStep {
    pub fn as_plan(&self) -> Option<&PllPlan> {
        match self {
            SearchStep::Plan(plan) => Some(plan),
            SearchStep::Rejected(_) => None,
        }
    }

    pub fn as_rejection(&self) -> Option<&Rejection> {
        match self {
            SearchStep::Plan(_) => None,
            SearchStep::Rejected(rejection) => Some(rejection),
        }
    }
}

/// Lazy candidate walk for one scenario.
///
/// # Example
///
/// ```
/// use pllrust_core::{condition, ChipEnvelope, Frequency, PlanSearch, Scenario, TargetClocks};
///
/// let envelope = ChipEnvelope::default();
/// let targets = TargetClocks::new(&[Frequency::new(14.2e6)]).unwrap();
/// let input = condition(Frequency::new(25e6), targets.primary(), &envelope).unwrap();
///
/// let search = PlanSearch::new(Scenario::FractionalFeedback, input, targets, envelope).unwrap();
/// assert_eq!(search.initial_divider(), 70);
/// assert!(search.filter_map(|s| s.as_plan().cloned()).count() > 0);
/// ```
#[derive(Debug, Clone)]
pub struct PlanSearch {
    scenario: Scenario,
    input: ConditionedInput,
    targets: TargetClocks,
    envelope: ChipEnvelope,
    initial: u32,
    candidate: u32,
}

impl PlanSearch {
    /// Picks the first candidate of `scenario`.
    ///
    /// # Errors
    ///
    /// * [`PlanError::InitialDividerOutOfRange`] if the highest even divider
    ///   the VCO ceiling allows is already outside the scenario's band.
    /// * [`PlanError::VcoUnreachable`] if the feedback divider had to be
    ///   clamped and the clamped value cannot reach the VCO floor.
    pub fn new(
        scenario: Scenario,
        input: ConditionedInput,
        targets: TargetClocks,
        envelope: ChipEnvelope,
    ) -> Result<Self, PlanError> {
        let initial = match scenario {
            Scenario::FractionalFeedback => {
                let divider = highest_even_divider(input.primary_multisynth(), envelope.vco_max);
                if !envelope.output_in_band(divider as f64) {
                    return Err(PlanError::InitialDividerOutOfRange {
                        scenario,
                        divider,
                        min: envelope.output_min,
                        max: envelope.output_max,
                    });
                }
                divider
            }
            Scenario::FractionalOutput => {
                let divider = highest_even_divider(input.pll_input(), envelope.vco_max)
                    .min(envelope.feedback_even_max);
                if !envelope.feedback_even_in_band(divider) {
                    return Err(PlanError::InitialDividerOutOfRange {
                        scenario,
                        divider,
                        min: envelope.feedback_even_min,
                        max: envelope.feedback_even_max,
                    });
                }
                let vco = input.pll_input() * divider as f64;
                if !envelope.vco_in_band(vco) {
                    return Err(PlanError::VcoUnreachable {
                        divider,
                        vco,
                        min: envelope.vco_min,
                    });
                }
                divider
            }
        };

        debug!(%scenario, initial, "starting divider search");

        Ok(Self {
            scenario,
            input,
            targets,
            envelope,
            initial,
            candidate: initial,
        })
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    /// The first (highest) candidate of the walk.
    pub fn initial_divider(&self) -> u32 {
        self.initial
    }

    /// Band of the divider walked as an even integer.
    fn divider_in_band(&self, divider: u32) -> bool {
        match self.scenario {
            Scenario::FractionalFeedback => self.envelope.output_in_band(divider as f64),
            Scenario::FractionalOutput => self.envelope.feedback_even_in_band(divider),
        }
    }

    /// VCO implied by the integer candidate alone.
    fn implied_vco(&self, divider: u32) -> f64 {
        match self.scenario {
            Scenario::FractionalFeedback => divider as f64 * self.input.primary_multisynth(),
            Scenario::FractionalOutput => self.input.pll_input() * divider as f64,
        }
    }

    fn evaluate(&self, divider: u32, implied_vco: f64) -> SearchStep {
        let env = &self.envelope;
        let (companion, in_band, violation) = match self.scenario {
            Scenario::FractionalFeedback => {
                let ratio = implied_vco / self.input.pll_input();
                (ratio, env.feedback_in_band(ratio), Violation::FeedbackRange)
            }
            Scenario::FractionalOutput => {
                let ratio = implied_vco / self.input.primary_multisynth();
                (ratio, env.output_in_band(ratio), Violation::OutputRange)
            }
        };

        let reject = |violation, companion, vco| {
            let rejection = Rejection {
                scenario: self.scenario,
                divider,
                companion,
                vco,
                violation,
            };
            warn!(
                scenario = %self.scenario,
                divider,
                companion,
                vco,
                ?violation,
                "{rejection}"
            );
            SearchStep::Rejected(rejection)
        };

        if !in_band {
            return reject(violation, companion, implied_vco);
        }

        let approximated = approximate(companion, env.max_denominator);
        let (feedback, output) = match self.scenario {
            Scenario::FractionalFeedback => (approximated, Ratio::integer(divider)),
            Scenario::FractionalOutput => (Ratio::integer(divider), approximated),
        };
        let vco = self.input.pll_input() * feedback.value();
        if !env.vco_in_band(vco) {
            return reject(Violation::VcoRange, approximated.value(), vco);
        }

        let mut clocks = Vec::with_capacity(self.targets.len());
        clocks.push(ClockOutput::new(
            0,
            self.input.primary,
            output,
            self.input.rdiv,
            vco,
        ));
        clocks.extend(
            self.targets
                .secondary()
                .filter_map(|(index, target)| self.secondary_clock(index, target, vco)),
        );

        let plan = PllPlan {
            scenario: self.scenario,
            divider,
            feedback,
            vco,
            clocks,
        };
        debug!(
            scenario = %self.scenario,
            divider,
            vco,
            worst_deviation = plan.worst_deviation(),
            "plan"
        );
        SearchStep::Plan(plan)
    }

    /// Output divider for an additional clock on the same VCO, or `None` when
    /// it does not fit the output band.
    fn secondary_clock(&self, index: usize, target: Frequency, vco: f64) -> Option<ClockOutput> {
        let env = &self.envelope;
        let ideal = vco / target.hz();
        // The approximation stays within 1 of the ideal divider.
        if ideal < env.output_min as f64 - 1.0 || ideal > env.output_max as f64 + 1.0 {
            debug!(index, ideal, "clock skipped, output MS out of band");
            return None;
        }
        let ratio = approximate(ideal, env.max_denominator);
        if !env.output_in_band(ratio.value()) {
            debug!(index, %ratio, "clock skipped, output MS out of band");
            return None;
        }
        Some(ClockOutput::new(index, target, ratio, PreDivider::NONE, vco))
    }
}

impl Iterator for PlanSearch {
    type Item = SearchStep;

    fn next(&mut self) -> Option<Self::Item> {
        let divider = self.candidate;
        let implied_vco = self.implied_vco(divider);
        if !self.divider_in_band(divider) || !self.envelope.vco_in_band(implied_vco) {
            return None;
        }
        self.candidate = divider.saturating_sub(2);

        Some(self.evaluate(divider, implied_vco))
    }
}

/// `floor(value)` lowered to the nearest even integer.
fn even_floor(value: f64) -> u32 {
    let n = value as u32;
    n - n % 2
}

/// Highest even divider whose product with `step_hz` stays at or below
/// `vco_max`, rounding included.
fn highest_even_divider(step_hz: f64, vco_max: f64) -> u32 {
    let fits = |divider: u32| divider as f64 * step_hz <= vco_max;
    let mut divider = even_floor(vco_max / step_hz);
    while divider > 0 && !fits(divider) {
        divider -= 2;
    }
    match divider.checked_add(2) {
        Some(next) if fits(next) => next,
        _ => divider,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::condition::condition;
    use approx::assert_abs_diff_eq;

    fn search(
        scenario: Scenario,
        reference: f64,
        clocks: &[f64],
    ) -> Result<PlanSearch, PlanError> {
        search_with(scenario, reference, clocks, ChipEnvelope::default())
    }

    fn search_with(
        scenario: Scenario,
        reference: f64,
        clocks: &[f64],
        envelope: ChipEnvelope,
    ) -> Result<PlanSearch, PlanError> {
        let clocks: Vec<Frequency> = clocks.iter().copied().map(Frequency::new).collect();
        let targets = TargetClocks::new(&clocks)?;
        let input = condition(Frequency::new(reference), targets.primary(), &envelope)?;
        PlanSearch::new(scenario, input, targets, envelope)
    }

    fn plans(search: PlanSearch) -> Vec<PllPlan> {
        search.filter_map(|s| s.as_plan().cloned()).collect()
    }

    #[test]
    fn even_floor_rounds_down() {
        assert_eq!(even_floor(70.42), 70);
        assert_eq!(even_floor(71.99), 70);
        assert_eq!(even_floor(4.0), 4);
        assert_eq!(even_floor(0.5), 0);
    }

    #[test]
    fn highest_even_divider_keeps_product_under_ceiling() {
        assert_eq!(highest_even_divider(14.2e6, 1e9), 70);
        assert_eq!(highest_even_divider(25e6, 1e9), 40);
        assert_eq!(highest_even_divider(2e9, 1e9), 0);
        // Steps that divide the ceiling almost exactly.
        for n in [6u32, 70, 98, 832, 900, 1_000_001] {
            for step in [1e9 / n as f64, 1e9 / (n as f64 + 1e-9), 1e9 / (n as f64 - 1e-9)] {
                let divider = highest_even_divider(step, 1e9);
                assert_eq!(divider % 2, 0);
                assert!(divider as f64 * step <= 1e9, "n = {n}, step = {step}");
                assert!((divider + 2) as f64 * step > 1e9, "n = {n}, step = {step}");
            }
        }
    }

    #[test]
    fn fractional_feedback_walk() {
        let s = search(Scenario::FractionalFeedback, 25e6, &[14.2e6]).unwrap();
        assert_eq!(s.initial_divider(), 70);

        let plans = plans(s);
        let dividers: Vec<u32> = plans.iter().map(|p| p.divider).collect();
        // 44 * 14.2 MHz = 624.8 MHz, 42 * 14.2 MHz = 596.4 MHz
        assert_eq!(dividers.first(), Some(&70));
        assert_eq!(dividers.last(), Some(&44));
        assert!(dividers.windows(2).all(|w| w[0] - w[1] == 2));

        let first = &plans[0];
        assert_eq!(first.feedback, Ratio::new(39, 19, 25));
        assert_eq!(first.primary().divider, Ratio::integer(70));
        assert_eq!(first.primary().kind(), RatioKind::EvenInteger);
        assert_abs_diff_eq!(first.vco, 994e6, epsilon = 1e-6);
        assert!(first.primary().within_tolerance());
    }

    #[test]
    fn fractional_output_walk() {
        let s = search(Scenario::FractionalOutput, 25e6, &[14.2e6]).unwrap();
        assert_eq!(s.initial_divider(), 40);

        let plans = plans(s);
        let dividers: Vec<u32> = plans.iter().map(|p| p.divider).collect();
        assert_eq!(dividers, vec![40, 38, 36, 34, 32, 30, 28, 26, 24]);

        for plan in &plans {
            assert_eq!(plan.feedback, Ratio::integer(plan.divider));
            assert_eq!(plan.vco, 25e6 * plan.divider as f64);
            assert!(plan.primary().deviation.abs() < 1.0);
        }
    }

    #[test]
    fn feedback_over_band_is_rejected_and_walk_continues() {
        // 10 MHz reference: any VCO above 900 MHz needs a feedback ratio > 90.
        let steps: Vec<SearchStep> =
            search(Scenario::FractionalFeedback, 10e6, &[10e6]).unwrap().collect();
        let rejected: Vec<u32> = steps
            .iter()
            .filter_map(SearchStep::as_rejection)
            .map(|r| r.divider)
            .collect();
        assert_eq!(rejected, vec![100, 98, 96, 94, 92]);
        assert!(steps
            .iter()
            .filter_map(SearchStep::as_rejection)
            .all(|r| r.violation == Violation::FeedbackRange));

        let accepted: Vec<u32> = steps
            .iter()
            .filter_map(SearchStep::as_plan)
            .map(|p| p.divider)
            .collect();
        assert_eq!(accepted.first(), Some(&90));
        assert_eq!(accepted.last(), Some(&60));
        assert_eq!(accepted.len(), 16);
    }

    #[test]
    fn output_over_band_is_rejected() {
        let steps: Vec<SearchStep> =
            search(Scenario::FractionalOutput, 25e6, &[1e6]).unwrap().collect();
        let rejected: Vec<u32> = steps
            .iter()
            .filter_map(SearchStep::as_rejection)
            .map(|r| r.divider)
            .collect();
        assert_eq!(rejected, vec![40, 38]);
        let first_plan = steps.iter().find_map(SearchStep::as_plan).unwrap();
        assert_eq!(first_plan.divider, 36);
        assert_eq!(first_plan.primary().divider, Ratio::integer(900));
    }

    #[test]
    fn high_clock_fails_initial_output_divider() {
        let err = search(Scenario::FractionalFeedback, 25e6, &[300e6]).unwrap_err();
        assert_eq!(
            err,
            PlanError::InitialDividerOutOfRange {
                scenario: Scenario::FractionalFeedback,
                divider: 2,
                min: 4,
                max: 900,
            }
        );
    }

    #[test]
    fn feedback_is_clamped_for_low_reference() {
        let s = search(Scenario::FractionalOutput, 10e6, &[10e6]).unwrap();
        assert_eq!(s.initial_divider(), 90);
        let last = plans(s).last().cloned().unwrap();
        assert_eq!(last.divider, 60);
    }

    #[test]
    fn secondary_clocks_share_the_vco() {
        let s = search(Scenario::FractionalFeedback, 25e6, &[14.2e6, 10e6, 27e6]).unwrap();
        for plan in plans(s) {
            assert_eq!(plan.clocks[0].index, 0);
            for clock in &plan.clocks[1..] {
                assert_abs_diff_eq!(
                    clock.achieved,
                    plan.vco / clock.divider.value(),
                    epsilon = 1e-9
                );
                assert!(clock.deviation.abs() < 1e-3);
            }
        }
    }

    #[test]
    fn secondary_clock_out_of_band_is_omitted() {
        // 500 kHz needs an output divider of 1200 or more: always skipped.
        let s = search(Scenario::FractionalFeedback, 25e6, &[14.2e6, 500e3, 10e6]).unwrap();
        for plan in plans(s) {
            let indices: Vec<usize> = plan.clocks.iter().map(|c| c.index).collect();
            assert_eq!(indices, vec![0, 2]);
        }
    }

    #[test]
    fn sub_hertz_secondary_clock_is_omitted() {
        // 994 MHz / 0.05 Hz is far beyond any divider register.
        let s = search(Scenario::FractionalFeedback, 25e6, &[14.2e6, 0.05]).unwrap();
        let found = plans(s);
        assert!(!found.is_empty());
        assert!(found.iter().all(|p| p.clocks.len() == 1));

        let envelope = ChipEnvelope::default().with_max_denominator(1);
        for scenario in Scenario::ALL {
            let s = search_with(scenario, 25e6, &[14.2e6, 0.17], envelope).unwrap();
            assert!(plans(s).iter().all(|p| p.clocks.len() == 1));
        }
    }

    #[test]
    fn rounded_feedback_above_vco_band_is_rejected() {
        // 28 MHz / 14.25 MHz: divider 70 needs feedback 35.625, which rounds
        // to 36 with c = 1 and lands the VCO at 1.008 GHz.
        let envelope = ChipEnvelope::default().with_max_denominator(1);
        let steps: Vec<SearchStep> =
            search_with(Scenario::FractionalFeedback, 28e6, &[14.25e6], envelope)
                .unwrap()
                .collect();

        let first = steps[0].as_rejection().unwrap();
        assert_eq!(first.violation, Violation::VcoRange);
        assert_eq!(first.divider, 70);
        assert_eq!(first.companion, 36.0);
        assert_abs_diff_eq!(first.vco, 1.008e9, epsilon = 1e-3);

        let plans: Vec<&PllPlan> = steps.iter().filter_map(SearchStep::as_plan).collect();
        assert_eq!(plans[0].divider, 68);
        assert!(plans.iter().all(|p| envelope.vco_in_band(p.vco)));
    }

    #[test]
    fn r_divider_applies_to_primary_only() {
        // 600 kHz is doubled once to 1.2 MHz: 1 GHz / 1.2 MHz = 833.3 -> 832.
        let s = search(Scenario::FractionalFeedback, 25e6, &[600e3, 10e6]).unwrap();
        assert_eq!(s.initial_divider(), 832);
        for plan in plans(s) {
            let primary = plan.primary();
            assert_eq!(primary.rdiv.divisor(), 2);
            assert_abs_diff_eq!(
                primary.achieved,
                plan.vco / plan.divider as f64 / 2.0,
                epsilon = 1e-9
            );
            assert!(primary.deviation.abs() < 1e-3);
            assert_eq!(plan.clocks[1].rdiv, PreDivider::NONE);
        }
    }

    #[test]
    fn clock_just_above_r_divider_floor_has_no_output_divider() {
        // 500 kHz doubles to exactly 1 MHz, which needs an output divider of 1000.
        let err = search(Scenario::FractionalFeedback, 25e6, &[500e3]).unwrap_err();
        assert!(matches!(
            err,
            PlanError::InitialDividerOutOfRange { divider: 1000, .. }
        ));
    }

    #[test]
    fn rejection_display() {
        let r = Rejection {
            scenario: Scenario::FractionalFeedback,
            divider: 100,
            companion: 100.0,
            vco: 1e9,
            violation: Violation::FeedbackRange,
        };
        assert_eq!(
            r.to_string(),
            "invalid feedback MS 100 (output MS=100, f_VCO=1000000000)"
        );

        let r = Rejection {
            companion: 36.0,
            vco: 1.008e9,
            divider: 70,
            violation: Violation::VcoRange,
            ..r
        };
        assert_eq!(
            r.to_string(),
            "invalid f_VCO 1008000000 (output MS=70, ratio=36)"
        );
    }
}
