//! Input conditioning with power-of-two pre-dividers.
//!
//! Before any PLL arithmetic the reference is brought under the PLL input
//! ceiling with CLKIN_DIV, and the primary clock is raised above the
//! multisynth floor by planning an R-divider after its output stage.

use tracing::debug;

use crate::config::ChipEnvelope;
use crate::types::{Frequency, PlanError};

/// A power-of-two divider, stored as its exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PreDivider(u8);

impl PreDivider {
    pub const NONE: PreDivider = PreDivider(0);

    pub const fn new(exponent: u8) -> Self {
        Self(exponent)
    }

    /// The register value (`log2` of the division).
    #[inline]
    pub const fn exponent(self) -> u8 {
        self.0
    }

    /// The actual division factor, `1 << exponent`.
    #[inline]
    pub const fn divisor(self) -> u32 {
        1 << self.0
    }

    pub const fn is_active(self) -> bool {
        self.0 > 0
    }
}

/// Reference and primary clock after pre-division.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConditionedInput {
    /// Raw reference as supplied.
    pub reference: Frequency,
    /// CLKIN_DIV applied to the reference.
    pub clkin_div: PreDivider,
    /// Raw primary clock as requested.
    pub primary: Frequency,
    /// R-divider planned for the primary clock.
    pub rdiv: PreDivider,
}

impl ConditionedInput {
    /// The PLL input frequency, `reference / CLKIN_DIV`.
    #[inline]
    pub fn pll_input(&self) -> f64 {
        self.reference.hz() / self.clkin_div.divisor() as f64
    }

    /// The frequency the primary multisynth has to produce,
    /// `primary * R_DIV`.
    #[inline]
    pub fn primary_multisynth(&self) -> f64 {
        self.primary.hz() * self.rdiv.divisor() as f64
    }
}

/// Normalizes the reference and primary clock into their legal sub-bands.
///
/// # Errors
///
/// * [`PlanError::ReferenceOutOfRange`] if `reference` is outside the chip's
///   absolute input range (both ends inclusive).
/// * [`PlanError::ClockTooLow`] if `primary` cannot be doubled above the
///   R-divider floor within the available exponents.
pub fn condition(
    reference: Frequency,
    primary: Frequency,
    envelope: &ChipEnvelope,
) -> Result<ConditionedInput, PlanError> {
    let ref_hz = reference.hz();
    if !(envelope.clkin_min..=envelope.clkin_max).contains(&ref_hz) {
        return Err(PlanError::ReferenceOutOfRange {
            reference: ref_hz,
            min: envelope.clkin_min,
            max: envelope.clkin_max,
        });
    }

    let mut pll_input = ref_hz;
    let mut clkin_div = 0;
    while pll_input > envelope.pll_input_max && clkin_div < envelope.clkin_div_max_exp {
        pll_input /= 2.0;
        clkin_div += 1;
    }

    let mut clock = primary.hz();
    let mut rdiv = 0;
    while clock < envelope.rdiv_min_freq && rdiv < envelope.rdiv_max_exp {
        clock *= 2.0;
        rdiv += 1;
    }
    if clock < envelope.rdiv_min_freq {
        return Err(PlanError::ClockTooLow {
            clock: primary.hz(),
            min: envelope.rdiv_min_freq / (1u32 << envelope.rdiv_max_exp) as f64,
        });
    }

    debug!(clkin_div, rdiv, pll_input, clock, "conditioned input");

    Ok(ConditionedInput {
        reference,
        clkin_div: PreDivider::new(clkin_div),
        primary,
        rdiv: PreDivider::new(rdiv),
    })
}
