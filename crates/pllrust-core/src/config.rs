//! Chip operating envelope and planner tuning parameters.
//!
//! This module centralizes every numeric limit of the Si5351 family so the
//! conditioner, the validator and the search all agree on the same figures.
//!
//! # Sources
//!
//! The values come from the Si5351A/B/C datasheet and AN619 (register map):
//! the PLL VCO runs between 600 and 900 MHz nominally, but the parts are
//! routinely operated up to 1 GHz, which is the ceiling used here.

/// Reference input (CLKIN / XTAL) limits.
pub mod clkin {
    /// Lowest accepted raw reference frequency, in Hz.
    pub const MIN_FREQ: f64 = 10e6;

    /// Highest accepted raw reference frequency, in Hz (inclusive).
    pub const MAX_FREQ: f64 = 100e6;

    /// The PLL input must not exceed this after CLKIN_DIV is applied.
    pub const PLL_INPUT_MAX: f64 = 40e6;

    /// CLKIN_DIV is a power of two: 1, 2, 4 or 8.
    pub const MAX_DIV_EXP: u8 = 3;
}

/// VCO operating band.
pub mod vco {
    /// VCO floor, in Hz.
    pub const MIN_FREQ: f64 = 600e6;

    /// VCO ceiling, in Hz.
    pub const MAX_FREQ: f64 = 1000e6;
}

/// Multisynth (feedback and output) divider limits.
pub mod multisynth {
    /// Smallest fractional feedback ratio (`15 + 0/1048575`).
    pub const FEEDBACK_MIN: f64 = 15.0;

    /// Largest feedback ratio.
    pub const FEEDBACK_MAX: f64 = 90.0;

    /// Smallest even integer feedback divider.
    pub const FEEDBACK_EVEN_MIN: u32 = 16;

    /// Largest even integer feedback divider.
    pub const FEEDBACK_EVEN_MAX: u32 = 90;

    /// Smallest output divider ratio.
    pub const OUTPUT_MIN: u32 = 4;

    /// Largest output divider ratio.
    pub const OUTPUT_MAX: u32 = 900;

    /// The `c` parameter is a 20-bit register field.
    pub const MAX_DENOMINATOR: u32 = (1 << 20) - 1;
}

/// Output R-divider limits.
pub mod rdiv {
    /// Output clocks below this frequency need the R-divider.
    pub const MIN_OUTPUT_FREQ: f64 = 1e6;

    /// R_DIV is a power of two up to 128.
    pub const MAX_DIV_EXP: u8 = 7;
}

/// Continued-fraction expansion parameters.
pub mod approx {
    /// Remainder below which the expansion stops.
    ///
    /// This is a stopping rule, not an accuracy guarantee: the returned
    /// fraction is still the best one visited.
    pub const EPSILON: f64 = 1e-5;

    /// Hard ceiling on expansion steps.
    pub const MAX_STEPS: usize = 100;
}

/// Reporting parameters.
pub mod report {
    /// Absolute deviation, in Hz, under which a clock counts as exact.
    pub const CLOCK_TOLERANCE: f64 = 1e-8;

    /// Number of output clocks that can share one PLL in a plan.
    pub const MAX_CLOCKS: usize = 3;
}

/// The numeric envelope of one chip variant.
///
/// `ChipEnvelope::default()` carries the Si5351 figures from the constant
/// modules above. Everything in the planner takes the envelope by reference,
/// so a variant part can be described without touching the algorithms.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChipEnvelope {
    pub clkin_min: f64,
    pub clkin_max: f64,
    pub pll_input_max: f64,
    pub clkin_div_max_exp: u8,
    pub vco_min: f64,
    pub vco_max: f64,
    pub feedback_min: f64,
    pub feedback_max: f64,
    pub feedback_even_min: u32,
    pub feedback_even_max: u32,
    pub output_min: u32,
    pub output_max: u32,
    pub max_denominator: u32,
    pub rdiv_min_freq: f64,
    pub rdiv_max_exp: u8,
}

impl Default for ChipEnvelope {
    fn default() -> Self {
        Self {
            clkin_min: clkin::MIN_FREQ,
            clkin_max: clkin::MAX_FREQ,
            pll_input_max: clkin::PLL_INPUT_MAX,
            clkin_div_max_exp: clkin::MAX_DIV_EXP,
            vco_min: vco::MIN_FREQ,
            vco_max: vco::MAX_FREQ,
            feedback_min: multisynth::FEEDBACK_MIN,
            feedback_max: multisynth::FEEDBACK_MAX,
            feedback_even_min: multisynth::FEEDBACK_EVEN_MIN,
            feedback_even_max: multisynth::FEEDBACK_EVEN_MAX,
            output_min: multisynth::OUTPUT_MIN,
            output_max: multisynth::OUTPUT_MAX,
            max_denominator: multisynth::MAX_DENOMINATOR,
            rdiv_min_freq: rdiv::MIN_OUTPUT_FREQ,
            rdiv_max_exp: rdiv::MAX_DIV_EXP,
        }
    }
}

impl ChipEnvelope {
    /// Returns a copy with a tighter fraction denominator.
    ///
    /// The value is capped at the envelope's own maximum and floored at 1.
    pub fn with_max_denominator(self, max_denominator: u32) -> Self {
        Self {
            max_denominator: max_denominator.clamp(1, self.max_denominator),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_are_ordered() {
        assert!(clkin::MIN_FREQ < clkin::PLL_INPUT_MAX);
        assert!(clkin::PLL_INPUT_MAX < clkin::MAX_FREQ);
        assert!(vco::MIN_FREQ < vco::MAX_FREQ);
        assert!(multisynth::FEEDBACK_MIN < multisynth::FEEDBACK_MAX);
        assert!(multisynth::OUTPUT_MIN < multisynth::OUTPUT_MAX);
    }

    #[test]
    fn even_feedback_band_inside_fractional_band() {
        assert!(multisynth::FEEDBACK_EVEN_MIN as f64 >= multisynth::FEEDBACK_MIN);
        assert!(multisynth::FEEDBACK_EVEN_MAX as f64 <= multisynth::FEEDBACK_MAX);
        assert_eq!(multisynth::FEEDBACK_EVEN_MIN % 2, 0);
        assert_eq!(multisynth::FEEDBACK_EVEN_MAX % 2, 0);
    }

    #[test]
    fn clkin_div_reaches_pll_input() {
        // The largest reference must fit the PLL input after maximum division.
        let divided = clkin::MAX_FREQ / (1u32 << clkin::MAX_DIV_EXP) as f64;
        assert!(divided <= clkin::PLL_INPUT_MAX);
    }

    #[test]
    fn denominator_is_twenty_bits() {
        assert_eq!(multisynth::MAX_DENOMINATOR, 1_048_575);
    }

    #[test]
    fn default_envelope_matches_constants() {
        let env = ChipEnvelope::default();
        assert_eq!(env.vco_min, vco::MIN_FREQ);
        assert_eq!(env.vco_max, vco::MAX_FREQ);
        assert_eq!(env.output_max, multisynth::OUTPUT_MAX);
        assert_eq!(env.max_denominator, multisynth::MAX_DENOMINATOR);
    }

    #[test]
    fn with_max_denominator_is_capped() {
        let env = ChipEnvelope::default();
        assert_eq!(env.with_max_denominator(1000).max_denominator, 1000);
        assert_eq!(
            env.with_max_denominator(u32::MAX).max_denominator,
            multisynth::MAX_DENOMINATOR
        );
        assert_eq!(env.with_max_denominator(0).max_denominator, 1);
    }
}
