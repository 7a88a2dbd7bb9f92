//! Range checks against the chip envelope.
//!
//! All predicates are pure; the search calls them inline at every candidate.

use crate::config::ChipEnvelope;

impl ChipEnvelope {
    /// `vco_min <= f <= vco_max`.
    #[inline]
    pub fn vco_in_band(&self, vco_hz: f64) -> bool {
        (self.vco_min..=self.vco_max).contains(&vco_hz)
    }

    /// Fractional feedback divider band.
    #[inline]
    pub fn feedback_in_band(&self, ratio: f64) -> bool {
        (self.feedback_min..=self.feedback_max).contains(&ratio)
    }

    /// Even integer feedback divider band.
    #[inline]
    pub fn feedback_even_in_band(&self, divider: u32) -> bool {
        (self.feedback_even_min..=self.feedback_even_max).contains(&divider)
    }

    /// Output divider band.
    #[inline]
    pub fn output_in_band(&self, ratio: f64) -> bool {
        (self.output_min as f64..=self.output_max as f64).contains(&ratio)
    }
}
