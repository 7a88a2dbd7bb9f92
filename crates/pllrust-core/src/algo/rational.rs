//! Bounded-denominator best rational approximation.
//!
//! Multisynth dividers are programmed as `a + b/c` with a 20-bit `c`, so every
//! real-valued divider the search produces has to be squeezed into that form.
//! The approximation walks the continued-fraction expansion of the fractional
//! part and, at every step, also considers the semiconvergents between two
//! successive convergents. Those intermediate fractions are where the best
//! approximation under a denominator bound usually lives.
//!
//! # Model
//!
//! For a remainder $f_0 \in [0, 1)$ with expansion $[0; a_1, a_2, \dots]$ the
//! convergents obey
//!
//! $$h_n = a_n h_{n-1} + h_{n-2}, \qquad k_n = a_n k_{n-1} + k_{n-2}$$
//!
//! seeded with $(h_{-2}, h_{-1}) = (1, 0)$ and $(k_{-2}, k_{-1}) = (0, 1)$.
//! The candidates of step $n$ are $(m h_{n-1} + h_{n-2}) / (m k_{n-1} + k_{n-2})$
//! for $m \in [\lceil a_n / 2 \rceil, a_n]$.
//!
//! The candidates are produced lazily by [`ContinuedFraction`] and reduced with
//! a single fold that keeps the closest fraction seen so far.

use crate::config::approx::{EPSILON, MAX_STEPS};
use crate::types::Ratio;

/// Returns the best `a + b/c` approximation of `value` with `c <= max_denominator`.
///
/// `value` must be finite and non-negative. The result always satisfies the
/// [`Ratio`] invariant; when no fraction beats the bare integer part the
/// result is `a + 0/1`. Values whose whole part does not fit a `u32`
/// saturate to `u32::MAX + 0/1`.
///
/// # Example
///
/// ```
/// use pllrust_core::approximate;
///
/// let r = approximate(39.76, 1_048_575);
/// assert_eq!((r.a(), r.b(), r.c()), (39, 19, 25));
/// ```
pub fn approximate(value: f64, max_denominator: u32) -> Ratio {
    debug_assert!(value.is_finite() && value >= 0.0, "value = {value}");

    let whole = value.trunc();
    if whole >= u32::MAX as f64 {
        return Ratio::integer(u32::MAX);
    }
    let f0 = value - whole;
    let a = whole as u32;

    let start = Best {
        h: 0,
        k: 1,
        error: f0,
    };
    let best = ContinuedFraction::new(f0, max_denominator as u64)
        .flat_map(|step| step.semiconvergents(max_denominator as u64))
        .fold(start, |best, (h, k)| best.consider(h, k, f0));

    // h <= k <= max_denominator, so both fit the register width.
    Ratio::new(a, best.h as u32, best.k as u32)
}

/// Best-so-far accumulator of the fold.
#[derive(Debug, Clone, Copy)]
struct Best {
    h: u64,
    k: u64,
    error: f64,
}

impl Best {
    /// Keeps the strictly closer of `self` and `h/k`; ties keep the earlier one.
    #[inline]
    fn consider(self, h: u64, k: u64, target: f64) -> Self {
        let error = (h as f64 / k as f64 - target).abs();
        if error < self.error {
            Best { h, k, error }
        } else {
            self
        }
    }
}

/// One step of the expansion: the new partial quotient together with the two
/// convergents preceding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionStep {
    /// Partial quotient $a_n$.
    pub term: u64,
    pub h_prev: u64,
    pub h_cur: u64,
    pub k_prev: u64,
    pub k_cur: u64,
}

impl ExpansionStep {
    /// Candidates $(m h_{cur} + h_{prev}, m k_{cur} + k_{prev})$ for
    /// $m \in [(a_n + 1)/2, a_n]$, cut off at the first denominator above
    /// `max_denominator`.
    pub fn semiconvergents(self, max_denominator: u64) -> impl Iterator<Item = (u64, u64)> {
        ((self.term + 1) / 2..=self.term)
            .map(move |m| (m * self.h_cur + self.h_prev, m * self.k_cur + self.k_prev))
            .take_while(move |&(_, k)| k <= max_denominator)
    }
}

/// Lazy continued-fraction expansion of a remainder in `[0, 1)`.
///
/// The iterator ends when the remainder drops to [`EPSILON`], after
/// [`MAX_STEPS`] steps, or once the last full convergent's denominator exceeds
/// the bound (every later candidate would exceed it too).
#[derive(Debug, Clone)]
pub struct ContinuedFraction {
    remainder: f64,
    h: [u64; 2],
    k: [u64; 2],
    max_denominator: u64,
    steps: usize,
}

impl ContinuedFraction {
    pub fn new(remainder: f64, max_denominator: u64) -> Self {
        Self {
            remainder,
            // The fractional part has a_0 = 0.
            h: [1, 0],
            k: [0, 1],
            max_denominator,
            steps: 0,
        }
    }
}

impl Iterator for ContinuedFraction {
    type Item = ExpansionStep;

    fn next(&mut self) -> Option<Self::Item> {
        if self.steps >= MAX_STEPS
            || self.remainder <= EPSILON
            || self.k[1] > self.max_denominator
        {
            return None;
        }
        self.steps += 1;

        let reciprocal = 1.0 / self.remainder;
        let term_f = reciprocal.trunc();
        self.remainder = reciprocal - term_f;
        let term = term_f as u64;

        let step = ExpansionStep {
            term,
            h_prev: self.h[0],
            h_cur: self.h[1],
            k_prev: self.k[0],
            k_cur: self.k[1],
        };

        // k[1] <= max_denominator and term < 1/EPSILON, so this cannot overflow.
        self.h = [self.h[1], term * self.h[1] + self.h[0]];
        self.k = [self.k[1], term * self.k[1] + self.k[0]];

        Some(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::multisynth::MAX_DENOMINATOR;

    fn triple(r: Ratio) -> (u32, u32, u32) {
        (r.a(), r.b(), r.c())
    }

    #[test]
    fn integers_have_no_fraction() {
        for v in [0.0, 1.0, 4.0, 38.0, 900.0] {
            assert_eq!(triple(approximate(v, MAX_DENOMINATOR)), (v as u32, 0, 1));
        }
    }

    #[test]
    fn simple_fractions_are_exact() {
        assert_eq!(triple(approximate(0.5, MAX_DENOMINATOR)), (0, 1, 2));
        assert_eq!(triple(approximate(2.25, MAX_DENOMINATOR)), (2, 1, 4));
        assert_eq!(triple(approximate(39.76, MAX_DENOMINATOR)), (39, 19, 25));
        assert_eq!(triple(approximate(10.0 + 1.0 / 3.0, MAX_DENOMINATOR)), (10, 1, 3));
    }

    #[test]
    fn pi_with_small_denominators() {
        let pi = std::f64::consts::PI;
        assert_eq!(triple(approximate(pi, 7)), (3, 1, 7));
        assert_eq!(triple(approximate(pi, 56)), (3, 1, 7));
        // Semiconvergents between 22/7 and 333/106 win once they fit.
        assert_eq!(triple(approximate(pi, 57)), (3, 8, 57));
        assert_eq!(triple(approximate(pi, 106)), (3, 15, 106));
        // 355/113 is the famous one.
        assert_eq!(triple(approximate(pi, 113)), (3, 16, 113));
    }

    #[test]
    fn denominator_one_rounds_down_or_carries() {
        // 0.3 is closer to 0 than to 1.
        assert_eq!(triple(approximate(5.3, 1)), (5, 0, 1));
        // 0.7 is closer to 1: 1/1 is normalized into the whole part.
        assert_eq!(triple(approximate(5.7, 1)), (6, 0, 1));
    }

    #[test]
    fn whole_part_beyond_register_saturates() {
        assert_eq!(triple(approximate(5_847_058_823.53, 1)), (u32::MAX, 0, 1));
        assert_eq!(triple(approximate(1e300, MAX_DENOMINATOR)), (u32::MAX, 0, 1));
        // Just below the limit the fraction still carries without wrapping.
        let r = approximate(u32::MAX as f64 - 0.25, 1);
        assert_eq!(triple(r), (u32::MAX, 0, 1));
    }

    #[test]
    fn tiny_fraction_below_epsilon_is_dropped() {
        assert_eq!(triple(approximate(7.000_000_1, MAX_DENOMINATOR)), (7, 0, 1));
    }

    #[test]
    fn denominator_bound_is_respected() {
        let v = 1.0 / 1_048_573.0 + 12.0 + 0.123_456_789;
        for bound in [1u32, 2, 10, 1000, 65_535, MAX_DENOMINATOR] {
            let r = approximate(v, bound);
            assert!(r.c() <= bound, "c = {} > {}", r.c(), bound);
            assert!(r.b() < r.c() || (r.b() == 0 && r.c() == 1));
        }
    }

    #[test]
    fn expansion_of_known_fraction() {
        // 0.76 = [0; 1, 3, 6]
        let terms: Vec<u64> = ContinuedFraction::new(0.76, 1_000_000)
            .map(|s| s.term)
            .collect();
        assert!(terms.starts_with(&[1, 3]));
        assert!(terms.len() <= 4);
    }

    #[test]
    fn expansion_is_capped() {
        let golden = (5f64.sqrt() - 1.0) / 2.0;
        let steps = ContinuedFraction::new(golden, u32::MAX as u64).count();
        assert!(steps <= MAX_STEPS);
    }

    #[test]
    fn semiconvergent_window() {
        let step = ExpansionStep {
            term: 6,
            h_prev: 1,
            h_cur: 3,
            k_prev: 1,
            k_cur: 4,
        };
        let candidates: Vec<_> = step.semiconvergents(1000).collect();
        assert_eq!(candidates, vec![(10, 13), (13, 17), (16, 21), (19, 25)]);

        let cut: Vec<_> = step.semiconvergents(20).collect();
        assert_eq!(cut, vec![(10, 13), (13, 17)]);
    }

    #[test]
    fn approximate_is_deterministic() {
        let v = 47.123_456_789;
        assert_eq!(approximate(v, MAX_DENOMINATOR), approximate(v, MAX_DENOMINATOR));
    }
}
