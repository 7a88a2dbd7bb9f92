use std::fmt::{self, Display};
use std::str::FromStr;

use crate::config::report::MAX_CLOCKS;

/// Error type for frequency planning.
///
/// Every variant is fatal for the run: the search never starts (or a whole
/// scenario is abandoned) when one of these is returned. Out-of-band
/// candidates met during the search are reported as
/// [`Rejection`](crate::Rejection)s instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    /// The raw reference frequency is outside the chip's input range.
    #[error("reference frequency {reference} Hz is out of range ({min} - {max} Hz)")]
    ReferenceOutOfRange { reference: f64, min: f64, max: f64 },

    /// The primary clock stays below the R-divider floor even after maximum
    /// pre-division.
    #[error("requested clock is too low: {clock} Hz (minimum {min} Hz)")]
    ClockTooLow { clock: f64, min: f64 },

    /// The first divider candidate of a scenario is already out of band.
    #[error("invalid initial {scenario} divider: {divider} (legal range {min} - {max})")]
    InitialDividerOutOfRange {
        scenario: Scenario,
        divider: u32,
        min: u32,
        max: u32,
    },

    /// The feedback divider was clamped to its maximum and the VCO floor is
    /// out of reach.
    #[error("invalid feedback MS: {divider} (f_VCO {vco} Hz below {min} Hz)")]
    VcoUnreachable { divider: u32, vco: f64, min: f64 },

    /// More target clocks than one PLL plan can carry.
    #[error("too many clocks: {count} (maximum is {max})")]
    TooManyClocks { count: usize, max: usize },

    /// No target clock was given.
    #[error("at least one target clock is required")]
    NoClocks,

    /// A frequency is not a finite positive number.
    #[error("invalid frequency: {value} Hz")]
    InvalidFrequency { value: f64 },
}

/// Error type for parsing frequency strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid frequency: '{input}'")]
pub struct ParseFrequencyError {
    /// The input string that failed to parse.
    pub input: String,
}

// ============================================================================
// Frequency
// ============================================================================

/// A frequency value stored in Hertz.
///
/// Parses from strings like `"25MHz"`, `"14.2 mhz"`, `"32768Hz"` and bare
/// numbers (`"25e6"`, interpreted as Hz).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Frequency(f64);

impl Frequency {
    /// Creates a new frequency from a value in Hertz.
    pub const fn new(hz: f64) -> Self {
        Self(hz)
    }

    /// Creates a frequency, rejecting values that are not finite and positive.
    pub fn try_new(hz: f64) -> Result<Self, PlanError> {
        if hz.is_finite() && hz > 0.0 {
            Ok(Self(hz))
        } else {
            Err(PlanError::InvalidFrequency { value: hz })
        }
    }

    /// Returns the frequency in Hertz.
    #[inline]
    pub const fn hz(self) -> f64 {
        self.0
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hz = self.0;
        if hz >= 1e9 {
            write!(f, "{}GHz", hz / 1e9)
        } else if hz >= 1e6 {
            write!(f, "{}MHz", hz / 1e6)
        } else if hz >= 1e3 {
            write!(f, "{}kHz", hz / 1e3)
        } else {
            write!(f, "{hz}Hz")
        }
    }
}

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseFrequencyError {
            input: s.to_string(),
        };

        let lower = s.to_ascii_lowercase();
        let (number, scale) = [("ghz", 1e9), ("mhz", 1e6), ("khz", 1e3), ("hz", 1.0)]
            .iter()
            .find_map(|(suffix, scale)| lower.strip_suffix(suffix).map(|n| (n, *scale)))
            .unwrap_or((lower.as_str(), 1.0));

        let value: f64 = number.trim().parse().map_err(|_| err())?;
        Ok(Frequency(value * scale))
    }
}

// ============================================================================
// Ratio
// ============================================================================

/// A divider ratio `a + b/c` as programmed into a multisynth.
///
/// Invariant: `b == 0` implies `c == 1`, otherwise `0 < b < c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ratio {
    a: u32,
    b: u32,
    c: u32,
}

impl Ratio {
    /// Builds a normalized ratio.
    ///
    /// A numerator at or above the denominator is carried into `a`, and a
    /// zero numerator collapses the denominator to 1. A zero denominator is
    /// treated as 1.
    pub fn new(a: u32, b: u32, c: u32) -> Self {
        let c = c.max(1);
        let a = a.saturating_add(b / c);
        let b = b % c;
        if b == 0 {
            Self::integer(a)
        } else {
            Self { a, b, c }
        }
    }

    /// A pure integer ratio.
    pub const fn integer(a: u32) -> Self {
        Self { a, b: 0, c: 1 }
    }

    /// Whole part.
    #[inline]
    pub const fn a(&self) -> u32 {
        self.a
    }

    /// Numerator of the fractional part.
    #[inline]
    pub const fn b(&self) -> u32 {
        self.b
    }

    /// Denominator of the fractional part.
    #[inline]
    pub const fn c(&self) -> u32 {
        self.c
    }

    /// The ratio as a real number.
    #[inline]
    pub fn value(&self) -> f64 {
        self.a as f64 + self.b as f64 / self.c as f64
    }

    pub fn is_integer(&self) -> bool {
        self.b == 0
    }

    pub fn kind(&self) -> RatioKind {
        match (self.b, self.a % 2) {
            (0, 0) => RatioKind::EvenInteger,
            (0, _) => RatioKind::OddInteger,
            _ => RatioKind::Fractional,
        }
    }
}

impl Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {} / {}", self.a, self.b, self.c)
    }
}

/// Hardware friendliness of a divider ratio.
///
/// Even integers are the cheapest multisynth configuration. Odd integers are
/// reported separately but never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum RatioKind {
    EvenInteger,
    OddInteger,
    Fractional,
}

impl Display for RatioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RatioKind::EvenInteger => write!(f, "even integer"),
            RatioKind::OddInteger => write!(f, "integer"),
            RatioKind::Fractional => write!(f, "fractional"),
        }
    }
}

// ============================================================================
// Scenario
// ============================================================================

/// Which divider the search walks as an even integer.
///
/// The other divider of the pair is approximated as a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Scenario {
    /// Fractional feedback divider, even integer output divider.
    FractionalFeedback,
    /// Even integer feedback divider, fractional output divider.
    FractionalOutput,
}

impl Scenario {
    /// Both scenarios in search order.
    pub const ALL: [Scenario; 2] = [Scenario::FractionalFeedback, Scenario::FractionalOutput];

    /// One-line description used as a report header.
    pub fn description(&self) -> &'static str {
        match self {
            Scenario::FractionalFeedback => {
                "N-frac for feedback MS and even integer for output MS"
            }
            Scenario::FractionalOutput => "even integer for feedback MS and N-frac for output MS",
        }
    }
}

impl Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::FractionalFeedback => write!(f, "output MS"),
            Scenario::FractionalOutput => write!(f, "feedback MS"),
        }
    }
}

// ============================================================================
// Target clocks
// ============================================================================

/// The requested output frequencies, primary clock first.
///
/// Holds between one and [`MAX_CLOCKS`] entries; the bound is enforced when
/// the collection is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetClocks {
    clocks: [Frequency; MAX_CLOCKS],
    len: usize,
}

impl TargetClocks {
    /// Validates count and positivity of the requested clocks.
    pub fn new(clocks: &[Frequency]) -> Result<Self, PlanError> {
        if clocks.is_empty() {
            return Err(PlanError::NoClocks);
        }
        if clocks.len() > MAX_CLOCKS {
            return Err(PlanError::TooManyClocks {
                count: clocks.len(),
                max: MAX_CLOCKS,
            });
        }

        let mut slots = [Frequency::default(); MAX_CLOCKS];
        for (slot, clock) in slots.iter_mut().zip(clocks) {
            *slot = Frequency::try_new(clock.hz())?;
        }

        Ok(Self {
            clocks: slots,
            len: clocks.len(),
        })
    }

    /// Clock 0, the one the search is driven by.
    pub fn primary(&self) -> Frequency {
        self.clocks[0]
    }

    /// Clocks 1.., paired with their index.
    pub fn secondary(&self) -> impl Iterator<Item = (usize, Frequency)> + '_ {
        self.as_slice().iter().copied().enumerate().skip(1)
    }

    pub fn as_slice(&self) -> &[Frequency] {
        &self.clocks[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: construction requires at least one clock.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl TryFrom<&[Frequency]> for TargetClocks {
    type Error = PlanError;

    fn try_from(clocks: &[Frequency]) -> Result<Self, Self::Error> {
        Self::new(clocks)
    }
}
