//! Sine-wave gait generator
//!
//! Each actuator follows the parametrised sine
//!
//! ```text
//! A * sin(2π (f * t / 1000 - p)) + B
//! ```
//!
//! with amplitude `A`, frequency `f` (Hz), phase `p` (cycles), offset `B` and
//! `t` in milliseconds. Actuator order is front-left, front-right, rear-left,
//! rear-right.

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of actuators (legs) driven by a gait
pub const ACTUATOR_COUNT: usize = 4;

/// Step size used when a gait is iterated directly
pub const DEFAULT_STEP_MS: u64 = 20;

/// Name given to gaits constructed without one
pub const UNKNOWN_GAIT_NAME: &str = "Unknown gait";

/// One target per actuator: front-left, front-right, rear-left, rear-right
pub type MotorTargets = [f64; ACTUATOR_COUNT];

/// Per-actuator sine parameters.
///
/// Fixed-size arrays keep the four sequences the same length as the
/// actuator count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaitParameters {
    /// Amplitude per actuator
    pub amplitude: [f64; ACTUATOR_COUNT],
    /// Frequency per actuator, in Hz
    pub frequency: [f64; ACTUATOR_COUNT],
    /// Phase per actuator, in cycles
    pub phase: [f64; ACTUATOR_COUNT],
    /// Offset per actuator
    pub offset: [f64; ACTUATOR_COUNT],
}

impl GaitParameters {
    /// Evaluate all actuator targets at `time_ms`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn evaluate(&self, time_ms: u64) -> MotorTargets {
        let seconds = time_ms as f64 / 1e3;
        std::array::from_fn(|j| {
            self.amplitude[j].mul_add(
                (2.0 * PI * self.frequency[j].mul_add(seconds, -self.phase[j])).sin(),
                self.offset[j],
            )
        })
    }
}

/// Motor target generator wrapping a parameter set and a display name.
///
/// Gaits are immutable and stateless with respect to time: every call to
/// [`Gait::iter`] starts a fresh sequence.
///
/// # Example
///
/// ```rust
/// use pupy::gait::{Gait, GaitParameters};
///
/// let gait = Gait::new(GaitParameters {
///     amplitude: [1.0; 4],
///     frequency: [1.0; 4],
///     phase: [0.0; 4],
///     offset: [0.0; 4],
/// });
///
/// // 250 ms into a 1 Hz sine is its peak
/// let first = gait.iter(0, 250).next().unwrap();
/// assert!((first[0] - 1.0).abs() < 1e-12);
/// assert_eq!(gait.name(), "Unknown gait");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gait {
    #[serde(default = "unknown_gait_name")]
    name: String,
    #[serde(flatten)]
    params: GaitParameters,
}

fn unknown_gait_name() -> String {
    UNKNOWN_GAIT_NAME.to_string()
}

impl Gait {
    /// Create an unnamed gait.
    #[must_use]
    pub fn new(params: GaitParameters) -> Self {
        Self::named(params, UNKNOWN_GAIT_NAME)
    }

    /// Create a gait with a display name.
    #[must_use]
    pub fn named(params: GaitParameters, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Get the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the sine parameters.
    #[must_use]
    pub const fn params(&self) -> &GaitParameters {
        &self.params
    }

    /// Produce the motor target sequence starting after `time_start_ms`.
    ///
    /// Element `i` is evaluated at `time_start_ms + (i + 1) * step_ms`.
    /// The sequence never ends.
    #[must_use]
    pub const fn iter(&self, time_start_ms: u64, step_ms: u64) -> GaitIter {
        GaitIter {
            params: self.params,
            current_ms: time_start_ms,
            step_ms,
        }
    }
}

impl fmt::Display for Gait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl<'a> IntoIterator for &'a Gait {
    type Item = MotorTargets;
    type IntoIter = GaitIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter(0, DEFAULT_STEP_MS)
    }
}

/// Infinite iterator over motor targets of a gait.
#[derive(Debug, Clone)]
pub struct GaitIter {
    params: GaitParameters,
    current_ms: u64,
    step_ms: u64,
}

impl GaitIter {
    /// Time (ms) at which the next yielded target applies.
    #[must_use]
    pub const fn next_time_ms(&self) -> u64 {
        self.current_ms.saturating_add(self.step_ms)
    }
}

impl Iterator for GaitIter {
    type Item = MotorTargets;

    fn next(&mut self) -> Option<Self::Item> {
        self.current_ms = self.next_time_ms();
        Some(self.params.evaluate(self.current_ms))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

impl std::iter::FusedIterator for GaitIter {}
