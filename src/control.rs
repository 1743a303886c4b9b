//! Gait selection policies
//!
//! Each policy is a [`PuppyActor`] deciding which [`Gait`] drives the next
//! control period:
//!
//! - [`RandomGaitControl`]: uniform draw (with replacement) per call
//! - [`ConstantGaitControl`]: always the same gait
//! - [`SequentialGaitControl`]: next gait from an injected source
//! - [`TargetListControl`]: a fixed, pre-computed target list

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::actor::{required_targets, Epoch, MotorTargetStream, PuppyActor};
use crate::gait::{Gait, MotorTargets};
use crate::{Error, Result};

/// Randomly select one of the available gaits on every call.
///
/// The random source is explicit so experiments can be replayed from a seed.
///
/// # Example
///
/// ```rust
/// use pupy::actor::{Epoch, PuppyActor};
/// use pupy::control::RandomGaitControl;
/// use pupy::gait::{Gait, GaitParameters};
///
/// let params = GaitParameters {
///     amplitude: [1.0; 4],
///     frequency: [1.0; 4],
///     phase: [0.0; 4],
///     offset: [0.0; 4],
/// };
/// let mut control = RandomGaitControl::seeded(vec![Gait::named(params, "walk")], 7)?;
/// let targets: Vec<_> = control.call(&Epoch::new(), 0, 100, 20)?.take(5).collect();
/// assert_eq!(targets.len(), 5);
/// # Ok::<(), pupy::Error>(())
/// ```
#[derive(Debug)]
pub struct RandomGaitControl<R: Rng = StdRng> {
    gaits: Vec<Gait>,
    rng: R,
}

impl RandomGaitControl<StdRng> {
    /// Create a policy drawing from an entropy-seeded generator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `gaits` is empty
    pub fn from_entropy(gaits: Vec<Gait>) -> Result<Self> {
        Self::with_rng(gaits, StdRng::from_entropy())
    }

    /// Create a policy with a deterministic seed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `gaits` is empty
    pub fn seeded(gaits: Vec<Gait>, seed: u64) -> Result<Self> {
        Self::with_rng(gaits, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomGaitControl<R> {
    /// Create a policy drawing from the given random source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `gaits` is empty
    pub fn with_rng(gaits: Vec<Gait>, rng: R) -> Result<Self> {
        if gaits.is_empty() {
            return Err(Error::InvalidInput(
                "random gait control needs at least one gait".to_string(),
            ));
        }
        Ok(Self { gaits, rng })
    }

    /// Get the candidate gaits.
    #[must_use]
    pub fn gaits(&self) -> &[Gait] {
        &self.gaits
    }
}

impl<R: Rng> PuppyActor for RandomGaitControl<R> {
    fn call(
        &mut self,
        _epoch: &Epoch,
        time_start_ms: u64,
        _time_end_ms: u64,
        step_size_ms: u64,
    ) -> Result<MotorTargetStream> {
        // Non-empty by construction
        let gait = self
            .gaits
            .choose(&mut self.rng)
            .ok_or_else(|| Error::InvalidInput("no gait to choose from".to_string()))?;
        info!(gait = %gait, time_start_ms, "selected gait");
        Ok(Box::new(gait.iter(time_start_ms, step_size_ms)))
    }
}

/// Apply the same gait in every control period.
#[derive(Debug, Clone)]
pub struct ConstantGaitControl {
    gait: Gait,
}

impl ConstantGaitControl {
    /// Create a policy that always applies `gait`.
    #[must_use]
    pub const fn new(gait: Gait) -> Self {
        Self { gait }
    }

    /// Get the applied gait.
    #[must_use]
    pub const fn gait(&self) -> &Gait {
        &self.gait
    }
}

impl PuppyActor for ConstantGaitControl {
    fn call(
        &mut self,
        _epoch: &Epoch,
        time_start_ms: u64,
        _time_end_ms: u64,
        step_size_ms: u64,
    ) -> Result<MotorTargetStream> {
        Ok(Box::new(self.gait.iter(time_start_ms, step_size_ms)))
    }
}

/// Execute a predefined sequence of gaits, one per control period.
///
/// The source is advanced exactly once per call. It is the caller's
/// responsibility that it does not terminate before the experiment does;
/// an exhausted source fails with [`Error::GaitSourceExhausted`].
#[derive(Debug)]
pub struct SequentialGaitControl<I> {
    source: I,
}

impl<I: Iterator<Item = Gait>> SequentialGaitControl<I> {
    /// Create a policy pulling gaits from `source`.
    pub fn new<S>(source: S) -> Self
    where
        S: IntoIterator<IntoIter = I, Item = Gait>,
    {
        Self {
            source: source.into_iter(),
        }
    }
}

impl<I: Iterator<Item = Gait>> PuppyActor for SequentialGaitControl<I> {
    fn call(
        &mut self,
        _epoch: &Epoch,
        time_start_ms: u64,
        _time_end_ms: u64,
        step_size_ms: u64,
    ) -> Result<MotorTargetStream> {
        let gait = self.source.next().ok_or(Error::GaitSourceExhausted)?;
        info!(gait = %gait, time_start_ms, "next gait in sequence");
        Ok(Box::new(gait.iter(time_start_ms, step_size_ms)))
    }
}

/// Replay a fixed list of motor targets in every control period.
///
/// The list must cover the whole control window, i.e. hold at least
/// [`required_targets`] entries.
#[derive(Debug, Clone)]
pub struct TargetListControl {
    targets: Vec<MotorTargets>,
}

impl TargetListControl {
    /// Create a policy replaying `targets`.
    #[must_use]
    pub const fn new(targets: Vec<MotorTargets>) -> Self {
        Self { targets }
    }

    /// Get the replayed targets.
    #[must_use]
    pub fn targets(&self) -> &[MotorTargets] {
        &self.targets
    }
}

impl PuppyActor for TargetListControl {
    fn call(
        &mut self,
        _epoch: &Epoch,
        time_start_ms: u64,
        time_end_ms: u64,
        step_size_ms: u64,
    ) -> Result<MotorTargetStream> {
        let needed = required_targets(time_start_ms, time_end_ms, step_size_ms)?;
        if self.targets.len() < needed {
            return Err(Error::InvalidInput(format!(
                "target list holds {} entries, window [{time_start_ms}, {time_end_ms}) needs {needed}",
                self.targets.len()
            )));
        }
        Ok(Box::new(self.targets.clone().into_iter()))
    }
}
