//! Actor protocol invoked once per control period
//!
//! The host simulator calls an actor after every control period with the
//! sensor readings of that period (the [`Epoch`]) and the time window for
//! which new motor targets are needed. The actor answers with a (possibly
//! infinite) stream of [`MotorTargets`], applied one per step.
//!
//! Targets are one step ahead: they are applied but not yet executed when
//! the next epoch is reported.

use std::collections::BTreeMap;

use crate::gait::MotorTargets;
use crate::{Error, Result};

/// Sensor readings of one control period, keyed by sensor name.
///
/// May be empty; the simulator guarantees this at least once, during
/// initialization.
pub type Epoch = BTreeMap<String, Vec<f64>>;

/// Lazy sequence of motor targets returned by an actor.
pub type MotorTargetStream = Box<dyn Iterator<Item = MotorTargets>>;

/// Minimum number of targets needed to cover `[time_start_ms, time_end_ms)`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if `step_size_ms` is zero
pub fn required_targets(time_start_ms: u64, time_end_ms: u64, step_size_ms: u64) -> Result<usize> {
    if step_size_ms == 0 {
        return Err(Error::InvalidInput("step size must be positive".to_string()));
    }
    let span = time_end_ms.saturating_sub(time_start_ms);
    usize::try_from(span.div_ceil(step_size_ms))
        .map_err(|_| Error::InvalidInput(format!("control window of {span} ms is too large")))
}

/// Capability of producing motor targets once per control period.
pub trait PuppyActor {
    /// Produce the motor targets for the window `[time_start_ms, time_end_ms)`.
    ///
    /// The returned stream must yield at least
    /// [`required_targets`]`(time_start_ms, time_end_ms, step_size_ms)` items.
    ///
    /// # Errors
    ///
    /// The default implementation always returns [`Error::NotImplemented`];
    /// concrete actors return their own failures (storage, exhausted sources).
    fn call(
        &mut self,
        epoch: &Epoch,
        time_start_ms: u64,
        time_end_ms: u64,
        step_size_ms: u64,
    ) -> Result<MotorTargetStream> {
        let _ = (epoch, time_start_ms, time_end_ms, step_size_ms);
        Err(Error::NotImplemented("PuppyActor::call"))
    }
}

impl<A: PuppyActor + ?Sized> PuppyActor for Box<A> {
    fn call(
        &mut self,
        epoch: &Epoch,
        time_start_ms: u64,
        time_end_ms: u64,
        step_size_ms: u64,
    ) -> Result<MotorTargetStream> {
        (**self).call(epoch, time_start_ms, time_end_ms, step_size_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Abstract;

    impl PuppyActor for Abstract {}

    #[test]
    fn test_abstract_actor_is_not_implemented() {
        let mut actor = Abstract;
        let result = actor.call(&Epoch::new(), 0, 100, 20);
        assert!(matches!(result, Err(Error::NotImplemented(_))));
    }

    #[test]
    fn test_boxed_actor_forwards() {
        let mut actor: Box<dyn PuppyActor> = Box::new(Abstract);
        assert!(actor.call(&Epoch::new(), 0, 100, 20).is_err());
    }

    #[test]
    fn test_required_targets_rounds_up() {
        assert_eq!(required_targets(0, 100, 20).unwrap(), 5);
        assert_eq!(required_targets(0, 101, 20).unwrap(), 6);
        assert_eq!(required_targets(40, 60, 20).unwrap(), 1);
    }

    #[test]
    fn test_required_targets_empty_window() {
        assert_eq!(required_targets(100, 100, 20).unwrap(), 0);
        assert_eq!(required_targets(200, 100, 20).unwrap(), 0);
    }

    #[test]
    fn test_required_targets_zero_step() {
        let err = required_targets(0, 100, 0).unwrap_err();
        assert!(err.to_string().contains("step size must be positive"));
    }
}
