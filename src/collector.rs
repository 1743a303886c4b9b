//! Sensor data collection decorator
//!
//! [`PuppyCollector`] wraps any [`PuppyActor`]. On every call it appends the
//! epoch to the run-group it created in a [`RunStore`], flushes, and then
//! delegates to the wrapped actor, returning its targets unchanged.
//!
//! If the host ends a run early (e.g. when the robot tumbles), the last epoch
//! may be incomplete. The host must allow a grace period longer than one
//! control period before tearing the collector down; see [`GracePeriod`].

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use crate::actor::{Epoch, MotorTargetStream, PuppyActor};
use crate::storage::{AttrValue, JournalRunStore, ParquetRunStore, RunStore};
use crate::{Error, Result};

/// Run-group attribute holding the creation time (unix seconds)
pub const TIME_ATTRIBUTE: &str = "time";

/// Run-group attribute holding the configured grace period
pub const GRACE_PERIOD_ATTRIBUTE: &str = "grace_period_ms";

/// Collector persisting to a JSON-lines journal
pub type JournalCollector<A> = PuppyCollector<A, JournalRunStore>;

/// Collector persisting to a Parquet snapshot
pub type ParquetCollector<A> = PuppyCollector<A, ParquetRunStore>;

/// Time the host waits after an early stop before discarding the collector.
///
/// There is no default; the value depends on the host's control period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GracePeriod {
    millis: u64,
}

impl GracePeriod {
    /// Grace period of `millis` milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    /// Length in milliseconds.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.millis
    }

    /// Check if the grace period is longer than one control period.
    #[must_use]
    pub const fn covers(&self, control_period_ms: u64) -> bool {
        self.millis > control_period_ms
    }
}

/// Builder for [`PuppyCollector`].
#[derive(Debug)]
pub struct CollectorBuilder<A> {
    actor: A,
    headers: BTreeMap<String, AttrValue>,
    run_prefix: String,
    grace_period: Option<GracePeriod>,
}

impl<A: PuppyActor> CollectorBuilder<A> {
    /// Create a builder wrapping `actor`.
    #[must_use]
    pub fn new(actor: A) -> Self {
        Self {
            actor,
            headers: BTreeMap::new(),
            run_prefix: String::new(),
            grace_period: None,
        }
    }

    /// Add a header stored as a run-group attribute.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add several headers at once.
    #[must_use]
    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<AttrValue>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Prefix for run-group names (default none: `0`, `1`, ...).
    #[must_use]
    pub fn run_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.run_prefix = prefix.into();
        self
    }

    /// Grace period the host applies after an early stop.
    #[must_use]
    pub const fn grace_period(mut self, grace_period: GracePeriod) -> Self {
        self.grace_period = Some(grace_period);
        self
    }

    /// Open (or create) the store at `path` and start a new run-group.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be opened or the run-group cannot
    /// be created
    pub fn open<S: RunStore>(self, path: impl AsRef<Path>) -> Result<PuppyCollector<A, S>> {
        let store = S::open(path.as_ref())?;
        self.with_store(store)
    }

    /// Start a new run-group in an already opened store.
    ///
    /// # Errors
    ///
    /// Returns error if a header is a non-finite float, or the run-group
    /// cannot be created
    #[allow(clippy::cast_precision_loss)]
    pub fn with_store<S: RunStore>(self, mut store: S) -> Result<PuppyCollector<A, S>> {
        if let Some((key, value)) = self.headers.iter().find(|(_, v)| !v.is_storable()) {
            return Err(Error::InvalidInput(format!(
                "header '{key}' must be finite, got {value}"
            )));
        }

        let run = format!("{}{}", self.run_prefix, store.run_count());
        store.create_run(&run)?;

        let now = Utc::now();
        let timestamp = now.timestamp_micros() as f64 / 1e6;
        store.set_attribute(&run, TIME_ATTRIBUTE, AttrValue::Float(timestamp))?;
        for (key, value) in self.headers {
            store.set_attribute(&run, &key, value)?;
        }
        if let Some(grace) = self.grace_period {
            store.set_attribute(&run, GRACE_PERIOD_ATTRIBUTE, grace.as_millis().into())?;
        }
        store.flush()?;

        info!(run = %run, "using storage");
        Ok(PuppyCollector {
            actor: self.actor,
            store,
            run,
            grace_period: self.grace_period,
        })
    }
}

/// Actor decorator persisting every epoch before delegating.
///
/// The store is closed when the collector is closed or dropped.
///
/// # Example
///
/// ```rust,no_run
/// use pupy::actor::{Epoch, PuppyActor};
/// use pupy::collector::JournalCollector;
/// use pupy::control::ConstantGaitControl;
/// use pupy::gait::{Gait, GaitParameters};
/// use pupy::storage::JournalRunStore;
///
/// let gait = Gait::named(
///     GaitParameters {
///         amplitude: [0.8; 4],
///         frequency: [1.0; 4],
///         phase: [0.0, 0.5, 0.5, 0.0],
///         offset: [0.0; 4],
///     },
///     "trot",
/// );
///
/// let mut collector = JournalCollector::builder(ConstantGaitControl::new(gait))
///     .header("gait", "trot")
///     .open::<JournalRunStore>("experiments.jsonl")?;
///
/// let mut epoch = Epoch::new();
/// epoch.insert("hip_fl".to_string(), vec![0.0, 0.1, 0.2]);
/// let targets = collector.call(&epoch, 0, 60, 20)?;
/// # Ok::<(), pupy::Error>(())
/// ```
#[derive(Debug)]
pub struct PuppyCollector<A, S: RunStore> {
    actor: A,
    store: S,
    run: String,
    grace_period: Option<GracePeriod>,
}

impl<A: PuppyActor, S: RunStore> PuppyCollector<A, S> {
    /// Start building a collector around `actor`.
    #[must_use]
    pub fn builder(actor: A) -> CollectorBuilder<A> {
        CollectorBuilder::new(actor)
    }

    /// Wrap `actor`, persisting to the store at `path` without headers.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be opened or the run-group cannot
    /// be created
    pub fn open(actor: A, path: impl AsRef<Path>) -> Result<Self> {
        CollectorBuilder::new(actor).open(path)
    }

    /// Name of the run-group this collector writes to.
    #[must_use]
    pub fn run(&self) -> &str {
        &self.run
    }

    /// Get the backing store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Get the wrapped actor.
    #[must_use]
    pub const fn actor(&self) -> &A {
        &self.actor
    }

    /// Configured grace period, if any.
    #[must_use]
    pub const fn grace_period(&self) -> Option<GracePeriod> {
        self.grace_period
    }

    /// Close the store. The collector can still be dropped safely.
    ///
    /// # Errors
    ///
    /// Returns error if the final flush fails
    pub fn close(&mut self) -> Result<()> {
        self.store.close()
    }

    fn persist(&mut self, epoch: &Epoch) -> Result<()> {
        for (sensor, samples) in epoch {
            if self.store.contains_array(&self.run, sensor) {
                self.store.append(&self.run, sensor, samples)?;
            } else {
                self.store.create_array(&self.run, sensor, samples)?;
            }
        }
        self.store.flush()
    }
}

impl<A: PuppyActor, S: RunStore> PuppyActor for PuppyCollector<A, S> {
    fn call(
        &mut self,
        epoch: &Epoch,
        time_start_ms: u64,
        time_end_ms: u64,
        step_size_ms: u64,
    ) -> Result<MotorTargetStream> {
        if let Some(grace) = self.grace_period {
            let window = time_end_ms.saturating_sub(time_start_ms);
            if !grace.covers(window) {
                warn!(
                    run = %self.run,
                    grace_period_ms = grace.as_millis(),
                    control_period_ms = window,
                    "grace period does not exceed the control period; the last epoch may be incomplete"
                );
            }
        }
        self.persist(epoch)?;
        self.actor
            .call(epoch, time_start_ms, time_end_ms, step_size_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ConstantGaitControl;
    use crate::gait::{Gait, GaitParameters, MotorTargets};
    use crate::Error;
    use tempfile::TempDir;

    /// Records every call and answers with a fixed target list.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<(Epoch, u64, u64, u64)>,
    }

    impl PuppyActor for Recorder {
        fn call(
            &mut self,
            epoch: &Epoch,
            time_start_ms: u64,
            time_end_ms: u64,
            step_size_ms: u64,
        ) -> Result<MotorTargetStream> {
            self.calls
                .push((epoch.clone(), time_start_ms, time_end_ms, step_size_ms));
            let targets: Vec<MotorTargets> = vec![[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]];
            Ok(Box::new(targets.into_iter()))
        }
    }

    fn epoch(entries: &[(&str, &[f64])]) -> Epoch {
        entries
            .iter()
            .map(|(name, data)| ((*name).to_string(), data.to_vec()))
            .collect()
    }

    #[test]
    fn test_grace_period_covers() {
        let grace = GracePeriod::from_millis(300);
        assert!(grace.covers(200));
        assert!(!grace.covers(300));
        assert_eq!(grace.as_millis(), 300);
    }

    #[test]
    fn test_collector_delegates_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut collector: JournalCollector<Recorder> =
            PuppyCollector::open(Recorder::default(), dir.path().join("s.jsonl")).unwrap();

        let e = epoch(&[("s1", &[1.0])]);
        let targets: Vec<_> = collector.call(&e, 100, 200, 20).unwrap().collect();

        assert_eq!(targets, vec![[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]]);
        assert_eq!(collector.actor().calls.len(), 1);
        assert_eq!(collector.actor().calls[0], (e, 100, 200, 20));
    }

    #[test]
    fn test_collector_appends_epochs() {
        let dir = TempDir::new().unwrap();
        let mut collector: ParquetCollector<Recorder> =
            PuppyCollector::open(Recorder::default(), dir.path().join("s.parquet")).unwrap();

        collector.call(&epoch(&[("s1", &[1.0, 2.0])]), 0, 40, 20).unwrap();
        collector.call(&epoch(&[("s1", &[3.0]), ("s2", &[9.0])]), 40, 80, 20).unwrap();

        let run = collector.store().layout().run(collector.run()).unwrap();
        assert_eq!(run.array("s1"), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(run.array("s2"), Some(&[9.0][..]));
    }

    #[test]
    fn test_empty_epoch_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut collector: JournalCollector<Recorder> =
            PuppyCollector::open(Recorder::default(), dir.path().join("s.jsonl")).unwrap();

        collector.call(&Epoch::new(), 0, 20, 20).unwrap();

        let run = collector.store().layout().run("0").unwrap();
        assert_eq!(run.array_names().count(), 0);
        assert!(run.attribute(TIME_ATTRIBUTE).is_some());
    }

    #[test]
    fn test_builder_records_headers_and_prefix() {
        let dir = TempDir::new().unwrap();
        let collector = JournalCollector::builder(Recorder::default())
            .header("robot", "puppy")
            .headers([("trial", 3_i64)])
            .run_prefix("exp")
            .grace_period(GracePeriod::from_millis(500))
            .open::<JournalRunStore>(dir.path().join("s.jsonl"))
            .unwrap();

        assert_eq!(collector.run(), "exp0");
        let run = collector.store().layout().run("exp0").unwrap();
        assert_eq!(run.attribute("robot").and_then(AttrValue::as_str), Some("puppy"));
        assert_eq!(run.attribute("trial"), Some(&AttrValue::Int(3)));
        assert_eq!(run.attribute(GRACE_PERIOD_ATTRIBUTE), Some(&AttrValue::Int(500)));
        assert!(run.attribute(TIME_ATTRIBUTE).and_then(AttrValue::as_f64).unwrap() > 0.0);
    }

    #[test]
    fn test_storage_failure_skips_delegation() {
        let dir = TempDir::new().unwrap();
        let mut collector: JournalCollector<Recorder> =
            PuppyCollector::open(Recorder::default(), dir.path().join("s.jsonl")).unwrap();
        collector.close().unwrap();

        let result = collector.call(&epoch(&[("s1", &[1.0])]), 0, 20, 20);
        assert!(matches!(result, Err(Error::StoreClosed)));
        assert!(collector.actor().calls.is_empty());
    }

    #[test]
    fn test_inner_errors_propagate() {
        let dir = TempDir::new().unwrap();
        let gait = Gait::new(GaitParameters {
            amplitude: [1.0; 4],
            frequency: [1.0; 4],
            phase: [0.0; 4],
            offset: [0.0; 4],
        });
        let inner = crate::control::SequentialGaitControl::new(vec![gait.clone()]);
        let mut collector: JournalCollector<_> =
            PuppyCollector::open(inner, dir.path().join("s.jsonl")).unwrap();

        assert!(collector.call(&Epoch::new(), 0, 20, 20).is_ok());
        let second = collector.call(&Epoch::new(), 20, 40, 20);
        assert!(matches!(second, Err(Error::GaitSourceExhausted)));

        let mut constant: JournalCollector<_> =
            PuppyCollector::open(ConstantGaitControl::new(gait), dir.path().join("t.jsonl")).unwrap();
        assert!(constant.call(&Epoch::new(), 0, 20, 20).is_ok());
    }
}
