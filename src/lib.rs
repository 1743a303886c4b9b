//! # pupy: Gait Actors and Experiment Logging for Simulated Quadrupeds
//!
//! **Version**: 0.1.0
//!
//! pupy produces motor targets for a four-legged robot running in an
//! external physics simulator, and records the simulator's sensor readings
//! to an append-only experiment store.
//!
//! ## Components
//!
//! - [`gait`]: parametrised sine generators, one sine per leg
//! - [`actor`]: the once-per-control-period [`PuppyActor`](actor::PuppyActor) contract
//! - [`control`]: gait selection policies (random, constant, sequential)
//! - [`collector`]: decorator persisting every epoch before delegating
//! - [`storage`]: run-group store with JSON-journal and Parquet backends
//! - [`config`]: JSON gait libraries
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use pupy::actor::{Epoch, PuppyActor};
//! use pupy::collector::{GracePeriod, ParquetCollector};
//! use pupy::config::GaitSet;
//! use pupy::storage::ParquetRunStore;
//!
//! let gaits = GaitSet::load("gaits.json")?;
//! let mut actor = ParquetCollector::builder(gaits.random(42)?)
//!     .header("terrain", "flat")
//!     .grace_period(GracePeriod::from_millis(3_000))
//!     .open::<ParquetRunStore>("experiments.parquet")?;
//!
//! // Called by the simulator after every control period
//! let epoch = Epoch::new();
//! for targets in actor.call(&epoch, 0, 2_000, 20)?.take(100) {
//!     println!("{targets:?}");
//! }
//! # Ok::<(), pupy::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod actor;
pub mod collector;
pub mod config;
pub mod control;
pub mod error;
pub mod gait;
pub mod storage;

pub use error::{Error, Result};
