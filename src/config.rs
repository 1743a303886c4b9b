//! Gait library configuration
//!
//! Gait parameter sets are kept in JSON files so experiments can be set up
//! without recompiling:
//!
//! ```json
//! [
//!   {
//!     "name": "trot",
//!     "amplitude": [0.8, 0.8, 0.6, 0.6],
//!     "frequency": [1.0, 1.0, 1.0, 1.0],
//!     "phase": [0.0, 0.5, 0.5, 0.0],
//!     "offset": [0.0, 0.0, 0.0, 0.0]
//!   }
//! ]
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::control::{ConstantGaitControl, RandomGaitControl, SequentialGaitControl};
use crate::gait::Gait;
use crate::{Error, Result};

/// Ordered, named collection of gaits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GaitSet {
    gaits: Vec<Gait>,
}

impl GaitSet {
    /// Create a gait set from `gaits`.
    #[must_use]
    pub const fn new(gaits: Vec<Gait>) -> Self {
        Self { gaits }
    }

    /// Parse a gait set from JSON text.
    ///
    /// # Errors
    ///
    /// Returns error if the JSON does not describe a list of gaits
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a gait set from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Save the gait set as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Number of gaits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.gaits.len()
    }

    /// Check if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gaits.is_empty()
    }

    /// All gaits in order.
    #[must_use]
    pub fn gaits(&self) -> &[Gait] {
        &self.gaits
    }

    /// Find a gait by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Gait> {
        self.gaits.iter().find(|gait| gait.name() == name)
    }

    /// Policy always applying the gait called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if no gait has that name
    pub fn constant(&self, name: &str) -> Result<ConstantGaitControl> {
        self.get(name)
            .cloned()
            .map(ConstantGaitControl::new)
            .ok_or_else(|| Error::InvalidInput(format!("unknown gait '{name}'")))
    }

    /// Policy drawing uniformly from all gaits with a seeded generator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the set is empty
    pub fn random(&self, seed: u64) -> Result<RandomGaitControl> {
        RandomGaitControl::seeded(self.gaits.clone(), seed)
    }

    /// Policy cycling through the gaits in order, forever.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the set is empty, since an empty
    /// cycle would exhaust on the first call
    pub fn cycle(
        &self,
    ) -> Result<SequentialGaitControl<std::iter::Cycle<std::vec::IntoIter<Gait>>>> {
        if self.is_empty() {
            return Err(Error::InvalidInput("cannot cycle an empty gait set".to_string()));
        }
        Ok(SequentialGaitControl::new(self.gaits.clone().into_iter().cycle()))
    }
}

impl FromIterator<Gait> for GaitSet {
    fn from_iter<I: IntoIterator<Item = Gait>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for GaitSet {
    type Item = Gait;
    type IntoIter = std::vec::IntoIter<Gait>;

    fn into_iter(self) -> Self::IntoIter {
        self.gaits.into_iter()
    }
}
