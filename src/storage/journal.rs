//! JSON-lines journal backend
//!
//! Every structural change is appended to the file as one JSON object per
//! line. Reopening the file replays the journal into a [`StoreLayout`].
//! The file is never rewritten, matching the append-only store contract.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AttrValue, RunStore, StoreLayout};
use crate::{Error, Result};

const JOURNAL_FORMAT: &str = "pupy-journal";
const JOURNAL_VERSION: u32 = 1;

/// One journal line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum JournalEntry {
    Header {
        format: String,
        version: u32,
    },
    CreateRun {
        run: String,
    },
    SetAttribute {
        run: String,
        key: String,
        value: AttrValue,
    },
    CreateArray {
        run: String,
        name: String,
        #[serde(with = "samples")]
        data: Vec<f64>,
    },
    Append {
        run: String,
        name: String,
        #[serde(with = "samples")]
        data: Vec<f64>,
    },
}

impl JournalEntry {
    fn header() -> Self {
        Self::Header {
            format: JOURNAL_FORMAT.to_string(),
            version: JOURNAL_VERSION,
        }
    }

    /// Validate the entry against `layout` without changing it.
    fn check(&self, layout: &StoreLayout) -> Result<()> {
        match self {
            Self::Header { .. } => Err(Error::StorageError(
                "journal header found after the first line".to_string(),
            )),
            Self::CreateRun { run } => layout.check_create_run(run),
            Self::SetAttribute { run, key, value } => layout.check_set_attribute(run, key, value),
            Self::CreateArray { run, name, .. } => layout.check_create_array(run, name),
            Self::Append { run, name, .. } => layout.check_append(run, name),
        }
    }

    fn apply(&self, layout: &mut StoreLayout) -> Result<()> {
        match self {
            Self::Header { .. } => Err(Error::StorageError(
                "journal header found after the first line".to_string(),
            )),
            Self::CreateRun { run } => layout.create_run(run),
            Self::SetAttribute { run, key, value } => layout.set_attribute(run, key, value.clone()),
            Self::CreateArray { run, name, data } => layout.create_array(run, name, data),
            Self::Append { run, name, data } => layout.append(run, name, data),
        }
    }
}

/// JSON has no NaN or infinity; those samples are written as strings.
mod samples {
    use serde::de::Error as _;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Sample {
        Number(f64),
        Special(String),
    }

    pub fn serialize<S: Serializer>(data: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(data.len()))?;
        for value in data {
            if value.is_finite() {
                seq.serialize_element(value)?;
            } else {
                seq.serialize_element(&value.to_string())?;
            }
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        Vec::<Sample>::deserialize(deserializer)?
            .into_iter()
            .map(|sample| match sample {
                Sample::Number(v) => Ok(v),
                Sample::Special(s) => s
                    .parse()
                    .map_err(|_| D::Error::custom(format!("invalid sample '{s}'"))),
            })
            .collect()
    }
}

/// Experiment store backed by an append-only JSON-lines journal.
///
/// # Example
///
/// ```rust,no_run
/// use pupy::storage::{JournalRunStore, RunStore};
/// use std::path::Path;
///
/// let mut store = JournalRunStore::open(Path::new("experiments.jsonl"))?;
/// store.create_run("0")?;
/// store.create_array("0", "accelerometer_x", &[0.1, 0.2])?;
/// store.append("0", "accelerometer_x", &[0.3])?;
/// store.flush()?;
/// # Ok::<(), pupy::Error>(())
/// ```
#[derive(Debug)]
pub struct JournalRunStore {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    layout: StoreLayout,
}

impl JournalRunStore {
    /// Path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn replay(contents: &str) -> Result<StoreLayout> {
        let mut lines = contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let header = lines
            .next()
            .map(|(_, line)| serde_json::from_str::<JournalEntry>(line))
            .transpose()
            .map_err(|e| Error::StorageError(format!("Failed to parse journal header: {e}")))?;
        match header {
            Some(JournalEntry::Header { format, version })
                if format == JOURNAL_FORMAT && version == JOURNAL_VERSION => {}
            _ => {
                return Err(Error::StorageError(format!(
                    "not a {JOURNAL_FORMAT} v{JOURNAL_VERSION} file"
                )))
            }
        }

        let mut layout = StoreLayout::new();
        for (index, line) in lines {
            let entry: JournalEntry = serde_json::from_str(line).map_err(|e| {
                Error::StorageError(format!("Corrupt journal line {}: {e}", index + 1))
            })?;
            entry.apply(&mut layout).map_err(|e| {
                Error::StorageError(format!("Invalid journal line {}: {e}", index + 1))
            })?;
        }
        Ok(layout)
    }

    /// Append `entry` to the journal, then apply it to the layout.
    ///
    /// The layout only changes once the line has been handed to the writer.
    fn record(&mut self, entry: &JournalEntry) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(Error::StoreClosed)?;
        entry.check(&self.layout)?;
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        writer.write_all(&line)?;
        entry.apply(&mut self.layout)
    }
}

impl RunStore for JournalRunStore {
    fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let fresh = contents.trim().is_empty();
        let layout = if fresh {
            StoreLayout::new()
        } else {
            Self::replay(&contents)?
        };

        let mut store = Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            layout,
        };
        if fresh {
            let writer = store.writer.as_mut().ok_or(Error::StoreClosed)?;
            serde_json::to_writer(&mut *writer, &JournalEntry::header())?;
            writer.write_all(b"\n")?;
            store.flush()?;
        }

        debug!(
            path = %store.path.display(),
            runs = store.layout.run_count(),
            "opened journal store"
        );
        Ok(store)
    }

    fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    fn create_run(&mut self, name: &str) -> Result<()> {
        self.record(&JournalEntry::CreateRun {
            run: name.to_string(),
        })
    }

    fn set_attribute(&mut self, run: &str, key: &str, value: AttrValue) -> Result<()> {
        self.record(&JournalEntry::SetAttribute {
            run: run.to_string(),
            key: key.to_string(),
            value,
        })
    }

    fn create_array(&mut self, run: &str, name: &str, data: &[f64]) -> Result<()> {
        self.record(&JournalEntry::CreateArray {
            run: run.to_string(),
            name: name.to_string(),
            data: data.to_vec(),
        })
    }

    fn append(&mut self, run: &str, name: &str, data: &[f64]) -> Result<()> {
        self.record(&JournalEntry::Append {
            run: run.to_string(),
            name: name.to_string(),
            data: data.to_vec(),
        })
    }

    fn flush(&mut self) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(Error::StoreClosed)?;
        writer.flush()?;
        writer.get_ref().sync_data()?;
        debug!(path = %self.path.display(), "flushed journal store");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            writer.get_ref().sync_data()?;
            debug!(path = %self.path.display(), "closed journal store");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.writer.is_none()
    }
}

impl Drop for JournalRunStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), error = %e, "failed to close journal store");
        }
    }
}
