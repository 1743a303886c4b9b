//! Arrow/Parquet snapshot backend
//!
//! The store is one Parquet file in long format, one row per sample:
//!
//! | run (Utf8) | array (Utf8) | value (Float64) |
//! |------------|--------------|-----------------|
//!
//! Rows of an array appear in append order. Run-group names, attributes and
//! array names live in the file's key-value metadata under `pupy.layout`, so
//! empty groups and empty arrays survive a reopen.
//!
//! Parquet files cannot be appended in place: `flush` writes a complete
//! snapshot to a sibling temp file, syncs it, and renames it over the store.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AttrValue, RunStore, StoreLayout};
use crate::{Error, Result};

/// Key-value metadata entry holding the run-group structure
const LAYOUT_METADATA_KEY: &str = "pupy.layout";

/// Run-group structure kept in the Parquet footer.
#[derive(Debug, Serialize, Deserialize)]
struct RunMeta {
    name: String,
    attributes: BTreeMap<String, AttrValue>,
    arrays: Vec<String>,
}

fn sample_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("run", DataType::Utf8, false),
        Field::new("array", DataType::Utf8, false),
        Field::new("value", DataType::Float64, false),
    ]))
}

/// Experiment store backed by a Parquet snapshot file.
///
/// # Example
///
/// ```rust,no_run
/// use pupy::storage::{ParquetRunStore, RunStore};
/// use std::path::Path;
///
/// let mut store = ParquetRunStore::open(Path::new("experiments.parquet"))?;
/// store.create_run("0")?;
/// store.create_array("0", "hip_angle", &[0.0, 0.1])?;
/// store.flush()?;
/// # Ok::<(), pupy::Error>(())
/// ```
#[derive(Debug)]
pub struct ParquetRunStore {
    path: PathBuf,
    file: Option<File>,
    layout: StoreLayout,
    dirty: bool,
}

impl ParquetRunStore {
    /// Path of the Parquet file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn read_snapshot(file: &File) -> Result<StoreLayout> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(file.try_clone()?)
            .map_err(|e| Error::StorageError(format!("Failed to parse Parquet store: {e}")))?;

        let layout_json = builder
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .and_then(|entries| entries.iter().find(|kv| kv.key == LAYOUT_METADATA_KEY))
            .and_then(|kv| kv.value.clone())
            .ok_or_else(|| {
                Error::StorageError(format!(
                    "Parquet store has no '{LAYOUT_METADATA_KEY}' metadata"
                ))
            })?;
        let runs: Vec<RunMeta> = serde_json::from_str(&layout_json)?;
        check_schema(builder.schema())?;

        let mut layout = StoreLayout::new();
        for run in runs {
            layout.create_run(&run.name)?;
            for (key, value) in run.attributes {
                layout.set_attribute(&run.name, &key, value)?;
            }
            for array in &run.arrays {
                layout.create_array(&run.name, array, &[])?;
            }
        }

        let reader = builder
            .build()
            .map_err(|e| Error::StorageError(format!("Failed to create Parquet reader: {e}")))?;
        for batch in reader {
            let batch = batch?;
            let runs = typed_column::<StringArray>(&batch, "run")?;
            let arrays = typed_column::<StringArray>(&batch, "array")?;
            let values = typed_column::<Float64Array>(&batch, "value")?;
            for row in 0..batch.num_rows() {
                layout.append(runs.value(row), arrays.value(row), &[values.value(row)])?;
            }
        }

        Ok(layout)
    }

    fn snapshot(&self) -> Result<(RecordBatch, String)> {
        let mut runs = Vec::new();
        let mut arrays = Vec::new();
        let mut values = Vec::new();
        let mut meta = Vec::with_capacity(self.layout.run_count());

        for (run_name, group) in self.layout.runs() {
            for array_name in group.array_names() {
                let data = group.array(array_name).unwrap_or_default();
                runs.extend(std::iter::repeat(run_name).take(data.len()));
                arrays.extend(std::iter::repeat(array_name).take(data.len()));
                values.extend_from_slice(data);
            }
            meta.push(RunMeta {
                name: run_name.to_string(),
                attributes: group.attributes().clone(),
                arrays: group.array_names().map(str::to_string).collect(),
            });
        }

        let batch = RecordBatch::try_new(
            sample_schema(),
            vec![
                Arc::new(StringArray::from(runs)) as ArrayRef,
                Arc::new(StringArray::from(arrays)) as ArrayRef,
                Arc::new(Float64Array::from(values)) as ArrayRef,
            ],
        )?;
        Ok((batch, serde_json::to_string(&meta)?))
    }

    fn write_snapshot(&mut self) -> Result<()> {
        let (batch, layout_json) = self.snapshot()?;
        let temp = self.temp_path();

        let props = WriterProperties::builder()
            .set_key_value_metadata(Some(vec![KeyValue::new(
                LAYOUT_METADATA_KEY.to_string(),
                layout_json,
            )]))
            .build();
        let mut writer = ArrowWriter::try_new(File::create(&temp)?, batch.schema(), Some(props))?;
        if batch.num_rows() > 0 {
            writer.write(&batch)?;
        }
        writer.into_inner()?.sync_all()?;

        fs::rename(&temp, &self.path)?;
        self.file = Some(OpenOptions::new().read(true).write(true).open(&self.path)?);
        self.dirty = false;

        debug!(
            path = %self.path.display(),
            rows = batch.num_rows(),
            "flushed parquet store"
        );
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.file.is_none() {
            return Err(Error::StoreClosed);
        }
        Ok(())
    }
}

/// Reject files whose columns differ from [`sample_schema`].
fn check_schema(schema: &SchemaRef) -> Result<()> {
    fn columns(schema: &Schema) -> Vec<String> {
        schema
            .fields()
            .iter()
            .map(|f| format!("{}: {}", f.name(), f.data_type()))
            .collect()
    }

    let (found, wanted) = (columns(schema), columns(&sample_schema()));
    if found != wanted {
        return Err(Error::StorageError(format!(
            "Parquet store has columns [{}], expected [{}]",
            found.join(", "),
            wanted.join(", ")
        )));
    }
    Ok(())
}

fn typed_column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|column| column.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::StorageError(format!("column '{name}' is missing or mistyped")))
}

impl RunStore for ParquetRunStore {
    fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let fresh = file.metadata()?.len() == 0;
        let layout = if fresh {
            StoreLayout::new()
        } else {
            Self::read_snapshot(&file)?
        };

        let mut store = Self {
            path: path.to_path_buf(),
            file: Some(file),
            layout,
            dirty: fresh,
        };
        if fresh {
            store.write_snapshot()?;
        }

        debug!(
            path = %store.path.display(),
            runs = store.layout.run_count(),
            "opened parquet store"
        );
        Ok(store)
    }

    fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    fn create_run(&mut self, name: &str) -> Result<()> {
        self.ensure_open()?;
        self.layout.create_run(name)?;
        self.dirty = true;
        Ok(())
    }

    fn set_attribute(&mut self, run: &str, key: &str, value: AttrValue) -> Result<()> {
        self.ensure_open()?;
        self.layout.set_attribute(run, key, value)?;
        self.dirty = true;
        Ok(())
    }

    fn create_array(&mut self, run: &str, name: &str, data: &[f64]) -> Result<()> {
        self.ensure_open()?;
        self.layout.create_array(run, name, data)?;
        self.dirty = true;
        Ok(())
    }

    fn append(&mut self, run: &str, name: &str, data: &[f64]) -> Result<()> {
        self.ensure_open()?;
        self.layout.append(run, name, data)?;
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.dirty {
            self.write_snapshot()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.file.is_none() {
            return Ok(());
        }
        let flushed = self.flush();
        self.file = None;
        debug!(path = %self.path.display(), "closed parquet store");
        flushed
    }

    fn is_closed(&self) -> bool {
        self.file.is_none()
    }
}

impl Drop for ParquetRunStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), error = %e, "failed to close parquet store");
        }
    }
}
