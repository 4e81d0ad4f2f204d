//! Named feature columns, one out-of-band buffer per column

use crate::error::{ShareError, ShareResult};
use crate::mode;
use crate::model::{BufferSink, Buffers, Shareable};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// Column-oriented feature table
///
/// Every column travels as its own out-of-band buffer, so the descriptor
/// order of a persisted table is exactly the column order. Empty columns are
/// legal and round-trip as zero-length buffers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeatureTable {
    names: Vec<String>,
    #[serde(default)]
    columns: Vec<Vec<f32>>,
}

impl FeatureTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Append a named column
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f32>) {
        self.names.push(name.into());
        self.columns.push(values);
    }

    /// Column names in table order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of columns
    pub fn n_columns(&self) -> usize {
        self.names.len()
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&[f32]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|index| self.columns[index].as_slice())
    }
}

impl Default for FeatureTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for FeatureTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FeatureTable", 2)?;
        state.serialize_field("names", &self.names)?;
        if mode::is_sharing() {
            // Columns travel out of band, one buffer each
            state.serialize_field("columns", &Vec::<Vec<f32>>::new())?;
        } else {
            state.serialize_field("columns", &self.columns)?;
        }
        state.end()
    }
}

impl Shareable for FeatureTable {
    fn export_buffers(&self, sink: &mut dyn BufferSink) -> ShareResult<()> {
        for column in &self.columns {
            let mut bytes = Vec::with_capacity(column.len() * 4);
            for value in column {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
            sink.put(&bytes)?;
        }
        Ok(())
    }

    fn import_buffers(&mut self, buffers: &mut Buffers<'_>) -> ShareResult<()> {
        let mut columns = Vec::with_capacity(self.names.len());
        for _ in 0..self.names.len() {
            let bytes = buffers.next()?;
            if bytes.len() % 4 != 0 {
                return Err(ShareError::BufferSize {
                    expected: bytes.len() + 4 - bytes.len() % 4,
                    actual: bytes.len(),
                });
            }
            columns.push(
                bytes
                    .chunks_exact(4)
                    .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                    .collect(),
            );
        }
        self.columns = columns;
        Ok(())
    }
}
