use crate::error::{PsError, Result};
use crate::partition::types::ElementKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Value every sparse row reports for a missing column key.
pub const SPARSE_DEFAULT_VALUE: f64 = 0.0;

/// A contiguous buffer holding columns `[start_col, start_col + len)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DenseRow {
    pub start_col: i64,
    pub values: Vec<f64>,
}

impl DenseRow {
    /// Zero-filled row covering `[start_col, end_col)`.
    pub fn zeros(start_col: i64, end_col: i64) -> Self {
        let len = (end_col - start_col).max(0) as usize;
        Self {
            start_col,
            values: vec![0.0; len],
        }
    }

    pub fn from_values(start_col: i64, values: Vec<f64>) -> Self {
        Self { start_col, values }
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, col: i64) -> Option<f64> {
        let local = usize::try_from(col - self.start_col).ok()?;
        self.values.get(local).copied()
    }
}

/// A key-indexed row over columns `[start_col, end_col)`.
///
/// Absent keys read as the default value, which is always `0.0`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SparseRow {
    pub start_col: i64,
    pub end_col: i64,
    entries: HashMap<i64, f64>,
    #[serde(default)]
    default_value: f64,
}

impl SparseRow {
    pub fn new(start_col: i64, end_col: i64) -> Self {
        Self {
            start_col,
            end_col,
            entries: HashMap::new(),
            default_value: SPARSE_DEFAULT_VALUE,
        }
    }

    /// Builds a row with an explicit missing-key value, which must be `0.0`.
    pub fn with_default(start_col: i64, end_col: i64, default_value: f64) -> Result<Self> {
        if default_value.to_bits() != SPARSE_DEFAULT_VALUE.to_bits() {
            return Err(PsError::NonZeroDefault(default_value));
        }
        Ok(Self::new(start_col, end_col))
    }

    pub fn from_entries(start_col: i64, end_col: i64, entries: HashMap<i64, f64>) -> Result<Self> {
        let mut row = Self::new(start_col, end_col);
        row.replace_entries(entries)?;
        Ok(row)
    }

    pub fn default_value(&self) -> f64 {
        self.default_value
    }

    /// Fails if the row was built (or deserialized) with a non-zero default.
    pub fn check_default(&self) -> Result<()> {
        if self.default_value.to_bits() != SPARSE_DEFAULT_VALUE.to_bits() {
            return Err(PsError::NonZeroDefault(self.default_value));
        }
        Ok(())
    }

    pub fn entries(&self) -> &HashMap<i64, f64> {
        &self.entries
    }

    pub fn into_entries(self) -> HashMap<i64, f64> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, col: i64) -> f64 {
        self.entries.get(&col).copied().unwrap_or(self.default_value)
    }

    pub fn set(&mut self, col: i64, value: f64) -> Result<()> {
        if col < self.start_col || col >= self.end_col {
            return Err(PsError::IndexOutOfRange(col));
        }
        self.entries.insert(col, value);
        Ok(())
    }

    /// Swaps in a new backing map. Old keys are dropped, not merged.
    pub fn replace_entries(&mut self, entries: HashMap<i64, f64>) -> Result<()> {
        if let Some(col) = entries
            .keys()
            .find(|col| **col < self.start_col || **col >= self.end_col)
        {
            return Err(PsError::IndexOutOfRange(*col));
        }
        self.entries = entries;
        Ok(())
    }
}

/// Physical encoding of one partition row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "encoding", rename_all = "snake_case")]
pub enum RowStore {
    Dense(DenseRow),
    Sparse(SparseRow),
}

impl RowStore {
    pub fn is_dense(&self) -> bool {
        matches!(self, RowStore::Dense(_))
    }

    pub fn start_col(&self) -> i64 {
        match self {
            RowStore::Dense(row) => row.start_col,
            RowStore::Sparse(row) => row.start_col,
        }
    }

    /// Value at global column `col`; `None` only for a dense row that does not cover it.
    pub fn get(&self, col: i64) -> Option<f64> {
        match self {
            RowStore::Dense(row) => row.get(col),
            RowStore::Sparse(row) => Some(row.get(col)),
        }
    }

    /// Rounds every stored value to what `kind` can hold.
    pub fn narrow_to(&mut self, kind: ElementKind) {
        match self {
            RowStore::Dense(row) => row.values.iter_mut().for_each(|v| *v = kind.narrow(*v)),
            RowStore::Sparse(row) => row.entries.values_mut().for_each(|v| *v = kind.narrow(*v)),
        }
    }
}
