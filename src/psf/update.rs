//! Encoding-specific kernels.
//!
//! Each call shape has exactly one dense path and one sparse path, picked by
//! matching on the bound rows. Kernels never write: they compute the complete
//! image of the target row, and the executor commits it only once every
//! transform call has succeeded.

use super::func::{MapFunc, MapWithIndexFunc, Zip3MapWithIndexFunc};
use crate::error::{PsError, Result};
use crate::partition::types::ElementKind;
use crate::store::row::{DenseRow, RowStore, SparseRow};

use std::collections::{HashMap, HashSet};

/// Applies `func` to every stored value of `from`.
pub fn map(from: &RowStore, func: &dyn MapFunc, kind: ElementKind) -> Result<RowStore> {
    match from {
        RowStore::Dense(row) => {
            let values = row
                .values
                .iter()
                .map(|v| eval(func.call(*v), kind))
                .collect::<Result<Vec<f64>>>()?;
            Ok(RowStore::Dense(DenseRow::from_values(row.start_col, values)))
        }
        RowStore::Sparse(row) => {
            row.check_default()?;
            let mut data = row.entries().clone();
            for value in data.values_mut() {
                *value = eval(func.call(*value), kind)?;
            }
            Ok(RowStore::Sparse(SparseRow::from_entries(
                row.start_col,
                row.end_col,
                data,
            )?))
        }
    }
}

/// Computes `to[col] = func(col, from[col])` for every column of `from`.
///
/// The prior contents of `to` are never read; only its encoding and size are
/// checked.
pub fn map_with_index(
    from: &RowStore,
    to: &RowStore,
    func: &dyn MapWithIndexFunc,
    kind: ElementKind,
) -> Result<RowStore> {
    match (from, to) {
        (RowStore::Dense(from), RowStore::Dense(to)) => {
            check_size(from.size(), to.size())?;
            let mut values = Vec::with_capacity(from.size());
            for (i, value) in from.values.iter().enumerate() {
                let index = column_index(from.start_col + i as i64)?;
                values.push(eval(func.call(index, *value), kind)?);
            }
            Ok(RowStore::Dense(DenseRow::from_values(from.start_col, values)))
        }
        (RowStore::Sparse(from), RowStore::Sparse(_)) => {
            from.check_default()?;
            let mut data = from.entries().clone();
            for (col, value) in data.iter_mut() {
                *value = eval(func.call(column_index(*col)?, *value), kind)?;
            }
            Ok(RowStore::Sparse(SparseRow::from_entries(
                from.start_col,
                from.end_col,
                data,
            )?))
        }
        _ => Err(PsError::EncodingMismatch),
    }
}

/// Computes `out[col] = func(col, a[col], b[col], c[col])`.
///
/// Sparse rows visit the union of the three key sets; a key missing from one
/// input reads as that row's default.
pub fn zip3_map_with_index(
    inputs: [&RowStore; 3],
    out: &RowStore,
    func: &dyn Zip3MapWithIndexFunc,
    kind: ElementKind,
) -> Result<RowStore> {
    match (inputs[0], inputs[1], inputs[2], out) {
        (RowStore::Dense(a), RowStore::Dense(b), RowStore::Dense(c), RowStore::Dense(to)) => {
            check_size(a.size(), b.size())?;
            check_size(a.size(), c.size())?;
            check_size(a.size(), to.size())?;
            let mut values = Vec::with_capacity(a.size());
            for i in 0..a.size() {
                let index = column_index(a.start_col + i as i64)?;
                values.push(eval(
                    func.call(index, a.values[i], b.values[i], c.values[i]),
                    kind,
                )?);
            }
            Ok(RowStore::Dense(DenseRow::from_values(a.start_col, values)))
        }
        (RowStore::Sparse(a), RowStore::Sparse(b), RowStore::Sparse(c), RowStore::Sparse(_)) => {
            a.check_default()?;
            b.check_default()?;
            c.check_default()?;
            let keys: HashSet<i64> = a
                .entries()
                .keys()
                .chain(b.entries().keys())
                .chain(c.entries().keys())
                .copied()
                .collect();
            let mut data = HashMap::with_capacity(keys.len());
            for col in keys {
                let value = func.call(column_index(col)?, a.get(col), b.get(col), c.get(col));
                data.insert(col, eval(value, kind)?);
            }
            Ok(RowStore::Sparse(SparseRow::from_entries(
                a.start_col,
                a.end_col,
                data,
            )?))
        }
        _ => Err(PsError::EncodingMismatch),
    }
}

/// Installs a computed image into `target`.
///
/// Dense rows are overwritten by position; sparse rows get the new map swapped
/// in and lose any key the image does not carry.
pub fn commit(target: &mut RowStore, image: RowStore) -> Result<()> {
    match (target, image) {
        (RowStore::Dense(target), RowStore::Dense(image)) => {
            check_size(target.size(), image.size())?;
            target.values.copy_from_slice(&image.values);
            Ok(())
        }
        (RowStore::Sparse(target), RowStore::Sparse(image)) => {
            target.replace_entries(image.into_entries())
        }
        _ => Err(PsError::EncodingMismatch),
    }
}

/// Narrows a global column to the transform's `i32` index domain.
///
/// Out-of-range columns are rejected rather than truncated.
pub fn column_index(col: i64) -> Result<i32> {
    i32::try_from(col).map_err(|_| PsError::IndexOutOfRange(col))
}

fn eval(result: anyhow::Result<f64>, kind: ElementKind) -> Result<f64> {
    result
        .map(|value| kind.narrow(value))
        .map_err(PsError::TransformFault)
}

fn check_size(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(PsError::SizeMismatch { expected, actual });
    }
    Ok(())
}
