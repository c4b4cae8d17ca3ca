//! Transform capabilities for the three push-down call shapes.
//!
//! A transform only sees numbers and an `i32` column index; it never learns
//! whether the row behind it is dense or sparse. Transforms must be pure so a
//! retried call computes the same result.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// `(value) -> value`
pub trait MapFunc: Send + Sync {
    fn call(&self, value: f64) -> Result<f64>;
}

/// `(global_col_index, value) -> value`
pub trait MapWithIndexFunc: Send + Sync {
    fn call(&self, index: i32, value: f64) -> Result<f64>;
}

/// `(global_col_index, value1, value2, value3) -> value`
pub trait Zip3MapWithIndexFunc: Send + Sync {
    fn call(&self, index: i32, value1: f64, value2: f64, value3: f64) -> Result<f64>;
}

impl<F> MapFunc for F
where
    F: Fn(f64) -> Result<f64> + Send + Sync,
{
    fn call(&self, value: f64) -> Result<f64> {
        self(value)
    }
}

impl<F> MapWithIndexFunc for F
where
    F: Fn(i32, f64) -> Result<f64> + Send + Sync,
{
    fn call(&self, index: i32, value: f64) -> Result<f64> {
        self(index, value)
    }
}

impl<F> Zip3MapWithIndexFunc for F
where
    F: Fn(i32, f64, f64, f64) -> Result<f64> + Send + Sync,
{
    fn call(&self, index: i32, value1: f64, value2: f64, value3: f64) -> Result<f64> {
        self(index, value1, value2, value3)
    }
}

/// Wire form of a `MapFunc`.
///
/// `Named` refers to a function registered in the shard's `FuncRegistry`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MapFuncSpec {
    Identity,
    Scale { factor: f64 },
    Increment { delta: f64 },
    Fill { value: f64 },
    Pow { exponent: f64 },
    Abs,
    Clamp { min: f64, max: f64 },
    Named { name: String },
}

/// Wire form of a `MapWithIndexFunc`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum IndexMapFuncSpec {
    Identity,
    /// `value + index`
    AddIndex,
    /// `value * index * factor`
    ScaleByIndex { factor: f64 },
    /// `index * factor`, ignoring the source value.
    FillWithIndex { factor: f64 },
    Named { name: String },
}

/// Wire form of a `Zip3MapWithIndexFunc`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Zip3FuncSpec {
    Sum,
    /// `a * value1 + b * value2 + c * value3`
    Weighted { a: f64, b: f64, c: f64 },
    Named { name: String },
}

impl MapFunc for MapFuncSpec {
    fn call(&self, value: f64) -> Result<f64> {
        match self {
            MapFuncSpec::Identity => Ok(value),
            MapFuncSpec::Scale { factor } => Ok(value * factor),
            MapFuncSpec::Increment { delta } => Ok(value + delta),
            MapFuncSpec::Fill { value: fill } => Ok(*fill),
            MapFuncSpec::Pow { exponent } => Ok(value.powf(*exponent)),
            MapFuncSpec::Abs => Ok(value.abs()),
            MapFuncSpec::Clamp { min, max } => {
                if min.is_nan() || max.is_nan() {
                    anyhow::bail!("Clamp bounds must not be NaN: [{}, {}]", min, max);
                }
                if min > max {
                    anyhow::bail!("Clamp bounds inverted: {} > {}", min, max);
                }
                Ok(value.clamp(*min, *max))
            }
            MapFuncSpec::Named { name } => {
                anyhow::bail!("Named function '{}' must be resolved before use", name)
            }
        }
    }
}

impl MapWithIndexFunc for IndexMapFuncSpec {
    fn call(&self, index: i32, value: f64) -> Result<f64> {
        match self {
            IndexMapFuncSpec::Identity => Ok(value),
            IndexMapFuncSpec::AddIndex => Ok(value + index as f64),
            IndexMapFuncSpec::ScaleByIndex { factor } => Ok(value * index as f64 * factor),
            IndexMapFuncSpec::FillWithIndex { factor } => Ok(index as f64 * factor),
            IndexMapFuncSpec::Named { name } => {
                anyhow::bail!("Named function '{}' must be resolved before use", name)
            }
        }
    }
}

impl Zip3MapWithIndexFunc for Zip3FuncSpec {
    fn call(&self, _index: i32, value1: f64, value2: f64, value3: f64) -> Result<f64> {
        match self {
            Zip3FuncSpec::Sum => Ok(value1 + value2 + value3),
            Zip3FuncSpec::Weighted { a, b, c } => Ok(a * value1 + b * value2 + c * value3),
            Zip3FuncSpec::Named { name } => {
                anyhow::bail!("Named function '{}' must be resolved before use", name)
            }
        }
    }
}
