//! Function Registry
//!
//! Maps names to user-supplied transforms so callers can ship `Named { name }`
//! specs instead of code. Built-in spec variants resolve to themselves.

use super::func::*;
use crate::error::{PsError, Result};

use dashmap::DashMap;
use std::sync::Arc;

/// Shared, type-erased transforms as stored in the registry.
pub type MapFuncRef = Arc<dyn MapFunc>;
pub type MapWithIndexFuncRef = Arc<dyn MapWithIndexFunc>;
pub type Zip3FuncRef = Arc<dyn Zip3MapWithIndexFunc>;

/// Named transforms available to push-down calls on this shard.
pub struct FuncRegistry {
    map_funcs: DashMap<String, MapFuncRef>,
    index_map_funcs: DashMap<String, MapWithIndexFuncRef>,
    zip3_funcs: DashMap<String, Zip3FuncRef>,
}

impl FuncRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a value-only transform under `name`, replacing any previous one.
    ///
    /// # Arguments
    /// * `name` - The identifier callers use in `MapFuncSpec::Named`.
    /// * `func` - A closure or `MapFunc` implementation.
    pub fn register_map<F>(&self, name: &str, func: F)
    where
        F: MapFunc + 'static,
    {
        self.map_funcs.insert(name.to_string(), Arc::new(func));
        tracing::info!("Registered map function: {}", name);
    }

    /// Registers a `(index, value)` transform under `name`.
    ///
    /// # Arguments
    /// * `name` - The identifier callers use in `IndexMapFuncSpec::Named`.
    /// * `func` - A closure or `MapWithIndexFunc` implementation.
    pub fn register_map_with_index<F>(&self, name: &str, func: F)
    where
        F: MapWithIndexFunc + 'static,
    {
        self.index_map_funcs.insert(name.to_string(), Arc::new(func));
        tracing::info!("Registered map-with-index function: {}", name);
    }

    /// Registers a three-input transform under `name`.
    ///
    /// # Arguments
    /// * `name` - The identifier callers use in `Zip3FuncSpec::Named`.
    /// * `func` - A closure or `Zip3MapWithIndexFunc` implementation.
    pub fn register_zip3<F>(&self, name: &str, func: F)
    where
        F: Zip3MapWithIndexFunc + 'static,
    {
        self.zip3_funcs.insert(name.to_string(), Arc::new(func));
        tracing::info!("Registered zip3 function: {}", name);
    }

    /// Turns a wire spec into a callable transform.
    ///
    /// # Returns
    /// * The registered function for `Named`, or the built-in variant itself.
    /// * `Err(UnknownFunction)` if no function is registered under the name.
    pub fn resolve_map(&self, spec: &MapFuncSpec) -> Result<MapFuncRef> {
        match spec {
            MapFuncSpec::Named { name } => self
                .map_funcs
                .get(name)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| PsError::UnknownFunction(name.clone())),
            builtin => Ok(Arc::new(builtin.clone())),
        }
    }

    /// Same as [`resolve_map`](Self::resolve_map) for `(index, value)` transforms.
    pub fn resolve_map_with_index(&self, spec: &IndexMapFuncSpec) -> Result<MapWithIndexFuncRef> {
        match spec {
            IndexMapFuncSpec::Named { name } => self
                .index_map_funcs
                .get(name)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| PsError::UnknownFunction(name.clone())),
            builtin => Ok(Arc::new(builtin.clone())),
        }
    }

    /// Same as [`resolve_map`](Self::resolve_map) for three-input transforms.
    pub fn resolve_zip3(&self, spec: &Zip3FuncSpec) -> Result<Zip3FuncRef> {
        match spec {
            Zip3FuncSpec::Named { name } => self
                .zip3_funcs
                .get(name)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| PsError::UnknownFunction(name.clone())),
            builtin => Ok(Arc::new(builtin.clone())),
        }
    }

    /// Names of every registered function, sorted.
    pub fn list_functions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .map_funcs
            .iter()
            .map(|entry| entry.key().clone())
            .chain(self.index_map_funcs.iter().map(|entry| entry.key().clone()))
            .chain(self.zip3_funcs.iter().map(|entry| entry.key().clone()))
            .collect();
        names.sort();
        names
    }

    /// Total number of registered functions across all call shapes.
    pub fn function_count(&self) -> usize {
        self.map_funcs.len() + self.index_map_funcs.len() + self.zip3_funcs.len()
    }
}

impl Default for FuncRegistry {
    fn default() -> Self {
        Self {
            map_funcs: DashMap::new(),
            index_map_funcs: DashMap::new(),
            zip3_funcs: DashMap::new(),
        }
    }
}
