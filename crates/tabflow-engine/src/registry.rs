//! Process-wide node executor registry.
//!
//! Write-once-at-startup, read-only thereafter in the common case; the
//! mutation surface exists for embedders that ship custom node types and
//! for tests. Keys are case-insensitive.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::executor::NodeExecutor;

static REG: Lazy<DashMap<String, Arc<dyn NodeExecutor>>> = Lazy::new(DashMap::new);

#[inline]
fn norm(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Register an executor under its own `node_type`.
pub fn register(executor: Arc<dyn NodeExecutor>) {
    REG.insert(norm(executor.node_type()), executor);
}

/// Register an executor under an explicit type id (aliases, test doubles).
pub fn register_as(node_type: &str, executor: Arc<dyn NodeExecutor>) {
    REG.insert(norm(node_type), executor);
}

pub fn get(node_type: &str) -> Option<Arc<dyn NodeExecutor>> {
    REG.get(&norm(node_type)).map(|e| Arc::clone(e.value()))
}

pub fn unregister(node_type: &str) -> bool {
    REG.remove(&norm(node_type)).is_some()
}

pub fn has(node_type: &str) -> bool {
    REG.contains_key(&norm(node_type))
}

/// All registered type ids, sorted.
pub fn registered_types() -> Vec<String> {
    let mut types: Vec<String> = REG.iter().map(|e| e.key().clone()).collect();
    types.sort();
    types
}

pub fn clear() {
    REG.clear();
}
