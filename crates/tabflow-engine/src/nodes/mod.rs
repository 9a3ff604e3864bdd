//! Built-in node executors.

pub mod chart;
pub mod cleaning;
pub mod script;
pub mod shape;
pub mod sources;
pub mod transforms;

use std::sync::Arc;

use crate::registry;

/// Register the default node set. Idempotent — registration overwrites by
/// type id, so calling this from every engine constructor is safe.
pub fn register_builtins() {
    registry::register(Arc::new(sources::ExampleDataNode));
    registry::register(Arc::new(sources::FileInputNode));
    registry::register(Arc::new(sources::PasteInputNode));
    registry::register(Arc::new(sources::HttpRequestNode));
    registry::register(Arc::new(transforms::FilterNode));
    registry::register(Arc::new(transforms::SortNode));
    registry::register(Arc::new(transforms::GroupNode));
    registry::register(Arc::new(transforms::JoinNode));
    registry::register(Arc::new(transforms::SliceNode));
    registry::register(Arc::new(cleaning::FillMissingNode));
    registry::register(Arc::new(cleaning::RemoveOutliersNode));
    registry::register(Arc::new(cleaning::NormalizeNode));
    registry::register(Arc::new(cleaning::SampleNode));
    registry::register(Arc::new(shape::PivotNode));
    registry::register(Arc::new(shape::UnpivotNode));
    registry::register(Arc::new(shape::TransposeNode));
    registry::register(Arc::new(shape::RenameColumnsNode));
    registry::register(Arc::new(shape::RemoveColumnsNode));
    registry::register(Arc::new(chart::ChartNode));
    registry::register(Arc::new(script::ScriptNode));
    // Editors that predate the expression language submit the old type id.
    registry::register_as("javascript", Arc::new(script::ScriptNode));
}
