//! Graph analysis: dependency resolution, cycle detection, level
//! assignment, and the deterministic execution order.
//!
//! The graph is an arena of vertices addressed by index; dependency and
//! dependent lists hold indices, never references, so traversals are
//! allocation-free and the structure clones cheaply into the engine's
//! per-run state.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use tabflow_common::{AppError, codes};

/// A placed operator instance, as submitted by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub position: Option<(f64, f64)>,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl Node {
    pub fn new<S: Into<String>>(id: S, node_type: S) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            position: None,
            config: serde_json::Value::Null,
        }
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }
}

/// A directed dataflow connection between node ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    #[serde(default = "default_output_port")]
    pub source_port: String,
    pub target: String,
    #[serde(default = "default_input_port")]
    pub target_port: String,
}

fn default_output_port() -> String {
    "output".to_string()
}
fn default_input_port() -> String {
    "input".to_string()
}

impl Edge {
    pub fn new<S: Into<String>>(id: S, source: S, target: S) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            source_port: default_output_port(),
            target: target.into(),
            target_port: default_input_port(),
        }
    }

    pub fn with_target_port<S: Into<String>>(mut self, port: S) -> Self {
        self.target_port = port.into();
        self
    }
}

/// Node lifecycle status, driven solely by the scheduler.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Idle,
    Processing,
    Success,
    Error,
    Warning,
}

/// One analyzed vertex.
#[derive(Debug, Clone)]
pub struct NodeVertex {
    pub id: String,
    pub node_type: String,
    pub config: serde_json::Value,
    /// Indices of vertices whose outputs feed this one (deduplicated, in
    /// edge-ingestion order).
    pub dependencies: Vec<usize>,
    /// Indices of vertices this one feeds.
    pub dependents: Vec<usize>,
    /// `(target_port, source index)` per incoming edge, in edge order —
    /// multi-input operators use this to tell their inputs apart.
    pub input_ports: Vec<(String, usize)>,
    /// Length of the longest dependency path from a root.
    pub level: u32,
}

/// The analyzed graph: vertex arena, id lookup, and execution order.
#[derive(Debug, Clone)]
pub struct ExecutionGraph {
    vertices: Vec<NodeVertex>,
    index: FxHashMap<String, usize>,
    /// Vertex indices, level ascending then id ascending.
    order: Vec<usize>,
}

impl ExecutionGraph {
    /// Analyze `(nodes, edges)`.
    ///
    /// Fails with `ConfigurationError` on duplicate ids or edges naming
    /// unknown nodes, and with `DependencyError` (cycle attached in
    /// `details`) when the dependency relation is cyclic.
    pub fn build(nodes: &[Node], edges: &[Edge]) -> Result<Self, AppError> {
        let mut vertices: Vec<NodeVertex> = Vec::with_capacity(nodes.len());
        let mut index: FxHashMap<String, usize> = FxHashMap::default();

        for node in nodes {
            if index.contains_key(&node.id) {
                return Err(AppError::configuration(format!(
                    "Duplicate node id '{}'",
                    node.id
                )));
            }
            index.insert(node.id.clone(), vertices.len());
            vertices.push(NodeVertex {
                id: node.id.clone(),
                node_type: node.node_type.clone(),
                config: node.config.clone(),
                dependencies: Vec::new(),
                dependents: Vec::new(),
                input_ports: Vec::new(),
                level: 0,
            });
        }

        for edge in edges {
            let &source = index.get(&edge.source).ok_or_else(|| {
                AppError::configuration(format!(
                    "Edge '{}' references unknown source node '{}'",
                    edge.id, edge.source
                ))
            })?;
            let &target = index.get(&edge.target).ok_or_else(|| {
                AppError::configuration(format!(
                    "Edge '{}' references unknown target node '{}'",
                    edge.id, edge.target
                ))
            })?;

            vertices[target]
                .input_ports
                .push((edge.target_port.clone(), source));
            if !vertices[target].dependencies.contains(&source) {
                vertices[target].dependencies.push(source);
            }
            if !vertices[source].dependents.contains(&target) {
                vertices[source].dependents.push(target);
            }
        }

        if let Some(cycle) = find_cycle(&vertices) {
            let ids: Vec<&str> = cycle.iter().map(|&i| vertices[i].id.as_str()).collect();
            return Err(AppError::dependency(format!(
                "Circular dependency detected: {}",
                ids.join(" -> ")
            ))
            .with_code(codes::CYCLE_DETECTED)
            .with_details(serde_json::json!(ids)));
        }

        assign_levels(&mut vertices);

        let mut order: Vec<usize> = (0..vertices.len()).collect();
        order.sort_by(|&a, &b| {
            vertices[a]
                .level
                .cmp(&vertices[b].level)
                .then_with(|| vertices[a].id.cmp(&vertices[b].id))
        });

        Ok(Self {
            vertices,
            index,
            order,
        })
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[NodeVertex] {
        &self.vertices
    }

    pub fn vertex(&self, index: usize) -> &NodeVertex {
        &self.vertices[index]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn vertex_by_id(&self, id: &str) -> Option<&NodeVertex> {
        self.index_of(id).map(|i| &self.vertices[i])
    }

    /// Vertex indices in execution order: level ascending, id ascending
    /// within a level. Deterministic for a given input.
    pub fn execution_order(&self) -> &[usize] {
        &self.order
    }

    pub fn max_level(&self) -> u32 {
        self.vertices.iter().map(|v| v.level).max().unwrap_or(0)
    }

    /// The vertex and everything it transitively depends on.
    pub fn ancestors_closure(&self, start: usize) -> FxHashSet<usize> {
        let mut seen = FxHashSet::default();
        let mut stack = vec![start];
        while let Some(v) = stack.pop() {
            if seen.insert(v) {
                stack.extend(&self.vertices[v].dependencies);
            }
        }
        seen
    }

    /// Everything that transitively depends on the vertex (excluding it).
    pub fn dependents_closure(&self, start: usize) -> Vec<String> {
        let mut seen = FxHashSet::default();
        let mut stack: Vec<usize> = self.vertices[start].dependents.clone();
        let mut out = Vec::new();
        while let Some(v) = stack.pop() {
            if seen.insert(v) {
                out.push(self.vertices[v].id.clone());
                stack.extend(&self.vertices[v].dependents);
            }
        }
        out
    }
}

/// Depth-first search over dependent edges with an explicit stack and a
/// recursion-stack set; a back-edge yields the slice of the current path
/// from the revisited vertex, closed with the revisit.
fn find_cycle(vertices: &[NodeVertex]) -> Option<Vec<usize>> {
    #[derive(Copy, Clone, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut color = vec![Color::White; vertices.len()];
    let mut path: Vec<usize> = Vec::new();

    for start in 0..vertices.len() {
        if color[start] != Color::White {
            continue;
        }

        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        color[start] = Color::Gray;
        path.push(start);

        while let Some(frame) = stack.last_mut() {
            let v = frame.0;
            if frame.1 < vertices[v].dependents.len() {
                let child = vertices[v].dependents[frame.1];
                frame.1 += 1;
                match color[child] {
                    Color::Gray => {
                        // back-edge: slice the path from the revisited
                        // vertex and close the loop
                        let from = path.iter().position(|&p| p == child).unwrap();
                        let mut cycle = path[from..].to_vec();
                        cycle.push(child);
                        return Some(cycle);
                    }
                    Color::White => {
                        color[child] = Color::Gray;
                        path.push(child);
                        stack.push((child, 0));
                    }
                    Color::Black => {}
                }
            } else {
                color[v] = Color::Black;
                path.pop();
                stack.pop();
            }
        }
    }
    None
}

/// Kahn's algorithm over dependency counts; `level(v)` ends up as the
/// longest dependency path from a root. Requires an acyclic graph.
fn assign_levels(vertices: &mut [NodeVertex]) {
    let mut remaining: Vec<usize> = vertices.iter().map(|v| v.dependencies.len()).collect();
    let mut queue: Vec<usize> = (0..vertices.len())
        .filter(|&i| remaining[i] == 0)
        .collect();

    let mut head = 0;
    while head < queue.len() {
        let v = queue[head];
        head += 1;
        let level = vertices[v].level;
        let dependents = vertices[v].dependents.clone();
        for d in dependents {
            if vertices[d].level < level + 1 {
                vertices[d].level = level + 1;
            }
            remaining[d] -= 1;
            if remaining[d] == 0 {
                queue.push(d);
            }
        }
    }
}
